use std::sync::Arc;

use anyhow::Result;
use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use thiserror::Error;

use crate::{
    bot::{
        email::{EmailNotifier, EmailReport, SmtpMailer},
        whatsapp::{MessageNotifier, WhatsApp},
    },
    config::App,
    crawler::{coin_market_cap::CoinMarketCap, QuoteSource},
    declare::Quote,
    logging,
    sheet::{GoogleSheets, SheetRecorder},
    util::datetime::SystemClock,
};

/// 單次執行失敗的步驟
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("failed to fetch quote: {0:#}")]
    Fetch(anyhow::Error),
    #[error("failed to record quote: {0:#}")]
    Record(anyhow::Error),
    #[error("failed to send message: {0:#}")]
    Message(anyhow::Error),
}

/// 寄信步驟的結果，失敗不會中斷後續的訊息通知
///
/// `Delivered` means at least one recipient got the mail; a run where every
/// recipient failed is `Failed`.
#[derive(Debug, Clone, PartialEq)]
pub enum EmailOutcome {
    Delivered(EmailReport),
    Failed(String),
}

impl From<EmailReport> for EmailOutcome {
    fn from(report: EmailReport) -> Self {
        if report.sent.is_empty() && !report.failed.is_empty() {
            let reasons: Vec<String> = report
                .failed
                .iter()
                .map(|(to, why)| format!("{}: {}", to, why))
                .collect();
            return EmailOutcome::Failed(format!(
                "no recipient received the alert ({})",
                reasons.join("; ")
            ));
        }

        EmailOutcome::Delivered(report)
    }
}

/// What one run of the pipeline did.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub quote: Quote,
    /// 一小時漲跌幅是否超過門檻
    pub alerted: bool,
    pub email: Option<EmailOutcome>,
    /// 訊息排定的送出時間
    pub message_at: Option<NaiveDateTime>,
}

/// 一小時漲跌幅的絕對值超過門檻才通知
pub fn should_alert(change_1h: Decimal, threshold: Decimal) -> bool {
    change_1h.abs() > threshold
}

/// Fetch, record, then alert by email and message when the 1 hour change
/// crosses the threshold.
pub struct PriceWatch {
    source: Box<dyn QuoteSource>,
    recorder: Box<dyn SheetRecorder>,
    email: EmailNotifier,
    message: MessageNotifier,
    threshold: Decimal,
}

impl PriceWatch {
    pub fn new(
        source: Box<dyn QuoteSource>,
        recorder: Box<dyn SheetRecorder>,
        email: EmailNotifier,
        message: MessageNotifier,
        threshold: Decimal,
    ) -> Self {
        PriceWatch {
            source,
            recorder,
            email,
            message,
            threshold,
        }
    }

    pub fn from_config(setting: &App) -> Result<Self> {
        Ok(Self::new(
            Box::new(CoinMarketCap::new(&setting.coin_market_cap)),
            Box::new(GoogleSheets::from_config(&setting.sheet)?),
            EmailNotifier::new(Box::new(SmtpMailer::new(&setting.email)?), &setting.email),
            MessageNotifier::new(
                Box::new(WhatsApp::new(&setting.messenger)),
                Arc::new(SystemClock),
                &setting.messenger,
            ),
            setting.alert.threshold,
        ))
    }

    pub async fn execute(&self) -> Result<RunReport, PipelineError> {
        let quote = self
            .source
            .fetch_quote()
            .await
            .map_err(PipelineError::Fetch)?;

        let sheet_response = self
            .recorder
            .record(&quote)
            .await
            .map_err(PipelineError::Record)?;
        logging::info_file_async(format!("Sheet responded: {}", sheet_response));

        let mut report = RunReport {
            alerted: should_alert(quote.change_1h, self.threshold),
            quote,
            email: None,
            message_at: None,
        };

        if !report.alerted {
            logging::debug_file_async(format!(
                "1h change {} within threshold {}",
                report.quote.change_1h, self.threshold
            ));
            return Ok(report);
        }

        logging::info_file_async(format!(
            "1h change {} exceeds threshold {}, sending alerts",
            report.quote.change_1h, self.threshold
        ));

        report.email = Some(match self.email.notify(&report.quote).await {
            Ok(email_report) => {
                if !email_report.is_complete() {
                    logging::warn_file_async(format!(
                        "Alert mail sent to {:?}, failed for {:?}",
                        email_report.sent, email_report.failed
                    ));
                }
                EmailOutcome::from(email_report)
            }
            Err(why) => {
                logging::error_file_async(format!("Failed to send alert mail because {:?}", why));
                EmailOutcome::Failed(format!("{:#}", why))
            }
        });

        let at = self
            .message
            .notify(&report.quote)
            .await
            .map_err(PipelineError::Message)?;
        report.message_at = Some(at);

        Ok(report)
    }
}
