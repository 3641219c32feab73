use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

use crate::{config, declare::Quote, logging};

/// 寄信的管道
#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn send(&self, from: &str, to: &str, subject: &str, body: &str) -> Result<()>;
}

/// SMTP over implicit TLS, e.g. `smtp.gmail.com:465`.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpMailer {
    pub fn new(setting: &config::Email) -> Result<Self> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&setting.smtp_host)
            .map_err(|why| {
                anyhow!(
                    "Failed to create smtp relay {} because {:?}",
                    setting.smtp_host,
                    why
                )
            })?
            .port(setting.smtp_port)
            .credentials(Credentials::new(
                setting.account.clone(),
                setting.password.clone(),
            ))
            .build();

        Ok(SmtpMailer { transport })
    }
}

#[async_trait]
impl MailTransport for SmtpMailer {
    async fn send(&self, from: &str, to: &str, subject: &str, body: &str) -> Result<()> {
        let message = Message::builder()
            .from(from.parse::<Mailbox>().with_context(|| format!("Invalid sender {}", from))?)
            .to(to.parse::<Mailbox>().with_context(|| format!("Invalid recipient {}", to))?)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())?;

        self.transport
            .send(message)
            .await
            .map_err(|why| anyhow!("Failed to send mail to {} because {:?}", to, why))?;

        Ok(())
    }
}

/// 一次寄信的結果
#[derive(Debug, Default, Clone, PartialEq)]
pub struct EmailReport {
    pub sent: Vec<String>,
    /// (收件人, 失敗原因)
    pub failed: Vec<(String, String)>,
}

impl EmailReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Sends the same alert to every address in the recipient file.
pub struct EmailNotifier {
    transport: Box<dyn MailTransport>,
    sender: String,
    recipient_file: PathBuf,
    subject: String,
}

impl EmailNotifier {
    pub fn new(transport: Box<dyn MailTransport>, setting: &config::Email) -> Self {
        EmailNotifier {
            transport,
            sender: setting.account.clone(),
            recipient_file: PathBuf::from(&setting.recipient_file),
            subject: setting.subject.clone(),
        }
    }

    /// 依收件人檔案逐一寄出，單一收件人失敗不影響其他人
    pub async fn notify(&self, quote: &Quote) -> Result<EmailReport> {
        let recipients = read_recipients(&self.recipient_file)?;
        let subject = subject(&self.subject, quote);
        let body = body(quote);
        let mut report = EmailReport::default();

        for recipient in recipients {
            match self
                .transport
                .send(&self.sender, &recipient, &subject, &body)
                .await
            {
                Ok(_) => {
                    logging::info_file_async(format!("Sent alert mail to {}", recipient));
                    report.sent.push(recipient);
                }
                Err(why) => {
                    logging::error_file_async(format!(
                        "Failed to send alert mail to {} because {:?}",
                        recipient, why
                    ));
                    report.failed.push((recipient, format!("{:#}", why)));
                }
            }
        }

        Ok(report)
    }
}

/// 讀取收件人檔案，以空白字元切割
pub fn read_recipients(path: &Path) -> Result<Vec<String>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read recipient file {}", path.display()))?;

    Ok(parse_recipients(&content))
}

pub fn parse_recipients(content: &str) -> Vec<String> {
    content.split_whitespace().map(str::to_string).collect()
}

pub fn subject(prefix: &str, quote: &Quote) -> String {
    format!("{}{}", prefix, quote.direction().name())
}

pub fn body(quote: &Quote) -> String {
    format!(
        "The price of {} moved by: {} %",
        quote.symbol, quote.change_1h
    )
}
