use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{Local, NaiveDateTime};
use concat_string::concat_string;
use reqwest::header::{self, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};

use crate::{
    config,
    declare::Quote,
    logging,
    util::{
        self,
        datetime::{self, Clock},
    },
};

/// 即時訊息的發送管道
#[async_trait]
pub trait Messenger: Send + Sync {
    /// 於指定時間送出一則文字訊息
    async fn send_at(&self, phone_number: &str, text: &str, at: NaiveDateTime) -> Result<()>;
}

/// WhatsApp Cloud API
pub struct WhatsApp {
    send_message_url: String,
    token: String,
}

impl WhatsApp {
    pub fn new(setting: &config::Messenger) -> Self {
        WhatsApp {
            send_message_url: setting.api_url.clone(),
            token: setting.token.clone(),
        }
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_str(&concat_string!("Bearer ", self.token))
                .map_err(|why| anyhow!("Invalid WhatsApp token because {:?}", why))?,
        );

        Ok(headers)
    }

    async fn send_message(&self, payload: SendMessageRequest<'_>) -> Result<()> {
        let res = util::http::post_use_json::<SendMessageRequest, SendMessageResponse>(
            &self.send_message_url,
            Some(self.headers()?),
            Some(&payload),
        )
        .await
        .map_err(|err| anyhow!("Failed to send_message because: {:?}", err))?;

        let ids: Vec<_> = res.messages.iter().map(|m| m.id.as_str()).collect();
        logging::info_file_async(format!("WhatsApp accepted message {:?}", ids));

        Ok(())
    }
}

#[async_trait]
impl Messenger for WhatsApp {
    async fn send_at(&self, phone_number: &str, text: &str, at: NaiveDateTime) -> Result<()> {
        // 時間已過就立即送出
        let wait = datetime::wait_until(at, Local::now().naive_local());
        if !wait.is_zero() {
            tokio::time::sleep(wait).await;
        }

        self.send_message(SendMessageRequest::new(phone_number, text))
            .await
    }
}

#[derive(Deserialize)]
struct SendMessageResponse {
    #[serde(default)]
    messages: Vec<MessageId>,
}

#[derive(Deserialize)]
struct MessageId {
    id: String,
}

#[derive(Serialize, Debug, PartialEq)]
pub struct SendMessageRequest<'a> {
    pub messaging_product: &'static str,
    pub to: &'a str,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub text: TextBody<'a>,
}

#[derive(Serialize, Debug, PartialEq)]
pub struct TextBody<'a> {
    pub body: &'a str,
}

impl<'a> SendMessageRequest<'a> {
    pub fn new(phone_number: &'a str, text: &'a str) -> SendMessageRequest<'a> {
        SendMessageRequest {
            messaging_product: "whatsapp",
            // Cloud API 只收數字
            to: phone_number.trim_start_matches('+'),
            kind: "text",
            text: TextBody { body: text },
        }
    }
}

/// Schedules the alert message a fixed number of minutes from now.
pub struct MessageNotifier {
    messenger: Box<dyn Messenger>,
    clock: Arc<dyn Clock>,
    phone_number: String,
    delay_minutes: i64,
}

impl MessageNotifier {
    pub fn new(
        messenger: Box<dyn Messenger>,
        clock: Arc<dyn Clock>,
        setting: &config::Messenger,
    ) -> Self {
        MessageNotifier {
            messenger,
            clock,
            phone_number: setting.phone_number.clone(),
            delay_minutes: setting.delay_minutes,
        }
    }

    /// 送出訊息並回傳排定的時間
    pub async fn notify(&self, quote: &Quote) -> Result<NaiveDateTime> {
        let at = datetime::send_time(self.clock.now().naive_local(), self.delay_minutes);
        logging::info_file_async(format!(
            "Scheduling message to {} at {}",
            self.phone_number,
            at.format("%H:%M")
        ));

        self.messenger
            .send_at(&self.phone_number, &text(quote), at)
            .await?;

        Ok(at)
    }
}

pub fn text(quote: &Quote) -> String {
    concat_string!("The price moved by : ", quote.change_1h.to_string(), " %")
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Mutex;

    use chrono::{DateTime, TimeZone};
    use rust_decimal_macros::dec;

    use super::*;
    use crate::bot::email::tests::quote;

    /// 只記錄排程，不真的送出
    #[derive(Default, Clone)]
    pub(crate) struct RecordingMessenger {
        pub sent: Arc<Mutex<Vec<(String, String, NaiveDateTime)>>>,
        pub fail: bool,
    }

    #[async_trait]
    impl Messenger for RecordingMessenger {
        async fn send_at(&self, phone_number: &str, text: &str, at: NaiveDateTime) -> Result<()> {
            self.sent
                .lock()
                .unwrap()
                .push((phone_number.to_string(), text.to_string(), at));

            if self.fail {
                return Err(anyhow!("messenger unavailable"));
            }

            Ok(())
        }
    }

    pub(crate) struct FixedClock(pub DateTime<Local>);

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Local> {
            self.0
        }
    }

    pub(crate) fn ten_oh_five() -> Arc<dyn Clock> {
        let now = Local
            .with_ymd_and_hms(2024, 3, 15, 10, 5, 0)
            .earliest()
            .unwrap();
        Arc::new(FixedClock(now))
    }

    fn setting() -> config::Messenger {
        config::Messenger {
            phone_number: "+911234567890".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_text() {
        assert_eq!(text(&quote(dec!(-0.5))), "The price moved by : -0.5 %");
    }

    #[test]
    fn test_request_payload() {
        let req = SendMessageRequest::new("+911234567890", "hello");
        let json = serde_json::to_value(&req).unwrap();

        assert_eq!(
            json,
            serde_json::json!({
                "messaging_product": "whatsapp",
                "to": "911234567890",
                "type": "text",
                "text": { "body": "hello" }
            })
        );
    }

    #[test]
    fn test_bearer_header() {
        let whatsapp = WhatsApp::new(&config::Messenger {
            token: "secret".to_string(),
            ..Default::default()
        });

        let headers = whatsapp.headers().unwrap();

        assert_eq!(headers.get(header::AUTHORIZATION).unwrap(), "Bearer secret");
    }

    #[tokio::test]
    async fn test_notify_schedules_two_minutes_ahead() {
        let messenger = RecordingMessenger::default();
        let notifier = MessageNotifier::new(Box::new(messenger.clone()), ten_oh_five(), &setting());

        let at = notifier.notify(&quote(dec!(-0.5))).await.unwrap();

        assert_eq!(at.format("%H:%M").to_string(), "10:07");
        let sent = messenger.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "+911234567890");
        assert_eq!(sent[0].1, "The price moved by : -0.5 %");
        assert_eq!(sent[0].2, at);
    }

    #[tokio::test]
    async fn test_notify_propagates_failure() {
        let messenger = RecordingMessenger {
            fail: true,
            ..Default::default()
        };
        let notifier = MessageNotifier::new(Box::new(messenger), ten_oh_five(), &setting());

        assert!(notifier.notify(&quote(dec!(0.5))).await.is_err());
    }
}
