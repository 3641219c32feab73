use std::{env, path::PathBuf};

use anyhow::{anyhow, Context, Result};
use config::{Config as config_config, File as config_file, FileFormat};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::logging;

const CONFIG_PATH: &str = "app.json";

#[derive(Serialize, Deserialize, Default, Debug, Clone)]
#[serde(default)]
pub struct App {
    pub coin_market_cap: CoinMarketCap,
    pub sheet: Sheet,
    pub email: Email,
    pub messenger: Messenger,
    pub alert: Alert,
    pub system: System,
}

const CRYPTO_API_KEY: &str = "CRYPTO_API_KEY";

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct CoinMarketCap {
    pub api_key: String,
    pub url: String,
    pub symbol: String,
    pub convert: String,
}

impl Default for CoinMarketCap {
    fn default() -> Self {
        CoinMarketCap {
            api_key: String::new(),
            url: "https://pro-api.coinmarketcap.com/v1/cryptocurrency/quotes/latest".to_string(),
            symbol: "BTC".to_string(),
            convert: "INR".to_string(),
        }
    }
}

const SHEET_URL: &str = "SHEET_URL";

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct Sheet {
    /// 直接指定試算表網址，留空時改讀 `url_file`
    pub url: String,
    /// YAML 檔，網址放在 `key` 欄位
    pub url_file: String,
    pub id: String,
}

impl Default for Sheet {
    fn default() -> Self {
        Sheet {
            url: String::new(),
            url_file: "ans.yaml".to_string(),
            id: "Sheet1".to_string(),
        }
    }
}

impl Sheet {
    /// Returns the spreadsheet endpoint, reading it from the YAML file when no
    /// url was configured directly.
    pub fn resolve_url(&self) -> Result<String> {
        if !self.url.is_empty() {
            return Ok(self.url.clone());
        }

        let yaml = config_config::builder()
            .add_source(config_file::new(&self.url_file, FileFormat::Yaml))
            .build()
            .with_context(|| format!("Failed to read sheet url file {}", self.url_file))?;

        let url = yaml
            .get_string("key")
            .with_context(|| format!("{} has no `key` entry", self.url_file))?;

        if url.is_empty() {
            return Err(anyhow!("{} has an empty `key` entry", self.url_file));
        }

        Ok(url)
    }
}

const EMAIL_ID: &str = "EMAIL_ID";
const EMAIL_ID_PASSWORD: &str = "EMAIL_ID_PASSWORD";

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct Email {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub account: String,
    pub password: String,
    pub recipient_file: String,
    pub subject: String,
}

impl Default for Email {
    fn default() -> Self {
        Email {
            smtp_host: "smtp.gmail.com".to_string(),
            smtp_port: 465,
            account: String::new(),
            password: String::new(),
            recipient_file: "emails.txt".to_string(),
            subject: "Alert Bitcoin is ".to_string(),
        }
    }
}

const PHONE_NUMBER: &str = "PHONE_NUMBER";
const WHATSAPP_TOKEN: &str = "WHATSAPP_TOKEN";
const WHATSAPP_API_URL: &str = "WHATSAPP_API_URL";

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct Messenger {
    pub phone_number: String,
    /// WhatsApp Cloud API 的 messages 端點
    pub api_url: String,
    pub token: String,
    /// 訊息延後幾分鐘送出
    pub delay_minutes: i64,
}

impl Default for Messenger {
    fn default() -> Self {
        Messenger {
            phone_number: String::new(),
            api_url: String::new(),
            token: String::new(),
            delay_minutes: 2,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct Alert {
    /// 一小時漲跌幅(%)的絕對值超過此值才通知
    pub threshold: Decimal,
}

impl Default for Alert {
    fn default() -> Self {
        Alert { threshold: dec!(0.1) }
    }
}

const RUN_FOREVER: &str = "RUN_FOREVER";

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct System {
    /// false 時只執行一次
    pub run_forever: bool,
    pub cron: String,
}

impl Default for System {
    fn default() -> Self {
        System {
            run_forever: false,
            //    sec min hour day-of-month month day-of-week
            cron: "0 0 * * * *".to_string(),
        }
    }
}

impl App {
    /// Loads `app.json` when it exists, then lets environment variables win.
    pub fn get() -> Result<Self> {
        let config_path = config_path();
        if config_path.exists() {
            let config: App = config_config::builder()
                .add_source(config_file::from(config_path))
                .build()?
                .try_deserialize()?;
            return Ok(config.override_with_env());
        }

        logging::info_file_async(format!(
            "{} not found, using defaults and environment variables",
            CONFIG_PATH
        ));

        Ok(App::default().override_with_env())
    }

    /// 將來至於 env 的設定值覆蓋掉 json 上的設定值
    fn override_with_env(mut self) -> Self {
        if let Ok(api_key) = env::var(CRYPTO_API_KEY) {
            self.coin_market_cap.api_key = api_key;
        }

        if let Ok(url) = env::var(SHEET_URL) {
            self.sheet.url = url;
        }

        if let Ok(account) = env::var(EMAIL_ID) {
            self.email.account = account;
        }

        if let Ok(password) = env::var(EMAIL_ID_PASSWORD) {
            self.email.password = password;
        }

        if let Ok(phone_number) = env::var(PHONE_NUMBER) {
            self.messenger.phone_number = phone_number;
        }

        if let Ok(token) = env::var(WHATSAPP_TOKEN) {
            self.messenger.token = token;
        }

        if let Ok(api_url) = env::var(WHATSAPP_API_URL) {
            self.messenger.api_url = api_url;
        }

        if let Ok(run_forever) = env::var(RUN_FOREVER) {
            match run_forever.parse::<bool>() {
                Ok(flag) => self.system.run_forever = flag,
                Err(why) => {
                    logging::error_file_async(format!(
                        "Failed to parse {}={} because {:?}",
                        RUN_FOREVER, run_forever, why
                    ));
                }
            }
        }

        self
    }
}

/// 回傳設定檔的路徑
fn config_path() -> PathBuf {
    PathBuf::from(CONFIG_PATH)
}
