use anyhow::Result;
use async_trait::async_trait;

use crate::{config, declare::Quote, util};

/// 報價寫入的目的地
#[async_trait]
pub trait SheetRecorder: Send + Sync {
    /// 新增一列，回傳對方的原始回應內容
    async fn record(&self, quote: &Quote) -> Result<String>;
}

/// Google Sheets behind an Apps Script web app.
///
/// The script appends one row per GET, taking the sheet name from `id` and
/// each column from a query parameter of the same name.
pub struct GoogleSheets {
    url: String,
    sheet_id: String,
}

impl GoogleSheets {
    pub fn new(url: String, sheet_id: String) -> Self {
        GoogleSheets { url, sheet_id }
    }

    /// 試算表網址取自設定或 YAML 檔
    pub fn from_config(setting: &config::Sheet) -> Result<Self> {
        Ok(Self::new(setting.resolve_url()?, setting.id.clone()))
    }

    /// 一列資料的欄位，順序固定，數值不做任何進位
    pub fn row_params(&self, quote: &Quote) -> Vec<(String, String)> {
        vec![
            ("id".to_string(), self.sheet_id.clone()),
            (format!("Price-{}", quote.convert), quote.price.to_string()),
            ("Change1hr".to_string(), quote.change_1h.to_string()),
            ("Change24hr".to_string(), quote.change_24h.to_string()),
            ("Change7d".to_string(), quote.change_7d.to_string()),
            ("Change30d".to_string(), quote.change_30d.to_string()),
        ]
    }
}

#[async_trait]
impl SheetRecorder for GoogleSheets {
    async fn record(&self, quote: &Quote) -> Result<String> {
        util::http::get(&self.url, None, &self.row_params(quote)).await
    }
}
