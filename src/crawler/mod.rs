use anyhow::Result;
use async_trait::async_trait;

use crate::declare::Quote;

/// CoinMarketCap
pub mod coin_market_cap;

/// 報價來源
#[async_trait]
pub trait QuoteSource: Send + Sync {
    /// 取得最新一筆報價
    async fn fetch_quote(&self) -> Result<Quote>;
}
