use std::collections::HashMap;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::{config, crawler::QuoteSource, declare::Quote, logging, util};

const API_KEY_HEADER: &str = "x-cmc_pro_api_key";

/// CoinMarketCap `cryptocurrency/quotes/latest` 用戶端
pub struct CoinMarketCap {
    url: String,
    api_key: String,
    symbol: String,
    convert: String,
}

impl CoinMarketCap {
    pub fn new(setting: &config::CoinMarketCap) -> Self {
        CoinMarketCap {
            url: setting.url.clone(),
            api_key: setting.api_key.clone(),
            symbol: setting.symbol.clone(),
            convert: setting.convert.clone(),
        }
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(
            HeaderName::from_static(API_KEY_HEADER),
            HeaderValue::from_str(&self.api_key).context("Invalid CoinMarketCap api key")?,
        );

        Ok(headers)
    }
}

#[async_trait]
impl QuoteSource for CoinMarketCap {
    async fn fetch_quote(&self) -> Result<Quote> {
        let query = [("symbol", self.symbol.as_str()), ("convert", self.convert.as_str())];
        let res = util::http::get_json::<QuotesLatestResponse, _>(
            &self.url,
            Some(self.headers()?),
            &query,
        )
        .await?;

        let quote = res.into_quote(&self.symbol, &self.convert)?;
        logging::info_file_async(format!(
            "{} price in {}: {}",
            quote.symbol, quote.convert, quote.price
        ));

        Ok(quote)
    }
}

#[derive(Deserialize, Debug)]
struct QuotesLatestResponse {
    status: Status,
    #[serde(default)]
    data: HashMap<String, Cryptocurrency>,
}

#[derive(Deserialize, Debug)]
struct Status {
    #[serde(default)]
    error_code: i64,
    error_message: Option<String>,
}

#[derive(Deserialize, Debug)]
struct Cryptocurrency {
    #[serde(default)]
    quote: HashMap<String, QuoteDetail>,
}

/// 數值直接由 JSON 文字轉成 Decimal，不經過 f64
#[derive(Deserialize, Debug)]
struct QuoteDetail {
    #[serde(default, with = "rust_decimal::serde::arbitrary_precision_option")]
    price: Option<Decimal>,
    #[serde(default, with = "rust_decimal::serde::arbitrary_precision_option")]
    percent_change_1h: Option<Decimal>,
    #[serde(default, with = "rust_decimal::serde::arbitrary_precision_option")]
    percent_change_24h: Option<Decimal>,
    #[serde(default, with = "rust_decimal::serde::arbitrary_precision_option")]
    percent_change_7d: Option<Decimal>,
    #[serde(default, with = "rust_decimal::serde::arbitrary_precision_option")]
    percent_change_30d: Option<Decimal>,
}

impl QuotesLatestResponse {
    /// 取出 `data.<symbol>.quote.<convert>` 的價格與漲跌幅
    fn into_quote(mut self, symbol: &str, convert: &str) -> Result<Quote> {
        if self.status.error_code != 0 {
            return Err(anyhow!(
                "CoinMarketCap error {}: {}",
                self.status.error_code,
                self.status.error_message.unwrap_or_default()
            ));
        }

        let mut coin = self
            .data
            .remove(symbol)
            .ok_or_else(|| anyhow!("Response has no data for {}", symbol))?;
        let detail = coin
            .quote
            .remove(convert)
            .ok_or_else(|| anyhow!("Response has no {} quote for {}", convert, symbol))?;

        Ok(Quote {
            symbol: symbol.to_string(),
            convert: convert.to_string(),
            price: required(detail.price, "price")?,
            change_1h: required(detail.percent_change_1h, "percent_change_1h")?,
            change_24h: required(detail.percent_change_24h, "percent_change_24h")?,
            change_7d: required(detail.percent_change_7d, "percent_change_7d")?,
            change_30d: required(detail.percent_change_30d, "percent_change_30d")?,
        })
    }
}

fn required(value: Option<Decimal>, field: &str) -> Result<Decimal> {
    value.ok_or_else(|| anyhow!("Response quote is missing {}", field))
}

#[cfg(test)]
pub(crate) mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    pub(crate) const SAMPLE: &str = r#"{
        "status": {
            "timestamp": "2024-03-15T10:05:00.000Z",
            "error_code": 0,
            "error_message": null,
            "elapsed": 12,
            "credit_count": 1
        },
        "data": {
            "BTC": {
                "id": 1,
                "name": "Bitcoin",
                "symbol": "BTC",
                "quote": {
                    "INR": {
                        "price": 5432109.87,
                        "volume_24h": 2345678901.5,
                        "percent_change_1h": -0.5,
                        "percent_change_24h": 1.25,
                        "percent_change_7d": -3.75,
                        "percent_change_30d": 12.5,
                        "last_updated": "2024-03-15T10:04:00.000Z"
                    }
                }
            }
        }
    }"#;

    pub(crate) fn parse(body: &str) -> Result<Quote> {
        serde_json::from_str::<QuotesLatestResponse>(body)?.into_quote("BTC", "INR")
    }

    #[test]
    fn test_into_quote() {
        let quote = parse(SAMPLE).unwrap();

        assert_eq!(quote.symbol, "BTC");
        assert_eq!(quote.convert, "INR");
        assert_eq!(quote.price, dec!(5432109.87));
        assert_eq!(quote.change_1h, dec!(-0.5));
        assert_eq!(quote.change_24h, dec!(1.25));
        assert_eq!(quote.change_7d, dec!(-3.75));
        assert_eq!(quote.change_30d, dec!(12.5));
    }

    #[test]
    fn test_into_quote_keeps_long_decimals() {
        let body = r#"{"status":{"error_code":0},"data":{"BTC":{"quote":{"INR":{
            "price": 5432109.123456789012345,
            "percent_change_1h": 0.123456789012345678,
            "percent_change_24h": -0.000000000000000001,
            "percent_change_7d": 3,
            "percent_change_30d": 12.50}}}}}"#;

        let quote = parse(body).unwrap();

        assert_eq!(quote.price, dec!(5432109.123456789012345));
        assert_eq!(quote.change_1h, dec!(0.123456789012345678));
        assert_eq!(quote.change_24h, dec!(-0.000000000000000001));
        assert_eq!(quote.change_7d, dec!(3));
        assert_eq!(quote.change_30d.to_string(), "12.50");
        assert_eq!(quote.price.to_string(), "5432109.123456789012345");
    }

    #[test]
    fn test_api_error_status() {
        let body = r#"{"status":{"error_code":1001,"error_message":"This API Key is invalid."}}"#;

        let err = parse(body).unwrap_err();

        assert!(err.to_string().contains("This API Key is invalid."));
    }

    #[test]
    fn test_missing_symbol() {
        let body = r#"{"status":{"error_code":0},"data":{"ETH":{"quote":{}}}}"#;

        assert!(parse(body).unwrap_err().to_string().contains("BTC"));
    }

    #[test]
    fn test_missing_field() {
        let body = r#"{"status":{"error_code":0},"data":{"BTC":{"quote":{"INR":{
            "price": 1.0, "percent_change_1h": 0.2, "percent_change_24h": 0.3,
            "percent_change_7d": 0.4}}}}}"#;

        assert!(parse(body)
            .unwrap_err()
            .to_string()
            .contains("percent_change_30d"));
    }

    #[test]
    fn test_headers() {
        let cmc = CoinMarketCap::new(&config::CoinMarketCap {
            api_key: "abc-123".to_string(),
            ..Default::default()
        });

        let headers = cmc.headers().unwrap();

        assert_eq!(headers.get("X-CMC_PRO_API_KEY").unwrap(), "abc-123");
        assert_eq!(headers.get(header::ACCEPT).unwrap(), "application/json");
    }

    #[tokio::test]
    #[ignore]
    async fn test_fetch_quote() {
        dotenv::dotenv().ok();
        crate::install_crypto_provider();
        let setting = crate::config::App::get().unwrap();

        match CoinMarketCap::new(&setting.coin_market_cap).fetch_quote().await {
            Ok(quote) => {
                dbg!(&quote);
                logging::debug_file_async(format!("quote : {:#?}", quote));
            }
            Err(why) => {
                logging::debug_file_async(format!("Failed to fetch_quote because {:?}", why));
            }
        }
    }
}
