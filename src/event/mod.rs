/// 比特幣價格追蹤
pub mod price_watch;
