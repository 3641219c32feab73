use rust_decimal::Decimal;

/// 一次報價快照：價格與各區間漲跌幅(%)
#[derive(Debug, Clone, PartialEq)]
pub struct Quote {
    /// 幣別代號，例如 BTC
    pub symbol: String,
    /// 計價貨幣，例如 INR
    pub convert: String,
    pub price: Decimal,
    pub change_1h: Decimal,
    pub change_24h: Decimal,
    pub change_7d: Decimal,
    pub change_30d: Decimal,
}

impl Quote {
    /// 一小時漲跌方向
    pub fn direction(&self) -> Direction {
        Direction::from(self.change_1h)
    }
}

/// 價格變動方向
#[derive(PartialEq, Eq, Debug, Copy, Clone)]
pub enum Direction {
    Up,
    Down,
}

impl Direction {
    pub fn name(&self) -> &'static str {
        match self {
            Direction::Up => "up",
            Direction::Down => "down",
        }
    }
}

impl From<Decimal> for Direction {
    fn from(change: Decimal) -> Self {
        if change.is_sign_negative() {
            Direction::Down
        } else {
            Direction::Up
        }
    }
}
