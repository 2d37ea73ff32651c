//! Market data representation: pairs, candlesticks, ticks and trades.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MarketPair {
    pub base: String,
    pub quote: String,
}

impl MarketPair {
    pub fn new(base: impl Into<String>, quote: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            quote: quote.into(),
        }
    }
}

impl fmt::Display for MarketPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.base, self.quote)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candlestick {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    #[serde(default)]
    pub volume: f64,
    #[serde(default)]
    pub trade_count: u64,
}

impl Candlestick {
    /// The two ticks of this candlestick, lowest price first.
    ///
    /// Intra-candle ordering is unknown, so the low is always visited before
    /// the high.
    pub fn to_ticks(&self) -> [Tick; 2] {
        let tick = |price| Tick {
            timestamp: self.timestamp,
            price,
            volume: self.volume,
            trade_count: self.trade_count,
        };
        [tick(self.low), tick(self.high)]
    }
}

/// One side of a candlestick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tick {
    pub timestamp: DateTime<Utc>,
    pub price: f64,
    pub volume: f64,
    pub trade_count: u64,
}

/// A single fill from the trade tape.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub timestamp: DateTime<Utc>,
    pub price: f64,
    pub quantity: f64,
}
