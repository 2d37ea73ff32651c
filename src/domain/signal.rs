//! Trading signal definition.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::market::MarketPair;

pub const DEFAULT_EXCHANGE: &str = "binance";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    /// Price is at or on the profitable side of `level` (long: at or above).
    pub fn is_favourable(self, price: f64, level: f64) -> bool {
        match self {
            Direction::Long => price >= level,
            Direction::Short => price <= level,
        }
    }

    /// Price is at or on the losing side of `level` (long: at or below).
    pub fn is_against(self, price: f64, level: f64) -> bool {
        match self {
            Direction::Long => price <= level,
            Direction::Short => price >= level,
        }
    }
}

/// A declarative trading signal to replay against historical prices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Signal {
    #[serde(default)]
    pub exchange: String,
    #[serde(default)]
    pub base_asset: String,
    #[serde(default)]
    pub quote_asset: String,

    /// Entry levels, furthest from market first. Empty enters immediately.
    #[serde(default)]
    pub entries: Vec<f64>,
    #[serde(default)]
    pub entry_ratios: Vec<f64>,
    #[serde(default)]
    pub take_profits: Vec<f64>,
    /// Per-target exit fractions; trailing targets inherit the last
    /// cumulative value.
    #[serde(default)]
    pub take_profit_ratios: Vec<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_loss: Option<f64>,
    #[serde(default)]
    pub is_short: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invalidate_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invalidate_after_seconds: Option<i64>,

    #[serde(default, rename = "ifTP1StopAtEntry")]
    pub if_tp1_stop_at_entry: bool,
    #[serde(default, rename = "ifTP2StopAtTP1")]
    pub if_tp2_stop_at_tp1: bool,
    #[serde(default, rename = "ifTP3StopAtTP2")]
    pub if_tp3_stop_at_tp2: bool,
    #[serde(default, rename = "ifTP4StopAtTP3")]
    pub if_tp4_stop_at_tp3: bool,

    #[serde(default)]
    pub return_candlesticks: bool,
    #[serde(default, rename = "dontCalculateMaxEnterUSD")]
    pub dont_calculate_max_enter_usd: bool,
}

impl Default for Signal {
    fn default() -> Self {
        Signal {
            exchange: DEFAULT_EXCHANGE.to_string(),
            base_asset: String::new(),
            quote_asset: String::new(),
            entries: Vec::new(),
            entry_ratios: vec![1.0],
            take_profits: Vec::new(),
            take_profit_ratios: vec![1.0],
            stop_loss: None,
            is_short: false,
            initial_time: None,
            invalidate_time: None,
            invalidate_after_seconds: None,
            if_tp1_stop_at_entry: false,
            if_tp2_stop_at_tp1: false,
            if_tp3_stop_at_tp2: false,
            if_tp4_stop_at_tp3: false,
            return_candlesticks: false,
            dont_calculate_max_enter_usd: false,
        }
    }
}

impl Signal {
    /// Canonical casing and defaults, applied before validation.
    pub fn normalized(mut self) -> Self {
        self.base_asset = self.base_asset.trim().to_uppercase();
        self.quote_asset = self.quote_asset.trim().to_uppercase();
        self.exchange = self.exchange.trim().to_lowercase();
        if self.exchange.is_empty() {
            self.exchange = DEFAULT_EXCHANGE.to_string();
        }
        if self.entry_ratios.is_empty() {
            self.entry_ratios = vec![1.0];
        }
        if self.take_profit_ratios.is_empty() {
            self.take_profit_ratios = vec![1.0];
        }
        self
    }

    pub fn direction(&self) -> Direction {
        if self.is_short {
            Direction::Short
        } else {
            Direction::Long
        }
    }

    pub fn market_pair(&self) -> MarketPair {
        MarketPair::new(self.base_asset.clone(), self.quote_asset.clone())
    }

    /// Number of entry zones. A single level (or none) is one zone.
    pub fn entry_zone_count(&self) -> usize {
        self.entries.len().saturating_sub(1).max(1)
    }

    /// Earliest of the absolute and relative invalidation instants.
    pub fn invalidate_at(&self) -> Option<DateTime<Utc>> {
        let relative = match (self.initial_time, self.invalidate_after_seconds) {
            (Some(initial), Some(seconds)) => {
                Duration::try_seconds(seconds).and_then(|d| initial.checked_add_signed(d))
            }
            _ => None,
        };
        match (self.invalidate_time, relative) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Whether reaching take-profit `target` (1-based) moves the stop loss to
    /// the previous progress price.
    pub fn stops_at_previous(&self, target: usize) -> bool {
        match target {
            1 => self.if_tp1_stop_at_entry,
            2 => self.if_tp2_stop_at_tp1,
            3 => self.if_tp3_stop_at_tp2,
            4 => self.if_tp4_stop_at_tp3,
            _ => false,
        }
    }
}
