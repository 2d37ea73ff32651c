//! Exchange collaborator port.
//!
//! Adapters expose candlesticks and trades as pull-based sources. Each pull
//! yields a [`Fetched`] value, so exhaustion, rate limiting and fatal failures
//! are distinct variants rather than sentinel errors.

use chrono::{DateTime, Utc};
use std::collections::HashMap;

use crate::domain::error::SignalCheckError;
use crate::domain::market::{Candlestick, MarketPair, Trade};

/// Result of a single pull from an exchange source.
#[derive(Debug)]
pub enum Fetched<T> {
    Item(T),
    /// The source has no more data.
    Exhausted,
    /// Transient; the same pull may succeed after a pause.
    RateLimited,
    Failed(SignalCheckError),
}

/// Candlesticks in strictly increasing timestamp order, none before the
/// start time the source was opened with.
pub trait CandlestickSource {
    fn next_candlestick(&mut self) -> Fetched<Candlestick>;
}

/// Trades in non-decreasing timestamp order, none before the start time.
pub trait TradeSource {
    fn next_trade(&mut self) -> Fetched<Trade>;
}

impl<S: CandlestickSource + ?Sized> CandlestickSource for &mut S {
    fn next_candlestick(&mut self) -> Fetched<Candlestick> {
        (**self).next_candlestick()
    }
}

impl<S: CandlestickSource + ?Sized> CandlestickSource for Box<S> {
    fn next_candlestick(&mut self) -> Fetched<Candlestick> {
        (**self).next_candlestick()
    }
}

impl<S: TradeSource + ?Sized> TradeSource for &mut S {
    fn next_trade(&mut self) -> Fetched<Trade> {
        (**self).next_trade()
    }
}

impl<S: TradeSource + ?Sized> TradeSource for Box<S> {
    fn next_trade(&mut self) -> Fetched<Trade> {
        (**self).next_trade()
    }
}

pub trait ExchangePort {
    fn candlesticks(
        &self,
        pair: &MarketPair,
        start: DateTime<Utc>,
    ) -> Box<dyn CandlestickSource + '_>;

    fn trades(&self, pair: &MarketPair, start: DateTime<Utc>) -> Box<dyn TradeSource + '_>;
}

/// Exchanges available to a check, keyed by lower-case name.
#[derive(Default)]
pub struct ExchangeRegistry {
    exchanges: HashMap<String, Box<dyn ExchangePort + Send + Sync>>,
}

impl ExchangeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        name: &str,
        exchange: impl ExchangePort + Send + Sync + 'static,
    ) -> &mut Self {
        self.exchanges
            .insert(name.trim().to_lowercase(), Box::new(exchange));
        self
    }

    pub fn with(mut self, name: &str, exchange: impl ExchangePort + Send + Sync + 'static) -> Self {
        self.register(name, exchange);
        self
    }

    pub fn get(&self, name: &str) -> Option<&(dyn ExchangePort + Send + Sync)> {
        self.exchanges.get(name).map(|e| e.as_ref())
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.exchanges.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn is_empty(&self) -> bool {
        self.exchanges.is_empty()
    }
}
