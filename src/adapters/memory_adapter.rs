//! In-memory exchange backed by preloaded candlesticks and trades.
//!
//! Used for file-based data sets and for scripting upstream failures.

use chrono::{DateTime, Utc};
use std::collections::{HashMap, VecDeque};

use crate::domain::error::SignalCheckError;
use crate::domain::market::{Candlestick, MarketPair, Trade};
use crate::ports::exchange_port::{CandlestickSource, ExchangePort, Fetched, TradeSource};

/// Upstream behavior injected into every source opened for a pair.
#[derive(Debug, Clone, Default)]
struct Faults {
    rate_limits: usize,
    fail_after: Option<(usize, String)>,
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryExchange {
    candlesticks: HashMap<MarketPair, Vec<Candlestick>>,
    trades: HashMap<MarketPair, Vec<Trade>>,
    faults: HashMap<MarketPair, Faults>,
}

impl InMemoryExchange {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_candlesticks(mut self, pair: MarketPair, candlesticks: Vec<Candlestick>) -> Self {
        self.insert_candlesticks(pair, candlesticks);
        self
    }

    pub fn with_trades(mut self, pair: MarketPair, trades: Vec<Trade>) -> Self {
        self.insert_trades(pair, trades);
        self
    }

    /// Every source for `pair` reports rate limiting `count` times first.
    pub fn with_rate_limits(mut self, pair: MarketPair, count: usize) -> Self {
        self.faults.entry(pair).or_default().rate_limits = count;
        self
    }

    /// Every source for `pair` fails after delivering `items` items.
    pub fn with_failure_after(mut self, pair: MarketPair, items: usize, reason: &str) -> Self {
        self.faults.entry(pair).or_default().fail_after = Some((items, reason.to_string()));
        self
    }

    pub fn insert_candlesticks(&mut self, pair: MarketPair, mut candlesticks: Vec<Candlestick>) {
        candlesticks.sort_by_key(|c| c.timestamp);
        candlesticks.dedup_by_key(|c| c.timestamp);
        self.candlesticks.insert(pair, candlesticks);
    }

    pub fn insert_trades(&mut self, pair: MarketPair, mut trades: Vec<Trade>) {
        trades.sort_by_key(|t| t.timestamp);
        self.trades.insert(pair, trades);
    }

    pub fn pairs(&self) -> Vec<MarketPair> {
        let mut pairs: Vec<MarketPair> = self.candlesticks.keys().cloned().collect();
        pairs.sort_by(|a, b| (&a.base, &a.quote).cmp(&(&b.base, &b.quote)));
        pairs
    }

    fn source_for<T: Clone>(
        &self,
        items: Option<&Vec<T>>,
        pair: &MarketPair,
        keep: impl Fn(&T) -> bool,
    ) -> ScriptedSource<T> {
        let faults = self.faults.get(pair).cloned().unwrap_or_default();
        let items = match items {
            Some(items) => Ok(items.iter().filter(|&item| keep(item)).cloned().collect()),
            None => Err(pair.to_string()),
        };
        ScriptedSource {
            items,
            delivered: 0,
            faults,
        }
    }
}

impl ExchangePort for InMemoryExchange {
    fn candlesticks(
        &self,
        pair: &MarketPair,
        start: DateTime<Utc>,
    ) -> Box<dyn CandlestickSource + '_> {
        Box::new(self.source_for(self.candlesticks.get(pair), pair, |c: &Candlestick| {
            c.timestamp >= start
        }))
    }

    fn trades(&self, pair: &MarketPair, start: DateTime<Utc>) -> Box<dyn TradeSource + '_> {
        Box::new(self.source_for(self.trades.get(pair), pair, |t: &Trade| t.timestamp >= start))
    }
}

struct ScriptedSource<T> {
    /// `Err` holds the pair name when the pair is unknown.
    items: Result<VecDeque<T>, String>,
    delivered: usize,
    faults: Faults,
}

impl<T> ScriptedSource<T> {
    fn pull(&mut self) -> Fetched<T> {
        if self.faults.rate_limits > 0 {
            self.faults.rate_limits -= 1;
            return Fetched::RateLimited;
        }
        if let Some((after, reason)) = &self.faults.fail_after {
            if self.delivered >= *after {
                return Fetched::Failed(SignalCheckError::Exchange {
                    reason: reason.clone(),
                });
            }
        }
        let items = match &mut self.items {
            Ok(items) => items,
            Err(pair) => {
                return Fetched::Failed(SignalCheckError::InvalidMarketPair { pair: pair.clone() });
            }
        };
        match items.pop_front() {
            Some(item) => {
                self.delivered += 1;
                Fetched::Item(item)
            }
            None => Fetched::Exhausted,
        }
    }
}

impl CandlestickSource for ScriptedSource<Candlestick> {
    fn next_candlestick(&mut self) -> Fetched<Candlestick> {
        self.pull()
    }
}

impl TradeSource for ScriptedSource<Trade> {
    fn next_trade(&mut self) -> Fetched<Trade> {
        self.pull()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    fn candle(secs: i64) -> Candlestick {
        Candlestick {
            timestamp: at(secs),
            open: 1.0,
            high: 1.0,
            low: 1.0,
            close: 1.0,
            volume: 0.0,
            trade_count: 0,
        }
    }

    fn pair() -> MarketPair {
        MarketPair::new("BTC", "USDT")
    }

    fn timestamps(source: &mut dyn CandlestickSource) -> Vec<i64> {
        let mut seen = Vec::new();
        while let Fetched::Item(c) = source.next_candlestick() {
            seen.push(c.timestamp.timestamp());
        }
        seen
    }

    #[test]
    fn prunes_before_start_and_sorts() {
        let exchange = InMemoryExchange::new()
            .with_candlesticks(pair(), vec![candle(180), candle(0), candle(60), candle(120)]);
        let mut source = exchange.candlesticks(&pair(), at(60));
        assert_eq!(timestamps(source.as_mut()), vec![60, 120, 180]);
    }

    #[test]
    fn unknown_pair_is_invalid_market_pair() {
        let exchange = InMemoryExchange::new();
        let mut source = exchange.candlesticks(&pair(), at(0));
        assert!(matches!(
            source.next_candlestick(),
            Fetched::Failed(SignalCheckError::InvalidMarketPair { .. })
        ));
    }

    #[test]
    fn scripted_rate_limits_precede_data() {
        let exchange = InMemoryExchange::new()
            .with_candlesticks(pair(), vec![candle(0)])
            .with_rate_limits(pair(), 2);
        let mut source = exchange.candlesticks(&pair(), at(0));
        assert!(matches!(source.next_candlestick(), Fetched::RateLimited));
        assert!(matches!(source.next_candlestick(), Fetched::RateLimited));
        assert!(matches!(source.next_candlestick(), Fetched::Item(_)));
        assert!(matches!(source.next_candlestick(), Fetched::Exhausted));
    }

    #[test]
    fn scripted_failure_after_items() {
        let exchange = InMemoryExchange::new()
            .with_candlesticks(pair(), vec![candle(0), candle(60), candle(120)])
            .with_failure_after(pair(), 2, "connection reset");
        let mut source = exchange.candlesticks(&pair(), at(0));
        assert!(matches!(source.next_candlestick(), Fetched::Item(_)));
        assert!(matches!(source.next_candlestick(), Fetched::Item(_)));
        assert!(matches!(
            source.next_candlestick(),
            Fetched::Failed(SignalCheckError::Exchange { .. })
        ));
    }

    #[test]
    fn trades_are_pruned_by_start() {
        let trade = |secs| Trade {
            timestamp: at(secs),
            price: 1.0,
            quantity: 2.0,
        };
        let exchange = InMemoryExchange::new().with_trades(pair(), vec![trade(0), trade(30), trade(90)]);
        let mut source = exchange.trades(&pair(), at(30));
        let mut count = 0;
        while let Fetched::Item(_) = source.next_trade() {
            count += 1;
        }
        assert_eq!(count, 2);
    }
}
