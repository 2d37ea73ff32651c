//! Max-enter estimation from the trade tape following an entry.

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use crate::domain::error::SignalCheckError;
use crate::domain::event::{Event, EventKind};
use crate::domain::market::{MarketPair, Trade};
use crate::domain::retry::RetryPolicy;
use crate::domain::usd_price::resolve_usd_price;
use crate::ports::exchange_port::{ExchangePort, Fetched, TradeSource};

#[derive(Debug, Clone, PartialEq)]
pub struct MaxEnterConfig {
    /// Collection window measured from the first collected trade.
    pub minute_count: u32,
    pub max_trade_count: usize,
    /// Rank of the selected trade in the quantity-sorted sample.
    pub percentile: f64,
}

impl Default for MaxEnterConfig {
    fn default() -> Self {
        MaxEnterConfig {
            minute_count: 5,
            max_trade_count: 10_000,
            percentile: 0.8,
        }
    }
}

/// Trades from `source`, bounded by count and by the time window.
pub fn collect_trades(
    source: &mut dyn TradeSource,
    config: &MaxEnterConfig,
    retry: &RetryPolicy,
) -> Result<Vec<Trade>, SignalCheckError> {
    let window = Duration::minutes(i64::from(config.minute_count));
    let mut trades: Vec<Trade> = Vec::new();
    while trades.len() < config.max_trade_count {
        match retry.pull(|| source.next_trade()) {
            Fetched::Item(trade) => {
                if let Some(first) = trades.first() {
                    if trade.timestamp > first.timestamp + window {
                        break;
                    }
                }
                trades.push(trade);
            }
            Fetched::Exhausted => break,
            Fetched::RateLimited => {
                return Err(SignalCheckError::RateLimited {
                    attempts: retry.max_attempts(),
                });
            }
            Fetched::Failed(error) => return Err(error),
        }
    }
    Ok(trades)
}

/// Trade at the configured percentile rank by quantity.
pub fn select_percentile_trade(mut trades: Vec<Trade>, percentile: f64) -> Option<Trade> {
    if trades.is_empty() {
        return None;
    }
    trades.sort_by(|a, b| a.quantity.total_cmp(&b.quantity));
    let rank = (percentile * trades.len() as f64).round() as usize;
    let index = rank.min(trades.len() - 1);
    Some(trades[index])
}

/// Largest realistic USD position size around the entry event.
pub fn estimate_max_enter_usd(
    exchange: &dyn ExchangePort,
    pair: &MarketPair,
    entry_price: f64,
    entry_at: DateTime<Utc>,
    config: &MaxEnterConfig,
    retry: &RetryPolicy,
) -> Result<f64, SignalCheckError> {
    let usd_price = resolve_usd_price(exchange, pair, entry_price, entry_at, retry)?;

    let mut source = exchange.trades(pair, entry_at);
    let trades = collect_trades(source.as_mut(), config, retry)?;
    let count = trades.len();
    let trade = select_percentile_trade(trades, config.percentile).ok_or_else(|| {
        SignalCheckError::NoTrades {
            pair: pair.to_string(),
            at: entry_at.to_rfc3339(),
        }
    })?;
    debug!(%pair, count, quantity = trade.quantity, usd_price, "selected max-enter trade");
    Ok(trade.quantity * usd_price)
}

/// Runs [`estimate_max_enter_usd`] for the first entry in an event log.
pub fn max_enter_usd_for_events(
    exchange: &dyn ExchangePort,
    pair: &MarketPair,
    events: &[Event],
    config: &MaxEnterConfig,
    retry: &RetryPolicy,
) -> Result<f64, SignalCheckError> {
    let (price, at) = events
        .iter()
        .filter(|e| e.kind == EventKind::Entered)
        .find_map(|e| Some((e.price?, e.at?)))
        .ok_or(SignalCheckError::NotEntered)?;
    estimate_max_enter_usd(exchange, pair, price, at, config, retry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    fn trade(secs: i64, quantity: f64) -> Trade {
        Trade {
            timestamp: DateTime::from_timestamp(secs, 0).unwrap(),
            price: 1.0,
            quantity,
        }
    }

    struct Tape(VecDeque<Fetched<Trade>>);

    impl TradeSource for Tape {
        fn next_trade(&mut self) -> Fetched<Trade> {
            self.0.pop_front().unwrap_or(Fetched::Exhausted)
        }
    }

    fn tape(trades: Vec<Trade>) -> Tape {
        Tape(trades.into_iter().map(Fetched::Item).collect())
    }

    #[test]
    fn percentile_picks_rounded_rank() {
        let trades: Vec<Trade> = [5.0, 1.0, 4.0, 2.0, 3.0]
            .iter()
            .enumerate()
            .map(|(i, &q)| trade(i as i64, q))
            .collect();
        // round(0.8 * 5) = 4, the largest
        let selected = select_percentile_trade(trades, 0.8).unwrap();
        assert_eq!(selected.quantity, 5.0);
    }

    #[test]
    fn percentile_rank_is_clamped() {
        let selected = select_percentile_trade(vec![trade(0, 7.0)], 0.8).unwrap();
        assert_eq!(selected.quantity, 7.0);

        let trades = (1..=10).map(|i| trade(i, i as f64)).collect();
        assert_eq!(select_percentile_trade(trades, 0.8).unwrap().quantity, 9.0);
    }

    #[test]
    fn empty_sample_has_no_selection() {
        assert!(select_percentile_trade(Vec::new(), 0.8).is_none());
    }

    #[test]
    fn collection_stops_after_window() {
        let mut source = tape(vec![trade(0, 1.0), trade(300, 2.0), trade(301, 3.0)]);
        let trades = collect_trades(
            &mut source,
            &MaxEnterConfig::default(),
            &RetryPolicy::immediate(0),
        )
        .unwrap();
        assert_eq!(trades.len(), 2);
    }

    #[test]
    fn collection_stops_at_max_count() {
        let mut source = tape((0..10).map(|i| trade(i, 1.0)).collect());
        let config = MaxEnterConfig {
            max_trade_count: 4,
            ..MaxEnterConfig::default()
        };
        let trades = collect_trades(&mut source, &config, &RetryPolicy::immediate(0)).unwrap();
        assert_eq!(trades.len(), 4);
    }

    #[test]
    fn collection_propagates_fatal_errors() {
        let mut source = Tape(VecDeque::from([
            Fetched::Item(trade(0, 1.0)),
            Fetched::Failed(SignalCheckError::Exchange {
                reason: "boom".into(),
            }),
        ]));
        let err = collect_trades(
            &mut source,
            &MaxEnterConfig::default(),
            &RetryPolicy::immediate(0),
        )
        .unwrap_err();
        assert!(matches!(err, SignalCheckError::Exchange { .. }));
    }
}
