//! USD price resolution for a base asset at a point in time.

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::domain::error::SignalCheckError;
use crate::domain::market::MarketPair;
use crate::domain::retry::RetryPolicy;
use crate::ports::exchange_port::{CandlestickSource, ExchangePort, Fetched};

/// USD-pegged assets, in lookup order.
pub const STABLECOINS: [&str; 5] = ["USDT", "USDC", "BUSD", "DAI", "USD"];

/// Bridge assets and the stablecoin each is priced against.
pub const BRIDGES: [(&str, &str); 2] = [("BTC", "USDT"), ("BNB", "BUSD")];

pub fn is_stablecoin(asset: &str) -> bool {
    STABLECOINS.contains(&asset)
}

/// Open price of the first candlestick at or after `at`.
pub fn price_at(
    source: &mut dyn CandlestickSource,
    pair: &MarketPair,
    at: DateTime<Utc>,
    retry: &RetryPolicy,
) -> Result<f64, SignalCheckError> {
    loop {
        match retry.pull(|| source.next_candlestick()) {
            Fetched::Item(candle) if candle.timestamp < at => continue,
            Fetched::Item(candle) => return Ok(candle.open),
            Fetched::Exhausted => {
                return Err(SignalCheckError::NoPriceAt {
                    pair: pair.to_string(),
                    at: at.to_rfc3339(),
                });
            }
            Fetched::RateLimited => {
                return Err(SignalCheckError::RateLimited {
                    attempts: retry.max_attempts(),
                });
            }
            Fetched::Failed(error) => return Err(error),
        }
    }
}

fn fetch_price(
    exchange: &dyn ExchangePort,
    pair: &MarketPair,
    at: DateTime<Utc>,
    retry: &RetryPolicy,
) -> Option<f64> {
    let mut source = exchange.candlesticks(pair, at);
    match price_at(source.as_mut(), pair, at, retry) {
        Ok(price) => Some(price),
        Err(error) => {
            debug!(%pair, %error, "price lookup failed");
            None
        }
    }
}

/// USD value of one unit of `pair.base` at the time of an event.
///
/// Tries, in order: a stablecoin base, a stablecoin quote, a direct
/// base/stablecoin pair, then a two-hop lookup through a bridge asset.
pub fn resolve_usd_price(
    exchange: &dyn ExchangePort,
    pair: &MarketPair,
    event_price: f64,
    at: DateTime<Utc>,
    retry: &RetryPolicy,
) -> Result<f64, SignalCheckError> {
    if is_stablecoin(&pair.base) {
        return Ok(event_price);
    }
    if is_stablecoin(&pair.quote) {
        return Ok(1.0 / event_price);
    }

    for stablecoin in STABLECOINS {
        let direct = MarketPair::new(pair.base.as_str(), stablecoin);
        if let Some(price) = fetch_price(exchange, &direct, at, retry) {
            return Ok(price);
        }
    }

    for (bridge, stablecoin) in BRIDGES {
        if pair.base == bridge {
            continue;
        }
        let first_hop = MarketPair::new(pair.base.as_str(), bridge);
        let Some(first) = fetch_price(exchange, &first_hop, at, retry) else {
            continue;
        };
        let second_hop = MarketPair::new(bridge, stablecoin);
        if let Some(second) = fetch_price(exchange, &second_hop, at, retry) {
            return Ok(first * second);
        }
    }

    Err(SignalCheckError::UsdPriceUnresolved {
        asset: pair.base.clone(),
    })
}
