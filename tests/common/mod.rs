#![allow(dead_code)]

use chrono::{DateTime, Utc};
use signalcheck::adapters::memory_adapter::InMemoryExchange;
use signalcheck::domain::checker::CheckOptions;
use signalcheck::domain::market::{Candlestick, MarketPair, Trade};
use signalcheck::domain::retry::RetryPolicy;
use signalcheck::domain::signal::Signal;
use signalcheck::ports::exchange_port::ExchangeRegistry;

pub const START: i64 = 1_600_000_000;

pub fn at(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap()
}

/// Candle `minute` minutes after [`START`].
pub fn candle(minute: i64, low: f64, high: f64) -> Candlestick {
    Candlestick {
        timestamp: at(START + minute * 60),
        open: low,
        high,
        low,
        close: high,
        volume: 10.0,
        trade_count: 5,
    }
}

pub fn flat(minute: i64, price: f64) -> Candlestick {
    candle(minute, price, price)
}

pub fn trade(secs_after_start: i64, price: f64, quantity: f64) -> Trade {
    Trade {
        timestamp: at(START + secs_after_start),
        price,
        quantity,
    }
}

pub fn eth_usdt() -> MarketPair {
    MarketPair::new("ETH", "USDT")
}

/// Long ETH/USDT with one entry zone between 1 and 2.
pub fn long_signal() -> Signal {
    Signal {
        base_asset: "ETH".into(),
        quote_asset: "USDT".into(),
        entries: vec![2.0, 1.0],
        take_profits: vec![5.0, 6.0],
        take_profit_ratios: vec![0.5, 0.5],
        initial_time: Some(at(START)),
        dont_calculate_max_enter_usd: true,
        ..Signal::default()
    }
}

pub fn options() -> CheckOptions {
    CheckOptions {
        retry: RetryPolicy::immediate(3),
        ..CheckOptions::default()
    }
}

pub fn registry(exchange: InMemoryExchange) -> ExchangeRegistry {
    ExchangeRegistry::new().with("binance", exchange)
}

pub fn exchange_with(candles: Vec<Candlestick>) -> InMemoryExchange {
    InMemoryExchange::new().with_candlesticks(eth_usdt(), candles)
}
