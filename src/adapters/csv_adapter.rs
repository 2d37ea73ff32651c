//! CSV file market data adapter.
//!
//! Layout: `<base_path>/<exchange>/<BASE>_<QUOTE>_candles.csv` with columns
//! `timestamp,open,high,low,close,volume,trade_count` and
//! `<BASE>_<QUOTE>_trades.csv` with `timestamp,price,quantity`. Timestamps
//! are unix seconds or RFC 3339.

use crate::adapters::memory_adapter::InMemoryExchange;
use crate::domain::error::SignalCheckError;
use crate::domain::market::{Candlestick, MarketPair, Trade};
use chrono::{DateTime, Utc};
use csv::StringRecord;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

const CANDLES_SUFFIX: &str = "_candles.csv";
const TRADES_SUFFIX: &str = "_trades.csv";

pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn exchange_dir(&self, exchange: &str) -> PathBuf {
        self.base_path.join(exchange)
    }

    /// Loads every pair found under the exchange directory.
    pub fn load_exchange(&self, exchange: &str) -> Result<InMemoryExchange, SignalCheckError> {
        let dir = self.exchange_dir(exchange);
        let mut store = InMemoryExchange::new();

        for pair in list_pairs(&dir)? {
            let file = format!("{}_{}", pair.base, pair.quote);
            let candles = read_candlesticks(&dir.join(format!("{file}{CANDLES_SUFFIX}")))?;
            debug!(exchange, %pair, candles = candles.len(), "loaded candlesticks");
            store.insert_candlesticks(pair.clone(), candles);

            let trades_path = dir.join(format!("{file}{TRADES_SUFFIX}"));
            if trades_path.exists() {
                store.insert_trades(pair, read_trades(&trades_path)?);
            }
        }
        Ok(store)
    }
}

fn list_pairs(dir: &Path) -> Result<Vec<MarketPair>, SignalCheckError> {
    let entries = fs::read_dir(dir).map_err(|e| SignalCheckError::Database {
        reason: format!("failed to read directory {}: {}", dir.display(), e),
    })?;

    let mut pairs = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| SignalCheckError::Database {
            reason: format!("directory entry error: {}", e),
        })?;
        let name = entry.file_name();
        let name = name.to_string_lossy();
        let Some(stem) = name.strip_suffix(CANDLES_SUFFIX) else {
            continue;
        };
        if let Some((base, quote)) = stem.split_once('_') {
            pairs.push(MarketPair::new(base.to_uppercase(), quote.to_uppercase()));
        }
    }
    pairs.sort_by(|a, b| (&a.base, &a.quote).cmp(&(&b.base, &b.quote)));
    Ok(pairs)
}

pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, SignalCheckError> {
    let value = value.trim();
    if let Ok(secs) = value.parse::<i64>() {
        return DateTime::from_timestamp(secs, 0).ok_or_else(|| SignalCheckError::Database {
            reason: format!("timestamp out of range: {value}"),
        });
    }
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| SignalCheckError::Database {
            reason: format!("invalid timestamp '{value}': {e}"),
        })
}

fn field<'r>(record: &'r StringRecord, index: usize, name: &str) -> Result<&'r str, SignalCheckError> {
    record.get(index).ok_or_else(|| SignalCheckError::Database {
        reason: format!("missing {name} column"),
    })
}

fn number(record: &StringRecord, index: usize, name: &str) -> Result<f64, SignalCheckError> {
    field(record, index, name)?
        .trim()
        .parse()
        .map_err(|e| SignalCheckError::Database {
            reason: format!("invalid {name} value: {e}"),
        })
}

fn records(path: &Path) -> Result<Vec<StringRecord>, SignalCheckError> {
    let content = fs::read_to_string(path).map_err(|e| SignalCheckError::Database {
        reason: format!("failed to read {}: {}", path.display(), e),
    })?;
    let mut rdr = csv::Reader::from_reader(content.as_bytes());
    rdr.records()
        .map(|r| {
            r.map_err(|e| SignalCheckError::Database {
                reason: format!("CSV parse error in {}: {}", path.display(), e),
            })
        })
        .collect()
}

pub fn read_candlesticks(path: &Path) -> Result<Vec<Candlestick>, SignalCheckError> {
    let mut candles = Vec::new();
    for record in records(path)? {
        candles.push(Candlestick {
            timestamp: parse_timestamp(field(&record, 0, "timestamp")?)?,
            open: number(&record, 1, "open")?,
            high: number(&record, 2, "high")?,
            low: number(&record, 3, "low")?,
            close: number(&record, 4, "close")?,
            volume: record
                .get(5)
                .map(|_| number(&record, 5, "volume"))
                .transpose()?
                .unwrap_or(0.0),
            trade_count: record
                .get(6)
                .map(|_| number(&record, 6, "trade_count"))
                .transpose()?
                .map_or(0, |n| n as u64),
        });
    }
    candles.sort_by_key(|c| c.timestamp);
    Ok(candles)
}

pub fn read_trades(path: &Path) -> Result<Vec<Trade>, SignalCheckError> {
    let mut trades = Vec::new();
    for record in records(path)? {
        trades.push(Trade {
            timestamp: parse_timestamp(field(&record, 0, "timestamp")?)?,
            price: number(&record, 1, "price")?,
            quantity: number(&record, 2, "quantity")?,
        });
    }
    trades.sort_by_key(|t| t.timestamp);
    Ok(trades)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::exchange_port::{ExchangePort, Fetched};
    use tempfile::TempDir;

    fn setup_test_data() -> (TempDir, PathBuf) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().to_path_buf();
        let binance = path.join("binance");
        fs::create_dir(&binance).unwrap();

        let candles = "timestamp,open,high,low,close,volume,trade_count\n\
            1600000120,1.5,1.8,1.4,1.7,20.0,4\n\
            1600000000,1.0,2.0,0.5,1.5,10.0,3\n\
            2020-09-13T12:28:00Z,1.7,1.9,1.6,1.8,5.0,2\n";
        fs::write(binance.join("ETH_USDT_candles.csv"), candles).unwrap();
        fs::write(
            binance.join("ETH_USDT_trades.csv"),
            "timestamp,price,quantity\n1600000000,1.0,3.5\n1600000030,1.1,0.5\n",
        )
        .unwrap();
        fs::write(
            binance.join("BTC_USDT_candles.csv"),
            "timestamp,open,high,low,close\n1600000000,10000,10100,9900,10050\n",
        )
        .unwrap();
        fs::write(binance.join("notes.txt"), "ignored").unwrap();

        (dir, path)
    }

    #[test]
    fn parses_unix_and_rfc3339_timestamps() {
        assert_eq!(parse_timestamp("60").unwrap().timestamp(), 60);
        assert_eq!(
            parse_timestamp("1970-01-01T00:02:00Z").unwrap().timestamp(),
            120
        );
        assert!(parse_timestamp("yesterday").is_err());
    }

    #[test]
    fn read_candlesticks_sorts_and_defaults_optional_columns() {
        let (_dir, path) = setup_test_data();
        let candles = read_candlesticks(&path.join("binance/ETH_USDT_candles.csv")).unwrap();
        assert_eq!(candles.len(), 3);
        assert_eq!(candles[0].timestamp.timestamp(), 1_600_000_000);
        assert_eq!(candles[0].low, 0.5);
        assert_eq!(candles[0].trade_count, 3);

        let candles = read_candlesticks(&path.join("binance/BTC_USDT_candles.csv")).unwrap();
        assert_eq!(candles[0].volume, 0.0);
        assert_eq!(candles[0].trade_count, 0);
    }

    #[test]
    fn load_exchange_registers_every_pair() {
        let (_dir, path) = setup_test_data();
        let exchange = CsvAdapter::new(path).load_exchange("binance").unwrap();
        assert_eq!(
            exchange.pairs(),
            vec![MarketPair::new("BTC", "USDT"), MarketPair::new("ETH", "USDT")]
        );

        let start = DateTime::from_timestamp(1_600_000_000, 0).unwrap();
        let mut trades = exchange.trades(&MarketPair::new("ETH", "USDT"), start);
        assert!(matches!(trades.next_trade(), Fetched::Item(t) if t.quantity == 3.5));
    }

    #[test]
    fn load_exchange_fails_for_missing_directory() {
        let (_dir, path) = setup_test_data();
        assert!(CsvAdapter::new(path).load_exchange("kraken").is_err());
    }

    #[test]
    fn malformed_number_is_reported() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("BAD_USDT_candles.csv");
        fs::write(&file, "timestamp,open,high,low,close\n0,abc,1,1,1\n").unwrap();
        let err = read_candlesticks(&file).unwrap_err();
        assert!(err.to_string().contains("invalid open value"));
    }
}
