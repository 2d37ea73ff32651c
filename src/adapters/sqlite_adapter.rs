//! SQLite market data adapter.
//!
//! Candlesticks and trades live in one database shared by every exchange.
//! Sources read a page at a time and take a pooled connection only while a
//! page is being fetched.

use crate::domain::error::SignalCheckError;
use crate::domain::market::{Candlestick, MarketPair, Trade};
use crate::ports::config_port::ConfigPort;
use crate::ports::exchange_port::{CandlestickSource, ExchangePort, Fetched, TradeSource};
use chrono::{DateTime, Utc};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{Connection, params};
use std::collections::VecDeque;
use tracing::debug;

const DEFAULT_PAGE_SIZE: usize = 500;

fn pool_error(e: r2d2::Error) -> SignalCheckError {
    SignalCheckError::Database {
        reason: e.to_string(),
    }
}

fn query_error(e: rusqlite::Error) -> SignalCheckError {
    SignalCheckError::DatabaseQuery {
        reason: e.to_string(),
    }
}

fn from_millis(ms: i64) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms).ok_or(rusqlite::Error::IntegralValueOutOfRange(1, ms))
}

#[derive(Clone)]
pub struct SqliteStore {
    pool: Pool<SqliteConnectionManager>,
}

impl SqliteStore {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, SignalCheckError> {
        let db_path =
            config
                .get_string("sqlite", "path")
                .ok_or_else(|| SignalCheckError::ConfigMissing {
                    section: "sqlite".into(),
                    key: "path".into(),
                })?;

        let pool_size = config.get_int("sqlite", "pool_size", 4).max(1) as u32;

        let manager = SqliteConnectionManager::file(&db_path);
        let pool = Pool::builder()
            .max_size(pool_size)
            .build(manager)
            .map_err(pool_error)?;

        Ok(Self { pool })
    }

    pub fn in_memory() -> Result<Self, SignalCheckError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(pool_error)?;

        Ok(Self { pool })
    }

    pub fn initialize_schema(&self) -> Result<(), SignalCheckError> {
        let conn = self.pool.get().map_err(pool_error)?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS candlesticks (
                id INTEGER PRIMARY KEY,
                exchange TEXT NOT NULL,
                base TEXT NOT NULL,
                quote TEXT NOT NULL,
                timestamp_ms INTEGER NOT NULL,
                open REAL NOT NULL,
                high REAL NOT NULL,
                low REAL NOT NULL,
                close REAL NOT NULL,
                volume REAL NOT NULL DEFAULT 0,
                trade_count INTEGER NOT NULL DEFAULT 0,
                UNIQUE (exchange, base, quote, timestamp_ms)
            );
            CREATE TABLE IF NOT EXISTS trades (
                id INTEGER PRIMARY KEY,
                exchange TEXT NOT NULL,
                base TEXT NOT NULL,
                quote TEXT NOT NULL,
                timestamp_ms INTEGER NOT NULL,
                price REAL NOT NULL,
                quantity REAL NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_trades_pair_time
                ON trades(exchange, base, quote, timestamp_ms, id);",
        )
        .map_err(query_error)?;

        Ok(())
    }

    pub fn insert_candlesticks(
        &self,
        exchange: &str,
        pair: &MarketPair,
        candlesticks: &[Candlestick],
    ) -> Result<(), SignalCheckError> {
        let mut conn = self.pool.get().map_err(pool_error)?;
        let tx = conn.transaction().map_err(query_error)?;

        for candle in candlesticks {
            tx.execute(
                "INSERT OR REPLACE INTO candlesticks
                    (exchange, base, quote, timestamp_ms, open, high, low, close, volume, trade_count)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    exchange,
                    pair.base,
                    pair.quote,
                    candle.timestamp.timestamp_millis(),
                    candle.open,
                    candle.high,
                    candle.low,
                    candle.close,
                    candle.volume,
                    candle.trade_count as i64
                ],
            )
            .map_err(query_error)?;
        }

        tx.commit().map_err(query_error)?;
        Ok(())
    }

    pub fn insert_trades(
        &self,
        exchange: &str,
        pair: &MarketPair,
        trades: &[Trade],
    ) -> Result<(), SignalCheckError> {
        let mut conn = self.pool.get().map_err(pool_error)?;
        let tx = conn.transaction().map_err(query_error)?;

        for trade in trades {
            tx.execute(
                "INSERT INTO trades (exchange, base, quote, timestamp_ms, price, quantity)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    exchange,
                    pair.base,
                    pair.quote,
                    trade.timestamp.timestamp_millis(),
                    trade.price,
                    trade.quantity
                ],
            )
            .map_err(query_error)?;
        }

        tx.commit().map_err(query_error)?;
        Ok(())
    }

    /// Exchange names with at least one stored candlestick.
    pub fn list_exchanges(&self) -> Result<Vec<String>, SignalCheckError> {
        let conn = self.pool.get().map_err(pool_error)?;
        let mut stmt = conn
            .prepare("SELECT DISTINCT exchange FROM candlesticks ORDER BY exchange")
            .map_err(query_error)?;
        let rows = stmt.query_map([], |row| row.get(0)).map_err(query_error)?;

        let mut names = Vec::new();
        for row in rows {
            names.push(row.map_err(query_error)?);
        }
        Ok(names)
    }

    /// View of the store restricted to one exchange.
    pub fn exchange(&self, name: &str) -> SqliteExchange {
        SqliteExchange {
            pool: self.pool.clone(),
            exchange: name.to_lowercase(),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

#[derive(Clone)]
pub struct SqliteExchange {
    pool: Pool<SqliteConnectionManager>,
    exchange: String,
    page_size: usize,
}

impl SqliteExchange {
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    fn source<R: PagedRow>(&self, pair: &MarketPair, start: DateTime<Utc>) -> PagedSource<R> {
        PagedSource {
            pool: self.pool.clone(),
            exchange: self.exchange.clone(),
            pair: pair.clone(),
            cursor: (start.timestamp_millis(), i64::MIN),
            buffer: VecDeque::new(),
            page_size: self.page_size,
            pages: 0,
            exhausted: false,
        }
    }
}

impl ExchangePort for SqliteExchange {
    fn candlesticks(
        &self,
        pair: &MarketPair,
        start: DateTime<Utc>,
    ) -> Box<dyn CandlestickSource + '_> {
        Box::new(self.source::<Candlestick>(pair, start))
    }

    fn trades(&self, pair: &MarketPair, start: DateTime<Utc>) -> Box<dyn TradeSource + '_> {
        Box::new(self.source::<Trade>(pair, start))
    }
}

/// A table row type readable in `(timestamp_ms, id)` order.
trait PagedRow: Sized {
    const PAGE_QUERY: &'static str;
    const EXISTS_QUERY: &'static str;

    /// Returns the row's `(timestamp_ms, id)` cursor along with the value.
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<((i64, i64), Self)>;
}

impl PagedRow for Candlestick {
    const PAGE_QUERY: &'static str = "SELECT id, timestamp_ms, open, high, low, close, volume, trade_count
         FROM candlesticks
         WHERE exchange = ?1 AND base = ?2 AND quote = ?3
           AND (timestamp_ms > ?4 OR (timestamp_ms = ?4 AND id > ?5))
         ORDER BY timestamp_ms, id
         LIMIT ?6";
    const EXISTS_QUERY: &'static str =
        "SELECT EXISTS(SELECT 1 FROM candlesticks WHERE exchange = ?1 AND base = ?2 AND quote = ?3)";

    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<((i64, i64), Self)> {
        let id: i64 = row.get(0)?;
        let ms: i64 = row.get(1)?;
        let trade_count: i64 = row.get(7)?;
        Ok((
            (ms, id),
            Candlestick {
                timestamp: from_millis(ms)?,
                open: row.get(2)?,
                high: row.get(3)?,
                low: row.get(4)?,
                close: row.get(5)?,
                volume: row.get(6)?,
                trade_count: trade_count.max(0) as u64,
            },
        ))
    }
}

impl PagedRow for Trade {
    const PAGE_QUERY: &'static str = "SELECT id, timestamp_ms, price, quantity
         FROM trades
         WHERE exchange = ?1 AND base = ?2 AND quote = ?3
           AND (timestamp_ms > ?4 OR (timestamp_ms = ?4 AND id > ?5))
         ORDER BY timestamp_ms, id
         LIMIT ?6";
    const EXISTS_QUERY: &'static str =
        "SELECT EXISTS(SELECT 1 FROM trades WHERE exchange = ?1 AND base = ?2 AND quote = ?3)";

    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<((i64, i64), Self)> {
        let id: i64 = row.get(0)?;
        let ms: i64 = row.get(1)?;
        Ok((
            (ms, id),
            Trade {
                timestamp: from_millis(ms)?,
                price: row.get(2)?,
                quantity: row.get(3)?,
            },
        ))
    }
}

struct PagedSource<R> {
    pool: Pool<SqliteConnectionManager>,
    exchange: String,
    pair: MarketPair,
    cursor: (i64, i64),
    buffer: VecDeque<R>,
    page_size: usize,
    pages: usize,
    exhausted: bool,
}

impl<R: PagedRow> PagedSource<R> {
    fn pull(&mut self) -> Fetched<R> {
        if let Some(item) = self.buffer.pop_front() {
            return Fetched::Item(item);
        }
        if self.exhausted {
            return Fetched::Exhausted;
        }
        match self.fetch_page() {
            Ok(()) => match self.buffer.pop_front() {
                Some(item) => Fetched::Item(item),
                None => Fetched::Exhausted,
            },
            Err(error) => Fetched::Failed(error),
        }
    }

    fn fetch_page(&mut self) -> Result<(), SignalCheckError> {
        let conn = self.pool.get().map_err(pool_error)?;
        let rows = self.query_page(&conn).map_err(query_error)?;
        self.pages += 1;

        if rows.is_empty() {
            self.exhausted = true;
            if self.pages == 1 && !self.pair_exists(&conn).map_err(query_error)? {
                return Err(SignalCheckError::InvalidMarketPair {
                    pair: self.pair.to_string(),
                });
            }
            return Ok(());
        }
        if rows.len() < self.page_size {
            self.exhausted = true;
        }
        debug!(pair = %self.pair, rows = rows.len(), page = self.pages, "fetched page");
        for (cursor, item) in rows {
            self.cursor = cursor;
            self.buffer.push_back(item);
        }
        Ok(())
    }

    fn query_page(&self, conn: &Connection) -> rusqlite::Result<Vec<((i64, i64), R)>> {
        let mut stmt = conn.prepare_cached(R::PAGE_QUERY)?;
        let rows = stmt.query_map(
            params![
                self.exchange,
                self.pair.base,
                self.pair.quote,
                self.cursor.0,
                self.cursor.1,
                self.page_size as i64
            ],
            R::from_row,
        )?;
        rows.collect()
    }

    fn pair_exists(&self, conn: &Connection) -> rusqlite::Result<bool> {
        conn.query_row(
            R::EXISTS_QUERY,
            params![self.exchange, self.pair.base, self.pair.quote],
            |row| row.get(0),
        )
    }
}

impl CandlestickSource for PagedSource<Candlestick> {
    fn next_candlestick(&mut self) -> Fetched<Candlestick> {
        self.pull()
    }
}

impl TradeSource for PagedSource<Trade> {
    fn next_trade(&mut self) -> Fetched<Trade> {
        self.pull()
    }
}
