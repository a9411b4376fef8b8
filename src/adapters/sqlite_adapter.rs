//! SQLite price source and trade log store.
//!
//! Timestamps are stored as `YYYY-MM-DD HH:MM:SS` text so that string order
//! is time order.

use crate::domain::config_validation::read_int;
use crate::domain::error::MeanRevertError;
use crate::domain::price::{is_tradable_price, PricePoint};
use crate::domain::trade::{Trade, TradeKind};
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;
use crate::ports::trade_sink::TradeSink;
use chrono::{NaiveDate, NaiveDateTime};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;
use tracing::debug;

const TS_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub struct SqliteAdapter {
    pool: Pool<SqliteConnectionManager>,
}

fn db_error(e: impl std::fmt::Display) -> MeanRevertError {
    MeanRevertError::Database {
        reason: e.to_string(),
    }
}

fn parse_ts(value: String) -> rusqlite::Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(&value, TS_FORMAT).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(
            value.len(),
            rusqlite::types::Type::Text,
            Box::new(e),
        )
    })
}

impl SqliteAdapter {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, MeanRevertError> {
        let db_path =
            config
                .get_string("sqlite", "path")
                .ok_or_else(|| MeanRevertError::ConfigMissing {
                    section: "sqlite".into(),
                    key: "path".into(),
                })?;

        let pool_size = u32::try_from(read_int(config, "sqlite", "pool_size", 4)?)
            .ok()
            .filter(|n| *n >= 1)
            .ok_or_else(|| MeanRevertError::ConfigInvalid {
                section: "sqlite".into(),
                key: "pool_size".into(),
                reason: "pool_size must be at least 1".into(),
            })?;

        let manager = SqliteConnectionManager::file(&db_path);
        let pool = Pool::builder()
            .max_size(pool_size)
            .build(manager)
            .map_err(db_error)?;

        let adapter = Self { pool };
        adapter.initialize_schema()?;
        Ok(adapter)
    }

    pub fn in_memory() -> Result<Self, MeanRevertError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(db_error)?;

        Ok(Self { pool })
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, MeanRevertError> {
        self.pool.get().map_err(db_error)
    }

    pub fn initialize_schema(&self) -> Result<(), MeanRevertError> {
        self.conn()?
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS prices (
                    symbol TEXT NOT NULL,
                    ts TEXT NOT NULL,
                    open REAL,
                    high REAL,
                    low REAL,
                    close REAL NOT NULL,
                    volume INTEGER,
                    PRIMARY KEY (symbol, ts)
                );
                CREATE TABLE IF NOT EXISTS trades (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    symbol TEXT NOT NULL,
                    kind TEXT NOT NULL,
                    ts TEXT NOT NULL,
                    price REAL NOT NULL,
                    qty INTEGER NOT NULL,
                    capital_after REAL NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_trades_symbol ON trades(symbol);",
            )
            .map_err(db_error)
    }

    pub fn insert_prices(&self, symbol: &str, points: &[PricePoint]) -> Result<(), MeanRevertError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(db_error)?;

        for p in points {
            tx.execute(
                "INSERT OR REPLACE INTO prices (symbol, ts, open, high, low, close, volume)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    symbol,
                    p.timestamp.format(TS_FORMAT).to_string(),
                    p.open,
                    p.high,
                    p.low,
                    p.close,
                    p.volume
                ],
            )
            .map_err(db_error)?;
        }

        tx.commit().map_err(db_error)
    }

    /// Trades previously stored for `symbol`, in execution order.
    pub fn fetch_trades(&self, symbol: &str) -> Result<Vec<Trade>, MeanRevertError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT kind, ts, price, qty, capital_after FROM trades
                 WHERE symbol = ?1 ORDER BY id ASC",
            )
            .map_err(db_error)?;

        let rows = stmt
            .query_map(params![symbol], |row| {
                let kind: String = row.get(0)?;
                Ok((
                    kind,
                    parse_ts(row.get(1)?)?,
                    row.get::<_, f64>(2)?,
                    row.get::<_, i64>(3)?,
                    row.get::<_, f64>(4)?,
                ))
            })
            .map_err(db_error)?;

        let mut trades = Vec::new();
        for row in rows {
            let (kind, timestamp, price, quantity, capital_after) = row.map_err(db_error)?;
            let kind = TradeKind::parse(&kind)
                .ok_or_else(|| db_error(format!("unknown trade kind '{kind}'")))?;
            trades.push(Trade {
                kind,
                timestamp,
                price,
                quantity,
                capital_after,
            });
        }
        Ok(trades)
    }
}

impl DataPort for SqliteAdapter {
    fn fetch_prices(
        &self,
        symbol: &str,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<Vec<PricePoint>, MeanRevertError> {
        let conn = self.conn()?;

        let lower = start
            .map(|d| format!("{} 00:00:00", d.format("%Y-%m-%d")))
            .unwrap_or_default();
        let upper = end
            .map(|d| format!("{} 23:59:59", d.format("%Y-%m-%d")))
            .unwrap_or_else(|| "9999-12-31 23:59:59".to_string());

        let mut stmt = conn
            .prepare(
                "SELECT ts, open, high, low, close, volume FROM prices
                 WHERE symbol = ?1 AND ts >= ?2 AND ts <= ?3
                 ORDER BY ts ASC",
            )
            .map_err(db_error)?;

        let rows = stmt
            .query_map(params![symbol, lower, upper], |row| {
                Ok(PricePoint {
                    timestamp: parse_ts(row.get(0)?)?,
                    open: row.get(1)?,
                    high: row.get(2)?,
                    low: row.get(3)?,
                    close: row.get(4)?,
                    volume: row.get(5)?,
                })
            })
            .map_err(db_error)?;

        let mut points = Vec::new();
        for row in rows {
            let point = row.map_err(db_error)?;
            if !is_tradable_price(point.close) {
                return Err(MeanRevertError::DataSource {
                    reason: format!(
                        "invalid close {} for {} at {}",
                        point.close,
                        symbol,
                        point.timestamp.format(TS_FORMAT)
                    ),
                });
            }
            points.push(point);
        }
        debug!(symbol, points = points.len(), "loaded prices from sqlite");
        Ok(points)
    }

    fn list_symbols(&self) -> Result<Vec<String>, MeanRevertError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT DISTINCT symbol FROM prices ORDER BY symbol")
            .map_err(db_error)?;

        let rows = stmt.query_map([], |row| row.get(0)).map_err(db_error)?;

        let mut symbols = Vec::new();
        for row in rows {
            symbols.push(row.map_err(db_error)?);
        }
        Ok(symbols)
    }
}

impl TradeSink for SqliteAdapter {
    /// Replaces any trades already stored for `symbol`.
    fn record(&self, symbol: &str, trades: &[Trade]) -> Result<(), MeanRevertError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(db_error)?;

        tx.execute("DELETE FROM trades WHERE symbol = ?1", params![symbol])
            .map_err(db_error)?;
        for t in trades {
            tx.execute(
                "INSERT INTO trades (symbol, kind, ts, price, qty, capital_after)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    symbol,
                    t.kind.to_string(),
                    t.timestamp.format(TS_FORMAT).to_string(),
                    t.price,
                    t.quantity,
                    t.capital_after
                ],
            )
            .map_err(db_error)?;
        }

        tx.commit().map_err(db_error)?;
        debug!(symbol, trades = trades.len(), "persisted trades");
        Ok(())
    }
}
