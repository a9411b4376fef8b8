//! CSV price reader and trade log writer.
//!
//! Price files live at `{base}/{SYMBOL}.csv` with a header row. Columns are
//! located by name: a timestamp column (`datetime`, `timestamp` or `date`)
//! and `close` are required; `open`, `high`, `low` and `volume` are read
//! when present.

use crate::domain::error::MeanRevertError;
use crate::domain::price::{is_tradable_price, PricePoint};
use crate::domain::signal::AnnotatedPoint;
use crate::domain::trade::Trade;
use crate::ports::data_port::DataPort;
use crate::ports::trade_sink::TradeSink;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

const TIMESTAMP_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"];
const TRADES_SUFFIX: &str = "_trades.csv";
const SIGNALS_SUFFIX: &str = "_signals.csv";

pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, symbol: &str) -> PathBuf {
        self.base_path.join(format!("{}.csv", symbol))
    }
}

fn data_error(reason: impl Into<String>) -> MeanRevertError {
    MeanRevertError::DataSource {
        reason: reason.into(),
    }
}

/// Parse a price timestamp. Offsets are dropped, keeping exchange-local
/// wall-clock time.
pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .or_else(|| {
            DateTime::parse_from_rfc3339(value)
                .ok()
                .map(|dt| dt.naive_local())
        })
}

struct Columns {
    timestamp: usize,
    close: usize,
    open: Option<usize>,
    high: Option<usize>,
    low: Option<usize>,
    volume: Option<usize>,
}

impl Columns {
    fn locate(headers: &csv::StringRecord) -> Result<Self, MeanRevertError> {
        let find = |names: &[&str]| {
            headers
                .iter()
                .position(|h| names.iter().any(|n| h.trim().eq_ignore_ascii_case(n)))
        };
        Ok(Columns {
            timestamp: find(&["datetime", "timestamp", "date"])
                .ok_or_else(|| data_error("missing datetime column"))?,
            close: find(&["close"]).ok_or_else(|| data_error("missing close column"))?,
            open: find(&["open"]),
            high: find(&["high"]),
            low: find(&["low"]),
            volume: find(&["volume"]),
        })
    }
}

fn optional_field<T: std::str::FromStr>(
    record: &csv::StringRecord,
    column: Option<usize>,
) -> Option<T> {
    column
        .and_then(|i| record.get(i))
        .and_then(|s| s.trim().parse().ok())
}

impl DataPort for CsvAdapter {
    fn fetch_prices(
        &self,
        symbol: &str,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<Vec<PricePoint>, MeanRevertError> {
        let path = self.csv_path(symbol);
        let content = fs::read_to_string(&path)
            .map_err(|e| data_error(format!("failed to read {}: {}", path.display(), e)))?;

        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(content.as_bytes());
        let headers = rdr
            .headers()
            .map_err(|e| data_error(format!("CSV header error: {}", e)))?
            .clone();
        let columns = Columns::locate(&headers)?;

        let mut points = Vec::new();
        for result in rdr.records() {
            let record = result.map_err(|e| data_error(format!("CSV parse error: {}", e)))?;

            let raw_ts = record
                .get(columns.timestamp)
                .ok_or_else(|| data_error("missing datetime value"))?;
            let timestamp = parse_timestamp(raw_ts)
                .ok_or_else(|| data_error(format!("invalid datetime '{}'", raw_ts)))?;

            let date = timestamp.date();
            if start.is_some_and(|s| date < s) || end.is_some_and(|e| date > e) {
                continue;
            }

            let close: f64 = record
                .get(columns.close)
                .ok_or_else(|| data_error("missing close value"))?
                .parse()
                .map_err(|e| data_error(format!("invalid close value: {}", e)))?;
            if !is_tradable_price(close) {
                return Err(data_error(format!(
                    "invalid close {} at {} in {}",
                    close,
                    raw_ts,
                    path.display()
                )));
            }

            points.push(PricePoint {
                timestamp,
                close,
                open: optional_field(&record, columns.open),
                high: optional_field(&record, columns.high),
                low: optional_field(&record, columns.low),
                volume: optional_field(&record, columns.volume),
            });
        }

        points.sort_by_key(|p| p.timestamp);
        debug!(symbol, points = points.len(), path = %path.display(), "loaded prices");
        Ok(points)
    }

    fn list_symbols(&self) -> Result<Vec<String>, MeanRevertError> {
        let entries = fs::read_dir(&self.base_path).map_err(|e| {
            data_error(format!(
                "failed to read directory {}: {}",
                self.base_path.display(),
                e
            ))
        })?;

        let mut symbols = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| data_error(format!("directory entry error: {}", e)))?;
            let name = entry.file_name();
            let name = name.to_string_lossy();

            if name.ends_with(TRADES_SUFFIX) || name.ends_with(SIGNALS_SUFFIX) {
                continue;
            }
            if let Some(symbol) = name.strip_suffix(".csv") {
                symbols.push(symbol.to_string());
            }
        }

        symbols.sort();
        Ok(symbols)
    }
}

/// Writes one `{SYMBOL}_trades.csv` per symbol into a directory.
pub struct CsvTradeLog {
    dir: PathBuf,
}

impl CsvTradeLog {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn path_for(&self, symbol: &str) -> PathBuf {
        self.dir.join(format!("{}{}", symbol, TRADES_SUFFIX))
    }
}

fn write_error(path: &Path, e: impl std::fmt::Display) -> MeanRevertError {
    MeanRevertError::Io(std::io::Error::other(format!(
        "failed to write {}: {}",
        path.display(),
        e
    )))
}

impl TradeSink for CsvTradeLog {
    fn record(&self, symbol: &str, trades: &[Trade]) -> Result<(), MeanRevertError> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(symbol);
        let mut wtr = csv::Writer::from_path(&path).map_err(|e| write_error(&path, e))?;

        wtr.write_record(["type", "time", "price", "qty", "capital_after"])
            .map_err(|e| write_error(&path, e))?;
        for trade in trades {
            wtr.write_record([
                trade.kind.to_string(),
                trade.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
                trade.price.to_string(),
                trade.quantity.to_string(),
                trade.capital_after.to_string(),
            ])
            .map_err(|e| write_error(&path, e))?;
        }
        wtr.flush()?;
        debug!(symbol, trades = trades.len(), path = %path.display(), "wrote trade log");
        Ok(())
    }
}

fn opt(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

/// Write an annotated series; undefined statistics are left blank.
pub fn write_annotated(path: &Path, points: &[AnnotatedPoint]) -> Result<(), MeanRevertError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut wtr = csv::Writer::from_path(path).map_err(|e| write_error(path, e))?;
    wtr.write_record(["datetime", "close", "sma", "std", "z_score", "signal"])
        .map_err(|e| write_error(path, e))?;
    for p in points {
        wtr.write_record([
            p.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
            p.close.to_string(),
            opt(p.sma),
            opt(p.std),
            opt(p.z_score),
            p.signal.to_string(),
        ])
        .map_err(|e| write_error(path, e))?;
    }
    wtr.flush()?;
    Ok(())
}
