//! Configuration validation.
//!
//! Validates all config fields before any market data is touched. Each
//! check reports the first offending key.

use crate::domain::backtest::ExitPolicy;
use crate::domain::error::MeanRevertError;
use crate::domain::signal::SignalMode;
use crate::domain::universe::parse_symbols;
use crate::ports::config_port::ConfigPort;
use chrono::{NaiveDate, NaiveTime};

pub fn validate_strategy_config(config: &dyn ConfigPort) -> Result<(), MeanRevertError> {
    validate_window(config)?;
    validate_z_entry(config)?;
    validate_signal_mode(config)?;
    validate_exit_policy(config)?;
    validate_max_concurrent_positions(config)?;
    validate_min_entry_cash(config)?;
    Ok(())
}

pub fn validate_backtest_config(config: &dyn ConfigPort) -> Result<(), MeanRevertError> {
    validate_initial_capital(config)?;
    validate_max_trade_capital(config)?;
    validate_capital_decimals(config)?;
    parse_cutoff(config)?;
    validate_dates(config)?;
    validate_symbols(config)?;
    Ok(())
}

pub fn validate_data_config(config: &dyn ConfigPort) -> Result<(), MeanRevertError> {
    let source = config
        .get_string("data", "source")
        .unwrap_or_else(|| "csv".to_string());
    match source.trim().to_lowercase().as_str() {
        "csv" => match config.get_string("data", "csv_dir") {
            Some(s) if !s.trim().is_empty() => {}
            _ => return Err(missing("data", "csv_dir")),
        },
        "sqlite" => match config.get_string("sqlite", "path") {
            Some(s) if !s.trim().is_empty() => {}
            _ => return Err(missing("sqlite", "path")),
        },
        other => {
            return Err(invalid(
                "data",
                "source",
                format!("unknown data source '{other}' (expected csv or sqlite)"),
            ));
        }
    }

    let start = parse_time_key(config, "data", "session_start")?;
    let end = parse_time_key(config, "data", "session_end")?;
    if let (Some(start), Some(end)) = (start, end) {
        if start >= end {
            return Err(invalid(
                "data",
                "session_start",
                "session_start must be before session_end",
            ));
        }
    }
    Ok(())
}

pub fn validate_all(config: &dyn ConfigPort) -> Result<(), MeanRevertError> {
    validate_strategy_config(config)?;
    validate_backtest_config(config)?;
    validate_data_config(config)?;
    Ok(())
}

fn missing(section: &str, key: &str) -> MeanRevertError {
    MeanRevertError::ConfigMissing {
        section: section.to_string(),
        key: key.to_string(),
    }
}

fn invalid(section: &str, key: &str, reason: impl Into<String>) -> MeanRevertError {
    MeanRevertError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.into(),
    }
}

/// Read an integer key. A missing or empty value gives `default`; any other
/// value must parse.
pub fn read_int(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: i64,
) -> Result<i64, MeanRevertError> {
    match config.get_string(section, key) {
        Some(s) if !s.trim().is_empty() => s
            .trim()
            .parse::<i64>()
            .map_err(|_| invalid(section, key, format!("'{}' is not an integer", s.trim()))),
        _ => Ok(default),
    }
}

/// Read a finite float key. A missing or empty value gives `default`.
pub fn read_double(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: f64,
) -> Result<f64, MeanRevertError> {
    match config.get_string(section, key) {
        Some(s) if !s.trim().is_empty() => s
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| invalid(section, key, format!("'{}' is not a number", s.trim()))),
        _ => Ok(default),
    }
}

fn validate_window(config: &dyn ConfigPort) -> Result<(), MeanRevertError> {
    let value = read_int(config, "strategy", "window", 20)?;
    if value <= 1 {
        return Err(invalid(
            "strategy",
            "window",
            "window must be greater than 1",
        ));
    }
    Ok(())
}

fn validate_z_entry(config: &dyn ConfigPort) -> Result<(), MeanRevertError> {
    let value = read_double(config, "strategy", "z_entry", 1.0)?;
    if value <= 0.0 {
        return Err(invalid("strategy", "z_entry", "z_entry must be positive"));
    }
    Ok(())
}

fn validate_signal_mode(config: &dyn ConfigPort) -> Result<(), MeanRevertError> {
    if let Some(s) = config.get_string("strategy", "signal_mode") {
        s.parse::<SignalMode>()
            .map_err(|reason| invalid("strategy", "signal_mode", reason))?;
    }
    Ok(())
}

fn validate_exit_policy(config: &dyn ConfigPort) -> Result<(), MeanRevertError> {
    let policy = match config.get_string("strategy", "exit_policy") {
        Some(s) => s
            .parse::<ExitPolicy>()
            .map_err(|reason| invalid("strategy", "exit_policy", reason))?,
        None => ExitPolicy::default(),
    };
    if policy == ExitPolicy::ThresholdReversion {
        let value = read_double(config, "strategy", "z_exit_threshold", 0.3)?;
        if value <= 0.0 {
            return Err(invalid(
                "strategy",
                "z_exit_threshold",
                "z_exit_threshold must be positive",
            ));
        }
    }
    Ok(())
}

fn validate_max_concurrent_positions(config: &dyn ConfigPort) -> Result<(), MeanRevertError> {
    let value = read_int(config, "strategy", "max_concurrent_positions", 1)?;
    if value < 1 {
        return Err(invalid(
            "strategy",
            "max_concurrent_positions",
            "max_concurrent_positions must be at least 1",
        ));
    }
    Ok(())
}

fn validate_min_entry_cash(config: &dyn ConfigPort) -> Result<(), MeanRevertError> {
    let value = read_double(config, "strategy", "min_entry_cash", 1_000.0)?;
    if value < 0.0 {
        return Err(invalid(
            "strategy",
            "min_entry_cash",
            "min_entry_cash must be non-negative",
        ));
    }
    Ok(())
}

fn validate_initial_capital(config: &dyn ConfigPort) -> Result<(), MeanRevertError> {
    let value = read_double(config, "backtest", "initial_capital", 50_000.0)?;
    if value <= 0.0 {
        return Err(invalid(
            "backtest",
            "initial_capital",
            "initial_capital must be positive",
        ));
    }
    Ok(())
}

fn validate_max_trade_capital(config: &dyn ConfigPort) -> Result<(), MeanRevertError> {
    let value = read_double(config, "backtest", "max_trade_capital", 10_000.0)?;
    if value <= 0.0 {
        return Err(invalid(
            "backtest",
            "max_trade_capital",
            "max_trade_capital must be positive",
        ));
    }
    Ok(())
}

fn validate_capital_decimals(config: &dyn ConfigPort) -> Result<(), MeanRevertError> {
    let value = read_int(config, "backtest", "capital_decimals", 2)?;
    if !(0..=10).contains(&value) {
        return Err(invalid(
            "backtest",
            "capital_decimals",
            "capital_decimals must be between 0 and 10",
        ));
    }
    Ok(())
}

fn validate_dates(config: &dyn ConfigPort) -> Result<(), MeanRevertError> {
    let (start, end) = parse_date_range(config)?;
    if let (Some(start), Some(end)) = (start, end) {
        if start > end {
            return Err(invalid(
                "backtest",
                "start",
                "start must not be after end",
            ));
        }
    }
    Ok(())
}

fn validate_symbols(config: &dyn ConfigPort) -> Result<(), MeanRevertError> {
    match config.get_string("backtest", "symbols") {
        Some(s) if !s.trim().is_empty() => parse_symbols(&s)
            .map(|_| ())
            .map_err(|e| invalid("backtest", "symbols", e.to_string())),
        _ => Err(missing("backtest", "symbols")),
    }
}

/// Parse an `HH:MM` (or `HH:MM:SS`) clock time.
pub fn parse_clock(value: &str) -> Option<NaiveTime> {
    let value = value.trim();
    NaiveTime::parse_from_str(value, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M:%S"))
        .ok()
}

/// Read an optional clock time. Empty values and `none` mean unset.
pub fn parse_time_key(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<Option<NaiveTime>, MeanRevertError> {
    match config.get_string(section, key) {
        None => Ok(None),
        Some(s) if s.trim().is_empty() || s.trim().eq_ignore_ascii_case("none") => Ok(None),
        Some(s) => parse_clock(&s)
            .map(Some)
            .ok_or_else(|| invalid(section, key, format!("invalid time '{s}', expected HH:MM"))),
    }
}

pub fn parse_cutoff(config: &dyn ConfigPort) -> Result<Option<NaiveTime>, MeanRevertError> {
    parse_time_key(config, "backtest", "forced_liquidation_time")
}

fn parse_date_key(config: &dyn ConfigPort, key: &str) -> Result<Option<NaiveDate>, MeanRevertError> {
    match config.get_string("backtest", key) {
        None => Ok(None),
        Some(s) if s.trim().is_empty() => Ok(None),
        Some(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
            .map(Some)
            .map_err(|_| invalid("backtest", key, format!("invalid {key} format, expected YYYY-MM-DD"))),
    }
}

pub fn parse_date_range(
    config: &dyn ConfigPort,
) -> Result<(Option<NaiveDate>, Option<NaiveDate>), MeanRevertError> {
    Ok((parse_date_key(config, "start")?, parse_date_key(config, "end")?))
}
