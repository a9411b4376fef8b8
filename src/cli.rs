//! CLI definition and dispatch.

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{info, warn};

use crate::adapters::chart_svg;
use crate::adapters::console_report::{format_metrics, format_signals, format_trade_log, format_weekly};
use crate::adapters::csv_adapter::{self, CsvAdapter, CsvTradeLog};
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::backtest::{BacktestConfig, BacktestEngine, ExitPolicy};
use crate::domain::config_validation::{
    parse_cutoff, parse_date_range, parse_time_key, read_double, read_int, validate_all,
};
use crate::domain::error::MeanRevertError;
use crate::domain::metrics::{weekly_pnl, Metrics};
use crate::domain::price::{restrict_to_session, PricePoint, Session};
use crate::domain::signal::{self, SignalMode};
use crate::domain::universe::{parse_symbols, run_universe, tally, SymbolOutcome};
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;
use crate::ports::trade_sink::TradeSink;

#[derive(Parser, Debug)]
#[command(name = "meanrevert", about = "Intraday mean-reversion backtester")]
pub struct Cli {
    /// Log progress (info level)
    #[arg(short, long, global = true)]
    pub verbose: bool,
    /// Log every entry and exit (debug level)
    #[arg(short, long, global = true)]
    pub debug: bool,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a backtest over the configured symbols
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        /// Backtest only this symbol (or comma list)
        #[arg(long)]
        symbol: Option<String>,
        /// Write {SYMBOL}_trades.csv files here
        #[arg(long)]
        trade_log_dir: Option<PathBuf>,
        /// Write {SYMBOL}.svg charts here
        #[arg(long)]
        chart_dir: Option<PathBuf>,
        /// Print weekly realized P&L per symbol
        #[arg(long)]
        weekly: bool,
        #[arg(long)]
        dry_run: bool,
    },
    /// Print the annotated signal series for one symbol
    Signals {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        symbol: String,
        /// Also write the series as CSV
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// List symbols available from the configured data source
    ListSymbols {
        #[arg(short, long)]
        config: PathBuf,
    },
}

/// Where a backtest run sends its per-symbol output.
#[derive(Default)]
pub struct ReportOptions<'a> {
    pub trade_log_dir: Option<PathBuf>,
    pub chart_dir: Option<PathBuf>,
    pub weekly: bool,
    pub sink: Option<&'a dyn TradeSink>,
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Backtest {
            config,
            symbol,
            trade_log_dir,
            chart_dir,
            weekly,
            dry_run,
        } => {
            if dry_run {
                run_validate(&config)
            } else {
                run_backtest(&config, symbol.as_deref(), trade_log_dir, chart_dir, weekly)
            }
        }
        Command::Signals {
            config,
            symbol,
            output,
        } => run_signals(&config, &symbol, output.as_deref()),
        Command::Validate { config } => run_validate(&config),
        Command::ListSymbols { config } => run_list_symbols(&config),
    }
}

fn fail(err: MeanRevertError) -> ExitCode {
    eprintln!("error: {err}");
    (&err).into()
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(fail)
}

pub fn build_backtest_config(config: &dyn ConfigPort) -> Result<BacktestConfig, MeanRevertError> {
    let defaults = BacktestConfig::default();

    let signal_mode = match config.get_string("strategy", "signal_mode") {
        Some(s) => s
            .parse::<SignalMode>()
            .map_err(|reason| MeanRevertError::ConfigInvalid {
                section: "strategy".into(),
                key: "signal_mode".into(),
                reason,
            })?,
        None => defaults.signal_mode,
    };
    let exit_policy = match config.get_string("strategy", "exit_policy") {
        Some(s) => s
            .parse::<ExitPolicy>()
            .map_err(|reason| MeanRevertError::ConfigInvalid {
                section: "strategy".into(),
                key: "exit_policy".into(),
                reason,
            })?,
        None => defaults.exit_policy,
    };

    let window = read_int(config, "strategy", "window", defaults.window as i64)?;
    let max_positions = read_int(
        config,
        "strategy",
        "max_concurrent_positions",
        defaults.max_concurrent_positions as i64,
    )?;
    let decimals = read_int(
        config,
        "backtest",
        "capital_decimals",
        defaults.capital_decimals as i64,
    )?;

    Ok(BacktestConfig {
        window: non_negative("strategy", "window", window)?,
        z_entry: read_double(config, "strategy", "z_entry", defaults.z_entry)?,
        z_exit_threshold: read_double(
            config,
            "strategy",
            "z_exit_threshold",
            defaults.z_exit_threshold,
        )?,
        signal_mode,
        exit_policy,
        initial_capital: read_double(config, "backtest", "initial_capital", defaults.initial_capital)?,
        max_trade_capital: read_double(
            config,
            "backtest",
            "max_trade_capital",
            defaults.max_trade_capital,
        )?,
        max_concurrent_positions: non_negative("strategy", "max_concurrent_positions", max_positions)?,
        min_entry_cash: read_double(config, "strategy", "min_entry_cash", defaults.min_entry_cash)?,
        forced_liquidation_time: parse_cutoff(config)?,
        capital_decimals: non_negative("backtest", "capital_decimals", decimals)?,
    })
}

fn non_negative<T: TryFrom<i64>>(section: &str, key: &str, value: i64) -> Result<T, MeanRevertError> {
    T::try_from(value).map_err(|_| MeanRevertError::ConfigInvalid {
        section: section.into(),
        key: key.into(),
        reason: format!("{value} is out of range"),
    })
}

pub fn build_session(config: &dyn ConfigPort) -> Result<Session, MeanRevertError> {
    let nse = Session::nse();
    Ok(Session {
        start: parse_time_key(config, "data", "session_start")?.unwrap_or(nse.start),
        end: parse_time_key(config, "data", "session_end")?.unwrap_or(nse.end),
    })
}

pub fn resolve_symbols(
    symbol_override: Option<&str>,
    config: &dyn ConfigPort,
) -> Result<Vec<String>, MeanRevertError> {
    let raw = match symbol_override {
        Some(s) => s.to_string(),
        None => config
            .get_string("backtest", "symbols")
            .ok_or_else(|| MeanRevertError::ConfigMissing {
                section: "backtest".into(),
                key: "symbols".into(),
            })?,
    };
    parse_symbols(&raw).map_err(|e| MeanRevertError::ConfigInvalid {
        section: "backtest".into(),
        key: "symbols".into(),
        reason: e.to_string(),
    })
}

pub fn open_data_port(config: &dyn ConfigPort) -> Result<Box<dyn DataPort>, MeanRevertError> {
    let source = config
        .get_string("data", "source")
        .unwrap_or_else(|| "csv".to_string());
    match source.trim().to_lowercase().as_str() {
        "csv" => {
            let dir = config
                .get_string("data", "csv_dir")
                .ok_or_else(|| MeanRevertError::ConfigMissing {
                    section: "data".into(),
                    key: "csv_dir".into(),
                })?;
            Ok(Box::new(CsvAdapter::new(PathBuf::from(dir))))
        }
        #[cfg(feature = "sqlite")]
        "sqlite" => {
            use crate::adapters::sqlite_adapter::SqliteAdapter;
            Ok(Box::new(SqliteAdapter::from_config(config)?))
        }
        other => Err(MeanRevertError::ConfigInvalid {
            section: "data".into(),
            key: "source".into(),
            reason: format!("unsupported data source '{other}'"),
        }),
    }
}

/// Load, session-filter and backtest every symbol.
pub fn backtest_symbols(
    data_port: &dyn DataPort,
    engine: &BacktestEngine,
    symbols: &[String],
    session: Session,
    range: (Option<NaiveDate>, Option<NaiveDate>),
) -> Vec<SymbolOutcome> {
    let (start, end) = range;
    run_universe(engine, symbols, |symbol| {
        let points = data_port.fetch_prices(symbol, start, end)?;
        Ok(restrict_to_session(points, session))
    })
}

fn run_backtest(
    config_path: &Path,
    symbol_override: Option<&str>,
    trade_log_dir: Option<PathBuf>,
    chart_dir: Option<PathBuf>,
    weekly: bool,
) -> ExitCode {
    // Stage 1: Load and validate config
    info!(path = %config_path.display(), "loading config");
    let mut adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    if let Some(symbols) = symbol_override {
        adapter.set("backtest", "symbols", symbols);
    }
    if let Err(e) = validate_all(&adapter) {
        return fail(e);
    }

    // Stage 2: Resolve engine config, session, symbols
    let setup = build_backtest_config(&adapter).and_then(|bt| {
        Ok((
            bt,
            build_session(&adapter)?,
            resolve_symbols(None, &adapter)?,
            parse_date_range(&adapter)?,
        ))
    });
    let (bt_config, session, symbols, range) = match setup {
        Ok(s) => s,
        Err(e) => return fail(e),
    };

    // Stage 3: Data source and optional trade persistence
    let data_port = match open_data_port(&adapter) {
        Ok(p) => p,
        Err(e) => return fail(e),
    };

    let options = ReportOptions {
        trade_log_dir: trade_log_dir
            .or_else(|| adapter.get_string("report", "trade_log_dir").map(PathBuf::from)),
        chart_dir: chart_dir.or_else(|| adapter.get_string("report", "chart_dir").map(PathBuf::from)),
        weekly,
        sink: None,
    };

    #[cfg(feature = "sqlite")]
    {
        use crate::adapters::sqlite_adapter::SqliteAdapter;

        if adapter.get_bool("report", "persist_trades", false) {
            let store = match SqliteAdapter::from_config(&adapter) {
                Ok(s) => s,
                Err(e) => return fail(e),
            };
            let options = ReportOptions {
                sink: Some(&store),
                ..options
            };
            return run_backtest_pipeline(data_port.as_ref(), &bt_config, &symbols, session, range, &options);
        }
    }

    run_backtest_pipeline(data_port.as_ref(), &bt_config, &symbols, session, range, &options)
}

pub fn run_backtest_pipeline(
    data_port: &dyn DataPort,
    bt_config: &BacktestConfig,
    symbols: &[String],
    session: Session,
    range: (Option<NaiveDate>, Option<NaiveDate>),
    options: &ReportOptions<'_>,
) -> ExitCode {
    let engine = match BacktestEngine::new(bt_config.clone()) {
        Ok(e) => e,
        Err(e) => return fail(e),
    };

    eprintln!("Running backtest: {} symbols", symbols.len());
    let outcomes = backtest_symbols(data_port, &engine, symbols, session, range);

    let mut output_failed = false;
    let mut total_profit = 0.0;
    let mut first_error: Option<&MeanRevertError> = None;

    for outcome in &outcomes {
        let result = match &outcome.result {
            Ok(r) => r,
            Err(e) => {
                eprintln!("Error with {}: {}", outcome.symbol, e);
                first_error.get_or_insert(e);
                continue;
            }
        };

        total_profit += result.net_profit();
        print!("{}", format_trade_log(result));
        if !result.round_trips.is_empty() {
            println!("\n{}", format_metrics(&Metrics::compute(result)));
        }
        if options.weekly {
            println!("{}", format_weekly(&weekly_pnl(&result.trades, result.initial_capital)));
        }

        if let Err(e) = write_outputs(&outcome.symbol, result, bt_config.z_entry, options) {
            warn!(symbol = %outcome.symbol, error = %e, "failed to write output");
            eprintln!("error: {}: {}", outcome.symbol, e);
            output_failed = true;
        }
    }

    let (ok, failed) = tally(&outcomes);
    eprintln!(
        "\n=== {} symbols ok, {} failed | Net profit: {:.2} ===",
        ok, failed, total_profit
    );

    if ok == 0 {
        return match first_error {
            Some(e) => e.into(),
            None => ExitCode::from(5),
        };
    }
    if output_failed {
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn write_outputs(
    symbol: &str,
    result: &crate::domain::backtest::BacktestResult,
    z_entry: f64,
    options: &ReportOptions<'_>,
) -> Result<(), MeanRevertError> {
    if let Some(dir) = &options.trade_log_dir {
        CsvTradeLog::new(dir.clone()).record(symbol, &result.trades)?;
    }
    if let Some(sink) = options.sink {
        sink.record(symbol, &result.trades)?;
    }
    if let Some(dir) = &options.chart_dir {
        let path = dir.join(format!("{symbol}.svg"));
        chart_svg::write_chart(&path, symbol, &result.annotated, &result.trades, z_entry)?;
        chart_svg::write_returns_chart(
            &dir.join(format!("{symbol}_returns.svg")),
            symbol,
            &result.annotated,
        )?;
        let weeks = weekly_pnl(&result.trades, result.initial_capital);
        if !weeks.is_empty() {
            chart_svg::write_weekly_chart(&dir.join(format!("{symbol}_weekly.svg")), symbol, &weeks)?;
        }
    }
    Ok(())
}

fn run_signals(config_path: &Path, symbol: &str, output: Option<&Path>) -> ExitCode {
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    let prepared = build_backtest_config(&adapter).and_then(|bt| {
        bt.validate()?;
        let session = build_session(&adapter)?;
        let range = parse_date_range(&adapter)?;
        let data_port = open_data_port(&adapter)?;
        let points: Vec<PricePoint> = restrict_to_session(
            data_port.fetch_prices(&symbol.to_uppercase(), range.0, range.1)?,
            session,
        );
        Ok((bt, points))
    });
    let (bt_config, points) = match prepared {
        Ok(p) => p,
        Err(e) => return fail(e),
    };

    let annotated = match signal::compute(symbol, &points, &bt_config.signal_config()) {
        Ok(a) => a,
        Err(e) => return fail(e),
    };

    print!("{}", format_signals(&annotated));
    if let Some(path) = output {
        if let Err(e) = csv_adapter::write_annotated(path, &annotated) {
            return fail(e);
        }
        eprintln!("Signals written to: {}", path.display());
    }
    ExitCode::SUCCESS
}

pub fn run_validate(config_path: &Path) -> ExitCode {
    eprintln!("Validating config: {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    let checked = validate_all(&adapter).and_then(|_| {
        let bt = build_backtest_config(&adapter)?;
        bt.validate()?;
        Ok((bt, resolve_symbols(None, &adapter)?, build_session(&adapter)?))
    });
    let (bt, symbols, session) = match checked {
        Ok(c) => c,
        Err(e) => return fail(e),
    };

    eprintln!("\nStrategy:");
    eprintln!("  window: {}  z_entry: {}  mode: {:?}", bt.window, bt.z_entry, bt.signal_mode);
    eprintln!(
        "  exit: {:?} (band {})  max positions: {}",
        bt.exit_policy, bt.z_exit_threshold, bt.max_concurrent_positions
    );
    eprintln!("\nCapital:");
    eprintln!(
        "  initial: {:.2}  per trade: {:.2}  entry floor: {:.2}",
        bt.initial_capital, bt.max_trade_capital, bt.min_entry_cash
    );
    match bt.forced_liquidation_time {
        Some(t) => eprintln!("  forced liquidation: {}", t.format("%H:%M")),
        None => eprintln!("  forced liquidation: none"),
    }
    eprintln!(
        "\nSession: {} to {}",
        session.start.format("%H:%M"),
        session.end.format("%H:%M")
    );
    eprintln!("Symbols: {}", symbols.join(", "));

    eprintln!("\nConfiguration is valid.");
    ExitCode::SUCCESS
}

fn run_list_symbols(config_path: &Path) -> ExitCode {
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    let symbols = match open_data_port(&adapter).and_then(|port| port.list_symbols()) {
        Ok(s) => s,
        Err(e) => return fail(e),
    };

    if symbols.is_empty() {
        eprintln!("No symbols found");
    } else {
        for symbol in &symbols {
            println!("{}", symbol);
        }
        eprintln!("{} symbols found", symbols.len());
    }
    ExitCode::SUCCESS
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;

    fn make_config(content: &str) -> FileConfigAdapter {
        FileConfigAdapter::from_string(content).unwrap()
    }

    #[test]
    fn cli_parses_backtest() {
        let cli = Cli::try_parse_from([
            "meanrevert",
            "-v",
            "backtest",
            "-c",
            "cfg.ini",
            "--symbol",
            "RELIANCE",
            "--weekly",
        ])
        .unwrap();
        assert!(cli.verbose);
        assert!(!cli.debug);
        match cli.command {
            Command::Backtest {
                config,
                symbol,
                weekly,
                dry_run,
                ..
            } => {
                assert_eq!(config, PathBuf::from("cfg.ini"));
                assert_eq!(symbol.as_deref(), Some("RELIANCE"));
                assert!(weekly);
                assert!(!dry_run);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn cli_requires_config() {
        assert!(Cli::try_parse_from(["meanrevert", "validate"]).is_err());
    }

    #[test]
    fn build_config_defaults() {
        let bt = build_backtest_config(&make_config("[strategy]\n")).unwrap();
        assert_eq!(bt, BacktestConfig::default());
    }

    #[test]
    fn build_config_reads_all_keys() {
        let bt = build_backtest_config(&make_config(
            r#"
[strategy]
window = 30
z_entry = 1.5
z_exit_threshold = 0.5
signal_mode = threshold
exit_policy = threshold
max_concurrent_positions = 4
min_entry_cash = 500

[backtest]
initial_capital = 100000
max_trade_capital = 20000
forced_liquidation_time = 15:15
capital_decimals = 3
"#,
        ))
        .unwrap();
        assert_eq!(bt.window, 30);
        assert_eq!(bt.z_entry, 1.5);
        assert_eq!(bt.z_exit_threshold, 0.5);
        assert_eq!(bt.signal_mode, SignalMode::ThresholdCrossing);
        assert_eq!(bt.exit_policy, ExitPolicy::ThresholdReversion);
        assert_eq!(bt.max_concurrent_positions, 4);
        assert_eq!(bt.min_entry_cash, 500.0);
        assert_eq!(bt.initial_capital, 100_000.0);
        assert_eq!(bt.max_trade_capital, 20_000.0);
        assert_eq!(bt.forced_liquidation_time, NaiveTime::from_hms_opt(15, 15, 0));
        assert_eq!(bt.capital_decimals, 3);
    }

    #[test]
    fn build_config_rejects_unknown_mode() {
        let err = build_backtest_config(&make_config("[strategy]\nexit_policy = trailing\n"))
            .unwrap_err();
        assert!(matches!(err, MeanRevertError::ConfigInvalid { key, .. } if key == "exit_policy"));
    }

    #[test]
    fn build_config_rejects_malformed_numbers() {
        let err = build_backtest_config(&make_config(
            "[strategy]\nwindow = twenty\n[backtest]\ninitial_capital = lots\n",
        ))
        .unwrap_err();
        assert!(matches!(err, MeanRevertError::ConfigInvalid { key, .. } if key == "window"));

        let err = build_backtest_config(&make_config("[backtest]\ninitial_capital = lots\n"))
            .unwrap_err();
        assert!(matches!(err, MeanRevertError::ConfigInvalid { key, .. } if key == "initial_capital"));
    }

    #[test]
    fn capital_decimals_are_not_clamped() {
        let err = build_backtest_config(&make_config("[backtest]\ncapital_decimals = -1\n"))
            .unwrap_err();
        assert!(matches!(err, MeanRevertError::ConfigInvalid { key, .. } if key == "capital_decimals"));

        let bt = build_backtest_config(&make_config("[backtest]\ncapital_decimals = 12\n")).unwrap();
        assert_eq!(bt.capital_decimals, 12);
        assert!(matches!(bt.validate(), Err(MeanRevertError::InvalidConfig { .. })));
    }

    #[test]
    fn session_defaults_to_nse_hours() {
        assert_eq!(build_session(&make_config("[data]\n")).unwrap(), Session::nse());
        let s = build_session(&make_config("[data]\nsession_start = 10:00\n")).unwrap();
        assert_eq!(s.start, NaiveTime::from_hms_opt(10, 0, 0).unwrap());
        assert_eq!(s.end, Session::nse().end);
    }

    #[test]
    fn symbols_override_wins() {
        let config = make_config("[backtest]\nsymbols = A,B\n");
        assert_eq!(resolve_symbols(None, &config).unwrap(), vec!["A", "B"]);
        assert_eq!(resolve_symbols(Some("tatva"), &config).unwrap(), vec!["TATVA"]);
        assert!(resolve_symbols(None, &make_config("[backtest]\n")).is_err());
    }

    #[test]
    fn data_port_selection() {
        assert!(open_data_port(&make_config("[data]\nsource = csv\ncsv_dir = /tmp\n")).is_ok());
        let err = open_data_port(&make_config("[data]\nsource = csv\n")).err().unwrap();
        assert!(matches!(err, MeanRevertError::ConfigMissing { key, .. } if key == "csv_dir"));
        let err = open_data_port(&make_config("[data]\nsource = parquet\n")).err().unwrap();
        assert!(matches!(err, MeanRevertError::ConfigInvalid { key, .. } if key == "source"));
    }
}
