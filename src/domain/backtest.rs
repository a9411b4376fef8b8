//! Backtest engine: a single forward pass over an annotated series.
//!
//! Per step the engine first settles exits for positions opened on earlier
//! steps (forced liquidation at the cutoff, otherwise the configured exit
//! policy), then considers a new entry. Entries act on a signal only when
//! the previous point was HOLD, so a signal is acted on the step it first
//! appears and never while it persists. Whatever is still open when the
//! series ends is closed at the last price.

use chrono::NaiveTime;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, warn};

use super::error::MeanRevertError;
use super::ledger::PositionLedger;
use super::position::{ClosedPosition, Position, PositionId, Side};
use super::price::{is_tradable_price, PricePoint};
use super::signal::{self, AnnotatedPoint, Signal, SignalConfig, SignalMode};
use super::trade::{Trade, TradeKind, TradeRecorder};

pub const MAX_CAPITAL_DECIMALS: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExitPolicy {
    /// Close every open position as soon as the signal returns to HOLD.
    #[default]
    SignalReversion,
    /// Close a LONG once z rises above `+z_exit_threshold`, a SHORT once z
    /// falls below `-z_exit_threshold`.
    ThresholdReversion,
}

impl FromStr for ExitPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "signal" | "signal_reversion" => Ok(ExitPolicy::SignalReversion),
            "threshold" | "threshold_reversion" => Ok(ExitPolicy::ThresholdReversion),
            other => Err(format!(
                "unknown exit policy '{other}' (expected signal or threshold)"
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    SignalReversion,
    ThresholdReversion,
    ForcedLiquidation,
    EndOfSeries,
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitReason::SignalReversion => write!(f, "signal reversion"),
            ExitReason::ThresholdReversion => write!(f, "threshold reversion"),
            ExitReason::ForcedLiquidation => write!(f, "forced liquidation"),
            ExitReason::EndOfSeries => write!(f, "end of series"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestConfig {
    pub window: usize,
    pub z_entry: f64,
    pub z_exit_threshold: f64,
    pub signal_mode: SignalMode,
    pub exit_policy: ExitPolicy,
    pub initial_capital: f64,
    pub max_trade_capital: f64,
    pub max_concurrent_positions: usize,
    /// Entries are only considered while cash is at least this much.
    pub min_entry_cash: f64,
    pub forced_liquidation_time: Option<NaiveTime>,
    /// Decimal places of `Trade::capital_after`.
    pub capital_decimals: u32,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        BacktestConfig {
            window: 20,
            z_entry: 1.0,
            z_exit_threshold: 0.3,
            signal_mode: SignalMode::LocalExtremum,
            exit_policy: ExitPolicy::SignalReversion,
            initial_capital: 50_000.0,
            max_trade_capital: 10_000.0,
            max_concurrent_positions: 1,
            min_entry_cash: 1_000.0,
            forced_liquidation_time: None,
            capital_decimals: 2,
        }
    }
}

impl BacktestConfig {
    pub fn signal_config(&self) -> SignalConfig {
        SignalConfig {
            window: self.window,
            z_entry: self.z_entry,
            mode: self.signal_mode,
        }
    }

    pub fn validate(&self) -> Result<(), MeanRevertError> {
        self.signal_config().validate()?;
        if !(self.max_trade_capital > 0.0) {
            return Err(MeanRevertError::invalid_config(format!(
                "max_trade_capital must be positive, got {}",
                self.max_trade_capital
            )));
        }
        if !(self.initial_capital > 0.0) {
            return Err(MeanRevertError::invalid_config(format!(
                "initial_capital must be positive, got {}",
                self.initial_capital
            )));
        }
        if self.max_concurrent_positions == 0 {
            return Err(MeanRevertError::invalid_config(
                "max_concurrent_positions must be at least 1",
            ));
        }
        if !(self.min_entry_cash >= 0.0) {
            return Err(MeanRevertError::invalid_config(format!(
                "min_entry_cash must be non-negative, got {}",
                self.min_entry_cash
            )));
        }
        if self.exit_policy == ExitPolicy::ThresholdReversion && !(self.z_exit_threshold > 0.0) {
            return Err(MeanRevertError::invalid_config(format!(
                "z_exit_threshold must be positive, got {}",
                self.z_exit_threshold
            )));
        }
        if self.capital_decimals > MAX_CAPITAL_DECIMALS {
            return Err(MeanRevertError::invalid_config(format!(
                "capital_decimals must be at most {MAX_CAPITAL_DECIMALS}, got {}",
                self.capital_decimals
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Completed,
    /// The series was shorter than the window; nothing was traded.
    InsufficientData { points: usize, window: usize },
}

/// A closed position together with the rule that closed it.
#[derive(Debug, Clone, PartialEq)]
pub struct RoundTrip {
    pub closed: ClosedPosition,
    pub reason: ExitReason,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestResult {
    pub symbol: String,
    pub status: RunStatus,
    pub initial_capital: f64,
    pub final_cash: f64,
    pub trades: Vec<Trade>,
    pub round_trips: Vec<RoundTrip>,
    pub annotated: Vec<AnnotatedPoint>,
}

impl BacktestResult {
    pub fn net_profit(&self) -> f64 {
        self.final_cash - self.initial_capital
    }

    pub fn entry_count(&self) -> usize {
        self.trades.iter().filter(|t| t.kind.is_entry()).count()
    }

    pub fn exit_count(&self) -> usize {
        self.trades
            .iter()
            .filter(|t| t.kind == TradeKind::Exit)
            .count()
    }
}

#[derive(Debug, Clone)]
pub struct BacktestEngine {
    config: BacktestConfig,
}

/// Mutable state of one symbol's run.
struct RunState {
    ledger: PositionLedger,
    recorder: TradeRecorder,
    round_trips: Vec<RoundTrip>,
}

impl BacktestEngine {
    pub fn new(config: BacktestConfig) -> Result<Self, MeanRevertError> {
        config.validate()?;
        Ok(BacktestEngine { config })
    }

    pub fn config(&self) -> &BacktestConfig {
        &self.config
    }

    /// Annotate `series` and run it. A series shorter than the window is not
    /// a failure: the result carries no trades and the initial capital.
    pub fn run(
        &self,
        symbol: &str,
        series: &[PricePoint],
    ) -> Result<BacktestResult, MeanRevertError> {
        match signal::compute(symbol, series, &self.config.signal_config()) {
            Ok(annotated) => self.run_annotated(symbol, annotated),
            Err(MeanRevertError::InsufficientData { points, window, .. }) => {
                warn!(symbol, points, window, "series shorter than window, skipping");
                Ok(BacktestResult {
                    symbol: symbol.to_string(),
                    status: RunStatus::InsufficientData { points, window },
                    initial_capital: self.config.initial_capital,
                    final_cash: self.config.initial_capital,
                    trades: Vec::new(),
                    round_trips: Vec::new(),
                    annotated: Vec::new(),
                })
            }
            Err(e) => Err(e),
        }
    }

    /// Run over an already annotated series, strictly in order.
    pub fn run_annotated(
        &self,
        symbol: &str,
        annotated: Vec<AnnotatedPoint>,
    ) -> Result<BacktestResult, MeanRevertError> {
        let mut state = RunState {
            ledger: PositionLedger::new(self.config.initial_capital),
            recorder: TradeRecorder::new(self.config.initial_capital, self.config.capital_decimals),
            round_trips: Vec::new(),
        };

        let mut prev_signal = Signal::Hold;
        for point in &annotated {
            self.step(&mut state, point, prev_signal)?;
            prev_signal = point.signal;
        }

        if let Some(last) = annotated.last() {
            close_all(&mut state, last, ExitReason::EndOfSeries)?;
        }

        state.recorder.set_final_cash(state.ledger.cash());
        let (trades, final_cash) = state.recorder.into_parts();

        debug!(
            symbol,
            trades = trades.len(),
            final_cash,
            "backtest complete"
        );

        Ok(BacktestResult {
            symbol: symbol.to_string(),
            status: RunStatus::Completed,
            initial_capital: self.config.initial_capital,
            final_cash,
            trades,
            round_trips: state.round_trips,
            annotated,
        })
    }

    fn step(
        &self,
        state: &mut RunState,
        point: &AnnotatedPoint,
        prev_signal: Signal,
    ) -> Result<(), MeanRevertError> {
        let past_cutoff = self
            .config
            .forced_liquidation_time
            .is_some_and(|cutoff| point.timestamp.time() >= cutoff);

        if past_cutoff {
            close_all(state, point, ExitReason::ForcedLiquidation)?;
            return Ok(());
        }

        for id in state.ledger.open_ids() {
            let reason = match state.ledger.get(id) {
                Some(position) => self.exit_reason(position, point),
                None => None,
            };
            if let Some(reason) = reason {
                close_one(state, id, point, reason)?;
            }
        }

        if prev_signal == Signal::Hold {
            if let Some(side) = Side::from_signal(point.signal) {
                self.try_enter(state, side, point)?;
            }
        }

        Ok(())
    }

    fn exit_reason(&self, position: &Position, point: &AnnotatedPoint) -> Option<ExitReason> {
        match self.config.exit_policy {
            ExitPolicy::SignalReversion => {
                (point.signal == Signal::Hold).then_some(ExitReason::SignalReversion)
            }
            ExitPolicy::ThresholdReversion => {
                let z = point.z_score?;
                let band = self.config.z_exit_threshold;
                let reverted = match position.side {
                    Side::Long => z > band,
                    Side::Short => z < -band,
                };
                reverted.then_some(ExitReason::ThresholdReversion)
            }
        }
    }

    fn try_enter(
        &self,
        state: &mut RunState,
        side: Side,
        point: &AnnotatedPoint,
    ) -> Result<(), MeanRevertError> {
        let cash = state.ledger.cash();
        if cash < self.config.min_entry_cash {
            debug!(cash, floor = self.config.min_entry_cash, "entry skipped: cash below floor");
            return Ok(());
        }
        if state.ledger.position_count() >= self.config.max_concurrent_positions {
            return Ok(());
        }

        let entry_price = point.close;
        if !is_tradable_price(entry_price) {
            warn!(price = entry_price, time = %point.timestamp, "entry skipped: untradable price");
            return Ok(());
        }
        let allocated = self.config.max_trade_capital.min(cash);
        let shares = (allocated / entry_price).floor();
        if !shares.is_finite() || shares < 1.0 || shares >= i64::MAX as f64 {
            debug!(allocated, entry_price, "entry skipped: zero quantity");
            return Ok(());
        }
        let quantity = shares as i64;

        let id = state
            .ledger
            .open(side, entry_price, quantity, point.timestamp)?;
        let cash_after = state.ledger.cash();
        state.recorder.record(
            TradeKind::entry(side),
            point.timestamp,
            entry_price,
            quantity,
            cash_after,
        );
        debug!(
            position = %id,
            %side,
            quantity,
            price = entry_price,
            cash_after,
            "opened position"
        );
        Ok(())
    }
}

fn close_one(
    state: &mut RunState,
    id: PositionId,
    point: &AnnotatedPoint,
    reason: ExitReason,
) -> Result<(), MeanRevertError> {
    let closed = state.ledger.close(id, point.close, point.timestamp)?;
    let cash_after = state.ledger.cash();
    state.recorder.record(
        TradeKind::Exit,
        point.timestamp,
        closed.exit_price,
        closed.position.quantity,
        cash_after,
    );
    debug!(
        position = %id,
        %reason,
        price = closed.exit_price,
        pnl = closed.pnl,
        cash_after,
        "closed position"
    );
    state.round_trips.push(RoundTrip { closed, reason });
    Ok(())
}

fn close_all(
    state: &mut RunState,
    point: &AnnotatedPoint,
    reason: ExitReason,
) -> Result<(), MeanRevertError> {
    for id in state.ledger.open_ids() {
        close_one(state, id, point, reason)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate, NaiveDateTime};

    fn t0() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 3)
            .unwrap()
            .and_hms_opt(9, 15, 0)
            .unwrap()
    }

    /// Hand-built annotated series: (close, z, signal) per 5-minute step.
    fn annotated(rows: &[(f64, Option<f64>, Signal)]) -> Vec<AnnotatedPoint> {
        rows.iter()
            .enumerate()
            .map(|(i, &(close, z, signal))| AnnotatedPoint {
                timestamp: t0() + Duration::minutes(5 * i as i64),
                close,
                sma: z.map(|_| close),
                std: z.map(|_| 1.0),
                z_score: z,
                signal,
            })
            .collect()
    }

    fn engine(config: BacktestConfig) -> BacktestEngine {
        BacktestEngine::new(config).unwrap()
    }

    use Signal::{Buy, Hold, Sell};

    #[test]
    fn default_config_is_valid() {
        assert!(BacktestConfig::default().validate().is_ok());
    }

    #[test]
    fn invalid_configs_rejected() {
        let bad = [
            BacktestConfig { window: 1, ..Default::default() },
            BacktestConfig { z_entry: 0.0, ..Default::default() },
            BacktestConfig { max_trade_capital: 0.0, ..Default::default() },
            BacktestConfig { initial_capital: -1.0, ..Default::default() },
            BacktestConfig { max_concurrent_positions: 0, ..Default::default() },
            BacktestConfig { capital_decimals: 11, ..Default::default() },
            BacktestConfig {
                exit_policy: ExitPolicy::ThresholdReversion,
                z_exit_threshold: 0.0,
                ..Default::default()
            },
        ];
        for config in bad {
            let err = BacktestEngine::new(config).unwrap_err();
            assert!(matches!(err, MeanRevertError::InvalidConfig { .. }));
        }
    }

    #[test]
    fn exit_policy_parse() {
        assert_eq!("signal".parse::<ExitPolicy>(), Ok(ExitPolicy::SignalReversion));
        assert_eq!(
            "threshold_reversion".parse::<ExitPolicy>(),
            Ok(ExitPolicy::ThresholdReversion)
        );
        assert!("stop".parse::<ExitPolicy>().is_err());
    }

    #[test]
    fn buy_then_hold_round_trip() {
        let series = annotated(&[
            (100.0, Some(0.0), Hold),
            (100.0, Some(-1.5), Buy),
            (110.0, Some(0.2), Hold),
        ]);
        let result = engine(BacktestConfig::default())
            .run_annotated("X", series)
            .unwrap();

        assert_eq!(result.trades.len(), 2);
        let entry = &result.trades[0];
        assert_eq!(entry.kind, TradeKind::EntryLong);
        assert_eq!(entry.quantity, 100);
        assert!((entry.capital_after - 40_000.0).abs() < 1e-9);
        let exit = &result.trades[1];
        assert_eq!(exit.kind, TradeKind::Exit);
        assert!((exit.capital_after - 51_000.0).abs() < 1e-9);
        assert!((result.final_cash - 51_000.0).abs() < 1e-9);
        assert_eq!(result.round_trips[0].reason, ExitReason::SignalReversion);
    }

    #[test]
    fn persisting_signal_is_not_reentered() {
        let config = BacktestConfig {
            max_concurrent_positions: 5,
            exit_policy: ExitPolicy::ThresholdReversion,
            ..Default::default()
        };
        let series = annotated(&[
            (100.0, Some(0.0), Hold),
            (100.0, Some(-1.5), Buy),
            (99.0, Some(-1.6), Buy),
            (98.0, Some(-1.7), Buy),
        ]);
        let result = engine(config).run_annotated("X", series).unwrap();
        assert_eq!(result.entry_count(), 1);
    }

    #[test]
    fn short_entry_settles_net_pnl() {
        let series = annotated(&[
            (50.0, Some(0.0), Hold),
            (50.0, Some(1.5), Sell),
            (45.0, Some(0.0), Hold),
        ]);
        let config = BacktestConfig {
            max_trade_capital: 1_000.0,
            ..Default::default()
        };
        let result = engine(config).run_annotated("X", series).unwrap();
        assert_eq!(result.trades[0].kind, TradeKind::EntryShort);
        assert_eq!(result.trades[0].quantity, 20);
        assert!((result.trades[0].capital_after - 50_000.0).abs() < 1e-9);
        assert!((result.final_cash - 50_100.0).abs() < 1e-9);
    }

    #[test]
    fn zero_quantity_entry_is_skipped() {
        let series = annotated(&[
            (0.0, Some(0.0), Hold),
            (20_000.0, Some(-2.0), Buy),
            (20_000.0, Some(0.0), Hold),
        ]);
        let result = engine(BacktestConfig::default())
            .run_annotated("X", series)
            .unwrap();
        assert!(result.trades.is_empty());
        assert!((result.final_cash - 50_000.0).abs() < f64::EPSILON);
    }

    #[test]
    fn untradable_entry_price_is_skipped() {
        for bad in [0.0, -5.0, f64::NAN, f64::INFINITY] {
            let series = annotated(&[
                (100.0, Some(0.0), Hold),
                (bad, Some(-2.0), Buy),
                (100.0, Some(0.0), Hold),
                (bad, Some(2.0), Sell),
                (100.0, Some(0.0), Hold),
            ]);
            let result = engine(BacktestConfig::default())
                .run_annotated("X", series)
                .unwrap();
            assert!(result.trades.is_empty(), "price {bad}");
            assert!((result.final_cash - 50_000.0).abs() < f64::EPSILON);
        }
    }

    #[test]
    fn zero_close_in_raw_series_never_sizes_a_position() {
        let config = BacktestConfig {
            window: 3,
            signal_mode: SignalMode::ThresholdCrossing,
            exit_policy: ExitPolicy::ThresholdReversion,
            max_concurrent_positions: 3,
            ..Default::default()
        };
        let series: Vec<PricePoint> = [100.0, 101.0, 99.0, 100.0, 0.0, 10.0]
            .iter()
            .enumerate()
            .map(|(i, &c)| PricePoint::new(t0() + Duration::minutes(5 * i as i64), c))
            .collect();
        let result = engine(config.clone()).run("X", &series).unwrap();

        for trade in result.trades.iter().filter(|t| t.kind.is_entry()) {
            assert!(trade.price > 0.0);
            assert!(trade.quantity as f64 * trade.price <= config.max_trade_capital);
        }
        assert!(result.final_cash.is_finite());
        assert!(result.final_cash < 2.0 * config.initial_capital);
    }

    #[test]
    fn cash_floor_blocks_entry() {
        let config = BacktestConfig {
            initial_capital: 900.0,
            ..Default::default()
        };
        let series = annotated(&[(10.0, Some(0.0), Hold), (10.0, Some(-2.0), Buy)]);
        let result = engine(config).run_annotated("X", series).unwrap();
        assert!(result.trades.is_empty());
    }

    #[test]
    fn allocation_capped_by_cash() {
        let config = BacktestConfig {
            initial_capital: 5_000.0,
            max_trade_capital: 10_000.0,
            ..Default::default()
        };
        let series = annotated(&[(30.0, Some(0.0), Hold), (30.0, Some(-2.0), Buy)]);
        let result = engine(config).run_annotated("X", series).unwrap();
        // floor(5000 / 30) = 166
        assert_eq!(result.trades[0].quantity, 166);
        assert!(result.trades[0].capital_after >= 0.0);
    }

    #[test]
    fn single_position_mode_blocks_second_entry() {
        let config = BacktestConfig {
            exit_policy: ExitPolicy::ThresholdReversion,
            ..Default::default()
        };
        let series = annotated(&[
            (100.0, Some(0.0), Hold),
            (100.0, Some(-1.5), Buy),
            (98.0, Some(-0.8), Hold),
            (97.0, Some(-1.4), Buy),
            (105.0, Some(0.5), Hold),
        ]);
        let result = engine(config).run_annotated("X", series).unwrap();
        let kinds: Vec<TradeKind> = result.trades.iter().map(|t| t.kind).collect();
        assert_eq!(kinds, vec![TradeKind::EntryLong, TradeKind::Exit]);
    }

    #[test]
    fn multi_position_threshold_exits_by_side() {
        let config = BacktestConfig {
            exit_policy: ExitPolicy::ThresholdReversion,
            max_concurrent_positions: 3,
            ..Default::default()
        };
        let series = annotated(&[
            (100.0, Some(0.0), Hold),
            (100.0, Some(-1.5), Buy),
            (99.0, Some(-1.2), Hold),
            (98.0, Some(-1.6), Buy),
            // both longs revert (z > 0.3)
            (104.0, Some(0.5), Hold),
            (106.0, Some(1.7), Sell),
            // short still above -0.3
            (103.0, Some(-0.1), Hold),
            (101.0, Some(-0.5), Hold),
        ]);
        let result = engine(config).run_annotated("X", series).unwrap();
        let kinds: Vec<TradeKind> = result.trades.iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TradeKind::EntryLong,
                TradeKind::EntryLong,
                TradeKind::Exit,
                TradeKind::Exit,
                TradeKind::EntryShort,
                TradeKind::Exit,
            ]
        );
        assert_eq!(result.trades[2].timestamp, t0() + Duration::minutes(20));
        assert_eq!(result.trades[3].timestamp, t0() + Duration::minutes(20));
        assert_eq!(result.trades[5].timestamp, t0() + Duration::minutes(35));
        assert!(result
            .round_trips
            .iter()
            .all(|rt| rt.reason == ExitReason::ThresholdReversion));
    }

    #[test]
    fn threshold_policy_ignores_undefined_z() {
        let config = BacktestConfig {
            exit_policy: ExitPolicy::ThresholdReversion,
            ..Default::default()
        };
        let series = annotated(&[
            (100.0, Some(0.0), Hold),
            (100.0, Some(-1.5), Buy),
            (101.0, None, Hold),
        ]);
        let result = engine(config).run_annotated("X", series).unwrap();
        assert_eq!(result.round_trips.len(), 1);
        assert_eq!(result.round_trips[0].reason, ExitReason::EndOfSeries);
    }

    #[test]
    fn forced_liquidation_closes_everything() {
        let config = BacktestConfig {
            exit_policy: ExitPolicy::ThresholdReversion,
            max_concurrent_positions: 3,
            forced_liquidation_time: NaiveTime::from_hms_opt(9, 30, 0),
            ..Default::default()
        };
        let series = annotated(&[
            (100.0, Some(0.0), Hold),
            (100.0, Some(-1.5), Buy),
            (104.0, Some(0.1), Hold),
            // 09:30: the open long is liquidated
            (102.0, Some(1.6), Sell),
        ]);
        // the 09:30 SELL is at the cutoff and must not open a position
        let result = engine(config).run_annotated("X", series).unwrap();
        assert_eq!(result.entry_count(), 1);
        assert_eq!(result.exit_count(), 1);
        assert_eq!(result.round_trips[0].reason, ExitReason::ForcedLiquidation);
        assert_eq!(result.trades[1].timestamp, t0() + Duration::minutes(15));
    }

    #[test]
    fn end_of_series_closes_open_positions() {
        let series = annotated(&[
            (100.0, Some(0.0), Hold),
            (100.0, Some(-1.5), Buy),
            (97.0, Some(-1.6), Buy),
        ]);
        let result = engine(BacktestConfig::default())
            .run_annotated("X", series)
            .unwrap();
        assert_eq!(result.exit_count(), 1);
        assert_eq!(result.round_trips[0].reason, ExitReason::EndOfSeries);
        assert!((result.final_cash - (40_000.0 + 100.0 * 97.0)).abs() < 1e-9);
    }

    #[test]
    fn insufficient_data_is_empty_result() {
        let series: Vec<PricePoint> = (0..5)
            .map(|i| PricePoint::new(t0() + Duration::minutes(5 * i), 100.0 + i as f64))
            .collect();
        let result = engine(BacktestConfig::default()).run("X", &series).unwrap();
        assert_eq!(
            result.status,
            RunStatus::InsufficientData {
                points: 5,
                window: 20
            }
        );
        assert!(result.trades.is_empty());
        assert!((result.final_cash - 50_000.0).abs() < f64::EPSILON);
    }

    #[test]
    fn full_precision_cash_carries_between_trades() {
        let config = BacktestConfig {
            max_trade_capital: 1_000.0,
            capital_decimals: 0,
            ..Default::default()
        };
        let series = annotated(&[
            (33.3333, Some(0.0), Hold),
            (33.3333, Some(-1.5), Buy),
            (33.3334, Some(0.0), Hold),
        ]);
        let result = engine(config).run_annotated("X", series).unwrap();
        let expected = 50_000.0 - 30.0 * 33.3333 + 30.0 * 33.3334;
        assert!((result.final_cash - expected).abs() < 1e-9);
        assert!((result.trades[1].capital_after - expected.round()).abs() < 1e-9);
    }
}
