//! Result summary statistics.

use chrono::{Datelike, Duration, NaiveDate};
use std::collections::BTreeMap;

use super::backtest::{BacktestResult, ExitReason};
use super::signal::cumulative_strategy_returns;
use super::trade::{Trade, TradeKind};

#[derive(Debug, Clone, PartialEq)]
pub struct Metrics {
    pub net_profit: f64,
    pub total_return: f64,
    pub entries: usize,
    pub exits: usize,
    pub trades_won: usize,
    pub trades_lost: usize,
    pub trades_breakeven: usize,
    pub win_rate: f64,
    pub profit_factor: f64,
    pub avg_win: f64,
    pub avg_loss: f64,
    pub largest_win: f64,
    pub largest_loss: f64,
    pub avg_holding_minutes: f64,
    pub forced_exits: usize,
    /// Max peak-to-trough fall of mark-to-market equity.
    pub max_drawdown: f64,
    /// Final growth factor of the signal-following return curve.
    pub strategy_return: f64,
}

impl Metrics {
    pub fn compute(result: &BacktestResult) -> Self {
        let initial_capital = result.initial_capital;
        let net_profit = result.net_profit();
        let total_return = if initial_capital > 0.0 {
            net_profit / initial_capital
        } else {
            0.0
        };

        let mut trades_won = 0usize;
        let mut trades_lost = 0usize;
        let mut trades_breakeven = 0usize;
        let mut total_wins = 0.0_f64;
        let mut total_losses = 0.0_f64;
        let mut largest_win = 0.0_f64;
        let mut largest_loss = 0.0_f64;
        let mut total_minutes = 0i64;
        let mut forced_exits = 0usize;

        for rt in &result.round_trips {
            let pnl = rt.closed.pnl;
            if pnl > 0.0 {
                trades_won += 1;
                total_wins += pnl;
                largest_win = largest_win.max(pnl);
            } else if pnl < 0.0 {
                trades_lost += 1;
                total_losses += pnl.abs();
                largest_loss = largest_loss.max(pnl.abs());
            } else {
                trades_breakeven += 1;
            }

            total_minutes += (rt.closed.exit_time - rt.closed.position.entry_time).num_minutes();
            if matches!(
                rt.reason,
                ExitReason::ForcedLiquidation | ExitReason::EndOfSeries
            ) {
                forced_exits += 1;
            }
        }

        let total_trades = trades_won + trades_lost + trades_breakeven;
        let win_rate = if total_trades > 0 {
            trades_won as f64 / total_trades as f64
        } else {
            0.0
        };

        let profit_factor = if total_losses > 0.0 {
            total_wins / total_losses
        } else if total_wins > 0.0 {
            f64::INFINITY
        } else {
            0.0
        };

        let avg_win = if trades_won > 0 {
            total_wins / trades_won as f64
        } else {
            0.0
        };
        let avg_loss = if trades_lost > 0 {
            total_losses / trades_lost as f64
        } else {
            0.0
        };
        let avg_holding_minutes = if total_trades > 0 {
            total_minutes as f64 / total_trades as f64
        } else {
            0.0
        };

        Metrics {
            net_profit,
            total_return,
            entries: result.entry_count(),
            exits: result.exit_count(),
            trades_won,
            trades_lost,
            trades_breakeven,
            win_rate,
            profit_factor,
            avg_win,
            avg_loss,
            largest_win,
            largest_loss,
            avg_holding_minutes,
            forced_exits,
            max_drawdown: compute_drawdown(&equity_curve(result)),
            strategy_return: cumulative_strategy_returns(&result.annotated)
                .last()
                .copied()
                .unwrap_or(1.0),
        }
    }
}

/// Equity after the last trade of each timestamp: cash plus what every
/// still-open position would settle for at that trade's price. Cash alone
/// would count the debit of a long entry as a loss.
pub fn equity_curve(result: &BacktestResult) -> Vec<f64> {
    let mut curve = vec![result.initial_capital];
    for (i, trade) in result.trades.iter().enumerate() {
        let t = trade.timestamp;
        if result.trades.get(i + 1).is_some_and(|next| next.timestamp == t) {
            continue;
        }
        let open_value: f64 = result
            .round_trips
            .iter()
            .map(|rt| &rt.closed)
            .filter(|c| c.position.entry_time <= t && c.exit_time > t)
            .map(|c| c.position.exit_credit(trade.price))
            .sum();
        curve.push(trade.capital_after + open_value);
    }
    curve
}

fn compute_drawdown(curve: &[f64]) -> f64 {
    let Some(&first) = curve.first() else {
        return 0.0;
    };
    let mut peak = first;
    let mut max_dd = 0.0_f64;
    for &value in curve {
        if value > peak {
            peak = value;
        } else if peak > 0.0 {
            max_dd = max_dd.max((peak - value) / peak);
        }
    }
    max_dd
}

#[derive(Debug, Clone, PartialEq)]
pub struct WeeklyPnl {
    /// Monday of the week.
    pub week_start: NaiveDate,
    pub pnl: f64,
}

fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(date.weekday().num_days_from_monday() as i64)
}

/// Realized capital change per week, from EXIT trades only.
///
/// Each week's figure is its last post-exit capital minus the previous
/// week's; weeks without exits carry the previous capital forward and show
/// zero. The first week is measured against `initial_capital`.
pub fn weekly_pnl(trades: &[Trade], initial_capital: f64) -> Vec<WeeklyPnl> {
    let mut last_capital: BTreeMap<NaiveDate, f64> = BTreeMap::new();
    for trade in trades.iter().filter(|t| t.kind == TradeKind::Exit) {
        last_capital.insert(week_start(trade.timestamp.date()), trade.capital_after);
    }

    let (Some(&first), Some(&last)) = (last_capital.keys().next(), last_capital.keys().last())
    else {
        return Vec::new();
    };

    let mut weeks = Vec::new();
    let mut prev_capital = initial_capital;
    let mut week = first;
    while week <= last {
        let capital = last_capital.get(&week).copied().unwrap_or(prev_capital);
        weeks.push(WeeklyPnl {
            week_start: week,
            pnl: capital - prev_capital,
        });
        prev_capital = capital;
        week += Duration::days(7);
    }
    weeks
}
