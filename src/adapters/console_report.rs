//! Plain-text rendering of backtest results for the terminal.

use crate::domain::backtest::{BacktestResult, RunStatus};
use crate::domain::metrics::{Metrics, WeeklyPnl};
use crate::domain::signal::AnnotatedPoint;
use std::fmt::Write as _;

/// Per-symbol trade log: closing capital, net profit, then one line per
/// executed trade.
pub fn format_trade_log(result: &BacktestResult) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "\n[{}]", result.symbol);
    if let RunStatus::InsufficientData { points, window } = result.status {
        let _ = writeln!(
            out,
            "Skipped: {} points, window needs {}",
            points, window
        );
    }
    let _ = writeln!(out, "Net Capital After Backtest: {:.2}", result.final_cash);
    let _ = writeln!(out, "Net Profit: {:.2}", result.net_profit());
    let _ = writeln!(out, "\nExecuted Trades: {}", result.trades.len());
    for t in &result.trades {
        let _ = writeln!(
            out,
            "{} - {} - Qty: {} @ {} | Capital: {:.2}",
            t.timestamp.format("%Y-%m-%d %H:%M:%S"),
            t.kind,
            t.quantity,
            t.price,
            t.capital_after
        );
    }
    out
}

pub fn format_metrics(metrics: &Metrics) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Total Return:     {:.2}%", metrics.total_return * 100.0);
    let _ = writeln!(out, "Round Trips:      {}", metrics.exits);
    let _ = writeln!(out, "Win Rate:         {:.1}%", metrics.win_rate * 100.0);
    let _ = writeln!(out, "Profit Factor:    {:.2}", metrics.profit_factor);
    let _ = writeln!(out, "Avg Win / Loss:   {:.2} / {:.2}", metrics.avg_win, metrics.avg_loss);
    let _ = writeln!(out, "Avg Holding:      {:.1} min", metrics.avg_holding_minutes);
    let _ = writeln!(out, "Forced Exits:     {}", metrics.forced_exits);
    let _ = writeln!(out, "Max Drawdown:     -{:.1}%", metrics.max_drawdown * 100.0);
    let _ = writeln!(out, "Signal Return:    {:.4}x", metrics.strategy_return);
    out
}

pub fn format_weekly(weeks: &[WeeklyPnl]) -> String {
    if weeks.is_empty() {
        return "No EXIT trades to report weekly gains/losses.\n".to_string();
    }
    let mut out = String::from("Week Of       P&L\n");
    for w in weeks {
        let sign = if w.pnl >= 0.0 { "+" } else { "" };
        let _ = writeln!(out, "{}  {}{:.2}", w.week_start, sign, w.pnl);
    }
    out
}

/// Annotated series as an aligned table; undefined statistics print as `-`.
pub fn format_signals(points: &[AnnotatedPoint]) -> String {
    let cell = |v: Option<f64>| v.map(|v| format!("{:.4}", v)).unwrap_or_else(|| "-".into());
    let mut out = format!(
        "{:<19}  {:>10}  {:>10}  {:>10}  {:>8}  {}\n",
        "datetime", "close", "sma", "std", "z", "signal"
    );
    for p in points {
        let _ = writeln!(
            out,
            "{:<19}  {:>10.2}  {:>10}  {:>10}  {:>8}  {}",
            p.timestamp.format("%Y-%m-%d %H:%M:%S"),
            p.close,
            cell(p.sma),
            cell(p.std),
            cell(p.z_score),
            p.signal
        );
    }
    out
}
