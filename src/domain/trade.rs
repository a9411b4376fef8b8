//! Execution records and the append-only trade recorder.

use chrono::NaiveDateTime;
use std::fmt;

use super::position::Side;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TradeKind {
    EntryLong,
    EntryShort,
    Exit,
}

impl TradeKind {
    pub fn entry(side: Side) -> Self {
        match side {
            Side::Long => TradeKind::EntryLong,
            Side::Short => TradeKind::EntryShort,
        }
    }

    pub fn is_entry(self) -> bool {
        !matches!(self, TradeKind::Exit)
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ENTRY_LONG" => Some(TradeKind::EntryLong),
            "ENTRY_SHORT" => Some(TradeKind::EntryShort),
            "EXIT" => Some(TradeKind::Exit),
            _ => None,
        }
    }
}

impl fmt::Display for TradeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeKind::EntryLong => write!(f, "ENTRY_LONG"),
            TradeKind::EntryShort => write!(f, "ENTRY_SHORT"),
            TradeKind::Exit => write!(f, "EXIT"),
        }
    }
}

/// One execution event. `capital_after` is the cash balance after the
/// event, rounded for reporting.
#[derive(Debug, Clone, PartialEq)]
pub struct Trade {
    pub kind: TradeKind,
    pub timestamp: NaiveDateTime,
    pub price: f64,
    pub quantity: i64,
    pub capital_after: f64,
}

/// Round `value` to `decimals` places.
pub fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}

/// Append-only log of trades plus the closing cash balance.
#[derive(Debug, Clone, PartialEq)]
pub struct TradeRecorder {
    trades: Vec<Trade>,
    decimals: u32,
    final_cash: f64,
}

impl TradeRecorder {
    pub fn new(initial_cash: f64, decimals: u32) -> Self {
        TradeRecorder {
            trades: Vec::new(),
            decimals,
            final_cash: initial_cash,
        }
    }

    /// Append a trade. `cash_after` is the full-precision balance; only the
    /// stored copy is rounded.
    pub fn record(
        &mut self,
        kind: TradeKind,
        timestamp: NaiveDateTime,
        price: f64,
        quantity: i64,
        cash_after: f64,
    ) {
        self.trades.push(Trade {
            kind,
            timestamp,
            price,
            quantity,
            capital_after: round_to(cash_after, self.decimals),
        });
        self.final_cash = cash_after;
    }

    pub fn set_final_cash(&mut self, cash: f64) {
        self.final_cash = cash;
    }

    pub fn trades(&self) -> &[Trade] {
        &self.trades
    }

    pub fn final_cash(&self) -> f64 {
        self.final_cash
    }

    pub fn len(&self) -> usize {
        self.trades.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trades.is_empty()
    }

    pub fn into_parts(self) -> (Vec<Trade>, f64) {
        (self.trades, self.final_cash)
    }
}
