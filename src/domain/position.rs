//! Open positions and their settlement.

use chrono::NaiveDateTime;
use std::fmt;

use super::signal::Signal;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Long,
    Short,
}

impl Side {
    /// Side opened by an entry signal; HOLD opens nothing.
    pub fn from_signal(signal: Signal) -> Option<Side> {
        match signal {
            Signal::Buy => Some(Side::Long),
            Signal::Sell => Some(Side::Short),
            Signal::Hold => None,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Long => write!(f, "LONG"),
            Side::Short => write!(f, "SHORT"),
        }
    }
}

/// Opaque identifier handed out by the ledger, increasing in open order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PositionId(pub u64);

impl fmt::Display for PositionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub side: Side,
    pub entry_price: f64,
    pub quantity: i64,
    pub entry_time: NaiveDateTime,
}

impl Position {
    pub fn is_long(&self) -> bool {
        self.side == Side::Long
    }

    pub fn is_short(&self) -> bool {
        self.side == Side::Short
    }

    /// Cash taken from the balance when the position is opened.
    /// Shorts are margin-free: nothing is escrowed up front.
    pub fn entry_debit(&self) -> f64 {
        match self.side {
            Side::Long => self.quantity as f64 * self.entry_price,
            Side::Short => 0.0,
        }
    }

    /// Cash returned to the balance when the position is closed at `price`.
    /// Longs return their full proceeds; shorts settle net P&L.
    pub fn exit_credit(&self, price: f64) -> f64 {
        match self.side {
            Side::Long => self.quantity as f64 * price,
            Side::Short => self.quantity as f64 * (self.entry_price - price),
        }
    }

    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        match self.side {
            Side::Long => self.quantity as f64 * (price - self.entry_price),
            Side::Short => self.quantity as f64 * (self.entry_price - price),
        }
    }
}

/// A position removed from the ledger together with its settlement.
#[derive(Debug, Clone, PartialEq)]
pub struct ClosedPosition {
    pub id: PositionId,
    pub position: Position,
    pub exit_price: f64,
    pub exit_time: NaiveDateTime,
    /// Amount credited to cash by the close.
    pub cash_credit: f64,
    /// Economic profit or loss of the round trip.
    pub pnl: f64,
}
