//! Position ledger: the cash balance and the set of open positions.
//!
//! The ledger is the only owner of mutable trading state. Positions are
//! keyed by a monotonically increasing [`PositionId`], so iteration order
//! over open positions is insertion order.

use chrono::NaiveDateTime;
use std::collections::BTreeMap;

use super::error::MeanRevertError;
use super::position::{ClosedPosition, Position, PositionId, Side};

#[derive(Debug, Clone, PartialEq)]
pub struct PositionLedger {
    cash: f64,
    positions: BTreeMap<PositionId, Position>,
    next_id: u64,
}

impl PositionLedger {
    pub fn new(initial_cash: f64) -> Self {
        PositionLedger {
            cash: initial_cash,
            positions: BTreeMap::new(),
            next_id: 1,
        }
    }

    /// Full-precision cash balance.
    pub fn cash(&self) -> f64 {
        self.cash
    }

    pub fn position_count(&self) -> usize {
        self.positions.len()
    }

    pub fn get(&self, id: PositionId) -> Option<&Position> {
        self.positions.get(&id)
    }

    /// Open a position. LONG debits `qty * price`; SHORT debits nothing.
    pub fn open(
        &mut self,
        side: Side,
        price: f64,
        qty: i64,
        time: NaiveDateTime,
    ) -> Result<PositionId, MeanRevertError> {
        if qty <= 0 {
            return Err(MeanRevertError::InvalidQuantity { quantity: qty });
        }

        let position = Position {
            side,
            entry_price: price,
            quantity: qty,
            entry_time: time,
        };
        self.cash -= position.entry_debit();

        let id = PositionId(self.next_id);
        self.next_id += 1;
        self.positions.insert(id, position);
        Ok(id)
    }

    /// Close a position at `price`, crediting cash with its settlement.
    pub fn close(
        &mut self,
        id: PositionId,
        price: f64,
        time: NaiveDateTime,
    ) -> Result<ClosedPosition, MeanRevertError> {
        let position = self
            .positions
            .remove(&id)
            .ok_or(MeanRevertError::UnknownPosition { id: id.0 })?;

        let cash_credit = position.exit_credit(price);
        self.cash += cash_credit;

        Ok(ClosedPosition {
            id,
            pnl: position.unrealized_pnl(price),
            position,
            exit_price: price,
            exit_time: time,
            cash_credit,
        })
    }

    /// Open positions in the order they were opened.
    pub fn open_positions(&self) -> impl Iterator<Item = (PositionId, &Position)> {
        self.positions.iter().map(|(&id, pos)| (id, pos))
    }

    pub fn open_ids(&self) -> Vec<PositionId> {
        self.positions.keys().copied().collect()
    }
}
