//! Trade log persistence port trait.

use crate::domain::error::MeanRevertError;
use crate::domain::trade::Trade;

/// Destination for a symbol's completed trade log.
pub trait TradeSink {
    fn record(&self, symbol: &str, trades: &[Trade]) -> Result<(), MeanRevertError>;
}
