//! Market data port trait.

use crate::domain::error::MeanRevertError;
use crate::domain::price::PricePoint;
use chrono::NaiveDate;

/// Source of intraday price series.
///
/// `Sync` so one source can serve every symbol of a parallel run.
pub trait DataPort: Sync {
    /// Prices for `symbol`, ascending by timestamp. `start` and `end` bound
    /// the trading date inclusively when given.
    fn fetch_prices(
        &self,
        symbol: &str,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<Vec<PricePoint>, MeanRevertError>;

    fn list_symbols(&self) -> Result<Vec<String>, MeanRevertError>;
}
