//! Symbol universe and multi-symbol orchestration.
//!
//! Parses symbol lists from configuration and runs one independent backtest
//! per symbol. Every symbol owns its own ledger and trade log, so symbols
//! are run in parallel and one symbol's failure never touches another's.

use rayon::prelude::*;
use std::collections::HashSet;
use tracing::{info, warn};

use super::backtest::{BacktestEngine, BacktestResult};
use super::error::MeanRevertError;
use super::price::PricePoint;

#[derive(Debug, Clone, thiserror::Error)]
pub enum UniverseError {
    #[error("empty token in symbol list")]
    EmptyToken,

    #[error("duplicate symbol: {0}")]
    DuplicateSymbol(String),
}

pub fn parse_symbols(input: &str) -> Result<Vec<String>, UniverseError> {
    let mut symbols = Vec::new();
    let mut seen = HashSet::new();

    for token in input.split(',') {
        let trimmed = token.trim();
        if trimmed.is_empty() {
            return Err(UniverseError::EmptyToken);
        }
        let symbol = trimmed.to_uppercase();
        if !seen.insert(symbol.clone()) {
            return Err(UniverseError::DuplicateSymbol(symbol));
        }
        symbols.push(symbol);
    }

    Ok(symbols)
}

/// Result of one symbol's run, success or failure.
#[derive(Debug)]
pub struct SymbolOutcome {
    pub symbol: String,
    pub result: Result<BacktestResult, MeanRevertError>,
}

impl SymbolOutcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Load and backtest every symbol. Outcomes come back in input order.
pub fn run_universe<F>(engine: &BacktestEngine, symbols: &[String], load: F) -> Vec<SymbolOutcome>
where
    F: Fn(&str) -> Result<Vec<PricePoint>, MeanRevertError> + Sync,
{
    symbols
        .par_iter()
        .map(|symbol| {
            let result = load(symbol).and_then(|series| engine.run(symbol, &series));
            match &result {
                Ok(r) => info!(
                    symbol = %symbol,
                    trades = r.trades.len(),
                    final_cash = r.final_cash,
                    "symbol done"
                ),
                Err(e) => warn!(symbol = %symbol, error = %e, "symbol failed"),
            }
            SymbolOutcome {
                symbol: symbol.clone(),
                result,
            }
        })
        .collect()
}

/// Counts of succeeded and failed symbols.
pub fn tally(outcomes: &[SymbolOutcome]) -> (usize, usize) {
    let ok = outcomes.iter().filter(|o| o.is_ok()).count();
    (ok, outcomes.len() - ok)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::backtest::BacktestConfig;
    use chrono::{Duration, NaiveDate};

    #[test]
    fn parse_symbols_basic() {
        let result = parse_symbols("RELIANCE,VOLTAS,TATVA").unwrap();
        assert_eq!(result, vec!["RELIANCE", "VOLTAS", "TATVA"]);
    }

    #[test]
    fn parse_symbols_trims_and_uppercases() {
        let result = parse_symbols("  reliance , Voltas ").unwrap();
        assert_eq!(result, vec!["RELIANCE", "VOLTAS"]);
    }

    #[test]
    fn parse_symbols_empty_token() {
        let result = parse_symbols("RELIANCE,,VOLTAS");
        assert!(matches!(result, Err(UniverseError::EmptyToken)));
    }

    #[test]
    fn parse_symbols_duplicate() {
        let result = parse_symbols("RELIANCE,voltas,VOLTAS");
        assert!(matches!(result, Err(UniverseError::DuplicateSymbol(s)) if s == "VOLTAS"));
    }

    #[test]
    fn failures_are_isolated_per_symbol() {
        let engine = BacktestEngine::new(BacktestConfig {
            window: 3,
            ..Default::default()
        })
        .unwrap();
        let start = NaiveDate::from_ymd_opt(2024, 6, 3)
            .unwrap()
            .and_hms_opt(9, 15, 0)
            .unwrap();
        let symbols = vec!["GOOD".to_string(), "BAD".to_string(), "SHORT".to_string()];

        let outcomes = run_universe(&engine, &symbols, |symbol| match symbol {
            "BAD" => Err(MeanRevertError::DataSource {
                reason: "token not found".into(),
            }),
            "SHORT" => Ok(vec![PricePoint::new(start, 100.0)]),
            _ => Ok((0..10)
                .map(|i| PricePoint::new(start + Duration::minutes(5 * i), 100.0 + (i % 3) as f64))
                .collect()),
        });

        assert_eq!(outcomes.len(), 3);
        assert_eq!(outcomes[0].symbol, "GOOD");
        assert!(outcomes[0].is_ok());
        assert!(matches!(
            outcomes[1].result,
            Err(MeanRevertError::DataSource { .. })
        ));
        let short = outcomes[2].result.as_ref().unwrap();
        assert!(short.trades.is_empty());
        assert_eq!(tally(&outcomes), (2, 1));
    }
}
