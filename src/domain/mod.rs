//! Core domain types and logic.

pub mod price;
pub mod rolling;
pub mod signal;
pub mod position;
pub mod ledger;
pub mod trade;
pub mod backtest;
pub mod metrics;
pub mod universe;
pub mod config_validation;
pub mod error;
