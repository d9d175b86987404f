//! Core domain types and logic.

pub mod backtest;
pub mod config_validation;
pub mod error;
pub mod momentum;
pub mod prices;
pub mod rebalance;
pub mod returns;
pub mod rotation;
pub mod trials;
pub mod universe;
