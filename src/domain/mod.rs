//! Core domain types and logic.

pub mod holidays;
pub mod calendar;
pub mod frame;
pub mod panel;
pub mod strategy;
pub mod weighting;
pub mod backtest;
pub mod metrics;
pub mod config_validation;
pub mod error;
