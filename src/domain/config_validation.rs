//! Configuration validation.
//!
//! Checks every INI field up-front, before any data is loaded.

use crate::domain::calendar::Frequency;
use crate::domain::error::BacktestError;
use crate::domain::weighting::WeightScheme;
use crate::ports::config_port::ConfigPort;

pub const STRATEGY_MOVING_AVERAGE: &str = "moving_average";
pub const STRATEGY_CONSTANT: &str = "constant";

pub fn validate_backtest_config(config: &dyn ConfigPort) -> Result<(), BacktestError> {
    validate_weight_scheme(config)?;
    validate_frequency(config)?;
    validate_costs(config)?;
    validate_special_start(config)?;
    validate_result_options(config)?;
    Ok(())
}

pub fn validate_strategy_config(config: &dyn ConfigPort) -> Result<(), BacktestError> {
    match strategy_name(config).as_str() {
        STRATEGY_MOVING_AVERAGE => validate_windows(config),
        STRATEGY_CONSTANT => {
            read_double(config, "strategy", "position", 1.0)?;
            Ok(())
        }
        other => Err(BacktestError::ConfigInvalid {
            section: "strategy".to_string(),
            key: "name".to_string(),
            reason: format!(
                "unknown strategy '{}' (expected {} or {})",
                other, STRATEGY_MOVING_AVERAGE, STRATEGY_CONSTANT
            ),
        }),
    }
}

pub fn strategy_name(config: &dyn ConfigPort) -> String {
    config
        .get_string("strategy", "name")
        .map(|s| s.trim().to_lowercase())
        .unwrap_or_else(|| STRATEGY_MOVING_AVERAGE.to_string())
}

/// Reads a float, failing on a present but non-numeric or non-finite value.
pub fn read_double(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: f64,
) -> Result<f64, BacktestError> {
    match config.get_string(section, key) {
        None => Ok(default),
        Some(raw) => match raw.trim().parse::<f64>() {
            Ok(v) if v.is_finite() => Ok(v),
            _ => Err(BacktestError::ConfigInvalid {
                section: section.to_string(),
                key: key.to_string(),
                reason: format!("'{}' is not a finite number", raw),
            }),
        },
    }
}

/// Reads a non-negative integer.
pub fn read_count(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: usize,
) -> Result<usize, BacktestError> {
    match config.get_string(section, key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse::<usize>()
            .map_err(|_| BacktestError::ConfigInvalid {
                section: section.to_string(),
                key: key.to_string(),
                reason: format!("'{}' is not a non-negative integer", raw),
            }),
    }
}

pub fn read_weight_scheme(config: &dyn ConfigPort) -> Result<WeightScheme, BacktestError> {
    match config.get_string("backtest", "weight_scheme") {
        Some(s) => s.parse(),
        None => Ok(WeightScheme::default()),
    }
}

pub fn read_frequency(config: &dyn ConfigPort) -> Result<Frequency, BacktestError> {
    match config.get_string("backtest", "rebalancing_frequency") {
        Some(s) => s.parse(),
        None => Ok(Frequency::Monthly),
    }
}

fn validate_weight_scheme(config: &dyn ConfigPort) -> Result<(), BacktestError> {
    let scheme = read_weight_scheme(config)?;
    if scheme == WeightScheme::MarketCapWeight {
        match config.get_string("backtest", "market_caps") {
            Some(s) if !s.trim().is_empty() => {}
            _ => {
                return Err(BacktestError::ConfigMissing {
                    section: "backtest".to_string(),
                    key: "market_caps".to_string(),
                });
            }
        }
    }
    Ok(())
}

fn validate_frequency(config: &dyn ConfigPort) -> Result<(), BacktestError> {
    read_frequency(config)?;
    Ok(())
}

fn validate_costs(config: &dyn ConfigPort) -> Result<(), BacktestError> {
    // Any finite rate, negative included.
    read_double(config, "backtest", "risk_free_rate", 0.0)?;
    for key in ["transaction_cost", "slippage"] {
        let value = read_double(config, "backtest", key, 0.0)?;
        if value < 0.0 {
            return Err(BacktestError::ConfigInvalid {
                section: "backtest".to_string(),
                key: key.to_string(),
                reason: format!("{} must be non-negative", key),
            });
        }
    }
    Ok(())
}

fn validate_special_start(config: &dyn ConfigPort) -> Result<(), BacktestError> {
    read_count(config, "backtest", "special_start", 1)?;
    Ok(())
}

fn validate_result_options(config: &dyn ConfigPort) -> Result<(), BacktestError> {
    let periods = read_count(config, "result", "periods_per_year", 252)?;
    if periods == 0 {
        return Err(BacktestError::ConfigInvalid {
            section: "result".to_string(),
            key: "periods_per_year".to_string(),
            reason: "periods_per_year must be positive".to_string(),
        });
    }
    let alpha = read_double(config, "result", "tail_probability", 0.05)?;
    if alpha <= 0.0 || alpha >= 1.0 {
        return Err(BacktestError::ConfigInvalid {
            section: "result".to_string(),
            key: "tail_probability".to_string(),
            reason: "tail_probability must be between 0 and 1".to_string(),
        });
    }
    Ok(())
}

fn validate_windows(config: &dyn ConfigPort) -> Result<(), BacktestError> {
    let short = read_count(config, "strategy", "short_window", 20)?;
    let long = read_count(config, "strategy", "long_window", 50)?;
    if short == 0 {
        return Err(BacktestError::ConfigInvalid {
            section: "strategy".to_string(),
            key: "short_window".to_string(),
            reason: "short_window must be positive".to_string(),
        });
    }
    if short >= long {
        return Err(BacktestError::ConfigInvalid {
            section: "strategy".to_string(),
            key: "long_window".to_string(),
            reason: "long_window must be greater than short_window".to_string(),
        });
    }
    Ok(())
}
