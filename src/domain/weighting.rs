//! Weight schemes: turning a composition matrix into allocations.

use crate::domain::error::BacktestError;
use crate::domain::frame::Frame;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WeightScheme {
    #[default]
    EqualWeight,
    MarketCapWeight,
}

impl FromStr for WeightScheme {
    type Err = BacktestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace(['_', '-', ' '], "").as_str() {
            "equalweight" | "equal" => Ok(WeightScheme::EqualWeight),
            "marketcapweight" | "marketcap" => Ok(WeightScheme::MarketCapWeight),
            _ => Err(BacktestError::UnknownWeightScheme(s.to_string())),
        }
    }
}

impl fmt::Display for WeightScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WeightScheme::EqualWeight => f.write_str("EqualWeight"),
            WeightScheme::MarketCapWeight => f.write_str("MarketCapWeight"),
        }
    }
}

/// A resolved weight scheme, holding the market caps already aligned onto
/// the price panel when capitalisation weighting is used.
#[derive(Debug, Clone, PartialEq)]
pub enum Weighting {
    Equal,
    MarketCap(Frame),
}

impl Weighting {
    pub fn resolve(
        scheme: WeightScheme,
        prices: &Frame,
        market_caps: Option<&Frame>,
    ) -> Result<Self, BacktestError> {
        match scheme {
            WeightScheme::EqualWeight => Ok(Weighting::Equal),
            WeightScheme::MarketCapWeight => {
                let caps = market_caps.ok_or(BacktestError::MissingMarketCapSource)?;
                Ok(Weighting::MarketCap(align_market_caps(prices, caps)?))
            }
        }
    }

    pub fn scheme(&self) -> WeightScheme {
        match self {
            Weighting::Equal => WeightScheme::EqualWeight,
            Weighting::MarketCap(_) => WeightScheme::MarketCapWeight,
        }
    }

    pub fn weights(&self, composition: &Frame) -> Frame {
        match self {
            Weighting::Equal => normalize_rows(composition),
            Weighting::MarketCap(caps) => {
                let mut weighted = Frame::filled_like(composition, f64::NAN);
                for c in 0..composition.n_cols() {
                    for r in 0..composition.n_rows() {
                        weighted.set(r, c, composition.get(r, c) * caps.get(r, c));
                    }
                }
                normalize_rows(&weighted)
            }
        }
    }
}

/// Forward-fills market caps onto the panel's dates and columns.
///
/// Columns the market caps lack stay NaN and end up with zero weight.
pub fn align_market_caps(prices: &Frame, caps: &Frame) -> Result<Frame, BacktestError> {
    if prices.common_columns(caps).is_empty() {
        return Err(BacktestError::NoCommonColumns);
    }
    Ok(caps.forward_fill_onto(prices.dates(), prices.columns()))
}

/// Divides every row by its sum of absolute values.
///
/// Undefined (NaN) cells count as zero; a row whose total is zero becomes
/// all zeros.
pub fn normalize_rows(signal: &Frame) -> Frame {
    let mut out = Frame::filled_like(signal, 0.0);
    for r in 0..signal.n_rows() {
        let total: f64 = (0..signal.n_cols())
            .map(|c| signal.get(r, c))
            .filter(|v| !v.is_nan())
            .map(f64::abs)
            .sum();
        if total == 0.0 || !total.is_finite() {
            continue;
        }
        for c in 0..signal.n_cols() {
            let v = signal.get(r, c);
            if !v.is_nan() {
                out.set(r, c, v / total);
            }
        }
    }
    out
}
