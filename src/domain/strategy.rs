//! Strategy capability and the look-ahead-safe history view.
//!
//! A strategy is a decision function: given the prices observed up to and
//! including the current date and the position currently held, it returns
//! the new position (e.g. -1/0/1, or a continuous signal). The backtester is
//! generic over this trait.

use crate::domain::error::BacktestError;
use crate::domain::frame::Frame;
use chrono::NaiveDate;
use std::collections::BTreeMap;

/// Named side datasets for calibration, e.g. valuation ratios keyed "PER",
/// "PBR". Each frame shares the date/asset layout of a price panel.
pub type SideData = BTreeMap<String, Frame>;

/// Prices observed through the current date.
///
/// In per-asset mode the view exposes a single asset; in multi-asset mode it
/// exposes every column. Rows after the current date are unreachable.
#[derive(Debug, Clone, Copy)]
pub struct History<'a> {
    frame: &'a Frame,
    rows: usize,
    column: Option<usize>,
}

impl<'a> History<'a> {
    /// View of rows `0..=current_row`, optionally restricted to one column.
    pub fn new(frame: &'a Frame, current_row: usize, column: Option<usize>) -> Self {
        Self {
            frame,
            rows: (current_row + 1).min(frame.n_rows()),
            column,
        }
    }

    pub fn len(&self) -> usize {
        self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    pub fn dates(&self) -> &'a [NaiveDate] {
        &self.frame.dates()[..self.rows]
    }

    pub fn current_date(&self) -> Option<NaiveDate> {
        self.dates().last().copied()
    }

    pub fn is_single_asset(&self) -> bool {
        self.column.is_some() || self.frame.n_cols() == 1
    }

    pub fn assets(&self) -> Vec<&'a str> {
        match self.column {
            Some(c) => vec![self.frame.columns()[c].as_str()],
            None => self.frame.columns().iter().map(String::as_str).collect(),
        }
    }

    pub fn prices(&self, asset: &str) -> Option<&'a [f64]> {
        let col = self.frame.column_of(asset)?;
        if self.column.is_some_and(|c| c != col) {
            return None;
        }
        Some(&self.frame.column(col)[..self.rows])
    }

    /// The price history of a single-asset view.
    pub fn series(&self) -> Option<&'a [f64]> {
        match self.column {
            Some(c) => Some(&self.frame.column(c)[..self.rows]),
            None if self.frame.n_cols() == 1 => Some(&self.frame.column(0)[..self.rows]),
            None => None,
        }
    }

    /// Per-date mean price across the visible assets.
    pub fn basket(&self) -> Vec<f64> {
        if let Some(series) = self.series() {
            return series.to_vec();
        }
        let n = self.frame.n_cols() as f64;
        (0..self.rows)
            .map(|r| {
                (0..self.frame.n_cols())
                    .map(|c| self.frame.get(r, c))
                    .sum::<f64>()
                    / n
            })
            .collect()
    }

    /// Owned copy of the visible window.
    pub fn to_frame(&self) -> Frame {
        self.frame.head(self.rows, self.column)
    }
}

pub trait Strategy {
    fn get_position(&self, history: &History<'_>, current_position: f64) -> f64;

    /// One-time calibration on side data before the backtest starts.
    /// Strategies that need no calibration keep the default.
    fn fit(&mut self, _side_data: &SideData) -> Result<(), BacktestError> {
        Ok(())
    }
}

/// Always returns the same position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConstantPosition(pub f64);

impl Strategy for ConstantPosition {
    fn get_position(&self, _history: &History<'_>, _current_position: f64) -> f64 {
        self.0
    }
}

/// Long when the short moving average is above the long one, short when
/// below. Keeps the current position while warming up or on a tie.
#[derive(Debug, Clone, PartialEq)]
pub struct MovingAverageCrossover {
    short_window: usize,
    long_window: usize,
    exponential: bool,
}

impl MovingAverageCrossover {
    pub fn new(
        short_window: usize,
        long_window: usize,
        exponential: bool,
    ) -> Result<Self, BacktestError> {
        if short_window == 0 || short_window >= long_window {
            return Err(BacktestError::InvalidOption {
                name: "moving average windows".into(),
                reason: format!(
                    "short window ({}) must be positive and below the long window ({})",
                    short_window, long_window
                ),
            });
        }
        Ok(Self {
            short_window,
            long_window,
            exponential,
        })
    }

    fn average(&self, prices: &[f64], window: usize) -> f64 {
        if self.exponential {
            let alpha = 2.0 / (window as f64 + 1.0);
            prices[1..]
                .iter()
                .fold(prices[0], |ema, &p| alpha * p + (1.0 - alpha) * ema)
        } else {
            let tail = &prices[prices.len() - window..];
            tail.iter().sum::<f64>() / window as f64
        }
    }
}

impl Strategy for MovingAverageCrossover {
    fn get_position(&self, history: &History<'_>, current_position: f64) -> f64 {
        let prices = history.basket();
        if prices.len() < self.long_window {
            return current_position;
        }

        let short = self.average(&prices, self.short_window);
        let long = self.average(&prices, self.long_window);
        if short > long {
            1.0
        } else if short < long {
            -1.0
        } else {
            current_position
        }
    }
}
