//! Validated price panel.

use crate::domain::error::BacktestError;
use crate::domain::frame::Frame;
use chrono::NaiveDate;
use std::ops::Deref;

/// Immutable date × asset price table.
///
/// Dates are strictly increasing and unique, assets unique, and every cell a
/// finite number. Wrap it in an `Arc` to share one panel across backtests.
#[derive(Debug, Clone, PartialEq)]
pub struct PricePanel {
    frame: Frame,
}

impl PricePanel {
    pub fn new(frame: Frame) -> Result<Self, BacktestError> {
        if frame.is_empty() {
            return Err(BacktestError::EmptyPanel);
        }
        for (c, name) in frame.columns().iter().enumerate() {
            if let Some(row) = frame.column(c).iter().position(|v| !v.is_finite()) {
                return Err(BacktestError::InvalidPanel {
                    reason: format!(
                        "non-finite price for {} on {}",
                        name,
                        frame.dates()[row]
                    ),
                });
            }
        }
        Ok(Self { frame })
    }

    pub fn start_date(&self) -> NaiveDate {
        self.frame.dates()[0]
    }

    pub fn end_date(&self) -> NaiveDate {
        self.frame.dates()[self.frame.n_rows() - 1]
    }

    pub fn frame(&self) -> &Frame {
        &self.frame
    }
}

impl Deref for PricePanel {
    type Target = Frame;

    fn deref(&self) -> &Frame {
        &self.frame
    }
}
