//! Data access port trait.

use crate::domain::error::BacktestError;
use crate::domain::frame::Frame;
use std::path::Path;

/// Loads a date × asset table (prices or market caps).
pub trait PanelSource {
    fn load_panel(&self, path: &Path) -> Result<Frame, BacktestError>;
}
