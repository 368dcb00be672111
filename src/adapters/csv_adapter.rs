//! CSV price/market-cap panel adapter.
//!
//! Layout: a header row of asset identifiers after a leading date column,
//! then one row per date with numeric cells. Rows may come in any order.

use crate::domain::calendar::parse_date;
use crate::domain::error::BacktestError;
use crate::domain::frame::Frame;
use crate::ports::data_port::PanelSource;
use chrono::NaiveDate;
use std::fs;
use std::path::Path;

#[derive(Debug, Default, Clone, Copy)]
pub struct CsvAdapter;

impl CsvAdapter {
    pub fn new() -> Self {
        Self
    }
}

impl PanelSource for CsvAdapter {
    fn load_panel(&self, path: &Path) -> Result<Frame, BacktestError> {
        let is_csv = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("csv"));
        if !is_csv {
            return Err(BacktestError::UnsupportedFormat {
                path: path.display().to_string(),
            });
        }

        let content = fs::read_to_string(path).map_err(|e| {
            std::io::Error::new(
                e.kind(),
                format!("failed to read {}: {}", path.display(), e),
            )
        })?;
        parse_panel(&content)
    }
}

/// Parses CSV text into a frame sorted by date.
///
/// Empty cells load as NaN so that sparse market-cap files can be
/// forward-filled; anything else must parse as a number.
pub fn parse_panel(content: &str) -> Result<Frame, BacktestError> {
    let mut rdr = csv::Reader::from_reader(content.as_bytes());
    let headers = rdr
        .headers()
        .map_err(|e| BacktestError::InvalidPanel {
            reason: format!("CSV header error: {}", e),
        })?
        .clone();
    if headers.len() < 2 {
        return Err(BacktestError::InvalidPanel {
            reason: "expected a date column followed by at least one asset column".into(),
        });
    }
    let columns: Vec<String> = headers.iter().skip(1).map(|h| h.trim().to_string()).collect();

    let mut rows: Vec<(NaiveDate, Vec<f64>)> = Vec::new();
    for result in rdr.records() {
        let record = result.map_err(|e| BacktestError::InvalidPanel {
            reason: format!("CSV parse error: {}", e),
        })?;

        let date_str = record.get(0).unwrap_or_default();
        let date = parse_date(date_str)?;

        let mut values = Vec::with_capacity(columns.len());
        for (asset, cell) in columns.iter().zip(record.iter().skip(1)) {
            let cell = cell.trim();
            if cell.is_empty() {
                values.push(f64::NAN);
                continue;
            }
            let value: f64 = cell.parse().map_err(|_| BacktestError::InvalidPanel {
                reason: format!("invalid value '{}' for {} on {}", cell, asset, date),
            })?;
            values.push(value);
        }
        rows.push((date, values));
    }

    rows.sort_by_key(|(date, _)| *date);
    if let Some(w) = rows.windows(2).find(|w| w[0].0 == w[1].0) {
        return Err(BacktestError::InvalidPanel {
            reason: format!("duplicate date {}", w[0].0),
        });
    }

    let (dates, values): (Vec<NaiveDate>, Vec<Vec<f64>>) = rows.into_iter().unzip();
    Frame::from_rows(dates, columns, values)
}
