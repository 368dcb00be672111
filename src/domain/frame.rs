//! Date-indexed numeric tables.
//!
//! `Frame` is a dense column-major array keyed by (date, column) through two
//! lookup maps. Price panels, market caps and every derived matrix of a
//! backtest share this representation. `Series` is a single date-indexed
//! column.

use crate::domain::error::BacktestError;
use chrono::NaiveDate;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub dates: Vec<NaiveDate>,
    pub values: Vec<f64>,
}

impl Series {
    pub fn new(dates: Vec<NaiveDate>, values: Vec<f64>) -> Result<Self, BacktestError> {
        if dates.len() != values.len() {
            return Err(BacktestError::InvalidPanel {
                reason: format!(
                    "series has {} dates but {} values",
                    dates.len(),
                    values.len()
                ),
            });
        }
        Ok(Self { dates, values })
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn last(&self) -> Option<f64> {
        self.values.last().copied()
    }

    pub fn get(&self, date: NaiveDate) -> Option<f64> {
        self.dates
            .binary_search(&date)
            .ok()
            .map(|i| self.values[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = (NaiveDate, f64)> + '_ {
        self.dates.iter().copied().zip(self.values.iter().copied())
    }

    /// Drops the first `n` observations.
    pub fn skip(&self, n: usize) -> Series {
        let n = n.min(self.len());
        Series {
            dates: self.dates[n..].to_vec(),
            values: self.values[n..].to_vec(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    dates: Vec<NaiveDate>,
    columns: Vec<String>,
    data: Vec<Vec<f64>>,
    date_index: HashMap<NaiveDate, usize>,
    column_index: HashMap<String, usize>,
}

impl Frame {
    /// Builds a frame from column-major data.
    ///
    /// Dates must be strictly increasing, column names unique, and every
    /// column as long as the date axis.
    pub fn new(
        dates: Vec<NaiveDate>,
        columns: Vec<String>,
        data: Vec<Vec<f64>>,
    ) -> Result<Self, BacktestError> {
        if columns.len() != data.len() {
            return Err(BacktestError::InvalidPanel {
                reason: format!("{} column names for {} columns", columns.len(), data.len()),
            });
        }
        for (name, values) in columns.iter().zip(&data) {
            if values.len() != dates.len() {
                return Err(BacktestError::InvalidPanel {
                    reason: format!(
                        "column {} has {} values, expected {}",
                        name,
                        values.len(),
                        dates.len()
                    ),
                });
            }
        }
        if let Some(w) = dates.windows(2).find(|w| w[0] >= w[1]) {
            return Err(BacktestError::InvalidPanel {
                reason: format!("dates not strictly increasing at {}", w[1]),
            });
        }

        let mut column_index = HashMap::with_capacity(columns.len());
        for (i, name) in columns.iter().enumerate() {
            if column_index.insert(name.clone(), i).is_some() {
                return Err(BacktestError::InvalidPanel {
                    reason: format!("duplicate column {}", name),
                });
            }
        }
        let date_index = dates.iter().enumerate().map(|(i, &d)| (d, i)).collect();

        Ok(Self {
            dates,
            columns,
            data,
            date_index,
            column_index,
        })
    }

    /// Builds a frame from row-major data.
    pub fn from_rows(
        dates: Vec<NaiveDate>,
        columns: Vec<String>,
        rows: Vec<Vec<f64>>,
    ) -> Result<Self, BacktestError> {
        let width = columns.len();
        if let Some((i, _)) = rows.iter().enumerate().find(|(_, r)| r.len() != width) {
            return Err(BacktestError::InvalidPanel {
                reason: format!("row {} has {} values, expected {}", i, rows[i].len(), width),
            });
        }
        let data = (0..width)
            .map(|c| rows.iter().map(|row| row[c]).collect())
            .collect();
        Self::new(dates, columns, data)
    }

    /// A frame with the same axes as `other`, every cell set to `value`.
    pub fn filled_like(other: &Frame, value: f64) -> Self {
        Self {
            dates: other.dates.clone(),
            columns: other.columns.clone(),
            data: vec![vec![value; other.n_rows()]; other.n_cols()],
            date_index: other.date_index.clone(),
            column_index: other.column_index.clone(),
        }
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn n_rows(&self) -> usize {
        self.dates.len()
    }

    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.n_rows() == 0 || self.n_cols() == 0
    }

    pub fn row_of(&self, date: NaiveDate) -> Option<usize> {
        self.date_index.get(&date).copied()
    }

    pub fn column_of(&self, name: &str) -> Option<usize> {
        self.column_index.get(name).copied()
    }

    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.data[col][row]
    }

    pub fn set(&mut self, row: usize, col: usize, value: f64) {
        self.data[col][row] = value;
    }

    pub fn value(&self, date: NaiveDate, column: &str) -> Option<f64> {
        let row = self.row_of(date)?;
        let col = self.column_of(column)?;
        Some(self.get(row, col))
    }

    pub fn column(&self, col: usize) -> &[f64] {
        &self.data[col]
    }

    pub fn column_by_name(&self, name: &str) -> Option<&[f64]> {
        self.column_of(name).map(|c| self.column(c))
    }

    pub fn row(&self, row: usize) -> Vec<f64> {
        self.data.iter().map(|col| col[row]).collect()
    }

    pub fn column_series(&self, col: usize) -> Series {
        Series {
            dates: self.dates.clone(),
            values: self.data[col].clone(),
        }
    }

    /// Column names present in both frames, in this frame's order.
    pub fn common_columns(&self, other: &Frame) -> Vec<String> {
        self.columns
            .iter()
            .filter(|c| other.column_index.contains_key(*c))
            .cloned()
            .collect()
    }

    /// Aligns this frame onto `dates` and `columns`.
    ///
    /// Each target date takes the last observation at or before it; dates
    /// before the first observation and columns this frame lacks are NaN.
    pub fn forward_fill_onto(&self, dates: &[NaiveDate], columns: &[String]) -> Frame {
        let mut data = Vec::with_capacity(columns.len());
        for name in columns {
            let source = self.column_by_name(name);
            let mut values = Vec::with_capacity(dates.len());
            let mut cursor = 0usize;
            let mut last = f64::NAN;
            for &date in dates {
                if let Some(source) = source {
                    while cursor < self.dates.len() && self.dates[cursor] <= date {
                        if !source[cursor].is_nan() {
                            last = source[cursor];
                        }
                        cursor += 1;
                    }
                }
                values.push(last);
            }
            data.push(values);
        }

        Frame {
            dates: dates.to_vec(),
            columns: columns.to_vec(),
            data,
            date_index: dates.iter().enumerate().map(|(i, &d)| (d, i)).collect(),
            column_index: columns
                .iter()
                .enumerate()
                .map(|(i, c)| (c.clone(), i))
                .collect(),
        }
    }

    /// Drops the first `n` rows.
    pub fn skip_rows(&self, n: usize) -> Frame {
        let n = n.min(self.n_rows());
        let dates = self.dates[n..].to_vec();
        Frame {
            date_index: dates.iter().enumerate().map(|(i, &d)| (d, i)).collect(),
            dates,
            columns: self.columns.clone(),
            data: self.data.iter().map(|col| col[n..].to_vec()).collect(),
            column_index: self.column_index.clone(),
        }
    }

    /// Truncates to rows `0..end`, keeping only the given column when set.
    pub fn head(&self, end: usize, column: Option<usize>) -> Frame {
        let end = end.min(self.n_rows());
        let dates = self.dates[..end].to_vec();
        let (columns, data): (Vec<String>, Vec<Vec<f64>>) = match column {
            Some(c) => (vec![self.columns[c].clone()], vec![self.data[c][..end].to_vec()]),
            None => (
                self.columns.clone(),
                self.data.iter().map(|col| col[..end].to_vec()).collect(),
            ),
        };
        Frame {
            date_index: dates.iter().enumerate().map(|(i, &d)| (d, i)).collect(),
            column_index: columns
                .iter()
                .enumerate()
                .map(|(i, c)| (c.clone(), i))
                .collect(),
            dates,
            columns,
            data,
        }
    }
}
