//! CSV report adapter: one row per date with the period and cumulative
//! portfolio return.

use crate::domain::calendar::DATE_FORMAT;
use crate::domain::error::BacktestError;
use crate::domain::metrics::BacktestResult;
use crate::ports::report_port::ReportPort;
use std::path::Path;

#[derive(Debug, Default, Clone, Copy)]
pub struct CsvReportAdapter;

impl CsvReportAdapter {
    pub fn new() -> Self {
        Self
    }
}

fn csv_error(err: csv::Error) -> BacktestError {
    match err.into_kind() {
        csv::ErrorKind::Io(e) => BacktestError::Io(e),
        other => BacktestError::Io(std::io::Error::other(format!("{:?}", other))),
    }
}

impl ReportPort for CsvReportAdapter {
    fn write(&self, result: &BacktestResult, output_path: &Path) -> Result<(), BacktestError> {
        let mut wtr = csv::Writer::from_path(output_path).map_err(csv_error)?;
        wtr.write_record(["date", "portfolio_return", "cumulative_return"])
            .map_err(csv_error)?;

        let returns = result.portfolio_returns();
        let cumulative = result.cumulative_returns();
        for ((date, r), c) in returns.iter().zip(cumulative.values.iter()) {
            wtr.write_record([
                date.format(DATE_FORMAT).to_string(),
                r.to_string(),
                c.to_string(),
            ])
            .map_err(csv_error)?;
        }
        wtr.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::frame::Series;
    use crate::domain::metrics::{ResultOptions, TradeStats};
    use chrono::NaiveDate;

    fn sample_result() -> BacktestResult {
        let dates = vec![
            NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 3).unwrap(),
        ];
        let returns = Series::new(dates.clone(), vec![0.0, 0.5]).unwrap();
        let cumulative = Series::new(dates, vec![0.0, 0.5]).unwrap();
        BacktestResult::new(
            returns,
            cumulative,
            0.0,
            TradeStats::default(),
            ResultOptions::default(),
        )
        .unwrap()
    }

    #[test]
    fn writes_one_row_per_date() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("returns.csv");
        CsvReportAdapter::new().write(&sample_result(), &path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(
            lines,
            vec![
                "date,portfolio_return,cumulative_return",
                "2024-01-02,0,0",
                "2024-01-03,0.5,0.5",
            ]
        );
    }

    #[test]
    fn unwritable_path_is_io_error() {
        let err = CsvReportAdapter::new()
            .write(&sample_result(), Path::new("/nonexistent/dir/out.csv"))
            .unwrap_err();
        assert!(matches!(err, BacktestError::Io(_)));
    }
}
