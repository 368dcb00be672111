#![allow(dead_code)]

use chrono::{Datelike, NaiveDate, Weekday};
use panelbt::domain::frame::Frame;
use std::io::Write;

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// `count` consecutive weekdays starting at `start` (holidays not skipped).
pub fn weekdays(start: NaiveDate, count: usize) -> Vec<NaiveDate> {
    start
        .iter_days()
        .filter(|d| !matches!(d.weekday(), Weekday::Sat | Weekday::Sun))
        .take(count)
        .collect()
}

pub fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

/// Linear price paths: asset `i` starts at `starts[i]` and moves by
/// `steps[i]` per row.
pub fn linear_panel(dates: Vec<NaiveDate>, assets: &[&str], starts: &[f64], steps: &[f64]) -> Frame {
    let n = dates.len();
    let data = starts
        .iter()
        .zip(steps)
        .map(|(&s, &step)| (0..n).map(|i| s + step * i as f64).collect())
        .collect();
    Frame::new(dates, names(assets), data).unwrap()
}

/// Prices that rise for `period` rows, then fall for `period` rows, repeated.
pub fn zigzag_panel(dates: Vec<NaiveDate>, assets: &[&str], period: usize) -> Frame {
    let n = dates.len();
    let data = (0..assets.len())
        .map(|a| {
            let mut price = 100.0 + 10.0 * a as f64;
            (0..n)
                .map(|i| {
                    if i > 0 {
                        price += if (i / period) % 2 == 0 { 1.0 } else { -1.0 };
                    }
                    price
                })
                .collect()
        })
        .collect();
    Frame::new(dates, names(assets), data).unwrap()
}

pub fn frame_to_csv(frame: &Frame) -> String {
    let mut out = String::from("date");
    for c in frame.columns() {
        out.push(',');
        out.push_str(c);
    }
    out.push('\n');
    for (r, d) in frame.dates().iter().enumerate() {
        out.push_str(&d.format("%Y-%m-%d").to_string());
        for v in frame.row(r) {
            out.push_str(&format!(",{}", v));
        }
        out.push('\n');
    }
    out
}

pub fn write_temp_file(content: &str, suffix: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

pub fn write_temp_csv(frame: &Frame) -> tempfile::NamedTempFile {
    write_temp_file(&frame_to_csv(frame), ".csv")
}

pub fn write_temp_ini(content: &str) -> tempfile::NamedTempFile {
    write_temp_file(content, ".ini")
}
