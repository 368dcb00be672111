//! Trading-day and rebalancing-schedule calendar.
//!
//! `all_dates` holds the business days of the range minus the built-in
//! holidays. `rebalancing_dates` is the subset selected by the frequency,
//! each candidate moved forward to the next trading day. The schedule can be
//! edited afterwards through explicit mutators.

use crate::domain::error::{BacktestError, ScheduleError};
use crate::domain::holidays::holidays_for_years;
use chrono::{Datelike, Duration, NaiveDate, Weekday};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

pub const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Frequency {
    Daily,
    Weekly,
    /// The 1st and 15th of every month.
    SemiMonthly,
    Monthly,
    Quarterly,
    Yearly,
}

impl FromStr for Frequency {
    type Err = BacktestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "daily" => Ok(Frequency::Daily),
            "weekly" => Ok(Frequency::Weekly),
            "semi-monthly" | "semimonthly" => Ok(Frequency::SemiMonthly),
            "monthly" => Ok(Frequency::Monthly),
            "quarterly" => Ok(Frequency::Quarterly),
            "yearly" | "annual" | "annually" => Ok(Frequency::Yearly),
            _ => Err(BacktestError::UnsupportedFrequency(s.to_string())),
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Frequency::Daily => "daily",
            Frequency::Weekly => "weekly",
            Frequency::SemiMonthly => "semi-monthly",
            Frequency::Monthly => "monthly",
            Frequency::Quarterly => "quarterly",
            Frequency::Yearly => "yearly",
        };
        f.write_str(name)
    }
}

pub fn parse_date(input: &str) -> Result<NaiveDate, BacktestError> {
    NaiveDate::parse_from_str(input.trim(), DATE_FORMAT).map_err(|_| BacktestError::DateParse {
        input: input.to_string(),
    })
}

/// Anything the calendar accepts as a date: a `NaiveDate` or a
/// `YYYY-MM-DD` string.
pub trait IntoDate {
    fn into_date(self) -> Result<NaiveDate, BacktestError>;
}

impl IntoDate for NaiveDate {
    fn into_date(self) -> Result<NaiveDate, BacktestError> {
        Ok(self)
    }
}

impl IntoDate for &str {
    fn into_date(self) -> Result<NaiveDate, BacktestError> {
        parse_date(self)
    }
}

impl IntoDate for &String {
    fn into_date(self) -> Result<NaiveDate, BacktestError> {
        parse_date(self)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Calendar {
    frequency: Frequency,
    start_date: NaiveDate,
    end_date: NaiveDate,
    holidays: BTreeSet<NaiveDate>,
    all_dates: Vec<NaiveDate>,
    rebalancing_dates: BTreeSet<NaiveDate>,
}

impl Calendar {
    pub fn new(
        frequency: Frequency,
        start_date: impl IntoDate,
        end_date: impl IntoDate,
    ) -> Result<Self, BacktestError> {
        let start_date = start_date.into_date()?;
        let end_date = end_date.into_date()?;
        if start_date >= end_date {
            return Err(BacktestError::InvalidDateRange {
                start: start_date,
                end: end_date,
            });
        }

        let holidays = holidays_for_years(start_date.year(), end_date.year());
        let mut calendar = Calendar {
            frequency,
            start_date,
            end_date,
            holidays,
            all_dates: Vec::new(),
            rebalancing_dates: BTreeSet::new(),
        };

        calendar.all_dates = day_range(start_date, end_date)
            .filter(|&d| calendar.is_trading_day(d))
            .collect();

        // Candidates that would roll past end_date are left out.
        calendar.rebalancing_dates = calendar
            .candidates()
            .into_iter()
            .filter_map(|d| calendar.adjust_to_next_trading_day(d).ok())
            .collect();

        Ok(calendar)
    }

    fn candidates(&self) -> Vec<NaiveDate> {
        let (start, end) = (self.start_date, self.end_date);
        match self.frequency {
            Frequency::Daily => day_range(start, end).collect(),
            Frequency::Weekly => day_range(start, end)
                .filter(|d| d.weekday() == Weekday::Mon)
                .collect(),
            Frequency::SemiMonthly => month_days(start, end, 1, &[1, 15]),
            Frequency::Monthly => month_days(start, end, 1, &[1]),
            Frequency::Quarterly => month_days(start, end, 3, &[1]),
            Frequency::Yearly => month_days(start, end, 12, &[1]),
        }
    }

    pub fn frequency(&self) -> Frequency {
        self.frequency
    }

    pub fn start_date(&self) -> NaiveDate {
        self.start_date
    }

    pub fn end_date(&self) -> NaiveDate {
        self.end_date
    }

    pub fn holidays(&self) -> &BTreeSet<NaiveDate> {
        &self.holidays
    }

    pub fn all_dates(&self) -> &[NaiveDate] {
        &self.all_dates
    }

    pub fn rebalancing_dates(&self) -> &BTreeSet<NaiveDate> {
        &self.rebalancing_dates
    }

    pub fn is_holiday(&self, date: NaiveDate) -> bool {
        self.holidays.contains(&date)
    }

    pub fn is_trading_day(&self, date: NaiveDate) -> bool {
        !matches!(date.weekday(), Weekday::Sat | Weekday::Sun) && !self.is_holiday(date)
    }

    /// Returns `date` if it is a trading day, else the next one.
    pub fn adjust_to_next_trading_day(&self, date: NaiveDate) -> Result<NaiveDate, ScheduleError> {
        let mut adjusted = date;
        while !self.is_trading_day(adjusted) && adjusted <= self.end_date {
            adjusted += Duration::days(1);
        }
        if adjusted > self.end_date {
            return Err(ScheduleError::AdjustmentPastEnd {
                date,
                end: self.end_date,
            });
        }
        Ok(adjusted)
    }

    /// Fast membership test for the backtest loop.
    pub fn rebalances_on(&self, date: NaiveDate) -> bool {
        self.rebalancing_dates.contains(&date)
    }

    pub fn is_rebalancing_date(&self, date: impl IntoDate) -> Result<bool, BacktestError> {
        Ok(self.rebalances_on(date.into_date()?))
    }

    pub fn add_rebalancing_date(&mut self, date: impl IntoDate) -> Result<(), BacktestError> {
        let date = date.into_date()?;
        if date < self.start_date || date > self.end_date {
            return Err(ScheduleError::OutOfRange {
                date,
                start: self.start_date,
                end: self.end_date,
            }
            .into());
        }
        if !self.is_trading_day(date) {
            return Err(ScheduleError::NotTradingDay(date).into());
        }
        if !self.rebalancing_dates.insert(date) {
            return Err(ScheduleError::AlreadyScheduled(date).into());
        }
        Ok(())
    }

    pub fn remove_rebalancing_date(&mut self, date: impl IntoDate) -> Result<(), BacktestError> {
        let date = date.into_date()?;
        if !self.rebalancing_dates.remove(&date) {
            return Err(ScheduleError::NotScheduled(date).into());
        }
        Ok(())
    }
}

fn day_range(start: NaiveDate, end: NaiveDate) -> impl Iterator<Item = NaiveDate> {
    start.iter_days().take_while(move |&d| d <= end)
}

/// The given days of months in [start, end] whose zero-based month index is
/// a multiple of `step` (1 = every month, 3 = quarter starts, 12 = January).
fn month_days(start: NaiveDate, end: NaiveDate, step: u32, days: &[u32]) -> Vec<NaiveDate> {
    let mut out = Vec::new();
    let (mut year, mut month) = (start.year(), start.month());
    loop {
        let Some(first) = NaiveDate::from_ymd_opt(year, month, 1) else {
            break;
        };
        if first > end {
            break;
        }
        if (month - 1) % step == 0 {
            out.extend(
                days.iter()
                    .filter_map(|&day| NaiveDate::from_ymd_opt(year, month, day))
                    .filter(|d| (start..=end).contains(d)),
            );
        }
        if month == 12 {
            year += 1;
            month = 1;
        } else {
            month += 1;
        }
    }
    out
}
