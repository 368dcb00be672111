//! Built-in market holiday table.
//!
//! US federal holidays, expressed as rule values. Fixed-date holidays that
//! fall on a weekend are observed on the nearest workday (Saturday moves to
//! Friday, Sunday to Monday).

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HolidayRule {
    Fixed { month: u32, day: u32 },
    NthWeekday { month: u32, weekday: Weekday, n: u32 },
    LastWeekday { month: u32, weekday: Weekday },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Holiday {
    pub name: &'static str,
    pub rule: HolidayRule,
    /// First year the holiday applies.
    pub since: Option<i32>,
}

pub const US_FEDERAL: &[Holiday] = &[
    Holiday {
        name: "New Year's Day",
        rule: HolidayRule::Fixed { month: 1, day: 1 },
        since: None,
    },
    Holiday {
        name: "Martin Luther King Jr. Day",
        rule: HolidayRule::NthWeekday { month: 1, weekday: Weekday::Mon, n: 3 },
        since: Some(1986),
    },
    Holiday {
        name: "Presidents' Day",
        rule: HolidayRule::NthWeekday { month: 2, weekday: Weekday::Mon, n: 3 },
        since: None,
    },
    Holiday {
        name: "Memorial Day",
        rule: HolidayRule::LastWeekday { month: 5, weekday: Weekday::Mon },
        since: None,
    },
    Holiday {
        name: "Juneteenth",
        rule: HolidayRule::Fixed { month: 6, day: 19 },
        since: Some(2021),
    },
    Holiday {
        name: "Independence Day",
        rule: HolidayRule::Fixed { month: 7, day: 4 },
        since: None,
    },
    Holiday {
        name: "Labor Day",
        rule: HolidayRule::NthWeekday { month: 9, weekday: Weekday::Mon, n: 1 },
        since: None,
    },
    Holiday {
        name: "Columbus Day",
        rule: HolidayRule::NthWeekday { month: 10, weekday: Weekday::Mon, n: 2 },
        since: None,
    },
    Holiday {
        name: "Veterans Day",
        rule: HolidayRule::Fixed { month: 11, day: 11 },
        since: None,
    },
    Holiday {
        name: "Thanksgiving",
        rule: HolidayRule::NthWeekday { month: 11, weekday: Weekday::Thu, n: 4 },
        since: None,
    },
    Holiday {
        name: "Christmas Day",
        rule: HolidayRule::Fixed { month: 12, day: 25 },
        since: None,
    },
];

impl HolidayRule {
    /// The observed date of this rule in `year`.
    pub fn observed_in(&self, year: i32) -> Option<NaiveDate> {
        match *self {
            HolidayRule::Fixed { month, day } => {
                NaiveDate::from_ymd_opt(year, month, day).map(nearest_workday)
            }
            HolidayRule::NthWeekday { month, weekday, n } => {
                let first = NaiveDate::from_ymd_opt(year, month, 1)?;
                let offset = (7 + weekday.num_days_from_monday()
                    - first.weekday().num_days_from_monday())
                    % 7;
                let date = first + Duration::days(i64::from(offset + (n - 1) * 7));
                (date.month() == month).then_some(date)
            }
            HolidayRule::LastWeekday { month, weekday } => {
                let last = last_day_of_month(year, month)?;
                let back = (7 + last.weekday().num_days_from_monday()
                    - weekday.num_days_from_monday())
                    % 7;
                Some(last - Duration::days(i64::from(back)))
            }
        }
    }
}

fn last_day_of_month(year: i32, month: u32) -> Option<NaiveDate> {
    let (y, m) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    NaiveDate::from_ymd_opt(y, m, 1)?.pred_opt()
}

fn nearest_workday(date: NaiveDate) -> NaiveDate {
    match date.weekday() {
        Weekday::Sat => date - Duration::days(1),
        Weekday::Sun => date + Duration::days(1),
        _ => date,
    }
}

/// Observed holidays for every year from `first_year` to `last_year`.
///
/// An observance that spills into a neighbouring year (New Year's Day on a
/// Saturday is observed on December 31st) is kept only if it still lands
/// inside the requested years.
pub fn holidays_for_years(first_year: i32, last_year: i32) -> BTreeSet<NaiveDate> {
    let mut out = BTreeSet::new();
    for year in (first_year - 1)..=(last_year + 1) {
        for holiday in US_FEDERAL {
            if holiday.since.is_some_and(|since| year < since) {
                continue;
            }
            if let Some(date) = holiday.rule.observed_in(year) {
                if (first_year..=last_year).contains(&date.year()) {
                    out.insert(date);
                }
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn new_year_2025_is_a_holiday() {
        let set = holidays_for_years(2025, 2025);
        assert!(set.contains(&date(2025, 1, 1)));
    }

    #[test]
    fn floating_holidays_2024() {
        let set = holidays_for_years(2024, 2024);
        assert!(set.contains(&date(2024, 1, 15))); // MLK
        assert!(set.contains(&date(2024, 2, 19))); // Presidents
        assert!(set.contains(&date(2024, 5, 27))); // Memorial
        assert!(set.contains(&date(2024, 9, 2))); // Labor
        assert!(set.contains(&date(2024, 10, 14))); // Columbus
        assert!(set.contains(&date(2024, 11, 28))); // Thanksgiving
    }

    #[test]
    fn weekend_observance() {
        // 2021-07-04 was a Sunday, 2020-07-04 a Saturday.
        let set = holidays_for_years(2020, 2021);
        assert!(set.contains(&date(2021, 7, 5)));
        assert!(set.contains(&date(2020, 7, 3)));
        assert!(!set.contains(&date(2021, 7, 4)));
    }

    #[test]
    fn new_year_spills_into_previous_december() {
        // 2022-01-01 was a Saturday.
        let set = holidays_for_years(2021, 2022);
        assert!(set.contains(&date(2021, 12, 31)));
        assert!(!holidays_for_years(2022, 2022).contains(&date(2021, 12, 31)));
    }

    #[test]
    fn juneteenth_only_from_2021() {
        assert!(!holidays_for_years(2020, 2020).contains(&date(2020, 6, 19)));
        assert!(holidays_for_years(2023, 2023).contains(&date(2023, 6, 19)));
    }

    #[test]
    fn every_holiday_is_a_weekday() {
        for d in holidays_for_years(2000, 2030) {
            assert!(!matches!(d.weekday(), Weekday::Sat | Weekday::Sun), "{d}");
        }
    }
}
