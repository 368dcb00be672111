//! End-to-end tests of the calendar, backtester and result analytics.
//!
//! Tests cover:
//! - Trading-day and rebalancing-schedule properties over several years
//! - Schedule edits through the public mutators
//! - Full pipeline from a CSV panel on disk to a `BacktestResult`
//! - Warm-up trimming, costs, market-cap weighting, shared panels

mod common;

use common::*;
use panelbt::adapters::csv_adapter::CsvAdapter;
use panelbt::domain::backtest::{BacktestConfig, Backtester};
use panelbt::domain::calendar::{Calendar, Frequency};
use panelbt::domain::error::{BacktestError, ScheduleError};
use panelbt::domain::panel::PricePanel;
use panelbt::domain::strategy::{ConstantPosition, MovingAverageCrossover};
use panelbt::domain::weighting::WeightScheme;
use panelbt::ports::data_port::PanelSource;
use std::sync::Arc;

mod calendar_schedule {
    use super::*;
    use chrono::{Datelike, Weekday};
    use proptest::prelude::*;

    const FREQUENCIES: [Frequency; 6] = [
        Frequency::Daily,
        Frequency::Weekly,
        Frequency::SemiMonthly,
        Frequency::Monthly,
        Frequency::Quarterly,
        Frequency::Yearly,
    ];

    #[test]
    fn all_dates_exclude_weekends_and_holidays() {
        let cal = Calendar::new(Frequency::Daily, "2020-01-01", "2024-12-31").unwrap();
        assert!(!cal.all_dates().is_empty());
        for d in cal.all_dates() {
            assert!(!matches!(d.weekday(), Weekday::Sat | Weekday::Sun), "{d}");
            assert!(!cal.is_holiday(*d), "{d}");
        }
        assert!(!cal.all_dates().contains(&date(2024, 7, 4)));
        assert!(!cal.all_dates().contains(&date(2024, 11, 28)));
        assert!(cal.all_dates().contains(&date(2024, 7, 5)));
    }

    #[test]
    fn rebalancing_dates_are_trading_days_for_every_frequency() {
        for freq in FREQUENCIES {
            let cal = Calendar::new(freq, "2020-01-01", "2024-12-31").unwrap();
            assert!(!cal.rebalancing_dates().is_empty(), "{freq}");
            for d in cal.rebalancing_dates() {
                assert!(cal.all_dates().binary_search(d).is_ok(), "{freq}: {d}");
            }
        }
    }

    #[test]
    fn holiday_is_never_a_rebalancing_date() {
        let cal = Calendar::new(Frequency::Monthly, "2024-01-01", "2024-12-31").unwrap();
        let dates: Vec<_> = cal.rebalancing_dates().iter().copied().collect();
        assert_eq!(dates.len(), 12);
        // New Year's Day and Labor Day roll to the next trading day.
        assert_eq!(dates[0], date(2024, 1, 2));
        assert_eq!(dates[8], date(2024, 9, 3));
        assert!(!cal.is_rebalancing_date("2024-09-02").unwrap());
        assert!(!cal.is_rebalancing_date("2024-01-01").unwrap());
    }

    #[test]
    fn unparsable_dates_fail() {
        assert!(matches!(
            Calendar::new(Frequency::Monthly, "2024/01/01", "2024-12-31"),
            Err(BacktestError::DateParse { .. })
        ));
        let cal = Calendar::new(Frequency::Monthly, "2024-01-01", "2024-12-31").unwrap();
        assert!(matches!(
            cal.is_rebalancing_date("invalid-date"),
            Err(BacktestError::DateParse { .. })
        ));
    }

    #[test]
    fn reversed_range_fails() {
        assert!(matches!(
            Calendar::new(Frequency::Daily, "2024-12-31", "2024-01-01"),
            Err(BacktestError::InvalidDateRange { .. })
        ));
    }

    #[test]
    fn schedule_edits() {
        let mut cal = Calendar::new(Frequency::Monthly, "2024-01-01", "2024-12-31").unwrap();
        cal.add_rebalancing_date("2024-01-16").unwrap();
        assert!(cal.is_rebalancing_date("2024-01-16").unwrap());

        let err = cal.add_rebalancing_date("2024-01-16").unwrap_err();
        assert!(matches!(
            err,
            BacktestError::Schedule(ScheduleError::AlreadyScheduled(_))
        ));

        let err = cal.add_rebalancing_date("2025-01-02").unwrap_err();
        assert!(matches!(
            err,
            BacktestError::Schedule(ScheduleError::OutOfRange { .. })
        ));

        cal.remove_rebalancing_date("2024-01-16").unwrap();
        assert!(!cal.is_rebalancing_date("2024-01-16").unwrap());
        let err = cal.remove_rebalancing_date("2024-01-16").unwrap_err();
        assert!(matches!(
            err,
            BacktestError::Schedule(ScheduleError::NotScheduled(_))
        ));
    }

    proptest! {
        #[test]
        fn add_then_remove_round_trips(offset in 0i64..366) {
            let mut cal = Calendar::new(Frequency::Weekly, "2024-01-01", "2024-12-31").unwrap();
            let d = date(2024, 1, 1) + chrono::Duration::days(offset);
            prop_assume!(cal.is_trading_day(d));

            if !cal.rebalances_on(d) {
                cal.add_rebalancing_date(d).unwrap();
            }
            prop_assert!(cal.is_rebalancing_date(d).unwrap());
            cal.remove_rebalancing_date(d).unwrap();
            prop_assert!(!cal.is_rebalancing_date(d).unwrap());
        }
    }
}

mod backtest_pipeline {
    use super::*;
    use approx::assert_relative_eq;

    fn daily() -> BacktestConfig {
        BacktestConfig {
            rebalancing_frequency: Frequency::Daily,
            ..BacktestConfig::default()
        }
    }

    fn sample_panel() -> panelbt::domain::frame::Frame {
        zigzag_panel(weekdays(date(2024, 3, 4), 60), &["AAA", "BBB", "CCC"], 7)
    }

    #[test]
    fn csv_panel_to_result() {
        let file = write_temp_csv(&sample_panel());
        let prices = CsvAdapter::new().load_panel(file.path()).unwrap();
        assert_eq!(prices, sample_panel());

        let mut bt = Backtester::from_frame(prices, daily(), None).unwrap();
        let strategy = MovingAverageCrossover::new(3, 8, false).unwrap();
        let result = bt.run(&strategy).unwrap();

        assert_eq!(result.portfolio_returns().len(), 60);
        assert!(result.total_trades() > 0);
        assert!((0.0..=1.0).contains(&result.win_rate()));
        assert!(result.expected_shortfall() <= result.value_at_risk());
        assert!(result.max_drawdown() <= 0.0);
        assert_eq!(result.monthly_returns().years().collect::<Vec<_>>(), vec![2024]);
    }

    #[test]
    fn weight_rows_sum_to_one_or_zero() {
        let mut bt = Backtester::from_frame(sample_panel(), daily(), None).unwrap();
        bt.run(&MovingAverageCrossover::new(3, 8, true).unwrap()).unwrap();
        let weights = bt.weight_matrix().unwrap();
        for r in 0..weights.n_rows() {
            let total: f64 = weights.row(r).iter().map(|w| w.abs()).sum();
            assert!(total == 0.0 || (total - 1.0).abs() < 1e-12, "row {r}: {total}");
        }
    }

    #[test]
    fn constant_position_two_assets() {
        let prices = linear_panel(
            weekdays(date(2024, 3, 4), 10),
            &["A", "B"],
            &[100.0, 50.0],
            &[1.0, -0.5],
        );
        let mut bt = Backtester::from_frame(prices, daily(), None).unwrap();
        let result = bt.run(&ConstantPosition(1.0)).unwrap();

        let weights = bt.weight_matrix().unwrap();
        for r in 1..10 {
            assert_eq!(weights.row(r), vec![0.5, 0.5]);
        }
        assert_eq!(result.total_trades(), 2);
    }

    #[test]
    fn warm_up_rows_are_trimmed() {
        let config = BacktestConfig {
            special_start: 10,
            ..daily()
        };
        let mut bt = Backtester::from_frame(sample_panel(), config, None).unwrap();
        let result = bt.run(&MovingAverageCrossover::new(3, 8, false).unwrap()).unwrap();
        assert_eq!(result.portfolio_returns().len(), 60 - 11);
        assert_eq!(
            result.portfolio_returns().dates[0],
            bt.panel().dates()[11]
        );
    }

    #[test]
    fn costs_lower_the_total_return() {
        let strategy = MovingAverageCrossover::new(3, 8, false).unwrap();
        let panel = Arc::new(PricePanel::new(sample_panel()).unwrap());

        let mut free = Backtester::new(Arc::clone(&panel), daily(), None).unwrap();
        let costly_config = BacktestConfig {
            transaction_cost: 0.01,
            slippage: 0.005,
            ..daily()
        };
        let mut costly = Backtester::new(panel, costly_config, None).unwrap();

        let a = free.run(&strategy).unwrap();
        let b = costly.run(&strategy).unwrap();
        assert!(b.total_return() < a.total_return());
        assert_eq!(a.total_trades(), b.total_trades());
    }

    #[test]
    fn shared_panel_runs_are_identical() {
        let panel = Arc::new(PricePanel::new(sample_panel()).unwrap());
        let strategy = MovingAverageCrossover::new(2, 5, false).unwrap();

        let results: Vec<_> = (0..3)
            .map(|_| {
                let mut bt = Backtester::new(Arc::clone(&panel), daily(), None).unwrap();
                bt.run(&strategy).unwrap()
            })
            .collect();
        assert_eq!(results[0].statistics(), results[1].statistics());
        assert_eq!(
            results[1].portfolio_returns().values,
            results[2].portfolio_returns().values
        );
    }

    #[test]
    fn market_caps_from_csv() {
        let prices = sample_panel();
        let caps_file = write_temp_file("date,AAA,BBB\n2024-03-01,3000,1000\n", ".csv");
        let caps = CsvAdapter::new().load_panel(caps_file.path()).unwrap();

        let config = BacktestConfig {
            weight_scheme: WeightScheme::MarketCapWeight,
            ..daily()
        };
        let mut bt = Backtester::from_frame(prices, config, Some(&caps)).unwrap();
        bt.run(&ConstantPosition(1.0)).unwrap();

        let weights = bt.weight_matrix().unwrap();
        assert_relative_eq!(weights.get(5, 0), 0.75);
        assert_relative_eq!(weights.get(5, 1), 0.25);
        // No market cap for CCC.
        assert_eq!(weights.get(5, 2), 0.0);
    }

    #[test]
    fn market_caps_without_common_columns_fail() {
        let caps = linear_panel(weekdays(date(2024, 3, 4), 2), &["ZZZ"], &[1.0], &[0.0]);
        let config = BacktestConfig {
            weight_scheme: WeightScheme::MarketCapWeight,
            ..daily()
        };
        let err = Backtester::from_frame(sample_panel(), config, Some(&caps))
            .err()
            .unwrap();
        assert!(matches!(err, BacktestError::NoCommonColumns));
    }

    #[test]
    fn multi_asset_mode_holds_equal_positions() {
        let config = BacktestConfig {
            multi_assets: true,
            ..daily()
        };
        let mut bt = Backtester::from_frame(sample_panel(), config, None).unwrap();
        bt.run(&MovingAverageCrossover::new(3, 8, false).unwrap()).unwrap();
        let weights = bt.weight_matrix().unwrap();
        for r in 0..weights.n_rows() {
            let row = weights.row(r);
            assert!(row.iter().all(|&w| w == row[0]), "row {r}: {row:?}");
        }
    }
}
