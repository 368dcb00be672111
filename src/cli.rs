//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::csv_report_adapter::CsvReportAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::backtest::{BacktestConfig, Backtester};
use crate::domain::calendar::{Calendar, Frequency};
use crate::domain::config_validation::{
    read_count, read_double, read_frequency, read_weight_scheme, strategy_name,
    validate_backtest_config, validate_strategy_config, STRATEGY_CONSTANT,
};
use crate::domain::error::BacktestError;
use crate::domain::metrics::{BacktestResult, ResultOptions, MONTH_ABBR};
use crate::domain::panel::PricePanel;
use crate::domain::strategy::{ConstantPosition, MovingAverageCrossover, SideData, Strategy};
use crate::domain::weighting::WeightScheme;
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::PanelSource;
use crate::ports::report_port::ReportPort;

#[derive(Parser, Debug)]
#[command(
    name = "panelbt",
    about = "Rebalancing backtester for multi-asset price panels"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a backtest
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        /// Overrides [backtest] prices
        #[arg(short, long)]
        prices: Option<PathBuf>,
        /// Write the return series as CSV
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(long)]
        dry_run: bool,
    },
    /// Print the rebalancing dates between two dates
    Calendar {
        #[arg(long)]
        start: String,
        #[arg(long)]
        end: String,
        #[arg(short, long, default_value = "monthly")]
        frequency: String,
        /// Print every trading day instead
        #[arg(long)]
        all: bool,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Backtest {
            config,
            prices,
            output,
            dry_run,
        } => {
            if dry_run {
                run_dry_run(&config)
            } else {
                run_backtest(&config, prices.as_deref(), output.as_deref())
            }
        }
        Command::Calendar {
            start,
            end,
            frequency,
            all,
        } => run_calendar(&start, &end, &frequency, all),
        Command::Validate { config } => run_validate(&config),
    }
}

fn fail(err: &BacktestError) -> ExitCode {
    eprintln!("error: {err}");
    err.into()
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|e| fail(&e))
}

fn validate_all(adapter: &dyn ConfigPort) -> Result<(), BacktestError> {
    validate_backtest_config(adapter)?;
    validate_strategy_config(adapter)
}

pub fn build_backtest_config(adapter: &dyn ConfigPort) -> Result<BacktestConfig, BacktestError> {
    Ok(BacktestConfig {
        weight_scheme: read_weight_scheme(adapter)?,
        rebalancing_frequency: read_frequency(adapter)?,
        transaction_cost: read_double(adapter, "backtest", "transaction_cost", 0.0)?,
        slippage: read_double(adapter, "backtest", "slippage", 0.0)?,
        risk_free_rate: read_double(adapter, "backtest", "risk_free_rate", 0.0)?,
        special_start: read_count(adapter, "backtest", "special_start", 1)?,
        multi_assets: adapter.get_bool("backtest", "multi_assets", false),
        result_options: ResultOptions {
            periods_per_year: read_count(adapter, "result", "periods_per_year", 252)?,
            tail_probability: read_double(adapter, "result", "tail_probability", 0.05)?,
        },
    })
}

pub fn build_strategy(adapter: &dyn ConfigPort) -> Result<Box<dyn Strategy>, BacktestError> {
    if strategy_name(adapter) == STRATEGY_CONSTANT {
        let position = read_double(adapter, "strategy", "position", 1.0)?;
        return Ok(Box::new(ConstantPosition(position)));
    }
    let strategy = MovingAverageCrossover::new(
        read_count(adapter, "strategy", "short_window", 20)?,
        read_count(adapter, "strategy", "long_window", 50)?,
        adapter.get_bool("strategy", "exponential", false),
    )?;
    Ok(Box::new(strategy))
}

fn resolve_path(
    adapter: &dyn ConfigPort,
    key: &str,
    override_path: Option<&Path>,
) -> Result<PathBuf, BacktestError> {
    match override_path {
        Some(p) => Ok(p.to_path_buf()),
        None => adapter
            .get_string("backtest", key)
            .map(PathBuf::from)
            .ok_or_else(|| BacktestError::ConfigMissing {
                section: "backtest".into(),
                key: key.into(),
            }),
    }
}

/// Loads every `[side_data]` entry as a named panel. Names are upper-cased
/// (`per = per.csv` is available to strategies as "PER").
pub fn load_side_data(
    adapter: &dyn ConfigPort,
    source: &dyn PanelSource,
) -> Result<SideData, BacktestError> {
    let mut side_data = SideData::new();
    for key in adapter.keys("side_data") {
        let Some(path) = adapter.get_string("side_data", &key) else {
            continue;
        };
        let name = key.to_uppercase();
        eprintln!("Loading side dataset {} from {}", name, path);
        side_data.insert(name, source.load_panel(Path::new(&path))?);
    }
    Ok(side_data)
}

/// Loads the panels named by the configuration, calibrates the configured
/// strategy on the side data and runs it over the prices.
pub fn execute_backtest(
    adapter: &dyn ConfigPort,
    prices_override: Option<&Path>,
) -> Result<BacktestResult, BacktestError> {
    validate_all(adapter)?;
    let config = build_backtest_config(adapter)?;
    let mut strategy = build_strategy(adapter)?;
    let source = CsvAdapter::new();

    let prices_path = resolve_path(adapter, "prices", prices_override)?;
    eprintln!("Loading prices from {}", prices_path.display());
    let panel = Arc::new(PricePanel::new(source.load_panel(&prices_path)?)?);

    let market_caps = match config.weight_scheme {
        WeightScheme::MarketCapWeight => {
            let caps_path = resolve_path(adapter, "market_caps", None)?;
            eprintln!("Loading market caps from {}", caps_path.display());
            Some(source.load_panel(&caps_path)?)
        }
        WeightScheme::EqualWeight => None,
    };

    let side_data = load_side_data(adapter, &source)?;
    strategy.fit(&side_data)?;

    eprintln!(
        "Running backtest: {} assets, {} to {}",
        panel.n_cols(),
        panel.start_date(),
        panel.end_date(),
    );
    eprintln!(
        "  Rebalancing: {}, weighting: {}",
        config.rebalancing_frequency, config.weight_scheme
    );

    let mut backtester = Backtester::new(panel, config, market_caps.as_ref())?;
    eprintln!(
        "  Processing: {} trading days, {} rebalancing dates",
        backtester.calendar().all_dates().len(),
        backtester.calendar().rebalancing_dates().len(),
    );
    backtester.run(strategy.as_ref())
}

fn run_backtest(config_path: &Path, prices: Option<&Path>, output: Option<&Path>) -> ExitCode {
    eprintln!("Loading config from {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    let result = match execute_backtest(&adapter, prices) {
        Ok(r) => r,
        Err(e) => return fail(&e),
    };

    print_summary(&result);

    if let Some(path) = output {
        if let Err(e) = CsvReportAdapter::new().write(&result, path) {
            return fail(&e);
        }
        eprintln!("\nReturns written to: {}", path.display());
    }
    ExitCode::SUCCESS
}

pub fn print_summary(result: &BacktestResult) {
    eprintln!("\n=== Results ===");
    for (label, value) in result.statistics() {
        eprintln!("{:<20}{}", format!("{label}:"), value);
    }

    let monthly = result.monthly_returns();
    if monthly.is_empty() {
        return;
    }
    eprintln!("\n=== Monthly Returns (%) ===");
    let header: String = MONTH_ABBR.iter().map(|m| format!("{m:>8}")).collect();
    eprintln!("{:<6}{}", "Year", header);
    for year in monthly.years() {
        let cells: String = (1..=12)
            .map(|m| match monthly.get(year, m) {
                Some(r) => format!("{:>8.2}", r * 100.0),
                None => format!("{:>8}", ""),
            })
            .collect();
        eprintln!("{:<6}{}", year, cells);
    }
}

pub fn run_dry_run(config_path: &Path) -> ExitCode {
    eprintln!("Loading config from {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    if let Err(e) = validate_all(&adapter) {
        return fail(&e);
    }
    let config = match build_backtest_config(&adapter) {
        Ok(c) => c,
        Err(e) => return fail(&e),
    };
    if let Err(e) = build_strategy(&adapter) {
        return fail(&e);
    }
    eprintln!("Config validated successfully");

    eprintln!("\nBacktest:");
    eprintln!(
        "  prices:           {}",
        adapter.get_string("backtest", "prices").unwrap_or_default()
    );
    eprintln!("  weight_scheme:    {}", config.weight_scheme);
    eprintln!("  rebalancing:      {}", config.rebalancing_frequency);
    eprintln!("  transaction_cost: {}", config.transaction_cost);
    eprintln!("  slippage:         {}", config.slippage);
    eprintln!("  risk_free_rate:   {}", config.risk_free_rate);
    eprintln!("  special_start:    {}", config.special_start);
    eprintln!("  multi_assets:     {}", config.multi_assets);
    eprintln!("\nStrategy: {}", strategy_name(&adapter));
    for key in adapter.keys("side_data") {
        eprintln!(
            "  side data {}: {}",
            key.to_uppercase(),
            adapter.get_string("side_data", &key).unwrap_or_default()
        );
    }

    eprintln!("\nDry run complete: configuration is valid");
    ExitCode::SUCCESS
}

fn run_validate(config_path: &Path) -> ExitCode {
    eprintln!("Validating config: {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    if let Err(e) = validate_all(&adapter) {
        return fail(&e);
    }
    if let Err(e) = build_strategy(&adapter) {
        return fail(&e);
    }
    eprintln!("Configuration is valid.");
    ExitCode::SUCCESS
}

fn run_calendar(start: &str, end: &str, frequency: &str, all: bool) -> ExitCode {
    let frequency: Frequency = match frequency.parse() {
        Ok(f) => f,
        Err(e) => return fail(&e),
    };
    let calendar = match Calendar::new(frequency, start, end) {
        Ok(c) => c,
        Err(e) => return fail(&e),
    };

    if all {
        for date in calendar.all_dates() {
            println!("{date}");
        }
        eprintln!("{} trading days", calendar.all_dates().len());
    } else {
        for date in calendar.rebalancing_dates() {
            println!("{date}");
        }
        eprintln!(
            "{} {} rebalancing dates",
            calendar.rebalancing_dates().len(),
            calendar.frequency()
        );
    }
    ExitCode::SUCCESS
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::calendar::parse_date;

    fn adapter(content: &str) -> FileConfigAdapter {
        FileConfigAdapter::from_string(content).unwrap()
    }

    #[test]
    fn parses_backtest_subcommand() {
        let cli = Cli::try_parse_from([
            "panelbt", "backtest", "-c", "bt.ini", "--prices", "p.csv", "--dry-run",
        ])
        .unwrap();
        match cli.command {
            Command::Backtest {
                config,
                prices,
                output,
                dry_run,
            } => {
                assert_eq!(config, PathBuf::from("bt.ini"));
                assert_eq!(prices, Some(PathBuf::from("p.csv")));
                assert_eq!(output, None);
                assert!(dry_run);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn calendar_frequency_defaults_to_monthly() {
        let cli = Cli::try_parse_from([
            "panelbt", "calendar", "--start", "2024-01-01", "--end", "2024-03-31",
        ])
        .unwrap();
        assert!(matches!(
            cli.command,
            Command::Calendar { frequency, all: false, .. } if frequency == "monthly"
        ));
    }

    #[test]
    fn backtest_config_defaults() {
        let config = build_backtest_config(&adapter("[backtest]\n")).unwrap();
        assert_eq!(config, BacktestConfig::default());
    }

    #[test]
    fn backtest_config_reads_every_key() {
        let config = build_backtest_config(&adapter(
            r#"
[backtest]
weight_scheme = MarketCapWeight
market_caps = caps.csv
rebalancing_frequency = quarterly
transaction_cost = 0.001
slippage = 0.002
risk_free_rate = 0.03
special_start = 5
multi_assets = true

[result]
periods_per_year = 52
tail_probability = 0.01
"#,
        ))
        .unwrap();
        assert_eq!(config.weight_scheme, WeightScheme::MarketCapWeight);
        assert_eq!(config.rebalancing_frequency, Frequency::Quarterly);
        assert_eq!(config.transaction_cost, 0.001);
        assert_eq!(config.slippage, 0.002);
        assert_eq!(config.risk_free_rate, 0.03);
        assert_eq!(config.special_start, 5);
        assert!(config.multi_assets);
        assert_eq!(config.result_options.periods_per_year, 52);
        assert_eq!(config.result_options.tail_probability, 0.01);
    }

    #[test]
    fn builds_constant_strategy() {
        assert!(build_strategy(&adapter("[strategy]\nname = constant\nposition = 0.5\n")).is_ok());
    }

    #[test]
    fn moving_average_windows_are_checked() {
        let err = build_strategy(&adapter("[strategy]\nshort_window = 9\nlong_window = 3\n"))
            .err()
            .unwrap();
        assert!(matches!(err, BacktestError::InvalidOption { .. }));
    }

    #[test]
    fn side_data_is_keyed_by_upper_case_name() {
        let dir = tempfile::tempdir().unwrap();
        let per = dir.path().join("per.csv");
        std::fs::write(&per, "date,A,B\n2024-01-02,12.5,30\n").unwrap();
        let config = adapter(&format!("[side_data]\nper = {}\n", per.display()));

        let side_data = load_side_data(&config, &CsvAdapter::new()).unwrap();
        assert_eq!(side_data.keys().collect::<Vec<_>>(), vec!["PER"]);
        let day = parse_date("2024-01-02").unwrap();
        assert_eq!(side_data["PER"].value(day, "A"), Some(12.5));

        assert!(load_side_data(&adapter("[backtest]\n"), &CsvAdapter::new())
            .unwrap()
            .is_empty());
    }

    #[test]
    fn missing_prices_path_is_reported() {
        let err = execute_backtest(&adapter("[backtest]\n"), None).unwrap_err();
        assert!(matches!(err, BacktestError::ConfigMissing { key, .. } if key == "prices"));
    }
}
