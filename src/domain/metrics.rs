//! Performance and risk statistics of a finished backtest.
//!
//! `BacktestResult` is computed eagerly from the portfolio return series and
//! never changes afterwards. Degenerate inputs (zero volatility, no downside,
//! no trades) yield NaN or 0 rather than errors.

use crate::domain::error::BacktestError;
use crate::domain::frame::Series;
use chrono::Datelike;
use std::collections::BTreeMap;

pub const PERIODS_PER_YEAR: usize = 252;
pub const DAYS_PER_YEAR: f64 = 365.25;
pub const DEFAULT_TAIL_PROBABILITY: f64 = 0.05;

pub const MONTH_ABBR: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResultOptions {
    pub periods_per_year: usize,
    /// Tail probability used for VaR and expected shortfall.
    pub tail_probability: f64,
}

impl Default for ResultOptions {
    fn default() -> Self {
        ResultOptions {
            periods_per_year: PERIODS_PER_YEAR,
            tail_probability: DEFAULT_TAIL_PROBABILITY,
        }
    }
}

impl ResultOptions {
    pub fn validate(&self) -> Result<(), BacktestError> {
        if self.periods_per_year == 0 {
            return Err(BacktestError::InvalidOption {
                name: "periods_per_year".into(),
                reason: "must be positive".into(),
            });
        }
        check_tail_probability(self.tail_probability)
    }
}

fn check_tail_probability(alpha: f64) -> Result<(), BacktestError> {
    if alpha > 0.0 && alpha < 1.0 {
        Ok(())
    } else {
        Err(BacktestError::InvalidOption {
            name: "tail_probability".into(),
            reason: format!("{} is outside (0, 1)", alpha),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TradeStats {
    pub total: usize,
    pub winning: usize,
}

/// Sum of period returns per calendar month, laid out year × month.
///
/// Months between the first and last observation that saw no period are 0;
/// months outside that span are `None`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MonthlyReturns {
    years: BTreeMap<i32, [Option<f64>; 12]>,
}

impl MonthlyReturns {
    pub fn from_series(returns: &Series) -> Self {
        let mut years: BTreeMap<i32, [Option<f64>; 12]> = BTreeMap::new();
        if let (Some(first), Some(last)) = (returns.dates.iter().min(), returns.dates.iter().max())
        {
            let (mut year, mut month0) = (first.year(), first.month0());
            while (year, month0) <= (last.year(), last.month0()) {
                years.entry(year).or_insert([None; 12])[month0 as usize] = Some(0.0);
                if month0 == 11 {
                    year += 1;
                    month0 = 0;
                } else {
                    month0 += 1;
                }
            }
        }
        for (date, r) in returns.iter() {
            let cell = &mut years.entry(date.year()).or_insert([None; 12])[date.month0() as usize];
            *cell = Some(cell.unwrap_or(0.0) + r);
        }
        Self { years }
    }

    pub fn years(&self) -> impl Iterator<Item = i32> + '_ {
        self.years.keys().copied()
    }

    /// Return for `month` (1..=12) of `year`, if any period fell in it.
    pub fn get(&self, year: i32, month: u32) -> Option<f64> {
        let idx = month.checked_sub(1)? as usize;
        self.years.get(&year)?.get(idx).copied().flatten()
    }

    pub fn row(&self, year: i32) -> Option<&[Option<f64>; 12]> {
        self.years.get(&year)
    }

    pub fn is_empty(&self) -> bool {
        self.years.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestResult {
    portfolio_returns: Series,
    cumulative_returns: Series,
    risk_free_rate: f64,
    options: ResultOptions,
    trade_stats: TradeStats,
    total_return: f64,
    annualized_return: f64,
    volatility: f64,
    sharpe_ratio: f64,
    max_drawdown: f64,
    sortino_ratio: f64,
    value_at_risk: f64,
    expected_shortfall: f64,
    win_rate: f64,
    monthly_returns: MonthlyReturns,
}

impl BacktestResult {
    pub fn new(
        portfolio_returns: Series,
        cumulative_returns: Series,
        risk_free_rate: f64,
        trade_stats: TradeStats,
        options: ResultOptions,
    ) -> Result<Self, BacktestError> {
        options.validate()?;
        if portfolio_returns.dates != cumulative_returns.dates
            || portfolio_returns.len() != cumulative_returns.len()
        {
            return Err(BacktestError::IndexMismatch);
        }
        if portfolio_returns.is_empty() {
            return Err(BacktestError::EmptyReturns);
        }

        let ppy = options.periods_per_year as f64;
        let returns = &portfolio_returns.values;

        let total_return = cumulative_returns.values[cumulative_returns.len() - 1];

        let first = portfolio_returns.dates[0];
        let last = portfolio_returns.dates[portfolio_returns.len() - 1];
        let years = (last - first).num_days() as f64 / DAYS_PER_YEAR;
        let annualized_return = annualize(total_return, years);

        let volatility = sample_std(returns) * ppy.sqrt();
        let sharpe_ratio = sharpe(returns, risk_free_rate, ppy);
        let max_drawdown = max_drawdown(&cumulative_returns.values);

        let downside: Vec<f64> = returns.iter().copied().filter(|&r| r < 0.0).collect();
        let downside_std = sample_std(&downside) * ppy.sqrt();
        let sortino_ratio = if downside_std > 0.0 && downside_std.is_finite() {
            (annualized_return - risk_free_rate) / downside_std
        } else {
            f64::NAN
        };

        let value_at_risk = value_at_risk(returns, options.tail_probability);
        let expected_shortfall = expected_shortfall(returns, options.tail_probability);

        let win_rate = if trade_stats.total > 0 {
            trade_stats.winning as f64 / trade_stats.total as f64
        } else {
            0.0
        };

        let monthly_returns = MonthlyReturns::from_series(&portfolio_returns);

        Ok(BacktestResult {
            portfolio_returns,
            cumulative_returns,
            risk_free_rate,
            options,
            trade_stats,
            total_return,
            annualized_return,
            volatility,
            sharpe_ratio,
            max_drawdown,
            sortino_ratio,
            value_at_risk,
            expected_shortfall,
            win_rate,
            monthly_returns,
        })
    }

    pub fn portfolio_returns(&self) -> &Series {
        &self.portfolio_returns
    }

    pub fn cumulative_returns(&self) -> &Series {
        &self.cumulative_returns
    }

    pub fn risk_free_rate(&self) -> f64 {
        self.risk_free_rate
    }

    pub fn options(&self) -> ResultOptions {
        self.options
    }

    pub fn trade_stats(&self) -> TradeStats {
        self.trade_stats
    }

    pub fn total_trades(&self) -> usize {
        self.trade_stats.total
    }

    pub fn winning_trades(&self) -> usize {
        self.trade_stats.winning
    }

    pub fn total_return(&self) -> f64 {
        self.total_return
    }

    pub fn annualized_return(&self) -> f64 {
        self.annualized_return
    }

    pub fn volatility(&self) -> f64 {
        self.volatility
    }

    pub fn sharpe_ratio(&self) -> f64 {
        self.sharpe_ratio
    }

    pub fn max_drawdown(&self) -> f64 {
        self.max_drawdown
    }

    pub fn sortino_ratio(&self) -> f64 {
        self.sortino_ratio
    }

    /// VaR at the configured tail probability.
    pub fn value_at_risk(&self) -> f64 {
        self.value_at_risk
    }

    /// Expected shortfall at the configured tail probability.
    pub fn expected_shortfall(&self) -> f64 {
        self.expected_shortfall
    }

    pub fn win_rate(&self) -> f64 {
        self.win_rate
    }

    pub fn monthly_returns(&self) -> &MonthlyReturns {
        &self.monthly_returns
    }

    pub fn var_at(&self, alpha: f64) -> Result<f64, BacktestError> {
        check_tail_probability(alpha)?;
        Ok(value_at_risk(&self.portfolio_returns.values, alpha))
    }

    pub fn expected_shortfall_at(&self, alpha: f64) -> Result<f64, BacktestError> {
        check_tail_probability(alpha)?;
        Ok(expected_shortfall(&self.portfolio_returns.values, alpha))
    }

    /// Labelled, formatted statistics in display order.
    pub fn statistics(&self) -> Vec<(&'static str, String)> {
        let pct = |v: f64| format!("{:.2}%", v * 100.0);
        vec![
            ("Total Return", pct(self.total_return)),
            ("Annualized Return", pct(self.annualized_return)),
            ("Volatility", pct(self.volatility)),
            ("Sharpe Ratio", format!("{:.4}", self.sharpe_ratio)),
            ("Maximum Drawdown", pct(self.max_drawdown)),
            ("Sortino Ratio", format!("{:.4}", self.sortino_ratio)),
            ("Value at Risk", pct(self.value_at_risk)),
            ("Expected Shortfall", pct(self.expected_shortfall)),
            ("Total Trades", self.trade_stats.total.to_string()),
            ("Winning Trades", self.trade_stats.winning.to_string()),
            ("Win Rate", pct(self.win_rate)),
        ]
    }
}

fn annualize(total_return: f64, years: f64) -> f64 {
    if years > 0.0 {
        (1.0 + total_return).powf(1.0 / years) - 1.0
    } else {
        0.0
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (ddof = 1); NaN with fewer than two values.
pub fn sample_std(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return f64::NAN;
    }
    let m = mean(values);
    let variance =
        values.iter().map(|&x| (x - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}

fn sharpe(returns: &[f64], risk_free_rate: f64, periods_per_year: f64) -> f64 {
    let rf_per_period = risk_free_rate / periods_per_year;
    let excess: Vec<f64> = returns.iter().map(|&r| r - rf_per_period).collect();
    let vol = sample_std(&excess) * periods_per_year.sqrt();
    if vol == 0.0 || !vol.is_finite() {
        return f64::NAN;
    }
    mean(&excess) * periods_per_year / vol
}

/// Lowest point of the cumulative series below its running peak.
fn max_drawdown(cumulative: &[f64]) -> f64 {
    let mut peak = f64::NEG_INFINITY;
    let mut worst = 0.0_f64;
    for &value in cumulative {
        peak = peak.max(value);
        worst = worst.min(value - peak);
    }
    worst
}

/// Quantile with linear interpolation between order statistics.
pub fn quantile(values: &[f64], q: f64) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let idx = q * (sorted.len() - 1) as f64;
    let lo = idx.floor() as usize;
    let hi = idx.ceil() as usize;
    if lo == hi {
        sorted[lo]
    } else {
        let frac = idx - lo as f64;
        sorted[lo] * (1.0 - frac) + sorted[hi] * frac
    }
}

pub fn value_at_risk(returns: &[f64], alpha: f64) -> f64 {
    quantile(returns, alpha)
}

/// Mean of the returns at or below the VaR.
pub fn expected_shortfall(returns: &[f64], alpha: f64) -> f64 {
    let var = value_at_risk(returns, alpha);
    let tail: Vec<f64> = returns.iter().copied().filter(|&r| r <= var).collect();
    mean(&tail)
}
