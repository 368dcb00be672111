//! Backtest engine.
//!
//! A run is one deterministic pass: positions per rebalancing date, then the
//! composition matrix, then weights, then cost-adjusted returns shifted one
//! period so that a decision taken on date t only earns from t+1 onwards.

use crate::domain::calendar::{Calendar, Frequency};
use crate::domain::error::BacktestError;
use crate::domain::frame::{Frame, Series};
use crate::domain::metrics::{BacktestResult, ResultOptions, TradeStats};
use crate::domain::panel::PricePanel;
use crate::domain::strategy::{History, Strategy};
use crate::domain::weighting::{WeightScheme, Weighting};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestConfig {
    pub weight_scheme: WeightScheme,
    pub rebalancing_frequency: Frequency,
    /// Rate charged on the sum of absolute weight changes.
    pub transaction_cost: f64,
    pub slippage: f64,
    pub risk_free_rate: f64,
    /// First row at which the strategy is consulted.
    pub special_start: usize,
    /// One decision per date for all assets instead of one per asset.
    pub multi_assets: bool,
    pub result_options: ResultOptions,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        BacktestConfig {
            weight_scheme: WeightScheme::EqualWeight,
            rebalancing_frequency: Frequency::Monthly,
            transaction_cost: 0.0,
            slippage: 0.0,
            risk_free_rate: 0.0,
            special_start: 1,
            multi_assets: false,
            result_options: ResultOptions::default(),
        }
    }
}

impl BacktestConfig {
    pub fn validate(&self) -> Result<(), BacktestError> {
        for (name, value) in [
            ("transaction_cost", self.transaction_cost),
            ("slippage", self.slippage),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(BacktestError::InvalidOption {
                    name: name.into(),
                    reason: format!("must be a finite non-negative number, got {}", value),
                });
            }
        }
        // May be negative.
        if !self.risk_free_rate.is_finite() {
            return Err(BacktestError::InvalidOption {
                name: "risk_free_rate".into(),
                reason: format!("must be a finite number, got {}", self.risk_free_rate),
            });
        }
        self.result_options.validate()
    }
}

/// Every intermediate series of the returns computation.
#[derive(Debug, Clone, PartialEq)]
pub struct ReturnsBreakdown {
    pub asset_returns: Frame,
    pub shifted_weights: Frame,
    pub transaction_costs: Series,
    pub slippage_costs: Series,
    pub asset_contributions: Frame,
    pub portfolio_returns: Series,
    pub cumulative_asset_returns: Frame,
    pub cumulative_returns: Series,
    pub trade_stats: TradeStats,
}

pub struct Backtester {
    panel: Arc<PricePanel>,
    config: BacktestConfig,
    weighting: Weighting,
    calendar: Calendar,
    weight_matrix: Option<Frame>,
}

impl Backtester {
    /// Validates the configuration, resolves the weight scheme against the
    /// panel and builds a calendar over the panel's date bounds.
    pub fn new(
        panel: Arc<PricePanel>,
        config: BacktestConfig,
        market_caps: Option<&Frame>,
    ) -> Result<Self, BacktestError> {
        config.validate()?;
        let weighting = Weighting::resolve(config.weight_scheme, panel.frame(), market_caps)?;
        let calendar = Calendar::new(
            config.rebalancing_frequency,
            panel.start_date(),
            panel.end_date(),
        )?;
        Ok(Self {
            panel,
            config,
            weighting,
            calendar,
            weight_matrix: None,
        })
    }

    pub fn from_frame(
        prices: Frame,
        config: BacktestConfig,
        market_caps: Option<&Frame>,
    ) -> Result<Self, BacktestError> {
        Self::new(Arc::new(PricePanel::new(prices)?), config, market_caps)
    }

    pub fn panel(&self) -> &Arc<PricePanel> {
        &self.panel
    }

    pub fn config(&self) -> &BacktestConfig {
        &self.config
    }

    pub fn weighting(&self) -> &Weighting {
        &self.weighting
    }

    pub fn calendar(&self) -> &Calendar {
        &self.calendar
    }

    /// For explicit schedule edits before a run.
    pub fn calendar_mut(&mut self) -> &mut Calendar {
        &mut self.calendar
    }

    /// Weights of the most recent run.
    pub fn weight_matrix(&self) -> Option<&Frame> {
        self.weight_matrix.as_ref()
    }

    /// Position held per date and asset. Rows before `special_start` are NaN.
    pub fn calculate_composition_matrix<S: Strategy + ?Sized>(&self, strategy: &S) -> Frame {
        let prices = self.panel.frame();
        let dates = prices.dates();
        let mut composition = Frame::filled_like(prices, f64::NAN);
        let start = self.config.special_start;

        if self.config.multi_assets {
            let mut position = 0.0;
            for (r, &date) in dates.iter().enumerate().skip(start) {
                if self.calendar.rebalances_on(date) {
                    position = strategy.get_position(&History::new(prices, r, None), position);
                }
                for c in 0..prices.n_cols() {
                    composition.set(r, c, position);
                }
            }
        } else {
            for c in 0..prices.n_cols() {
                let mut position = 0.0;
                for (r, &date) in dates.iter().enumerate().skip(start) {
                    if self.calendar.rebalances_on(date) {
                        position =
                            strategy.get_position(&History::new(prices, r, Some(c)), position);
                    }
                    composition.set(r, c, position);
                }
            }
        }
        composition
    }

    pub fn calculate_weight_matrix(&self, composition: &Frame) -> Frame {
        self.weighting.weights(composition)
    }

    pub fn calculate_returns(&self, composition: &Frame) -> ReturnsBreakdown {
        self.returns_from_weights(&self.calculate_weight_matrix(composition))
    }

    fn returns_from_weights(&self, weights: &Frame) -> ReturnsBreakdown {
        let prices = self.panel.frame();
        let (n_rows, n_cols) = (prices.n_rows(), prices.n_cols());

        let mut asset_returns = Frame::filled_like(prices, 0.0);
        let mut shifted = Frame::filled_like(prices, 0.0);
        for c in 0..n_cols {
            for r in 1..n_rows {
                let prev = prices.get(r - 1, c);
                if prev != 0.0 {
                    asset_returns.set(r, c, prices.get(r, c) / prev - 1.0);
                }
                shifted.set(r, c, weights.get(r - 1, c));
            }
        }

        let turnover: Vec<f64> = (0..n_rows)
            .map(|r| {
                if r == 0 {
                    return 0.0;
                }
                (0..n_cols)
                    .map(|c| (shifted.get(r, c) - shifted.get(r - 1, c)).abs())
                    .sum()
            })
            .collect();
        let transaction_costs: Vec<f64> = turnover
            .iter()
            .map(|t| t * self.config.transaction_cost)
            .collect();
        let slippage_costs: Vec<f64> = turnover.iter().map(|t| t * self.config.slippage).collect();

        let mut contributions = Frame::filled_like(prices, 0.0);
        let mut cumulative_assets = Frame::filled_like(prices, 0.0);
        for c in 0..n_cols {
            let mut wealth = 1.0;
            for r in 0..n_rows {
                let contribution = shifted.get(r, c) * asset_returns.get(r, c);
                contributions.set(r, c, contribution);
                wealth *= 1.0 + contribution;
                cumulative_assets.set(r, c, wealth - 1.0);
            }
        }

        let mut wealth = 1.0;
        let mut portfolio = Vec::with_capacity(n_rows);
        let mut cumulative = Vec::with_capacity(n_rows);
        for r in 0..n_rows {
            let gross: f64 = contributions.row(r).iter().sum();
            let net = gross - transaction_costs[r] - slippage_costs[r];
            wealth *= 1.0 + net;
            portfolio.push(net);
            cumulative.push(wealth - 1.0);
        }

        let dates = prices.dates().to_vec();
        let series = |values: Vec<f64>| Series {
            dates: dates.clone(),
            values,
        };
        let mut breakdown = ReturnsBreakdown {
            asset_returns,
            shifted_weights: shifted,
            transaction_costs: series(transaction_costs),
            slippage_costs: series(slippage_costs),
            asset_contributions: contributions,
            portfolio_returns: series(portfolio),
            cumulative_asset_returns: cumulative_assets,
            cumulative_returns: series(cumulative),
            trade_stats: TradeStats::default(),
        };

        if self.config.special_start > 1 {
            let n = self.config.special_start + 1;
            breakdown.asset_returns = breakdown.asset_returns.skip_rows(n);
            breakdown.shifted_weights = breakdown.shifted_weights.skip_rows(n);
            breakdown.transaction_costs = breakdown.transaction_costs.skip(n);
            breakdown.slippage_costs = breakdown.slippage_costs.skip(n);
            breakdown.asset_contributions = breakdown.asset_contributions.skip_rows(n);
            breakdown.portfolio_returns = breakdown.portfolio_returns.skip(n);
            breakdown.cumulative_asset_returns = breakdown.cumulative_asset_returns.skip_rows(n);
            breakdown.cumulative_returns = breakdown.cumulative_returns.skip(n);
        }

        breakdown.trade_stats = self.evaluate_trade(&breakdown.shifted_weights);
        breakdown
    }

    /// Counts weight changes per asset and how many of them closed a winning
    /// position.
    ///
    /// A change is a win when the position it replaces was long and the price
    /// rose since the previous change, or short and the price fell. The first
    /// reference price is the panel's first row.
    pub fn evaluate_trade(&self, shifted_weights: &Frame) -> TradeStats {
        let prices = self.panel.frame();
        let mut stats = TradeStats::default();
        if shifted_weights.n_rows() == 0 {
            return stats;
        }

        for (c, asset) in shifted_weights.columns().iter().enumerate() {
            let Some(pc) = prices.column_of(asset) else {
                continue;
            };
            let mut last_position = shifted_weights.get(0, c);
            let mut last_trade_value = prices.get(0, pc);

            for (r, &date) in shifted_weights.dates().iter().enumerate() {
                let position = shifted_weights.get(r, c);
                if position == last_position {
                    continue;
                }
                let Some(price) = prices.row_of(date).map(|pr| prices.get(pr, pc)) else {
                    continue;
                };
                stats.total += 1;
                if (last_position > 0.0 && price > last_trade_value)
                    || (last_position < 0.0 && price < last_trade_value)
                {
                    stats.winning += 1;
                }
                last_trade_value = price;
                last_position = position;
            }
        }
        stats
    }

    pub fn run<S: Strategy + ?Sized>(
        &mut self,
        strategy: &S,
    ) -> Result<BacktestResult, BacktestError> {
        let composition = self.calculate_composition_matrix(strategy);
        let weights = self.calculate_weight_matrix(&composition);
        let breakdown = self.returns_from_weights(&weights);
        self.weight_matrix = Some(weights);
        BacktestResult::new(
            breakdown.portfolio_returns,
            breakdown.cumulative_returns,
            self.config.risk_free_rate,
            breakdown.trade_stats,
            self.config.result_options,
        )
    }
}
