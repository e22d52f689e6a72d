//! The backtest orchestrator.
//!
//! Owns the full pipeline: configuration validation, expression
//! evaluation, rebalance calendar, per-period universe / neutralization /
//! forward returns / rank correlation, and final aggregation. Periods are
//! independent by construction (each depends only on panel data through
//! its own rebalance date), so evaluation fans out across worker threads
//! and results are re-sorted by date before aggregation.
//!
//! Failure semantics: configuration and expression errors are fatal
//! before any period runs; a single period's data problem degrades that
//! period's statistic to missing and never aborts the run.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use ronda_expr::{FactorExpr, FactorSeries, evaluate};
use ronda_traits::{Date, MARKET_VALUE_FIELD, Panel, Result, RondaError};

use crate::calendar::{RebalanceCalendar, RebalanceEntry, RebalanceFrequency};
use crate::ic::rank_ic;
use crate::metrics::{MetricsRecord, MetricsRequest, PeriodRecord, aggregate};
use crate::neutral::{Neutralization, residualize};
use crate::observer::{BacktestEvent, BacktestObserver, NullObserver};
use crate::universe::{UniverseRule, universe_at};

/// Which price executes the rebalance on the next trading day.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionPriceRule {
    /// The next trading day's opening price.
    NextPeriodOpen,
    /// The next trading day's volume-weighted average price.
    #[default]
    NextPeriodVwap,
}

impl ExecutionPriceRule {
    /// The market field this rule prices from.
    #[must_use]
    pub const fn price_field(self) -> &'static str {
        match self {
            Self::NextPeriodOpen => "open",
            Self::NextPeriodVwap => "vwap",
        }
    }
}

impl FromStr for ExecutionPriceRule {
    type Err = RondaError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "next_period_open" => Ok(Self::NextPeriodOpen),
            "next_period_vwap" => Ok(Self::NextPeriodVwap),
            other => Err(RondaError::UnsupportedConfig(format!(
                "execution price rule `{other}`"
            ))),
        }
    }
}

/// Backtest configuration. Every option is independently overridable per
/// call; the defaults follow standard factor-research practice.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestConfig {
    /// First rebalance date considered. Default: one year before the end
    /// of the window.
    pub start_date: Option<Date>,
    /// Last rebalance date considered. Default: the panel's last trading
    /// date.
    pub end_date: Option<Date>,
    /// Instrument eligibility rule.
    pub universe_rule: UniverseRule,
    /// Cross-sectional neutralization mode.
    pub neutralization: Neutralization,
    /// Rebalance frequency.
    pub rebalance_frequency: RebalanceFrequency,
    /// Execution price rule for forward returns.
    pub execution_price_rule: ExecutionPriceRule,
    /// Minimum valid instruments for a period's correlation to count.
    pub min_universe_size: usize,
    /// Listing-age exclusion window in calendar days.
    pub new_listing_window_days: i64,
    /// Worker thread cap for period fan-out. `None` uses the global pool.
    pub workers: Option<usize>,
    /// Which secondary statistics to compute.
    pub secondary: MetricsRequest,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            start_date: None,
            end_date: None,
            universe_rule: UniverseRule::default(),
            neutralization: Neutralization::default(),
            rebalance_frequency: RebalanceFrequency::default(),
            execution_price_rule: ExecutionPriceRule::default(),
            min_universe_size: 20,
            new_listing_window_days: 120,
            workers: None,
            secondary: MetricsRequest::default(),
        }
    }
}

impl BacktestConfig {
    /// Check the configuration against the supported option set.
    ///
    /// # Errors
    ///
    /// [`RondaError::UnsupportedConfig`] naming the offending option.
    pub fn validate(&self) -> Result<()> {
        if let (Some(start), Some(end)) = (self.start_date, self.end_date) {
            if start > end {
                return Err(RondaError::UnsupportedConfig(format!(
                    "start date {start} is after end date {end}"
                )));
            }
        }
        if self.min_universe_size < 2 {
            return Err(RondaError::UnsupportedConfig(format!(
                "min_universe_size must be at least 2, got {}",
                self.min_universe_size
            )));
        }
        if self.new_listing_window_days < 0 {
            return Err(RondaError::UnsupportedConfig(format!(
                "new_listing_window_days must be non-negative, got {}",
                self.new_listing_window_days
            )));
        }
        if self.workers == Some(0) {
            return Err(RondaError::UnsupportedConfig(
                "workers must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Cooperative cancellation handle, checked at each rebalance-date
/// boundary. Clones share the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    /// A fresh, uncancelled token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    /// Whether cancellation was requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

/// The backtest engine.
///
/// # Example
///
/// ```rust,ignore
/// use ronda_eval::{Backtest, BacktestConfig};
/// use ronda_expr::FactorExpr;
///
/// let expr = FactorExpr::parse("op2(ttm(quarter(get(net_profit))), get(market_value), /)")?;
/// let record = Backtest::new(BacktestConfig::default()).run(&expr, &panel)?;
/// ```
#[derive(Debug, Default)]
pub struct Backtest {
    config: BacktestConfig,
}

impl Backtest {
    /// Create a backtest with the given configuration.
    #[must_use]
    pub const fn new(config: BacktestConfig) -> Self {
        Self { config }
    }

    /// The configuration this backtest runs with.
    #[must_use]
    pub const fn config(&self) -> &BacktestConfig {
        &self.config
    }

    /// Run the backtest silently and to completion.
    ///
    /// # Errors
    ///
    /// Configuration, expression-validation and dataset-shape errors only;
    /// per-period data problems degrade to missing statistics instead.
    pub fn run(&self, expr: &FactorExpr, panel: &Panel) -> Result<MetricsRecord> {
        self.run_with(expr, panel, &NullObserver, &CancelToken::new())
    }

    /// Run with an observer for period-level events and a cancellation
    /// token checked at each rebalance-date boundary.
    ///
    /// # Errors
    ///
    /// As [`Backtest::run`], plus [`RondaError::Cancelled`] when the token
    /// fires mid-run (no partial record is returned).
    pub fn run_with(
        &self,
        expr: &FactorExpr,
        panel: &Panel,
        observer: &dyn BacktestObserver,
        cancel: &CancelToken,
    ) -> Result<MetricsRecord> {
        self.config.validate()?;
        let (start, end) = self.resolve_window(panel)?;

        // Expression problems are fatal before any period runs.
        let series = evaluate(expr, panel)?;

        let calendar = RebalanceCalendar::build(
            panel.trading_dates(),
            start,
            end,
            self.config.rebalance_frequency,
        )?;
        let periods: Vec<(RebalanceEntry, RebalanceEntry)> = calendar.periods().collect();
        observer.on_event(&BacktestEvent::Started {
            periods: periods.len(),
        });

        let run_periods = || -> Vec<Option<PeriodRecord>> {
            periods
                .par_iter()
                .map(|&(entry, next)| {
                    if cancel.is_cancelled() {
                        return None;
                    }
                    let record = self.evaluate_period(panel, &series, entry, next);
                    observer.on_event(&BacktestEvent::PeriodEvaluated {
                        date: record.date,
                        ic: record.ic,
                        n_valid: record.n_valid,
                    });
                    if record.ic.is_none() {
                        let reason = if record.n_valid < self.config.min_universe_size {
                            format!(
                                "{} valid of {} in universe (minimum {})",
                                record.n_valid, record.universe_size, self.config.min_universe_size
                            )
                        } else {
                            "degenerate cross-section".to_string()
                        };
                        observer.on_event(&BacktestEvent::PeriodDegraded {
                            date: record.date,
                            reason,
                        });
                    }
                    Some(record)
                })
                .collect()
        };

        let records = match self.config.workers {
            Some(workers) => {
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(workers)
                    .build()
                    .map_err(|e| RondaError::Other(format!("worker pool: {e}")))?;
                pool.install(run_periods)
            }
            None => run_periods(),
        };

        if cancel.is_cancelled() {
            return Err(RondaError::Cancelled);
        }

        let records: Vec<PeriodRecord> = records.into_iter().flatten().collect();
        let record = aggregate(records, self.config.secondary);
        observer.on_event(&BacktestEvent::Finished {
            periods: record.n_periods,
            degraded: record.degraded_periods,
        });
        Ok(record)
    }

    /// Resolve the backtest window against the panel: the end defaults to
    /// the last trading date, the start to one year earlier.
    fn resolve_window(&self, panel: &Panel) -> Result<(Date, Date)> {
        let last = panel.trading_dates().last().copied().ok_or_else(|| {
            RondaError::InsufficientData("panel has no market data".to_string())
        })?;
        let end = self.config.end_date.unwrap_or(last);
        let start = match self.config.start_date {
            Some(start) => start,
            None => end
                .checked_sub_months(chrono::Months::new(12))
                .ok_or_else(|| RondaError::InvalidDate(format!("no trailing year before {end}")))?,
        };
        if start > end {
            return Err(RondaError::UnsupportedConfig(format!(
                "start date {start} is after end date {end}"
            )));
        }
        Ok((start, end))
    }

    /// Evaluate one rebalance period. Data problems degrade the period,
    /// never error.
    fn evaluate_period(
        &self,
        panel: &Panel,
        series: &FactorSeries,
        entry: RebalanceEntry,
        next: RebalanceEntry,
    ) -> PeriodRecord {
        let universe = universe_at(
            panel,
            entry.date,
            self.config.universe_rule,
            self.config.new_listing_window_days,
        );
        let universe_size = universe.len();

        let mut factor: Vec<Option<f64>> = universe
            .iter()
            .map(|symbol| series.value_at(panel, symbol, entry.date))
            .collect();

        if self.config.neutralization == Neutralization::MarketValueAndIndustry {
            let market_values: Vec<Option<f64>> = universe
                .iter()
                .map(|symbol| panel.market_asof(symbol, MARKET_VALUE_FIELD, entry.date))
                .collect();
            let industries: Vec<Option<&str>> = universe
                .iter()
                .map(|symbol| panel.industry(symbol))
                .collect();
            factor = residualize(&factor, &market_values, &industries);
        }

        let price_field = self.config.execution_price_rule.price_field();
        let forward_returns: Vec<Option<f64>> = universe
            .iter()
            .map(|symbol| {
                let entry_price = panel.market_at(symbol, price_field, entry.execution_date)?;
                let exit_price = panel.market_at(symbol, price_field, next.execution_date)?;
                if entry_price > 0.0 {
                    Some(exit_price / entry_price - 1.0)
                } else {
                    None
                }
            })
            .collect();

        let (ic, n_valid) = rank_ic(&factor, &forward_returns, self.config.min_universe_size);

        let valid: Vec<(usize, f64, f64)> = (0..universe.len())
            .filter_map(|i| match (factor[i], forward_returns[i]) {
                (Some(f), Some(r)) if f.is_finite() && r.is_finite() => Some((i, f, r)),
                _ => None,
            })
            .collect();

        let spread_return = if self.config.secondary.max_drawdown && ic.is_some() {
            quintile_spread(&valid)
        } else {
            None
        };

        let factor_values = if self.config.secondary.turnover {
            valid
                .iter()
                .map(|&(i, f, _)| (universe[i].clone(), f))
                .collect()
        } else {
            Vec::new()
        };

        PeriodRecord {
            date: entry.date,
            ic,
            n_valid,
            universe_size,
            spread_return,
            factor_values,
        }
    }
}

/// Top-minus-bottom quintile mean forward return, by raw factor value.
fn quintile_spread(valid: &[(usize, f64, f64)]) -> Option<f64> {
    let n = valid.len();
    if n < 5 {
        return None;
    }
    let mut sorted: Vec<(f64, f64)> = valid.iter().map(|&(_, f, r)| (f, r)).collect();
    sorted.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

    let bucket = n / 5;
    let bottom: f64 = sorted[..bucket].iter().map(|(_, r)| r).sum::<f64>() / bucket as f64;
    let top: f64 = sorted[n - bucket..].iter().map(|(_, r)| r).sum::<f64>() / bucket as f64;
    Some(top - bottom)
}
