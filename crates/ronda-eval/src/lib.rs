//! Rank-IC backtesting engine for Ronda factor expressions.
//!
//! This crate turns an evaluated factor expression and a panel of
//! fundamental/market data into a metrics record:
//! - [`calendar`] builds the rebalance schedule and execution dates
//! - [`universe`] computes per-period instrument eligibility
//! - [`neutral`] residualizes factors against size and industry
//! - [`ic`] computes the per-period Spearman rank correlation
//! - [`metrics`] aggregates period statistics into the final record
//! - [`backtest`] orchestrates the pipeline with parallel period fan-out,
//!   cooperative cancellation and observer hooks
//!
//! # Example
//!
//! ```rust,ignore
//! use ronda_eval::{Backtest, BacktestConfig};
//! use ronda_expr::FactorExpr;
//!
//! let expr = FactorExpr::parse("yoy(ttm(quarter(get(net_profit))))")?;
//! let backtest = Backtest::new(BacktestConfig::default());
//! let record = backtest.run(&expr, &panel)?;
//! println!("RankIC mean: {:?}", record.rank_ic_mean);
//! ```

pub mod backtest;
pub mod calendar;
pub mod ic;
pub mod metrics;
pub mod neutral;
pub mod observer;
pub mod universe;

// Re-export main types
pub use backtest::{Backtest, BacktestConfig, CancelToken, ExecutionPriceRule};
pub use calendar::{RebalanceCalendar, RebalanceEntry, RebalanceFrequency};
pub use ic::rank_ic;
pub use metrics::{MetricsRecord, MetricsRequest, PeriodRecord, aggregate};
pub use neutral::{Neutralization, residualize};
pub use observer::{BacktestEvent, BacktestObserver, LogObserver, NullObserver};
pub use universe::{UniverseRule, universe_at};
