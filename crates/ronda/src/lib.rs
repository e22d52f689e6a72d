#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! # ronda
//!
//! Factor expression backtesting engine for equity alpha research.
//!
//! ronda is an umbrella crate that re-exports all ronda sub-crates for
//! convenience. It takes a symbolic factor expression over fundamental and
//! market panel data and produces Rank-IC based evaluation metrics.
//!
//! ## Quick Start
//!
//! ```ignore
//! use ronda::eval::{Backtest, BacktestConfig};
//! use ronda::expr::FactorExpr;
//! use ronda::types::Panel;
//!
//! # fn main() -> ronda::Result<()> {
//! let panel = Panel::from_frames(&fundamentals, &market, None)?;
//! let expr = FactorExpr::parse("op2(ttm(quarter(get(net_profit))), get(market_value), /)")?;
//!
//! let record = Backtest::new(BacktestConfig::default()).run(&expr, &panel)?;
//! println!("RankIC mean: {:?}", record.rank_ic_mean);
//! println!("ICIR:        {:?}", record.icir);
//! # Ok(())
//! # }
//! ```
//!
//! ## Crate Organization
//!
//! 1. **Panels** hold fundamental (fiscal-quarter) and market (trading-day)
//!    observations with explicit missing values
//! 2. **Operators** transform per-instrument quarterly series
//! 3. **Expressions** compose operators into a factor and evaluate it
//! 4. **The backtest** ranks cross-sections against forward returns and
//!    aggregates per-period statistics into a metrics record

/// Version information for the ronda crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Core types: panel, fiscal periods, errors, statistics helpers.
pub mod types {
    pub use ronda_traits::*;
}

/// The operator library and its registry.
pub mod ops {
    pub use ronda_ops::*;
}

/// Factor expression parsing and evaluation.
pub mod expr {
    pub use ronda_expr::*;
}

/// The Rank-IC backtesting engine.
pub mod eval {
    pub use ronda_eval::*;
}

// Re-export the most-used types at the top level
pub use ronda_eval::{Backtest, BacktestConfig, MetricsRecord};
pub use ronda_expr::{FactorExpr, FactorProposal};
pub use ronda_traits::{Date, Panel, Result, RondaError, Symbol};

/// Prelude module for convenient imports.
///
/// ```ignore
/// use ronda::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{Backtest, BacktestConfig, MetricsRecord};
    pub use crate::{Date, Panel, Result, RondaError, Symbol};
    pub use crate::{FactorExpr, FactorProposal};
    pub use ronda_eval::{BacktestObserver, CancelToken, MetricsRequest};
}
