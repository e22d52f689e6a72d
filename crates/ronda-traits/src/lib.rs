#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Core types for the Ronda factor backtesting engine.
//!
//! This crate provides the foundational data model shared by the rest of
//! the workspace: the [`Panel`] of fundamental and market observations,
//! fiscal-period types, the error taxonomy, and small statistical helpers.

/// The version of the ronda-traits crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// Module declarations
pub mod error;
pub mod panel;
pub mod stats;
pub mod types;

// Re-exports
pub use error::{Result, RondaError};
pub use panel::{MARKET_VALUE_FIELD, Panel, PanelBuilder, ST_FLAG_FIELD};
pub use types::{Date, FiscalQuarter, Symbol, UNIX_EPOCH_DAYS_FROM_CE};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
        assert!(VERSION.contains('.'));
    }
}
