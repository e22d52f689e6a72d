//! Error types for the Ronda engine.
//!
//! A single error enum covers the run-fatal cases: configuration problems,
//! malformed factor expressions, and dataset-shape violations. Per-period
//! data-quality issues and numeric degeneracies are deliberately absent;
//! those degrade the affected value to missing instead of raising.

use thiserror::Error;

/// The main error type for Ronda operations.
#[derive(Debug, Error)]
pub enum RondaError {
    /// Invalid or unsupported backtest configuration. Fatal before any data
    /// is touched.
    #[error("Unsupported configuration: {0}")]
    UnsupportedConfig(String),

    /// An expression calls an operator that is not in the registry.
    #[error("Unknown operator: {0}")]
    UnknownOperator(String),

    /// An operator was called with the wrong number of arguments.
    #[error("Operator `{operator}` expects {expected} argument(s), got {actual}")]
    ArityMismatch {
        /// The operator that was miscalled.
        operator: String,
        /// Arity declared in the registry.
        expected: usize,
        /// Arity found in the expression.
        actual: usize,
    },

    /// A field reference does not resolve against the panel.
    #[error("Unresolved field: {0}")]
    UnresolvedField(String),

    /// An operator argument has the wrong kind (e.g. a market-frequency
    /// series where a fundamental series is required).
    #[error("Invalid operand: {0}")]
    InvalidOperand(String),

    /// The expression text does not parse.
    #[error("Expression syntax error: {0}")]
    ExpressionSyntax(String),

    /// Malformed panel data (duplicate keys, wrong dtypes, ...).
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// A required column is missing from an input DataFrame.
    #[error("Missing required column: {0}")]
    MissingColumn(String),

    /// Error from Polars operations.
    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    /// The dataset cannot support the requested backtest at all (empty
    /// calendar, no instruments).
    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    /// A date is out of range or fails to parse.
    #[error("Invalid date: {0}")]
    InvalidDate(String),

    /// The run was cancelled cooperatively before completion.
    #[error("Backtest cancelled")]
    Cancelled,

    /// Generic error for other cases.
    #[error("Error: {0}")]
    Other(String),
}

impl From<String> for RondaError {
    fn from(s: String) -> Self {
        Self::Other(s)
    }
}

impl From<&str> for RondaError {
    fn from(s: &str) -> Self {
        Self::Other(s.to_string())
    }
}

/// A specialized Result type for Ronda operations.
pub type Result<T> = std::result::Result<T, RondaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RondaError::UnknownOperator("ttm2".to_string());
        assert_eq!(err.to_string(), "Unknown operator: ttm2");

        let err = RondaError::ArityMismatch {
            operator: "refq".to_string(),
            expected: 2,
            actual: 1,
        };
        assert_eq!(
            err.to_string(),
            "Operator `refq` expects 2 argument(s), got 1"
        );

        let err = RondaError::MissingColumn("symbol".to_string());
        assert_eq!(err.to_string(), "Missing required column: symbol");
    }

    #[test]
    fn test_error_from_string() {
        let err: RondaError = "fail".into();
        assert!(matches!(err, RondaError::Other(_)));
    }

    #[test]
    fn test_result_type() {
        let ok_result: Result<i32> = Ok(42);
        assert!(ok_result.is_ok());

        let err_result: Result<i32> = Err(RondaError::Cancelled);
        assert!(err_result.is_err());
    }
}
