//! Operator registry: metadata and discovery for the fixed operator set.
//!
//! The registry is what the expression validator resolves calls against:
//! an expression naming an operator absent from this table fails with
//! `UnknownOperator` before any data is touched.

use serde::{Deserialize, Serialize};

/// Kind of argument an operator position accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArgKind {
    /// A sub-expression or field reference evaluating to a series.
    Series,
    /// An integer literal (e.g. the `refq` lag).
    Int,
    /// An arithmetic symbol: `+ - * / max min`.
    Arith,
}

/// Metadata about an operator.
#[derive(Debug, Clone, Serialize)]
pub struct OperatorInfo {
    /// Unique identifier for the operator.
    pub name: &'static str,

    /// Argument kinds, in call order. The arity is the length.
    pub args: &'static [ArgKind],

    /// Human-readable description.
    pub description: &'static str,
}

impl OperatorInfo {
    /// Number of arguments the operator takes.
    #[must_use]
    pub const fn arity(&self) -> usize {
        self.args.len()
    }
}

/// Get information about all available operators.
#[must_use]
pub fn available_operators() -> Vec<OperatorInfo> {
    vec![
        OperatorInfo {
            name: "get",
            args: &[ArgKind::Series],
            description: "Passthrough lookup of a raw panel field",
        },
        OperatorInfo {
            name: "quarter",
            args: &[ArgKind::Series],
            description: "Cumulative-to-date value converted to a single-quarter value \
                          (resets at the fiscal-year boundary)",
        },
        OperatorInfo {
            name: "ttm",
            args: &[ArgKind::Series],
            description: "Trailing-twelve-month sum of the four most recent single-quarter values",
        },
        OperatorInfo {
            name: "diff",
            args: &[ArgKind::Series],
            description: "Current single-quarter value minus the prior quarter's",
        },
        OperatorInfo {
            name: "yoy",
            args: &[ArgKind::Series],
            description: "Year-over-year growth versus the same quarter of the prior year",
        },
        OperatorInfo {
            name: "qoq",
            args: &[ArgKind::Series],
            description: "Quarter-over-quarter growth versus the prior quarter",
        },
        OperatorInfo {
            name: "refq",
            args: &[ArgKind::Series, ArgKind::Int],
            description: "Lag a series by N fiscal quarters",
        },
        OperatorInfo {
            name: "op",
            args: &[ArgKind::Series, ArgKind::Series, ArgKind::Arith],
            description: "Elementwise arithmetic over two fundamental series",
        },
        OperatorInfo {
            name: "op2",
            args: &[ArgKind::Series, ArgKind::Series, ArgKind::Arith],
            description: "Elementwise arithmetic where one operand may be a market-frequency \
                          series, forward-filled to fundamental dates",
        },
    ]
}

/// Get information about a specific operator by name.
#[must_use]
pub fn get_operator_info(name: &str) -> Option<OperatorInfo> {
    available_operators()
        .into_iter()
        .find(|info| info.name == name)
}
