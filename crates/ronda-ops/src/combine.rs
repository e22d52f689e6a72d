//! Elementwise arithmetic combinators for `op` / `op2`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use ronda_traits::RondaError;

/// Arithmetic operation symbol accepted by the `op` / `op2` operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArithOp {
    /// Elementwise addition.
    Add,
    /// Elementwise subtraction.
    Sub,
    /// Elementwise multiplication.
    Mul,
    /// Elementwise division; a zero divisor yields missing.
    Div,
    /// Elementwise maximum.
    Max,
    /// Elementwise minimum.
    Min,
}

impl ArithOp {
    /// Apply to one pair of cells. Missing operands and zero divisors
    /// propagate as missing.
    #[must_use]
    pub fn apply(self, lhs: Option<f64>, rhs: Option<f64>) -> Option<f64> {
        let (a, b) = (lhs?, rhs?);
        match self {
            Self::Add => Some(a + b),
            Self::Sub => Some(a - b),
            Self::Mul => Some(a * b),
            Self::Div => {
                if b == 0.0 {
                    None
                } else {
                    Some(a / b)
                }
            }
            Self::Max => Some(a.max(b)),
            Self::Min => Some(a.min(b)),
        }
    }

    /// The symbol as it appears in expression text.
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Max => "max",
            Self::Min => "min",
        }
    }
}

impl fmt::Display for ArithOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl FromStr for ArithOp {
    type Err = RondaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "+" => Ok(Self::Add),
            "-" => Ok(Self::Sub),
            "*" => Ok(Self::Mul),
            "/" => Ok(Self::Div),
            "max" => Ok(Self::Max),
            "min" => Ok(Self::Min),
            other => Err(RondaError::InvalidOperand(format!(
                "unknown arithmetic symbol `{other}`"
            ))),
        }
    }
}

/// Combine two aligned series elementwise.
///
/// Both inputs must have the same length (the caller aligns them to a
/// common axis first). Missing cells on either side produce missing
/// output cells.
#[must_use]
pub fn elementwise(a: &[Option<f64>], b: &[Option<f64>], op: ArithOp) -> Vec<Option<f64>> {
    debug_assert_eq!(a.len(), b.len());
    a.iter()
        .zip(b.iter())
        .map(|(&lhs, &rhs)| op.apply(lhs, rhs))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_basic() {
        assert_eq!(ArithOp::Add.apply(Some(2.0), Some(3.0)), Some(5.0));
        assert_eq!(ArithOp::Sub.apply(Some(2.0), Some(3.0)), Some(-1.0));
        assert_eq!(ArithOp::Mul.apply(Some(2.0), Some(3.0)), Some(6.0));
        assert_eq!(ArithOp::Div.apply(Some(6.0), Some(3.0)), Some(2.0));
        assert_eq!(ArithOp::Max.apply(Some(2.0), Some(3.0)), Some(3.0));
        assert_eq!(ArithOp::Min.apply(Some(2.0), Some(3.0)), Some(2.0));
    }

    #[test]
    fn test_division_by_zero_is_missing() {
        assert_eq!(ArithOp::Div.apply(Some(1.0), Some(0.0)), None);
    }

    #[test]
    fn test_missing_propagates() {
        assert_eq!(ArithOp::Add.apply(None, Some(1.0)), None);
        assert_eq!(ArithOp::Add.apply(Some(1.0), None), None);
    }

    #[test]
    fn test_elementwise() {
        let a = [Some(1.0), None, Some(3.0)];
        let b = [Some(2.0), Some(2.0), Some(0.0)];
        assert_eq!(
            elementwise(&a, &b, ArithOp::Div),
            vec![Some(0.5), None, None]
        );
    }

    #[test]
    fn test_symbol_round_trip() {
        for op in [
            ArithOp::Add,
            ArithOp::Sub,
            ArithOp::Mul,
            ArithOp::Div,
            ArithOp::Max,
            ArithOp::Min,
        ] {
            assert_eq!(op.symbol().parse::<ArithOp>().unwrap(), op);
        }
        assert!("%".parse::<ArithOp>().is_err());
    }
}
