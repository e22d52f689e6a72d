//! The factor expression tree.

use std::fmt;

use ronda_ops::ArithOp;
use ronda_traits::Result;

use crate::parse;

/// One node of a factor expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// A panel field reference (leaf).
    Field(String),
    /// An integer literal argument (e.g. the `refq` lag).
    Int(i64),
    /// An arithmetic symbol argument for `op` / `op2`.
    Arith(ArithOp),
    /// An operator call.
    Call {
        /// Operator name, resolved against the registry at validation.
        name: String,
        /// Arguments in call order.
        args: Vec<Node>,
    },
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Field(name) => f.write_str(name),
            Self::Int(n) => write!(f, "{n}"),
            Self::Arith(op) => f.write_str(op.symbol()),
            Self::Call { name, args } => {
                write!(f, "{name}(")?;
                for (index, arg) in args.iter().enumerate() {
                    if index > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                f.write_str(")")
            }
        }
    }
}

/// A parsed, structurally validated factor expression.
///
/// Immutable once constructed. [`FactorExpr::parse`] guarantees every call
/// in the tree names a registered operator with the right argument count
/// and kinds; field existence is checked later against a concrete panel
/// (see [`crate::eval::bind`]).
///
/// # Example
///
/// ```
/// use ronda_expr::FactorExpr;
///
/// let expr = FactorExpr::parse("yoy(ttm(quarter(get(net_profit))))").unwrap();
/// assert_eq!(expr.to_string(), "yoy(ttm(quarter(get(net_profit))))");
///
/// assert!(FactorExpr::parse("ttm(net_profit,)").is_err());
/// assert!(FactorExpr::parse("sma(net_profit)").is_err());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct FactorExpr {
    root: Node,
}

impl FactorExpr {
    /// Parse and structurally validate expression text.
    ///
    /// # Errors
    ///
    /// [`ronda_traits::RondaError::ExpressionSyntax`] for malformed text,
    /// [`ronda_traits::RondaError::UnknownOperator`],
    /// [`ronda_traits::RondaError::ArityMismatch`] or
    /// [`ronda_traits::RondaError::InvalidOperand`] for calls the registry
    /// rejects.
    pub fn parse(text: &str) -> Result<Self> {
        let root = parse::parse(text)?;
        parse::validate_structure(&root)?;
        Ok(Self { root })
    }

    /// The root node of the tree.
    #[must_use]
    pub const fn root(&self) -> &Node {
        &self.root
    }
}

impl fmt::Display for FactorExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.root.fmt(f)
    }
}
