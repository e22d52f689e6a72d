//! Factor expression parsing and evaluation.
//!
//! A factor expression is a small symbolic tree (field references at the
//! leaves, operator calls at the internal nodes) written in call syntax:
//!
//! ```text
//! op2(ttm(quarter(get(net_profit))), get(market_value), /)
//! ```
//!
//! [`FactorExpr::parse`] tokenizes the text and validates every call
//! against the operator registry before anything is evaluated;
//! [`evaluate`] then computes one series per instrument with repeated
//! subtrees evaluated once. [`FactorProposal`] is the boundary type for
//! externally generated factors (name, rationale, expression text).

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

pub mod ast;
pub mod eval;
pub mod parse;
pub mod proposal;

// Re-export key types
pub use ast::{FactorExpr, Node};
pub use eval::{FactorSeries, bind, evaluate};
pub use proposal::FactorProposal;
