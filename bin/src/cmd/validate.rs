//! Expression validation command.

use anyhow::Result;
use ronda_expr::FactorExpr;

/// Parse and structurally validate an expression, printing its canonical
/// form on success.
pub(crate) fn validate(expression: &str) -> Result<()> {
    let expr = FactorExpr::parse(expression)?;
    println!("OK: {expr}");
    Ok(())
}
