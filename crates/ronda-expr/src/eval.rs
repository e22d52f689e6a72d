//! Binding validation and memoized expression evaluation.
//!
//! Evaluation is one bottom-up pass per instrument. Repeated subtrees are
//! evaluated once per instrument: the memo key is the canonical text of
//! the subtree, so structurally identical subexpressions share their
//! result. All arithmetic is floating point; division by zero and other
//! undefined ratios yield missing cells rather than errors.

use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

use ronda_ops::{diff, elementwise, qoq, quarter, refq, ttm, yoy};
use ronda_traits::{Date, FiscalQuarter, Panel, Result, RondaError, Symbol};

use crate::ast::{FactorExpr, Node};

/// Frequency of a (sub)expression's value series.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    /// One value per fiscal quarter.
    Quarterly,
    /// One value per trading date (a raw market field).
    Market,
}

/// The evaluated factor: one value per instrument per period, sampled
/// point-in-time through [`FactorSeries::value_at`].
#[derive(Debug, Clone)]
pub enum FactorSeries {
    /// Per-instrument quarterly series aligned to each instrument's
    /// fiscal-quarter axis. Values become visible at their announcement
    /// dates.
    Quarterly(BTreeMap<Symbol, Vec<Option<f64>>>),
    /// A raw market-frequency field, sampled as-of the requested date.
    Market(String),
}

impl FactorSeries {
    /// The factor value for `symbol` as visible at `date`.
    ///
    /// Quarterly factors resolve to the most recent observation whose
    /// announcement date is at or before `date`; market factors resolve
    /// by forward-filled lookup. Missing data at the sample point is
    /// `None`.
    #[must_use]
    pub fn value_at(&self, panel: &Panel, symbol: &str, date: Date) -> Option<f64> {
        match self {
            Self::Quarterly(series) => {
                let index = panel.visible_quarter_index(symbol, date)?;
                series.get(symbol)?.get(index).copied().flatten()
            }
            Self::Market(field) => panel.market_asof(symbol, field, date),
        }
    }
}

/// Validate an expression's field references against a concrete panel.
///
/// Every `Field` leaf must name a fundamental or market field of the
/// panel; market-frequency fields are legal only as the whole expression
/// or as one operand of `op2` (which forward-fills them to fundamental
/// dates).
///
/// # Errors
///
/// [`RondaError::UnresolvedField`] or [`RondaError::InvalidOperand`].
pub fn bind(expr: &FactorExpr, panel: &Panel) -> Result<()> {
    check(expr.root(), panel).map(|_| ())
}

fn check(node: &Node, panel: &Panel) -> Result<Kind> {
    match node {
        Node::Field(name) => {
            if panel.has_fundamental_field(name) {
                Ok(Kind::Quarterly)
            } else if panel.has_market_field(name) {
                Ok(Kind::Market)
            } else {
                Err(RondaError::UnresolvedField(name.clone()))
            }
        }
        Node::Int(_) | Node::Arith(_) => Err(RondaError::InvalidOperand(format!(
            "`{node}` is not a series"
        ))),
        Node::Call { name, args } => match name.as_str() {
            "get" => check(&args[0], panel),
            "op2" => {
                let lhs = check(&args[0], panel)?;
                let rhs = check(&args[1], panel)?;
                if lhs == Kind::Market && rhs == Kind::Market {
                    Err(RondaError::InvalidOperand(
                        "op2 allows at most one market-frequency operand".to_string(),
                    ))
                } else {
                    Ok(Kind::Quarterly)
                }
            }
            "op" => {
                for arg in &args[..2] {
                    if check(arg, panel)? == Kind::Market {
                        return Err(RondaError::InvalidOperand(format!(
                            "`{arg}` is market-frequency; use op2 to mix frequencies"
                        )));
                    }
                }
                Ok(Kind::Quarterly)
            }
            _ => {
                // Unary fiscal-axis operators (plus refq's series operand).
                if check(&args[0], panel)? == Kind::Market {
                    return Err(RondaError::InvalidOperand(format!(
                        "`{}` requires a fundamental-frequency operand",
                        name
                    )));
                }
                Ok(Kind::Quarterly)
            }
        },
    }
}

/// Evaluate a validated expression over a panel.
///
/// Binding validation runs first, so a malformed expression fails before
/// any computation. Evaluation is deterministic: the same expression and
/// panel always produce the same series.
///
/// # Errors
///
/// Expression binding errors only; data content never errors (missing
/// propagates as missing).
pub fn evaluate(expr: &FactorExpr, panel: &Panel) -> Result<FactorSeries> {
    let kind = check(expr.root(), panel)?;

    if kind == Kind::Market {
        return Ok(FactorSeries::Market(unwrap_market_field(expr.root())));
    }

    let mut per_symbol = BTreeMap::new();
    for symbol in panel.symbols() {
        let axis = panel.quarters(symbol);
        let mut memo = HashMap::new();
        let series = eval_node(expr.root(), panel, symbol, axis, &mut memo)?;
        per_symbol.insert(symbol.clone(), series.as_ref().clone());
    }
    Ok(FactorSeries::Quarterly(per_symbol))
}

/// A market-kind expression is a `get` chain over a market field.
fn unwrap_market_field(node: &Node) -> String {
    match node {
        Node::Field(name) => name.clone(),
        Node::Call { args, .. } => unwrap_market_field(&args[0]),
        Node::Int(_) | Node::Arith(_) => unreachable!("validated as a series"),
    }
}

type Memo = HashMap<String, Rc<Vec<Option<f64>>>>;

fn eval_node(
    node: &Node,
    panel: &Panel,
    symbol: &str,
    axis: &[FiscalQuarter],
    memo: &mut Memo,
) -> Result<Rc<Vec<Option<f64>>>> {
    let key = node.to_string();
    if let Some(series) = memo.get(&key) {
        return Ok(Rc::clone(series));
    }

    let series = match node {
        Node::Field(name) => Rc::new(field_series(name, panel, symbol, axis)),
        Node::Int(_) | Node::Arith(_) => {
            return Err(RondaError::InvalidOperand(format!(
                "`{node}` is not a series"
            )));
        }
        Node::Call { name, args } => match name.as_str() {
            "get" => eval_node(&args[0], panel, symbol, axis, memo)?,
            "quarter" => {
                let x = eval_node(&args[0], panel, symbol, axis, memo)?;
                Rc::new(quarter(&x, axis))
            }
            "ttm" => {
                let x = eval_node(&args[0], panel, symbol, axis, memo)?;
                Rc::new(ttm(&x, axis))
            }
            "diff" => {
                let x = eval_node(&args[0], panel, symbol, axis, memo)?;
                Rc::new(diff(&x, axis))
            }
            "yoy" => {
                let x = eval_node(&args[0], panel, symbol, axis, memo)?;
                Rc::new(yoy(&x, axis))
            }
            "qoq" => {
                let x = eval_node(&args[0], panel, symbol, axis, memo)?;
                Rc::new(qoq(&x, axis))
            }
            "refq" => {
                let x = eval_node(&args[0], panel, symbol, axis, memo)?;
                let lag = match args[1] {
                    Node::Int(n) => n as usize,
                    _ => {
                        return Err(RondaError::InvalidOperand(
                            "refq lag must be an integer literal".to_string(),
                        ));
                    }
                };
                Rc::new(refq(&x, axis, lag))
            }
            "op" | "op2" => {
                let lhs = eval_node(&args[0], panel, symbol, axis, memo)?;
                let rhs = eval_node(&args[1], panel, symbol, axis, memo)?;
                let arith = match args[2] {
                    Node::Arith(op) => op,
                    _ => {
                        return Err(RondaError::InvalidOperand(
                            "op requires an arithmetic symbol".to_string(),
                        ));
                    }
                };
                Rc::new(elementwise(&lhs, &rhs, arith))
            }
            other => return Err(RondaError::UnknownOperator(other.to_string())),
        },
    };

    memo.insert(key, Rc::clone(&series));
    Ok(series)
}

/// Resolve a field leaf to a quarterly series for one instrument.
///
/// Fundamental fields map directly onto the fiscal axis; market fields
/// (reachable here only through `op2`) are forward-filled to each
/// observation's announcement date.
fn field_series(
    name: &str,
    panel: &Panel,
    symbol: &str,
    axis: &[FiscalQuarter],
) -> Vec<Option<f64>> {
    if panel.has_fundamental_field(name) {
        return panel
            .fundamental_series(symbol, name)
            .map_or_else(|| vec![None; axis.len()], <[Option<f64>]>::to_vec);
    }
    (0..axis.len())
        .map(|index| {
            let asof = panel.effective_announce(symbol, index)?;
            panel.market_asof(symbol, name, asof)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn quarter_key(year: i32, q: u8) -> FiscalQuarter {
        FiscalQuarter::new(year, q).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> Date {
        Date::from_ymd_opt(y, m, d).unwrap()
    }

    /// Two instruments, two years of cumulative net profit, plus a daily
    /// market-value series.
    fn sample_panel() -> Panel {
        let mut builder = Panel::builder();
        for (symbol, base) in [("A", 10.0), ("B", 20.0)] {
            for year in [2023, 2024] {
                for q in 1..=4u8 {
                    let fq = quarter_key(year, q);
                    // Cumulative profit grows by `base` per quarter and 20%
                    // per year.
                    let growth = if year == 2024 { 1.2 } else { 1.0 };
                    builder.fundamental(
                        symbol,
                        fq,
                        "net_profit",
                        base * growth * f64::from(q),
                    );
                }
            }
            builder.market(symbol, date(2025, 1, 2), "market_value", base * 100.0);
        }
        builder.build().unwrap()
    }

    fn quarterly(series: &FactorSeries, symbol: &str) -> Vec<Option<f64>> {
        match series {
            FactorSeries::Quarterly(map) => map[symbol].clone(),
            FactorSeries::Market(_) => panic!("expected quarterly series"),
        }
    }

    #[test]
    fn test_get_passthrough() {
        let panel = sample_panel();
        let expr = FactorExpr::parse("get(net_profit)").unwrap();
        let series = evaluate(&expr, &panel).unwrap();
        let values = quarterly(&series, "A");
        assert_eq!(values.len(), 8);
        assert_relative_eq!(values[0].unwrap(), 10.0);
        assert_relative_eq!(values[3].unwrap(), 40.0);
    }

    #[test]
    fn test_quarter_then_ttm() {
        let panel = sample_panel();
        let expr = FactorExpr::parse("ttm(quarter(get(net_profit)))").unwrap();
        let series = evaluate(&expr, &panel).unwrap();
        let values = quarterly(&series, "A");
        // Single-quarter value is 10 in 2023, 12 in 2024. 2024Q4 TTM = 48.
        assert_relative_eq!(values[7].unwrap(), 48.0);
        // First three quarters lack a full trailing year.
        assert_eq!(values[..3], [None, None, None]);
    }

    #[test]
    fn test_yoy_growth() {
        let panel = sample_panel();
        let expr = FactorExpr::parse("yoy(quarter(get(net_profit)))").unwrap();
        let series = evaluate(&expr, &panel).unwrap();
        let values = quarterly(&series, "B");
        // Single-quarter 2024 values are 20% above 2023.
        assert_relative_eq!(values[4].unwrap(), 0.2, epsilon = 1e-12);
        assert_relative_eq!(values[7].unwrap(), 0.2, epsilon = 1e-12);
    }

    #[test]
    fn test_op2_mixes_frequencies() {
        let mut builder = Panel::builder();
        builder
            .quarter_row("A", quarter_key(2024, 1), Some(date(2024, 4, 20)))
            .fundamental("A", quarter_key(2024, 1), "net_profit", 50.0)
            .market("A", date(2024, 4, 18), "market_value", 1000.0);
        let panel = builder.build().unwrap();

        let expr = FactorExpr::parse("op2(get(net_profit), get(market_value), /)").unwrap();
        let series = evaluate(&expr, &panel).unwrap();
        assert_relative_eq!(quarterly(&series, "A")[0].unwrap(), 0.05);
    }

    #[test]
    fn test_op_rejects_market_operand() {
        let panel = sample_panel();
        let expr = FactorExpr::parse("op(get(net_profit), get(market_value), /)").unwrap();
        assert!(matches!(
            evaluate(&expr, &panel),
            Err(RondaError::InvalidOperand(_))
        ));
    }

    #[test]
    fn test_market_factor() {
        let panel = sample_panel();
        let expr = FactorExpr::parse("get(market_value)").unwrap();
        let series = evaluate(&expr, &panel).unwrap();
        assert!(matches!(series, FactorSeries::Market(ref f) if f == "market_value"));
        assert_eq!(
            series.value_at(&panel, "A", date(2025, 1, 3)),
            Some(1000.0)
        );
        assert_eq!(series.value_at(&panel, "A", date(2025, 1, 1)), None);
    }

    #[test]
    fn test_unresolved_field() {
        let panel = sample_panel();
        let expr = FactorExpr::parse("ttm(get(free_cash_flow))").unwrap();
        assert!(matches!(
            evaluate(&expr, &panel),
            Err(RondaError::UnresolvedField(name)) if name == "free_cash_flow"
        ));
    }

    #[test]
    fn test_evaluation_is_deterministic() {
        let panel = sample_panel();
        let expr = FactorExpr::parse("op(ttm(quarter(net_profit)), refq(net_profit, 1), -)")
            .unwrap();
        let first = quarterly(&evaluate(&expr, &panel).unwrap(), "A");
        let second = quarterly(&evaluate(&expr, &panel).unwrap(), "A");
        assert_eq!(first, second);
    }

    #[test]
    fn test_missing_leaf_propagates_only_to_dependents() {
        let mut builder = Panel::builder();
        for q in 1..=4u8 {
            let fq = quarter_key(2024, q);
            builder.fundamental("A", fq, "revenue", f64::from(q) * 100.0);
            // net_profit missing in Q2 only
            if q != 2 {
                builder.fundamental("A", fq, "net_profit", f64::from(q) * 10.0);
            } else {
                builder.quarter_row("A", fq, None);
            }
        }
        let panel = builder.build().unwrap();

        let expr = FactorExpr::parse("op(diff(net_profit), diff(revenue), +)").unwrap();
        let values = quarterly(&evaluate(&expr, &panel).unwrap(), "A");
        // Q2 and Q3 diffs of net_profit touch the missing cell; Q4 does not.
        assert_eq!(values[1], None);
        assert_eq!(values[2], None);
        assert_relative_eq!(values[3].unwrap(), 110.0);

        // The unrelated revenue-only expression is unaffected.
        let expr = FactorExpr::parse("diff(revenue)").unwrap();
        let values = quarterly(&evaluate(&expr, &panel).unwrap(), "A");
        assert_eq!(values[1], Some(100.0));
        assert_eq!(values[2], Some(100.0));
    }

    #[test]
    fn test_value_at_respects_announcement_dates() {
        let mut builder = Panel::builder();
        builder
            .quarter_row("A", quarter_key(2024, 1), Some(date(2024, 4, 25)))
            .fundamental("A", quarter_key(2024, 1), "net_profit", 10.0);
        let panel = builder.build().unwrap();

        let expr = FactorExpr::parse("get(net_profit)").unwrap();
        let series = evaluate(&expr, &panel).unwrap();
        assert_eq!(series.value_at(&panel, "A", date(2024, 4, 24)), None);
        assert_eq!(series.value_at(&panel, "A", date(2024, 4, 25)), Some(10.0));
    }
}
