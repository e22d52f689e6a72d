//! The boundary type for externally generated factors.
//!
//! A [`FactorProposal`] is the structured value the factor-generation side
//! hands to the engine: a name, a free-text rationale and the expression
//! text. Field names are the domain's verbatim UTF-8 labels and are
//! preserved through JSON round-trips. Where the payload arrives embedded
//! in surrounding prose, [`FactorProposal::extract`] locates the outermost
//! JSON object before parsing.

use serde::{Deserialize, Serialize};

use ronda_traits::{Result, RondaError};

use crate::ast::FactorExpr;

/// A proposed factor: name, rationale and symbolic expression.
///
/// # Example
///
/// ```
/// use ronda_expr::FactorProposal;
///
/// let json = r#"{
///     "因子名称": "单季净利同比",
///     "因子逻辑": "盈利加速的公司后续超额收益更高",
///     "因子表达式": "yoy(quarter(get(net_profit)))"
/// }"#;
/// let proposal = FactorProposal::from_json(json).unwrap();
/// let expr = proposal.parse_expression().unwrap();
/// assert_eq!(expr.to_string(), "yoy(quarter(get(net_profit)))");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactorProposal {
    /// Factor name.
    #[serde(rename = "因子名称")]
    pub name: String,

    /// Free-text rationale for why the factor should work.
    #[serde(rename = "因子逻辑")]
    pub rationale: String,

    /// Expression text over the operator library.
    #[serde(rename = "因子表达式")]
    pub expression: String,
}

impl FactorProposal {
    /// Parse a proposal from a JSON document.
    ///
    /// # Errors
    ///
    /// [`RondaError::InvalidData`] when the document is not valid JSON or
    /// lacks a required field.
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text)
            .map_err(|e| RondaError::InvalidData(format!("factor proposal: {e}")))
    }

    /// Extract a proposal from free text that embeds a JSON object.
    ///
    /// Falls back to the outermost `{...}` span when the text as a whole
    /// is not valid JSON.
    ///
    /// # Errors
    ///
    /// [`RondaError::InvalidData`] when no parseable object is found.
    pub fn extract(text: &str) -> Result<Self> {
        if let Ok(proposal) = Self::from_json(text) {
            return Ok(proposal);
        }
        let start = text.find('{');
        let end = text.rfind('}');
        match (start, end) {
            (Some(start), Some(end)) if end > start => Self::from_json(&text[start..=end]),
            _ => Err(RondaError::InvalidData(
                "no factor object found in text".to_string(),
            )),
        }
    }

    /// Parse and structurally validate the proposal's expression.
    ///
    /// # Errors
    ///
    /// Any expression parse or validation error; see [`FactorExpr::parse`].
    pub fn parse_expression(&self) -> Result<FactorExpr> {
        FactorExpr::parse(&self.expression)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "因子名称": "TTM净利市值比",
        "因子逻辑": "盈利相对市值便宜的股票更可能有超额收益",
        "因子表达式": "op2(ttm(quarter(get(net_profit))), get(market_value), /)"
    }"#;

    #[test]
    fn test_from_json() {
        let proposal = FactorProposal::from_json(SAMPLE).unwrap();
        assert_eq!(proposal.name, "TTM净利市值比");
        assert!(proposal.parse_expression().is_ok());
    }

    #[test]
    fn test_missing_field_fails() {
        let json = r#"{"因子名称": "x", "因子表达式": "get(a)"}"#;
        assert!(matches!(
            FactorProposal::from_json(json),
            Err(RondaError::InvalidData(_))
        ));
    }

    #[test]
    fn test_extract_from_surrounding_prose() {
        let text = format!("以下是建议的因子：\n{SAMPLE}\n希望对研究有帮助。");
        let proposal = FactorProposal::extract(&text).unwrap();
        assert_eq!(proposal.name, "TTM净利市值比");
    }

    #[test]
    fn test_extract_without_object_fails() {
        assert!(FactorProposal::extract("no json here").is_err());
    }

    #[test]
    fn test_json_round_trip_preserves_labels() {
        let proposal = FactorProposal::from_json(SAMPLE).unwrap();
        let serialized = serde_json::to_string(&proposal).unwrap();
        assert!(serialized.contains("因子名称"));
        assert!(serialized.contains("因子表达式"));
        let back = FactorProposal::from_json(&serialized).unwrap();
        assert_eq!(back, proposal);
    }
}
