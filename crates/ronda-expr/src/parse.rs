//! Tokenizer, recursive-descent parser and structural validation.
//!
//! Grammar:
//!
//! ```text
//! expr := ident '(' arg { ',' arg } ')' | ident
//! arg  := expr | int | '+' | '-' | '*' | '/'
//! ```
//!
//! The words `max` and `min` in argument position lex as arithmetic
//! symbols (the `op`/`op2` third argument); fields may not use those
//! names. Identifiers accept any alphanumeric or non-ASCII character, so
//! UTF-8 field names pass through verbatim.

use ronda_ops::{ArgKind, ArithOp, get_operator_info};
use ronda_traits::{Result, RondaError};

use crate::ast::Node;

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Int(i64),
    Arith(ArithOp),
    LParen,
    RParen,
    Comma,
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || !c.is_ascii()
}

fn is_ident_continue(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || !c.is_ascii()
}

fn tokenize(text: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = text.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            ' ' | '\t' | '\n' | '\r' => {
                chars.next();
            }
            '(' => {
                chars.next();
                tokens.push(Token::LParen);
            }
            ')' => {
                chars.next();
                tokens.push(Token::RParen);
            }
            ',' => {
                chars.next();
                tokens.push(Token::Comma);
            }
            '+' | '-' | '*' | '/' => {
                chars.next();
                tokens.push(Token::Arith(c.to_string().parse()?));
            }
            '0'..='9' => {
                let mut digits = String::new();
                while let Some(&d) = chars.peek() {
                    if d.is_ascii_digit() {
                        digits.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                let value = digits.parse().map_err(|_| {
                    RondaError::ExpressionSyntax(format!("integer literal out of range: {digits}"))
                })?;
                tokens.push(Token::Int(value));
            }
            c if is_ident_start(c) => {
                let mut ident = String::new();
                while let Some(&d) = chars.peek() {
                    if is_ident_continue(d) {
                        ident.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                match ident.as_str() {
                    "max" => tokens.push(Token::Arith(ArithOp::Max)),
                    "min" => tokens.push(Token::Arith(ArithOp::Min)),
                    _ => tokens.push(Token::Ident(ident)),
                }
            }
            other => {
                return Err(RondaError::ExpressionSyntax(format!(
                    "unexpected character `{other}`"
                )));
            }
        }
    }

    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    position: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.position)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.position).cloned();
        if token.is_some() {
            self.position += 1;
        }
        token
    }

    fn expect(&mut self, expected: &Token, context: &str) -> Result<()> {
        match self.next() {
            Some(ref token) if token == expected => Ok(()),
            other => Err(RondaError::ExpressionSyntax(format!(
                "expected {context}, got {other:?}"
            ))),
        }
    }

    fn parse_arg(&mut self) -> Result<Node> {
        match self.next() {
            Some(Token::Ident(name)) => {
                if self.peek() == Some(&Token::LParen) {
                    self.parse_call(name)
                } else {
                    Ok(Node::Field(name))
                }
            }
            Some(Token::Int(value)) => Ok(Node::Int(value)),
            Some(Token::Arith(op)) => Ok(Node::Arith(op)),
            other => Err(RondaError::ExpressionSyntax(format!(
                "expected an argument, got {other:?}"
            ))),
        }
    }

    fn parse_call(&mut self, name: String) -> Result<Node> {
        self.expect(&Token::LParen, "`(`")?;
        let mut args = Vec::new();
        if self.peek() == Some(&Token::RParen) {
            self.next();
            return Ok(Node::Call { name, args });
        }
        loop {
            args.push(self.parse_arg()?);
            match self.next() {
                Some(Token::Comma) => {}
                Some(Token::RParen) => break,
                other => {
                    return Err(RondaError::ExpressionSyntax(format!(
                        "expected `,` or `)`, got {other:?}"
                    )));
                }
            }
        }
        Ok(Node::Call { name, args })
    }
}

/// Parse expression text into a raw tree.
pub(crate) fn parse(text: &str) -> Result<Node> {
    let tokens = tokenize(text)?;
    if tokens.is_empty() {
        return Err(RondaError::ExpressionSyntax("empty expression".to_string()));
    }
    let mut parser = Parser { tokens, position: 0 };
    let root = parser.parse_arg()?;
    if let Some(extra) = parser.peek() {
        return Err(RondaError::ExpressionSyntax(format!(
            "trailing input after expression: {extra:?}"
        )));
    }
    match root {
        Node::Field(_) | Node::Call { .. } => Ok(root),
        other => Err(RondaError::ExpressionSyntax(format!(
            "expression must be a field or operator call, got {other:?}"
        ))),
    }
}

/// Validate every call in the tree against the operator registry.
///
/// Checks performed here are panel-independent: operator existence, arity
/// and argument kinds. Field resolution happens later in
/// [`crate::eval::bind`].
pub(crate) fn validate_structure(node: &Node) -> Result<()> {
    match node {
        Node::Field(_) => Ok(()),
        Node::Int(_) | Node::Arith(_) => Err(RondaError::InvalidOperand(format!(
            "`{node}` cannot stand alone as an expression"
        ))),
        Node::Call { name, args } => {
            let info = get_operator_info(name)
                .ok_or_else(|| RondaError::UnknownOperator(name.clone()))?;
            if args.len() != info.arity() {
                return Err(RondaError::ArityMismatch {
                    operator: name.clone(),
                    expected: info.arity(),
                    actual: args.len(),
                });
            }
            for (arg, &kind) in args.iter().zip(info.args) {
                match (kind, arg) {
                    (ArgKind::Series, Node::Field(_)) => {}
                    (ArgKind::Series, Node::Call { .. }) => validate_structure(arg)?,
                    (ArgKind::Int, Node::Int(value)) => {
                        if *value < 0 {
                            return Err(RondaError::InvalidOperand(format!(
                                "`{name}` lag must be non-negative, got {value}"
                            )));
                        }
                    }
                    (ArgKind::Arith, Node::Arith(_)) => {}
                    (expected, actual) => {
                        return Err(RondaError::InvalidOperand(format!(
                            "`{name}` expects a {expected:?} argument, got `{actual}`"
                        )));
                    }
                }
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_symbols_and_words() {
        let tokens = tokenize("op(a, b, max)").unwrap();
        assert!(tokens.contains(&Token::Arith(ArithOp::Max)));
        let tokens = tokenize("op(a, b, /)").unwrap();
        assert!(tokens.contains(&Token::Arith(ArithOp::Div)));
    }

    #[test]
    fn test_tokenize_utf8_idents() {
        let tokens = tokenize("get(净利润)").unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::Ident("get".to_string()),
                Token::LParen,
                Token::Ident("净利润".to_string()),
                Token::RParen,
            ]
        );
    }

    #[test]
    fn test_tokenize_rejects_garbage() {
        assert!(tokenize("get(a) @").is_err());
    }

    #[test]
    fn test_parse_nested_call() {
        let node = parse("ttm(quarter(get(net_profit)))").unwrap();
        assert_eq!(node.to_string(), "ttm(quarter(get(net_profit)))");
    }

    #[test]
    fn test_parse_rejects_trailing_input() {
        assert!(parse("get(a) get(b)").is_err());
        assert!(parse("").is_err());
        assert!(parse("3").is_err());
    }

    #[test]
    fn test_validate_unknown_operator() {
        let node = parse("sma(close, 20)").unwrap();
        assert!(matches!(
            validate_structure(&node),
            Err(RondaError::UnknownOperator(name)) if name == "sma"
        ));
    }

    #[test]
    fn test_validate_arity() {
        let node = parse("ttm(a, b)").unwrap();
        assert!(matches!(
            validate_structure(&node),
            Err(RondaError::ArityMismatch { expected: 1, actual: 2, .. })
        ));
    }

    #[test]
    fn test_validate_arg_kinds() {
        // refq needs an integer lag
        let node = parse("refq(a, b)").unwrap();
        assert!(matches!(
            validate_structure(&node),
            Err(RondaError::InvalidOperand(_))
        ));

        // negative lag rejected
        let node = Node::Call {
            name: "refq".to_string(),
            args: vec![Node::Field("a".to_string()), Node::Int(-1)],
        };
        assert!(matches!(
            validate_structure(&node),
            Err(RondaError::InvalidOperand(_))
        ));

        // op needs an arithmetic symbol in third position
        let node = parse("op(a, b, c)").unwrap();
        assert!(matches!(
            validate_structure(&node),
            Err(RondaError::InvalidOperand(_))
        ));
    }

    #[test]
    fn test_validate_accepts_full_grammar() {
        for text in [
            "get(net_profit)",
            "net_profit",
            "quarter(get(net_profit))",
            "refq(ttm(quarter(get(net_profit))), 4)",
            "op(yoy(net_profit), qoq(revenue), min)",
            "op2(ttm(quarter(get(net_profit))), get(market_value), /)",
        ] {
            let node = parse(text).unwrap();
            validate_structure(&node).unwrap();
        }
    }
}
