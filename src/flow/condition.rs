// SPDX-License-Identifier: MIT

//! Safe condition expressions for edge routing.
//!
//! User-authored boolean expressions are restricted to a small whitelisted
//! grammar (comparisons, `and`/`or`/`not`, parentheses, literals and dotted
//! field references), parsed into a closed AST and evaluated directly against
//! a state snapshot. Nothing here ever reaches a general-purpose interpreter.
//!
//! Grammar, lowest precedence first:
//!
//! ```text
//! expr    := or
//! or      := and ("or" and)*
//! and     := unary ("and" unary)*
//! unary   := "not" unary | primary
//! primary := "(" expr ")" | "true" | "false" | comparison
//! comparison := path op literal
//! op      := == | != | >= | <= | > | < | contains
//! ```

use serde_json::Value;

/// A parsed condition expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    True,
    False,
    Compare {
        path: String,
        op: CompareOp,
        literal: Literal,
    },
    And(Box<Expression>, Box<Expression>),
    Or(Box<Expression>, Box<Expression>),
    Not(Box<Expression>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    NotEq,
    Gt,
    Gte,
    Lt,
    Lte,
    /// Substring match for strings, membership for arrays.
    Contains,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    String(String),
    Number(f64),
    Boolean(bool),
    Null,
}

/// Parse failure with the offending fragment.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub message: String,
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid condition expression: {}", self.message)
    }
}

impl std::error::Error for ParseError {}

/// Parse a condition string into an [`Expression`].
pub fn parse(input: &str) -> Result<Expression, ParseError> {
    let tokens = tokenize(input)?;
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.parse_or()?;
    if parser.pos != parser.tokens.len() {
        return Err(ParseError {
            message: format!("unexpected trailing input near {:?}", parser.peek()),
        });
    }
    Ok(expr)
}

/// Collect every field path referenced by an expression.
pub fn referenced_paths(expr: &Expression) -> Vec<&str> {
    let mut out = Vec::new();
    collect_paths(expr, &mut out);
    out
}

fn collect_paths<'a>(expr: &'a Expression, out: &mut Vec<&'a str>) {
    match expr {
        Expression::Compare { path, .. } => out.push(path),
        Expression::And(a, b) | Expression::Or(a, b) => {
            collect_paths(a, out);
            collect_paths(b, out);
        }
        Expression::Not(inner) => collect_paths(inner, out),
        Expression::True | Expression::False => {}
    }
}

/// Evaluate an expression against a JSON scope (a state snapshot).
///
/// Missing fields compare equal to `null` and fail every other comparison,
/// matching the semantics of an absent state value.
pub fn evaluate(expr: &Expression, scope: &Value) -> bool {
    match expr {
        Expression::True => true,
        Expression::False => false,
        Expression::And(a, b) => evaluate(a, scope) && evaluate(b, scope),
        Expression::Or(a, b) => evaluate(a, scope) || evaluate(b, scope),
        Expression::Not(inner) => !evaluate(inner, scope),
        Expression::Compare { path, op, literal } => {
            let left = lookup_path(scope, path);
            match op {
                CompareOp::Eq => literal_eq(left, literal),
                CompareOp::NotEq => !literal_eq(left, literal),
                CompareOp::Gt => numeric(left, literal, |a, b| a > b),
                CompareOp::Gte => numeric(left, literal, |a, b| a >= b),
                CompareOp::Lt => numeric(left, literal, |a, b| a < b),
                CompareOp::Lte => numeric(left, literal, |a, b| a <= b),
                CompareOp::Contains => contains(left, literal),
            }
        }
    }
}

/// Walk a dotted path into a JSON object.
pub fn lookup_path<'a>(scope: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = scope;
    for part in path.split('.') {
        current = current.get(part)?;
    }
    Some(current)
}

fn literal_eq(left: Option<&Value>, right: &Literal) -> bool {
    match (left, right) {
        (None | Some(Value::Null), Literal::Null) => true,
        (None, _) => false,
        (Some(Value::String(s)), Literal::String(r)) => s == r,
        (Some(Value::Bool(b)), Literal::Boolean(r)) => b == r,
        (Some(Value::Number(n)), Literal::Number(r)) => {
            n.as_f64().map(|f| (f - r).abs() < f64::EPSILON).unwrap_or(false)
        }
        _ => false,
    }
}

fn numeric<F: Fn(f64, f64) -> bool>(left: Option<&Value>, right: &Literal, cmp: F) -> bool {
    match (left.and_then(Value::as_f64), right) {
        (Some(l), Literal::Number(r)) => cmp(l, *r),
        _ => false,
    }
}

fn contains(left: Option<&Value>, right: &Literal) -> bool {
    match (left, right) {
        (Some(Value::String(s)), Literal::String(needle)) => s.contains(needle),
        (Some(Value::Array(items)), _) => items.iter().any(|v| match (v, right) {
            (Value::String(s), Literal::String(r)) => s == r,
            (Value::Bool(b), Literal::Boolean(r)) => b == r,
            (Value::Number(n), Literal::Number(r)) => {
                n.as_f64().map(|f| (f - r).abs() < f64::EPSILON).unwrap_or(false)
            }
            _ => false,
        }),
        _ => false,
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Literal(Literal),
    Op(CompareOp),
    And,
    Or,
    Not,
    LParen,
    RParen,
}

fn tokenize(input: &str) -> Result<Vec<Token>, ParseError> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = input.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            ' ' | '\t' | '\n' | '\r' => i += 1,
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '\'' | '"' => {
                let quote = c;
                let start = i + 1;
                let mut end = start;
                while end < chars.len() && chars[end] != quote {
                    end += 1;
                }
                if end >= chars.len() {
                    return Err(ParseError {
                        message: "unterminated string literal".to_string(),
                    });
                }
                let s: String = chars[start..end].iter().collect();
                tokens.push(Token::Literal(Literal::String(s)));
                i = end + 1;
            }
            '=' | '!' | '<' | '>' => {
                let two: String = chars[i..(i + 2).min(chars.len())].iter().collect();
                let (op, len) = match two.as_str() {
                    "==" => (CompareOp::Eq, 2),
                    "!=" => (CompareOp::NotEq, 2),
                    ">=" => (CompareOp::Gte, 2),
                    "<=" => (CompareOp::Lte, 2),
                    _ if c == '>' => (CompareOp::Gt, 1),
                    _ if c == '<' => (CompareOp::Lt, 1),
                    _ => {
                        return Err(ParseError {
                            message: format!("unexpected character '{}'", c),
                        })
                    }
                };
                tokens.push(Token::Op(op));
                i += len;
            }
            _ if c.is_ascii_digit() || c == '-' => {
                let start = i;
                i += 1;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                let n = text.parse::<f64>().map_err(|_| ParseError {
                    message: format!("invalid number '{}'", text),
                })?;
                tokens.push(Token::Literal(Literal::Number(n)));
            }
            _ if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len()
                    && (chars[i].is_alphanumeric() || chars[i] == '_' || chars[i] == '.')
                {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                tokens.push(match word.as_str() {
                    "and" => Token::And,
                    "or" => Token::Or,
                    "not" => Token::Not,
                    "true" => Token::Literal(Literal::Boolean(true)),
                    "false" => Token::Literal(Literal::Boolean(false)),
                    "null" => Token::Literal(Literal::Null),
                    "contains" => Token::Op(CompareOp::Contains),
                    _ => Token::Ident(word),
                });
            }
            _ => {
                return Err(ParseError {
                    message: format!("unexpected character '{}'", c),
                })
            }
        }
    }

    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).cloned();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn parse_or(&mut self) -> Result<Expression, ParseError> {
        let mut left = self.parse_and()?;
        while self.peek() == Some(&Token::Or) {
            self.advance();
            let right = self.parse_and()?;
            left = Expression::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expression, ParseError> {
        let mut left = self.parse_unary()?;
        while self.peek() == Some(&Token::And) {
            self.advance();
            let right = self.parse_unary()?;
            left = Expression::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expression, ParseError> {
        if self.peek() == Some(&Token::Not) {
            self.advance();
            let inner = self.parse_unary()?;
            return Ok(Expression::Not(Box::new(inner)));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expression, ParseError> {
        match self.advance() {
            Some(Token::LParen) => {
                let inner = self.parse_or()?;
                match self.advance() {
                    Some(Token::RParen) => Ok(inner),
                    _ => Err(ParseError {
                        message: "missing closing ')'".to_string(),
                    }),
                }
            }
            Some(Token::Literal(Literal::Boolean(true))) => Ok(Expression::True),
            Some(Token::Literal(Literal::Boolean(false))) => Ok(Expression::False),
            Some(Token::Ident(path)) => {
                let op = match self.advance() {
                    Some(Token::Op(op)) => op,
                    other => {
                        return Err(ParseError {
                            message: format!(
                                "expected comparison operator after '{}', got {:?}",
                                path, other
                            ),
                        })
                    }
                };
                let literal = match self.advance() {
                    Some(Token::Literal(lit)) => lit,
                    other => {
                        return Err(ParseError {
                            message: format!("expected literal after operator, got {:?}", other),
                        })
                    }
                };
                Ok(Expression::Compare { path, op, literal })
            }
            other => Err(ParseError {
                message: format!("unexpected token {:?}", other),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_simple_equality() {
        let expr = parse("intent == 'search'").unwrap();
        assert_eq!(
            expr,
            Expression::Compare {
                path: "intent".to_string(),
                op: CompareOp::Eq,
                literal: Literal::String("search".to_string()),
            }
        );
    }

    #[test]
    fn test_parse_all_comparison_ops() {
        for (text, op) in [
            ("x == 1", CompareOp::Eq),
            ("x != 1", CompareOp::NotEq),
            ("x > 1", CompareOp::Gt),
            ("x >= 1", CompareOp::Gte),
            ("x < 1", CompareOp::Lt),
            ("x <= 1", CompareOp::Lte),
        ] {
            match parse(text).unwrap() {
                Expression::Compare { op: parsed, .. } => assert_eq!(parsed, op, "{}", text),
                other => panic!("expected comparison for {}, got {:?}", text, other),
            }
        }
    }

    #[test]
    fn test_parse_and_or_precedence() {
        // and binds tighter than or
        let expr = parse("a == 1 or b == 2 and c == 3").unwrap();
        match expr {
            Expression::Or(_, right) => assert!(matches!(*right, Expression::And(_, _))),
            other => panic!("expected Or at top, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_not_and_parens() {
        let expr = parse("not (done == true)").unwrap();
        assert!(matches!(expr, Expression::Not(_)));
    }

    #[test]
    fn test_parse_contains() {
        let expr = parse("tags contains 'bug'").unwrap();
        assert!(matches!(
            expr,
            Expression::Compare {
                op: CompareOp::Contains,
                ..
            }
        ));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse("this is not valid").is_err());
        assert!(parse("a == ").is_err());
        assert!(parse("(a == 1").is_err());
        assert!(parse("a == 'unterminated").is_err());
        assert!(parse("a == 1 extra").is_err());
    }

    #[test]
    fn test_referenced_paths() {
        let expr = parse("a == 1 and not (b.c == 'x' or done == true)").unwrap();
        assert_eq!(referenced_paths(&expr), vec!["a", "b.c", "done"]);
    }

    #[test]
    fn test_evaluate_equality_and_null() {
        let scope = json!({"intent": "search", "error": null});
        assert!(evaluate(&parse("intent == 'search'").unwrap(), &scope));
        assert!(!evaluate(&parse("intent == 'code'").unwrap(), &scope));
        assert!(evaluate(&parse("error == null").unwrap(), &scope));
        // Absent fields compare equal to null
        assert!(evaluate(&parse("missing == null").unwrap(), &scope));
        assert!(!evaluate(&parse("missing == 'x'").unwrap(), &scope));
    }

    #[test]
    fn test_evaluate_numeric_comparisons() {
        let scope = json!({"score": 7.5});
        assert!(evaluate(&parse("score > 5").unwrap(), &scope));
        assert!(evaluate(&parse("score >= 7.5").unwrap(), &scope));
        assert!(!evaluate(&parse("score > 10").unwrap(), &scope));
        assert!(evaluate(&parse("score <= 7.5").unwrap(), &scope));
    }

    #[test]
    fn test_evaluate_contains() {
        let scope = json!({"message": "hello world", "tags": ["bug", "urgent"]});
        assert!(evaluate(&parse("message contains 'world'").unwrap(), &scope));
        assert!(evaluate(&parse("tags contains 'bug'").unwrap(), &scope));
        assert!(!evaluate(&parse("tags contains 'minor'").unwrap(), &scope));
    }

    #[test]
    fn test_evaluate_boolean_combinators() {
        let scope = json!({"intent": "code", "confidence": 0.9});
        assert!(evaluate(
            &parse("intent == 'code' and confidence > 0.8").unwrap(),
            &scope
        ));
        assert!(evaluate(
            &parse("intent == 'search' or confidence > 0.8").unwrap(),
            &scope
        ));
        assert!(evaluate(&parse("not intent == 'search'").unwrap(), &scope));
    }

    #[test]
    fn test_evaluate_dotted_path() {
        let scope = json!({"result": {"data": {"intent": "search"}}});
        assert!(evaluate(
            &parse("result.data.intent == 'search'").unwrap(),
            &scope
        ));
    }

    #[test]
    fn test_evaluation_never_widens_types() {
        let scope = json!({"count": "3"});
        // String "3" is not a number; numeric comparison is simply false.
        assert!(!evaluate(&parse("count > 2").unwrap(), &scope));
    }
}
