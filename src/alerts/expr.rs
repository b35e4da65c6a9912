//! Alert condition expressions
//!
//! Grammar (lowest precedence first):
//!
//! ```text
//! or         := and ( "||" and )*
//! and        := comparison ( "&&" comparison )*
//! comparison := operand ( cmp_op operand )?
//! operand    := number | "-" number | identifier | "(" or ")"
//! cmp_op     := "<" | "<=" | ">" | ">=" | "==" | "!="
//! ```
//!
//! Identifiers are metric paths resolved by [`MetricSnapshot::field`].
//! Conditions are type-checked at parse time: comparisons take numbers,
//! `&&`/`||` take booleans, and the whole expression must be boolean.
//! Conditions are limited to [`MAX_TOKENS`] tokens and [`MAX_NESTING`]
//! levels of parentheses, which bounds the depth of the parsed tree.

use std::fmt;

use crate::model::MetricSnapshot;

/// Longest accepted condition, in tokens
pub const MAX_TOKENS: usize = 512;

/// Deepest accepted parenthesis nesting
pub const MAX_NESTING: usize = 32;

/// Parsed condition tree
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(f64),
    Field(String),
    Compare {
        op: CompareOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Logical {
        op: LogicalOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Lt,
    LtEq,
    Gt,
    GtEq,
    Eq,
    NotEq,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Number,
    Bool,
}

impl CompareOp {
    pub fn apply(&self, lhs: f64, rhs: f64) -> bool {
        match self {
            CompareOp::Lt => lhs < rhs,
            CompareOp::LtEq => lhs <= rhs,
            CompareOp::Gt => lhs > rhs,
            CompareOp::GtEq => lhs >= rhs,
            CompareOp::Eq => lhs == rhs,
            CompareOp::NotEq => lhs != rhs,
        }
    }

    fn symbol(&self) -> &'static str {
        match self {
            CompareOp::Lt => "<",
            CompareOp::LtEq => "<=",
            CompareOp::Gt => ">",
            CompareOp::GtEq => ">=",
            CompareOp::Eq => "==",
            CompareOp::NotEq => "!=",
        }
    }
}

impl Expr {
    /// Parse and type-check a condition
    pub fn parse(source: &str) -> Result<Expr, ExprError> {
        let tokens = tokenize(source)?;
        if tokens.is_empty() {
            return Err(ExprError::Empty);
        }
        if tokens.len() > MAX_TOKENS {
            return Err(ExprError::TooLong {
                tokens: tokens.len(),
                limit: MAX_TOKENS,
            });
        }

        let mut parser = Parser {
            tokens,
            pos: 0,
            depth: 0,
        };
        let expr = parser.parse_or()?;

        if let Some((token, offset)) = parser.tokens.get(parser.pos) {
            return Err(ExprError::UnexpectedToken {
                token: token.to_string(),
                offset: *offset,
            });
        }

        if expr.kind() != Kind::Bool {
            return Err(ExprError::NotBoolean);
        }

        Ok(expr)
    }

    /// Evaluate against a snapshot
    pub fn evaluate(&self, snapshot: &MetricSnapshot) -> Result<bool, ExprError> {
        match self {
            Expr::Compare { op, lhs, rhs } => {
                Ok(op.apply(lhs.number(snapshot)?, rhs.number(snapshot)?))
            }
            Expr::Logical {
                op: LogicalOp::And,
                lhs,
                rhs,
            } => Ok(lhs.evaluate(snapshot)? && rhs.evaluate(snapshot)?),
            Expr::Logical {
                op: LogicalOp::Or,
                lhs,
                rhs,
            } => Ok(lhs.evaluate(snapshot)? || rhs.evaluate(snapshot)?),
            Expr::Literal(_) | Expr::Field(_) => Err(ExprError::NotBoolean),
        }
    }

    /// Metric paths referenced by this expression
    pub fn fields(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_fields(&mut out);
        out
    }

    fn collect_fields<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Expr::Field(name) => out.push(name),
            Expr::Literal(_) => {}
            Expr::Compare { lhs, rhs, .. } | Expr::Logical { lhs, rhs, .. } => {
                lhs.collect_fields(out);
                rhs.collect_fields(out);
            }
        }
    }

    fn number(&self, snapshot: &MetricSnapshot) -> Result<f64, ExprError> {
        match self {
            Expr::Literal(value) => Ok(*value),
            Expr::Field(name) => snapshot
                .field(name)
                .ok_or_else(|| ExprError::UnknownField(name.clone())),
            _ => Err(ExprError::TypeMismatch("expected a number".into())),
        }
    }

    fn kind(&self) -> Kind {
        match self {
            Expr::Literal(_) | Expr::Field(_) => Kind::Number,
            Expr::Compare { .. } | Expr::Logical { .. } => Kind::Bool,
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Literal(value) => write!(f, "{}", value),
            Expr::Field(name) => write!(f, "{}", name),
            Expr::Compare { op, lhs, rhs } => write!(f, "{} {} {}", lhs, op.symbol(), rhs),
            Expr::Logical { op, lhs, rhs } => {
                let symbol = match op {
                    LogicalOp::And => "&&",
                    LogicalOp::Or => "||",
                };
                write!(f, "({} {} {})", lhs, symbol, rhs)
            }
        }
    }
}

// ============================================================================
// Tokenizer
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Ident(String),
    Cmp(CompareOp),
    And,
    Or,
    Minus,
    LParen,
    RParen,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Number(n) => write!(f, "{}", n),
            Token::Ident(s) => write!(f, "{}", s),
            Token::Cmp(op) => write!(f, "{}", op.symbol()),
            Token::And => write!(f, "&&"),
            Token::Or => write!(f, "||"),
            Token::Minus => write!(f, "-"),
            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
        }
    }
}

fn tokenize(source: &str) -> Result<Vec<(Token, usize)>, ExprError> {
    let chars: Vec<(usize, char)> = source.char_indices().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let (offset, c) = chars[i];
        let next = chars.get(i + 1).map(|(_, c)| *c);

        if c.is_whitespace() {
            i += 1;
            continue;
        }

        let (token, width) = match (c, next) {
            ('&', Some('&')) => (Token::And, 2),
            ('|', Some('|')) => (Token::Or, 2),
            ('<', Some('=')) => (Token::Cmp(CompareOp::LtEq), 2),
            ('>', Some('=')) => (Token::Cmp(CompareOp::GtEq), 2),
            ('=', Some('=')) => (Token::Cmp(CompareOp::Eq), 2),
            ('!', Some('=')) => (Token::Cmp(CompareOp::NotEq), 2),
            ('<', _) => (Token::Cmp(CompareOp::Lt), 1),
            ('>', _) => (Token::Cmp(CompareOp::Gt), 1),
            ('(', _) => (Token::LParen, 1),
            (')', _) => (Token::RParen, 1),
            ('-', _) => (Token::Minus, 1),
            (c, _) if c.is_ascii_digit() || c == '.' => {
                let end = scan(&chars, i, |c| c.is_ascii_digit() || c == '.');
                let text: String = chars[i..end].iter().map(|(_, c)| c).collect();
                let value = text
                    .parse::<f64>()
                    .map_err(|_| ExprError::InvalidNumber(text.clone()))?;
                (Token::Number(value), end - i)
            }
            (c, _) if c.is_ascii_alphabetic() || c == '_' => {
                let end = scan(&chars, i, |c| c.is_ascii_alphanumeric() || c == '_' || c == '.');
                let name: String = chars[i..end].iter().map(|(_, c)| c).collect();
                (Token::Ident(name), end - i)
            }
            (c, _) => return Err(ExprError::UnexpectedChar { ch: c, offset }),
        };

        tokens.push((token, offset));
        i += width;
    }

    Ok(tokens)
}

fn scan(chars: &[(usize, char)], start: usize, accept: impl Fn(char) -> bool) -> usize {
    let mut end = start;
    while end < chars.len() && accept(chars[end].1) {
        end += 1;
    }
    end
}

// ============================================================================
// Parser
// ============================================================================

struct Parser {
    tokens: Vec<(Token, usize)>,
    pos: usize,
    /// Open parentheses enclosing the current position
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn advance(&mut self) -> Option<(Token, usize)> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn parse_or(&mut self) -> Result<Expr, ExprError> {
        let mut lhs = self.parse_and()?;
        while self.peek() == Some(&Token::Or) {
            self.advance();
            let rhs = self.parse_and()?;
            lhs = logical(LogicalOp::Or, lhs, rhs)?;
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr, ExprError> {
        let mut lhs = self.parse_comparison()?;
        while self.peek() == Some(&Token::And) {
            self.advance();
            let rhs = self.parse_comparison()?;
            lhs = logical(LogicalOp::And, lhs, rhs)?;
        }
        Ok(lhs)
    }

    fn parse_comparison(&mut self) -> Result<Expr, ExprError> {
        let lhs = self.parse_operand()?;
        let op = match self.peek() {
            Some(Token::Cmp(op)) => *op,
            _ => return Ok(lhs),
        };
        self.advance();
        let rhs = self.parse_operand()?;

        if lhs.kind() != Kind::Number || rhs.kind() != Kind::Number {
            return Err(ExprError::TypeMismatch(format!(
                "'{}' compares non-numeric operands",
                op.symbol()
            )));
        }

        Ok(Expr::Compare {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        })
    }

    fn parse_operand(&mut self) -> Result<Expr, ExprError> {
        match self.advance() {
            Some((Token::Number(value), _)) => Ok(Expr::Literal(value)),
            Some((Token::Minus, offset)) => match self.advance() {
                Some((Token::Number(value), _)) => Ok(Expr::Literal(-value)),
                _ => Err(ExprError::UnexpectedToken {
                    token: "-".into(),
                    offset,
                }),
            },
            Some((Token::Ident(name), _)) => {
                check_field(&name)?;
                Ok(Expr::Field(name))
            }
            Some((Token::LParen, offset)) => {
                if self.depth == MAX_NESTING {
                    return Err(ExprError::TooDeep { offset, limit: MAX_NESTING });
                }
                self.depth += 1;
                let inner = self.parse_or()?;
                self.depth -= 1;
                match self.advance() {
                    Some((Token::RParen, _)) => Ok(inner),
                    _ => Err(ExprError::UnclosedParen(offset)),
                }
            }
            Some((token, offset)) => Err(ExprError::UnexpectedToken {
                token: token.to_string(),
                offset,
            }),
            None => Err(ExprError::UnexpectedEnd),
        }
    }
}

fn logical(op: LogicalOp, lhs: Expr, rhs: Expr) -> Result<Expr, ExprError> {
    if lhs.kind() != Kind::Bool || rhs.kind() != Kind::Bool {
        return Err(ExprError::TypeMismatch(
            "'&&' and '||' require comparisons on both sides".into(),
        ));
    }
    Ok(Expr::Logical {
        op,
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
    })
}

/// Reject paths that can never resolve. Custom metrics are only known at
/// evaluation time.
fn check_field(name: &str) -> Result<(), ExprError> {
    if let Some(custom) = name.strip_prefix("custom.") {
        if !custom.is_empty() {
            return Ok(());
        }
    } else if MetricSnapshot::default().field(name).is_some() {
        return Ok(());
    }
    Err(ExprError::UnknownField(name.to_string()))
}

/// Condition parse and evaluation errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExprError {
    #[error("Empty condition")]
    Empty,

    #[error("Unexpected character '{ch}' at offset {offset}")]
    UnexpectedChar { ch: char, offset: usize },

    #[error("Unexpected token '{token}' at offset {offset}")]
    UnexpectedToken { token: String, offset: usize },

    #[error("Unexpected end of condition")]
    UnexpectedEnd,

    #[error("Unclosed parenthesis opened at offset {0}")]
    UnclosedParen(usize),

    #[error("Invalid number: {0}")]
    InvalidNumber(String),

    #[error("Unknown metric field: {0}")]
    UnknownField(String),

    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    #[error("Condition does not produce a boolean")]
    NotBoolean,

    #[error("Condition has {tokens} tokens, limit is {limit}")]
    TooLong { tokens: usize, limit: usize },

    #[error("Parenthesis at offset {offset} nests deeper than {limit} levels")]
    TooDeep { offset: usize, limit: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(error_rate: f64, response_time: f64) -> MetricSnapshot {
        MetricSnapshot {
            error_rate,
            response_time,
            availability: 99.5,
            ..Default::default()
        }
    }

    #[test]
    fn test_parse_simple_comparison() {
        let expr = Expr::parse("errorRate > 5").unwrap();
        assert_eq!(
            expr,
            Expr::Compare {
                op: CompareOp::Gt,
                lhs: Box::new(Expr::Field("errorRate".into())),
                rhs: Box::new(Expr::Literal(5.0)),
            }
        );
        assert!(expr.evaluate(&snapshot(6.0, 0.0)).unwrap());
        assert!(!expr.evaluate(&snapshot(5.0, 0.0)).unwrap());
    }

    #[test]
    fn test_precedence_and_binds_tighter() {
        // a || (b && c)
        let expr = Expr::parse("errorRate > 10 || responseTime > 500 && availability < 99").unwrap();
        assert!(matches!(
            expr,
            Expr::Logical {
                op: LogicalOp::Or,
                ..
            }
        ));

        assert!(!expr.evaluate(&snapshot(1.0, 800.0)).unwrap());
        assert!(expr.evaluate(&snapshot(11.0, 0.0)).unwrap());
    }

    #[test]
    fn test_parentheses_group() {
        let expr = Expr::parse("(errorRate > 10 || responseTime > 500) && availability < 99.9").unwrap();
        assert!(expr.evaluate(&snapshot(1.0, 800.0)).unwrap());
        assert!(!expr.evaluate(&snapshot(1.0, 100.0)).unwrap());
    }

    #[test]
    fn test_all_comparison_operators() {
        let s = snapshot(5.0, 0.0);
        for (cond, expected) in [
            ("errorRate < 6", true),
            ("errorRate <= 5", true),
            ("errorRate >= 5", true),
            ("errorRate == 5", true),
            ("errorRate != 5", false),
            ("errorRate > -1", true),
            ("3 < errorRate", true),
        ] {
            let expr = Expr::parse(cond).unwrap();
            assert_eq!(expr.evaluate(&s).unwrap(), expected, "{}", cond);
        }
    }

    #[test]
    fn test_nested_and_custom_paths() {
        let mut s = snapshot(0.0, 0.0);
        s.performance.web_vitals.lcp = 3100.0;
        s.custom.insert("queue_depth".into(), 250.0);

        let expr = Expr::parse("performance.webVitals.lcp > 2500 && custom.queue_depth >= 200").unwrap();
        assert!(expr.evaluate(&s).unwrap());
        assert_eq!(expr.fields(), vec!["performance.webVitals.lcp", "custom.queue_depth"]);
    }

    #[test]
    fn test_missing_custom_metric_is_evaluation_error() {
        let expr = Expr::parse("custom.signups < 10").unwrap();
        let err = expr.evaluate(&snapshot(0.0, 0.0)).unwrap_err();
        assert_eq!(err, ExprError::UnknownField("custom.signups".into()));
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(Expr::parse("   "), Err(ExprError::Empty));
        assert!(matches!(Expr::parse("errorRate >"), Err(ExprError::UnexpectedEnd)));
        assert!(matches!(Expr::parse("(errorRate > 5"), Err(ExprError::UnclosedParen(0))));
        assert!(matches!(
            Expr::parse("errorRate > 5; drop()"),
            Err(ExprError::UnexpectedChar { ch: ';', .. })
        ));
        assert!(matches!(Expr::parse("latency > 5"), Err(ExprError::UnknownField(_))));
        assert!(matches!(Expr::parse("errorRate"), Err(ExprError::NotBoolean)));
        assert!(matches!(Expr::parse("errorRate > 1 && 5"), Err(ExprError::TypeMismatch(_))));
        assert!(matches!(Expr::parse("errorRate > 1 > 0"), Err(ExprError::UnexpectedToken { .. })));
        assert!(matches!(Expr::parse("errorRate > 1.2.3"), Err(ExprError::InvalidNumber(_))));
    }

    #[test]
    fn test_nesting_limit() {
        let within = format!(
            "{}errorRate > 1{}",
            "(".repeat(MAX_NESTING),
            ")".repeat(MAX_NESTING)
        );
        assert!(Expr::parse(&within).is_ok());

        let beyond = format!(
            "{}errorRate > 1{}",
            "(".repeat(MAX_NESTING + 1),
            ")".repeat(MAX_NESTING + 1)
        );
        assert_eq!(
            Expr::parse(&beyond),
            Err(ExprError::TooDeep { offset: MAX_NESTING, limit: MAX_NESTING })
        );
    }

    #[test]
    fn test_hostile_conditions_rejected_without_recursing() {
        let deep = format!("{}errorRate > 1{}", "(".repeat(100_000), ")".repeat(100_000));
        assert!(matches!(Expr::parse(&deep), Err(ExprError::TooLong { .. })));

        let long = vec!["errorRate > 1"; 10_000].join(" && ");
        assert!(matches!(Expr::parse(&long), Err(ExprError::TooLong { .. })));

        // Under the token limit, nesting is still capped
        let nested = format!("{}errorRate > 1{}", "(".repeat(200), ")".repeat(200));
        assert!(matches!(Expr::parse(&nested), Err(ExprError::TooDeep { .. })));
    }

    #[test]
    fn test_or_short_circuits_missing_field() {
        let expr = Expr::parse("errorRate > 5 || custom.absent > 1").unwrap();
        assert!(expr.evaluate(&snapshot(6.0, 0.0)).unwrap());
        assert!(expr.evaluate(&snapshot(1.0, 0.0)).is_err());
    }

    #[test]
    fn test_display_round_trips_structure() {
        let expr = Expr::parse("errorRate > 5 && responseTime <= 300").unwrap();
        assert_eq!(expr.to_string(), "(errorRate > 5 && responseTime <= 300)");
    }
}
