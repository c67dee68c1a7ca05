//! Rule expressions over target liveness.
//!
//! A dynamic record decides whether it is alive with a small boolean
//! language written against its target names:
//!
//! ```text
//! (%(web1) || %(web2)) && !%(maintenance)
//! ```
//!
//! - `%(name)` is the current alive flag of the target called `name`
//! - `!` negates, `&&` is logical AND, `||` is logical OR
//! - parentheses group, `true` / `false` are literals
//!
//! Precedence is `!` > `&&` > `||`. Expressions are parsed once into a
//! [`RuleExpr`] tree; placeholders are resolved by name at evaluation time,
//! so a target called `a` can never be confused with one called `ab`.
//!
//! Evaluation is fail-closed: a rule that does not parse or that references
//! a target the record does not own evaluates to dead, never to alive.

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use thiserror::Error;

/// Maximum depth of the parsed tree.
///
/// Parentheses, negations and every further operand of an `&&`/`||` chain
/// each add a level.
const MAX_DEPTH: usize = 256;

/// Errors from tokenizing, parsing or evaluating a rule.
///
/// Positions are byte offsets into the rule source.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RuleError {
    /// Rule source is empty or whitespace only
    #[error("empty rule expression")]
    Empty,

    /// A character that is not part of the rule language
    #[error("unexpected character '{ch}' at {pos}")]
    UnexpectedChar {
        /// Offending character
        ch: char,
        /// Byte offset
        pos: usize,
    },

    /// `%(` without a closing `)`
    #[error("unterminated placeholder starting at {pos}")]
    UnterminatedPlaceholder {
        /// Byte offset of the `%`
        pos: usize,
    },

    /// `%()`
    #[error("empty placeholder at {pos}")]
    EmptyPlaceholder {
        /// Byte offset of the `%`
        pos: usize,
    },

    /// A token that does not fit the grammar at this point
    #[error("unexpected {found} at {pos}")]
    UnexpectedToken {
        /// Description of the token
        found: String,
        /// Byte offset
        pos: usize,
    },

    /// Input ended in the middle of an expression
    #[error("unexpected end of rule expression")]
    UnexpectedEnd,

    /// Parentheses, negations or operator chains nested too deeply
    #[error("rule expression nested deeper than {MAX_DEPTH} levels")]
    TooDeep,

    /// Placeholder names a target the record does not own
    #[error("unknown target '{0}'")]
    UnknownTarget(String),
}

/// Parsed rule expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleExpr {
    /// `true` or `false`
    Const(bool),
    /// `%(name)`
    Target(String),
    /// `!expr`
    Not(Box<RuleExpr>),
    /// `lhs && rhs`
    And(Box<RuleExpr>, Box<RuleExpr>),
    /// `lhs || rhs`
    Or(Box<RuleExpr>, Box<RuleExpr>),
}

impl RuleExpr {
    /// Parse a rule expression.
    pub fn parse(source: &str) -> Result<Self, RuleError> {
        let tokens = tokenize(source)?;
        if tokens.is_empty() {
            return Err(RuleError::Empty);
        }

        let mut parser = Parser {
            tokens: &tokens,
            index: 0,
            depth: 0,
        };
        let expr = parser.parse_or()?;

        match parser.peek() {
            None => Ok(expr),
            Some(token) => Err(RuleError::UnexpectedToken {
                found: token.kind.describe(),
                pos: token.pos,
            }),
        }
    }

    /// Evaluate the expression, resolving placeholders through `lookup`.
    ///
    /// Both operands of `&&` and `||` are always evaluated so that an
    /// unknown target is reported even when the other operand would decide
    /// the result on its own.
    pub fn eval<F>(&self, lookup: &F) -> Result<bool, RuleError>
    where
        F: Fn(&str) -> Option<bool>,
    {
        match self {
            Self::Const(value) => Ok(*value),
            Self::Target(name) => {
                lookup(name).ok_or_else(|| RuleError::UnknownTarget(name.clone()))
            }
            Self::Not(inner) => Ok(!inner.eval(lookup)?),
            Self::And(lhs, rhs) => {
                let left = lhs.eval(lookup)?;
                let right = rhs.eval(lookup)?;
                Ok(left && right)
            }
            Self::Or(lhs, rhs) => {
                let left = lhs.eval(lookup)?;
                let right = rhs.eval(lookup)?;
                Ok(left || right)
            }
        }
    }

    /// Target names referenced by the expression.
    #[must_use]
    pub fn targets(&self) -> BTreeSet<&str> {
        let mut names = BTreeSet::new();
        self.collect_targets(&mut names);
        names
    }

    fn collect_targets<'a>(&'a self, names: &mut BTreeSet<&'a str>) {
        match self {
            Self::Const(_) => {}
            Self::Target(name) => {
                names.insert(name.as_str());
            }
            Self::Not(inner) => inner.collect_targets(names),
            Self::And(lhs, rhs) | Self::Or(lhs, rhs) => {
                lhs.collect_targets(names);
                rhs.collect_targets(names);
            }
        }
    }
}

impl fmt::Display for RuleExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Const(value) => write!(f, "{value}"),
            Self::Target(name) => write!(f, "%({name})"),
            Self::Not(inner) => write!(f, "!{inner}"),
            Self::And(lhs, rhs) => write!(f, "({lhs} && {rhs})"),
            Self::Or(lhs, rhs) => write!(f, "({lhs} || {rhs})"),
        }
    }
}

/// Evaluate `source` against a map of target values, failing closed.
///
/// Any parse error or unknown target yields `false`.
#[must_use]
pub fn evaluate(source: &str, values: &HashMap<String, bool>) -> bool {
    RuleExpr::parse(source)
        .and_then(|expr| expr.eval(&|name| values.get(name).copied()))
        .unwrap_or(false)
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum TokenKind {
    LParen,
    RParen,
    Not,
    And,
    Or,
    Literal(bool),
    Placeholder(String),
}

impl TokenKind {
    fn describe(&self) -> String {
        match self {
            Self::LParen => "'('".into(),
            Self::RParen => "')'".into(),
            Self::Not => "'!'".into(),
            Self::And => "'&&'".into(),
            Self::Or => "'||'".into(),
            Self::Literal(value) => format!("'{value}'"),
            Self::Placeholder(name) => format!("'%({name})'"),
        }
    }
}

#[derive(Debug, Clone)]
struct Token {
    kind: TokenKind,
    pos: usize,
}

fn tokenize(source: &str) -> Result<Vec<Token>, RuleError> {
    let mut tokens = Vec::new();
    let mut chars = source.char_indices().peekable();

    while let Some((pos, ch)) = chars.next() {
        let kind = match ch {
            c if c.is_whitespace() => continue,
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '!' => TokenKind::Not,
            '&' | '|' => {
                match chars.next() {
                    Some((_, next)) if next == ch => {}
                    _ => return Err(RuleError::UnexpectedChar { ch, pos }),
                }
                if ch == '&' {
                    TokenKind::And
                } else {
                    TokenKind::Or
                }
            }
            '%' => {
                if !matches!(chars.next(), Some((_, '('))) {
                    return Err(RuleError::UnexpectedChar { ch, pos });
                }
                let mut name = String::new();
                let mut closed = false;
                for (_, c) in chars.by_ref() {
                    if c == ')' {
                        closed = true;
                        break;
                    }
                    name.push(c);
                }
                if !closed {
                    return Err(RuleError::UnterminatedPlaceholder { pos });
                }
                if name.is_empty() {
                    return Err(RuleError::EmptyPlaceholder { pos });
                }
                TokenKind::Placeholder(name)
            }
            c if c.is_ascii_alphabetic() => {
                let mut word = String::from(c);
                while let Some(&(_, next)) = chars.peek() {
                    if !next.is_ascii_alphanumeric() {
                        break;
                    }
                    word.push(next);
                    chars.next();
                }
                match word.as_str() {
                    "true" => TokenKind::Literal(true),
                    "false" => TokenKind::Literal(false),
                    _ => return Err(RuleError::UnexpectedChar { ch: c, pos }),
                }
            }
            other => return Err(RuleError::UnexpectedChar { ch: other, pos }),
        };
        tokens.push(Token { kind, pos });
    }

    Ok(tokens)
}

struct Parser<'a> {
    tokens: &'a [Token],
    index: usize,
    depth: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.index)
    }

    fn next(&mut self) -> Option<&Token> {
        let token = self.tokens.get(self.index);
        if token.is_some() {
            self.index += 1;
        }
        token
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.peek().is_some_and(|t| &t.kind == kind) {
            self.index += 1;
            true
        } else {
            false
        }
    }

    fn descend(&mut self) -> Result<(), RuleError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(RuleError::TooDeep);
        }
        Ok(())
    }

    // Chains build left-deep trees, so each extra operand counts as a level.
    fn parse_or(&mut self) -> Result<RuleExpr, RuleError> {
        let depth = self.depth;
        let mut expr = self.parse_and()?;
        while self.eat(&TokenKind::Or) {
            self.descend()?;
            let rhs = self.parse_and()?;
            expr = RuleExpr::Or(Box::new(expr), Box::new(rhs));
        }
        self.depth = depth;
        Ok(expr)
    }

    fn parse_and(&mut self) -> Result<RuleExpr, RuleError> {
        let depth = self.depth;
        let mut expr = self.parse_unary()?;
        while self.eat(&TokenKind::And) {
            self.descend()?;
            let rhs = self.parse_unary()?;
            expr = RuleExpr::And(Box::new(expr), Box::new(rhs));
        }
        self.depth = depth;
        Ok(expr)
    }

    fn parse_unary(&mut self) -> Result<RuleExpr, RuleError> {
        if self.eat(&TokenKind::Not) {
            self.descend()?;
            let inner = self.parse_unary()?;
            self.depth -= 1;
            return Ok(RuleExpr::Not(Box::new(inner)));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<RuleExpr, RuleError> {
        let token = self.next().cloned().ok_or(RuleError::UnexpectedEnd)?;
        match token.kind {
            TokenKind::Literal(value) => Ok(RuleExpr::Const(value)),
            TokenKind::Placeholder(name) => Ok(RuleExpr::Target(name)),
            TokenKind::LParen => {
                self.descend()?;
                let inner = self.parse_or()?;
                self.depth -= 1;
                match self.next() {
                    Some(Token {
                        kind: TokenKind::RParen,
                        ..
                    }) => Ok(inner),
                    Some(other) => Err(RuleError::UnexpectedToken {
                        found: other.kind.describe(),
                        pos: other.pos,
                    }),
                    None => Err(RuleError::UnexpectedEnd),
                }
            }
            other => Err(RuleError::UnexpectedToken {
                found: other.describe(),
                pos: token.pos,
            }),
        }
    }
}
