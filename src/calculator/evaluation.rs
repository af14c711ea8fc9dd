//! Expression evaluation.
//!
//! A small recursive-descent parser over the keypad grammar: decimal
//! literals, `+ - * / %`, parentheses and a single unary sign per operand.
//! Arithmetic is plain `f64`, so division by zero yields an infinity and
//! `0/0` yields NaN; both are returned as values, not errors.

use std::iter::Peekable;
use std::str::CharIndices;

/// Deepest parenthesis nesting the parser will follow.
const MAX_DEPTH: usize = 256;

/// Why an expression could not be evaluated.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EvaluationError {
    #[error("empty expression")]
    Empty,

    #[error("unexpected character '{ch}' at position {position}")]
    UnexpectedChar { ch: char, position: usize },

    #[error("invalid number literal '{literal}' at position {position}")]
    InvalidNumber { literal: String, position: usize },

    #[error("unexpected '{found}' at position {position}")]
    UnexpectedToken { found: char, position: usize },

    #[error("unexpected end of expression")]
    UnexpectedEnd,

    #[error("unbalanced parenthesis at position {position}")]
    UnbalancedParen { position: usize },

    #[error("parentheses nested deeper than {} levels", MAX_DEPTH)]
    TooDeep,
}

/// Check whether a character is one of the binary operators of the grammar.
pub fn is_binary_operator(c: char) -> bool {
    matches!(c, '+' | '-' | '*' | '/' | '%')
}

/// Repair an expression before evaluation.
///
/// Drops any dangling operators at the end and closes every parenthesis
/// left open.
pub fn normalize(expression: &str) -> String {
    let mut normalized = expression.trim_end_matches(is_binary_operator).to_string();

    let open = normalized.matches('(').count();
    let close = normalized.matches(')').count();
    if open > close {
        normalized.push_str(&")".repeat(open - close));
    }

    normalized
}

/// Evaluate a normalized expression.
pub fn evaluate(expression: &str) -> Result<f64, EvaluationError> {
    let tokens = tokenize(expression)?;
    if tokens.is_empty() {
        return Err(EvaluationError::Empty);
    }

    let mut parser = Parser {
        tokens: &tokens,
        pos: 0,
        depth: 0,
    };
    let value = parser.expression()?;

    match parser.peek() {
        None => Ok(value),
        Some(Spanned {
            token: Token::RParen,
            position,
        }) => Err(EvaluationError::UnbalancedParen { position }),
        Some(spanned) => Err(spanned.unexpected()),
    }
}

/// Render a numeric result the way it is stored back into the expression.
///
/// Finite values use the shortest round-tripping decimal form with no
/// exponent, so the text is always valid keypad input. Non-finite values
/// become the `NaN` / `Infinity` / `-Infinity` literals.
pub fn format_result(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value.is_infinite() {
        if value.is_sign_positive() {
            "Infinity".to_string()
        } else {
            "-Infinity".to_string()
        }
    } else if value == 0.0 {
        // Also folds -0 into 0
        "0".to_string()
    } else {
        format!("{}", value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Token {
    Number(f64),
    Operator(char),
    LParen,
    RParen,
}

#[derive(Debug, Clone, Copy)]
struct Spanned {
    token: Token,
    position: usize,
}

impl Spanned {
    fn unexpected(self) -> EvaluationError {
        let found = match self.token {
            Token::Operator(op) => op,
            Token::LParen => '(',
            Token::RParen => ')',
            // Two literals can't be adjacent after tokenizing, but report
            // something sensible anyway.
            Token::Number(_) => '0',
        };
        EvaluationError::UnexpectedToken {
            found,
            position: self.position,
        }
    }
}

fn tokenize(expression: &str) -> Result<Vec<Spanned>, EvaluationError> {
    let mut tokens = Vec::new();
    let mut chars = expression.char_indices().peekable();

    while let Some(&(position, c)) = chars.peek() {
        let token = match c {
            c if c.is_whitespace() => {
                chars.next();
                continue;
            }
            '0'..='9' | '.' => Token::Number(read_number(expression, &mut chars)?),
            '(' => {
                chars.next();
                Token::LParen
            }
            ')' => {
                chars.next();
                Token::RParen
            }
            c if is_binary_operator(c) => {
                chars.next();
                Token::Operator(c)
            }
            ch => return Err(EvaluationError::UnexpectedChar { ch, position }),
        };
        tokens.push(Spanned { token, position });
    }

    Ok(tokens)
}

fn read_number(
    expression: &str,
    chars: &mut Peekable<CharIndices<'_>>,
) -> Result<f64, EvaluationError> {
    let start = chars.peek().map_or(expression.len(), |&(i, _)| i);
    let mut end = start;
    while let Some(&(i, c)) = chars.peek() {
        if !(c.is_ascii_digit() || c == '.') {
            break;
        }
        end = i + c.len_utf8();
        chars.next();
    }

    let literal = &expression[start..end];
    literal
        .parse::<f64>()
        .map_err(|_| EvaluationError::InvalidNumber {
            literal: literal.to_string(),
            position: start,
        })
}

struct Parser<'a> {
    tokens: &'a [Spanned],
    pos: usize,
    depth: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<Spanned> {
        self.tokens.get(self.pos).copied()
    }

    fn advance(&mut self) -> Option<Spanned> {
        let spanned = self.peek();
        if spanned.is_some() {
            self.pos += 1;
        }
        spanned
    }

    /// expression := term (('+' | '-') term)*
    fn expression(&mut self) -> Result<f64, EvaluationError> {
        let mut value = self.term()?;
        while let Some(Spanned {
            token: Token::Operator(op @ ('+' | '-')),
            ..
        }) = self.peek()
        {
            self.pos += 1;
            let rhs = self.term()?;
            value = if op == '+' { value + rhs } else { value - rhs };
        }
        Ok(value)
    }

    /// term := unary (('*' | '/' | '%') unary)*
    fn term(&mut self) -> Result<f64, EvaluationError> {
        let mut value = self.unary()?;
        while let Some(Spanned {
            token: Token::Operator(op @ ('*' | '/' | '%')),
            ..
        }) = self.peek()
        {
            self.pos += 1;
            let rhs = self.unary()?;
            value = match op {
                '*' => value * rhs,
                '/' => value / rhs,
                _ => value % rhs,
            };
        }
        Ok(value)
    }

    /// unary := ('+' | '-')? primary
    fn unary(&mut self) -> Result<f64, EvaluationError> {
        match self.peek() {
            Some(Spanned {
                token: Token::Operator('-'),
                ..
            }) => {
                self.pos += 1;
                Ok(-self.primary()?)
            }
            Some(Spanned {
                token: Token::Operator('+'),
                ..
            }) => {
                self.pos += 1;
                self.primary()
            }
            _ => self.primary(),
        }
    }

    /// primary := number | '(' expression ')'
    fn primary(&mut self) -> Result<f64, EvaluationError> {
        let spanned = self.advance().ok_or(EvaluationError::UnexpectedEnd)?;
        match spanned.token {
            Token::Number(value) => Ok(value),
            Token::LParen => {
                if self.depth >= MAX_DEPTH {
                    return Err(EvaluationError::TooDeep);
                }
                self.depth += 1;
                let value = self.expression()?;
                self.depth -= 1;

                match self.advance() {
                    Some(Spanned {
                        token: Token::RParen,
                        ..
                    }) => Ok(value),
                    Some(other) => Err(other.unexpected()),
                    None => Err(EvaluationError::UnbalancedParen {
                        position: spanned.position,
                    }),
                }
            }
            _ => Err(spanned.unexpected()),
        }
    }
}
