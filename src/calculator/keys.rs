//! Keypad events.
//!
//! The engine consumes one [`KeyEvent`] at a time. Events can be built
//! directly or parsed from the labels printed on the keypad, so a key
//! string like `"12+3="` can drive a calculator from a terminal or a test.

use std::fmt;
use std::str::FromStr;

/// A binary operator key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Add,
    Subtract,
    Multiply,
    Divide,
    Percent,
}

impl Operator {
    /// Every operator, in keypad order.
    pub const ALL: [Operator; 5] = [
        Self::Add,
        Self::Subtract,
        Self::Multiply,
        Self::Divide,
        Self::Percent,
    ];

    /// The character used for this operator inside an expression.
    pub fn symbol(self) -> char {
        match self {
            Self::Add => '+',
            Self::Subtract => '-',
            Self::Multiply => '*',
            Self::Divide => '/',
            Self::Percent => '%',
        }
    }

    /// Map a keypad label or expression character to an operator.
    pub fn from_label(c: char) -> Option<Self> {
        match c {
            '+' => Some(Self::Add),
            '-' | '−' => Some(Self::Subtract),
            '*' | 'x' | 'X' | '×' => Some(Self::Multiply),
            '/' | '÷' => Some(Self::Divide),
            '%' => Some(Self::Percent),
            _ => None,
        }
    }
}

/// One keypress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyEvent {
    AllClear,
    Backspace,
    /// A digit key; always `0..=9` when built through [`KeyEvent::digit`].
    Digit(u8),
    DecimalPoint,
    Operator(Operator),
    SignToggle,
    Equals,
}

impl KeyEvent {
    /// Build a digit event, rejecting values outside `0..=9`.
    pub fn digit(d: u8) -> Option<Self> {
        (d <= 9).then_some(Self::Digit(d))
    }

    /// The character this event appends for digit keys.
    pub fn digit_char(self) -> Option<char> {
        match self {
            Self::Digit(d) => char::from_digit(u32::from(d), 10),
            _ => None,
        }
    }

    fn from_char(c: char) -> Option<Self> {
        if let Some(d) = c.to_digit(10) {
            return Some(Self::Digit(d as u8));
        }
        if let Some(op) = Operator::from_label(c) {
            return Some(Self::Operator(op));
        }
        match c {
            '.' | ',' => Some(Self::DecimalPoint),
            '±' | '~' => Some(Self::SignToggle),
            '=' => Some(Self::Equals),
            'C' | 'c' => Some(Self::Backspace),
            _ => None,
        }
    }
}

impl fmt::Display for KeyEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AllClear => write!(f, "AC"),
            Self::Backspace => write!(f, "C"),
            Self::Digit(d) => write!(f, "{}", d),
            Self::DecimalPoint => write!(f, "."),
            Self::Operator(op) => write!(f, "{}", op.symbol()),
            Self::SignToggle => write!(f, "±"),
            Self::Equals => write!(f, "="),
        }
    }
}

/// A key label that doesn't name any keypad key.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown key '{label}' at position {position}")]
pub struct KeyParseError {
    pub label: String,
    pub position: usize,
}

impl FromStr for KeyEvent {
    type Err = KeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let label = s.trim();
        if label.eq_ignore_ascii_case("ac") {
            return Ok(Self::AllClear);
        }

        let mut chars = label.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Self::from_char(c),
            _ => None,
        }
        .ok_or_else(|| KeyParseError {
            label: label.to_string(),
            position: 0,
        })
    }
}

/// Split a key string into events.
///
/// Each character is one key, except `AC` which is read as a single
/// all-clear key. Whitespace is ignored.
pub fn parse_sequence(input: &str) -> Result<Vec<KeyEvent>, KeyParseError> {
    let mut events = Vec::new();
    let mut chars = input.char_indices().peekable();

    while let Some((position, c)) = chars.next() {
        if c.is_whitespace() {
            continue;
        }

        if c.eq_ignore_ascii_case(&'a') {
            match chars.peek() {
                Some(&(_, next)) if next.eq_ignore_ascii_case(&'c') => {
                    chars.next();
                    events.push(KeyEvent::AllClear);
                    continue;
                }
                _ => {
                    return Err(KeyParseError {
                        label: c.to_string(),
                        position,
                    });
                }
            }
        }

        let event = KeyEvent::from_char(c).ok_or_else(|| KeyParseError {
            label: c.to_string(),
            position,
        })?;
        events.push(event);
    }

    Ok(events)
}
