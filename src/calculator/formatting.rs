//! Display formatting for calculator expressions.
//!
//! Turns the internal expression (`1234.5*-2`) into what the screen shows
//! (`1,234.5×-2`): numbers are grouped by thousands, the decimal point and
//! operators are swapped for locale glyphs, and error literals become
//! readable messages.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::keys::Operator;

lazy_static! {
    /// A run of digits with at most one decimal point.
    static ref NUMBER_RUN: Regex = Regex::new(r"\d+(?:\.\d*)?|\.\d+").unwrap();
}

/// Display glyph for each operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Glyphs {
    pub add: String,
    pub subtract: String,
    pub multiply: String,
    pub divide: String,
    pub percent: String,
}

impl Default for Glyphs {
    fn default() -> Self {
        Self {
            add: "+".to_string(),
            subtract: "-".to_string(),
            multiply: "×".to_string(),
            divide: "÷".to_string(),
            percent: "%".to_string(),
        }
    }
}

impl Glyphs {
    /// The glyph shown for an operator.
    pub fn glyph(&self, op: Operator) -> &str {
        match op {
            Operator::Add => &self.add,
            Operator::Subtract => &self.subtract,
            Operator::Multiply => &self.multiply,
            Operator::Divide => &self.divide,
            Operator::Percent => &self.percent,
        }
    }
}

/// Locale-dependent pieces of the display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayLocale {
    /// Inserted between groups of three integer digits; may be empty.
    pub grouping_separator: String,
    /// Shown in place of the `.` decimal point.
    pub decimal_separator: String,
    /// Shown for NaN and infinite results.
    pub undefined_message: String,
    /// Shown when the expression could not be evaluated.
    pub math_error_message: String,
    /// Operator glyphs.
    pub glyphs: Glyphs,
}

impl Default for DisplayLocale {
    fn default() -> Self {
        Self::english()
    }
}

impl DisplayLocale {
    /// `1,234.5`, `×` and `÷`.
    pub fn english() -> Self {
        Self {
            grouping_separator: ",".to_string(),
            decimal_separator: ".".to_string(),
            undefined_message: "Undefined result".to_string(),
            math_error_message: "Math error".to_string(),
            glyphs: Glyphs::default(),
        }
    }

    /// `1 234,5`, `x` and `÷`, as printed on the French keypad.
    pub fn french() -> Self {
        Self {
            grouping_separator: " ".to_string(),
            decimal_separator: ",".to_string(),
            undefined_message: "Non défini".to_string(),
            math_error_message: "Erreur mathématique".to_string(),
            glyphs: Glyphs {
                multiply: "x".to_string(),
                ..Glyphs::default()
            },
        }
    }

    /// Look up a built-in locale by name (`en`, `fr`).
    pub fn preset(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "en" | "english" => Some(Self::english()),
            "fr" | "french" => Some(Self::french()),
            _ => None,
        }
    }
}

/// Renders internal expressions for display.
#[derive(Debug, Clone, Default)]
pub struct Formatter {
    locale: DisplayLocale,
}

impl Formatter {
    /// Create a formatter for the given locale.
    pub fn new(locale: DisplayLocale) -> Self {
        Self { locale }
    }

    /// The locale this formatter renders with.
    pub fn locale(&self) -> &DisplayLocale {
        &self.locale
    }

    /// Format an internal expression for display.
    pub fn format(&self, expression: &str) -> String {
        match expression {
            "NaN" | "Infinity" | "-Infinity" => return self.locale.undefined_message.clone(),
            "Error" => return self.locale.math_error_message.clone(),
            _ => {}
        }

        let mut formatted = String::with_capacity(expression.len() * 2);
        let mut last = 0;
        for run in NUMBER_RUN.find_iter(expression) {
            self.push_symbols(&mut formatted, &expression[last..run.start()]);
            self.push_number(&mut formatted, run.as_str());
            last = run.end();
        }
        self.push_symbols(&mut formatted, &expression[last..]);

        formatted
    }

    /// Map displayed text back to the internal expression.
    ///
    /// Only meaningful for text produced by [`Formatter::format`] from a
    /// non-error expression.
    pub fn unformat(&self, displayed: &str) -> String {
        let locale = &self.locale;
        let mut replacements: Vec<(&str, Option<char>)> = Operator::ALL
            .iter()
            .map(|&op| (locale.glyphs.glyph(op), Some(op.symbol())))
            .collect();
        replacements.push((locale.decimal_separator.as_str(), Some('.')));
        replacements.push((locale.grouping_separator.as_str(), None));
        replacements.retain(|(pattern, _)| !pattern.is_empty());
        // Prefer the longest match when one glyph is a prefix of another
        replacements.sort_by_key(|(pattern, _)| std::cmp::Reverse(pattern.len()));

        let mut expression = String::with_capacity(displayed.len());
        let mut rest = displayed;
        'scan: while let Some(c) = rest.chars().next() {
            for (pattern, replacement) in &replacements {
                if let Some(tail) = rest.strip_prefix(*pattern) {
                    expression.extend(replacement);
                    rest = tail;
                    continue 'scan;
                }
            }
            expression.push(c);
            rest = &rest[c.len_utf8()..];
        }

        expression
    }

    fn push_symbols(&self, out: &mut String, text: &str) {
        for c in text.chars() {
            match Operator::from_label(c) {
                Some(op) if op.symbol() == c => out.push_str(self.locale.glyphs.glyph(op)),
                _ => out.push(c),
            }
        }
    }

    fn push_number(&self, out: &mut String, number: &str) {
        let (integer, fraction) = match number.split_once('.') {
            Some((integer, fraction)) => (integer, Some(fraction)),
            None => (number, None),
        };

        out.push_str(&group_thousands(integer, &self.locale.grouping_separator));
        if let Some(fraction) = fraction {
            out.push_str(&self.locale.decimal_separator);
            out.push_str(fraction);
        }
    }
}

/// Insert a separator every three digits, counting from the right.
fn group_thousands(digits: &str, separator: &str) -> String {
    let len = digits.chars().count();
    let mut grouped = String::with_capacity(digits.len() + len / 3 * separator.len());
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            grouped.push_str(separator);
        }
        grouped.push(c);
    }
    grouped
}
