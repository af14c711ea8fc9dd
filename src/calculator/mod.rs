//! Calculator engine for keypad input.
//!
//! This module provides functionality to:
//! - Build a valid expression from individual key events
//! - Format expressions for display in a given locale
//! - Evaluate expressions without executing arbitrary code

mod builder;
mod display;
mod evaluation;
mod formatting;
mod keys;

pub use builder::{Calculator, CalculatorState, DEFAULT_MAX_EXPRESSION_LENGTH, ErrorState};
pub use display::DisplayState;
pub use evaluation::{EvaluationError, evaluate, format_result, normalize};
pub use formatting::{DisplayLocale, Formatter, Glyphs};
pub use keys::{KeyEvent, KeyParseError, Operator, parse_sequence};
