//! The expression builder.
//!
//! [`Calculator`] owns the calculator state and turns one key event at a
//! time into a new state. Input is shaped as it arrives: duplicate
//! operators collapse, missing operands get an implicit `0`, and leading
//! zeros are never extended, so the expression is always the prefix of
//! something the evaluator accepts.

use lazy_static::lazy_static;
use regex::Regex;
use tracing::debug;

use super::display::DisplayState;
use super::evaluation::{evaluate, format_result, is_binary_operator, normalize};
use super::formatting::Formatter;
use super::keys::{KeyEvent, Operator};

/// Default bound on the length of the expression under construction.
pub const DEFAULT_MAX_EXPRESSION_LENGTH: usize = 64;

lazy_static! {
    /// The last operand of an expression: either a parenthesized signed
    /// number like `(-3)`, or a number with an optional sign.
    static ref TRAILING_OPERAND: Regex = Regex::new(
        r"(?:\([+-]?\d+(?:\.\d*)?\)|(?P<sign>[+-])?\d+(?:\.\d*)?)$"
    ).unwrap();
}

/// Error shown on the display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorState {
    #[default]
    None,
    /// The result was NaN or infinite.
    Undefined,
    /// The expression could not be evaluated.
    MathError,
}

/// Everything the calculator remembers between key events.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CalculatorState {
    /// The expression under construction, or the last result / error literal.
    pub current: String,
    /// The last evaluated expression, shown as the secondary line.
    pub previous: String,
    /// Set right after a successful `=`, so the next digit starts over.
    pub result_shown: bool,
    /// Any error currently shown instead of an expression.
    pub error: ErrorState,
}

impl CalculatorState {
    /// Whether the display shows an undefined result or a math error.
    pub fn is_error(&self) -> bool {
        self.error != ErrorState::None
    }
}

/// A calculator session.
#[derive(Debug, Clone)]
pub struct Calculator {
    state: CalculatorState,
    formatter: Formatter,
    max_expression_length: usize,
    empty_placeholder: String,
}

impl Default for Calculator {
    fn default() -> Self {
        Self::new(Formatter::default())
    }
}

impl Calculator {
    /// Create an empty session rendering through `formatter`.
    pub fn new(formatter: Formatter) -> Self {
        Self {
            state: CalculatorState::default(),
            formatter,
            max_expression_length: DEFAULT_MAX_EXPRESSION_LENGTH,
            empty_placeholder: "0".to_string(),
        }
    }

    /// Reject keys that would grow the expression past `max` characters.
    pub fn with_max_expression_length(mut self, max: usize) -> Self {
        self.max_expression_length = max;
        self
    }

    /// Text shown on the current line while the expression is empty.
    pub fn with_empty_placeholder(mut self, placeholder: impl Into<String>) -> Self {
        self.empty_placeholder = placeholder.into();
        self
    }

    /// The raw, unformatted state.
    pub fn state(&self) -> &CalculatorState {
        &self.state
    }

    /// The formatter used by [`Calculator::display_state`].
    pub fn formatter(&self) -> &Formatter {
        &self.formatter
    }

    /// Apply one key event.
    pub fn handle_key(&mut self, event: KeyEvent) {
        match event {
            KeyEvent::AllClear => self.all_clear(),
            KeyEvent::Backspace => self.backspace(),
            KeyEvent::Digit(_) => match event.digit_char() {
                Some(digit) => self.digit(digit),
                None => debug!(key = ?event, "digit out of range"),
            },
            KeyEvent::DecimalPoint => self.decimal_point(),
            KeyEvent::Operator(op) => self.operator(op),
            KeyEvent::SignToggle => self.toggle_sign(),
            KeyEvent::Equals => self.equals(),
        }

        if event != KeyEvent::Equals {
            self.state.result_shown = false;
        }

        debug!(
            key = %event,
            current = %self.state.current,
            previous = %self.state.previous,
            error = ?self.state.error,
            "key handled"
        );
    }

    /// Apply a sequence of key events in order.
    pub fn handle_keys(&mut self, events: impl IntoIterator<Item = KeyEvent>) {
        for event in events {
            self.handle_key(event);
        }
    }

    /// The formatted display. Never fails.
    pub fn display_state(&self) -> DisplayState {
        let current = if self.state.current.is_empty() {
            self.empty_placeholder.clone()
        } else {
            self.formatter.format(&self.state.current)
        };

        DisplayState {
            current,
            previous: self.formatter.format(&self.state.previous),
            is_error: self.state.is_error(),
        }
    }

    fn all_clear(&mut self) {
        self.state = CalculatorState::default();
    }

    fn backspace(&mut self) {
        if self.state.is_error() {
            return;
        }
        self.state.current.pop();
    }

    fn digit(&mut self, digit: char) {
        if self.state.is_error() {
            self.state = CalculatorState {
                current: digit.to_string(),
                ..CalculatorState::default()
            };
            return;
        }

        let current = &self.state.current;
        let last_number = trailing_number(current);

        // A lone leading zero is never extended
        if (digit == '0' && current.is_empty()) || (last_number == "0" && !current.is_empty()) {
            debug!(digit = %digit, "leading zero rejected");
            return;
        }

        // After a result the digit starts a new expression
        let next = if self.state.result_shown {
            digit.to_string()
        } else if current.ends_with(')') {
            format!("{}*{}", current, digit)
        } else {
            format!("{}{}", current, digit)
        };

        self.replace_if_fits(next);
    }

    fn decimal_point(&mut self) {
        if self.state.is_error() {
            return;
        }
        if self.state.result_shown {
            self.state.current = "0.".to_string();
            return;
        }

        let current = &self.state.current;
        if trailing_number(current).contains('.') {
            debug!("second decimal point rejected");
            return;
        }

        let suffix = match current.chars().last() {
            Some(')') => "*0.",
            None | Some('(') => "0.",
            Some(c) if is_binary_operator(c) => "0.",
            Some(_) => ".",
        };
        let next = format!("{}{}", current, suffix);
        self.replace_if_fits(next);
    }

    fn operator(&mut self, op: Operator) {
        if self.state.is_error() {
            return;
        }

        let symbol = op.symbol();
        let mut next = self.state.current.clone();
        let last = next.chars().last();

        if op == Operator::Subtract {
            match last {
                Some('+') => {
                    next.pop();
                }
                Some('-') => return,
                _ => {}
            }
        } else {
            let mut tail = next.chars().rev();
            let ends_with_negation = matches!(
                (tail.next(), tail.next()),
                (Some('-'), Some(c)) if is_binary_operator(c)
            );
            if ends_with_negation {
                next.truncate(next.len() - 2);
            } else if last.is_some_and(is_binary_operator) {
                next.pop();
            }

            if next.ends_with('(') {
                debug!(operator = %symbol, "operator after open parenthesis rejected");
                return;
            }
            if next.is_empty() {
                next.push('0');
            }
        }

        next.push(symbol);
        self.replace_if_fits(next);
    }

    fn toggle_sign(&mut self) {
        if self.state.is_error() || self.state.current.is_empty() {
            return;
        }

        let current = self.state.current.clone();
        let Some(caps) = TRAILING_OPERAND.captures(&current) else {
            debug!("no operand to toggle");
            return;
        };
        let Some(operand) = caps.get(0) else {
            return;
        };
        let head = &current[..operand.start()];

        // A signed operand after something else: rewrite the sign in place
        if let Some(sign) = caps.name("sign")
            && !head.is_empty()
        {
            let digits = &current[sign.end()..];
            let operand_position = head
                .chars()
                .last()
                .is_some_and(|c| c == '(' || is_binary_operator(c));

            let new_sign = match (operand_position, sign.as_str()) {
                // Unary minus cancels out, unary plus becomes minus
                (true, "-") => "",
                (true, _) => "-",
                // Binary operators swap
                (false, "-") => "+",
                (false, _) => "-",
            };
            self.state.current = format!("{}{}{}", head, new_sign, digits);
            return;
        }

        let negation = format!("-({})", operand.as_str());
        match evaluate(&negation) {
            Ok(value) => {
                let text = format_result(value);
                let replacement = if value < 0.0 {
                    format!("({})", text)
                } else {
                    text
                };
                self.state.current = format!("{}{}", head, replacement);
            }
            Err(err) => {
                debug!(error = %err, expression = %negation, "sign toggle failed");
                self.enter_math_error();
            }
        }
    }

    fn equals(&mut self) {
        if self.state.is_error() || self.state.current.is_empty() {
            return;
        }

        let normalized = normalize(&self.state.current);
        match evaluate(&normalized) {
            Ok(value) => {
                let finite = value.is_finite();
                self.state.current = format_result(value);
                self.state.previous = normalized;
                self.state.result_shown = finite;
                self.state.error = if finite {
                    ErrorState::None
                } else {
                    ErrorState::Undefined
                };
            }
            Err(err) => {
                debug!(error = %err, expression = %normalized, "evaluation failed");
                self.enter_math_error();
            }
        }
    }

    /// Show the math error, keeping the expression as typed on the previous line.
    fn enter_math_error(&mut self) {
        self.state.previous = std::mem::replace(&mut self.state.current, "Error".to_string());
        self.state.result_shown = false;
        self.state.error = ErrorState::MathError;
    }

    fn replace_if_fits(&mut self, next: String) {
        if next.chars().count() > self.max_expression_length
            && next.len() > self.state.current.len()
        {
            debug!(len = next.len(), "expression length limit reached");
            return;
        }
        self.state.current = next;
    }
}

/// The digits and decimal point at the end of an expression.
fn trailing_number(expression: &str) -> &str {
    let start = expression
        .char_indices()
        .rev()
        .find(|&(_, c)| !(c.is_ascii_digit() || c == '.'))
        .map_or(0, |(i, c)| i + c.len_utf8());
    &expression[start..]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calculator::formatting::DisplayLocale;
    use std::io;
    use std::sync::{Arc, Mutex};
    use crate::calculator::keys::parse_sequence;

    fn press(keys: &str) -> Calculator {
        let mut calculator = Calculator::default();
        calculator.handle_keys(parse_sequence(keys).unwrap());
        calculator
    }

    fn current(keys: &str) -> String {
        press(keys).state().current.clone()
    }

    fn value_of(expression: &str) -> f64 {
        evaluate(&normalize(expression)).unwrap()
    }

    #[test]
    fn test_initial_display() {
        let display = Calculator::default().display_state();
        assert_eq!(display.current, "0");
        assert_eq!(display.previous, "");
        assert!(!display.is_error);
    }

    #[test]
    fn test_digits_concatenate() {
        assert_eq!(current("123"), "123");
        assert_eq!(current("9081"), "9081");
    }

    #[test]
    fn test_leading_zero_collapse() {
        let calculator = press("005");
        assert_eq!(calculator.state().current, "5");
        assert_eq!(calculator.display_state().current, "5");

        assert_eq!(current("0"), "");
        assert_eq!(current("5+00"), "5+0");
        assert_eq!(current(".0"), "0.0");
        assert_eq!(current("100"), "100");
    }

    #[test]
    fn test_lone_zero_is_not_extended() {
        assert_eq!(current("5+03"), "5+0");
        assert_eq!(current("0.C5"), "0");
        assert_eq!(current("5~05"), "(-5)*0");
    }

    #[test]
    fn test_all_clear_is_idempotent() {
        for keys in ["", "12+3", "12+3=", "5/0=", "5~CCC="] {
            let mut calculator = press(keys);
            calculator.handle_key(KeyEvent::AllClear);
            assert_eq!(calculator.state(), &CalculatorState::default());
            calculator.handle_key(KeyEvent::AllClear);
            assert_eq!(calculator.state(), &CalculatorState::default());
        }
    }

    #[test]
    fn test_backspace() {
        assert_eq!(current("123C"), "12");
        assert_eq!(current("1CC"), "");
        assert_eq!(current("5/0=C"), "Infinity");
    }

    #[test]
    fn test_equals_respects_precedence() {
        let calculator = press("1+2*3=");
        assert_eq!(calculator.state().current, "7");
        assert_eq!(calculator.state().previous, "1+2*3");
        assert!(calculator.state().result_shown);
        assert_eq!(calculator.display_state().previous, "1+2×3");
    }

    #[test]
    fn test_division_by_zero_is_undefined() {
        let calculator = press("5/0=");
        assert_eq!(calculator.state().error, ErrorState::Undefined);
        assert_eq!(calculator.state().current, "Infinity");
        assert!(!calculator.state().result_shown);

        let display = calculator.display_state();
        assert_eq!(display.current, "Undefined result");
        assert_eq!(display.previous, "5÷0");
        assert!(display.is_error);

        assert_eq!(current("0/0="), "NaN");
        assert_eq!(current("-5/0="), "-Infinity");
    }

    #[test]
    fn test_dangling_operator_is_dropped() {
        let calculator = press("5+=");
        assert_eq!(calculator.state().current, "5");
        assert_eq!(calculator.state().previous, "5");
        assert_eq!(calculator.state().error, ErrorState::None);
    }

    #[test]
    fn test_equals_ignored_when_empty() {
        let calculator = press("=");
        assert_eq!(calculator.state(), &CalculatorState::default());
    }

    #[test]
    fn test_math_error() {
        // "(-5)" backspaced down to a lone "("
        let calculator = press("5~CCC=");
        assert_eq!(calculator.state().error, ErrorState::MathError);
        assert_eq!(calculator.state().current, "Error");
        assert_eq!(calculator.state().previous, "(");

        let display = calculator.display_state();
        assert_eq!(display.current, "Math error");
        assert!(display.is_error);
    }

    #[test]
    fn test_math_error_keeps_typed_expression() {
        let mut calculator = press("5*3~");
        calculator.enter_math_error();
        assert_eq!(calculator.state().current, "Error");
        assert_eq!(calculator.state().previous, "5*(-3)");
        assert_eq!(calculator.state().error, ErrorState::MathError);
        assert!(!calculator.state().result_shown);
    }

    #[test]
    fn test_error_state_ignores_input() {
        for keys in ["5/0=+", "5/0=.", "5/0=~", "5/0==", "5/0=C"] {
            let calculator = press(keys);
            assert_eq!(calculator.state().current, "Infinity", "{}", keys);
            assert_eq!(calculator.state().error, ErrorState::Undefined);
        }
    }

    #[test]
    fn test_digit_after_error_starts_over() {
        let calculator = press("5/0=7");
        assert_eq!(
            calculator.state(),
            &CalculatorState {
                current: "7".to_string(),
                ..CalculatorState::default()
            }
        );
    }

    #[test]
    fn test_result_is_replaced_or_continued() {
        assert_eq!(current("12=3"), "3");
        assert_eq!(current("12=+3"), "12+3");
        assert_eq!(current("12=."), "0.");
        assert_eq!(current("2+3=="), "5");
        assert!(!press("12=+").state().result_shown);
    }

    #[test]
    fn test_zero_after_result_replaces_it() {
        let calculator = press("12=0");
        assert_eq!(calculator.state().current, "0");
        assert!(!calculator.state().result_shown);

        // The zero is now a lone leading zero, not a suffix of the result
        assert_eq!(current("12=05"), "0");
        assert_eq!(current("12=0+5"), "0+5");
    }

    #[test]
    fn test_result_continues_with_operator() {
        assert_eq!(current("2-5=*4"), "-3*4");
        assert_eq!(current("2-5=*4="), "-12");
    }

    #[test]
    fn test_decimal_point() {
        assert_eq!(current("."), "0.");
        assert_eq!(current("5+."), "5+0.");
        assert_eq!(current("1.2."), "1.2");
        assert_eq!(current("1.2+3."), "1.2+3.");
        assert_eq!(current("5~."), "(-5)*0.");
    }

    #[test]
    fn test_digit_after_closing_parenthesis() {
        assert_eq!(current("5~3"), "(-5)*3");
    }

    #[test]
    fn test_minus_operator() {
        assert_eq!(current("5+-"), "5-");
        assert_eq!(current("5--"), "5-");
        assert_eq!(current("5*-"), "5*-");
        assert_eq!(current("-5"), "-5");
        assert_eq!(current("-5="), "-5");
    }

    #[test]
    fn test_operator_substitution() {
        assert_eq!(current("5*/"), "5/");
        assert_eq!(current("5*-+"), "5+");
        assert_eq!(current("5+%"), "5%");
        assert_eq!(current("+5"), "0+5");
        assert_eq!(current("-*"), "0*");
        assert_eq!(current("5~CC*"), "(-");
    }

    #[test]
    fn test_sign_toggle_round_trip() {
        assert_eq!(value_of(&current("5~")), -5.0);
        assert_eq!(value_of(&current("5~~")), 5.0);

        for keys in ["5", "12+5", "7*3", "5-3", "5*-3", "2.5", "8*2~"] {
            let before = current(keys);
            let twice = current(&format!("{}~~", keys));
            assert_eq!(value_of(&twice), value_of(&before), "{}", keys);
        }
    }

    #[test]
    fn test_sign_toggle_forms() {
        assert_eq!(current("5~"), "(-5)");
        assert_eq!(current("5~~"), "5");
        assert_eq!(current("5*3~"), "5*(-3)");
        assert_eq!(current("5*3~~"), "5*3");
        assert_eq!(current("5-3~"), "5+3");
        assert_eq!(current("5+3~"), "5-3");
        assert_eq!(current("5*-3~"), "5*3");
        assert_eq!(current("2-5=~"), "3");
        assert_eq!(current("5~CC3~"), "(3");
        assert_eq!(current("~"), "");
        assert_eq!(current("5+~"), "5+");
    }

    #[test]
    fn test_sign_toggle_after_result() {
        let calculator = press("2*4=~");
        assert_eq!(calculator.state().current, "(-8)");
        assert!(!calculator.state().result_shown);
        assert_eq!(current("2*4=~5"), "(-8)*5");
    }

    #[test]
    fn test_floating_point_results() {
        assert_eq!(current("0.1+0.2="), "0.30000000000000004");
        assert_eq!(current("7/2="), "3.5");
        assert_eq!(current("10%4="), "2");
    }

    #[test]
    fn test_expression_length_limit() {
        let mut calculator = Calculator::default().with_max_expression_length(3);
        calculator.handle_keys(parse_sequence("1234").unwrap());
        assert_eq!(calculator.state().current, "123");

        calculator.handle_keys(parse_sequence("+.").unwrap());
        assert_eq!(calculator.state().current, "123");

        calculator.handle_key(KeyEvent::Backspace);
        calculator.handle_key(KeyEvent::Operator(Operator::Add));
        assert_eq!(calculator.state().current, "12+");

        calculator.handle_key(KeyEvent::Operator(Operator::Multiply));
        assert_eq!(calculator.state().current, "12*");
    }

    #[test]
    fn test_french_display() {
        let mut calculator = Calculator::new(Formatter::new(DisplayLocale::french()));
        calculator.handle_keys(parse_sequence("1234,5x2=").unwrap());
        let display = calculator.display_state();
        assert_eq!(display.current, "2 469");
        assert_eq!(display.previous, "1 234,5x2");
    }

    #[test]
    fn test_custom_placeholder() {
        let calculator = Calculator::default().with_empty_placeholder("");
        assert_eq!(calculator.display_state().current, "");
    }

    #[test]
    fn test_out_of_range_digit_is_ignored() {
        let mut calculator = press("1");
        calculator.handle_key(KeyEvent::Digit(12));
        assert_eq!(calculator.state().current, "1");
    }

    #[derive(Clone, Default)]
    struct LogBuffer(Arc<Mutex<Vec<u8>>>);

    impl io::Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn captured_logs(keys: &str) -> String {
        let buffer = LogBuffer::default();
        let writer = buffer.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            press(keys);
        });

        let bytes = buffer.0.lock().unwrap().clone();
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn test_rejected_input_is_logged_at_debug() {
        for (keys, message) in [
            ("5+00", "leading zero rejected"),
            ("1.2.", "second decimal point rejected"),
            ("5~CC*", "operator after open parenthesis rejected"),
            ("5+~", "no operand to toggle"),
        ] {
            let logs = captured_logs(keys);
            let line = logs
                .lines()
                .find(|line| line.contains(message))
                .unwrap_or_else(|| panic!("no '{}' in logs for {}", message, keys));
            assert!(line.contains("DEBUG"), "{}", line);
        }
    }

    #[test]
    fn test_trailing_number() {
        assert_eq!(trailing_number("12+3.5"), "3.5");
        assert_eq!(trailing_number("(-3)"), "");
        assert_eq!(trailing_number("5+"), "");
        assert_eq!(trailing_number("42"), "42");
    }
}
