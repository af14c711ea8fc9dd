//! What the screen shows after each key event.

use serde::Serialize;

/// The rendered calculator display.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DisplayState {
    /// The expression under construction (or the result / error message).
    pub current: String,
    /// The secondary line: the last evaluated expression.
    pub previous: String,
    /// Whether the current line shows an error message.
    pub is_error: bool,
}

impl DisplayState {
    /// Render both lines right-aligned, previous line first when present.
    pub fn to_lines(&self) -> Vec<String> {
        let width = self
            .current
            .chars()
            .count()
            .max(self.previous.chars().count());

        let mut lines = Vec::with_capacity(2);
        if !self.previous.is_empty() {
            lines.push(format!("{:>width$}", self.previous));
        }
        lines.push(format!("{:>width$}", self.current));
        lines
    }
}
