//! A keypad-driven calculator engine.
//!
//! Key events go into a [`calculator::Calculator`]; the formatted current
//! and previous lines come out of [`calculator::Calculator::display_state`].

pub mod calculator;
pub mod config;
pub mod logging;
