use anyhow::{Context, Result};
use clap::Parser;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use tracing::warn;

use keypad_calc::calculator::{Calculator, DisplayState, parse_sequence};
use keypad_calc::config::Config;
use keypad_calc::logging::{self, Verbosity};

/// Drive the keypad calculator from the terminal.
///
/// Keys are typed as their keypad labels: digits, `.` or `,`, `+ - * / %`
/// (also `x × ÷ −`), `~` or `±` to toggle the sign, `=`, `C` for backspace
/// and `AC` to clear everything.
#[derive(Parser, Debug)]
#[command(name = "keypad-calc", version, about)]
struct Cli {
    /// Key strings to press in order, e.g. "12+3=". Without any, read key
    /// strings from stdin line by line.
    keys: Vec<String>,

    /// Path to a config file instead of the default location.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Display locale (en, fr), overriding the config file.
    #[arg(long)]
    locale: Option<String>,

    /// Print the display as JSON.
    #[arg(long)]
    json: bool,

    /// Print the effective configuration and exit.
    #[arg(long)]
    print_config: bool,

    /// Log every key event.
    #[arg(short, long)]
    verbose: bool,

    /// Only log errors.
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_subscriber(Verbosity::from_flags(cli.verbose, cli.quiet));

    let mut config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;
    if let Some(locale) = cli.locale {
        config.display.locale = locale;
    }

    if cli.print_config {
        print!("{}", config.to_toml_string()?);
        return Ok(());
    }

    let mut calculator = config.build_calculator()?;

    if cli.keys.is_empty() {
        return run_interactive(&mut calculator, cli.json);
    }

    for keys in &cli.keys {
        let events =
            parse_sequence(keys).with_context(|| format!("Invalid key string '{}'", keys))?;
        calculator.handle_keys(events);
    }
    print_display(&mut io::stdout().lock(), &calculator.display_state(), cli.json)
}

fn run_interactive(calculator: &mut Calculator, json: bool) -> Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout().lock();

    for line in stdin.lock().lines() {
        let line = line.context("Failed to read from stdin")?;
        let line = line.trim();
        if matches!(line, "quit" | "exit") {
            break;
        }
        if line.is_empty() {
            continue;
        }

        match parse_sequence(line) {
            Ok(events) => {
                calculator.handle_keys(events);
                print_display(&mut stdout, &calculator.display_state(), json)?;
            }
            Err(err) => warn!(input = %line, "{}", err),
        }
    }

    Ok(())
}

fn print_display(out: &mut impl Write, display: &DisplayState, json: bool) -> Result<()> {
    if json {
        writeln!(out, "{}", serde_json::to_string(display)?)?;
    } else {
        for line in display.to_lines() {
            writeln!(out, "{}", line)?;
        }
    }
    out.flush()?;
    Ok(())
}
