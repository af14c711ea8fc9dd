//! User configuration.
//!
//! Read from `config.toml` in the platform config directory. Every key is
//! optional; a missing file means defaults.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::calculator::{
    Calculator, DEFAULT_MAX_EXPRESSION_LENGTH, DisplayLocale, Formatter, Glyphs,
};

const APP_DIR: &str = "keypad-calc";
const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("unknown locale '{0}', expected one of: en, fr")]
    UnknownLocale(String),

    #[error("failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// `[display]`: locale and rendering.
    pub display: DisplayConfig,
    /// `[input]`: limits on what the keypad accepts.
    pub input: InputConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Built-in locale the overrides below apply to.
    pub locale: String,
    /// Overrides the locale's thousands separator.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grouping_separator: Option<String>,
    /// Overrides the locale's decimal separator.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decimal_separator: Option<String>,
    /// Shown instead of `NaN` and the infinities.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub undefined_message: Option<String>,
    /// Shown when an expression cannot be evaluated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub math_error_message: Option<String>,
    /// Shown on the current line while nothing has been typed.
    pub empty_placeholder: String,
    /// `[display.glyphs]`: per-operator display symbols.
    pub glyphs: GlyphOverrides,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            locale: "en".to_string(),
            grouping_separator: None,
            decimal_separator: None,
            undefined_message: None,
            math_error_message: None,
            empty_placeholder: "0".to_string(),
            glyphs: GlyphOverrides::default(),
        }
    }
}

/// Operator glyphs to use instead of the locale's. Unset keys keep the locale glyph.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GlyphOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub add: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtract: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub multiply: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub divide: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub percent: Option<String>,
}

impl GlyphOverrides {
    fn apply(&self, glyphs: &mut Glyphs) {
        let slots = [
            (&self.add, &mut glyphs.add),
            (&self.subtract, &mut glyphs.subtract),
            (&self.multiply, &mut glyphs.multiply),
            (&self.divide, &mut glyphs.divide),
            (&self.percent, &mut glyphs.percent),
        ];
        for (value, slot) in slots {
            if let Some(value) = value {
                *slot = value.clone();
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    /// Keys that would grow the expression past this many characters are ignored.
    pub max_expression_length: usize,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            max_expression_length: DEFAULT_MAX_EXPRESSION_LENGTH,
        }
    }
}

impl Config {
    /// `<config dir>/keypad-calc/config.toml`, if the platform has a config dir.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_DIR).join(CONFIG_FILE))
    }

    /// Load from an explicit path, or from the default location.
    ///
    /// An explicit path must exist. The default location may be absent, in
    /// which case defaults are returned.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => match Self::default_path() {
                Some(path) if path.exists() => path,
                Some(_) => {
                    debug!("no config file, using defaults");
                    return Ok(Self::default());
                }
                None => {
                    warn!("no config directory on this platform, using defaults");
                    return Ok(Self::default());
                }
            },
        };

        let contents = fs::read_to_string(&path).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;
        let config: Self = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.clone(),
            source,
        })?;

        debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    /// The configuration as it would be written to `config.toml`.
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string(self)?)
    }

    /// The display locale: the named preset with any overrides applied.
    pub fn display_locale(&self) -> Result<DisplayLocale, ConfigError> {
        let display = &self.display;
        let mut locale = DisplayLocale::preset(&display.locale)
            .ok_or_else(|| ConfigError::UnknownLocale(display.locale.clone()))?;

        let overrides = [
            (&display.grouping_separator, &mut locale.grouping_separator),
            (&display.decimal_separator, &mut locale.decimal_separator),
            (&display.undefined_message, &mut locale.undefined_message),
            (&display.math_error_message, &mut locale.math_error_message),
        ];
        for (value, slot) in overrides {
            if let Some(value) = value {
                *slot = value.clone();
            }
        }
        display.glyphs.apply(&mut locale.glyphs);

        Ok(locale)
    }

    /// A fresh calculator session using this configuration.
    pub fn build_calculator(&self) -> Result<Calculator, ConfigError> {
        let formatter = Formatter::new(self.display_locale()?);

        let mut max_expression_length = self.input.max_expression_length;
        if max_expression_length == 0 {
            warn!(
                default = DEFAULT_MAX_EXPRESSION_LENGTH,
                "max_expression_length = 0 would reject every key, using the default"
            );
            max_expression_length = DEFAULT_MAX_EXPRESSION_LENGTH;
        }

        Ok(Calculator::new(formatter)
            .with_max_expression_length(max_expression_length)
            .with_empty_placeholder(self.display.empty_placeholder.clone()))
    }
}
