//! CLI configuration.

use std::path::PathBuf;
use std::str::FromStr;

use rust_decimal::Decimal;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Plain,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "plain" | "text" => Ok(LogFormat::Plain),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("Unknown log format: {}", other)),
        }
    }
}

/// Main CLI configuration.
#[derive(Debug, Clone)]
pub struct CliConfig {
    /// Path to the rule script.
    pub rules_path: Option<PathBuf>,
    /// Path to the JSON rate table.
    pub rates_path: Option<PathBuf>,
    /// Multiplier applied to every resolved rule.
    pub multiplier: Decimal,
    /// Print results as JSON.
    pub json: bool,
    /// Log format.
    pub log_format: LogFormat,
    /// Log level, used when `RUST_LOG` is not set.
    pub log_level: String,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            rules_path: None,
            rates_path: None,
            multiplier: Decimal::ONE,
            json: false,
            log_format: LogFormat::Plain,
            log_level: "warn".to_string(),
        }
    }
}

impl CliConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(path) = std::env::var("RATESCRIPT_RULES") {
            config.rules_path = Some(PathBuf::from(path));
        }

        if let Ok(path) = std::env::var("RATESCRIPT_RATES") {
            config.rates_path = Some(PathBuf::from(path));
        }

        if let Ok(multiplier) = std::env::var("RATESCRIPT_MULTIPLIER") {
            if let Ok(multiplier) = multiplier.parse() {
                config.multiplier = multiplier;
            }
        }

        if let Ok(format) = std::env::var("RATESCRIPT_LOG_FORMAT") {
            if let Ok(format) = format.parse() {
                config.log_format = format;
            }
        }

        if let Ok(level) = std::env::var("LOG_LEVEL") {
            config.log_level = level;
        }

        config
    }

    /// Validate configuration.
    ///
    /// A missing rule script path is reported when the script is loaded.
    pub fn validate(&self) -> Result<(), String> {
        if self.log_level.is_empty() {
            return Err("Log level cannot be empty".to_string());
        }

        if self.rates_path.as_ref().is_some_and(|path| path.as_os_str().is_empty()) {
            return Err("Rate table path cannot be empty".to_string());
        }

        Ok(())
    }
}
