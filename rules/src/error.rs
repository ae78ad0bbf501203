//! Rules engine error types.

use ratescript_common::{CurrencyPair, RuleError};
use thiserror::Error;

/// Errors that prevent a rule script from being constructed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScriptError {
    /// Script text does not follow the grammar.
    #[error("Parse error at line {line}, column {column}: {message}")]
    Parse {
        line: usize,
        column: usize,
        message: String,
    },

    /// Script parsed but failed identifier normalization.
    #[error("Invalid rule script: {}", format_errors(.0))]
    Invalid(Vec<RuleError>),

    /// The same currency pair is assigned more than once.
    #[error("Duplicate rule for {0}")]
    DuplicateRule(CurrencyPair),
}

impl ScriptError {
    /// Rule errors carried by this failure, if any.
    pub fn rule_errors(&self) -> &[RuleError] {
        match self {
            ScriptError::Invalid(errors) => errors,
            _ => &[],
        }
    }
}

fn format_errors(errors: &[RuleError]) -> String {
    errors
        .iter()
        .map(|e| e.error_code())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Errors returned when asking a script for a rule.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    /// Rules can only be resolved for concrete pairs.
    #[error("Invalid X currency in requested pair {0}")]
    WildcardPair(CurrencyPair),
}

/// Errors raised while fetching exchange rates.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// No provider registered under this exchange name.
    #[error("Unknown exchange: {0}")]
    UnknownExchange(String),

    /// Provider failed to return a rate.
    #[error("Exchange {exchange} failed: {message}")]
    Provider { exchange: String, message: String },
}

/// Result type for script construction.
pub type ScriptResult<T> = Result<T, ScriptError>;
