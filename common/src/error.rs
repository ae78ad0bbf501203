//! Error types shared across RateScript crates.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors recorded while validating, resolving or evaluating rate rules.
///
/// These are collected, not thrown: a rule evaluation reports the set of
/// kinds it ran into alongside a diagnostic rendering of the expression.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RuleError {
    /// Pair references nested deeper than the resolver allows.
    #[error("Too many nested rule references")]
    TooMuchNestedCalls,

    /// Identifier is not a valid currency pair.
    #[error("Invalid currency identifier")]
    InvalidCurrencyIdentifier,

    /// Exchange call inside the argument of another exchange call.
    #[error("Nested exchange invocation")]
    NestedInvocation,

    /// Operator the evaluator does not support.
    #[error("Unsupported operator")]
    UnsupportedOperator,

    /// Operator without enough operands.
    #[error("Missing argument")]
    MissingArgument,

    /// Division by a zero divisor.
    #[error("Division by zero")]
    DivideByZero,

    /// An error marker produced upstream reached evaluation.
    #[error("Preprocessing error")]
    PreprocessError,

    /// The rate lookup had no value for a required exchange rate.
    #[error("Rate unavailable")]
    RateUnavailable,

    /// Callee of an exchange call is not a plain exchange name.
    #[error("Invalid exchange name")]
    InvalidExchangeName,

    /// Decimal arithmetic overflowed.
    #[error("Arithmetic overflow")]
    ArithmeticOverflow,
}

impl RuleError {
    /// Get error code for diagnostics and machine-readable output.
    pub fn error_code(&self) -> &'static str {
        match self {
            RuleError::TooMuchNestedCalls => "TOO_MUCH_NESTED_CALLS",
            RuleError::InvalidCurrencyIdentifier => "INVALID_CURRENCY_IDENTIFIER",
            RuleError::NestedInvocation => "NESTED_INVOCATION",
            RuleError::UnsupportedOperator => "UNSUPPORTED_OPERATOR",
            RuleError::MissingArgument => "MISSING_ARGUMENT",
            RuleError::DivideByZero => "DIVIDE_BY_ZERO",
            RuleError::PreprocessError => "PREPROCESS_ERROR",
            RuleError::RateUnavailable => "RATE_UNAVAILABLE",
            RuleError::InvalidExchangeName => "INVALID_EXCHANGE_NAME",
            RuleError::ArithmeticOverflow => "ARITHMETIC_OVERFLOW",
        }
    }
}

/// Error when text is not a valid currency pair.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PairParseError {
    /// No `_` or `/` between the two codes.
    #[error("Missing separator in currency pair: {0}")]
    MissingSeparator(String),

    /// One side is empty or not alphanumeric.
    #[error("Invalid currency code: {0:?}")]
    InvalidCode(String),
}
