//! RateScript rules engine
//!
//! Parses rate rule scripts, resolves the rule for a requested currency
//! pair and evaluates it against exchange rates.
//!
//! # Features
//!
//! - Wildcard rules (`BTC_X`, `X_X`) and automatic inverse lookup
//! - Recursive flattening of pair references with a fixed depth bound
//! - Exact decimal evaluation with per-rule error sets
//! - Concurrent rate fetching from exchange providers with a TTL cache
//!
//! # Example
//!
//! ```rust,ignore
//! use ratescript_rules::{CurrencyPair, RuleScript};
//!
//! let script = RuleScript::parse("BTC_X = 2 * kraken(BTC_X);")?;
//! let rule = script.get_rule_for(&CurrencyPair::parse("BTC_USD")?)?;
//!
//! assert_eq!(rule.to_string(), "2 * kraken(BTC_USD)");
//! let evaluation = rule.evaluate_with(|_, _| Some(dec!(50)));
//! assert_eq!(evaluation.value, Some(dec!(100)));
//! ```

pub mod ast;
pub mod cache;
pub mod error;
pub mod evaluator;
pub mod fetcher;
mod flatten;
mod normalize;
pub mod parser;
pub mod provider;
pub mod rates;
pub mod rule;
pub mod script;

pub use ast::{BinaryOp, Expr, Fault, UnaryOp};
pub use cache::{RateCache, RateCacheConfig};
pub use error::{FetchError, ResolveError, ScriptError, ScriptResult};
pub use evaluator::Evaluation;
pub use fetcher::{ExchangeFailure, FetcherConfig, RateFetcher, RateResult};
pub use flatten::MAX_NESTED_DEPTH;
pub use provider::{ExchangeProvider, StaticProvider};
pub use rates::{ExchangeRateRequirement, ExchangeRates, RateLookup};
pub use rule::ResolvedRule;
pub use script::RuleScript;

pub use ratescript_common::{Currency, CurrencyPair, PairParseError, RuleError};

#[cfg(any(test, feature = "test-utils"))]
pub use provider::MockExchangeProvider;
