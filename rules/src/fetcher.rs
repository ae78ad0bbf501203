//! Rate fetching for resolved rules.
//!
//! All rates needed by a batch of pairs are fetched concurrently before any
//! rule is evaluated, so evaluation itself stays synchronous.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use futures::future::join_all;
use ratescript_common::{CurrencyPair, RuleError};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::ast::ERROR_PREFIX;
use crate::cache::{RateCache, RateCacheConfig};
use crate::error::{FetchError, ResolveError};
use crate::provider::ExchangeProvider;
use crate::rates::{ExchangeRateRequirement, ExchangeRates};
use crate::script::RuleScript;

/// Configuration for the rate fetcher.
#[derive(Debug, Clone)]
pub struct FetcherConfig {
    /// Whether to use cached rates.
    pub use_cache: bool,
    /// Cache configuration.
    pub cache: RateCacheConfig,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            use_cache: true,
            cache: RateCacheConfig::default(),
        }
    }
}

/// A rate that could not be fetched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExchangeFailure {
    pub requirement: ExchangeRateRequirement,
    pub message: String,
}

/// Result of pricing one pair.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RateResult {
    pub pair: CurrencyPair,
    pub value: Option<Decimal>,
    pub errors: BTreeSet<RuleError>,
    pub exchange_errors: Vec<ExchangeFailure>,
    /// Flattened rule, before rate substitution.
    pub rule: String,
    /// Rule after rate substitution.
    pub evaluated_rule: String,
}

impl RateResult {
    pub fn has_error(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// Prices currency pairs by resolving rules and querying exchange providers.
pub struct RateFetcher {
    providers: HashMap<String, Arc<dyn ExchangeProvider>>,
    cache: RateCache,
    config: FetcherConfig,
}

impl RateFetcher {
    pub fn new(config: FetcherConfig) -> Self {
        Self {
            providers: HashMap::new(),
            cache: RateCache::with_config(config.cache.clone()),
            config,
        }
    }

    /// Register a provider under its (lower-cased) name.
    pub fn register(&mut self, provider: Arc<dyn ExchangeProvider>) {
        let name = provider.name().to_ascii_lowercase();
        debug!(exchange = %name, "Registered exchange provider");
        self.providers.insert(name, provider);
    }

    pub fn with_provider(mut self, provider: Arc<dyn ExchangeProvider>) -> Self {
        self.register(provider);
        self
    }

    /// Names of registered exchanges.
    pub fn exchanges(&self) -> impl Iterator<Item = &str> {
        self.providers.keys().map(String::as_str)
    }

    pub fn cache(&self) -> &RateCache {
        &self.cache
    }

    /// Fetch a single rate, consulting the cache first.
    #[instrument(skip(self), fields(rate = %requirement))]
    pub async fn fetch_rate(&self, requirement: &ExchangeRateRequirement) -> Result<Decimal, FetchError> {
        if self.config.use_cache {
            if let Some(rate) = self.cache.get(requirement) {
                return Ok(rate);
            }
        }

        let provider = self
            .providers
            .get(&requirement.exchange)
            .ok_or_else(|| FetchError::UnknownExchange(requirement.exchange.clone()))?;
        let rate = provider.get_rate(&requirement.pair).await?;

        if self.config.use_cache {
            self.cache.insert(requirement.clone(), rate);
        }
        Ok(rate)
    }

    /// Price every pair in `pairs` using `script`.
    ///
    /// Results come back in request order. A pair with wildcards fails
    /// with [`ResolveError::WildcardPair`]; every other failure is reported
    /// inside its [`RateResult`].
    pub async fn fetch_rates(
        &self,
        pairs: &[CurrencyPair],
        script: &RuleScript,
    ) -> Vec<(CurrencyPair, Result<RateResult, ResolveError>)> {
        let resolved: Vec<_> = pairs
            .iter()
            .map(|pair| (pair.clone(), script.get_rule_for(pair)))
            .collect();

        // Markers such as `err_no_rule_match` are never fetched; evaluation
        // reports them as preprocess errors.
        let requirements: BTreeSet<ExchangeRateRequirement> = resolved
            .iter()
            .filter_map(|(_, rule)| rule.as_ref().ok())
            .flat_map(|rule| rule.required_rates().iter().cloned())
            .filter(|req| !req.exchange.starts_with(&ERROR_PREFIX.to_ascii_lowercase()))
            .collect();

        let fetched = join_all(requirements.into_iter().map(|req| async move {
            let result = self.fetch_rate(&req).await;
            (req, result)
        }))
        .await;

        let mut rates = ExchangeRates::new();
        let mut failures = HashMap::new();
        for (req, result) in fetched {
            match result {
                Ok(rate) => rates.insert(req.exchange, req.pair, rate),
                Err(e) => {
                    warn!(rate = %req, error = %e, "Failed to fetch rate");
                    failures.insert(req, e.to_string());
                }
            }
        }

        info!(
            pairs = pairs.len(),
            fetched = rates.len(),
            failed = failures.len(),
            "Fetched exchange rates"
        );

        resolved
            .into_iter()
            .map(|(pair, rule)| {
                let result = rule.map(|rule| {
                    let evaluation = rule.evaluate(&rates);
                    let exchange_errors = rule
                        .required_rates()
                        .iter()
                        .filter_map(|req| {
                            failures.get(req).map(|message| ExchangeFailure {
                                requirement: req.clone(),
                                message: message.clone(),
                            })
                        })
                        .collect();
                    RateResult {
                        pair: pair.clone(),
                        value: evaluation.value,
                        errors: evaluation.errors,
                        exchange_errors,
                        rule: rule.to_string(),
                        evaluated_rule: evaluation.evaluated,
                    }
                });
                (pair, result)
            })
            .collect()
    }
}
