//! Exchange rate provider trait and implementations.

use async_trait::async_trait;
use ratescript_common::CurrencyPair;
use rust_decimal::Decimal;
use std::collections::HashMap;

use crate::error::FetchError;

/// Source of live rates for one exchange.
#[async_trait]
pub trait ExchangeProvider: Send + Sync {
    /// Exchange name, as used in rule scripts (lower case).
    fn name(&self) -> &str;

    /// Get the rate for a currency pair.
    async fn get_rate(&self, pair: &CurrencyPair) -> Result<Decimal, FetchError>;
}

/// Provider serving a fixed table of rates.
#[derive(Debug, Clone)]
pub struct StaticProvider {
    name: String,
    rates: HashMap<CurrencyPair, Decimal>,
}

impl StaticProvider {
    /// Create an empty provider. The name is lower-cased.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into().to_ascii_lowercase(),
            rates: HashMap::new(),
        }
    }

    /// Add a rate.
    pub fn with_rate(mut self, pair: CurrencyPair, rate: Decimal) -> Self {
        self.rates.insert(pair, rate);
        self
    }

    /// Pairs this provider quotes.
    pub fn pairs(&self) -> impl Iterator<Item = &CurrencyPair> {
        self.rates.keys()
    }
}

#[async_trait]
impl ExchangeProvider for StaticProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get_rate(&self, pair: &CurrencyPair) -> Result<Decimal, FetchError> {
        self.rates.get(pair).copied().ok_or_else(|| FetchError::Provider {
            exchange: self.name.clone(),
            message: format!("no quote for {}", pair),
        })
    }
}

/// Mock provider for testing, counting calls and optionally failing.
#[cfg(any(test, feature = "test-utils"))]
pub struct MockExchangeProvider {
    name: String,
    rates: dashmap::DashMap<CurrencyPair, Decimal>,
    calls: std::sync::atomic::AtomicUsize,
    failing: std::sync::atomic::AtomicBool,
}

#[cfg(any(test, feature = "test-utils"))]
impl MockExchangeProvider {
    /// Create a new mock provider.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rates: dashmap::DashMap::new(),
            calls: std::sync::atomic::AtomicUsize::new(0),
            failing: std::sync::atomic::AtomicBool::new(false),
        }
    }

    /// Set a rate for a currency pair.
    pub fn set_rate(&self, pair: CurrencyPair, rate: Decimal) {
        self.rates.insert(pair, rate);
    }

    /// Make every following call fail.
    pub fn set_failing(&self, failing: bool) {
        self.failing
            .store(failing, std::sync::atomic::Ordering::SeqCst);
    }

    /// Number of `get_rate` calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(any(test, feature = "test-utils"))]
#[async_trait]
impl ExchangeProvider for MockExchangeProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get_rate(&self, pair: &CurrencyPair) -> Result<Decimal, FetchError> {
        self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        if self.failing.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(FetchError::Provider {
                exchange: self.name.clone(),
                message: "unavailable".to_string(),
            });
        }
        self.rates
            .get(pair)
            .map(|r| *r)
            .ok_or_else(|| FetchError::Provider {
                exchange: self.name.clone(),
                message: format!("no quote for {}", pair),
            })
    }
}
