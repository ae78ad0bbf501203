//! Exchange rate caching with TTL support.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use rust_decimal::Decimal;
use tracing::debug;

use crate::rates::ExchangeRateRequirement;

/// Cached rate entry.
#[derive(Debug, Clone)]
struct CacheEntry {
    rate: Decimal,
    cached_at: DateTime<Utc>,
    ttl: Duration,
}

impl CacheEntry {
    fn new(rate: Decimal, ttl: Duration) -> Self {
        Self {
            rate,
            cached_at: Utc::now(),
            ttl,
        }
    }

    fn is_valid(&self) -> bool {
        Utc::now().signed_duration_since(self.cached_at) < self.ttl
    }
}

/// Configuration for rate cache.
#[derive(Debug, Clone)]
pub struct RateCacheConfig {
    /// TTL for cached rates.
    pub ttl: Duration,
    /// Maximum number of entries.
    pub max_entries: usize,
}

impl Default for RateCacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::seconds(30),
            max_entries: 10000,
        }
    }
}

/// Thread-safe cache of exchange rates keyed by `(exchange, pair)`.
pub struct RateCache {
    cache: DashMap<ExchangeRateRequirement, CacheEntry>,
    config: RateCacheConfig,
}

impl RateCache {
    /// Create a new rate cache with default configuration.
    pub fn new() -> Self {
        Self::with_config(RateCacheConfig::default())
    }

    /// Create a new rate cache with custom configuration.
    pub fn with_config(config: RateCacheConfig) -> Self {
        Self {
            cache: DashMap::new(),
            config,
        }
    }

    /// Get a rate from cache if still fresh.
    pub fn get(&self, requirement: &ExchangeRateRequirement) -> Option<Decimal> {
        if let Some(entry) = self.cache.get(requirement) {
            if entry.is_valid() {
                debug!(rate = %requirement, "Cache hit");
                return Some(entry.rate);
            }
            drop(entry);
            debug!(rate = %requirement, "Cache entry expired");
            self.cache.remove(requirement);
        }

        debug!(rate = %requirement, "Cache miss");
        None
    }

    /// Insert a rate into cache.
    pub fn insert(&self, requirement: ExchangeRateRequirement, rate: Decimal) {
        if self.cache.len() >= self.config.max_entries {
            self.evict_expired();
        }
        if self.cache.len() >= self.config.max_entries && !self.cache.contains_key(&requirement) {
            debug!(rate = %requirement, "Cache full, not caching");
            return;
        }
        self.cache
            .insert(requirement, CacheEntry::new(rate, self.config.ttl));
    }

    /// Clear all cached rates.
    pub fn clear(&self) {
        self.cache.clear();
    }

    /// Get the number of entries in cache.
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    /// Check if cache is empty.
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    /// Evict expired entries.
    pub fn evict_expired(&self) {
        self.cache.retain(|_, entry| entry.is_valid());
    }
}

impl Default for RateCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratescript_common::CurrencyPair;
    use rust_decimal_macros::dec;
    use std::thread::sleep;
    use std::time::Duration as StdDuration;

    fn requirement(exchange: &str, pair: &str) -> ExchangeRateRequirement {
        ExchangeRateRequirement::new(exchange, CurrencyPair::parse(pair).unwrap())
    }

    #[test]
    fn test_cache_insert_and_get() {
        let cache = RateCache::new();
        cache.insert(requirement("kraken", "BTC_USD"), dec!(42000));

        assert_eq!(cache.get(&requirement("kraken", "BTC_USD")), Some(dec!(42000)));
        assert_eq!(cache.get(&requirement("bitstamp", "BTC_USD")), None);
    }

    #[test]
    fn test_cache_expiry() {
        let config = RateCacheConfig {
            ttl: Duration::milliseconds(50),
            ..Default::default()
        };
        let cache = RateCache::with_config(config);
        cache.insert(requirement("kraken", "BTC_USD"), dec!(1));

        assert!(cache.get(&requirement("kraken", "BTC_USD")).is_some());

        sleep(StdDuration::from_millis(60));

        assert!(cache.get(&requirement("kraken", "BTC_USD")).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_cache_capacity() {
        let config = RateCacheConfig {
            max_entries: 1,
            ..Default::default()
        };
        let cache = RateCache::with_config(config);
        cache.insert(requirement("kraken", "BTC_USD"), dec!(1));
        cache.insert(requirement("kraken", "LTC_USD"), dec!(2));

        assert_eq!(cache.len(), 1);
        cache.clear();
        assert_eq!(cache.len(), 0);
    }
}
