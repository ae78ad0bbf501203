//! Exchange-rate requirements and the rate lookup seam.

use ratescript_common::CurrencyPair;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// A concrete rate a flattened rule needs: `pair` as quoted by `exchange`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ExchangeRateRequirement {
    /// Lower-cased exchange name.
    pub exchange: String,
    /// Concrete currency pair (no wildcards once flattened).
    pub pair: CurrencyPair,
}

impl ExchangeRateRequirement {
    pub fn new(exchange: impl Into<String>, pair: CurrencyPair) -> Self {
        Self {
            exchange: exchange.into(),
            pair,
        }
    }
}

impl fmt::Display for ExchangeRateRequirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.exchange, self.pair)
    }
}

/// Source of live rates consulted during evaluation.
///
/// Lookups are synchronous. Anything that needs network access must be
/// fetched ahead of time into an [`ExchangeRates`] table.
pub trait RateLookup {
    /// Get the rate of `pair` on `exchange`, if known.
    fn rate(&self, exchange: &str, pair: &CurrencyPair) -> Option<Decimal>;
}

/// Adapts a closure into a [`RateLookup`].
pub(crate) struct FnLookup<F>(pub F);

impl<F> RateLookup for FnLookup<F>
where
    F: Fn(&str, &CurrencyPair) -> Option<Decimal>,
{
    fn rate(&self, exchange: &str, pair: &CurrencyPair) -> Option<Decimal> {
        (self.0)(exchange, pair)
    }
}

/// A completed table of exchange rates.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExchangeRates {
    rates: HashMap<ExchangeRateRequirement, Decimal>,
}

impl ExchangeRates {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a rate.
    pub fn insert(&mut self, exchange: impl Into<String>, pair: CurrencyPair, rate: Decimal) {
        self.rates
            .insert(ExchangeRateRequirement::new(exchange, pair), rate);
    }

    /// Get a rate by requirement.
    pub fn get(&self, requirement: &ExchangeRateRequirement) -> Option<Decimal> {
        self.rates.get(requirement).copied()
    }

    pub fn len(&self) -> usize {
        self.rates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ExchangeRateRequirement, &Decimal)> {
        self.rates.iter()
    }
}

impl RateLookup for ExchangeRates {
    fn rate(&self, exchange: &str, pair: &CurrencyPair) -> Option<Decimal> {
        self.get(&ExchangeRateRequirement::new(exchange, pair.clone()))
    }
}

impl FromIterator<(ExchangeRateRequirement, Decimal)> for ExchangeRates {
    fn from_iter<I: IntoIterator<Item = (ExchangeRateRequirement, Decimal)>>(iter: I) -> Self {
        Self {
            rates: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_exchange_rates_lookup() {
        let pair = CurrencyPair::parse("BTC_USD").unwrap();
        let mut rates = ExchangeRates::new();
        rates.insert("kraken", pair.clone(), dec!(42000.5));

        assert_eq!(rates.rate("kraken", &pair), Some(dec!(42000.5)));
        assert_eq!(rates.rate("bitstamp", &pair), None);
        assert_eq!(rates.rate("kraken", &pair.inverse()), None);
        assert_eq!(rates.len(), 1);
    }

    #[test]
    fn test_requirement_display() {
        let requirement =
            ExchangeRateRequirement::new("kraken", CurrencyPair::parse("ETH_BTC").unwrap());
        assert_eq!(requirement.to_string(), "kraken(ETH_BTC)");
    }

    #[test]
    fn test_closure_lookup() {
        let lookup = FnLookup(|exchange: &str, _: &CurrencyPair| {
            (exchange == "kraken").then_some(dec!(2))
        });
        let pair = CurrencyPair::parse("A_B").unwrap();
        assert_eq!(lookup.rate("kraken", &pair), Some(dec!(2)));
        assert_eq!(lookup.rate("other", &pair), None);
    }
}
