//! Currency and currency-pair types used by rate rules.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::PairParseError;

/// A currency code such as `BTC` or `USD`, or the wildcard `X`.
///
/// Codes are stored upper-cased, so `btc` and `BTC` are the same currency.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Currency(String);

impl Currency {
    /// Code of the wildcard currency.
    pub const WILDCARD_CODE: &'static str = "X";

    /// Create a currency from a code, validating it.
    pub fn parse(code: &str) -> Result<Self, PairParseError> {
        if code.is_empty() || !code.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(PairParseError::InvalidCode(code.to_string()));
        }
        Ok(Self(code.to_ascii_uppercase()))
    }

    /// The wildcard currency `X`.
    pub fn wildcard() -> Self {
        Self(Self::WILDCARD_CODE.to_string())
    }

    /// Get the currency code.
    pub fn code(&self) -> &str {
        &self.0
    }

    /// Whether this is the wildcard `X`.
    pub fn is_wildcard(&self) -> bool {
        self.0 == Self::WILDCARD_CODE
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Currency {
    type Err = PairParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// An ordered currency pair: the price of `left` expressed in `right`.
///
/// The canonical text form is `LEFT_RIGHT`, which is also how the pair is
/// written as an identifier inside rule scripts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CurrencyPair {
    /// Currency being priced.
    pub left: Currency,
    /// Currency the price is expressed in.
    pub right: Currency,
}

impl CurrencyPair {
    /// Create a new currency pair.
    pub fn new(left: Currency, right: Currency) -> Self {
        Self { left, right }
    }

    /// Parse a pair from its textual form.
    ///
    /// Accepts `LEFT_RIGHT` (the identifier form) and `LEFT/RIGHT`. Each side
    /// must be a non-empty ASCII alphanumeric code; case is normalized.
    pub fn parse(s: &str) -> Result<Self, PairParseError> {
        let (left, right) = s
            .split_once('_')
            .or_else(|| s.split_once('/'))
            .ok_or_else(|| PairParseError::MissingSeparator(s.to_string()))?;
        Ok(Self {
            left: Currency::parse(left)?,
            right: Currency::parse(right)?,
        })
    }

    /// Get the inverse pair.
    pub fn inverse(&self) -> Self {
        Self {
            left: self.right.clone(),
            right: self.left.clone(),
        }
    }

    /// Whether either side is the wildcard.
    pub fn has_wildcard(&self) -> bool {
        self.left.is_wildcard() || self.right.is_wildcard()
    }

    /// Fill the wildcard sides of this pair from `context`.
    pub fn fill_wildcards(&self, context: &CurrencyPair) -> Self {
        Self {
            left: if self.left.is_wildcard() {
                context.left.clone()
            } else {
                self.left.clone()
            },
            right: if self.right.is_wildcard() {
                context.right.clone()
            } else {
                self.right.clone()
            },
        }
    }
}

impl fmt::Display for CurrencyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.left, self.right)
    }
}

impl FromStr for CurrencyPair {
    type Err = PairParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for CurrencyPair {
    type Error = PairParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<CurrencyPair> for String {
    fn from(pair: CurrencyPair) -> Self {
        pair.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_parse_canonicalizes_case() {
        let pair = CurrencyPair::parse("btc_usd").unwrap();
        assert_eq!(pair.left.code(), "BTC");
        assert_eq!(pair.right.code(), "USD");
        assert_eq!(pair.to_string(), "BTC_USD");
    }

    #[test]
    fn test_parse_slash_form() {
        let pair: CurrencyPair = "LTC/eur".parse().unwrap();
        assert_eq!(pair.to_string(), "LTC_EUR");
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(matches!(
            CurrencyPair::parse("BTCUSD"),
            Err(PairParseError::MissingSeparator(_))
        ));
        assert!(CurrencyPair::parse("_USD").is_err());
        assert!(CurrencyPair::parse("BTC_").is_err());
        assert!(CurrencyPair::parse("BTC_USD_EUR").is_err());
        assert!(CurrencyPair::parse("BT-C_USD").is_err());
    }

    #[test]
    fn test_wildcards() {
        let pair = CurrencyPair::parse("x_usd").unwrap();
        assert!(pair.left.is_wildcard());
        assert!(pair.has_wildcard());

        let context = CurrencyPair::parse("BTC_EUR").unwrap();
        assert_eq!(pair.fill_wildcards(&context).to_string(), "BTC_USD");

        let both = CurrencyPair::parse("X_X").unwrap();
        assert_eq!(both.fill_wildcards(&context), context);
    }

    #[test]
    fn test_inverse() {
        let pair = CurrencyPair::parse("BTC_USD").unwrap();
        assert_eq!(pair.inverse().to_string(), "USD_BTC");
        assert_eq!(pair.inverse().inverse(), pair);
    }

    #[test]
    fn test_serde_uses_canonical_string() {
        let pair = CurrencyPair::parse("btc_usd").unwrap();
        let json = serde_json::to_string(&pair).unwrap();
        assert_eq!(json, "\"BTC_USD\"");

        let back: CurrencyPair = serde_json::from_str("\"eth/btc\"").unwrap();
        assert_eq!(back.to_string(), "ETH_BTC");
        assert!(serde_json::from_str::<CurrencyPair>("\"nope\"").is_err());
    }

    proptest! {
        #[test]
        fn prop_canonical_form_round_trips(left in "[a-zA-Z0-9]{1,6}", right in "[a-zA-Z0-9]{1,6}") {
            let text = format!("{}_{}", left, right);
            let pair = CurrencyPair::parse(&text).unwrap();
            let canonical = pair.to_string();
            prop_assert_eq!(canonical.clone(), text.to_ascii_uppercase());
            prop_assert_eq!(CurrencyPair::parse(&canonical).unwrap(), pair);
        }
    }
}
