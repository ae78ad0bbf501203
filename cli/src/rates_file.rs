//! Loading of JSON rate tables.
//!
//! The file maps exchange names to quoted pairs:
//! `{ "kraken": { "BTC_USD": "42000.5" } }`.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use ratescript_common::CurrencyPair;
use ratescript_rules::{ExchangeProvider, StaticProvider};
use rust_decimal::Decimal;

type RateTable = BTreeMap<String, BTreeMap<CurrencyPair, Decimal>>;

/// Parse a rate table into one provider per exchange.
pub fn parse_providers(json: &str) -> anyhow::Result<Vec<Arc<dyn ExchangeProvider>>> {
    let table: RateTable = serde_json::from_str(json).context("Invalid rate table")?;

    Ok(table
        .into_iter()
        .map(|(exchange, quotes)| {
            let provider = quotes
                .into_iter()
                .fold(StaticProvider::new(exchange), |provider, (pair, rate)| {
                    provider.with_rate(pair, rate)
                });
            Arc::new(provider) as Arc<dyn ExchangeProvider>
        })
        .collect())
}

/// Read and parse a rate table file.
pub fn load_providers(path: &Path) -> anyhow::Result<Vec<Arc<dyn ExchangeProvider>>> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read rate table {}", path.display()))?;
    parse_providers(&json)
}
