//! RateScript CLI
//!
//! Loads a rule script and a rate table, then prices the requested pairs.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use ratescript_common::CurrencyPair;
use ratescript_rules::{FetcherConfig, RateFetcher, RateResult, ResolveError, RuleScript};
use rust_decimal::Decimal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod rates_file;

use config::{CliConfig, LogFormat};

/// RateScript CLI
#[derive(Parser, Debug)]
#[command(name = "ratescript")]
#[command(about = "Evaluate currency rate rule scripts")]
struct Args {
    /// Rule script file
    #[arg(long)]
    rules: Option<PathBuf>,

    /// JSON rate table: { "exchange": { "BTC_USD": "123.4" } }
    #[arg(long)]
    rates: Option<PathBuf>,

    /// Multiplier applied to every rule
    #[arg(long)]
    multiplier: Option<Decimal>,

    /// Print results as JSON
    #[arg(long)]
    json: bool,

    /// Pairs to price, e.g. BTC_USD
    #[arg(required = true)]
    pairs: Vec<CurrencyPair>,
}

impl Args {
    fn apply(self, mut config: CliConfig) -> (CliConfig, Vec<CurrencyPair>) {
        if let Some(rules) = self.rules {
            config.rules_path = Some(rules);
        }
        if let Some(rates) = self.rates {
            config.rates_path = Some(rates);
        }
        if let Some(multiplier) = self.multiplier {
            config.multiplier = multiplier;
        }
        config.json |= self.json;
        (config, self.pairs)
    }
}

fn init_logging(config: &CliConfig) {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| config.log_level.clone()),
    );
    let registry = tracing_subscriber::registry().with(filter);
    match config.log_format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init(),
        LogFormat::Plain => registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let (config, pairs) = Args::parse().apply(CliConfig::from_env());
    init_logging(&config);

    if let Err(e) = config.validate() {
        error!(error = %e, "Invalid configuration");
        return Err(anyhow::anyhow!("Configuration error: {}", e));
    }

    let script = load_script(&config)?;
    info!(rules = script.len(), multiplier = %config.multiplier, "Loaded rule script");

    let mut fetcher = RateFetcher::new(FetcherConfig::default());
    if let Some(rates_path) = &config.rates_path {
        for provider in rates_file::load_providers(rates_path)? {
            fetcher.register(provider);
        }
    }

    let results = fetcher.fetch_rates(&pairs, &script).await;

    if config.json {
        println!("{}", render_json(&results)?);
    } else {
        for (pair, result) in &results {
            print!("{}", render_text(pair, result));
        }
    }

    Ok(())
}

fn load_script(config: &CliConfig) -> anyhow::Result<RuleScript> {
    let rules_path = config
        .rules_path
        .as_deref()
        .context("No rule script given (--rules or RATESCRIPT_RULES)")?;
    let source = std::fs::read_to_string(rules_path)
        .with_context(|| format!("Failed to read rule script {}", rules_path.display()))?;
    let script = RuleScript::parse(&source)
        .with_context(|| format!("Failed to parse {}", rules_path.display()))?;
    Ok(script.with_global_multiplier(config.multiplier))
}

fn render_json(results: &[(CurrencyPair, Result<RateResult, ResolveError>)]) -> anyhow::Result<String> {
    let values: Vec<serde_json::Value> = results
        .iter()
        .map(|(pair, result)| match result {
            Ok(result) => serde_json::to_value(result),
            Err(e) => Ok(serde_json::json!({ "pair": pair, "error": e.to_string() })),
        })
        .collect::<Result<_, _>>()?;
    Ok(serde_json::to_string_pretty(&values)?)
}

fn render_text(pair: &CurrencyPair, result: &Result<RateResult, ResolveError>) -> String {
    let result = match result {
        Ok(result) => result,
        Err(e) => return format!("{}\n  error:     {}\n", pair, e),
    };

    let mut out = format!(
        "{}\n  rule:      {}\n  evaluated: {}\n",
        pair, result.rule, result.evaluated_rule
    );
    match result.value {
        Some(value) if !result.has_error() => out.push_str(&format!("  value:     {}\n", value)),
        _ => {
            let codes: Vec<_> = result.errors.iter().map(|e| e.error_code()).collect();
            out.push_str(&format!("  errors:    {}\n", codes.join(", ")));
        }
    }
    for failure in &result.exchange_errors {
        out.push_str(&format!("  fetch:     {}: {}\n", failure.requirement, failure.message));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratescript_rules::StaticProvider;
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    fn pair(s: &str) -> CurrencyPair {
        CurrencyPair::parse(s).unwrap()
    }

    #[test]
    fn test_flags_override_environment() {
        let args = Args::parse_from(["ratescript", "--multiplier", "1.1", "--json", "BTC_USD", "LTC/EUR"]);
        let env = CliConfig {
            rules_path: Some(PathBuf::from("env.rules")),
            ..Default::default()
        };
        let (config, pairs) = args.apply(env);

        assert_eq!(config.multiplier, dec!(1.1));
        assert!(config.json);
        assert_eq!(config.rules_path, Some(PathBuf::from("env.rules")));
        assert_eq!(pairs, vec![pair("BTC_USD"), pair("LTC_EUR")]);
    }

    #[tokio::test]
    async fn test_render_text() {
        let script = RuleScript::parse("BTC_X = 2 * kraken(BTC_X);").unwrap();
        let fetcher = RateFetcher::new(FetcherConfig::default())
            .with_provider(Arc::new(StaticProvider::new("kraken").with_rate(pair("BTC_USD"), dec!(50))));

        let results = fetcher
            .fetch_rates(&[pair("BTC_USD"), pair("BTC_EUR"), pair("BTC_X")], &script)
            .await;

        let usd = render_text(&results[0].0, &results[0].1);
        assert!(usd.contains("rule:      2 * kraken(BTC_USD)"));
        assert!(usd.contains("value:     100"));

        let eur = render_text(&results[1].0, &results[1].1);
        assert!(eur.contains("errors:    RATE_UNAVAILABLE"));
        assert!(eur.contains("fetch:     kraken(BTC_EUR)"));

        let wildcard = render_text(&results[2].0, &results[2].1);
        assert!(wildcard.contains("Invalid X currency"));

        let json = render_json(&results).unwrap();
        assert!(json.contains("\"error\""));
    }

    #[test]
    fn test_load_script() {
        let err = load_script(&CliConfig::default()).unwrap_err();
        assert!(err.to_string().contains("No rule script given"));

        let dir = std::env::temp_dir().join(format!("ratescript-cli-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let good = dir.join("good.rules");
        let bad = dir.join("bad.rules");
        std::fs::write(&good, "BTC_USD = 100;").unwrap();
        std::fs::write(&bad, "BTC_USD = 1 +;").unwrap();

        let config = CliConfig {
            rules_path: Some(good),
            multiplier: dec!(-2),
            ..Default::default()
        };
        let script = load_script(&config).unwrap();
        assert_eq!(script.global_multiplier(), dec!(-2));

        let config = CliConfig {
            rules_path: Some(bad),
            ..Default::default()
        };
        assert!(load_script(&config).is_err());

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
