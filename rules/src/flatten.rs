//! Flattening of resolved rules.
//!
//! Pair references are replaced by the expression of the rule that prices
//! them, recursively, until the only unknowns left are exchange lookups.
//! Wildcards are filled from the pair currently being resolved.

use std::collections::BTreeSet;

use ratescript_common::{CurrencyPair, RuleError};
use tracing::warn;

use crate::ast::{Expr, Fault};
use crate::rates::ExchangeRateRequirement;
use crate::script::RuleScript;

/// Maximum number of pairs on the resolution stack.
///
/// This bound is the only protection against cyclic rules, so a legitimate
/// chain of more than eight references is rejected as well.
pub const MAX_NESTED_DEPTH: usize = 8;

/// Output of flattening one candidate expression.
#[derive(Debug, Clone)]
pub(crate) struct Flattened {
    pub expr: Expr,
    pub requirements: BTreeSet<ExchangeRateRequirement>,
    pub errors: BTreeSet<RuleError>,
}

#[derive(Default)]
struct Collected {
    requirements: BTreeSet<ExchangeRateRequirement>,
    errors: BTreeSet<RuleError>,
}

/// Flatten `candidate`, the rule chosen for `requested`.
pub(crate) fn flatten(script: &RuleScript, requested: &CurrencyPair, candidate: &Expr) -> Flattened {
    let mut context = vec![requested.clone()];
    let mut collected = Collected::default();
    let expr = rewrite(script, candidate, &mut context, &mut collected);
    Flattened {
        expr,
        requirements: collected.requirements,
        errors: collected.errors,
    }
}

fn rewrite(
    script: &RuleScript,
    expr: &Expr,
    context: &mut Vec<CurrencyPair>,
    collected: &mut Collected,
) -> Expr {
    match expr {
        Expr::Number(_) | Expr::Fault(_) => expr.clone(),
        Expr::Rate { exchange, pair } => {
            let pair = fill(pair, context);
            collected
                .requirements
                .insert(ExchangeRateRequirement::new(exchange.clone(), pair.clone()));
            Expr::Rate {
                exchange: exchange.clone(),
                pair,
            }
        }
        Expr::Pair(pair) => inline(script, fill(pair, context), context, collected),
        Expr::Unary { op, operand } => Expr::Unary {
            op: *op,
            operand: Box::new(rewrite(script, operand, context, collected)),
        },
        Expr::Binary { op, left, right } => Expr::binary(
            *op,
            rewrite(script, left, context, collected),
            rewrite(script, right, context, collected),
        ),
        Expr::Group(inner) => Expr::group(rewrite(script, inner, context, collected)),
    }
}

/// Replace a reference to `pair` by its own flattened rule.
fn inline(
    script: &RuleScript,
    pair: CurrencyPair,
    context: &mut Vec<CurrencyPair>,
    collected: &mut Collected,
) -> Expr {
    // Once the guard has tripped the whole rule is a fault; stop expanding
    // siblings so the work stays bounded.
    if collected.errors.contains(&RuleError::TooMuchNestedCalls) {
        return Expr::Fault(Fault::TooMuchNestedCalls(pair));
    }
    if context.len() > MAX_NESTED_DEPTH {
        warn!(pair = %pair, depth = context.len(), "Rule references nested too deeply");
        collected.errors.insert(RuleError::TooMuchNestedCalls);
        return Expr::Fault(Fault::TooMuchNestedCalls(pair));
    }

    let candidate = script.find_best_candidate(&pair);
    context.push(pair.clone());
    let mut inlined = rewrite(script, &candidate, context, collected);
    context.pop();

    if inlined.contains_binary() {
        inlined = Expr::group(inlined);
    }
    if collected.errors.contains(&RuleError::TooMuchNestedCalls) {
        return Expr::Fault(Fault::TooMuchNestedCalls(pair));
    }
    inlined
}

fn fill(pair: &CurrencyPair, context: &[CurrencyPair]) -> CurrencyPair {
    match context.last() {
        Some(current) => pair.fill_wildcards(current),
        None => pair.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    fn pair(s: &str) -> CurrencyPair {
        CurrencyPair::parse(s).unwrap()
    }

    fn flatten_for(source: &str, requested: &str) -> Flattened {
        let script = RuleScript::parse(source).unwrap();
        let requested = pair(requested);
        let candidate = script.find_best_candidate(&requested);
        flatten(&script, &requested, &candidate)
    }

    #[test]
    fn test_wildcard_call_argument_takes_requested_pair() {
        let flattened = flatten_for("BTC_X = 2 * bittrex(BTC_X);", "BTC_EUR");
        assert_eq!(flattened.expr.to_string(), "2 * bittrex(BTC_EUR)");
        assert_eq!(
            flattened.requirements.into_iter().collect::<Vec<_>>(),
            vec![ExchangeRateRequirement::new("bittrex", pair("BTC_EUR"))]
        );
    }

    #[test]
    fn test_references_are_inlined_with_parentheses() {
        let source = "DOGE_X = bittrex(DOGE_BTC) * BTC_X;\nBTC_X = kraken(BTC_X) + 0;";
        let flattened = flatten_for(source, "DOGE_USD");
        assert_eq!(
            flattened.expr.to_string(),
            "bittrex(DOGE_BTC) * (kraken(BTC_USD) + 0)"
        );
        assert_eq!(flattened.requirements.len(), 2);
        assert!(flattened.errors.is_empty());
    }

    #[test]
    fn test_single_lookup_is_not_wrapped() {
        let flattened = flatten_for("DOGE_X = 2 * BTC_X; X_X = kraken(X_X);", "DOGE_USD");
        assert_eq!(flattened.expr.to_string(), "2 * kraken(BTC_USD)");
    }

    #[test]
    fn test_inverse_reference_is_resolved_again() {
        let flattened = flatten_for("X_BTC = kraken(X_BTC);", "BTC_USD");
        // Wildcards are filled from the inverse pair, not from the requested one.
        assert_eq!(flattened.expr.to_string(), "1 / kraken(USD_BTC)");
    }

    #[test]
    fn test_cycle_hits_depth_guard() {
        let flattened = flatten_for("A_B = B_A * 2; B_A = A_B * 2;", "A_B");
        assert!(flattened.errors.contains(&RuleError::TooMuchNestedCalls));
        assert_eq!(flattened.expr.to_string(), "ERR_TOO_MUCH_NESTED_CALLS(B_A) * 2");
    }

    #[test]
    fn test_chain_of_eight_references_resolves() {
        let mut source = String::new();
        for i in 1..=8 {
            source.push_str(&format!("P{}_USD = P{}_USD;\n", i, i + 1));
        }
        source.push_str("P9_USD = 7;");
        let flattened = flatten_for(&source, "P1_USD");
        assert!(flattened.errors.is_empty());
        assert_eq!(flattened.expr.to_string(), "7");

        let source = source.replace("P9_USD = 7;", "P9_USD = P10_USD;\nP10_USD = 7;");
        let flattened = flatten_for(&source, "P1_USD");
        assert!(flattened.errors.contains(&RuleError::TooMuchNestedCalls));
    }

    #[test]
    fn test_wide_self_reference_stops_at_first_guard() {
        let source = format!("X_X = X_X{};", " + X_X".repeat(7));
        let started = Instant::now();
        let flattened = flatten_for(&source, "BTC_USD");

        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(flattened.errors, BTreeSet::from([RuleError::TooMuchNestedCalls]));
        let fault = "ERR_TOO_MUCH_NESTED_CALLS(BTC_USD)";
        assert_eq!(flattened.expr.to_string(), vec![fault; 8].join(" + "));
    }
}
