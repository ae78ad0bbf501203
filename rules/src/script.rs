//! Rule tables and candidate resolution.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use ratescript_common::{Currency, CurrencyPair};
use rust_decimal::Decimal;
use tracing::{debug, info, instrument, warn};

use crate::ast::{AssignOp, BinaryOp, Expr, Fault, Statement};
use crate::error::{ResolveError, ScriptError, ScriptResult};
use crate::normalize::normalize;
use crate::parser;
use crate::rule::ResolvedRule;

/// One `PAIR = EXPR` rule.
#[derive(Debug, Clone)]
struct RuleEntry {
    pair: CurrencyPair,
    expr: Expr,
    /// Position of `expr` in the script text, used to break ties.
    offset: usize,
}

/// A parsed and normalized rule script.
///
/// Holds one expression per currency pair (or wildcard pattern) plus a
/// global multiplier applied to every resolved rule. Once built, a script
/// is only read, so it can be shared across threads and resolved
/// concurrently.
#[derive(Debug, Clone)]
pub struct RuleScript {
    rules: Vec<RuleEntry>,
    index: HashMap<CurrencyPair, usize>,
    global_multiplier: Decimal,
}

impl RuleScript {
    /// Parse and normalize a rule script.
    ///
    /// Only top-level `PAIR = EXPR` assignments become rules. Any other
    /// statement is dropped, but it must still be valid.
    pub fn parse(source: &str) -> ScriptResult<Self> {
        let statements = parser::parse(source)?;
        let statements = normalize(statements).map_err(|errors| {
            warn!(errors = ?errors, "Rejected rule script");
            ScriptError::Invalid(errors)
        })?;
        let script = Self::from_statements(statements)?;
        info!(rules = script.len(), "Parsed rule script");
        Ok(script)
    }

    fn from_statements(statements: Vec<Statement<Expr>>) -> ScriptResult<Self> {
        let mut rules = Vec::new();
        let mut index = HashMap::new();

        for statement in statements {
            let Statement::Assign {
                target: Expr::Pair(pair),
                op: AssignOp::Simple,
                value,
                offset,
            } = statement
            else {
                continue;
            };

            if index.contains_key(&pair) {
                warn!(pair = %pair, "Duplicate rule in script");
                return Err(ScriptError::DuplicateRule(pair));
            }
            index.insert(pair.clone(), rules.len());
            rules.push(RuleEntry {
                pair,
                expr: value,
                offset,
            });
        }

        Ok(Self {
            rules,
            index,
            global_multiplier: Decimal::ONE,
        })
    }

    /// Multiplier applied to every resolved rule.
    pub fn global_multiplier(&self) -> Decimal {
        self.global_multiplier
    }

    /// Set the multiplier applied to every rule resolved afterwards.
    pub fn set_global_multiplier(&mut self, multiplier: Decimal) {
        self.global_multiplier = multiplier;
    }

    pub fn with_global_multiplier(mut self, multiplier: Decimal) -> Self {
        self.set_global_multiplier(multiplier);
        self
    }

    /// Number of rules.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Rules in script order.
    pub fn rules(&self) -> impl Iterator<Item = (&CurrencyPair, &Expr)> {
        self.rules.iter().map(|rule| (&rule.pair, &rule.expr))
    }

    /// The expression defined for exactly `pair`, if any.
    pub fn rule(&self, pair: &CurrencyPair) -> Option<&Expr> {
        self.entry(pair).map(|rule| &rule.expr)
    }

    fn entry(&self, pair: &CurrencyPair) -> Option<&RuleEntry> {
        self.index.get(pair).and_then(|&i| self.rules.get(i))
    }

    /// Pick the expression that prices `pair`.
    ///
    /// Candidates by priority: the exact pair; `L_X` or `X_R`; the inverse
    /// pair; the inverse's wildcard forms; `X_X`. Within a priority, the rule
    /// written first in the script wins. An inverse match yields
    /// `1 / INVERSE`, a reference that is resolved again while flattening.
    /// Without any match the result is an `ERR_NO_RULE_MATCH` marker.
    pub fn find_best_candidate(&self, pair: &CurrencyPair) -> Expr {
        let inverse = pair.inverse();
        let wildcard = Currency::wildcard();
        let candidates = [
            (pair.clone(), 0, false),
            (CurrencyPair::new(pair.left.clone(), wildcard.clone()), 1, false),
            (CurrencyPair::new(wildcard.clone(), pair.right.clone()), 1, false),
            (inverse.clone(), 2, true),
            (CurrencyPair::new(inverse.left.clone(), wildcard.clone()), 3, true),
            (CurrencyPair::new(wildcard.clone(), inverse.right.clone()), 3, true),
            (CurrencyPair::new(wildcard.clone(), wildcard), 4, false),
        ];

        let best = candidates
            .iter()
            .filter_map(|(candidate, priority, is_inverse)| {
                self.entry(candidate)
                    .map(|rule| (*priority, rule.offset, *is_inverse, rule))
            })
            .min_by_key(|(priority, offset, _, _)| (*priority, *offset));

        match best {
            None => {
                debug!(pair = %pair, "No rule matches pair");
                Expr::Fault(Fault::NoRuleMatch(pair.clone()))
            }
            Some((priority, _, true, rule)) => {
                debug!(pair = %pair, matched = %rule.pair, priority, "Resolved through inverse pair");
                Expr::binary(BinaryOp::Div, Expr::Number(Decimal::ONE), Expr::Pair(inverse))
            }
            Some((priority, _, false, rule)) => {
                debug!(pair = %pair, matched = %rule.pair, priority, "Resolved rule candidate");
                rule.expr.clone()
            }
        }
    }

    /// Resolve and flatten the rule for a concrete pair.
    #[instrument(skip(self), fields(pair = %pair))]
    pub fn get_rule_for(&self, pair: &CurrencyPair) -> Result<ResolvedRule, ResolveError> {
        if pair.has_wildcard() {
            return Err(ResolveError::WildcardPair(pair.clone()));
        }

        let mut candidate = self.find_best_candidate(pair);
        if self.global_multiplier != Decimal::ONE {
            candidate = Expr::binary(
                BinaryOp::Mul,
                Expr::group(candidate),
                Expr::Number(self.global_multiplier),
            );
        }
        Ok(ResolvedRule::resolve(self, pair.clone(), &candidate))
    }
}

impl FromStr for RuleScript {
    type Err = ScriptError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for RuleScript {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, rule) in self.rules.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{} = {};", rule.pair, rule.expr)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratescript_common::RuleError;
    use rust_decimal_macros::dec;

    fn pair(s: &str) -> CurrencyPair {
        CurrencyPair::parse(s).unwrap()
    }

    fn candidate(script: &str, requested: &str) -> String {
        RuleScript::parse(script)
            .unwrap()
            .find_best_candidate(&pair(requested))
            .to_string()
    }

    #[test]
    fn test_scaffolding_is_dropped() {
        let script = RuleScript::parse(
            "// rules\nBTC_USD = 100;\nBTC_EUR += 1;\nkraken(BTC_USD);\nLTC_USD = kraken(LTC_USD)",
        )
        .unwrap();
        assert_eq!(script.len(), 2);
        assert_eq!(script.to_string(), "BTC_USD = 100;\nLTC_USD = kraken(LTC_USD);");
    }

    #[test]
    fn test_duplicate_rule_is_rejected() {
        let err = RuleScript::parse("BTC_USD = 1;\nbtc_usd = 2;").unwrap_err();
        assert_eq!(err, ScriptError::DuplicateRule(pair("BTC_USD")));
    }

    #[test]
    fn test_normalization_errors_are_returned() {
        let err = RuleScript::parse("BTC_USD = kraken(bitstamp(BTC_USD)); LTC_USD = foo").unwrap_err();
        assert_eq!(
            err.rule_errors(),
            &[RuleError::NestedInvocation, RuleError::InvalidCurrencyIdentifier]
        );
    }

    #[test]
    fn test_exact_match_wins() {
        let script = "X_X = 4; BTC_X = 1; BTC_USD = 0; USD_BTC = 2;";
        assert_eq!(candidate(script, "BTC_USD"), "0");
    }

    #[test]
    fn test_wildcard_beats_inverse() {
        let script = "USD_BTC = 2; X_USD = 1;";
        assert_eq!(candidate(script, "BTC_USD"), "1");
    }

    #[test]
    fn test_wildcard_tie_breaks_on_script_order() {
        assert_eq!(candidate("X_USD = 2; BTC_X = 1;", "BTC_USD"), "2");
        assert_eq!(candidate("BTC_X = 1; X_USD = 2;", "BTC_USD"), "1");
    }

    #[test]
    fn test_inverse_returns_reference_not_expression() {
        let script = "USD_BTC = bitstamp(USD_BTC);";
        assert_eq!(candidate(script, "BTC_USD"), "1 / USD_BTC");
    }

    #[test]
    fn test_inverse_wildcards() {
        assert_eq!(candidate("USD_X = 3;", "BTC_USD"), "1 / USD_BTC");
        assert_eq!(candidate("X_BTC = 3;", "BTC_USD"), "1 / USD_BTC");
        assert_eq!(candidate("X_BTC = 3; USD_BTC = 5;", "BTC_USD"), "1 / USD_BTC");
    }

    #[test]
    fn test_catch_all_is_last_resort() {
        assert_eq!(candidate("X_X = kraken(X_X); USD_X = 2;", "BTC_USD"), "1 / USD_BTC");
        assert_eq!(candidate("X_X = kraken(X_X);", "BTC_USD"), "kraken(X_X)");
    }

    #[test]
    fn test_no_match_returns_error_marker() {
        assert_eq!(candidate("LTC_EUR = 1;", "BTC_USD"), "ERR_NO_RULE_MATCH(BTC_USD)");
    }

    #[test]
    fn test_wildcard_request_is_rejected() {
        let script = RuleScript::parse("X_X = 1;").unwrap();
        assert_eq!(
            script.get_rule_for(&pair("BTC_X")).unwrap_err(),
            ResolveError::WildcardPair(pair("BTC_X"))
        );
        assert!(script.get_rule_for(&pair("X_USD")).is_err());
    }

    #[test]
    fn test_global_multiplier_wraps_candidate() {
        let script = RuleScript::parse("BTC_USD = kraken(BTC_USD) + 1;")
            .unwrap()
            .with_global_multiplier(dec!(1.1));
        let rule = script.get_rule_for(&pair("BTC_USD")).unwrap();
        assert_eq!(rule.to_string(), "(kraken(BTC_USD) + 1) * 1.1");
    }

    #[test]
    fn test_rules_iterate_in_script_order() {
        let script = RuleScript::parse("B_C = 2; A_B = 1;").unwrap();
        let pairs: Vec<String> = script.rules().map(|(p, _)| p.to_string()).collect();
        assert_eq!(pairs, vec!["B_C", "A_B"]);
        assert_eq!(script.rule(&pair("A_B")).unwrap().to_string(), "1");
        assert!(script.rule(&pair("C_D")).is_none());
    }
}
