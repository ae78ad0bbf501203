//! Rules resolved for a concrete currency pair.

use std::collections::BTreeSet;
use std::fmt;

use ratescript_common::{CurrencyPair, RuleError};
use rust_decimal::Decimal;

use crate::ast::Expr;
use crate::evaluator::{self, Evaluation};
use crate::flatten::flatten;
use crate::rates::{ExchangeRateRequirement, FnLookup, RateLookup};
use crate::script::RuleScript;

/// A flattened rule for one requested pair.
///
/// The expression references nothing but exchange lookups, all of which
/// are listed by [`ResolvedRule::required_rates`]. Evaluation does not
/// change the rule, so it can be repeated with fresh rates at any time.
#[derive(Debug, Clone)]
pub struct ResolvedRule {
    pair: CurrencyPair,
    expression: Expr,
    requirements: BTreeSet<ExchangeRateRequirement>,
    errors: BTreeSet<RuleError>,
}

impl ResolvedRule {
    pub(crate) fn resolve(script: &RuleScript, pair: CurrencyPair, candidate: &Expr) -> Self {
        let flattened = flatten(script, &pair, candidate);
        Self {
            pair,
            expression: flattened.expr,
            requirements: flattened.requirements,
            errors: flattened.errors,
        }
    }

    /// The pair this rule was resolved for.
    pub fn pair(&self) -> &CurrencyPair {
        &self.pair
    }

    /// The flattened expression.
    pub fn expression(&self) -> &Expr {
        &self.expression
    }

    /// Exchange rates needed to evaluate this rule.
    pub fn required_rates(&self) -> &BTreeSet<ExchangeRateRequirement> {
        &self.requirements
    }

    /// Errors found while flattening, e.g. [`RuleError::TooMuchNestedCalls`].
    pub fn resolution_errors(&self) -> &BTreeSet<RuleError> {
        &self.errors
    }

    /// Evaluate the rule with rates from `rates`.
    pub fn evaluate<L: RateLookup + ?Sized>(&self, rates: &L) -> Evaluation {
        evaluator::evaluate(&self.expression, rates, &self.errors)
    }

    /// Evaluate the rule with rates from a closure.
    pub fn evaluate_with<F>(&self, rates: F) -> Evaluation
    where
        F: Fn(&str, &CurrencyPair) -> Option<Decimal>,
    {
        self.evaluate(&FnLookup(rates))
    }
}

impl fmt::Display for ResolvedRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.expression)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn pair(s: &str) -> CurrencyPair {
        CurrencyPair::parse(s).unwrap()
    }

    #[test]
    fn test_literal_rule_needs_no_rates() {
        let script = RuleScript::parse("BTC_USD = 100;").unwrap();
        let rule = script.get_rule_for(&pair("BTC_USD")).unwrap();

        assert!(rule.required_rates().is_empty());
        let evaluation = rule.evaluate_with(|_, _| None);
        assert_eq!(evaluation.value, Some(dec!(100)));
        assert!(evaluation.errors.is_empty());
    }

    #[test]
    fn test_evaluation_is_repeatable() {
        let script = RuleScript::parse("BTC_X = 2 * bittrex(BTC_X);").unwrap();
        let rule = script.get_rule_for(&pair("BTC_EUR")).unwrap();

        let first = rule.evaluate_with(|_, _| Some(dec!(50)));
        let second = rule.evaluate_with(|_, _| Some(dec!(50)));
        assert_eq!(first, second);
        assert_eq!(first.value, Some(dec!(100)));

        let missing = rule.evaluate_with(|_, _| None);
        assert_eq!(missing.errors, BTreeSet::from([RuleError::RateUnavailable]));

        let updated = rule.evaluate_with(|_, _| Some(dec!(60)));
        assert_eq!(updated.value, Some(dec!(120)));
        assert!(!updated.has_error());
    }

    #[test]
    fn test_depth_guard_is_reported_on_evaluation() {
        let script = RuleScript::parse("A_B = B_A; B_A = A_B;").unwrap();
        let rule = script.get_rule_for(&pair("A_B")).unwrap();

        assert!(rule.resolution_errors().contains(&RuleError::TooMuchNestedCalls));
        let evaluation = rule.evaluate_with(|_, _| Some(dec!(1)));
        assert_eq!(
            evaluation.errors,
            BTreeSet::from([RuleError::TooMuchNestedCalls, RuleError::PreprocessError])
        );
        assert_eq!(evaluation.evaluated, "ERR_TOO_MUCH_NESTED_CALLS(B_A)");
    }
}
