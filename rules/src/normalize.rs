//! Identifier normalization.
//!
//! Every identifier of a parsed script must be a currency pair, except the
//! callee of an exchange call, which must be a plain exchange name. Pairs
//! are rewritten to their canonical `LEFT_RIGHT` form and exchange names
//! are lower-cased. Errors are collected across the whole script; any error
//! rejects the script as a whole.

use ratescript_common::{CurrencyPair, RuleError};

use crate::ast::{Expr, Statement, Syntax};

/// Normalize all statements, or return every error found.
pub fn normalize(statements: Vec<Statement<Syntax>>) -> Result<Vec<Statement<Expr>>, Vec<RuleError>> {
    let mut errors = Vec::new();
    let mut normalized = Vec::with_capacity(statements.len());
    // A failed statement does not stop the walk: every error is reported.
    for statement in statements {
        if let Some(statement) = normalize_statement(statement, &mut errors) {
            normalized.push(statement);
        }
    }

    if errors.is_empty() {
        Ok(normalized)
    } else {
        Err(errors)
    }
}

fn normalize_statement(statement: Statement<Syntax>, errors: &mut Vec<RuleError>) -> Option<Statement<Expr>> {
    match statement {
        Statement::Assign {
            target,
            op,
            value,
            offset,
        } => {
            let target = normalize_expr(target, false, errors);
            let value = normalize_expr(value, false, errors);
            Some(Statement::Assign {
                target: target?,
                op,
                value: value?,
                offset,
            })
        }
        Statement::Expression(expr) => normalize_expr(expr, false, errors).map(Statement::Expression),
    }
}

/// Normalize one expression. Returns `None` when an error was recorded for
/// it or one of its children; children are always visited so that every
/// error of the script is reported.
fn normalize_expr(syntax: Syntax, in_call: bool, errors: &mut Vec<RuleError>) -> Option<Expr> {
    match syntax {
        Syntax::Number(value) => Some(Expr::Number(value)),
        Syntax::Ident(name) => match CurrencyPair::parse(&name) {
            Ok(pair) => Some(Expr::Pair(pair)),
            Err(_) => {
                errors.push(RuleError::InvalidCurrencyIdentifier);
                None
            }
        },
        Syntax::Unary { op, operand } => normalize_expr(*operand, in_call, errors).map(|operand| Expr::Unary {
            op,
            operand: Box::new(operand),
        }),
        Syntax::Binary { op, left, right } => {
            let left = normalize_expr(*left, in_call, errors);
            let right = normalize_expr(*right, in_call, errors);
            Some(Expr::binary(op, left?, right?))
        }
        Syntax::Group(inner) => normalize_expr(*inner, in_call, errors).map(Expr::group),
        Syntax::Call { callee, args } => {
            if in_call {
                errors.push(RuleError::NestedInvocation);
                for arg in args {
                    normalize_expr(arg, true, errors);
                }
                return None;
            }
            normalize_call(*callee, args, errors)
        }
    }
}

fn normalize_call(callee: Syntax, args: Vec<Syntax>, errors: &mut Vec<RuleError>) -> Option<Expr> {
    let exchange = match callee {
        Syntax::Ident(name) if CurrencyPair::parse(&name).is_err() => Some(name.to_ascii_lowercase()),
        _ => {
            errors.push(RuleError::InvalidExchangeName);
            None
        }
    };

    let arg_count = args.len();
    let mut args: Vec<Option<Expr>> = args
        .into_iter()
        .map(|arg| normalize_expr(arg, true, errors))
        .collect();

    let pair = match args.pop() {
        Some(Some(Expr::Pair(pair))) if arg_count == 1 => Some(pair),
        Some(None) if arg_count == 1 => None,
        _ => {
            errors.push(RuleError::InvalidCurrencyIdentifier);
            None
        }
    };

    Some(Expr::Rate {
        exchange: exchange?,
        pair: pair?,
    })
}
