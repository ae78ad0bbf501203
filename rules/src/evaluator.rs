//! Rate substitution and arithmetic evaluation.
//!
//! Evaluation runs in two passes. Substitution replaces each exchange
//! lookup with the rate supplied by the caller, or with an error marker.
//! If that pass recorded no error, the numeric tree is compiled to
//! post-order [`Instruction`]s and run on a value stack.

use std::collections::BTreeSet;

use ratescript_common::RuleError;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::debug;

use crate::ast::{BinaryOp, Expr, Fault, UnaryOp, ERROR_PREFIX};
use crate::rates::RateLookup;

/// Outcome of evaluating a rule.
///
/// `value` is set exactly when `errors` is empty. `evaluated` is the
/// expression after rate substitution, kept for diagnostics either way.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Evaluation {
    pub value: Option<Decimal>,
    pub errors: BTreeSet<RuleError>,
    pub evaluated: String,
}

impl Evaluation {
    pub fn has_error(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn into_result(self) -> Result<Decimal, BTreeSet<RuleError>> {
        match self.value {
            Some(value) if self.errors.is_empty() => Ok(value),
            _ => Err(self.errors),
        }
    }
}

/// One step of the stack machine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Instruction {
    Push(Decimal),
    Unary(UnaryOp),
    Binary(BinaryOp),
}

/// Evaluate a flattened expression against `rates`.
///
/// `prior` holds errors already recorded while resolving the rule; they
/// are reported together with anything found here.
pub fn evaluate<L: RateLookup + ?Sized>(expr: &Expr, rates: &L, prior: &BTreeSet<RuleError>) -> Evaluation {
    let mut errors = prior.clone();
    let substituted = substitute(expr, rates, &mut errors);
    let evaluated = substituted.to_string();

    if !errors.is_empty() {
        return Evaluation {
            value: None,
            errors,
            evaluated,
        };
    }

    let result = compile(&substituted).and_then(|program| execute(&program));
    match result {
        Ok(value) => Evaluation {
            value: Some(value),
            errors,
            evaluated,
        },
        Err(errors) => Evaluation {
            value: None,
            errors,
            evaluated,
        },
    }
}

/// Replace every exchange lookup with its rate.
///
/// Lookups whose exchange starts with `ERR_` and error markers already in
/// the tree record [`RuleError::PreprocessError`]. Missing rates record
/// [`RuleError::RateUnavailable`] and become `ERR_RATE_UNAVAILABLE` markers.
pub fn substitute<L: RateLookup + ?Sized>(expr: &Expr, rates: &L, errors: &mut BTreeSet<RuleError>) -> Expr {
    match expr {
        Expr::Number(_) => expr.clone(),
        Expr::Rate { exchange, pair } => {
            if exchange.to_ascii_uppercase().starts_with(ERROR_PREFIX) {
                errors.insert(RuleError::PreprocessError);
                return expr.clone();
            }
            match rates.rate(exchange, pair) {
                Some(rate) => Expr::Number(rate),
                None => {
                    debug!(exchange = %exchange, pair = %pair, "Rate unavailable");
                    errors.insert(RuleError::RateUnavailable);
                    Expr::Fault(Fault::RateUnavailable {
                        exchange: exchange.clone(),
                        pair: pair.clone(),
                    })
                }
            }
        }
        // Only flattened trees reach here, so a bare pair is as broken as a marker.
        Expr::Fault(_) | Expr::Pair(_) => {
            errors.insert(RuleError::PreprocessError);
            expr.clone()
        }
        Expr::Unary { op, operand } => Expr::Unary {
            op: *op,
            operand: Box::new(substitute(operand, rates, errors)),
        },
        Expr::Binary { op, left, right } => Expr::binary(
            *op,
            substitute(left, rates, errors),
            substitute(right, rates, errors),
        ),
        Expr::Group(inner) => Expr::group(substitute(inner, rates, errors)),
    }
}

/// Compile a fully numeric expression to post-order instructions.
pub fn compile(expr: &Expr) -> Result<Vec<Instruction>, BTreeSet<RuleError>> {
    let mut program = Vec::new();
    emit(expr, &mut program).map_err(|e| BTreeSet::from([e]))?;
    Ok(program)
}

fn emit(expr: &Expr, program: &mut Vec<Instruction>) -> Result<(), RuleError> {
    match expr {
        Expr::Number(value) => program.push(Instruction::Push(*value)),
        Expr::Unary { op, operand } => {
            emit(operand, program)?;
            program.push(Instruction::Unary(*op));
        }
        Expr::Binary { op, left, right } => {
            emit(left, program)?;
            emit(right, program)?;
            program.push(Instruction::Binary(*op));
        }
        Expr::Group(inner) => emit(inner, program)?,
        Expr::Pair(_) | Expr::Rate { .. } | Expr::Fault(_) => return Err(RuleError::PreprocessError),
    }
    Ok(())
}

/// Run a post-order program and return the single value it leaves.
///
/// An instruction that fails records its error and pushes nothing, so
/// later operators may in turn report [`RuleError::MissingArgument`].
pub fn execute(program: &[Instruction]) -> Result<Decimal, BTreeSet<RuleError>> {
    let mut stack: Vec<Decimal> = Vec::new();
    let mut errors = BTreeSet::new();

    for instruction in program {
        match *instruction {
            Instruction::Push(value) => stack.push(value),
            Instruction::Unary(op) => {
                if !matches!(op, UnaryOp::Plus | UnaryOp::Minus) {
                    errors.insert(RuleError::UnsupportedOperator);
                    continue;
                }
                let Some(value) = stack.pop() else {
                    errors.insert(RuleError::MissingArgument);
                    continue;
                };
                stack.push(if op == UnaryOp::Minus { -value } else { value });
            }
            Instruction::Binary(op) => {
                let (Some(b), Some(a)) = (stack.pop(), stack.pop()) else {
                    errors.insert(RuleError::MissingArgument);
                    continue;
                };
                let result = match op {
                    BinaryOp::Add => a.checked_add(b),
                    BinaryOp::Sub => a.checked_sub(b),
                    BinaryOp::Mul => a.checked_mul(b),
                    BinaryOp::Div if b.is_zero() => {
                        errors.insert(RuleError::DivideByZero);
                        continue;
                    }
                    BinaryOp::Div => a.checked_div(b),
                    BinaryOp::Rem => {
                        errors.insert(RuleError::UnsupportedOperator);
                        continue;
                    }
                };
                match result {
                    Some(value) => stack.push(value),
                    None => {
                        errors.insert(RuleError::ArithmeticOverflow);
                    }
                }
            }
        }
    }

    if !errors.is_empty() {
        return Err(errors);
    }
    match stack.as_slice() {
        [value] => Ok(*value),
        _ => Err(BTreeSet::from([RuleError::MissingArgument])),
    }
}
