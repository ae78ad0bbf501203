//! Syntax and expression trees for rate rule scripts.
//!
//! Parsing yields [`Syntax`] nodes, where every name is still a raw
//! identifier. Normalization turns them into [`Expr`] nodes, which keep
//! currency-pair references ([`Expr::Pair`]) and exchange lookups
//! ([`Expr::Rate`]) as distinct cases. Trees are never mutated in place;
//! every rewrite builds a new tree.

use ratescript_common::CurrencyPair;
use rust_decimal::Decimal;
use std::fmt;

/// Prefix of the callee of every error marker call.
pub const ERROR_PREFIX: &str = "ERR_";

/// Prefix operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Plus,
    Minus,
    /// `!`, parsed but not evaluable.
    Not,
    /// `~`, parsed but not evaluable.
    Complement,
}

impl UnaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            UnaryOp::Plus => "+",
            UnaryOp::Minus => "-",
            UnaryOp::Not => "!",
            UnaryOp::Complement => "~",
        }
    }
}

/// Infix operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    /// `%`, parsed but not evaluable.
    Rem,
}

impl BinaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
        }
    }
}

/// Assignment operators. Only [`AssignOp::Simple`] defines a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    Simple,
    Compound(BinaryOp),
}

/// A node of the raw parse tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Syntax {
    Number(Decimal),
    Ident(String),
    Unary {
        op: UnaryOp,
        operand: Box<Syntax>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Syntax>,
        right: Box<Syntax>,
    },
    Group(Box<Syntax>),
    Call {
        callee: Box<Syntax>,
        args: Vec<Syntax>,
    },
}

/// A top-level statement of a script.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement<E> {
    Assign {
        target: E,
        op: AssignOp,
        value: E,
        /// Byte offset of `value` in the script text.
        offset: usize,
    },
    Expression(E),
}

/// Error marker spliced into an expression in place of something that
/// could not be resolved. Evaluating a tree containing one always fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fault {
    NoRuleMatch(CurrencyPair),
    TooMuchNestedCalls(CurrencyPair),
    RateUnavailable {
        exchange: String,
        pair: CurrencyPair,
    },
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Fault::NoRuleMatch(pair) => write!(f, "{}NO_RULE_MATCH({})", ERROR_PREFIX, pair),
            Fault::TooMuchNestedCalls(pair) => {
                write!(f, "{}TOO_MUCH_NESTED_CALLS({})", ERROR_PREFIX, pair)
            }
            Fault::RateUnavailable { exchange, pair } => {
                write!(f, "{}RATE_UNAVAILABLE({}, {})", ERROR_PREFIX, exchange, pair)
            }
        }
    }
}

/// A normalized rate expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(Decimal),
    /// Reference to the value of another pair's rule.
    Pair(CurrencyPair),
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Group(Box<Expr>),
    /// Rate of `pair` quoted by `exchange`, e.g. `kraken(BTC_USD)`.
    Rate { exchange: String, pair: CurrencyPair },
    Fault(Fault),
}

impl Expr {
    pub fn binary(op: BinaryOp, left: Expr, right: Expr) -> Self {
        Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn group(inner: Expr) -> Self {
        Expr::Group(Box::new(inner))
    }

    /// Whether a binary operator appears anywhere in this tree.
    pub fn contains_binary(&self) -> bool {
        match self {
            Expr::Binary { .. } => true,
            Expr::Unary { operand, .. } => operand.contains_binary(),
            Expr::Group(inner) => inner.contains_binary(),
            Expr::Number(_) | Expr::Pair(_) | Expr::Rate { .. } | Expr::Fault(_) => false,
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Number(value) => write!(f, "{}", value),
            Expr::Pair(pair) => write!(f, "{}", pair),
            Expr::Unary { op, operand } => write!(f, "{}{}", op.symbol(), operand),
            Expr::Binary { op, left, right } => {
                write!(f, "{} {} {}", left, op.symbol(), right)
            }
            Expr::Group(inner) => write!(f, "({})", inner),
            Expr::Rate { exchange, pair } => write!(f, "{}({})", exchange, pair),
            Expr::Fault(fault) => write!(f, "{}", fault),
        }
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
    fn test_display_keeps_groups() {
        let expr = Expr::binary(
            BinaryOp::Mul,
            Expr::group(Expr::binary(
                BinaryOp::Add,
                Expr::Number(dec!(1)),
                Expr::Pair(pair("BTC_USD")),
            )),
            Expr::Rate {
                exchange: "kraken".to_string(),
                pair: pair("ETH_BTC"),
            },
        );
        assert_eq!(expr.to_string(), "(1 + BTC_USD) * kraken(ETH_BTC)");
    }

    #[test]
    fn test_fault_display() {
        let fault = Fault::RateUnavailable {
            exchange: "bitstamp".to_string(),
            pair: pair("BTC_EUR"),
        };
        assert_eq!(fault.to_string(), "ERR_RATE_UNAVAILABLE(bitstamp, BTC_EUR)");
        assert_eq!(
            Fault::NoRuleMatch(pair("A_B")).to_string(),
            "ERR_NO_RULE_MATCH(A_B)"
        );
    }

    #[test]
    fn test_contains_binary() {
        let neg = Expr::Unary {
            op: UnaryOp::Minus,
            operand: Box::new(Expr::group(Expr::binary(
                BinaryOp::Sub,
                Expr::Number(dec!(2)),
                Expr::Number(dec!(1)),
            ))),
        };
        assert!(neg.contains_binary());
        assert!(!Expr::Number(dec!(2)).contains_binary());
        assert!(!Expr::Rate {
            exchange: "kraken".to_string(),
            pair: pair("BTC_USD"),
        }
        .contains_binary());
    }
}
