//! RateScript Common Types
//!
//! Shared types used across RateScript crates: currency codes, currency
//! pairs (including the `X` wildcard) and the rule error taxonomy.

pub mod pair;
pub mod error;

pub use pair::*;
pub use error::*;
