//! Derivation error type

use sylva_core::RuleError;
use thiserror::Error;

/// Derivation error
#[derive(Error, Debug)]
pub enum DeriveError {
    /// A rule wrote a different number of modules than it declared
    #[error("rule produced {written} modules where {declared} were declared")]
    RuleInconsistent { written: usize, declared: usize },

    #[error("derivation cancelled")]
    Cancelled,

    #[error(transparent)]
    Rule(#[from] RuleError),
}

/// Result type alias
pub type DeriveResult<T> = Result<T, DeriveError>;
