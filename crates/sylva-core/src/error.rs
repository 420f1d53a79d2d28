//! Error types for Sylva

use thiserror::Error;

/// Environment lookup error
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EnvError {
    #[error("undefined variable `{0}`")]
    UndefinedVariable(String),

    #[error("parameter {index} out of range for a module with {len} parameters")]
    OutOfRange { index: usize, len: usize },

    #[error("parse error: {0}")]
    Parse(String),
}

/// Rule execution error
#[derive(Error, Debug)]
pub enum RuleError {
    #[error(transparent)]
    Env(#[from] EnvError),

    #[error("rewrite failed: {0}")]
    Rewrite(String),
}

/// Result type alias for rule execution
pub type RuleResult<T> = Result<T, RuleError>;
