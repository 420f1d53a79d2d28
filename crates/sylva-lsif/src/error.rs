//! Interchange format error type

use thiserror::Error;

/// Decoding or import failure
#[derive(Error, Debug)]
pub enum LsifError {
    #[error("decode error: {0}")]
    Decode(#[from] serde_yaml::Error),

    #[error("import error: {0}")]
    Import(String),

    #[error("expression `{expression}` is invalid: {source}")]
    Expression {
        expression: String,
        source: evalexpr::EvalexprError,
    },
}

/// Result type alias
pub type LsifResult<T> = Result<T, LsifError>;
