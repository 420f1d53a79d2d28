//! sylva-lsif: The L-System Interchange Format
//!
//! Decodes a multi-document YAML stream of grammar descriptions and imports
//! each document into engine [`Parameters`](sylva_core::Parameters):
//! parameter names become positions, and rewrite parameter expressions are
//! compiled once at import time.

mod error;
mod expressions;
mod format;
mod import;

pub use error::*;
pub use expressions::*;
pub use format::*;
