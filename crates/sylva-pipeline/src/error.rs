//! Pipeline error type

use sylva_engine::DeriveError;
use thiserror::Error;

/// Error emitted on the output channel in sequence position
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("derivation of sequence {seq} failed: {source}")]
    Derive {
        /// Zero-based submission index of the failed job
        seq: u64,
        source: DeriveError,
    },
}
