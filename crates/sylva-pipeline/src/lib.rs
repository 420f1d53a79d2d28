//! sylva-pipeline: Order-preserving derivation pool
//!
//! Feeds independent L-systems through parallel workers while preserving
//! submission order on the output:
//!
//! ```text
//! submit -> [sequencer] -> work queue -> [worker 0..W] -> per-worker queues
//!                                                              |
//!                                          [resolver] <--------+
//!                                              |
//!                                   results in submission order
//! ```
//!
//! All stages communicate over bounded crossbeam channels; the resolver
//! re-sequences with at most one buffered out-of-order result per worker.

mod config;
mod error;
mod pipeline;

pub use config::*;
pub use error::*;
pub use pipeline::*;
