//! sylva-engine: Parallel L-system derivation
//!
//! Rewrites every module of a tier in parallel, one generation per call:
//! - Rule selection with context matching, priority resolution, and
//!   stochastic choice
//! - Three-phase derivation: per-partition sizing, serial output layout,
//!   parallel rewrite into one contiguous output tier
//! - Deterministic for a fixed seed: selection draws come from per-partition
//!   ChaCha sub-streams keyed by generation and partition index

mod derivator;
mod environment;
mod error;
mod lsystem;
mod selector;

pub use error::*;
pub use lsystem::*;
