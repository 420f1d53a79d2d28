//! Named-scalar environment lookup

use crate::error::EnvError;

/// Named-scalar lookup consumed by rule rewrite functions.
///
/// Implementations must be safe to query from concurrent rewrite workers.
pub trait Environment: Send + Sync {
    fn get(&self, name: &str) -> Result<f64, EnvError>;
}
