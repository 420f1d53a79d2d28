//! Per-module environment overlay
//!
//! Rewrite functions look the predecessor's parameters up as `prev_<n>`;
//! every other name delegates to the caller-supplied environment.

use sylva_core::{EnvError, Environment};

const PREV_PREFIX: &str = "prev_";

/// Environment wrapper serving `prev_<n>` from the module being rewritten
pub(crate) struct PrevEnvironment<'a> {
    inner: Option<&'a dyn Environment>,
    prev: &'a [f64],
}

impl<'a> PrevEnvironment<'a> {
    pub(crate) fn new(inner: Option<&'a dyn Environment>, prev: &'a [f64]) -> Self {
        Self { inner, prev }
    }
}

impl Environment for PrevEnvironment<'_> {
    fn get(&self, name: &str) -> Result<f64, EnvError> {
        if let Some(suffix) = name.strip_prefix(PREV_PREFIX) {
            let index: usize = suffix
                .parse()
                .map_err(|_| EnvError::Parse(name.to_string()))?;
            return self
                .prev
                .get(index)
                .copied()
                .ok_or(EnvError::OutOfRange {
                    index,
                    len: self.prev.len(),
                });
        }

        match self.inner {
            Some(inner) => inner.get(name),
            None => Err(EnvError::UndefinedVariable(name.to_string())),
        }
    }
}
