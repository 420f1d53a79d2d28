//! L-system derivation state

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use sylva_core::{CancelToken, Environment, Module, Parameters};

use crate::derivator::Derivation;
use crate::error::DeriveError;

/// Default lower bound on the number of modules a single partition covers
pub const DEFAULT_SUBSECTION_MINIMUM_SIZE: u32 = 64;

/// Parallel L-system derivation state.
///
/// The tier and generation counter live behind a mutex held across each
/// derivation, so concurrent derivations against the same system serialise.
/// The tunables are plain atomics and may be adjusted at any time.
pub struct LSystem {
    parameters: Parameters,
    env: Option<Arc<dyn Environment>>,
    state: Mutex<TierState>,
    subsection_minimum_size: AtomicU32,
    max_workers: AtomicU32,
}

struct TierState {
    tier: Vec<Module>,
    current_tier: u32,
}

impl LSystem {
    /// Create a fresh L-system with its tier initialised from the axiom
    pub fn new(parameters: Parameters) -> Self {
        let tier = parameters.axiom.clone();
        Self {
            parameters,
            env: None,
            state: Mutex::new(TierState {
                tier,
                current_tier: 0,
            }),
            subsection_minimum_size: AtomicU32::new(DEFAULT_SUBSECTION_MINIMUM_SIZE),
            max_workers: AtomicU32::new(rayon::current_num_threads() as u32),
        }
    }

    /// Attach an environment rewrite functions may look names up in
    pub fn with_environment(mut self, env: Arc<dyn Environment>) -> Self {
        self.env = Some(env);
        self
    }

    pub fn parameters(&self) -> &Parameters {
        &self.parameters
    }

    /// Run one generation
    pub fn derivate(&self, token: &CancelToken) -> Result<(), DeriveError> {
        let mut state = self.state.lock();

        let derivation = Derivation {
            parameters: &self.parameters,
            env: self.env.as_deref(),
            generation: state.current_tier,
            subsection_minimum_size: self.subsection_minimum_size.load(Ordering::Relaxed),
            max_workers: self.max_workers.load(Ordering::Relaxed),
        };
        let output = derivation.run(&state.tier, token)?;

        state.tier = output;
        state.current_tier += 1;
        Ok(())
    }

    /// Run generations while `current_tier <= max_tiers`.
    ///
    /// The bound is inclusive: a fresh system performs `max_tiers + 1`
    /// generations. On cancellation the tier is the last fully completed
    /// generation.
    pub fn derivate_until(&self, token: &CancelToken, max_tiers: u32) -> Result<(), DeriveError> {
        while self.current_tier() <= max_tiers {
            if token.is_cancelled() {
                return Err(DeriveError::Cancelled);
            }
            self.derivate(token)?;
        }
        Ok(())
    }

    /// Snapshot of the current tier
    pub fn export(&self) -> Vec<Module> {
        self.state.lock().tier.clone()
    }

    pub fn current_tier(&self) -> u32 {
        self.state.lock().current_tier
    }

    pub fn subsection_minimum_size(&self) -> u32 {
        self.subsection_minimum_size.load(Ordering::Relaxed)
    }

    pub fn set_subsection_minimum_size(&self, size: u32) {
        self.subsection_minimum_size.store(size, Ordering::Relaxed);
    }

    pub fn max_workers(&self) -> u32 {
        self.max_workers.load(Ordering::Relaxed)
    }

    pub fn set_max_workers(&self, workers: u32) {
        self.max_workers.store(workers, Ordering::Relaxed);
    }
}
