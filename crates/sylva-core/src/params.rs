//! Grammar specification

use crate::module::{Letter, Module};
use crate::rule::Rule;

/// The immutable grammar specification an L-system is constructed from.
///
/// `constants` and `variables` are metadata established at construction time;
/// derivation itself only consults `axiom`, `rules`, and `seed`.
#[derive(Debug, Clone, Default)]
pub struct Parameters {
    /// Initial tier
    pub axiom: Vec<Module>,
    /// Letters not eligible for rewriting
    pub constants: Vec<Letter>,
    /// Letters eligible for rewriting
    pub variables: Vec<Letter>,
    pub rules: Vec<Rule>,
    /// RNG seed for stochastic selection
    pub seed: u64,
}
