//! Rule abstractions
//!
//! A rule is a tagged capability record: the common general-rule case is a
//! concrete variant the selector can fast-path, with a trait-object escape
//! hatch for user-supplied rules.

use std::fmt;
use std::sync::Arc;

use crate::env::Environment;
use crate::error::RuleError;
use crate::module::{Letter, Module};

/// Rewrite function for a general rule.
///
/// Writes modules into the caller-provided output region and returns how
/// many it wrote; the count must equal the rule's declared output size.
pub type RewriteFn =
    Arc<dyn Fn(&mut [Module], &Module, &dyn Environment) -> Result<usize, RuleError> + Send + Sync>;

/// Capability set for user-supplied rules.
///
/// All methods may be invoked concurrently on distinct modules.
pub trait CustomRule: Send + Sync {
    /// Higher wins among matching rules
    fn priority(&self) -> i32;

    /// Pure predicate on the module and its neighbourhood
    fn matches(&self, predecessor: &Module, left: &[Module], right: &[Module]) -> bool;

    /// Relative weight among equal-priority matches
    fn probability(&self) -> f64;

    /// Exact number of modules produced on execution; must be stable
    fn output_size(&self) -> usize;

    /// Write modules into `output` and return how many were written
    fn execute(
        &self,
        output: &mut [Module],
        predecessor: &Module,
        env: &dyn Environment,
    ) -> Result<usize, RuleError>;
}

/// A production rule
#[derive(Clone)]
pub enum Rule {
    /// Classic, stochastic, and context-sensitive rules
    General(GeneralRule),
    /// User-supplied rule
    Custom(Arc<dyn CustomRule>),
}

impl Rule {
    pub fn priority(&self) -> i32 {
        match self {
            Rule::General(rule) => rule.priority(),
            Rule::Custom(rule) => rule.priority(),
        }
    }

    pub fn matches(&self, predecessor: &Module, left: &[Module], right: &[Module]) -> bool {
        match self {
            Rule::General(rule) => rule.matches(predecessor, left, right),
            Rule::Custom(rule) => rule.matches(predecessor, left, right),
        }
    }

    pub fn probability(&self) -> f64 {
        match self {
            Rule::General(rule) => rule.probability(),
            Rule::Custom(rule) => rule.probability(),
        }
    }

    pub fn output_size(&self) -> usize {
        match self {
            Rule::General(rule) => rule.output_size(),
            Rule::Custom(rule) => rule.output_size(),
        }
    }

    pub fn execute(
        &self,
        output: &mut [Module],
        predecessor: &Module,
        env: &dyn Environment,
    ) -> Result<usize, RuleError> {
        match self {
            Rule::General(rule) => rule.execute(output, predecessor, env),
            Rule::Custom(rule) => rule.execute(output, predecessor, env),
        }
    }
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rule::General(rule) => f
                .debug_struct("General")
                .field("on", &rule.on)
                .field("with_left", &rule.with_left)
                .field("with_right", &rule.with_right)
                .field("size", &rule.size)
                .finish_non_exhaustive(),
            Rule::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

impl From<GeneralRule> for Rule {
    fn from(rule: GeneralRule) -> Self {
        Rule::General(rule)
    }
}

/// The canonical rule implementation.
///
/// Context-sensitive rules report priority 1 so they take precedence over
/// context-free rules matching the same letter.
#[derive(Clone)]
pub struct GeneralRule {
    on: Letter,
    with_left: Vec<Letter>,
    with_right: Vec<Letter>,
    size: usize,
    rewrite: RewriteFn,
    /// Stored as the complement so a default of zero means probability 1
    one_minus_probability: f64,
}

impl GeneralRule {
    pub fn new(
        on: Letter,
        rewrite: RewriteFn,
        size: usize,
        with_left: Vec<Letter>,
        with_right: Vec<Letter>,
        probability: f64,
    ) -> Self {
        Self {
            on,
            with_left,
            with_right,
            size,
            rewrite,
            one_minus_probability: 1.0 - probability,
        }
    }

    /// Deterministic context-free rule rewriting `on` to a fixed template
    pub fn classic(on: Letter, rewrite: Vec<Module>) -> Self {
        Self::non_parametric(on, rewrite, Vec::new(), Vec::new(), 1.0)
    }

    /// Context-free rule with a relative selection weight
    pub fn stochastic(on: Letter, rewrite: Vec<Module>, probability: f64) -> Self {
        Self::non_parametric(on, rewrite, Vec::new(), Vec::new(), probability)
    }

    /// Rule matching only inside the given neighbourhood
    pub fn context_sensitive(
        on: Letter,
        rewrite: Vec<Module>,
        with_left: Vec<Letter>,
        with_right: Vec<Letter>,
    ) -> Self {
        Self::non_parametric(on, rewrite, with_left, with_right, 1.0)
    }

    /// Rule whose rewrite copies a fixed module template
    pub fn non_parametric(
        on: Letter,
        rewrite: Vec<Module>,
        with_left: Vec<Letter>,
        with_right: Vec<Letter>,
        probability: f64,
    ) -> Self {
        let size = rewrite.len();
        let action: RewriteFn = Arc::new(move |output, _, _| {
            let n = rewrite.len().min(output.len());
            output[..n].clone_from_slice(&rewrite[..n]);
            Ok(n)
        });
        Self::new(on, action, size, with_left, with_right, probability)
    }

    pub fn is_context_sensitive(&self) -> bool {
        !self.with_left.is_empty() || !self.with_right.is_empty()
    }

    pub fn priority(&self) -> i32 {
        if self.is_context_sensitive() {
            1
        } else {
            0
        }
    }

    pub fn matches(&self, predecessor: &Module, left: &[Module], right: &[Module]) -> bool {
        if predecessor.letter != self.on {
            return false;
        }
        if !self.is_context_sensitive() {
            return true;
        }

        // The surrounding neighbourhood must be at least as long as the
        // required context.
        if left.len() < self.with_left.len() || right.len() < self.with_right.len() {
            return false;
        }

        // Left context is suffix-aligned, right context is prefix-aligned.
        let left_tail = &left[left.len() - self.with_left.len()..];
        if left_tail
            .iter()
            .zip(&self.with_left)
            .any(|(module, &letter)| module.letter != letter)
        {
            return false;
        }
        !right
            .iter()
            .zip(&self.with_right)
            .any(|(module, &letter)| module.letter != letter)
    }

    pub fn probability(&self) -> f64 {
        1.0 - self.one_minus_probability
    }

    pub fn output_size(&self) -> usize {
        self.size
    }

    pub fn execute(
        &self,
        output: &mut [Module],
        predecessor: &Module,
        env: &dyn Environment,
    ) -> Result<usize, RuleError> {
        (self.rewrite)(output, predecessor, env)
    }
}
