//! Module and tier primitives

use std::fmt;
use std::fmt::Write as _;

/// A single-code-point symbol identifier
pub type Letter = char;

/// The atomic unit of a tier: a letter plus an ordered parameter vector.
///
/// Parameters are positional; what each position means for a given letter is
/// metadata carried by the grammar specification, not by the module itself.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Module {
    pub letter: Letter,
    pub parameters: Vec<f64>,
}

impl Module {
    /// A parameterless module
    pub fn new(letter: Letter) -> Self {
        Self {
            letter,
            parameters: Vec::new(),
        }
    }

    pub fn with_parameters(letter: Letter, parameters: Vec<f64>) -> Self {
        Self { letter, parameters }
    }
}

impl fmt::Display for Module {
    /// Renders as `<letter>` or `<letter>(<p0>, <p1>, ...)` with minimal
    /// round-trip float formatting.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.letter)?;
        if self.parameters.is_empty() {
            return Ok(());
        }

        write!(f, "(")?;
        for (i, parameter) in self.parameters.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{parameter}")?;
        }
        write!(f, ")")
    }
}

/// Render a tier as the concatenation of its modules, with no separator
pub fn render_tier(tier: &[Module]) -> String {
    let mut out = String::with_capacity(tier.len() * 4);
    for module in tier {
        let _ = write!(out, "{module}");
    }
    out
}
