//! Interchange document model and streaming decoder

use std::collections::{BTreeMap, HashMap};
use std::io::Read;

use serde::Deserialize;

use crate::error::LsifError;

/// One grammar document of an interchange stream
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Format {
    #[serde(default)]
    pub axiom: Vec<FormatModule>,
    #[serde(default)]
    pub constants: Vec<char>,
    #[serde(default)]
    pub variables: HashMap<char, Variable>,
    #[serde(default)]
    pub rules: Vec<FormatRule>,
    /// RNG seed for stochastic grammars
    #[serde(default)]
    pub seed: u64,
}

/// Declaration of a rewritable letter
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Variable {
    /// Parameter declarations keyed by position
    #[serde(default)]
    pub parameters: BTreeMap<u8, VariableParameter>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VariableParameter {
    /// Name parameter expressions refer to this position by
    pub name: char,
}

/// A module as written in a document: parameter values are keyed by name and
/// carried as expression strings
#[derive(Debug, Clone, Deserialize)]
pub struct FormatModule {
    pub letter: char,
    #[serde(default)]
    pub parameters: HashMap<char, String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FormatRule {
    /// Letter this rule rewrites
    pub from: char,
    #[serde(default)]
    pub rewrite: Vec<FormatModule>,
    /// Optional left context, innermost letter last
    #[serde(default)]
    pub left: Vec<char>,
    /// Optional right context, innermost letter first
    #[serde(default)]
    pub right: Vec<char>,
    /// Relative weight among equal-priority matches
    #[serde(default = "default_probability")]
    pub probability: f64,
}

fn default_probability() -> f64 {
    1.0
}

/// Streaming decoder over a multi-document YAML source
pub struct Decoder<'de> {
    documents: serde_yaml::Deserializer<'de>,
}

impl<'de> Decoder<'de> {
    pub fn new(reader: impl Read + 'de) -> Self {
        Self {
            documents: serde_yaml::Deserializer::from_reader(reader),
        }
    }

    /// Decode the next document; `None` at end of stream
    #[allow(clippy::should_implement_trait)]
    pub fn decode(&mut self) -> Option<Result<Format, LsifError>> {
        let document = self.documents.next()?;
        Some(Format::deserialize(document).map_err(LsifError::from))
    }
}
