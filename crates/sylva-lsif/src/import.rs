//! Import of decoded documents into engine parameters

use std::collections::HashMap;
use std::sync::Arc;

use sylva_core::{GeneralRule, Letter, Module, Parameters, RewriteFn, Rule};

use crate::error::LsifError;
use crate::expressions::{compile, ExpressionFn};
use crate::format::{Format, FormatModule};

/// Parameter name to position, per declared variable
type PositionMap = HashMap<char, HashMap<char, usize>>;

/// A rewrite module with its parameter expressions resolved to positions
struct RewriteTemplate {
    letter: Letter,
    parameters: Vec<(usize, ExpressionFn)>,
    parameter_count: usize,
}

impl Format {
    /// Build engine parameters from this document.
    ///
    /// Axiom parameters must be plain numbers; rule rewrite parameters are
    /// compiled expressions evaluated at rewrite time.
    pub fn import(&self) -> Result<Parameters, LsifError> {
        let positions = self.parameter_positions();

        let axiom = self
            .axiom
            .iter()
            .map(|module| import_axiom_module(module, &positions))
            .collect::<Result<Vec<_>, _>>()?;

        let mut rules = Vec::with_capacity(self.rules.len());
        for rule in &self.rules {
            let templates = rule
                .rewrite
                .iter()
                .map(|module| compile_template(module, &positions))
                .collect::<Result<Vec<_>, _>>()?;

            let size = templates.len();
            rules.push(Rule::General(GeneralRule::new(
                rule.from,
                rewrite_fn(templates),
                size,
                rule.left.clone(),
                rule.right.clone(),
                rule.probability,
            )));
        }

        Ok(Parameters {
            axiom,
            constants: self.constants.clone(),
            variables: self.variables.keys().copied().collect(),
            rules,
            seed: self.seed,
        })
    }

    fn parameter_positions(&self) -> PositionMap {
        self.variables
            .iter()
            .map(|(letter, variable)| {
                let by_name = variable
                    .parameters
                    .iter()
                    .map(|(&position, parameter)| (parameter.name, position as usize))
                    .collect();
                (*letter, by_name)
            })
            .collect()
    }
}

fn lookup_position(
    positions: &PositionMap,
    letter: char,
    name: char,
) -> Result<usize, LsifError> {
    positions
        .get(&letter)
        .and_then(|by_name| by_name.get(&name))
        .copied()
        .ok_or_else(|| {
            LsifError::Import(format!(
                "parameter `{name}` is not declared for variable `{letter}`"
            ))
        })
}

fn import_axiom_module(module: &FormatModule, positions: &PositionMap) -> Result<Module, LsifError> {
    let mut resolved = Vec::with_capacity(module.parameters.len());
    for (&name, value) in &module.parameters {
        let position = lookup_position(positions, module.letter, name)?;
        let value: f64 = value.trim().parse().map_err(|_| {
            LsifError::Import(format!(
                "axiom parameter `{name}` of `{}` is not a number: `{value}`",
                module.letter
            ))
        })?;
        resolved.push((position, value));
    }

    let count = resolved
        .iter()
        .map(|(position, _)| position + 1)
        .max()
        .unwrap_or(0);
    let mut parameters = vec![0.0; count];
    for (position, value) in resolved {
        parameters[position] = value;
    }
    Ok(Module::with_parameters(module.letter, parameters))
}

fn compile_template(
    module: &FormatModule,
    positions: &PositionMap,
) -> Result<RewriteTemplate, LsifError> {
    let mut parameters = Vec::with_capacity(module.parameters.len());
    for (&name, expression) in &module.parameters {
        let position = lookup_position(positions, module.letter, name)?;
        parameters.push((position, compile(expression)?));
    }

    let parameter_count = parameters
        .iter()
        .map(|(position, _)| position + 1)
        .max()
        .unwrap_or(0);
    Ok(RewriteTemplate {
        letter: module.letter,
        parameters,
        parameter_count,
    })
}

/// Instantiate every template in order, evaluating its parameter expressions
/// against the per-module environment
fn rewrite_fn(templates: Vec<RewriteTemplate>) -> RewriteFn {
    Arc::new(move |output, _, env| {
        let mut written = 0;
        for template in &templates {
            let mut parameters = vec![0.0; template.parameter_count];
            for (position, expression) in &template.parameters {
                parameters[*position] = expression(env)?;
            }
            output[written] = Module::with_parameters(template.letter, parameters);
            written += 1;
        }
        Ok(written)
    })
}

#[cfg(test)]
mod tests {
    use sylva_core::CancelToken;
    use sylva_engine::LSystem;

    use crate::format::Decoder;

    use super::*;

    fn decode(document: &str) -> Format {
        Decoder::new(document.as_bytes())
            .decode()
            .expect("a document")
            .expect("valid yaml")
    }

    #[test]
    fn test_import_maps_names_to_positions() {
        let format = decode(
            "\
axiom:
  - letter: V
    parameters: { w: \"2\", x: \"1\" }
variables:
  V:
    parameters:
      0: { name: x }
      1: { name: w }
",
        );
        let parameters = format.import().unwrap();
        assert_eq!(
            parameters.axiom,
            vec![Module::with_parameters('V', vec![1.0, 2.0])]
        );
        assert_eq!(parameters.variables, vec!['V']);
    }

    #[test]
    fn test_import_rejects_undeclared_parameter() {
        let format = decode(
            "\
axiom:
  - letter: V
    parameters: { y: \"1\" }
variables:
  V:
    parameters:
      0: { name: x }
",
        );
        assert!(matches!(format.import(), Err(LsifError::Import(_))));
    }

    #[test]
    fn test_import_rejects_non_numeric_axiom_parameter() {
        let format = decode(
            "\
axiom:
  - letter: V
    parameters: { x: \"prev_0 + 1\" }
variables:
  V:
    parameters:
      0: { name: x }
",
        );
        assert!(matches!(format.import(), Err(LsifError::Import(_))));
    }

    #[test]
    fn test_imported_grammar_derives() {
        // One doubling growth rule: V(x) -> V(2x).
        let format = decode(
            "\
axiom:
  - letter: V
    parameters: { x: \"1\" }
variables:
  V:
    parameters:
      0: { name: x }
rules:
  - from: V
    rewrite:
      - letter: V
        parameters: { x: \"prev_0 * 2\" }
",
        );
        let ls = LSystem::new(format.import().unwrap());
        ls.derivate_until(&CancelToken::new(), 2).unwrap();
        assert_eq!(ls.export(), vec![Module::with_parameters('V', vec![8.0])]);
    }

    #[test]
    fn test_imported_context_and_probability_reach_the_rule() {
        let format = decode(
            "\
rules:
  - from: V
    rewrite: [{ letter: X }]
    left: [A]
    probability: 0.5
",
        );
        let parameters = format.import().unwrap();
        let rule = &parameters.rules[0];
        assert_eq!(rule.priority(), 1);
        assert!((rule.probability() - 0.5).abs() < 1e-12);
        assert!(rule.matches(&Module::new('V'), &[Module::new('A')], &[]));
        assert!(!rule.matches(&Module::new('V'), &[Module::new('B')], &[]));
    }
}
