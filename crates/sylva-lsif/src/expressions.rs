//! Parameter expression compilation
//!
//! A parameter value that parses as a pure scalar becomes a constant
//! function; anything else is compiled once at import time and evaluated
//! against the environment at rewrite time.

use std::sync::Arc;

use evalexpr::{build_operator_tree, ContextWithMutableVariables, HashMapContext, Node, Value};
use sylva_core::{EnvError, Environment, RuleError};

use crate::error::LsifError;

/// A compiled parameter expression
pub type ExpressionFn = Arc<dyn Fn(&dyn Environment) -> Result<f64, RuleError> + Send + Sync>;

pub fn compile(expression: &str) -> Result<ExpressionFn, LsifError> {
    if let Ok(scalar) = expression.trim().parse::<f64>() {
        return Ok(Arc::new(move |_| Ok(scalar)));
    }

    let node = build_operator_tree(expression).map_err(|source| LsifError::Expression {
        expression: expression.to_string(),
        source,
    })?;
    let expression = expression.to_string();
    Ok(Arc::new(move |env| evaluate(&node, &expression, env)))
}

/// Resolve the expression's identifiers through the environment, then
/// evaluate
fn evaluate(node: &Node, expression: &str, env: &dyn Environment) -> Result<f64, RuleError> {
    let mut context = HashMapContext::new();
    for name in node.iter_variable_identifiers() {
        let value = env.get(name)?;
        context
            .set_value(name.to_string(), Value::Float(value))
            .map_err(|err| EnvError::Parse(format!("{expression}: {err}")))?;
    }

    match node.eval_with_context(&context) {
        Ok(Value::Float(value)) => Ok(value),
        Ok(Value::Int(value)) => Ok(value as f64),
        Ok(other) => Err(EnvError::Parse(format!("{expression}: non-numeric result {other}")).into()),
        Err(err) => Err(EnvError::Parse(format!("{expression}: {err}")).into()),
    }
}
