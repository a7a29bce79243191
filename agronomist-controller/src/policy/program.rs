//! Wraps a compiled Rego program behind the two operations a worker needs:
//! compile once, evaluate repeatedly against a fresh input document.
//!
//! Upstream this was a `*rego.PreparedEvalQuery` built from
//! `ast.CompileModules` plus a `parseunit` builtin registered globally
//! before any policy compiled. `regorus::Engine` folds both steps into one
//! object: the extension is attached per engine, so it is registered once
//! here, in `compile`, rather than once per process.

use regorus::Engine;

use agronomist_core::error::{Error, Result};

use crate::units::parseunit;

/// A compiled policy program. Cloning is cheap (`regorus::Engine` is
/// internally `Rc`-shared) and used when a worker needs to re-evaluate
/// against a new input without recompiling.
#[derive(Clone)]
pub struct PolicyProgram {
    engine: Engine,
}

impl PolicyProgram {
    /// Compiles `source` as a Rego module and registers the `parseunit`
    /// extension against it.
    pub fn compile(source: &str) -> Result<Self> {
        let mut engine = Engine::new();
        engine
            .add_policy("main.rego".to_string(), source.to_string())
            .map_err(|err| Error::PolicyCompile(err.to_string()))?;

        engine
            .add_extension("parseunit".to_string(), 1, Box::new(parseunit_extension))
            .map_err(|err| Error::PolicyCompile(err.to_string()))?;

        Ok(Self { engine })
    }

    /// Evaluates `data.main.scale` against `input`, returning the numeric
    /// result. Any non-numeric, empty, or multi-value result is a fatal
    /// evaluation error for the calling tick.
    pub fn evaluate(&self, input: serde_json::Value) -> Result<i64> {
        let mut engine = self.engine.clone();
        let input = regorus::Value::from_json_str(&input.to_string())
            .map_err(|err| Error::PolicyEval(err.to_string()))?;
        engine.set_input(input);

        let result = engine
            .eval_query("data.main.scale".to_string(), false)
            .map_err(|err| Error::PolicyEval(err.to_string()))?;

        let expr = result
            .result
            .first()
            .and_then(|r| r.expressions.first())
            .ok_or_else(|| Error::PolicyEval("policy produced no result".to_string()))?;

        let json: serde_json::Value = serde_json::from_str(&expr.value.to_json_str().map_err(
            |err| Error::PolicyEval(err.to_string()),
        )?)
        .map_err(|err| Error::PolicyEval(err.to_string()))?;

        json.as_i64()
            .or_else(|| json.as_f64().map(|f| f as i64))
            .ok_or_else(|| Error::PolicyEval("policy result was not numeric".to_string()))
    }
}

fn parseunit_extension(params: Vec<regorus::Value>) -> anyhow::Result<regorus::Value> {
    let raw = match params.first() {
        Some(regorus::Value::String(s)) => s.to_string(),
        _ => return Ok(regorus::Value::Undefined),
    };

    match parseunit(&raw) {
        Some(milli) => Ok(regorus::Value::from(milli)),
        None => Ok(regorus::Value::Undefined),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn evaluates_a_constant_program() {
        let program = PolicyProgram::compile(
            r#"
            package main
            scale := 3
            "#,
        )
        .expect("compiles");

        let scale = program.evaluate(json!({})).expect("evaluates");
        assert_eq!(scale, 3);
    }

    #[test]
    fn parseunit_is_available_to_policy_source() {
        let program = PolicyProgram::compile(
            r#"
            package main
            scale := parseunit("2Gi") / 1000000000000
            "#,
        )
        .expect("compiles");

        let scale = program.evaluate(json!({})).expect("evaluates");
        assert_eq!(scale, 2);
    }
}
