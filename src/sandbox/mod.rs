//! Restricted expression evaluator used by `apply_script`.
//!
//! A script is one Python-like expression over a single bound variable (`x` by default):
//!
//! ```text
//! x.split('@')[0]
//! round(x * 1.1, 2)
//! math.sqrt(abs(x)) + 1
//! ```
//!
//! Compilation parses the text with pest and binds every name against a [`Capabilities`]
//! allow-list. Anything outside the allow-list fails with
//! [`EvaluationError::DisallowedName`] before a single cell is touched. Evaluation runs over a
//! closed IR with no access to ambient state.

mod ast;
mod builtins;
mod interpreter;
mod parser;
mod value;

pub use builtins::{Builtin, Capabilities, Method, DEFAULT_VARIABLE, MATH_NAMESPACE};
pub use value::ScriptValue;

use crate::error::EvaluationError;
use crate::types::{Cell, Value};

use interpreter::Ir;

/// A compiled script, ready to run against any number of cells.
#[derive(Debug, Clone)]
pub struct Script {
    source: String,
    ir: Ir,
}

impl Script {
    /// Compile against the standard vocabulary.
    pub fn compile(source: &str) -> Result<Self, EvaluationError> {
        Self::compile_with(source, &Capabilities::standard())
    }

    /// Compile against an explicit allow-list.
    pub fn compile_with(source: &str, caps: &Capabilities) -> Result<Self, EvaluationError> {
        let expr = parser::parse(source)?;
        let ir = interpreter::bind(&expr, caps)?;
        Ok(Self {
            source: source.to_string(),
            ir,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Evaluate with `input` bound to the script variable.
    pub fn eval(&self, input: &ScriptValue) -> Result<ScriptValue, EvaluationError> {
        interpreter::eval(&self.ir, input)
    }

    /// Evaluate against one table cell and convert the result back into a cell.
    pub fn eval_cell(&self, value: &Value) -> Result<Cell, EvaluationError> {
        self.eval(&ScriptValue::from_cell(value))?.into_cell()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compile_once_run_many() {
        let script = Script::compile("x * 2").unwrap();
        assert_eq!(script.source(), "x * 2");
        assert_eq!(
            script.eval_cell(&Value::Int64(21)).unwrap(),
            Some(Value::Int64(42))
        );
        assert_eq!(
            script.eval_cell(&Value::Utf8("ab".into())).unwrap(),
            Some(Value::Utf8("abab".into()))
        );
    }

    #[test]
    fn disallowed_name_fails_compile() {
        let err = Script::compile("eval(x)").unwrap_err();
        assert_eq!(
            err,
            EvaluationError::DisallowedName {
                name: "eval".to_string()
            }
        );
    }

    #[test]
    fn denied_builtin_is_disallowed() {
        let caps = Capabilities::standard().deny("len");
        assert!(matches!(
            Script::compile_with("len(x)", &caps),
            Err(EvaluationError::DisallowedName { .. })
        ));
    }

    #[test]
    fn list_results_are_rejected_per_cell() {
        let script = Script::compile("x.split(',')").unwrap();
        assert!(script.eval_cell(&Value::Utf8("a,b".into())).is_err());
    }
}
