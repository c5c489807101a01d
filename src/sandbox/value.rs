use std::cmp::Ordering;
use std::fmt;

use crate::error::EvaluationError;
use crate::types::{Cell, Value};

/// A value inside a running script.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptValue {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<ScriptValue>),
}

impl ScriptValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            ScriptValue::None => "NoneType",
            ScriptValue::Bool(_) => "bool",
            ScriptValue::Int(_) => "int",
            ScriptValue::Float(_) => "float",
            ScriptValue::Str(_) => "str",
            ScriptValue::List(_) => "list",
        }
    }

    pub fn truthy(&self) -> bool {
        match self {
            ScriptValue::None => false,
            ScriptValue::Bool(b) => *b,
            ScriptValue::Int(i) => *i != 0,
            ScriptValue::Float(f) => *f != 0.0,
            ScriptValue::Str(s) => !s.is_empty(),
            ScriptValue::List(items) => !items.is_empty(),
        }
    }

    /// Bind a table cell: datetimes become their canonical text, durations total seconds.
    pub fn from_cell(value: &Value) -> Self {
        match value {
            Value::Int64(i) => ScriptValue::Int(*i),
            Value::Float64(f) => ScriptValue::Float(*f),
            Value::Bool(b) => ScriptValue::Bool(*b),
            Value::Utf8(s) => ScriptValue::Str(s.clone()),
            Value::DateTime(_) => ScriptValue::Str(value.to_string()),
            Value::Duration(d) => {
                let secs = d.num_seconds() as f64 + f64::from(d.subsec_nanos()) / 1e9;
                ScriptValue::Float(secs)
            }
        }
    }

    /// Convert a script result back into a cell; `None` is a missing cell.
    pub fn into_cell(self) -> Result<Cell, EvaluationError> {
        Ok(match self {
            ScriptValue::None => None,
            ScriptValue::Bool(b) => Some(Value::Bool(b)),
            ScriptValue::Int(i) => Some(Value::Int64(i)),
            ScriptValue::Float(f) => Some(Value::Float64(f)),
            ScriptValue::Str(s) => Some(Value::Utf8(s)),
            ScriptValue::List(_) => {
                return Err(EvaluationError::runtime(
                    "script produced a list; cells must be scalar",
                ));
            }
        })
    }

    /// Numeric view; booleans count as 0/1.
    pub(crate) fn as_number(&self) -> Option<Number> {
        match self {
            ScriptValue::Bool(b) => Some(Number::Int(i64::from(*b))),
            ScriptValue::Int(i) => Some(Number::Int(*i)),
            ScriptValue::Float(f) => Some(Number::Float(*f)),
            _ => None,
        }
    }

    /// `==` semantics: numbers compare by value across int/float/bool, other kinds must match.
    pub(crate) fn loose_eq(&self, other: &ScriptValue) -> bool {
        if let (Some(a), Some(b)) = (self.as_number(), other.as_number()) {
            return a.value_eq(b);
        }
        match (self, other) {
            (ScriptValue::None, ScriptValue::None) => true,
            (ScriptValue::Str(a), ScriptValue::Str(b)) => a == b,
            (ScriptValue::List(a), ScriptValue::List(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.loose_eq(y))
            }
            _ => false,
        }
    }

    /// Ordering for `<`-style comparisons and `min`/`max`.
    ///
    /// `Ok(None)` means the values are unordered (a NaN is involved); mismatched kinds are an
    /// error naming `op`.
    pub(crate) fn try_order(
        &self,
        other: &ScriptValue,
        op: &str,
    ) -> Result<Option<Ordering>, EvaluationError> {
        if let (Some(a), Some(b)) = (self.as_number(), other.as_number()) {
            return Ok(a.partial_cmp_value(b));
        }
        match (self, other) {
            (ScriptValue::Str(a), ScriptValue::Str(b)) => Ok(Some(a.cmp(b))),
            (ScriptValue::List(a), ScriptValue::List(b)) => {
                for (x, y) in a.iter().zip(b) {
                    match x.try_order(y, op)? {
                        Some(Ordering::Equal) => continue,
                        other => return Ok(other),
                    }
                }
                Ok(Some(a.len().cmp(&b.len())))
            }
            _ => Err(EvaluationError::runtime(format!(
                "'{op}' not supported between instances of '{}' and '{}'",
                self.type_name(),
                other.type_name()
            ))),
        }
    }

    fn write_repr(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScriptValue::Str(s) => write!(f, "'{}'", s.replace('\\', "\\\\").replace('\'', "\\'")),
            other => write!(f, "{other}"),
        }
    }
}

/// Renders the way `str()` does.
impl fmt::Display for ScriptValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScriptValue::None => f.write_str("None"),
            ScriptValue::Bool(true) => f.write_str("True"),
            ScriptValue::Bool(false) => f.write_str("False"),
            ScriptValue::Int(i) => write!(f, "{i}"),
            ScriptValue::Float(v) => format_float(*v, f),
            ScriptValue::Str(s) => f.write_str(s),
            ScriptValue::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    item.write_repr(f)?;
                }
                f.write_str("]")
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    pub fn as_f64(self) -> f64 {
        match self {
            Number::Int(i) => i as f64,
            Number::Float(f) => f,
        }
    }

    fn value_eq(self, other: Number) -> bool {
        match (self, other) {
            (Number::Int(a), Number::Int(b)) => a == b,
            (a, b) => a.as_f64() == b.as_f64(),
        }
    }

    fn partial_cmp_value(self, other: Number) -> Option<Ordering> {
        match (self, other) {
            (Number::Int(a), Number::Int(b)) => Some(a.cmp(&b)),
            (a, b) => a.as_f64().partial_cmp(&b.as_f64()),
        }
    }
}

impl From<Number> for ScriptValue {
    fn from(n: Number) -> Self {
        match n {
            Number::Int(i) => ScriptValue::Int(i),
            Number::Float(f) => ScriptValue::Float(f),
        }
    }
}

fn format_float(v: f64, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if v.is_nan() {
        f.write_str("nan")
    } else if v.is_infinite() {
        f.write_str(if v > 0.0 { "inf" } else { "-inf" })
    } else if v.fract() == 0.0 && v.abs() < 1e16 {
        write!(f, "{v:.1}")
    } else {
        write!(f, "{v}")
    }
}
