//! The allow-listed vocabulary: functions, `math.*` members and string methods.

use std::collections::HashMap;
use std::f64::consts;

use super::value::{Number, ScriptValue};
use crate::error::EvaluationError;

/// Namespace under which the math library is exposed (`math.sqrt(x)`).
pub const MATH_NAMESPACE: &str = "math";

/// Name of the bound cell variable unless overridden.
pub const DEFAULT_VARIABLE: &str = "x";

/// A callable function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Builtin {
    Abs,
    Round,
    Min,
    Max,
    Str,
    Int,
    Float,
    Len,
    Pow,
    Sqrt,
    Floor,
    Ceil,
    Log,
    Log10,
    Exp,
    Sin,
    Cos,
    Tan,
    Fabs,
    Trunc,
}

/// A string method (`x.split('@')`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Split,
    Strip,
    Lower,
    Upper,
}

/// The names a script may resolve.
///
/// Scripts are bound against a `Capabilities` once, before any cell is evaluated; a name it does
/// not list is rejected at that point with [`EvaluationError::DisallowedName`].
#[derive(Debug, Clone)]
pub struct Capabilities {
    variable: String,
    functions: HashMap<String, Builtin>,
    math_functions: HashMap<String, Builtin>,
    math_constants: HashMap<String, f64>,
    methods: HashMap<String, Method>,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self::standard()
    }
}

impl Capabilities {
    /// The full vocabulary, bound variable `x`.
    pub fn standard() -> Self {
        let functions = [
            ("abs", Builtin::Abs),
            ("round", Builtin::Round),
            ("min", Builtin::Min),
            ("max", Builtin::Max),
            ("str", Builtin::Str),
            ("int", Builtin::Int),
            ("float", Builtin::Float),
            ("len", Builtin::Len),
            ("pow", Builtin::Pow),
        ];
        let math_functions = [
            ("sqrt", Builtin::Sqrt),
            ("floor", Builtin::Floor),
            ("ceil", Builtin::Ceil),
            ("log", Builtin::Log),
            ("log10", Builtin::Log10),
            ("exp", Builtin::Exp),
            ("sin", Builtin::Sin),
            ("cos", Builtin::Cos),
            ("tan", Builtin::Tan),
            ("fabs", Builtin::Fabs),
            ("trunc", Builtin::Trunc),
            ("pow", Builtin::Pow),
        ];
        let methods = [
            ("split", Method::Split),
            ("strip", Method::Strip),
            ("lower", Method::Lower),
            ("upper", Method::Upper),
        ];

        Self {
            variable: DEFAULT_VARIABLE.to_string(),
            functions: to_map(&functions),
            math_functions: to_map(&math_functions),
            math_constants: to_map(&[("pi", consts::PI), ("e", consts::E)]),
            methods: to_map(&methods),
        }
    }

    /// Nothing allowed except the bound variable.
    pub fn empty() -> Self {
        Self {
            variable: DEFAULT_VARIABLE.to_string(),
            functions: HashMap::new(),
            math_functions: HashMap::new(),
            math_constants: HashMap::new(),
            methods: HashMap::new(),
        }
    }

    /// Rename the bound variable.
    pub fn with_variable(mut self, name: impl Into<String>) -> Self {
        self.variable = name.into();
        self
    }

    /// Expose `builtin` as a top-level function called `name`.
    pub fn allow_function(mut self, name: impl Into<String>, builtin: Builtin) -> Self {
        self.functions.insert(name.into(), builtin);
        self
    }

    /// Expose a string method.
    pub fn allow_method(mut self, name: impl Into<String>, method: Method) -> Self {
        self.methods.insert(name.into(), method);
        self
    }

    /// Remove `name` everywhere it appears (functions, methods, `math.*`).
    pub fn deny(mut self, name: &str) -> Self {
        self.functions.remove(name);
        self.methods.remove(name);
        self.math_functions.remove(name);
        self.math_constants.remove(name);
        self
    }

    pub fn variable(&self) -> &str {
        &self.variable
    }

    pub(crate) fn function(&self, name: &str) -> Option<Builtin> {
        self.functions.get(name).copied()
    }

    pub(crate) fn math_function(&self, name: &str) -> Option<Builtin> {
        self.math_functions.get(name).copied()
    }

    pub(crate) fn math_constant(&self, name: &str) -> Option<f64> {
        self.math_constants.get(name).copied()
    }

    pub(crate) fn method(&self, name: &str) -> Option<Method> {
        self.methods.get(name).copied()
    }

    pub(crate) fn has_math(&self) -> bool {
        !self.math_functions.is_empty() || !self.math_constants.is_empty()
    }
}

fn to_map<V: Copy>(entries: &[(&str, V)]) -> HashMap<String, V> {
    entries.iter().map(|(k, v)| (k.to_string(), *v)).collect()
}

fn runtime(message: impl Into<String>) -> EvaluationError {
    EvaluationError::runtime(message)
}

fn overflow() -> EvaluationError {
    runtime("integer overflow")
}

fn number(name: &str, v: &ScriptValue) -> Result<Number, EvaluationError> {
    v.as_number().ok_or_else(|| {
        runtime(format!(
            "{name}() requires a number, got '{}'",
            v.type_name()
        ))
    })
}

fn float_to_int(name: &str, f: f64) -> Result<i64, EvaluationError> {
    if !f.is_finite() {
        return Err(runtime(format!("{name}(): cannot convert float {f} to integer")));
    }
    if f < i64::MIN as f64 || f >= i64::MAX as f64 {
        return Err(overflow());
    }
    Ok(f as i64)
}

/// `base ** exp`: integer result for integer operands with a non-negative exponent.
pub(crate) fn power(base: Number, exp: Number) -> Result<ScriptValue, EvaluationError> {
    if let (Number::Int(b), Number::Int(e)) = (base, exp) {
        if e >= 0 {
            let e = u32::try_from(e).map_err(|_| overflow())?;
            return b.checked_pow(e).map(ScriptValue::Int).ok_or_else(overflow);
        }
    }
    let (b, e) = (base.as_f64(), exp.as_f64());
    if b == 0.0 && e < 0.0 {
        return Err(runtime("0.0 cannot be raised to a negative power"));
    }
    let r = b.powf(e);
    if r.is_nan() && !b.is_nan() && !e.is_nan() {
        return Err(runtime("math domain error"));
    }
    Ok(ScriptValue::Float(r))
}

impl Builtin {
    /// Accepted argument count, `(min, max)`; `None` means unbounded.
    pub(crate) fn arity(self) -> (usize, Option<usize>) {
        match self {
            Builtin::Round | Builtin::Log => (1, Some(2)),
            Builtin::Pow => (2, Some(2)),
            Builtin::Min | Builtin::Max => (1, None),
            _ => (1, Some(1)),
        }
    }

    pub(crate) fn call(self, name: &str, args: Vec<ScriptValue>) -> Result<ScriptValue, EvaluationError> {
        match self {
            Builtin::Abs => match number(name, &args[0])? {
                Number::Int(i) => i.checked_abs().map(ScriptValue::Int).ok_or_else(overflow),
                Number::Float(f) => Ok(ScriptValue::Float(f.abs())),
            },
            Builtin::Round => round(name, &args),
            Builtin::Min => extreme(name, args, std::cmp::Ordering::Less),
            Builtin::Max => extreme(name, args, std::cmp::Ordering::Greater),
            Builtin::Str => Ok(ScriptValue::Str(args[0].to_string())),
            Builtin::Int => to_int(name, &args[0]),
            Builtin::Float => to_float(name, &args[0]),
            Builtin::Len => match &args[0] {
                ScriptValue::Str(s) => Ok(ScriptValue::Int(s.chars().count() as i64)),
                ScriptValue::List(items) => Ok(ScriptValue::Int(items.len() as i64)),
                other => Err(runtime(format!(
                    "object of type '{}' has no len()",
                    other.type_name()
                ))),
            },
            Builtin::Pow => power(number(name, &args[0])?, number(name, &args[1])?),
            Builtin::Sqrt => {
                let f = number(name, &args[0])?.as_f64();
                if f < 0.0 {
                    return Err(runtime("math domain error"));
                }
                Ok(ScriptValue::Float(f.sqrt()))
            }
            Builtin::Floor | Builtin::Ceil | Builtin::Trunc => match number(name, &args[0])? {
                Number::Int(i) => Ok(ScriptValue::Int(i)),
                Number::Float(f) => {
                    let r = match self {
                        Builtin::Floor => f.floor(),
                        Builtin::Ceil => f.ceil(),
                        _ => f.trunc(),
                    };
                    float_to_int(name, r).map(ScriptValue::Int)
                }
            },
            Builtin::Log => {
                let x = number(name, &args[0])?.as_f64();
                if x <= 0.0 {
                    return Err(runtime("math domain error"));
                }
                match args.get(1) {
                    None => Ok(ScriptValue::Float(x.ln())),
                    Some(base) => {
                        let b = number(name, base)?.as_f64();
                        if b <= 0.0 || b == 1.0 {
                            return Err(runtime("math domain error"));
                        }
                        Ok(ScriptValue::Float(x.ln() / b.ln()))
                    }
                }
            }
            Builtin::Log10 => {
                let x = number(name, &args[0])?.as_f64();
                if x <= 0.0 {
                    return Err(runtime("math domain error"));
                }
                Ok(ScriptValue::Float(x.log10()))
            }
            Builtin::Exp => {
                let r = number(name, &args[0])?.as_f64().exp();
                if r.is_infinite() {
                    return Err(runtime("math range error"));
                }
                Ok(ScriptValue::Float(r))
            }
            Builtin::Sin => Ok(ScriptValue::Float(number(name, &args[0])?.as_f64().sin())),
            Builtin::Cos => Ok(ScriptValue::Float(number(name, &args[0])?.as_f64().cos())),
            Builtin::Tan => Ok(ScriptValue::Float(number(name, &args[0])?.as_f64().tan())),
            Builtin::Fabs => Ok(ScriptValue::Float(number(name, &args[0])?.as_f64().abs())),
        }
    }
}

/// `round(x)` rounds half to even and returns an int; `round(x, n)` keeps the operand's kind.
fn round(name: &str, args: &[ScriptValue]) -> Result<ScriptValue, EvaluationError> {
    let x = number(name, &args[0])?;
    let digits = match args.get(1) {
        None | Some(ScriptValue::None) => {
            return match x {
                Number::Int(i) => Ok(ScriptValue::Int(i)),
                Number::Float(f) => float_to_int(name, f.round_ties_even()).map(ScriptValue::Int),
            };
        }
        Some(ScriptValue::Int(d)) => *d,
        Some(other) => {
            return Err(runtime(format!(
                "round() ndigits must be an int, got '{}'",
                other.type_name()
            )));
        }
    };
    let digits = i32::try_from(digits).map_err(|_| overflow())?;
    match x {
        Number::Int(i) if digits >= 0 => Ok(ScriptValue::Int(i)),
        Number::Int(i) => {
            let factor = 10f64.powi(-digits);
            float_to_int(name, (i as f64 / factor).round_ties_even() * factor).map(ScriptValue::Int)
        }
        Number::Float(f) => {
            let factor = 10f64.powi(digits);
            let scaled = (f * factor).round_ties_even() / factor;
            Ok(ScriptValue::Float(if scaled.is_finite() { scaled } else { f }))
        }
    }
}

/// `min`/`max` over either the arguments or a single list argument; the first extreme wins.
fn extreme(
    name: &str,
    args: Vec<ScriptValue>,
    wanted: std::cmp::Ordering,
) -> Result<ScriptValue, EvaluationError> {
    let items = match <[ScriptValue; 1]>::try_from(args) {
        Ok([ScriptValue::List(items)]) => items,
        Ok([other]) => {
            return Err(runtime(format!(
                "'{}' object is not iterable",
                other.type_name()
            )));
        }
        Err(args) => args,
    };
    let mut iter = items.into_iter();
    let mut best = iter
        .next()
        .ok_or_else(|| runtime(format!("{name}() arg is an empty sequence")))?;
    let op = if wanted == std::cmp::Ordering::Less { "<" } else { ">" };
    for item in iter {
        if item.try_order(&best, op)? == Some(wanted) {
            best = item;
        }
    }
    Ok(best)
}

fn to_int(name: &str, v: &ScriptValue) -> Result<ScriptValue, EvaluationError> {
    match v {
        ScriptValue::Str(s) => s
            .trim()
            .parse::<i64>()
            .map(ScriptValue::Int)
            .map_err(|_| runtime(format!("invalid literal for int() with base 10: '{s}'"))),
        ScriptValue::Float(f) => float_to_int(name, f.trunc()).map(ScriptValue::Int),
        ScriptValue::Int(_) | ScriptValue::Bool(_) => Ok(number(name, v)?.into()),
        other => Err(runtime(format!(
            "int() argument must be a string or a number, not '{}'",
            other.type_name()
        ))),
    }
}

fn to_float(name: &str, v: &ScriptValue) -> Result<ScriptValue, EvaluationError> {
    match v {
        ScriptValue::Str(s) => s
            .trim()
            .parse::<f64>()
            .map(ScriptValue::Float)
            .map_err(|_| runtime(format!("could not convert string to float: '{s}'"))),
        ScriptValue::Int(_) | ScriptValue::Bool(_) | ScriptValue::Float(_) => {
            Ok(ScriptValue::Float(number(name, v)?.as_f64()))
        }
        other => Err(runtime(format!(
            "float() argument must be a string or a number, not '{}'",
            other.type_name()
        ))),
    }
}

impl Method {
    pub(crate) fn arity(self) -> (usize, Option<usize>) {
        match self {
            Method::Split => (0, Some(2)),
            Method::Strip => (0, Some(1)),
            Method::Lower | Method::Upper => (0, Some(0)),
        }
    }

    pub(crate) fn call(
        self,
        name: &str,
        target: ScriptValue,
        args: Vec<ScriptValue>,
    ) -> Result<ScriptValue, EvaluationError> {
        let s = match target {
            ScriptValue::Str(s) => s,
            other => {
                return Err(runtime(format!(
                    "'{}' object has no attribute '{name}'",
                    other.type_name()
                )));
            }
        };
        match self {
            Method::Lower => Ok(ScriptValue::Str(s.to_lowercase())),
            Method::Upper => Ok(ScriptValue::Str(s.to_uppercase())),
            Method::Strip => match args.first() {
                None | Some(ScriptValue::None) => Ok(ScriptValue::Str(s.trim().to_string())),
                Some(ScriptValue::Str(chars)) => Ok(ScriptValue::Str(
                    s.trim_matches(|c: char| chars.contains(c)).to_string(),
                )),
                Some(other) => Err(runtime(format!(
                    "strip arg must be None or str, not '{}'",
                    other.type_name()
                ))),
            },
            Method::Split => split(&s, &args),
        }
    }
}

fn split(s: &str, args: &[ScriptValue]) -> Result<ScriptValue, EvaluationError> {
    let max_splits = match args.get(1) {
        None => None,
        Some(ScriptValue::Int(n)) if *n < 0 => None,
        Some(ScriptValue::Int(n)) => Some(usize::try_from(*n).map_err(|_| overflow())?),
        Some(other) => {
            return Err(runtime(format!(
                "split() maxsplit must be an int, not '{}'",
                other.type_name()
            )));
        }
    };
    let to_list = |parts: Vec<&str>| {
        ScriptValue::List(parts.into_iter().map(|p| ScriptValue::Str(p.to_string())).collect())
    };

    match args.first() {
        None | Some(ScriptValue::None) => {
            let words: Vec<&str> = match max_splits {
                None => s.split_whitespace().collect(),
                Some(n) => split_whitespace_n(s, n),
            };
            Ok(to_list(words))
        }
        Some(ScriptValue::Str(sep)) if sep.is_empty() => Err(runtime("empty separator")),
        Some(ScriptValue::Str(sep)) => Ok(to_list(match max_splits {
            None => s.split(sep.as_str()).collect(),
            Some(n) => s.splitn(n + 1, sep.as_str()).collect(),
        })),
        Some(other) => Err(runtime(format!(
            "must be str or None, not '{}'",
            other.type_name()
        ))),
    }
}

fn split_whitespace_n(s: &str, max_splits: usize) -> Vec<&str> {
    let mut out = Vec::new();
    let mut rest = s.trim_start();
    while !rest.is_empty() {
        if out.len() == max_splits {
            out.push(rest);
            break;
        }
        match rest.find(char::is_whitespace) {
            Some(end) => {
                out.push(&rest[..end]);
                rest = rest[end..].trim_start();
            }
            None => {
                out.push(rest);
                break;
            }
        }
    }
    out
}
