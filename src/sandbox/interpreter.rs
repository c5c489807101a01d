//! Binding and evaluation.
//!
//! [`bind`] walks the syntax tree once and resolves every name against a [`Capabilities`]
//! allow-list. The result is an [`Ir`] with no names left in it: evaluation only ever sees the
//! bound input, constants, and the builtins the binder picked.

use std::cmp::Ordering;

use super::ast::{BinaryOp, CompareOp, Expr, UnaryOp};
use super::builtins::{power, Builtin, Capabilities, Method, MATH_NAMESPACE};
use super::value::{Number, ScriptValue};
use crate::error::EvaluationError;

/// Longest string a `*` repetition may build.
const MAX_REPEAT_LEN: usize = 10_000_000;

/// A name-free, closed expression.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Ir {
    Const(ScriptValue),
    Input,
    Call {
        builtin: Builtin,
        name: String,
        args: Vec<Ir>,
    },
    Method {
        method: Method,
        name: String,
        target: Box<Ir>,
        args: Vec<Ir>,
    },
    Index {
        target: Box<Ir>,
        index: Box<Ir>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Ir>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Ir>,
        right: Box<Ir>,
    },
    Compare {
        first: Box<Ir>,
        rest: Vec<(CompareOp, Ir)>,
    },
    And(Vec<Ir>),
    Or(Vec<Ir>),
}

fn disallowed(name: impl Into<String>) -> EvaluationError {
    EvaluationError::DisallowedName { name: name.into() }
}

fn syntax(message: impl Into<String>) -> EvaluationError {
    EvaluationError::Syntax {
        message: message.into(),
    }
}

fn check_arity(name: &str, (min, max): (usize, Option<usize>), given: usize) -> Result<(), EvaluationError> {
    let ok = given >= min && max.is_none_or(|max| given <= max);
    if ok {
        return Ok(());
    }
    let expected = match max {
        Some(max) if max == min => format!("exactly {min}"),
        Some(max) => format!("{min} to {max}"),
        None => format!("at least {min}"),
    };
    Err(syntax(format!(
        "{name}() takes {expected} argument(s) ({given} given)"
    )))
}

/// Resolve `expr` against `caps`.
pub(crate) fn bind(expr: &Expr, caps: &Capabilities) -> Result<Ir, EvaluationError> {
    let bind_all = |exprs: &[Expr]| -> Result<Vec<Ir>, EvaluationError> {
        exprs.iter().map(|e| bind(e, caps)).collect()
    };

    Ok(match expr {
        Expr::Literal(v) => Ir::Const(v.clone()),
        Expr::Name(name) if name == caps.variable() => Ir::Input,
        Expr::Name(name) => return Err(disallowed(name.as_str())),
        Expr::Attribute { target, name } if math_member(target, caps) => {
            match caps.math_constant(name) {
                Some(c) => Ir::Const(ScriptValue::Float(c)),
                None => return Err(disallowed(format!("{MATH_NAMESPACE}.{name}"))),
            }
        }
        // Plain attribute reads are never allowed.
        Expr::Attribute { target, name } => {
            bind(target, caps)?;
            return Err(disallowed(name.as_str()));
        }
        Expr::Call { callee, args } => bind_call(callee, args, caps)?,
        Expr::Index { target, index } => Ir::Index {
            target: Box::new(bind(target, caps)?),
            index: Box::new(bind(index, caps)?),
        },
        Expr::Unary { op, operand } => Ir::Unary {
            op: *op,
            operand: Box::new(bind(operand, caps)?),
        },
        Expr::Binary { op, left, right } => Ir::Binary {
            op: *op,
            left: Box::new(bind(left, caps)?),
            right: Box::new(bind(right, caps)?),
        },
        Expr::Compare { first, rest } => Ir::Compare {
            first: Box::new(bind(first, caps)?),
            rest: rest
                .iter()
                .map(|(op, e)| Ok((*op, bind(e, caps)?)))
                .collect::<Result<_, EvaluationError>>()?,
        },
        Expr::And(operands) => Ir::And(bind_all(operands)?),
        Expr::Or(operands) => Ir::Or(bind_all(operands)?),
    })
}

/// `math.<member>`, unless the bound variable shadows the namespace.
fn math_member(target: &Expr, caps: &Capabilities) -> bool {
    matches!(target, Expr::Name(ns) if ns == MATH_NAMESPACE && ns != caps.variable())
        && caps.has_math()
}

fn bind_call(callee: &Expr, args: &[Expr], caps: &Capabilities) -> Result<Ir, EvaluationError> {
    let bound_args = args
        .iter()
        .map(|e| bind(e, caps))
        .collect::<Result<Vec<_>, _>>()?;

    match callee {
        Expr::Name(name) if name == caps.variable() => {
            Err(syntax(format!("'{name}' is not callable")))
        }
        Expr::Name(name) => {
            let builtin = caps.function(name).ok_or_else(|| disallowed(name.as_str()))?;
            check_arity(name, builtin.arity(), bound_args.len())?;
            Ok(Ir::Call {
                builtin,
                name: name.clone(),
                args: bound_args,
            })
        }
        Expr::Attribute { target, name } if math_member(target, caps) => {
            let builtin = caps
                .math_function(name)
                .ok_or_else(|| disallowed(format!("{MATH_NAMESPACE}.{name}")))?;
            check_arity(name, builtin.arity(), bound_args.len())?;
            Ok(Ir::Call {
                builtin,
                name: name.clone(),
                args: bound_args,
            })
        }
        Expr::Attribute { target, name } => {
            let target = bind(target, caps)?;
            let method = caps.method(name).ok_or_else(|| disallowed(name.as_str()))?;
            check_arity(name, method.arity(), bound_args.len())?;
            Ok(Ir::Method {
                method,
                name: name.clone(),
                target: Box::new(target),
                args: bound_args,
            })
        }
        _ => Err(syntax("expression is not callable")),
    }
}

/// Evaluate a bound expression with `input` as the variable's value.
pub(crate) fn eval(ir: &Ir, input: &ScriptValue) -> Result<ScriptValue, EvaluationError> {
    match ir {
        Ir::Const(v) => Ok(v.clone()),
        Ir::Input => Ok(input.clone()),
        Ir::Call {
            builtin,
            name,
            args,
        } => {
            let args = eval_all(args, input)?;
            builtin.call(name, args)
        }
        Ir::Method {
            method,
            name,
            target,
            args,
        } => {
            let target = eval(target, input)?;
            let args = eval_all(args, input)?;
            method.call(name, target, args)
        }
        Ir::Index { target, index } => subscript(eval(target, input)?, &eval(index, input)?),
        Ir::Unary { op, operand } => unary(*op, eval(operand, input)?),
        Ir::Binary { op, left, right } => binary(*op, eval(left, input)?, eval(right, input)?),
        Ir::Compare { first, rest } => {
            let mut left = eval(first, input)?;
            for (op, right) in rest {
                let right = eval(right, input)?;
                if !compare(*op, &left, &right)? {
                    return Ok(ScriptValue::Bool(false));
                }
                left = right;
            }
            Ok(ScriptValue::Bool(true))
        }
        Ir::And(operands) => short_circuit(operands, input, false),
        Ir::Or(operands) => short_circuit(operands, input, true),
    }
}

fn eval_all(irs: &[Ir], input: &ScriptValue) -> Result<Vec<ScriptValue>, EvaluationError> {
    irs.iter().map(|ir| eval(ir, input)).collect()
}

/// `and` stops at the first falsy operand, `or` at the first truthy one; that operand is the
/// result, otherwise the last one is.
fn short_circuit(
    operands: &[Ir],
    input: &ScriptValue,
    stop_when: bool,
) -> Result<ScriptValue, EvaluationError> {
    let mut last = ScriptValue::None;
    for operand in operands {
        last = eval(operand, input)?;
        if last.truthy() == stop_when {
            break;
        }
    }
    Ok(last)
}

fn unary(op: UnaryOp, v: ScriptValue) -> Result<ScriptValue, EvaluationError> {
    if op == UnaryOp::Not {
        return Ok(ScriptValue::Bool(!v.truthy()));
    }
    let n = v.as_number().ok_or_else(|| {
        EvaluationError::runtime(format!(
            "bad operand type for unary {op}: '{}'",
            v.type_name()
        ))
    })?;
    match (op, n) {
        (UnaryOp::Neg, Number::Int(i)) => i
            .checked_neg()
            .map(ScriptValue::Int)
            .ok_or_else(|| EvaluationError::runtime("integer overflow")),
        (UnaryOp::Neg, Number::Float(f)) => Ok(ScriptValue::Float(-f)),
        (_, n) => Ok(n.into()),
    }
}

fn binary(op: BinaryOp, l: ScriptValue, r: ScriptValue) -> Result<ScriptValue, EvaluationError> {
    match (op, &l, &r) {
        (BinaryOp::Add, ScriptValue::Str(a), ScriptValue::Str(b)) => {
            return Ok(ScriptValue::Str(format!("{a}{b}")));
        }
        (BinaryOp::Add, ScriptValue::List(a), ScriptValue::List(b)) => {
            return Ok(ScriptValue::List(a.iter().chain(b).cloned().collect()));
        }
        (
            BinaryOp::Mul,
            ScriptValue::Str(s),
            n @ (ScriptValue::Int(_) | ScriptValue::Bool(_)),
        )
        | (
            BinaryOp::Mul,
            n @ (ScriptValue::Int(_) | ScriptValue::Bool(_)),
            ScriptValue::Str(s),
        ) => return repeat(s, n),
        _ => {}
    }

    match (l.as_number(), r.as_number()) {
        (Some(a), Some(b)) => arithmetic(op, a, b),
        _ => Err(EvaluationError::runtime(format!(
            "unsupported operand type(s) for {op}: '{}' and '{}'",
            l.type_name(),
            r.type_name()
        ))),
    }
}

fn repeat(s: &str, n: &ScriptValue) -> Result<ScriptValue, EvaluationError> {
    let count = match n.as_number() {
        Some(Number::Int(c)) => usize::try_from(c).unwrap_or(0),
        _ => 0,
    };
    if s.len().saturating_mul(count) > MAX_REPEAT_LEN {
        return Err(EvaluationError::runtime("repeated string is too long"));
    }
    Ok(ScriptValue::Str(s.repeat(count)))
}

fn arithmetic(op: BinaryOp, a: Number, b: Number) -> Result<ScriptValue, EvaluationError> {
    let overflow = || EvaluationError::runtime("integer overflow");
    let zero_div = |what: &str| EvaluationError::runtime(format!("{what} by zero"));

    match (op, a, b) {
        (BinaryOp::Pow, a, b) => power(a, b),
        (BinaryOp::Div, a, b) => {
            if b.as_f64() == 0.0 {
                return Err(zero_div("division"));
            }
            Ok(ScriptValue::Float(a.as_f64() / b.as_f64()))
        }
        (BinaryOp::Add, Number::Int(x), Number::Int(y)) => {
            x.checked_add(y).map(ScriptValue::Int).ok_or_else(overflow)
        }
        (BinaryOp::Sub, Number::Int(x), Number::Int(y)) => {
            x.checked_sub(y).map(ScriptValue::Int).ok_or_else(overflow)
        }
        (BinaryOp::Mul, Number::Int(x), Number::Int(y)) => {
            x.checked_mul(y).map(ScriptValue::Int).ok_or_else(overflow)
        }
        (BinaryOp::FloorDiv, Number::Int(x), Number::Int(y)) => {
            if y == 0 {
                return Err(zero_div("integer division"));
            }
            let q = x.checked_div(y).ok_or_else(overflow)?;
            let q = if x % y != 0 && ((x < 0) != (y < 0)) { q - 1 } else { q };
            Ok(ScriptValue::Int(q))
        }
        (BinaryOp::Mod, Number::Int(x), Number::Int(y)) => {
            if y == 0 {
                return Err(zero_div("integer modulo"));
            }
            let r = x.checked_rem(y).ok_or_else(overflow)?;
            let r = if r != 0 && ((r < 0) != (y < 0)) { r + y } else { r };
            Ok(ScriptValue::Int(r))
        }
        (op, a, b) => {
            let (x, y) = (a.as_f64(), b.as_f64());
            let v = match op {
                BinaryOp::Add => x + y,
                BinaryOp::Sub => x - y,
                BinaryOp::Mul => x * y,
                BinaryOp::FloorDiv => {
                    if y == 0.0 {
                        return Err(zero_div("float floor division"));
                    }
                    (x / y).floor()
                }
                BinaryOp::Mod => {
                    if y == 0.0 {
                        return Err(zero_div("float modulo"));
                    }
                    let r = x % y;
                    if r != 0.0 && ((r < 0.0) != (y < 0.0)) { r + y } else { r }
                }
                BinaryOp::Div => x / y,
                BinaryOp::Pow => return power(a, b),
            };
            Ok(ScriptValue::Float(v))
        }
    }
}

fn compare(op: CompareOp, l: &ScriptValue, r: &ScriptValue) -> Result<bool, EvaluationError> {
    let ordering = match op {
        CompareOp::Eq => return Ok(l.loose_eq(r)),
        CompareOp::Ne => return Ok(!l.loose_eq(r)),
        _ => l.try_order(r, &op.to_string())?,
    };
    let Some(ordering) = ordering else {
        return Ok(false);
    };
    Ok(match op {
        CompareOp::Lt => ordering == Ordering::Less,
        CompareOp::Le => ordering != Ordering::Greater,
        CompareOp::Gt => ordering == Ordering::Greater,
        CompareOp::Ge => ordering != Ordering::Less,
        CompareOp::Eq | CompareOp::Ne => false,
    })
}

fn resolve_index(i: i64, len: usize) -> Option<usize> {
    let len = i64::try_from(len).ok()?;
    let k = if i < 0 { i + len } else { i };
    (0..len).contains(&k).then_some(k as usize)
}

fn subscript(target: ScriptValue, index: &ScriptValue) -> Result<ScriptValue, EvaluationError> {
    let i = match index {
        ScriptValue::Int(i) => *i,
        ScriptValue::Bool(b) => i64::from(*b),
        other => {
            return Err(EvaluationError::runtime(format!(
                "indices must be integers, not '{}'",
                other.type_name()
            )));
        }
    };
    match target {
        ScriptValue::List(items) => resolve_index(i, items.len())
            .and_then(|k| items.into_iter().nth(k))
            .ok_or_else(|| EvaluationError::runtime("list index out of range")),
        ScriptValue::Str(s) => resolve_index(i, s.chars().count())
            .and_then(|k| s.chars().nth(k))
            .map(|c| ScriptValue::Str(c.to_string()))
            .ok_or_else(|| EvaluationError::runtime("string index out of range")),
        other => Err(EvaluationError::runtime(format!(
            "'{}' object is not subscriptable",
            other.type_name()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sandbox::parser::parse;

    fn run(src: &str, x: ScriptValue) -> Result<ScriptValue, EvaluationError> {
        let ir = bind(&parse(src)?, &Capabilities::standard())?;
        eval(&ir, &x)
    }

    fn s(v: &str) -> ScriptValue {
        ScriptValue::Str(v.to_string())
    }

    #[test]
    fn email_local_part() {
        assert_eq!(
            run("x.split('@')[0]", s("bguzman@example.org")).unwrap(),
            s("bguzman")
        );
    }

    #[test]
    fn arithmetic_follows_floor_semantics() {
        assert_eq!(run("x // 2", ScriptValue::Int(-7)).unwrap(), ScriptValue::Int(-4));
        assert_eq!(run("x % 3", ScriptValue::Int(-7)).unwrap(), ScriptValue::Int(2));
        assert_eq!(run("x / 2", ScriptValue::Int(7)).unwrap(), ScriptValue::Float(3.5));
        assert_eq!(run("x ** 2", ScriptValue::Int(-3)).unwrap(), ScriptValue::Int(9));
        assert_eq!(run("-x ** 2", ScriptValue::Int(3)).unwrap(), ScriptValue::Int(-9));
        assert_eq!(run("x + 0.5", ScriptValue::Int(1)).unwrap(), ScriptValue::Float(1.5));
        assert_eq!(run("x + 1", ScriptValue::Bool(true)).unwrap(), ScriptValue::Int(2));
    }

    #[test]
    fn division_by_zero_is_a_runtime_error() {
        assert!(matches!(
            run("1 / x", ScriptValue::Int(0)),
            Err(EvaluationError::Runtime { .. })
        ));
        assert!(run("1 // x", ScriptValue::Int(0)).is_err());
        assert!(run("1 % x", ScriptValue::Float(0.0)).is_err());
    }

    #[test]
    fn overflow_is_a_runtime_error() {
        assert!(run("x + 1", ScriptValue::Int(i64::MAX)).is_err());
        assert!(run("x ** 100", ScriptValue::Int(10)).is_err());
    }

    #[test]
    fn comparisons_and_boolean_operators() {
        assert_eq!(run("0 < x <= 10", ScriptValue::Int(10)).unwrap(), ScriptValue::Bool(true));
        assert_eq!(run("0 < x <= 10", ScriptValue::Int(11)).unwrap(), ScriptValue::Bool(false));
        assert_eq!(run("x == 1.0", ScriptValue::Int(1)).unwrap(), ScriptValue::Bool(true));
        assert_eq!(run("x or 'default'", s("")).unwrap(), s("default"));
        assert_eq!(run("x and x.upper()", s("ab")).unwrap(), s("AB"));
        assert_eq!(run("not x", ScriptValue::Int(0)).unwrap(), ScriptValue::Bool(true));
        assert!(run("x < 1", s("a")).is_err());
    }

    #[test]
    fn string_operations() {
        assert_eq!(run("x + '!'", s("hi")).unwrap(), s("hi!"));
        assert_eq!(run("x * 3", s("ab")).unwrap(), s("ababab"));
        assert_eq!(run("x[-1]", s("abc")).unwrap(), s("c"));
        assert!(run("x[5]", s("abc")).is_err());
        assert_eq!(run("len(x.strip())", s("  abc ")).unwrap(), ScriptValue::Int(3));
        assert_eq!(run("str(x) + 'x'", ScriptValue::Float(2.0)).unwrap(), s("2.0x"));
    }

    #[test]
    fn math_namespace() {
        assert_eq!(run("math.sqrt(x)", ScriptValue::Int(9)).unwrap(), ScriptValue::Float(3.0));
        assert_eq!(run("math.floor(x)", ScriptValue::Float(2.7)).unwrap(), ScriptValue::Int(2));
        assert_eq!(
            run("round(math.pi, 2)", ScriptValue::None).unwrap(),
            ScriptValue::Float(3.14)
        );
    }

    #[test]
    fn unknown_names_fail_at_bind_time() {
        let caps = Capabilities::standard();
        for (src, name) in [
            ("open('f')", "open"),
            ("y + 1", "y"),
            ("__import__('os')", "__import__"),
            ("x.__class__", "__class__"),
            ("x.replace('a', 'b')", "replace"),
            ("math.system(x)", "math.system"),
            ("os.system(x)", "os"),
        ] {
            let expr = parse(src).unwrap();
            assert_eq!(
                bind(&expr, &caps),
                Err(EvaluationError::DisallowedName {
                    name: name.to_string()
                }),
                "{src}"
            );
        }
    }

    #[test]
    fn arity_is_checked_at_bind_time() {
        let expr = parse("abs(x, 1)").unwrap();
        assert!(matches!(
            bind(&expr, &Capabilities::standard()),
            Err(EvaluationError::Syntax { .. })
        ));
    }

    #[test]
    fn custom_variable_name() {
        let caps = Capabilities::standard().with_variable("value");
        let ir = bind(&parse("value * 2").unwrap(), &caps).unwrap();
        assert_eq!(eval(&ir, &ScriptValue::Int(4)).unwrap(), ScriptValue::Int(8));
        assert!(bind(&parse("x * 2").unwrap(), &caps).is_err());
    }
}
