//! pest parser producing [`Expr`] trees.

use pest::iterators::Pair;
use pest::Parser;
use pest_derive::Parser;

use super::ast::{BinaryOp, CompareOp, Expr, UnaryOp};
use super::value::ScriptValue;
use crate::error::EvaluationError;

#[derive(Parser)]
#[grammar = "src/sandbox/grammar.pest"]
struct ScriptParser;

/// Parse one script into its syntax tree.
pub fn parse(source: &str) -> Result<Expr, EvaluationError> {
    let mut pairs = ScriptParser::parse(Rule::script, source).map_err(|e| syntax(e.to_string()))?;
    let script = pairs
        .next()
        .ok_or_else(|| syntax("empty parse result"))?;
    let expr = script
        .into_inner()
        .next()
        .ok_or_else(|| syntax("script contains no expression"))?;
    build(expr)
}

fn syntax(message: impl Into<String>) -> EvaluationError {
    EvaluationError::Syntax {
        message: message.into(),
    }
}

fn first_inner(pair: Pair<'_, Rule>) -> Result<Pair<'_, Rule>, EvaluationError> {
    let rule = pair.as_rule();
    pair.into_inner()
        .next()
        .ok_or_else(|| syntax(format!("{rule:?} has no operand")))
}

fn build(pair: Pair<'_, Rule>) -> Result<Expr, EvaluationError> {
    match pair.as_rule() {
        Rule::expr => build(first_inner(pair)?),
        Rule::or_expr => build_bool_chain(pair, Expr::Or),
        Rule::and_expr => build_bool_chain(pair, Expr::And),
        Rule::not_expr => build_not(pair),
        Rule::comparison => build_comparison(pair),
        Rule::sum | Rule::term => build_left_assoc(pair),
        Rule::unary => build_unary(pair),
        Rule::power => build_power(pair),
        Rule::postfix => build_postfix(pair),
        Rule::int => pair
            .as_str()
            .parse::<i64>()
            .map(|i| Expr::Literal(ScriptValue::Int(i)))
            .map_err(|_| syntax(format!("integer literal {} is out of range", pair.as_str()))),
        Rule::float => pair
            .as_str()
            .parse::<f64>()
            .map(|f| Expr::Literal(ScriptValue::Float(f)))
            .map_err(|_| syntax(format!("invalid float literal {}", pair.as_str()))),
        Rule::string => {
            let chars = first_inner(pair)?;
            Ok(Expr::Literal(ScriptValue::Str(unescape(chars.as_str()))))
        }
        Rule::true_lit => Ok(Expr::Literal(ScriptValue::Bool(true))),
        Rule::false_lit => Ok(Expr::Literal(ScriptValue::Bool(false))),
        Rule::none_lit => Ok(Expr::Literal(ScriptValue::None)),
        Rule::ident => Ok(Expr::Name(pair.as_str().to_string())),
        other => Err(syntax(format!("unexpected rule: {other:?}"))),
    }
}

/// `a or b or c` → `Or([a, b, c])`; a single operand is returned as-is.
fn build_bool_chain(
    pair: Pair<'_, Rule>,
    wrap: fn(Vec<Expr>) -> Expr,
) -> Result<Expr, EvaluationError> {
    let mut operands = pair
        .into_inner()
        .filter(|p| !matches!(p.as_rule(), Rule::or_op | Rule::and_op))
        .map(build)
        .collect::<Result<Vec<_>, _>>()?;
    if operands.len() == 1 {
        return operands
            .pop()
            .ok_or_else(|| syntax("boolean chain has no operand"));
    }
    Ok(wrap(operands))
}

fn build_not(pair: Pair<'_, Rule>) -> Result<Expr, EvaluationError> {
    let mut inner = pair.into_inner();
    let first = inner.next().ok_or_else(|| syntax("'not' has no operand"))?;
    if first.as_rule() != Rule::not_op {
        return build(first);
    }
    let operand = inner.next().ok_or_else(|| syntax("'not' has no operand"))?;
    Ok(Expr::Unary {
        op: UnaryOp::Not,
        operand: Box::new(build(operand)?),
    })
}

fn build_comparison(pair: Pair<'_, Rule>) -> Result<Expr, EvaluationError> {
    let mut inner = pair.into_inner();
    let first = build(inner.next().ok_or_else(|| syntax("comparison has no operand"))?)?;
    let mut rest = Vec::new();
    while let Some(op_pair) = inner.next() {
        let op = match op_pair.as_str() {
            "==" => CompareOp::Eq,
            "!=" => CompareOp::Ne,
            "<" => CompareOp::Lt,
            "<=" => CompareOp::Le,
            ">" => CompareOp::Gt,
            ">=" => CompareOp::Ge,
            other => return Err(syntax(format!("unknown comparison operator: {other}"))),
        };
        let right = inner
            .next()
            .ok_or_else(|| syntax(format!("no right operand for '{op}'")))?;
        rest.push((op, build(right)?));
    }
    if rest.is_empty() {
        return Ok(first);
    }
    Ok(Expr::Compare {
        first: Box::new(first),
        rest,
    })
}

fn build_left_assoc(pair: Pair<'_, Rule>) -> Result<Expr, EvaluationError> {
    let mut inner = pair.into_inner();
    let mut expr = build(inner.next().ok_or_else(|| syntax("operator has no operand"))?)?;
    while let Some(op_pair) = inner.next() {
        let op = match op_pair.as_str() {
            "+" => BinaryOp::Add,
            "-" => BinaryOp::Sub,
            "*" => BinaryOp::Mul,
            "/" => BinaryOp::Div,
            "//" => BinaryOp::FloorDiv,
            "%" => BinaryOp::Mod,
            other => return Err(syntax(format!("unknown operator: {other}"))),
        };
        let right = inner
            .next()
            .ok_or_else(|| syntax(format!("no right operand for '{op}'")))?;
        expr = Expr::Binary {
            op,
            left: Box::new(expr),
            right: Box::new(build(right)?),
        };
    }
    Ok(expr)
}

fn build_unary(pair: Pair<'_, Rule>) -> Result<Expr, EvaluationError> {
    let mut inner = pair.into_inner();
    let first = inner.next().ok_or_else(|| syntax("unary has no operand"))?;
    if first.as_rule() != Rule::sign_op {
        return build(first);
    }
    let op = if first.as_str() == "-" {
        UnaryOp::Neg
    } else {
        UnaryOp::Pos
    };
    let operand = inner
        .next()
        .ok_or_else(|| syntax(format!("no operand for unary '{op}'")))?;
    Ok(Expr::Unary {
        op,
        operand: Box::new(build(operand)?),
    })
}

fn build_power(pair: Pair<'_, Rule>) -> Result<Expr, EvaluationError> {
    let mut inner = pair.into_inner();
    let base = build(inner.next().ok_or_else(|| syntax("power has no base"))?)?;
    match (inner.next(), inner.next()) {
        (None, _) => Ok(base),
        (Some(_), Some(exponent)) => Ok(Expr::Binary {
            op: BinaryOp::Pow,
            left: Box::new(base),
            right: Box::new(build(exponent)?),
        }),
        (Some(_), None) => Err(syntax("no exponent for '**'")),
    }
}

fn build_postfix(pair: Pair<'_, Rule>) -> Result<Expr, EvaluationError> {
    let mut inner = pair.into_inner();
    let mut expr = build(inner.next().ok_or_else(|| syntax("empty expression"))?)?;
    for suffix in inner {
        expr = match suffix.as_rule() {
            Rule::call => Expr::Call {
                callee: Box::new(expr),
                args: suffix.into_inner().map(build).collect::<Result<_, _>>()?,
            },
            Rule::attribute => Expr::Attribute {
                target: Box::new(expr),
                name: first_inner(suffix)?.as_str().to_string(),
            },
            Rule::index => Expr::Index {
                target: Box::new(expr),
                index: Box::new(build(first_inner(suffix)?)?),
            },
            other => return Err(syntax(format!("unexpected suffix: {other:?}"))),
        };
    }
    Ok(expr)
}

fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('0') => out.push('\0'),
            Some(c @ ('\\' | '\'' | '"')) => out.push(c),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}
