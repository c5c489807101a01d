use chrono::{NaiveDate, TimeDelta};

use rust_data_cleaning::sandbox::{Builtin, Capabilities, Method, Script, ScriptValue};
use rust_data_cleaning::types::Value;
use rust_data_cleaning::EvaluationError;

fn disallowed(src: &str) -> String {
    match Script::compile(src) {
        Err(EvaluationError::DisallowedName { name }) => name,
        other => panic!("{src}: expected DisallowedName, got {other:?}"),
    }
}

#[test]
fn escape_attempts_are_rejected_before_evaluation() {
    assert_eq!(disallowed("__import__('os').system('rm -rf /')"), "__import__");
    assert_eq!(disallowed("open('/etc/passwd')"), "open");
    assert_eq!(disallowed("exec('1')"), "exec");
    assert_eq!(disallowed("x.__class__.__mro__"), "__class__");
    assert_eq!(disallowed("globals()"), "globals");
    assert_eq!(disallowed("math.__dict__"), "math.__dict__");
}

#[test]
fn malformed_scripts_are_syntax_errors() {
    for src in ["x +", "x.split('@'", "lambda: 1", "x = 1", "", "[1, 2]"] {
        assert!(
            matches!(Script::compile(src), Err(EvaluationError::Syntax { .. })),
            "{src} should not parse"
        );
    }
}

#[test]
fn standard_vocabulary_evaluates_per_cell() {
    let cases: Vec<(&str, Value, Option<Value>)> = vec![
        ("x.strip().lower()", Value::text("  MiXeD "), Some(Value::text("mixed"))),
        ("x.split('@')[1]", Value::text("a@b.org"), Some(Value::text("b.org"))),
        ("abs(x) + 1", Value::Int64(-4), Some(Value::Int64(5))),
        ("max(x, 10)", Value::Int64(3), Some(Value::Int64(10))),
        ("min(x, 0.5)", Value::Float64(2.0), Some(Value::Float64(0.5))),
        ("int(x)", Value::text("12"), Some(Value::Int64(12))),
        ("float(x) / 4", Value::text("3"), Some(Value::Float64(0.75))),
        ("math.ceil(x)", Value::Float64(1.2), Some(Value::Int64(2))),
        ("not x", Value::Bool(false), Some(Value::Bool(true))),
        ("None", Value::Int64(1), None),
    ];
    for (src, input, expected) in cases {
        let script = Script::compile(src).unwrap();
        assert_eq!(script.eval_cell(&input).unwrap(), expected, "{src}");
    }
}

#[test]
fn temporal_cells_bind_as_text_and_seconds() {
    let dt = NaiveDate::from_ymd_opt(2021, 3, 4)
        .unwrap()
        .and_hms_opt(5, 6, 7)
        .unwrap();
    let year = Script::compile("x[0:4]");
    // slicing is not part of the language
    assert!(year.is_err());

    let first = Script::compile("x.split('-')[0]").unwrap();
    assert_eq!(
        first.eval_cell(&Value::DateTime(dt)).unwrap(),
        Some(Value::text("2021"))
    );

    let minutes = Script::compile("x / 60").unwrap();
    assert_eq!(
        minutes.eval_cell(&Value::Duration(TimeDelta::minutes(90))).unwrap(),
        Some(Value::Float64(90.0))
    );
}

#[test]
fn runtime_failures_are_reported_not_panicked() {
    let script = Script::compile("x.upper()").unwrap();
    assert!(matches!(
        script.eval_cell(&Value::Int64(1)),
        Err(EvaluationError::Runtime { .. })
    ));

    let script = Script::compile("10 // x").unwrap();
    assert!(matches!(
        script.eval_cell(&Value::Int64(0)),
        Err(EvaluationError::Runtime { .. })
    ));
}

#[test]
fn capabilities_can_be_narrowed_and_extended() {
    let caps = Capabilities::empty()
        .with_variable("cell")
        .allow_function("magnitude", Builtin::Abs)
        .allow_method("shout", Method::Upper);

    let script = Script::compile_with("magnitude(cell)", &caps).unwrap();
    assert_eq!(script.eval(&ScriptValue::Int(-3)).unwrap(), ScriptValue::Int(3));

    let script = Script::compile_with("cell.shout()", &caps).unwrap();
    assert_eq!(
        script.eval(&ScriptValue::Str("hi".into())).unwrap(),
        ScriptValue::Str("HI".into())
    );

    assert!(matches!(
        Script::compile_with("abs(cell)", &caps),
        Err(EvaluationError::DisallowedName { .. })
    ));
    assert!(matches!(
        Script::compile_with("math.sqrt(cell)", &caps),
        Err(EvaluationError::DisallowedName { .. })
    ));
}
