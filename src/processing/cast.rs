//! `cast_to_*` operators.
//!
//! Casts never fail on individual cells: a cell that cannot be converted becomes missing.
//! Missing cells stay missing under every target.

use chrono::{DateTime, NaiveDateTime, TimeDelta};

use super::rewrite_column;
use crate::error::OperationResult;
use crate::inference::coerce::parse_duration;
use crate::inference::DateParser;
use crate::types::{Cell, Column, DataType, Table, Value};

const NANOS_PER_SECOND: i64 = 1_000_000_000;
/// 2^63; `i64` holds every whole float in `[-I64_BOUND, I64_BOUND)`.
const I64_BOUND: f64 = 9_223_372_036_854_775_808.0;

/// Target of a cast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CastTarget {
    /// Int64, or Float64 when any converted value is fractional or outside the `i64` range.
    Numeric,
    String,
    Datetime,
    Timedelta,
    Boolean,
    /// Keeps the values and tags the column categorical.
    Category,
}

/// Cast column `column` of `table` to `target`, reading ambiguous dates day-first.
pub fn cast(table: &Table, column: &str, target: CastTarget) -> OperationResult<Table> {
    cast_with(table, column, target, &DateParser::default())
}

/// [`cast`] with an explicit date parser for `CastTarget::Datetime`.
pub fn cast_with(
    table: &Table,
    column: &str,
    target: CastTarget,
    dates: &DateParser,
) -> OperationResult<Table> {
    rewrite_column(table, column, |col| Ok(cast_column_with(col, target, dates)))
}

/// Cast a single column, reading ambiguous dates day-first.
pub fn cast_column(column: &Column, target: CastTarget) -> Column {
    cast_column_with(column, target, &DateParser::default())
}

/// Cast a single column with an explicit date parser.
pub fn cast_column_with(column: &Column, target: CastTarget, dates: &DateParser) -> Column {
    match target {
        CastTarget::Numeric => to_numeric(column),
        CastTarget::String => map_cells(column, DataType::Utf8, |v| {
            Some(Value::Utf8(v.to_string()))
        }),
        CastTarget::Datetime => map_cells(column, DataType::DateTime, |v| {
            to_datetime(v, dates).map(Value::DateTime)
        }),
        CastTarget::Timedelta => map_cells(column, DataType::Duration, |v| {
            to_duration(v).map(Value::Duration)
        }),
        CastTarget::Boolean => map_cells(column, DataType::Bool, |v| Some(Value::Bool(truthy(v)))),
        CastTarget::Category => Column::new(
            column.name.clone(),
            DataType::Categorical,
            column.values.clone(),
        ),
    }
}

fn map_cells<F>(column: &Column, data_type: DataType, mut f: F) -> Column
where
    F: FnMut(&Value) -> Cell,
{
    let values = column
        .values
        .iter()
        .map(|cell| cell.as_ref().and_then(&mut f))
        .collect();
    Column::new(column.name.clone(), data_type, values)
}

enum Numeric {
    Int(i64),
    Float(f64),
}

fn numeric_value(value: &Value) -> Option<Numeric> {
    match value {
        Value::Int64(i) => Some(Numeric::Int(*i)),
        Value::Float64(f) if f.is_nan() => None,
        Value::Float64(f) => Some(Numeric::Float(*f)),
        Value::Bool(b) => Some(Numeric::Int(i64::from(*b))),
        Value::Utf8(s) => {
            let trimmed = s.trim();
            match trimmed.parse::<i64>() {
                Ok(i) => Some(Numeric::Int(i)),
                Err(_) => trimmed
                    .parse::<f64>()
                    .ok()
                    .filter(|f| !f.is_nan())
                    .map(Numeric::Float),
            }
        }
        Value::DateTime(dt) => dt.and_utc().timestamp_nanos_opt().map(Numeric::Int),
        Value::Duration(d) => d.num_nanoseconds().map(Numeric::Int),
    }
}

fn to_numeric(column: &Column) -> Column {
    let converted: Vec<Option<Numeric>> = column
        .values
        .iter()
        .map(|cell| cell.as_ref().and_then(numeric_value))
        .collect();

    let needs_float = converted
        .iter()
        .any(|n| matches!(n, Some(Numeric::Float(f)) if whole_i64(*f).is_none()));

    let (data_type, values) = if needs_float {
        let values = converted
            .into_iter()
            .map(|n| {
                n.map(|n| match n {
                    Numeric::Int(i) => Value::Float64(i as f64),
                    Numeric::Float(f) => Value::Float64(f),
                })
            })
            .collect();
        (DataType::Float64, values)
    } else {
        let values = converted
            .into_iter()
            .map(|n| {
                n.and_then(|n| match n {
                    Numeric::Int(i) => Some(Value::Int64(i)),
                    Numeric::Float(f) => whole_i64(f).map(Value::Int64),
                })
            })
            .collect();
        (DataType::Int64, values)
    };
    Column::new(column.name.clone(), data_type, values)
}

/// Truncate to `i64`, or `None` when `f` is not finite or out of range.
fn truncate_i64(f: f64) -> Option<i64> {
    let t = f.trunc();
    (t.is_finite() && t >= -I64_BOUND && t < I64_BOUND).then_some(t as i64)
}

fn whole_i64(f: f64) -> Option<i64> {
    if f.fract() == 0.0 { truncate_i64(f) } else { None }
}

fn from_epoch_nanos(nanos: i64) -> Option<NaiveDateTime> {
    let secs = nanos.div_euclid(NANOS_PER_SECOND);
    let sub = u32::try_from(nanos.rem_euclid(NANOS_PER_SECOND)).ok()?;
    DateTime::from_timestamp(secs, sub).map(|dt| dt.naive_utc())
}

fn to_datetime(value: &Value, parser: &DateParser) -> Option<NaiveDateTime> {
    match value {
        Value::DateTime(dt) => Some(*dt),
        Value::Utf8(s) => parser.parse(s).ok(),
        Value::Int64(i) => from_epoch_nanos(*i),
        Value::Float64(f) => truncate_i64(*f).and_then(from_epoch_nanos),
        _ => None,
    }
}

fn to_duration(value: &Value) -> Option<TimeDelta> {
    match value {
        Value::Duration(d) => Some(*d),
        Value::Utf8(s) => parse_duration(s).ok(),
        Value::Int64(i) => Some(TimeDelta::nanoseconds(*i)),
        Value::Float64(f) => truncate_i64(*f).map(TimeDelta::nanoseconds),
        _ => None,
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Int64(i) => *i != 0,
        Value::Float64(f) => *f != 0.0,
        Value::Bool(b) => *b,
        Value::Utf8(s) => !s.is_empty(),
        Value::DateTime(_) => true,
        Value::Duration(d) => *d != TimeDelta::zero(),
    }
}
