//! `fill_null`: replace missing cells with a constant.

use super::rewrite_column;
use crate::error::{OperationError, OperationResult};
use crate::inference::coerce::{parse_duration, parse_float, parse_integer};
use crate::inference::DateParser;
use crate::types::{Column, DataType, Table, Value};

/// Fill missing cells of `column` in `table` with `value`, reading ambiguous dates day-first.
pub fn fill_null(table: &Table, column: &str, value: &str) -> OperationResult<Table> {
    fill_null_with(table, column, value, &DateParser::default())
}

/// [`fill_null`] with an explicit date parser for `DateTime` columns.
pub fn fill_null_with(
    table: &Table,
    column: &str,
    value: &str,
    dates: &DateParser,
) -> OperationResult<Table> {
    rewrite_column(table, column, |col| fill_column_with(col, value, dates))
}

/// Fill missing cells of a single column, reading ambiguous dates day-first.
///
/// `value` is converted to the column's type first: text columns take it verbatim, numeric
/// and temporal columns parse it. Boolean and categorical columns are not fillable.
pub fn fill_column(column: &Column, value: &str) -> OperationResult<Column> {
    fill_column_with(column, value, &DateParser::default())
}

/// [`fill_column`] with an explicit date parser.
pub fn fill_column_with(
    column: &Column,
    value: &str,
    dates: &DateParser,
) -> OperationResult<Column> {
    let fill = fill_value(column, value, dates)?;
    let values = column
        .values
        .iter()
        .map(|cell| match cell {
            Some(v) => Some(v.clone()),
            None => Some(fill.clone()),
        })
        .collect();
    Ok(Column::new(column.name.clone(), column.data_type, values))
}

fn fill_value(column: &Column, raw: &str, dates: &DateParser) -> OperationResult<Value> {
    let conversion = |source| OperationError::TypeConversion {
        column: column.name.clone(),
        source,
    };
    match column.data_type {
        DataType::Utf8 | DataType::Mixed => Ok(Value::Utf8(raw.to_string())),
        DataType::Int64 => parse_integer(raw).map(Value::Int64).map_err(conversion),
        DataType::Float64 => parse_float(raw).map(Value::Float64).map_err(conversion),
        DataType::DateTime => dates
            .parse(raw)
            .map(Value::DateTime)
            .map_err(conversion),
        DataType::Duration => parse_duration(raw).map(Value::Duration).map_err(conversion),
        DataType::Bool | DataType::Categorical => Err(OperationError::UnsupportedColumnType {
            column: column.name.clone(),
            data_type: column.data_type,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeDelta};

    #[test]
    fn integer_column_takes_parsed_value() {
        let col = Column::new(
            "n",
            DataType::Int64,
            vec![Some(Value::Int64(1)), Some(Value::Int64(2)), None, Some(Value::Int64(4))],
        );
        let out = fill_column(&col, "0").unwrap();
        assert_eq!(out.data_type, DataType::Int64);
        assert_eq!(
            out.values,
            vec![
                Some(Value::Int64(1)),
                Some(Value::Int64(2)),
                Some(Value::Int64(0)),
                Some(Value::Int64(4))
            ]
        );
    }

    #[test]
    fn text_column_takes_value_verbatim() {
        let col = Column::from_text("s", [None, Some("a")]);
        let out = fill_column(&col, "unknown").unwrap();
        assert_eq!(out.values, vec![Some(Value::text("unknown")), Some(Value::text("a"))]);
    }

    #[test]
    fn float_column_takes_parsed_value() {
        let col = Column::new("f", DataType::Float64, vec![None, Some(Value::Float64(1.5))]);
        let out = fill_column(&col, " 2.25 ").unwrap();
        assert_eq!(out.data_type, DataType::Float64);
        assert_eq!(
            out.values,
            vec![Some(Value::Float64(2.25)), Some(Value::Float64(1.5))]
        );
    }

    #[test]
    fn datetime_column_parses_day_first_by_default() {
        let col = Column::new("d", DataType::DateTime, vec![None]);
        let out = fill_column(&col, "10/11/12").unwrap();
        let expected = NaiveDate::from_ymd_opt(2012, 11, 10)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        assert_eq!(out.data_type, DataType::DateTime);
        assert_eq!(out.values, vec![Some(Value::DateTime(expected))]);

        let out = fill_column_with(&col, "10/11/12", &DateParser::new(false)).unwrap();
        let expected = NaiveDate::from_ymd_opt(2012, 10, 11)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        assert_eq!(out.values, vec![Some(Value::DateTime(expected))]);
    }

    #[test]
    fn duration_column_takes_parsed_value() {
        let col = Column::new(
            "t",
            DataType::Duration,
            vec![Some(Value::Duration(TimeDelta::hours(1))), None],
        );
        let out = fill_column(&col, "2 days").unwrap();
        assert_eq!(out.data_type, DataType::Duration);
        assert_eq!(
            out.values,
            vec![
                Some(Value::Duration(TimeDelta::hours(1))),
                Some(Value::Duration(TimeDelta::days(2)))
            ]
        );
    }

    #[test]
    fn unparseable_fill_value_is_a_type_conversion_error() {
        let col = Column::new("f", DataType::Float64, vec![None]);
        let err = fill_column(&col, "abc").unwrap_err();
        match err {
            OperationError::TypeConversion { column, source } => {
                assert_eq!(column, "f");
                assert_eq!(source.raw, "abc");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn boolean_columns_are_rejected() {
        let col = Column::new("b", DataType::Bool, vec![Some(Value::Bool(true)), None]);
        assert!(matches!(
            fill_column(&col, "true"),
            Err(OperationError::UnsupportedColumnType {
                data_type: DataType::Bool,
                ..
            })
        ));
    }

    #[test]
    fn no_missing_cells_is_a_no_op() {
        let col = Column::new("n", DataType::Int64, vec![Some(Value::Int64(7))]);
        assert_eq!(fill_column(&col, "0").unwrap(), col);
    }
}
