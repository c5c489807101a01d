//! `apply_script`: run a sandboxed expression over every cell of one column.

use super::rewrite_column;
use crate::error::{OperationError, OperationResult};
use crate::sandbox::Script;
use crate::types::{Cell, Column, DataType, Table, Value};

/// Compile `source` and apply it to column `column` of `table`.
///
/// The column is looked up and the script compiled before any cell is evaluated; the first
/// failing cell aborts the whole rewrite.
pub fn apply_script(table: &Table, column: &str, source: &str) -> OperationResult<Table> {
    rewrite_column(table, column, |col| {
        let script = Script::compile(source).map_err(|source| OperationError::Evaluation {
            column: col.name.clone(),
            source,
        })?;
        script_column(col, &script)
    })
}

/// Apply an already compiled script to column `column` of `table`.
pub fn apply_compiled(table: &Table, column: &str, script: &Script) -> OperationResult<Table> {
    rewrite_column(table, column, |col| script_column(col, script))
}

/// Apply `script` to each non-missing cell of `column`.
pub fn script_column(column: &Column, script: &Script) -> OperationResult<Column> {
    let mut values = Vec::with_capacity(column.len());
    for cell in &column.values {
        let out = match cell {
            Some(v) => script
                .eval_cell(v)
                .map_err(|source| OperationError::Evaluation {
                    column: column.name.clone(),
                    source,
                })?,
            None => None,
        };
        values.push(out);
    }

    let data_type = result_type(&values).unwrap_or(column.data_type);
    if data_type == DataType::Float64 {
        for cell in values.iter_mut() {
            if let Some(Value::Int64(i)) = *cell {
                *cell = Some(Value::Float64(i as f64));
            }
        }
    }
    Ok(Column::new(column.name.clone(), data_type, values))
}

/// Type of the produced cells; `None` when every result is missing.
fn result_type(values: &[Cell]) -> Option<DataType> {
    let mut found: Option<DataType> = None;
    for v in values.iter().flatten() {
        let t = v.data_type();
        found = Some(match found {
            None => t,
            Some(prev) if prev == t => prev,
            Some(DataType::Int64 | DataType::Float64)
                if matches!(t, DataType::Int64 | DataType::Float64) =>
            {
                DataType::Float64
            }
            Some(_) => return Some(DataType::Mixed),
        });
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EvaluationError;

    fn emails() -> Table {
        Table::from_text_columns(vec![(
            "email",
            vec![Some("bguzman@example.org"), None, Some("ann@example.com")],
        )])
        .unwrap()
    }

    #[test]
    fn split_keeps_local_part() {
        let out = apply_script(&emails(), "email", "x.split('@')[0]").unwrap();
        let col = out.column("email").unwrap();
        assert_eq!(col.data_type, DataType::Utf8);
        assert_eq!(
            col.values,
            vec![Some(Value::text("bguzman")), None, Some(Value::text("ann"))]
        );
    }

    #[test]
    fn disallowed_name_fails_before_any_cell() {
        let table = emails();
        let err = apply_script(&table, "email", "open(x)").unwrap_err();
        assert!(matches!(
            err,
            OperationError::Evaluation {
                source: EvaluationError::DisallowedName { .. },
                ..
            }
        ));
        assert_eq!(table, emails());
    }

    #[test]
    fn runtime_failure_on_one_cell_aborts_the_column() {
        let col = Column::new(
            "n",
            DataType::Mixed,
            vec![Some(Value::Int64(4)), Some(Value::text("four"))],
        );
        let script = Script::compile("x * 2 - 1").unwrap();
        assert!(matches!(
            script_column(&col, &script),
            Err(OperationError::Evaluation {
                source: EvaluationError::Runtime { .. },
                ..
            })
        ));
    }

    #[test]
    fn mixed_int_and_float_results_widen() {
        let col = Column::new(
            "n",
            DataType::Mixed,
            vec![Some(Value::Int64(3)), Some(Value::Float64(0.5))],
        );
        let out = script_column(&col, &Script::compile("x").unwrap()).unwrap();
        assert_eq!(out.data_type, DataType::Float64);
        assert_eq!(
            out.values,
            vec![Some(Value::Float64(3.0)), Some(Value::Float64(0.5))]
        );
    }

    #[test]
    fn heterogeneous_results_are_mixed() {
        let col = Column::new(
            "v",
            DataType::Mixed,
            vec![Some(Value::Int64(1)), Some(Value::text("a"))],
        );
        let out = script_column(&col, &Script::compile("x").unwrap()).unwrap();
        assert_eq!(out.data_type, DataType::Mixed);
    }

    #[test]
    fn all_missing_keeps_original_type() {
        let col = Column::new("d", DataType::DateTime, vec![None, None]);
        let out = script_column(&col, &Script::compile("len(x)").unwrap()).unwrap();
        assert_eq!(out.data_type, DataType::DateTime);
        assert_eq!(out.values, vec![None, None]);
    }
}
