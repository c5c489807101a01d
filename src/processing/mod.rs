//! Column operators.
//!
//! Every operator reads one column of an immutable [`Table`] and returns a new table where
//! that column has been rewritten. The input table is never modified, and on failure no table
//! is produced at all.
//!
//! Operators can be called directly ([`cast()`], [`fill_null()`], [`apply_script()`]) or
//! dispatched from a serializable [`Operation`] via [`apply_operation`], which is what the
//! versioning service records.
//!
//! ## Example
//!
//! ```no_run
//! use rust_data_cleaning::processing::{apply_operation, Operation, OperationType};
//! use rust_data_cleaning::types::Table;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let table = Table::from_text_columns(vec![("email", vec![Some("a@b.com"), None])])?;
//!
//! let op = Operation::apply_script("email", "x.split('@')[0]");
//! let cleaned = apply_operation(&table, &op)?;
//! assert_eq!(cleaned.column("email").unwrap().values[0].as_ref().unwrap().to_string(), "a");
//!
//! let op = Operation::new(OperationType::CastToCategory, "email");
//! let tagged = apply_operation(&cleaned, &op)?;
//! # let _ = tagged;
//! # Ok(())
//! # }
//! ```

mod cast;
mod fill_null;
mod script;

pub use cast::{cast, cast_column, cast_column_with, cast_with, CastTarget};
pub use fill_null::{fill_column, fill_column_with, fill_null, fill_null_with};
pub use script::{apply_compiled, apply_script, script_column};

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{OperationError, OperationFailure, OperationResult};
use crate::inference::DateParser;
use crate::types::{Column, Table};

/// The operator an [`Operation`] invokes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationType {
    ApplyScript,
    FillNull,
    CastToNumeric,
    CastToString,
    CastToDatetime,
    CastToTimedelta,
    CastToBoolean,
    CastToCategory,
}

impl OperationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationType::ApplyScript => "apply_script",
            OperationType::FillNull => "fill_null",
            OperationType::CastToNumeric => "cast_to_numeric",
            OperationType::CastToString => "cast_to_string",
            OperationType::CastToDatetime => "cast_to_datetime",
            OperationType::CastToTimedelta => "cast_to_timedelta",
            OperationType::CastToBoolean => "cast_to_boolean",
            OperationType::CastToCategory => "cast_to_category",
        }
    }

    /// The cast target, for the `cast_to_*` family.
    pub fn cast_target(&self) -> Option<CastTarget> {
        match self {
            OperationType::CastToNumeric => Some(CastTarget::Numeric),
            OperationType::CastToString => Some(CastTarget::String),
            OperationType::CastToDatetime => Some(CastTarget::Datetime),
            OperationType::CastToTimedelta => Some(CastTarget::Timedelta),
            OperationType::CastToBoolean => Some(CastTarget::Boolean),
            OperationType::CastToCategory => Some(CastTarget::Category),
            OperationType::ApplyScript | OperationType::FillNull => None,
        }
    }
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single operation on a single column.
///
/// `payload` carries the script text for `apply_script` and the fill value for `fill_null`;
/// casts ignore it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    pub operation_type: OperationType,
    pub column: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<String>,
}

impl Operation {
    pub fn new(operation_type: OperationType, column: impl Into<String>) -> Self {
        Self {
            operation_type,
            column: column.into(),
            payload: None,
        }
    }

    pub fn with_payload(mut self, payload: impl Into<String>) -> Self {
        self.payload = Some(payload.into());
        self
    }

    pub fn apply_script(column: impl Into<String>, script: impl Into<String>) -> Self {
        Self::new(OperationType::ApplyScript, column).with_payload(script)
    }

    pub fn fill_null(column: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(OperationType::FillNull, column).with_payload(value)
    }

    fn require_payload(&self) -> OperationResult<&str> {
        self.payload
            .as_deref()
            .ok_or_else(|| OperationError::MissingPayload {
                column: self.column.clone(),
            })
    }
}

/// Dispatch `operation` against `table`, reading ambiguous dates day-first.
///
/// Errors are wrapped in an [`OperationFailure`] naming the operation and column.
pub fn apply_operation(table: &Table, operation: &Operation) -> Result<Table, OperationFailure> {
    apply_operation_with(table, operation, &DateParser::default())
}

/// [`apply_operation`] with the date parser used by `fill_null` and `cast_to_datetime`.
pub fn apply_operation_with(
    table: &Table,
    operation: &Operation,
    dates: &DateParser,
) -> Result<Table, OperationFailure> {
    debug!(
        operation = %operation.operation_type,
        column = %operation.column,
        "applying operation"
    );
    dispatch(table, operation, dates).map_err(|source| OperationFailure {
        operation: operation.operation_type,
        column: operation.column.clone(),
        source,
    })
}

fn dispatch(table: &Table, operation: &Operation, dates: &DateParser) -> OperationResult<Table> {
    let column = operation.column.as_str();
    match operation.operation_type {
        OperationType::ApplyScript => apply_script(table, column, operation.require_payload()?),
        OperationType::FillNull => {
            fill_null_with(table, column, operation.require_payload()?, dates)
        }
        other => match other.cast_target() {
            Some(target) => cast_with(table, column, target, dates),
            None => Err(OperationError::MissingPayload {
                column: column.to_string(),
            }),
        },
    }
}

/// Look up `name`, rewrite it with `f`, and splice the result into a copy of `table`.
pub(crate) fn rewrite_column<F>(table: &Table, name: &str, f: F) -> OperationResult<Table>
where
    F: FnOnce(&Column) -> OperationResult<Column>,
{
    let idx = table
        .column_index(name)
        .ok_or_else(|| OperationError::ColumnNotFound {
            column: name.to_string(),
        })?;
    let rewritten = f(&table.columns()[idx])?;
    Ok(table.with_column_at(idx, rewritten))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DataType, Value};

    fn sample() -> Table {
        Table::from_text_columns(vec![
            ("id", vec![Some("1"), Some("2"), None]),
            ("name", vec![Some("a"), None, Some("c")]),
        ])
        .unwrap()
    }

    #[test]
    fn operation_type_serde_names() {
        let json = serde_json::to_string(&OperationType::CastToTimedelta).unwrap();
        assert_eq!(json, "\"cast_to_timedelta\"");
        let back: OperationType = serde_json::from_str("\"apply_script\"").unwrap();
        assert_eq!(back, OperationType::ApplyScript);
        assert_eq!(OperationType::FillNull.to_string(), "fill_null");
    }

    #[test]
    fn operation_roundtrips_through_json_without_payload() {
        let op = Operation::new(OperationType::CastToNumeric, "id");
        let json = serde_json::to_string(&op).unwrap();
        assert!(!json.contains("payload"));
        let back: Operation = serde_json::from_str(&json).unwrap();
        assert_eq!(back, op);
    }

    #[test]
    fn unknown_column_is_reported_with_operation() {
        let err = apply_operation(&sample(), &Operation::fill_null("nope", "x")).unwrap_err();
        assert_eq!(err.operation, OperationType::FillNull);
        assert_eq!(err.column, "nope");
        assert!(matches!(err.source, OperationError::ColumnNotFound { .. }));
    }

    #[test]
    fn missing_payload_is_an_error() {
        let op = Operation::new(OperationType::ApplyScript, "name");
        let err = apply_operation(&sample(), &op).unwrap_err();
        assert!(matches!(err.source, OperationError::MissingPayload { .. }));
    }

    #[test]
    fn dispatch_leaves_input_untouched() {
        let table = sample();
        let out = apply_operation(&table, &Operation::new(OperationType::CastToNumeric, "id"))
            .unwrap();
        assert_eq!(out.column("id").unwrap().data_type, DataType::Int64);
        assert_eq!(out.column("id").unwrap().values[1], Some(Value::Int64(2)));
        assert_eq!(table.column("id").unwrap().data_type, DataType::Utf8);
        assert_eq!(out.column("name"), table.column("name"));
    }
}
