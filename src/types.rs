//! Core data model types.
//!
//! A [`Table`] is an ordered list of named [`Column`]s that all share the same length. Every
//! cell is a [`Cell`], i.e. `Option<Value>`: `None` is the single universal "missing" marker for
//! every kind of column (it is distinct from an empty string).

use std::collections::HashSet;
use std::fmt;

use chrono::{NaiveDateTime, TimeDelta};
use serde::{Deserialize, Serialize};

use crate::error::TableError;

/// Semantic type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    /// 64-bit signed integer.
    #[serde(rename = "int64")]
    Int64,
    /// 64-bit floating point number.
    #[serde(rename = "float64")]
    Float64,
    /// Boolean.
    #[serde(rename = "bool")]
    Bool,
    /// UTF-8 string. Raw decoded text lands here.
    #[serde(rename = "utf8")]
    Utf8,
    /// Timestamp without timezone.
    #[serde(rename = "datetime")]
    DateTime,
    /// Signed duration (timedelta).
    #[serde(rename = "duration")]
    Duration,
    /// Low-cardinality tag over the column's original values; values are not altered.
    #[serde(rename = "categorical")]
    Categorical,
    /// Heterogeneous cells (e.g. a spreadsheet column mixing numbers and text).
    #[serde(rename = "mixed")]
    Mixed,
}

impl DataType {
    /// Stable lowercase name, matching the serialized form.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Int64 => "int64",
            Self::Float64 => "float64",
            Self::Bool => "bool",
            Self::Utf8 => "utf8",
            Self::DateTime => "datetime",
            Self::Duration => "duration",
            Self::Categorical => "categorical",
            Self::Mixed => "mixed",
        }
    }

    /// Whether inference may still refine a column of this type.
    pub fn needs_refinement(&self) -> bool {
        matches!(self, Self::Utf8 | Self::Mixed)
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single named, typed field in a [`Schema`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    /// Field/column name.
    pub name: String,
    /// Field data type.
    #[serde(rename = "type")]
    pub data_type: DataType,
}

impl Field {
    /// Create a new field.
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
        }
    }
}

/// Ordered description of a table's columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    /// Ordered list of fields.
    pub fields: Vec<Field>,
}

impl Schema {
    /// Create a new schema from fields.
    pub fn new(fields: Vec<Field>) -> Self {
        Self { fields }
    }

    /// Iterate field names in order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    /// Returns the index of a field by name, if present.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }
}

/// A single present value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// 64-bit signed integer.
    Int64(i64),
    /// 64-bit float.
    Float64(f64),
    /// Boolean.
    Bool(bool),
    /// UTF-8 string.
    Utf8(String),
    /// Timestamp without timezone.
    DateTime(NaiveDateTime),
    /// Signed duration.
    Duration(TimeDelta),
}

/// A cell: a value, or `None` for missing.
pub type Cell = Option<Value>;

impl Value {
    /// Convenience constructor for text values.
    pub fn text(s: impl Into<String>) -> Self {
        Self::Utf8(s.into())
    }

    /// The column type a homogeneous column of this value would have.
    pub fn data_type(&self) -> DataType {
        match self {
            Self::Int64(_) => DataType::Int64,
            Self::Float64(_) => DataType::Float64,
            Self::Bool(_) => DataType::Bool,
            Self::Utf8(_) => DataType::Utf8,
            Self::DateTime(_) => DataType::DateTime,
            Self::Duration(_) => DataType::Duration,
        }
    }

    /// Returns the text if this is a [`Value::Utf8`].
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Utf8(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub(crate) fn distinct_key(&self) -> ValueKey<'_> {
        match self {
            Self::Int64(v) => ValueKey::Int64(*v),
            // -0.0 and 0.0 are the same value; all NaNs collapse to one key.
            Self::Float64(v) if *v == 0.0 => ValueKey::Float64(0.0f64.to_bits()),
            Self::Float64(v) if v.is_nan() => ValueKey::Float64(f64::NAN.to_bits()),
            Self::Float64(v) => ValueKey::Float64(v.to_bits()),
            Self::Bool(v) => ValueKey::Bool(*v),
            Self::Utf8(s) => ValueKey::Utf8(s.as_str()),
            Self::DateTime(v) => ValueKey::DateTime(*v),
            Self::Duration(v) => ValueKey::Duration(*v),
        }
    }
}

/// Hashable identity of a [`Value`], used for cardinality counting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum ValueKey<'a> {
    Int64(i64),
    Float64(u64),
    Bool(bool),
    Utf8(&'a str),
    DateTime(NaiveDateTime),
    Duration(TimeDelta),
}

/// Canonical text rendering. Date/duration renderings are accepted back by the parsers in
/// [`crate::inference::coerce`].
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int64(v) => write!(f, "{v}"),
            Self::Float64(v) => {
                if v.is_finite() && v.fract() == 0.0 && v.abs() < 1e15 {
                    write!(f, "{v:.1}")
                } else {
                    write!(f, "{v}")
                }
            }
            Self::Bool(v) => write!(f, "{v}"),
            Self::Utf8(s) => f.write_str(s),
            Self::DateTime(v) => write!(f, "{}", v.format("%Y-%m-%d %H:%M:%S%.f")),
            Self::Duration(v) => f.write_str(&format_duration(*v)),
        }
    }
}

/// Render a duration as `D days HH:MM:SS[.fffffffff]`, with a leading `-` when negative.
pub fn format_duration(d: TimeDelta) -> String {
    let negative = d < TimeDelta::zero();
    let abs = d.abs();
    let total_secs = abs.num_seconds();
    let days = total_secs / 86_400;
    let rem = total_secs % 86_400;
    let (h, m, s) = (rem / 3_600, (rem % 3_600) / 60, rem % 60);
    let nanos = abs.subsec_nanos();

    let mut out = format!(
        "{sign}{days} days {h:02}:{m:02}:{s:02}",
        sign = if negative { "-" } else { "" }
    );
    if nanos > 0 {
        let frac = format!("{nanos:09}");
        out.push('.');
        out.push_str(frac.trim_end_matches('0'));
    }
    out
}

/// A named, typed column of cells.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    /// Column name (unique within a [`Table`]).
    pub name: String,
    /// Declared semantic type.
    pub data_type: DataType,
    /// Cells in row order.
    pub values: Vec<Cell>,
}

impl Column {
    /// Create a column.
    pub fn new(name: impl Into<String>, data_type: DataType, values: Vec<Cell>) -> Self {
        Self {
            name: name.into(),
            data_type,
            values,
        }
    }

    /// Create a raw text column, the shape decoders hand to inference.
    ///
    /// `None` entries become missing cells; everything else (including `""`) is kept as text.
    pub fn from_text<'a, I>(name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = Option<&'a str>>,
    {
        let values = values
            .into_iter()
            .map(|v| v.map(|s| Value::Utf8(s.to_string())))
            .collect();
        Self::new(name, DataType::Utf8, values)
    }

    /// Number of cells.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the column has no cells.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Number of missing cells.
    pub fn missing_count(&self) -> usize {
        self.values.iter().filter(|c| c.is_none()).count()
    }

    /// Number of distinct cells; all missing cells together count as one value.
    pub fn distinct_count(&self) -> usize {
        let mut seen = HashSet::with_capacity(self.values.len());
        let mut saw_missing = false;
        for cell in &self.values {
            match cell {
                Some(v) => {
                    seen.insert(v.distinct_key());
                }
                None => saw_missing = true,
            }
        }
        seen.len() + usize::from(saw_missing)
    }
}

/// In-memory tabular dataset.
///
/// Invariants (checked by [`Table::new`]): column names are unique and every column has the
/// same number of cells. Column order is the original column order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    columns: Vec<Column>,
}

impl Table {
    /// Create a table, validating name uniqueness and equal column lengths.
    pub fn new(columns: Vec<Column>) -> Result<Self, TableError> {
        let mut names = HashSet::with_capacity(columns.len());
        let expected = columns.first().map(Column::len).unwrap_or(0);
        for col in &columns {
            if !names.insert(col.name.as_str()) {
                return Err(TableError::DuplicateColumn {
                    name: col.name.clone(),
                });
            }
            if col.len() != expected {
                return Err(TableError::LengthMismatch {
                    column: col.name.clone(),
                    expected,
                    actual: col.len(),
                });
            }
        }
        Ok(Self { columns })
    }

    /// Build a table from raw text columns (see [`Column::from_text`]).
    pub fn from_text_columns<'a, N, I>(columns: Vec<(N, I)>) -> Result<Self, TableError>
    where
        N: Into<String>,
        I: IntoIterator<Item = Option<&'a str>>,
    {
        Self::new(
            columns
                .into_iter()
                .map(|(name, values)| Column::from_text(name, values))
                .collect(),
        )
    }

    /// Skips validation; callers must preserve the invariants of the table they derive from.
    pub(crate) fn from_columns_unchecked(columns: Vec<Column>) -> Self {
        Self { columns }
    }

    /// Number of rows.
    pub fn row_count(&self) -> usize {
        self.columns.first().map(Column::len).unwrap_or(0)
    }

    /// Number of columns.
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Columns in order.
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Consume the table, returning its columns in order.
    pub fn into_columns(self) -> Vec<Column> {
        self.columns
    }

    /// Returns the index of a column by name, if present.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Look up a column by name.
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Schema describing column names and types, in order.
    pub fn schema(&self) -> Schema {
        Schema::new(
            self.columns
                .iter()
                .map(|c| Field::new(c.name.clone(), c.data_type))
                .collect(),
        )
    }

    /// Return a copy of this table with the column at `idx` replaced by `column`.
    ///
    /// `column` must keep the name and length of the column it replaces.
    pub(crate) fn with_column_at(&self, idx: usize, column: Column) -> Self {
        debug_assert_eq!(column.len(), self.row_count());
        let mut columns = self.columns.clone();
        columns[idx] = column;
        Self { columns }
    }
}
