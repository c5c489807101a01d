//! Error types used across the crate.
//!
//! Each concern gets its own enum so callers can match on what actually went wrong:
//!
//! - [`ParseError`]: one raw value could not be coerced into a target kind
//! - [`TableError`]: a [`crate::types::Table`] would violate its shape invariants
//! - [`EvaluationError`]: the expression sandbox rejected or failed a script
//! - [`OperationError`] / [`OperationFailure`]: an operator could not rewrite a column
//! - [`IngestionError`]: tabular decode failed
//! - [`InterchangeError`]: Table ⇄ JSON conversion failed
//! - [`StoreError`]: the object or metadata store failed
//! - [`ConfigError`], [`ExecutionError`]: invalid options
//! - [`VersioningError`]: anything the version-producing entry points can surface

use thiserror::Error;

use crate::processing::OperationType;
use crate::types::DataType;

/// Convenience result type for decode operations.
pub type IngestionResult<T> = Result<T, IngestionError>;

/// Convenience result type for single-column operators.
pub type OperationResult<T> = Result<T, OperationError>;

/// Convenience result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Convenience result type for the versioning service.
pub type VersioningResult<T> = Result<T, VersioningError>;

/// A single raw value could not be coerced into `target`.
///
/// During inference this never escapes: a failed coercion simply becomes a missing cell and
/// counts towards the candidate's NA count.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot parse '{raw}' as {target}")]
pub struct ParseError {
    /// The offending raw text (or rendered cell).
    pub raw: String,
    /// Human-readable name of the target kind.
    pub target: &'static str,
}

impl ParseError {
    pub(crate) fn new(raw: impl Into<String>, target: &'static str) -> Self {
        Self {
            raw: raw.into(),
            target,
        }
    }
}

/// A table would violate its shape invariants.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TableError {
    /// Two columns share a name.
    #[error("duplicate column name '{name}'")]
    DuplicateColumn { name: String },

    /// A column's length differs from the first column's length.
    #[error("column '{column}' has {actual} rows, expected {expected}")]
    LengthMismatch {
        column: String,
        expected: usize,
        actual: usize,
    },
}

/// The expression sandbox rejected or failed a script.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvaluationError {
    /// The script is not a well-formed expression.
    #[error("syntax error: {message}")]
    Syntax { message: String },

    /// The script references a name outside the allow-list.
    #[error("name '{name}' is not allowed in scripts")]
    DisallowedName { name: String },

    /// Evaluation failed for a concrete input (type errors, division by zero, ...).
    #[error("runtime error: {message}")]
    Runtime { message: String },
}

impl EvaluationError {
    pub(crate) fn runtime(message: impl Into<String>) -> Self {
        Self::Runtime {
            message: message.into(),
        }
    }
}

/// An operator could not rewrite a column.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OperationError {
    /// The target column does not exist.
    #[error("column '{column}' not found")]
    ColumnNotFound { column: String },

    /// The column's type is not supported by the operator.
    #[error("column '{column}' has unsupported type {data_type}")]
    UnsupportedColumnType { column: String, data_type: DataType },

    /// The payload value cannot be converted into the column's type.
    #[error("cannot convert fill value for column '{column}': {source}")]
    TypeConversion {
        column: String,
        #[source]
        source: ParseError,
    },

    /// The script failed to compile or failed on a cell.
    #[error("script failed on column '{column}': {source}")]
    Evaluation {
        column: String,
        #[source]
        source: EvaluationError,
    },

    /// The operation needs a payload (script text or fill value) and none was given.
    #[error("operation on column '{column}' requires a payload")]
    MissingPayload { column: String },
}

/// A whole operation failed; names the operation type and the offending column.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{operation} on column '{column}' failed: {source}")]
pub struct OperationFailure {
    pub operation: OperationType,
    pub column: String,
    #[source]
    pub source: OperationError,
}

/// Error type returned by tabular decode.
#[derive(Debug, Error)]
pub enum IngestionError {
    /// Underlying I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[cfg(feature = "excel")]
    /// Excel decode error (feature-gated behind `excel`).
    #[error("excel error: {0}")]
    Excel(#[from] calamine::Error),

    /// CSV decode error.
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    /// The declared format is not recognised (or not enabled in this build).
    #[error("unsupported format: {format}")]
    UnsupportedFormat { format: String },

    /// The input decoded but does not form a table (no header row, duplicate headers, ...).
    #[error("malformed input: {message}")]
    Malformed { message: String },

    /// The decoded columns would violate the table invariants.
    #[error("invalid table: {0}")]
    Table(#[from] TableError),
}

/// Table ⇄ JSON conversion failed.
#[derive(Debug, Error)]
pub enum InterchangeError {
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("malformed table json: {message}")]
    Malformed { message: String },

    #[error("invalid table: {0}")]
    Table(#[from] TableError),
}

/// The object store or metadata store failed.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No snapshot exists for this dataset/version pair.
    #[error("version '{version_id}' of dataset '{dataset_id}' not found")]
    NotFound {
        dataset_id: String,
        version_id: String,
    },

    /// The dataset has no metadata entry.
    #[error("dataset '{dataset_id}' not found")]
    DatasetNotFound { dataset_id: String },

    /// A dataset or version id cannot be used as a storage key.
    #[error("invalid storage key '{key}'")]
    InvalidKey { key: String },

    /// The backing store cannot serve requests right now.
    #[error("store unavailable: {message}")]
    Unavailable { message: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("snapshot encoding error: {0}")]
    Interchange(#[from] InterchangeError),
}

/// Options failed validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("threshold '{name}' must be within [0, 1], got {value}")]
    InvalidThreshold { name: &'static str, value: f64 },

    #[error("config json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// The execution engine could not be built.
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("invalid execution options: {message}")]
    InvalidOptions { message: String },

    #[error("failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// Anything the version-producing entry points can surface.
#[derive(Debug, Error)]
pub enum VersioningError {
    #[error(transparent)]
    Ingestion(#[from] IngestionError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Operation(#[from] OperationFailure),

    #[error(transparent)]
    Execution(#[from] ExecutionError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}
