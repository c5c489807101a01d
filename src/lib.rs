//! `rust-data-cleaning` turns raw tabular uploads into typed, versioned tables.
//!
//! Every decoded value starts out as text (CSV) or as a loosely typed spreadsheet cell (Excel).
//! The crate infers a semantic type for each column, then applies user-requested operations
//! (casts, null-filling, sandboxed per-cell scripts) that each produce a new table version.
//!
//! ## Pipeline
//!
//! 1. [`ingestion::decode`]: bytes + declared format → raw [`types::Table`]
//! 2. [`inference::infer_table`] (or [`execution::ExecutionEngine::infer_table`] on a worker
//!    pool): raw table → typed table
//! 3. [`processing::apply_operation`]: typed table + [`processing::Operation`] → new table
//! 4. [`storage`] + [`versioning::DatasetService`]: snapshots and version bookkeeping
//!
//! ## Column inference
//!
//! A raw column is coerced four ways (integer, boolean, date, duration). The first attempt whose
//! fraction of missing cells stays under its threshold wins, in that order. Otherwise a
//! low-cardinality column is tagged categorical; otherwise the attempt with the fewest missing
//! cells wins if it is under the fallback threshold; otherwise the column is left as it was.
//! Thresholds live in [`config::InferenceOptions`].
//!
//! ```rust
//! use rust_data_cleaning::config::InferenceOptions;
//! use rust_data_cleaning::inference::infer_column;
//! use rust_data_cleaning::types::{Column, DataType, Value};
//!
//! let raw = Column::from_text("flag", ["true", "false", "yes", "no", "t"].map(Some));
//! let typed = infer_column(&raw, &InferenceOptions::default());
//! assert_eq!(typed.data_type, DataType::Bool);
//! assert_eq!(typed.values[2], Some(Value::Bool(true)));
//! ```
//!
//! ## Operations
//!
//! ```rust
//! use rust_data_cleaning::processing::{apply_operation, Operation};
//! use rust_data_cleaning::types::{Table, Value};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let table = Table::from_text_columns(vec![("email", vec![Some("bguzman@example.org")])])?;
//! let out = apply_operation(&table, &Operation::apply_script("email", "x.split('@')[0]"))?;
//! assert_eq!(out.column("email").unwrap().values[0], Some(Value::text("bguzman")));
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`types`]: table, column, cell and schema types
//! - [`inference`]: per-column type inference and the sequential table path
//! - [`execution`]: parallel table inference with throttling, observers and metrics
//! - [`sandbox`]: the restricted expression language used by `apply_script`
//! - [`processing`]: column operators and the operation descriptor
//! - [`ingestion`]: CSV and (feature `excel`) XLS/XLSX decode
//! - [`interchange`]: Table ⇄ JSON
//! - [`storage`], [`versioning`]: snapshot/metadata stores and the dataset service
//! - [`config`], [`error`]: options and error types

pub mod config;
pub mod error;
pub mod execution;
pub mod inference;
pub mod ingestion;
pub mod interchange;
pub mod processing;
pub mod sandbox;
pub mod storage;
pub mod types;
pub mod versioning;

pub use config::InferenceOptions;
pub use error::{
    EvaluationError, IngestionError, IngestionResult, OperationError, OperationFailure,
    StoreError, VersioningError,
};
pub use types::{Cell, Column, DataType, Table, Value};
