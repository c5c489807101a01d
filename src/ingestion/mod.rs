//! Tabular decode: raw bytes in, raw [`crate::types::Table`] out.
//!
//! Most callers should use [`decode`] (from [`unified`]) which:
//!
//! - dispatches on the declared [`TabularFormat`]
//! - produces raw columns (text for CSV, native cells for Excel) ready for inference
//! - optionally reports success/failure/alerts to an [`IngestionObserver`]
//!
//! Format-specific functions are also available under:
//! - [`csv`]
//! - `excel` (feature `excel`)

pub mod csv;
#[cfg(feature = "excel")]
pub mod excel;
pub mod observability;
pub mod unified;

pub use observability::{
    CompositeObserver, IngestionContext, IngestionObserver, IngestionSeverity, IngestionStats,
    TracingObserver,
};
pub use unified::{decode, decode_from_path, ExcelSheetSelection, IngestionOptions, TabularFormat};
