//! Column type inference.
//!
//! Raw tables arrive with every column tagged [`crate::types::DataType::Utf8`] (or `Mixed` for
//! spreadsheet sources). [`infer_column`] decides a single semantic type per column from a ranked
//! table of trial coercions; [`infer_table`] applies it to every column sequentially. The
//! parallel path lives on [`crate::execution::ExecutionEngine`].

mod candidate;
pub mod coerce;
mod column;
mod table;

pub use candidate::CandidateKind;
pub use coerce::DateParser;
pub use column::infer_column;
pub use table::infer_table;
