//! Storage collaborators: table snapshots and version metadata.
//!
//! - [`ObjectStore`] keeps one immutable [`Table`] snapshot per `(dataset_id, version_id)`.
//! - [`MetadataStore`] keeps an append-only list of [`VersionRecord`]s per dataset; only the
//!   status of a record ever changes.
//!
//! Both are traits so callers can plug in their own backends. In-memory implementations are
//! provided for tests and embedding, plus a filesystem object store that writes the JSON
//! interchange form.

mod fs;
mod memory;

pub use fs::FsObjectStore;
pub use memory::{MemoryMetadataStore, MemoryObjectStore};

use std::fmt;
use std::sync::PoisonError;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};
use crate::processing::Operation;
use crate::types::Table;

/// Snapshot storage keyed by dataset and version.
pub trait ObjectStore: Send + Sync {
    /// Store `table` as the snapshot for `(dataset_id, version_id)`, replacing any previous one.
    fn put(&self, dataset_id: &str, version_id: &str, table: &Table) -> StoreResult<()>;

    /// Load the snapshot for `(dataset_id, version_id)`.
    ///
    /// Fails with [`StoreError::NotFound`] when no snapshot exists.
    fn get(&self, dataset_id: &str, version_id: &str) -> StoreResult<Table>;
}

/// Append-only version bookkeeping.
pub trait MetadataStore: Send + Sync {
    /// Register a dataset with an empty version list. Registering twice is a no-op.
    fn create_dataset(&self, dataset_id: &str) -> StoreResult<()>;

    /// Append `record` to the dataset's version list.
    fn append_version(&self, dataset_id: &str, record: VersionRecord) -> StoreResult<()>;

    /// Set the status of an existing version.
    fn update_status(
        &self,
        dataset_id: &str,
        version_id: &str,
        status: ProcessStatus,
    ) -> StoreResult<()>;

    /// All versions of a dataset, in append order.
    fn versions(&self, dataset_id: &str) -> StoreResult<Vec<VersionRecord>>;
}

/// Lifecycle of a version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessStatus {
    Processing,
    Processed,
    Failed,
}

impl ProcessStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessStatus::Processing => "processing",
            ProcessStatus::Processed => "processed",
            ProcessStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for ProcessStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of a dataset's version list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionRecord {
    pub version_id: String,
    /// The version this one was derived from; `None` for the ingested version.
    pub base_version: Option<String>,
    /// The operation that produced this version; `None` for the ingested version.
    pub operation: Option<Operation>,
    pub status: ProcessStatus,
    pub created_at: DateTime<Utc>,
}

impl VersionRecord {
    pub fn new(
        version_id: impl Into<String>,
        base_version: Option<String>,
        operation: Option<Operation>,
        status: ProcessStatus,
    ) -> Self {
        Self {
            version_id: version_id.into(),
            base_version,
            operation,
            status,
            created_at: Utc::now(),
        }
    }
}

pub(crate) fn poisoned<T>(_: PoisonError<T>) -> StoreError {
    StoreError::Unavailable {
        message: "store lock poisoned".to_string(),
    }
}
