//! Version-producing entry points.
//!
//! [`DatasetService`] ties the pieces together:
//!
//! - [`DatasetService::ingest`]: decode → infer → store the first version
//! - [`DatasetService::apply`]: load a version → apply one [`Operation`] → store a new version
//!
//! Every produced version is recorded in the [`MetadataStore`]. An operation's record is
//! appended as `processing` before any work happens and ends as `processed` or `failed`; a
//! failed operation never touches its base version.

use tracing::{info, warn};
use uuid::Uuid;

use crate::config::InferenceOptions;
use crate::error::{StoreError, VersioningResult};
use crate::execution::{ExecutionEngine, ExecutionOptions};
use crate::inference::{self, DateParser};
use crate::ingestion::{decode, IngestionOptions, TabularFormat};
use crate::processing::{apply_operation_with, Operation};
use crate::storage::{MetadataStore, ObjectStore, ProcessStatus, VersionRecord};
use crate::types::Table;

/// Options for [`DatasetService`].
#[derive(Debug, Clone, Default)]
pub struct ServiceOptions {
    pub inference: InferenceOptions,
    /// Run table inference on a worker pool; `None` infers sequentially.
    pub parallel_inference: Option<ExecutionOptions>,
    pub ingestion: IngestionOptions,
}

/// Identifies one stored version of one dataset.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VersionHandle {
    pub dataset_id: String,
    pub version_id: String,
}

/// Ingests datasets and derives new versions from them.
pub struct DatasetService<O, M> {
    objects: O,
    metadata: M,
    inference: InferenceOptions,
    ingestion: IngestionOptions,
    engine: Option<ExecutionEngine>,
}

impl<O: ObjectStore, M: MetadataStore> DatasetService<O, M> {
    /// Validates the inference thresholds and builds the worker pool if one is requested.
    pub fn new(objects: O, metadata: M, options: ServiceOptions) -> VersioningResult<Self> {
        options.inference.validate()?;
        let engine = options
            .parallel_inference
            .map(ExecutionEngine::new)
            .transpose()?;
        Ok(Self {
            objects,
            metadata,
            inference: options.inference,
            ingestion: options.ingestion,
            engine,
        })
    }

    pub fn objects(&self) -> &O {
        &self.objects
    }

    pub fn metadata(&self) -> &M {
        &self.metadata
    }

    /// Infer a table with the configured path (parallel when an engine is present).
    pub fn infer(&self, table: &Table) -> Table {
        match &self.engine {
            Some(engine) => engine.infer_table(table, &self.inference),
            None => inference::infer_table(table, &self.inference),
        }
    }

    /// Decode `bytes`, infer column types and store the result as a new dataset's first version.
    pub fn ingest(&self, bytes: &[u8], format: TabularFormat) -> VersioningResult<VersionHandle> {
        let raw = decode(bytes, format, &self.ingestion)?;
        let typed = self.infer(&raw);

        let handle = VersionHandle {
            dataset_id: new_id(),
            version_id: new_id(),
        };
        self.objects
            .put(&handle.dataset_id, &handle.version_id, &typed)?;
        self.metadata.create_dataset(&handle.dataset_id)?;
        self.metadata.append_version(
            &handle.dataset_id,
            VersionRecord::new(&handle.version_id, None, None, ProcessStatus::Processed),
        )?;

        info!(
            dataset_id = %handle.dataset_id,
            version_id = %handle.version_id,
            %format,
            rows = typed.row_count(),
            columns = typed.column_count(),
            "ingested dataset"
        );
        Ok(handle)
    }

    /// Apply `operation` to `base_version` and store the result as a new version.
    ///
    /// The base version must exist and be `processed`. On failure the new version is marked
    /// `failed` and the error is returned unchanged.
    pub fn apply(
        &self,
        dataset_id: &str,
        base_version: &str,
        operation: &Operation,
    ) -> VersioningResult<VersionHandle> {
        self.require_processed(dataset_id, base_version)?;

        let version_id = new_id();
        self.metadata.append_version(
            dataset_id,
            VersionRecord::new(
                &version_id,
                Some(base_version.to_string()),
                Some(operation.clone()),
                ProcessStatus::Processing,
            ),
        )?;
        info!(
            dataset_id,
            base_version,
            %version_id,
            operation = %operation.operation_type,
            column = %operation.column,
            "processing operation"
        );

        match self.derive(dataset_id, base_version, &version_id, operation) {
            Ok(()) => {
                self.metadata
                    .update_status(dataset_id, &version_id, ProcessStatus::Processed)?;
                info!(dataset_id, %version_id, "version processed");
                Ok(VersionHandle {
                    dataset_id: dataset_id.to_string(),
                    version_id,
                })
            }
            Err(err) => {
                warn!(dataset_id, %version_id, error = %err, "operation failed");
                if let Err(mark_err) =
                    self.metadata
                        .update_status(dataset_id, &version_id, ProcessStatus::Failed)
                {
                    warn!(dataset_id, %version_id, error = %mark_err, "could not mark version failed");
                }
                Err(err)
            }
        }
    }

    /// Apply several operations in sequence, each on the version the previous one produced.
    ///
    /// Stops at the first failure; versions produced before it stay `processed`.
    pub fn apply_all(
        &self,
        dataset_id: &str,
        base_version: &str,
        operations: &[Operation],
    ) -> VersioningResult<VersionHandle> {
        let mut current = VersionHandle {
            dataset_id: dataset_id.to_string(),
            version_id: base_version.to_string(),
        };
        for op in operations {
            current = self.apply(dataset_id, &current.version_id, op)?;
        }
        Ok(current)
    }

    /// Load the snapshot of a version.
    pub fn get_version(&self, dataset_id: &str, version_id: &str) -> VersioningResult<Table> {
        Ok(self.objects.get(dataset_id, version_id)?)
    }

    /// The dataset's version list, in creation order.
    pub fn versions(&self, dataset_id: &str) -> VersioningResult<Vec<VersionRecord>> {
        Ok(self.metadata.versions(dataset_id)?)
    }

    /// The most recently created `processed` version.
    pub fn latest_version(&self, dataset_id: &str) -> VersioningResult<Option<VersionRecord>> {
        Ok(self
            .metadata
            .versions(dataset_id)?
            .into_iter()
            .rev()
            .find(|r| r.status == ProcessStatus::Processed))
    }

    fn derive(
        &self,
        dataset_id: &str,
        base_version: &str,
        version_id: &str,
        operation: &Operation,
    ) -> VersioningResult<()> {
        let base = self.objects.get(dataset_id, base_version)?;
        let dates = DateParser::new(self.inference.day_first);
        let derived = apply_operation_with(&base, operation, &dates)?;
        self.objects.put(dataset_id, version_id, &derived)?;
        Ok(())
    }

    fn require_processed(&self, dataset_id: &str, version_id: &str) -> VersioningResult<()> {
        let processed = self
            .metadata
            .versions(dataset_id)?
            .iter()
            .any(|r| r.version_id == version_id && r.status == ProcessStatus::Processed);
        if processed {
            Ok(())
        } else {
            Err(StoreError::NotFound {
                dataset_id: dataset_id.to_string(),
                version_id: version_id.to_string(),
            }
            .into())
        }
    }
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}
