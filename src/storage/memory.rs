use std::collections::HashMap;
use std::sync::RwLock;

use super::{poisoned, MetadataStore, ObjectStore, ProcessStatus, VersionRecord};
use crate::error::{StoreError, StoreResult};
use crate::types::Table;

/// In-memory [`ObjectStore`].
#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    tables: RwLock<HashMap<(String, String), Table>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored snapshots.
    pub fn len(&self) -> usize {
        self.tables.read().map(|t| t.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ObjectStore for MemoryObjectStore {
    fn put(&self, dataset_id: &str, version_id: &str, table: &Table) -> StoreResult<()> {
        self.tables
            .write()
            .map_err(poisoned)?
            .insert((dataset_id.to_string(), version_id.to_string()), table.clone());
        Ok(())
    }

    fn get(&self, dataset_id: &str, version_id: &str) -> StoreResult<Table> {
        self.tables
            .read()
            .map_err(poisoned)?
            .get(&(dataset_id.to_string(), version_id.to_string()))
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                dataset_id: dataset_id.to_string(),
                version_id: version_id.to_string(),
            })
    }
}

/// In-memory [`MetadataStore`].
#[derive(Debug, Default)]
pub struct MemoryMetadataStore {
    datasets: RwLock<HashMap<String, Vec<VersionRecord>>>,
}

impl MemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MetadataStore for MemoryMetadataStore {
    fn create_dataset(&self, dataset_id: &str) -> StoreResult<()> {
        self.datasets
            .write()
            .map_err(poisoned)?
            .entry(dataset_id.to_string())
            .or_default();
        Ok(())
    }

    fn append_version(&self, dataset_id: &str, record: VersionRecord) -> StoreResult<()> {
        let mut datasets = self.datasets.write().map_err(poisoned)?;
        let versions = datasets
            .get_mut(dataset_id)
            .ok_or_else(|| StoreError::DatasetNotFound {
                dataset_id: dataset_id.to_string(),
            })?;
        versions.push(record);
        Ok(())
    }

    fn update_status(
        &self,
        dataset_id: &str,
        version_id: &str,
        status: ProcessStatus,
    ) -> StoreResult<()> {
        let mut datasets = self.datasets.write().map_err(poisoned)?;
        let versions = datasets
            .get_mut(dataset_id)
            .ok_or_else(|| StoreError::DatasetNotFound {
                dataset_id: dataset_id.to_string(),
            })?;
        let record = versions
            .iter_mut()
            .find(|r| r.version_id == version_id)
            .ok_or_else(|| StoreError::NotFound {
                dataset_id: dataset_id.to_string(),
                version_id: version_id.to_string(),
            })?;
        record.status = status;
        Ok(())
    }

    fn versions(&self, dataset_id: &str) -> StoreResult<Vec<VersionRecord>> {
        self.datasets
            .read()
            .map_err(poisoned)?
            .get(dataset_id)
            .cloned()
            .ok_or_else(|| StoreError::DatasetNotFound {
                dataset_id: dataset_id.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processing::{Operation, OperationType};

    #[test]
    fn object_store_get_missing_is_not_found() {
        let store = MemoryObjectStore::new();
        assert!(matches!(
            store.get("d", "v"),
            Err(StoreError::NotFound { .. })
        ));
        let table = Table::from_text_columns(vec![("a", vec![Some("1")])]).unwrap();
        store.put("d", "v", &table).unwrap();
        assert_eq!(store.get("d", "v").unwrap(), table);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn metadata_is_append_only_with_mutable_status() {
        let store = MemoryMetadataStore::new();
        assert!(matches!(
            store.append_version("d", VersionRecord::new("v0", None, None, ProcessStatus::Processed)),
            Err(StoreError::DatasetNotFound { .. })
        ));

        store.create_dataset("d").unwrap();
        store
            .append_version("d", VersionRecord::new("v0", None, None, ProcessStatus::Processed))
            .unwrap();
        let op = Operation::new(OperationType::CastToString, "a");
        store
            .append_version(
                "d",
                VersionRecord::new("v1", Some("v0".into()), Some(op), ProcessStatus::Processing),
            )
            .unwrap();
        store.update_status("d", "v1", ProcessStatus::Failed).unwrap();

        let versions = store.versions("d").unwrap();
        let ids: Vec<&str> = versions.iter().map(|r| r.version_id.as_str()).collect();
        assert_eq!(ids, vec!["v0", "v1"]);
        assert_eq!(versions[1].status, ProcessStatus::Failed);
        assert!(matches!(
            store.update_status("d", "v9", ProcessStatus::Processed),
            Err(StoreError::NotFound { .. })
        ));
    }

    #[test]
    fn create_dataset_twice_keeps_versions() {
        let store = MemoryMetadataStore::new();
        store.create_dataset("d").unwrap();
        store
            .append_version("d", VersionRecord::new("v0", None, None, ProcessStatus::Processed))
            .unwrap();
        store.create_dataset("d").unwrap();
        assert_eq!(store.versions("d").unwrap().len(), 1);
    }
}
