use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::ObjectStore;
use crate::error::{StoreError, StoreResult};
use crate::interchange::{table_from_json_str, table_to_json_string};
use crate::types::Table;

/// [`ObjectStore`] writing one JSON document per snapshot under a root directory.
///
/// Snapshots live at `{root}/{dataset_id}/{version_id}.json` and use the interchange form from
/// [`crate::interchange`]. Writes go to a temporary file first and are renamed into place.
#[derive(Debug, Clone)]
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    /// Open (creating if needed) a store rooted at `root`.
    pub fn new(root: impl AsRef<Path>) -> StoreResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn snapshot_path(&self, dataset_id: &str, version_id: &str) -> StoreResult<PathBuf> {
        check_key(dataset_id)?;
        check_key(version_id)?;
        Ok(self.root.join(dataset_id).join(format!("{version_id}.json")))
    }
}

/// Ids become path components; only ASCII alphanumerics, `-` and `_` are allowed.
fn check_key(key: &str) -> StoreResult<()> {
    let valid = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidKey {
            key: key.to_string(),
        })
    }
}

impl ObjectStore for FsObjectStore {
    fn put(&self, dataset_id: &str, version_id: &str, table: &Table) -> StoreResult<()> {
        let path = self.snapshot_path(dataset_id, version_id)?;
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, table_to_json_string(table))?;
        fs::rename(&tmp, &path)?;
        debug!(path = %path.display(), rows = table.row_count(), "wrote snapshot");
        Ok(())
    }

    fn get(&self, dataset_id: &str, version_id: &str) -> StoreResult<Table> {
        let path = self.snapshot_path(dataset_id, version_id)?;
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StoreError::NotFound {
                    dataset_id: dataset_id.to_string(),
                    version_id: version_id.to_string(),
                });
            }
            Err(e) => return Err(e.into()),
        };
        Ok(table_from_json_str(&text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Column, DataType, Value};

    fn temp_root() -> PathBuf {
        std::env::temp_dir().join(format!("rdc-fs-store-{}", uuid::Uuid::new_v4()))
    }

    #[test]
    fn put_then_get_roundtrips() {
        let root = temp_root();
        let store = FsObjectStore::new(&root).unwrap();
        let table = Table::new(vec![Column::new(
            "n",
            DataType::Int64,
            vec![Some(Value::Int64(1)), None],
        )])
        .unwrap();

        store.put("ds1", "v1", &table).unwrap();
        assert!(root.join("ds1").join("v1.json").exists());
        assert_eq!(store.get("ds1", "v1").unwrap(), table);

        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn underscored_ids_do_not_share_a_snapshot() {
        let root = temp_root();
        let store = FsObjectStore::new(&root).unwrap();
        let a = Table::new(vec![Column::new("a", DataType::Int64, vec![Some(Value::Int64(1))])])
            .unwrap();
        let b = Table::new(vec![Column::new("b", DataType::Int64, vec![Some(Value::Int64(2))])])
            .unwrap();

        store.put("ds_x", "v", &a).unwrap();
        store.put("ds", "x_v", &b).unwrap();
        assert_eq!(store.get("ds_x", "v").unwrap(), a);
        assert_eq!(store.get("ds", "x_v").unwrap(), b);

        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn missing_snapshot_is_not_found() {
        let root = temp_root();
        let store = FsObjectStore::new(&root).unwrap();
        assert!(matches!(
            store.get("ds1", "nope"),
            Err(StoreError::NotFound { .. })
        ));
        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn path_like_ids_are_rejected() {
        let root = temp_root();
        let store = FsObjectStore::new(&root).unwrap();
        let table = Table::default();
        assert!(matches!(
            store.put("../escape", "v1", &table),
            Err(StoreError::InvalidKey { .. })
        ));
        let _ = fs::remove_dir_all(&root);
    }
}
