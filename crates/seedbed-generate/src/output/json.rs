use std::collections::BTreeSet;
use std::fs::{OpenOptions, create_dir_all};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::debug;

use seedbed_core::{Error, Record, RecordStore, Result};

/// Serialize `value` as pretty JSON and move it into place in one rename.
/// Returns the number of bytes written.
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<u64> {
    let data = serde_json::to_vec_pretty(value)?;
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        create_dir_all(parent)?;
    }

    let tmp_path = temp_path(path)?;
    let mut file = OpenOptions::new()
        .create(true)
        .truncate(true)
        .write(true)
        .open(&tmp_path)?;
    file.write_all(&data)?;
    file.sync_all()?;
    std::fs::rename(&tmp_path, path)?;

    Ok(data.len() as u64)
}

fn temp_path(path: &Path) -> Result<PathBuf> {
    let file_name = path.file_name().ok_or_else(|| {
        Error::Io(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("'{}' has no file name", path.display()),
        ))
    })?;
    Ok(path.with_file_name(format!("{}.tmp", file_name.to_string_lossy())))
}

/// Store writing each node to `<root>/<node>.json` with freshly assigned
/// UUIDs. A node can be uploaded once per store.
#[derive(Debug)]
pub struct DirectoryStore {
    root: PathBuf,
    written: BTreeSet<String>,
    bytes_written: u64,
}

impl DirectoryStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            written: BTreeSet::new(),
            bytes_written: 0,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn node_path(&self, node: &str) -> PathBuf {
        self.root.join(format!("{node}.json"))
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }
}

impl RecordStore for DirectoryStore {
    fn upload(&mut self, node: &str, records: &[Record]) -> Result<Vec<String>> {
        if node.is_empty()
            || !node
                .chars()
                .all(|ch| ch.is_ascii_alphanumeric() || ch == '_' || ch == '-')
        {
            return Err(Error::Store(format!(
                "node name '{node}' cannot be used as a file name"
            )));
        }
        if self.written.contains(node) {
            return Err(Error::Store(format!("node '{node}' was already uploaded")));
        }

        let mut stored = Vec::with_capacity(records.len());
        let mut assigned = Vec::with_capacity(records.len());
        for record in records {
            let id = uuid::Uuid::new_v4().to_string();
            let mut record = record.clone();
            record.id = Some(id.clone());
            stored.push(record);
            assigned.push(id);
        }

        let path = self.node_path(node);
        let bytes = write_json_atomic(&path, &stored)?;
        self.bytes_written += bytes;
        self.written.insert(node.to_string());
        debug!(node = %node, path = %path.display(), bytes, "node written");
        Ok(assigned)
    }
}

#[cfg(test)]
mod tests {
    use seedbed_core::FieldMap;

    use super::*;

    fn temp_dir() -> PathBuf {
        std::env::temp_dir().join(format!("seedbed_store_{}", uuid::Uuid::new_v4()))
    }

    #[test]
    fn directory_store_writes_one_file_per_node() {
        let root = temp_dir();
        let mut store = DirectoryStore::new(&root);
        let records = vec![Record::new("Patient", FieldMap::new())];

        let ids = store.upload("base", &records).expect("upload");
        assert_eq!(ids.len(), 1);

        let raw = std::fs::read_to_string(root.join("base.json")).expect("node file");
        let written: Vec<Record> = serde_json::from_str(&raw).expect("records");
        assert_eq!(written[0].id.as_deref(), Some(ids[0].as_str()));
        assert!(!root.join("base.json.tmp").exists());

        let err = store.upload("base", &records).unwrap_err();
        assert!(matches!(err, Error::Store(_)));

        std::fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn directory_store_rejects_path_like_nodes() {
        let mut store = DirectoryStore::new(temp_dir());
        let err = store.upload("../escape", &[]).unwrap_err();
        assert!(matches!(err, Error::Store(_)));
    }
}
