use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::record::Record;

/// Destination for generated record batches.
///
/// `upload` returns one assigned identifier per submitted record, in order.
pub trait RecordStore {
    fn upload(&mut self, node: &str, records: &[Record]) -> Result<Vec<String>>;
}

/// Store that keeps uploads in memory and assigns sequential ids per kind.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    batches: BTreeMap<String, Vec<Record>>,
    next_id: BTreeMap<String, u64>,
    capacity: Option<usize>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject uploads once the store holds `capacity` records.
    pub fn with_capacity_limit(capacity: usize) -> Self {
        Self {
            capacity: Some(capacity),
            ..Self::default()
        }
    }

    pub fn batch(&self, node: &str) -> Option<&[Record]> {
        self.batches.get(node).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.batches.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl RecordStore for InMemoryStore {
    fn upload(&mut self, node: &str, records: &[Record]) -> Result<Vec<String>> {
        if let Some(capacity) = self.capacity
            && self.len() + records.len() > capacity
        {
            return Err(Error::Store(format!(
                "capacity of {capacity} records exceeded by node '{node}'"
            )));
        }

        let mut assigned = Vec::with_capacity(records.len());
        let batch = self.batches.entry(node.to_string()).or_default();
        for record in records {
            let counter = self.next_id.entry(record.kind.clone()).or_insert(0);
            *counter += 1;
            let id = counter.to_string();
            let mut stored = record.clone();
            stored.id = Some(id.clone());
            batch.push(stored);
            assigned.push(id);
        }
        Ok(assigned)
    }
}

#[cfg(test)]
mod tests {
    use crate::record::FieldMap;

    use super::*;

    #[test]
    fn in_memory_store_assigns_sequential_ids_per_kind() {
        let mut store = InMemoryStore::new();
        let records = vec![
            Record::new("Patient", FieldMap::new()),
            Record::new("Patient", FieldMap::new()),
        ];
        let ids = store.upload("base", &records).expect("upload");
        assert_eq!(ids, vec!["1", "2"]);

        let ids = store
            .upload("more", &records[..1])
            .expect("second upload");
        assert_eq!(ids, vec!["3"]);
        assert_eq!(store.len(), 3);
        assert_eq!(
            store.batch("base").map(|batch| batch[0].id.clone()),
            Some(Some("1".to_string()))
        );
    }

    #[test]
    fn in_memory_store_enforces_capacity() {
        let mut store = InMemoryStore::with_capacity_limit(1);
        let records = vec![
            Record::new("Patient", FieldMap::new()),
            Record::new("Patient", FieldMap::new()),
        ];
        let err = store.upload("base", &records).unwrap_err();
        assert!(matches!(err, Error::Store(_)));
        assert!(store.is_empty());
    }
}
