// File: livelist-sync/src/collection.rs
// Purpose: Ordered, identity-unique set of records backing one page of a view

use serde_json::{Map, Value};

use crate::record::{Record, RecordId};

/// Records currently materialized for one view, in server order.
///
/// Identities are unique: wholesale replacement drops later duplicates and
/// insertion of an already-present identity merges instead of inserting.
#[derive(Debug, Clone)]
pub struct RecordCollection<R: Record> {
    records: Vec<R>,
}

impl<R: Record> Default for RecordCollection<R> {
    fn default() -> Self {
        Self { records: Vec::new() }
    }
}

impl<R: Record> RecordCollection<R> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace everything with a freshly fetched page.
    ///
    /// Returns how many duplicate identities were dropped.
    pub fn replace_all(&mut self, records: Vec<R>) -> usize {
        let before = records.len();
        let mut unique: Vec<R> = Vec::with_capacity(before);
        for record in records {
            if unique.iter().any(|existing| existing.id() == record.id()) {
                tracing::warn!(
                    kind = %R::KIND,
                    id = %record.id(),
                    "Dropping duplicate record identity from page response"
                );
                continue;
            }
            unique.push(record);
        }
        let dropped = before - unique.len();
        self.records = unique;
        dropped
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    /// Shallow-merge `patch` into the record with identity `id`.
    ///
    /// Returns false (and changes nothing) when the identity is absent.
    pub fn merge_into(&mut self, id: &RecordId, patch: &Map<String, Value>) -> bool {
        match self.records.iter_mut().find(|record| record.id() == id) {
            Some(record) => {
                record.merge(patch);
                true
            }
            None => false,
        }
    }

    /// Put a new record on top, keeping at most `limit` records.
    ///
    /// If the identity is already present the existing record is merged with
    /// the new one's fields and stays where it is; returns false in that case.
    pub fn prepend(&mut self, record: R, limit: Option<usize>) -> bool {
        if let Some(existing) = self.records.iter_mut().find(|r| r.id() == record.id()) {
            existing.merge(record.fields());
            return false;
        }

        self.records.insert(0, record);
        if let Some(limit) = limit {
            self.records.truncate(limit);
        }
        true
    }

    pub fn get(&self, id: &RecordId) -> Option<&R> {
        self.records.iter().find(|record| record.id() == id)
    }

    pub fn contains(&self, id: &RecordId) -> bool {
        self.get(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &R> {
        self.records.iter()
    }

    pub fn as_slice(&self) -> &[R] {
        &self.records
    }

    pub fn to_vec(&self) -> Vec<R> {
        self.records.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Transaction;
    use serde_json::json;

    fn tx(value: Value) -> Transaction {
        Transaction::from_value(value).unwrap()
    }

    #[test]
    fn test_replace_all_drops_duplicates() {
        let mut collection = RecordCollection::new();
        let dropped = collection.replace_all(vec![
            tx(json!({"uid": "A", "amount": 1})),
            tx(json!({"uid": "B", "amount": 2})),
            tx(json!({"uid": "A", "amount": 3})),
        ]);

        assert_eq!(dropped, 1);
        assert_eq!(collection.len(), 2);
        assert_eq!(collection.get(&"A".into()).unwrap().amount(), Some(1.0));
    }

    #[test]
    fn test_merge_into_missing_identity() {
        let mut collection = RecordCollection::new();
        collection.replace_all(vec![tx(json!({"uid": "A", "status": "pending"}))]);

        let patch = json!({"status": "completed"});
        assert!(!collection.merge_into(&"Z".into(), patch.as_object().unwrap()));
        assert_eq!(collection.len(), 1);
        assert_eq!(collection.get(&"A".into()).unwrap().status(), Some("pending"));
    }

    #[test]
    fn test_prepend_respects_limit() {
        let mut collection = RecordCollection::new();
        collection.replace_all(vec![tx(json!({"uid": "A"})), tx(json!({"uid": "B"}))]);

        assert!(collection.prepend(tx(json!({"uid": "C"})), Some(2)));
        let ids: Vec<_> = collection.iter().map(|r| r.id().to_string()).collect();
        assert_eq!(ids, vec!["C", "A"]);
    }

    #[test]
    fn test_prepend_existing_identity_merges() {
        let mut collection = RecordCollection::new();
        collection.replace_all(vec![
            tx(json!({"uid": "A", "status": "pending"})),
            tx(json!({"uid": "B", "status": "pending"})),
        ]);

        assert!(!collection.prepend(tx(json!({"uid": "B", "status": "completed"})), None));
        assert_eq!(collection.len(), 2);
        assert_eq!(collection.as_slice()[1].status(), Some("completed"));
    }
}
