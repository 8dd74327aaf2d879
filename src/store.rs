use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::data::{DataRecord, RecordPatch};
use crate::errors::ViewError;
use crate::schema::EntitySchema;
use crate::types::RecordId;

/// Where `RecordStore::append` places new records.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsertPosition {
    /// Newest first (feeds, notifications, issue lists).
    #[default]
    Head,
    /// Oldest first (logs, form submissions appended in order).
    Tail,
}

/// Monotonic id allocator; ids handed out are never reused.
#[derive(Clone, Debug)]
pub struct IdSequence {
    prefix: String,
    next: u64,
}

impl IdSequence {
    /// Start a sequence producing `"{prefix}-{n}"` from `n = 1`.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self::starting_at(prefix, 1)
    }

    pub fn starting_at(prefix: impl Into<String>, first: u64) -> Self {
        Self {
            prefix: prefix.into(),
            next: first,
        }
    }

    /// Allocate the next identifier.
    pub fn next_id(&mut self) -> RecordId {
        let id = format!("{}-{}", self.prefix, self.next);
        self.next = self.next.saturating_add(1);
        id
    }
}

/// In-memory collection of one entity type, owned by a single view.
///
/// Every record is validated against the store's schema before it is
/// committed; failed operations leave the store unchanged.
#[derive(Clone, Debug)]
pub struct RecordStore {
    schema: Arc<EntitySchema>,
    records: IndexMap<RecordId, DataRecord>,
    position: InsertPosition,
    revision: u64,
}

impl RecordStore {
    /// Create an empty store that inserts new records at the head.
    pub fn new(schema: Arc<EntitySchema>) -> Self {
        Self::with_position(schema, InsertPosition::default())
    }

    pub fn with_position(schema: Arc<EntitySchema>, position: InsertPosition) -> Self {
        Self {
            schema,
            records: IndexMap::new(),
            position,
            revision: 0,
        }
    }

    pub fn schema(&self) -> &EntitySchema {
        &self.schema
    }

    /// Shared handle to the schema.
    pub fn schema_handle(&self) -> Arc<EntitySchema> {
        Arc::clone(&self.schema)
    }

    /// Insert `record` at the configured position.
    pub fn append(&mut self, record: DataRecord) -> Result<(), ViewError> {
        if self.records.contains_key(record.id()) {
            return Err(ViewError::DuplicateId {
                id: record.id().to_string(),
            });
        }
        self.schema.validate(&record)?;
        let id = record.id().to_string();
        match self.position {
            InsertPosition::Head => {
                self.records.shift_insert(0, id.clone(), record);
            }
            InsertPosition::Tail => {
                self.records.insert(id.clone(), record);
            }
        }
        self.bump();
        debug!(entity = %self.schema.entity(), record_id = %id, "record appended");
        Ok(())
    }

    /// Append every record, stopping at the first failure.
    ///
    /// Records before the failing one stay committed.
    pub fn extend<I>(&mut self, records: I) -> Result<usize, ViewError>
    where
        I: IntoIterator<Item = DataRecord>,
    {
        let mut added = 0;
        for record in records {
            self.append(record)?;
            added += 1;
        }
        Ok(added)
    }

    /// Apply `patch` to the record with `id`; identity fields are preserved.
    pub fn update_by_id(&mut self, id: &str, patch: &RecordPatch) -> Result<&DataRecord, ViewError> {
        let Some(current) = self.records.get(id) else {
            return Err(ViewError::NotFound { id: id.to_string() });
        };
        let mut updated = current.clone();
        patch.apply_to(&mut updated);
        self.schema.validate(&updated)?;

        self.bump();
        debug!(entity = %self.schema.entity(), record_id = %id, "record updated");
        let slot = self
            .records
            .get_mut(id)
            .ok_or_else(|| ViewError::NotFound { id: id.to_string() })?;
        *slot = updated;
        Ok(slot)
    }

    /// Remove the record with `id`; absent ids are a no-op.
    pub fn remove_by_id(&mut self, id: &str) -> Option<DataRecord> {
        let removed = self.records.shift_remove(id);
        if removed.is_some() {
            self.bump();
            debug!(entity = %self.schema.entity(), record_id = %id, "record removed");
        }
        removed
    }

    pub fn get(&self, id: &str) -> Option<&DataRecord> {
        self.records.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.records.contains_key(id)
    }

    /// Snapshot of current records in store order.
    pub fn all(&self) -> Vec<DataRecord> {
        self.records.values().cloned().collect()
    }

    /// Borrowing iterator over records in store order.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = &DataRecord> + '_ {
        self.records.values()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Counter bumped on every successful mutation.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    fn bump(&mut self) {
        self.revision = self.revision.saturating_add(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn schema() -> Arc<EntitySchema> {
        Arc::new(
            EntitySchema::new("issue")
                .facet("status", "Status", ["open", "resolved"])
                .text("title", "Title"),
        )
    }

    fn issue(id: &str, status: &str) -> DataRecord {
        let ts = Utc.with_ymd_and_hms(2025, 1, 1, 9, 0, 0).unwrap();
        DataRecord::new(id, "issue", ts)
            .with_category("status", status)
            .with_text("title", format!("issue {id}"))
    }

    fn ids(store: &RecordStore) -> Vec<String> {
        store.iter().map(|record| record.id().to_string()).collect()
    }

    #[test]
    fn append_respects_insert_position() {
        let mut head = RecordStore::new(schema());
        head.append(issue("1", "open")).unwrap();
        head.append(issue("2", "open")).unwrap();
        assert_eq!(ids(&head), vec!["2", "1"]);

        let mut tail = RecordStore::with_position(schema(), InsertPosition::Tail);
        tail.append(issue("1", "open")).unwrap();
        tail.append(issue("2", "open")).unwrap();
        assert_eq!(ids(&tail), vec!["1", "2"]);
    }

    #[test]
    fn duplicate_append_fails_atomically() {
        let mut store = RecordStore::new(schema());
        store.append(issue("1", "open")).unwrap();
        let before = store.all();
        let revision = store.revision();

        let err = store.append(issue("1", "resolved")).unwrap_err();
        assert!(matches!(err, ViewError::DuplicateId { id } if id == "1"));
        assert_eq!(store.all(), before);
        assert_eq!(store.revision(), revision);
    }

    #[test]
    fn append_rejects_schema_violations() {
        let mut store = RecordStore::new(schema());
        let err = store.append(issue("1", "closed")).unwrap_err();
        assert!(matches!(err, ViewError::SchemaViolation { .. }));
        assert!(store.is_empty());
    }

    #[test]
    fn update_by_id_preserves_identity_and_validates() {
        let mut store = RecordStore::new(schema());
        store.append(issue("1", "open")).unwrap();
        let created = store.get("1").unwrap().created_at();

        let patch = RecordPatch::new().category("status", "resolved");
        let updated = store.update_by_id("1", &patch).unwrap();
        assert_eq!(updated.id(), "1");
        assert_eq!(updated.created_at(), created);
        assert_eq!(updated.category("status"), Some("resolved"));

        let bad = RecordPatch::new().category("status", "closed");
        assert!(store.update_by_id("1", &bad).is_err());
        assert_eq!(store.get("1").unwrap().category("status"), Some("resolved"));

        let missing = store.update_by_id("9", &patch).unwrap_err();
        assert!(matches!(missing, ViewError::NotFound { id } if id == "9"));
    }

    #[test]
    fn remove_by_id_is_tolerant_and_order_preserving() {
        let mut store = RecordStore::with_position(schema(), InsertPosition::Tail);
        for id in ["1", "2", "3"] {
            store.append(issue(id, "open")).unwrap();
        }
        assert!(store.remove_by_id("missing").is_none());
        assert_eq!(ids(&store), vec!["1", "2", "3"]);

        assert!(store.remove_by_id("2").is_some());
        assert_eq!(ids(&store), vec!["1", "3"]);
    }

    #[test]
    fn id_sequence_never_repeats() {
        let mut sequence = IdSequence::new("task");
        assert_eq!(sequence.next_id(), "task-1");
        assert_eq!(sequence.next_id(), "task-2");
        let mut resumed = IdSequence::starting_at("task", 40);
        assert_eq!(resumed.next_id(), "task-40");
    }
}
