use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::constants::filter::{OWNER_FACET, TAGS_FIELD};

pub use crate::types::{EntityType, FacetValue, FieldName, OwnerId, RecordId};

/// Canonical record envelope shared by every entity type.
///
/// `id` and `created_at` are fixed at construction; every other field may be
/// changed through a [`RecordPatch`] applied by the record store.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DataRecord {
    id: RecordId,
    /// Entity type this record belongs to (one schema per type).
    pub entity: EntityType,
    /// Point in time the record pertains to (date-range filtering, default sort).
    pub timestamp: DateTime<Utc>,
    created_at: DateTime<Utc>,
    /// Weak reference to the team member the record belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<OwnerId>,
    /// Categorical fields used as equality facets.
    #[serde(default)]
    pub categorical: IndexMap<FieldName, FacetValue>,
    /// Numeric fields used by the aggregator.
    #[serde(default)]
    pub numeric: IndexMap<FieldName, f64>,
    /// Free-text fields used by text search and export.
    #[serde(default)]
    pub text: IndexMap<FieldName, String>,
    /// Free-form labels (searchable through the `tags` pseudo-field).
    #[serde(default)]
    pub tags: Vec<String>,
}

impl DataRecord {
    /// Create a record of `entity` pertaining to `timestamp`.
    ///
    /// The creation time defaults to `timestamp`; use [`DataRecord::created`]
    /// when the two differ.
    pub fn new(
        id: impl Into<RecordId>,
        entity: impl Into<EntityType>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            entity: entity.into(),
            timestamp,
            created_at: timestamp,
            owner: None,
            categorical: IndexMap::new(),
            numeric: IndexMap::new(),
            text: IndexMap::new(),
            tags: Vec::new(),
        }
    }

    /// Override the creation time recorded at construction.
    pub fn created(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    pub fn with_owner(mut self, owner: impl Into<OwnerId>) -> Self {
        self.owner = Some(owner.into());
        self
    }

    pub fn with_category(mut self, field: impl Into<FieldName>, value: impl Into<FacetValue>) -> Self {
        self.categorical.insert(field.into(), value.into());
        self
    }

    pub fn with_number(mut self, field: impl Into<FieldName>, value: f64) -> Self {
        self.numeric.insert(field.into(), value);
        self
    }

    pub fn with_text(mut self, field: impl Into<FieldName>, value: impl Into<String>) -> Self {
        self.text.insert(field.into(), value.into());
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Stable record identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Creation time fixed at construction.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Categorical value for `field`, if present.
    pub fn category(&self, field: &str) -> Option<&str> {
        self.categorical.get(field).map(String::as_str)
    }

    /// Numeric value for `field`, if present.
    pub fn number(&self, field: &str) -> Option<f64> {
        self.numeric.get(field).copied()
    }

    /// Facet value for `field`; the `owner` pseudo-field resolves to the owner reference.
    pub fn facet_value(&self, field: &str) -> Option<&str> {
        if field == OWNER_FACET {
            return self.owner.as_deref();
        }
        self.category(field)
    }

    /// Text rendering of `field` for search and export.
    ///
    /// Resolution order: text fields, categorical fields, numeric fields, then the
    /// `tags` and `owner` pseudo-fields.
    pub fn field_text(&self, field: &str) -> Option<String> {
        if let Some(text) = self.text.get(field) {
            return Some(text.clone());
        }
        if let Some(value) = self.categorical.get(field) {
            return Some(value.clone());
        }
        if let Some(value) = self.numeric.get(field) {
            return Some(format_number(*value));
        }
        match field {
            TAGS_FIELD if !self.tags.is_empty() => Some(self.tags.join("; ")),
            OWNER_FACET => self.owner.clone(),
            _ => None,
        }
    }
}

/// Partial update applied by `RecordStore::update_by_id`.
///
/// Identity (`id`, `entity`, `created_at`) is not patchable.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RecordPatch {
    /// Replacement timestamp.
    pub timestamp: Option<DateTime<Utc>>,
    /// Replacement owner (`Some(None)` clears it).
    pub owner: Option<Option<OwnerId>>,
    /// Categorical fields to set.
    pub categorical: IndexMap<FieldName, FacetValue>,
    /// Numeric fields to set.
    pub numeric: IndexMap<FieldName, f64>,
    /// Text fields to set.
    pub text: IndexMap<FieldName, String>,
    /// Replacement tag list.
    pub tags: Option<Vec<String>>,
}

impl RecordPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn category(mut self, field: impl Into<FieldName>, value: impl Into<FacetValue>) -> Self {
        self.categorical.insert(field.into(), value.into());
        self
    }

    pub fn number(mut self, field: impl Into<FieldName>, value: f64) -> Self {
        self.numeric.insert(field.into(), value);
        self
    }

    pub fn text(mut self, field: impl Into<FieldName>, value: impl Into<String>) -> Self {
        self.text.insert(field.into(), value.into());
        self
    }

    pub fn owner(mut self, owner: Option<OwnerId>) -> Self {
        self.owner = Some(owner);
        self
    }

    pub fn timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn tags(mut self, tags: Vec<String>) -> Self {
        self.tags = Some(tags);
        self
    }

    /// Returns `true` when applying the patch would change nothing.
    pub fn is_empty(&self) -> bool {
        self.timestamp.is_none()
            && self.owner.is_none()
            && self.categorical.is_empty()
            && self.numeric.is_empty()
            && self.text.is_empty()
            && self.tags.is_none()
    }

    /// Apply onto `record`, leaving identity untouched.
    pub(crate) fn apply_to(&self, record: &mut DataRecord) {
        if let Some(timestamp) = self.timestamp {
            record.timestamp = timestamp;
        }
        if let Some(owner) = &self.owner {
            record.owner = owner.clone();
        }
        for (field, value) in &self.categorical {
            record.categorical.insert(field.clone(), value.clone());
        }
        for (field, value) in &self.numeric {
            record.numeric.insert(field.clone(), *value);
        }
        for (field, value) in &self.text {
            record.text.insert(field.clone(), value.clone());
        }
        if let Some(tags) = &self.tags {
            record.tags = tags.clone();
        }
    }
}

/// Render a number without a trailing `.0` for integral values.
pub fn format_number(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}
