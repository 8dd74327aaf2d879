//! Per-entity field declarations.
//!
//! A schema fixes which categorical, numeric, and text fields a record of one
//! entity type may carry. Feature screens declare a schema and bind it to the
//! shared store/filter/aggregate engine instead of re-implementing filtering.

use indexmap::IndexMap;

use crate::constants::filter::{ALL_SENTINEL, OWNER_FACET, TAGS_FIELD};
use crate::data::DataRecord;
use crate::errors::ViewError;
use crate::types::{EntityType, FacetValue, FieldName};

/// Inclusive numeric bounds enforced on a numeric field.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ValueBounds {
    pub min: f64,
    pub max: f64,
}

impl ValueBounds {
    /// Any finite value.
    pub const UNBOUNDED: ValueBounds = ValueBounds {
        min: f64::MIN,
        max: f64::MAX,
    };
    /// Finite values `>= 0` (counts, durations, amounts).
    pub const NON_NEGATIVE: ValueBounds = ValueBounds {
        min: 0.0,
        max: f64::MAX,
    };

    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Returns `true` for finite values inside `[min, max]`.
    pub fn contains(&self, value: f64) -> bool {
        value.is_finite() && value >= self.min && value <= self.max
    }

    /// Clamp `value` into range; non-finite input clamps to `min`.
    pub fn clamp(&self, value: f64) -> f64 {
        if !value.is_finite() {
            return self.min;
        }
        value.clamp(self.min, self.max)
    }
}

/// Declaration of one categorical facet.
#[derive(Clone, Debug, PartialEq)]
pub struct FacetSpec {
    /// Human-readable label (column header, dropdown caption).
    pub label: String,
    /// Declared valid values; empty means open-ended (e.g. insurer names).
    pub values: Vec<FacetValue>,
    /// Whether every record must carry this field.
    pub required: bool,
}

/// Declaration of one numeric field.
#[derive(Clone, Debug, PartialEq)]
pub struct NumericSpec {
    pub label: String,
    pub bounds: ValueBounds,
    pub required: bool,
}

/// Field schema for a single entity type.
#[derive(Clone, Debug, PartialEq)]
pub struct EntitySchema {
    entity: EntityType,
    facets: IndexMap<FieldName, FacetSpec>,
    numeric: IndexMap<FieldName, NumericSpec>,
    text: IndexMap<FieldName, String>,
}

impl EntitySchema {
    pub fn new(entity: impl Into<EntityType>) -> Self {
        Self {
            entity: entity.into(),
            facets: IndexMap::new(),
            numeric: IndexMap::new(),
            text: IndexMap::new(),
        }
    }

    /// Declare a required categorical facet restricted to `values`.
    pub fn facet<I, V>(mut self, field: &str, label: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<FacetValue>,
    {
        self.facets.insert(
            field.to_string(),
            FacetSpec {
                label: label.to_string(),
                values: values.into_iter().map(Into::into).collect(),
                required: true,
            },
        );
        self
    }

    /// Declare an optional, open-ended categorical facet.
    pub fn open_facet(mut self, field: &str, label: &str) -> Self {
        self.facets.insert(
            field.to_string(),
            FacetSpec {
                label: label.to_string(),
                values: Vec::new(),
                required: false,
            },
        );
        self
    }

    /// Declare a required numeric field with `bounds`.
    pub fn numeric(mut self, field: &str, label: &str, bounds: ValueBounds) -> Self {
        self.numeric.insert(
            field.to_string(),
            NumericSpec {
                label: label.to_string(),
                bounds,
                required: true,
            },
        );
        self
    }

    /// Declare an optional numeric field with `bounds`.
    pub fn optional_numeric(mut self, field: &str, label: &str, bounds: ValueBounds) -> Self {
        self.numeric.insert(
            field.to_string(),
            NumericSpec {
                label: label.to_string(),
                bounds,
                required: false,
            },
        );
        self
    }

    /// Declare a searchable text field.
    pub fn text(mut self, field: &str, label: &str) -> Self {
        self.text.insert(field.to_string(), label.to_string());
        self
    }

    pub fn entity(&self) -> &str {
        &self.entity
    }

    pub fn facets(&self) -> &IndexMap<FieldName, FacetSpec> {
        &self.facets
    }

    pub fn numeric_fields(&self) -> &IndexMap<FieldName, NumericSpec> {
        &self.numeric
    }

    /// Text-bearing fields searched when a caller names none explicitly.
    ///
    /// Declared text fields come first, then categorical facets, then the
    /// record owner and `tags`.
    pub fn search_fields(&self) -> Vec<FieldName> {
        let mut fields: Vec<FieldName> = self.text.keys().cloned().collect();
        fields.extend(self.facets.keys().cloned());
        fields.push(OWNER_FACET.to_string());
        fields.push(TAGS_FIELD.to_string());
        fields
    }

    /// Human-readable label for any declared field, falling back to the field name.
    pub fn label(&self, field: &str) -> String {
        if let Some(spec) = self.facets.get(field) {
            return spec.label.clone();
        }
        if let Some(spec) = self.numeric.get(field) {
            return spec.label.clone();
        }
        if let Some(label) = self.text.get(field) {
            return label.clone();
        }
        field.to_string()
    }

    /// Returns `true` when `field` is a facet (including the `owner` pseudo-facet).
    pub fn has_facet(&self, field: &str) -> bool {
        field == OWNER_FACET || self.facets.contains_key(field)
    }

    pub fn has_numeric(&self, field: &str) -> bool {
        self.numeric.contains_key(field)
    }

    /// Error unless `field` is a declared facet.
    pub fn require_facet(&self, field: &str) -> Result<(), ViewError> {
        if self.has_facet(field) {
            Ok(())
        } else {
            Err(self.unknown(field))
        }
    }

    /// Error unless `field` is a declared numeric field.
    pub fn require_numeric(&self, field: &str) -> Result<(), ViewError> {
        if self.has_numeric(field) {
            Ok(())
        } else {
            Err(self.unknown(field))
        }
    }

    /// Check a facet selection against the declared values.
    ///
    /// The `all` sentinel, the `owner` pseudo-facet, and open-ended facets
    /// accept any value.
    pub fn check_facet_value(&self, field: &str, value: &str) -> Result<(), ViewError> {
        if value == ALL_SENTINEL || field == OWNER_FACET {
            return Ok(());
        }
        let spec = self.facets.get(field).ok_or_else(|| self.unknown(field))?;
        if spec.values.is_empty() || spec.values.iter().any(|known| known == value) {
            Ok(())
        } else {
            Err(ViewError::InvalidFilterValue {
                field: field.to_string(),
                value: value.to_string(),
            })
        }
    }

    /// Validate a record against this schema.
    pub fn validate(&self, record: &DataRecord) -> Result<(), ViewError> {
        if record.entity != self.entity {
            return Err(ViewError::EntityMismatch {
                expected: self.entity.clone(),
                found: record.entity.clone(),
            });
        }
        for (field, value) in &record.categorical {
            let Some(spec) = self.facets.get(field) else {
                return Err(self.violation(record, format!("undeclared facet '{field}'")));
            };
            if !spec.values.is_empty() && !spec.values.iter().any(|known| known == value) {
                return Err(self.violation(
                    record,
                    format!("value '{value}' is not declared for facet '{field}'"),
                ));
            }
        }
        for (field, spec) in &self.facets {
            if spec.required && !record.categorical.contains_key(field) {
                return Err(self.violation(record, format!("missing facet '{field}'")));
            }
        }
        for (field, value) in &record.numeric {
            let Some(spec) = self.numeric.get(field) else {
                return Err(self.violation(record, format!("undeclared numeric field '{field}'")));
            };
            if !spec.bounds.contains(*value) {
                return Err(ViewError::OutOfBounds {
                    field: field.clone(),
                    value: *value,
                    min: spec.bounds.min,
                    max: spec.bounds.max,
                });
            }
        }
        for (field, spec) in &self.numeric {
            if spec.required && !record.numeric.contains_key(field) {
                return Err(self.violation(record, format!("missing numeric field '{field}'")));
            }
        }
        for field in record.text.keys() {
            if !self.text.contains_key(field) {
                return Err(self.violation(record, format!("undeclared text field '{field}'")));
            }
        }
        Ok(())
    }

    fn unknown(&self, field: &str) -> ViewError {
        ViewError::UnknownField {
            entity: self.entity.clone(),
            field: field.to_string(),
        }
    }

    fn violation(&self, record: &DataRecord, details: String) -> ViewError {
        ViewError::SchemaViolation {
            id: record.id().to_string(),
            details,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn issue_schema() -> EntitySchema {
        EntitySchema::new("issue")
            .facet("status", "Status", ["open", "investigating", "resolved"])
            .open_facet("channel", "Channel")
            .optional_numeric("hours", "Hours", ValueBounds::NON_NEGATIVE)
            .text("title", "Title")
    }

    fn issue(id: &str) -> DataRecord {
        DataRecord::new(id, "issue", Utc::now())
            .with_category("status", "open")
            .with_text("title", "Sync failure")
    }

    #[test]
    fn validate_accepts_declared_fields() {
        let schema = issue_schema();
        let record = issue("1")
            .with_category("channel", "#ops")
            .with_number("hours", 2.0);
        schema.validate(&record).unwrap();
    }

    #[test]
    fn validate_rejects_wrong_entity_and_undeclared_values() {
        let schema = issue_schema();
        let other = DataRecord::new("1", "task", Utc::now());
        assert!(matches!(
            schema.validate(&other),
            Err(ViewError::EntityMismatch { .. })
        ));

        let bad_status = issue("2").with_category("status", "closed");
        assert!(matches!(
            schema.validate(&bad_status),
            Err(ViewError::SchemaViolation { details, .. }) if details.contains("closed")
        ));

        let missing_status = DataRecord::new("3", "issue", Utc::now());
        assert!(matches!(
            schema.validate(&missing_status),
            Err(ViewError::SchemaViolation { details, .. }) if details.contains("missing facet")
        ));
    }

    #[test]
    fn validate_enforces_numeric_bounds() {
        let schema = issue_schema();
        let negative = issue("1").with_number("hours", -1.0);
        assert!(matches!(
            schema.validate(&negative),
            Err(ViewError::OutOfBounds { field, .. }) if field == "hours"
        ));
        let nan = issue("2").with_number("hours", f64::NAN);
        assert!(schema.validate(&nan).is_err());
    }

    #[test]
    fn check_facet_value_honours_sentinel_and_open_facets() {
        let schema = issue_schema();
        schema.check_facet_value("status", "all").unwrap();
        schema.check_facet_value("status", "resolved").unwrap();
        schema.check_facet_value("channel", "#anything").unwrap();
        schema.check_facet_value("owner", "sophie").unwrap();
        assert!(matches!(
            schema.check_facet_value("status", "closed"),
            Err(ViewError::InvalidFilterValue { .. })
        ));
        assert!(matches!(
            schema.check_facet_value("priority", "high"),
            Err(ViewError::UnknownField { .. })
        ));
    }

    #[test]
    fn search_fields_list_text_then_facets_then_owner_and_tags() {
        let schema = issue_schema();
        assert_eq!(
            schema.search_fields(),
            vec!["title", "status", "channel", "owner", "tags"]
        );
        assert_eq!(schema.label("status"), "Status");
        assert_eq!(schema.label("unknown"), "unknown");
    }

    #[test]
    fn bounds_clamp_and_contain() {
        let bounds = ValueBounds::new(0.0, 100.0);
        assert_eq!(bounds.clamp(150.0), 100.0);
        assert_eq!(bounds.clamp(-3.0), 0.0);
        assert_eq!(bounds.clamp(f64::INFINITY), 0.0);
        assert!(bounds.contains(100.0));
        assert!(!bounds.contains(100.5));
    }
}
