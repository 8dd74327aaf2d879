use std::io;

use thiserror::Error;

use crate::types::{EntityType, FacetValue, FieldName, RecordId};

/// Error type for record store, schema, configuration, and export failures.
#[derive(Debug, Error)]
pub enum ViewError {
    #[error("record '{id}' already exists")]
    DuplicateId { id: RecordId },
    #[error("record '{id}' not found")]
    NotFound { id: RecordId },
    #[error("value '{value}' is not declared for facet '{field}'")]
    InvalidFilterValue { field: FieldName, value: FacetValue },
    #[error("entity '{entity}' has no field named '{field}'")]
    UnknownField { entity: EntityType, field: FieldName },
    #[error("record store holds '{expected}' records, got '{found}'")]
    EntityMismatch {
        expected: EntityType,
        found: EntityType,
    },
    #[error("record '{id}' violates its schema: {details}")]
    SchemaViolation { id: RecordId, details: String },
    #[error("value {value} for '{field}' is outside [{min}, {max}]")]
    OutOfBounds {
        field: FieldName,
        value: f64,
        min: f64,
        max: f64,
    },
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("export failed: {0}")]
    Export(String),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
