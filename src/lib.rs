#![doc = include_str!("../README.md")]

/// Aggregation over filtered views: totals, breakdowns, rankings, ratios.
pub mod aggregate;
/// Injectable time source.
pub mod clock;
/// View, notification, and department configuration.
pub mod config;
/// Centralized constants used across filters, exports, and entity schemas.
pub mod constants;
/// Record envelope and partial updates.
pub mod data;
/// Date parsing and day-boundary helpers.
pub mod dates;
/// Built-in entity schemas for the dashboard screens.
pub mod entities;
/// Reusable demo runners.
pub mod example_apps;
/// Delimited-text export.
pub mod export;
/// Filter pipeline and sorting.
pub mod filter;
/// Event feeds, cancelable timers, and timed status transitions.
pub mod ingestion;
/// Notification channel and notification center.
pub mod notify;
/// Per-entity field schemas and validation.
pub mod schema;
/// Signed-in user collaborator.
pub mod session;
/// Single-entity record store.
pub mod store;
/// Shared type aliases.
pub mod types;
/// Text normalization helpers.
pub mod utils;
/// View controller tying store, filters, and summaries together.
pub mod view;

mod errors;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{Department, DepartmentRegistry, NotificationConfig, ViewConfig};
pub use data::{DataRecord, RecordPatch};
pub use errors::ViewError;
pub use export::Column;
pub use filter::{DateRange, FilterState, SortKey, SortSpec, TextSearch};
pub use ingestion::{EventSource, RecordFeed, Schedule, SimulatedSource, StatusTimeoutRule, Ticker};
pub use notify::{Notification, NotificationCenter, Notifier, Severity};
pub use schema::{EntitySchema, ValueBounds};
pub use session::{Session, StaticSession};
pub use store::{IdSequence, InsertPosition, RecordStore};
pub use types::{
    DepartmentSlug, EntityType, FacetValue, FeatureKey, FieldName, LogMessage, NotificationId,
    OwnerId, RecordId,
};
pub use view::{DerivedView, SummarySpec, ViewController, ViewSummary};
