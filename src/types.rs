/// Unique record identifier (assigned once, never reused).
/// Examples: `metric-001`, `issue-42`, `7`
pub type RecordId = String;
/// Name of the entity type a record store holds.
/// Examples: `metric_entry`, `task`, `issue`
pub type EntityType = String;
/// Name of a categorical, numeric, or text field on a record.
/// Examples: `status`, `priority`, `value`, `title`
pub type FieldName = String;
/// Value of a categorical field, also used as a facet selection.
/// Examples: `open`, `resolved`, `Uganda`
pub type FacetValue = String;
/// Identifier of a team member referenced by records (lookup only).
/// Examples: `sophie`, `emmanuel`
pub type OwnerId = String;
/// Key of a department feature toggle.
/// Examples: `metrics`, `goals`, `claims`
pub type FeatureKey = String;
/// URL-style department identifier.
/// Examples: `dataops`, `finance`, `customer-success`
pub type DepartmentSlug = String;
/// Identifier assigned to a notification by the notification center.
pub type NotificationId = u64;
/// Human-readable notification or log message text.
/// Examples: `New data from Uganda`, `export failed: permission denied`
pub type LogMessage = String;
