use std::fs;
use std::path::Path;
use std::time::Duration;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::constants::notify::{AUTO_DISMISS_SECS, RETENTION, VISIBLE_LIMIT};
use crate::entities;
use crate::errors::ViewError;
use crate::filter::SortSpec;
use crate::schema::EntitySchema;
use crate::store::InsertPosition;
use crate::types::{DepartmentSlug, FeatureKey};

/// Controls how notifications are retained and displayed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NotificationConfig {
    /// Age after which a notification drops out of the visible list.
    pub auto_dismiss: Duration,
    /// Number of most-recent notifications shown at once.
    pub visible_limit: usize,
    /// Number of notifications kept in history.
    pub retention: usize,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            auto_dismiss: Duration::from_secs(AUTO_DISMISS_SECS),
            visible_limit: VISIBLE_LIMIT,
            retention: RETENTION,
        }
    }
}

/// Top-level view configuration.
#[derive(Clone, Debug)]
pub struct ViewConfig {
    /// Where appended records land in insertion order.
    pub insert_position: InsertPosition,
    /// Reject facet selections outside the declared values instead of
    /// logging a warning and showing an empty result.
    pub strict_facets: bool,
    /// Ordering applied after filtering.
    pub default_sort: SortSpec,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            insert_position: InsertPosition::Head,
            strict_facets: false,
            default_sort: SortSpec::newest_first(),
        }
    }
}

/// One department and the features it exposes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Department {
    /// URL-style identifier (`dataops`, `customer-success`).
    pub slug: DepartmentSlug,
    /// Display name.
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Feature toggles keyed by feature (`metrics`, `goals`, `claims`, ...).
    #[serde(default)]
    pub features_enabled: IndexMap<FeatureKey, bool>,
    /// Metric-type labels valid for this department's metric entries.
    #[serde(default)]
    pub metric_types: Vec<String>,
}

impl Department {
    pub fn is_enabled(&self, feature: &str) -> bool {
        self.features_enabled.get(feature).copied().unwrap_or(false)
    }
}

#[derive(Deserialize)]
struct RegistryFile {
    departments: Vec<Department>,
}

/// Department registry passed explicitly to the views that need it.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct DepartmentRegistry {
    departments: IndexMap<DepartmentSlug, Department>,
}

impl DepartmentRegistry {
    /// Build a registry, rejecting duplicate slugs and blank names.
    pub fn new(departments: Vec<Department>) -> Result<Self, ViewError> {
        let mut by_slug = IndexMap::with_capacity(departments.len());
        for department in departments {
            if department.slug.trim().is_empty() {
                return Err(ViewError::Configuration(
                    "department slug must not be empty".to_string(),
                ));
            }
            if department.name.trim().is_empty() {
                return Err(ViewError::Configuration(format!(
                    "department '{}' has an empty name",
                    department.slug
                )));
            }
            if by_slug.contains_key(&department.slug) {
                return Err(ViewError::Configuration(format!(
                    "duplicate department slug '{}'",
                    department.slug
                )));
            }
            by_slug.insert(department.slug.clone(), department);
        }
        Ok(Self {
            departments: by_slug,
        })
    }

    /// Parse `{"departments": [...]}`.
    pub fn from_json_str(json: &str) -> Result<Self, ViewError> {
        let file: RegistryFile = serde_json::from_str(json)?;
        Self::new(file.departments)
    }

    pub fn from_path(path: &Path) -> Result<Self, ViewError> {
        let json = fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Departments shipped with the dashboard.
    pub fn builtin() -> Self {
        let all = [
            "metrics", "goals", "tasks", "errors", "claims", "fireflies", "audit", "calendar",
            "smart",
        ];
        let core = ["metrics", "goals", "tasks", "errors", "audit", "calendar"];
        let departments = vec![
            builtin_department(
                "dataops",
                "DataOps",
                "Data operations and claims processing",
                &all,
                &[
                    "Number of Providers Mapped",
                    "Number of Care items Mapped",
                    "Number of Care items Grouped",
                    "Claims piles checked",
                    "Auto P.A Reviewed",
                    "Flagged Care Items",
                ],
            ),
            builtin_department(
                "finance",
                "Finance",
                "Revenue, invoicing and financial reporting",
                &core,
                &[
                    "Revenue Processed",
                    "Invoices Generated",
                    "Budget Tracked",
                    "Payment Collections",
                    "Financial Reports",
                    "Audit Compliance",
                ],
            ),
            builtin_department(
                "customer-success",
                "Customer Success",
                "Client onboarding and support",
                &core,
                &[],
            ),
            builtin_department(
                "engineering",
                "Engineering",
                "Platform development and reliability",
                &["metrics", "goals", "tasks", "errors", "audit", "calendar", "smart"],
                &[],
            ),
            builtin_department(
                "product-health",
                "Product Health",
                "Health product operations",
                &core,
                &[],
            ),
            builtin_department(
                "product-auto",
                "Product Auto",
                "Auto product operations",
                &core,
                &[],
            ),
            builtin_department("people-ops", "People Ops", "People operations", &core, &[]),
            builtin_department(
                "commercial",
                "Commercial",
                "Sales and partnerships",
                &core,
                &[],
            ),
        ];
        let departments = departments
            .into_iter()
            .map(|department| (department.slug.clone(), department))
            .collect();
        Self { departments }
    }

    pub fn department(&self, slug: &str) -> Option<&Department> {
        self.departments.get(slug)
    }

    pub fn departments(&self) -> impl Iterator<Item = &Department> {
        self.departments.values()
    }

    pub fn len(&self) -> usize {
        self.departments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.departments.is_empty()
    }

    /// Unknown departments have every feature disabled.
    pub fn is_enabled(&self, slug: &str, feature: &str) -> bool {
        self.department(slug)
            .is_some_and(|department| department.is_enabled(feature))
    }

    pub fn enabled_features(&self, slug: &str) -> Vec<FeatureKey> {
        self.department(slug)
            .map(|department| {
                department
                    .features_enabled
                    .iter()
                    .filter(|(_, enabled)| **enabled)
                    .map(|(feature, _)| feature.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn metric_types(&self, slug: &str) -> &[String] {
        self.department(slug)
            .map(|department| department.metric_types.as_slice())
            .unwrap_or(&[])
    }

    /// Metric-entry schema whose `metric_type` facet is restricted to this
    /// department's metric types.
    pub fn metric_schema(&self, slug: &str) -> Result<EntitySchema, ViewError> {
        let department = self.department(slug).ok_or_else(|| {
            ViewError::Configuration(format!("unknown department '{slug}'"))
        })?;
        Ok(entities::metric_entry(&department.metric_types))
    }
}

fn builtin_department(
    slug: &str,
    name: &str,
    description: &str,
    features: &[&str],
    metric_types: &[&str],
) -> Department {
    Department {
        slug: slug.to_string(),
        name: name.to_string(),
        description: description.to_string(),
        features_enabled: features
            .iter()
            .map(|feature| (feature.to_string(), true))
            .collect(),
        metric_types: metric_types.iter().map(|label| label.to_string()).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::entities::METRIC_TYPE;

    #[test]
    fn builtin_registry_exposes_dataops_features() {
        let registry = DepartmentRegistry::builtin();
        assert!(registry.is_enabled("dataops", "claims"));
        assert!(!registry.is_enabled("finance", "claims"));
        assert!(!registry.is_enabled("missing", "metrics"));
        assert_eq!(registry.metric_types("dataops").len(), 6);
        assert!(registry.metric_types("missing").is_empty());
        assert_eq!(registry.enabled_features("finance").len(), 6);
    }

    #[test]
    fn metric_schema_restricts_metric_type_to_department_labels() {
        let registry = DepartmentRegistry::builtin();
        let schema = registry.metric_schema("finance").unwrap();
        assert!(schema.check_facet_value(METRIC_TYPE, "Revenue Processed").is_ok());
        assert!(matches!(
            schema.check_facet_value(METRIC_TYPE, "Flagged Care Items"),
            Err(ViewError::InvalidFilterValue { .. })
        ));
        assert!(matches!(
            registry.metric_schema("nope"),
            Err(ViewError::Configuration(_))
        ));
    }

    #[test]
    fn from_json_str_rejects_duplicate_slugs() {
        let json = r#"{"departments": [
            {"slug": "ops", "name": "Ops"},
            {"slug": "ops", "name": "Ops again"}
        ]}"#;
        let err = DepartmentRegistry::from_json_str(json).unwrap_err();
        assert!(matches!(err, ViewError::Configuration(message) if message.contains("duplicate")));
    }

    #[test]
    fn from_json_str_loads_feature_toggles() {
        let json = r#"{"departments": [
            {"slug": "ops", "name": "Ops",
             "features_enabled": {"metrics": true, "claims": false},
             "metric_types": ["Tickets Closed"]}
        ]}"#;
        let registry = DepartmentRegistry::from_json_str(json).unwrap();
        assert_eq!(registry.len(), 1);
        assert!(registry.is_enabled("ops", "metrics"));
        assert!(!registry.is_enabled("ops", "claims"));
        assert_eq!(registry.enabled_features("ops"), vec!["metrics".to_string()]);
        assert_eq!(registry.metric_types("ops"), ["Tickets Closed".to_string()]);
    }

    #[test]
    fn malformed_json_surfaces_as_json_error() {
        let err = DepartmentRegistry::from_json_str("{not json").unwrap_err();
        assert!(matches!(err, ViewError::Json(_)));
    }

    #[test]
    fn default_view_config_sorts_newest_first() {
        let config = ViewConfig::default();
        assert_eq!(config.default_sort, SortSpec::newest_first());
        assert!(!config.strict_facets);
        assert_eq!(NotificationConfig::default().visible_limit, 5);
    }
}
