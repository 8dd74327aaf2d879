//! View controller: owns one record store plus the filter, sort, and summary
//! state of a screen, and keeps the derived view current.
//!
//! Every mutation (filter change, sort change, store write) recomputes the
//! derived view before returning, so `view()` never exposes stale output.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use indexmap::IndexSet;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::aggregate::{
    Breakdown, OwnerStats, Totals, field_ratio, group_by, owner_ranking, totals,
};
use crate::clock::Clock;
use crate::config::ViewConfig;
use crate::constants::export::NOTIFY_SOURCE;
use crate::constants::feeds::TIMEOUT_SOURCE;
use crate::constants::filter::{ALL_SENTINEL, OWNER_FACET};
use crate::data::{DataRecord, RecordPatch};
use crate::errors::ViewError;
use crate::export::{Column, schema_columns, write_csv, write_export_file};
use crate::filter::{DateRange, FilterState, SortKey, SortSpec, TextSearch, apply_filters};
use crate::ingestion::{RecordFeed, StatusTimeoutRule};
use crate::notify::{Notifier, Severity};
use crate::schema::EntitySchema;
use crate::session::Session;
use crate::store::RecordStore;
use crate::types::{FacetValue, FieldName, RecordId};

/// Which summaries a view maintains.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SummarySpec {
    /// Numeric field summed by totals, breakdowns, and owner rankings.
    pub value_field: Option<FieldName>,
    /// Categorical fields to break the value field down by.
    pub breakdowns: Vec<FieldName>,
    /// Categorical fields whose distinct values are counted per owner.
    /// Empty disables the owner ranking.
    pub owner_distinct: Vec<FieldName>,
    /// `(processed, received)` numeric fields for the efficiency ratio.
    pub ratio: Option<(FieldName, FieldName)>,
}

impl SummarySpec {
    pub fn value(field: impl Into<FieldName>) -> Self {
        Self {
            value_field: Some(field.into()),
            ..Self::default()
        }
    }

    pub fn breakdown(mut self, field: impl Into<FieldName>) -> Self {
        self.breakdowns.push(field.into());
        self
    }

    pub fn rank_owners(mut self, distinct: Vec<FieldName>) -> Self {
        self.owner_distinct = distinct;
        self
    }

    pub fn efficiency(
        mut self,
        processed: impl Into<FieldName>,
        received: impl Into<FieldName>,
    ) -> Self {
        self.ratio = Some((processed.into(), received.into()));
        self
    }

    fn validate(&self, schema: &EntitySchema) -> Result<(), ViewError> {
        if let Some(field) = &self.value_field {
            schema.require_numeric(field)?;
        }
        for field in self.breakdowns.iter().chain(&self.owner_distinct) {
            schema.require_facet(field)?;
        }
        if let Some((processed, received)) = &self.ratio {
            schema.require_numeric(processed)?;
            schema.require_numeric(received)?;
        }
        if !self.owner_distinct.is_empty() && self.value_field.is_none() {
            return Err(ViewError::Configuration(
                "owner ranking needs a value field".to_string(),
            ));
        }
        Ok(())
    }
}

/// Aggregates over the current filtered view.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ViewSummary {
    /// Records in the filtered view.
    pub count: usize,
    pub totals: Option<Totals>,
    pub breakdowns: Vec<Breakdown>,
    pub owners: Vec<OwnerStats>,
    /// Efficiency percentage; 0 when nothing was received.
    pub efficiency: Option<f64>,
}

/// Filtered, sorted records plus their summary.
#[derive(Clone, Debug, PartialEq)]
pub struct DerivedView {
    pub records: Vec<DataRecord>,
    pub summary: ViewSummary,
    /// Instant the date-range predicate was evaluated against.
    pub evaluated_at: DateTime<Utc>,
    /// Store revision the view was computed from.
    pub revision: u64,
}

pub struct ViewController {
    feature: String,
    store: RecordStore,
    filters: FilterState,
    sort: SortSpec,
    summary: SummarySpec,
    config: ViewConfig,
    clock: Arc<dyn Clock>,
    notifier: Option<Arc<dyn Notifier>>,
    derived: DerivedView,
}

impl ViewController {
    /// Create a view over an empty store of `schema` records.
    ///
    /// `feature` names the screen and prefixes export file names.
    pub fn new(
        feature: impl Into<String>,
        schema: EntitySchema,
        config: ViewConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let store = RecordStore::with_position(Arc::new(schema), config.insert_position);
        let now = clock.now();
        let mut controller = Self {
            feature: feature.into(),
            store,
            filters: FilterState::default(),
            sort: config.default_sort.clone(),
            summary: SummarySpec::default(),
            config,
            clock,
            notifier: None,
            derived: DerivedView {
                records: Vec::new(),
                summary: ViewSummary::default(),
                evaluated_at: now,
                revision: 0,
            },
        };
        controller.recompute();
        controller
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn with_summary(mut self, summary: SummarySpec) -> Result<Self, ViewError> {
        self.set_summary(summary)?;
        Ok(self)
    }

    pub fn feature(&self) -> &str {
        &self.feature
    }

    pub fn schema(&self) -> &EntitySchema {
        self.store.schema()
    }

    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    pub fn filters(&self) -> &FilterState {
        &self.filters
    }

    pub fn sort(&self) -> &SortSpec {
        &self.sort
    }

    pub fn config(&self) -> &ViewConfig {
        &self.config
    }

    /// Current derived output.
    pub fn view(&self) -> &DerivedView {
        &self.derived
    }

    pub fn records(&self) -> &[DataRecord] {
        &self.derived.records
    }

    pub fn summary(&self) -> &ViewSummary {
        &self.derived.summary
    }

    /// Search the schema's text-bearing fields.
    pub fn set_search(&mut self, term: &str) {
        let fields = self.store.schema().search_fields();
        self.set_search_in(term, fields);
    }

    /// Search only `fields`.
    pub fn set_search_in(&mut self, term: &str, fields: Vec<FieldName>) {
        self.filters.search = TextSearch::new(term, fields);
        self.recompute();
    }

    /// Select `value` for facet `field`; `all` clears the selection.
    ///
    /// Unknown fields are rejected. Values outside the declared set are
    /// rejected under `strict_facets`, otherwise logged and applied (the view
    /// becomes empty).
    pub fn set_facet(&mut self, field: &str, value: &str) -> Result<(), ViewError> {
        match self.store.schema().check_facet_value(field, value) {
            Ok(()) => {}
            Err(err @ ViewError::InvalidFilterValue { .. }) if !self.config.strict_facets => {
                warn!(
                    entity = %self.store.schema().entity(),
                    field,
                    value,
                    error = %err,
                    "undeclared facet value selected"
                );
            }
            Err(err) => return Err(err),
        }
        self.filters.facets.insert(field.to_string(), value.to_string());
        self.recompute();
        Ok(())
    }

    pub fn clear_facet(&mut self, field: &str) {
        if self.filters.facets.shift_remove(field).is_some() {
            self.recompute();
        }
    }

    pub fn set_date_range(&mut self, range: DateRange) {
        self.filters.date_range = range;
        self.recompute();
    }

    /// Toggle between "my" records (`Some(session)`) and the whole team.
    pub fn show_mine(&mut self, session: Option<&dyn Session>) {
        self.filters = match session {
            Some(session) => std::mem::take(&mut self.filters).owned_by(session),
            None => std::mem::take(&mut self.filters).with_facet(OWNER_FACET, ALL_SENTINEL),
        };
        self.recompute();
    }

    /// Clear search, facets, and date range.
    pub fn reset_filters(&mut self) {
        self.filters = FilterState::default();
        self.recompute();
    }

    pub fn set_sort(&mut self, sort: SortSpec) -> Result<(), ViewError> {
        match &sort.key {
            SortKey::Numeric(field) => self.store.schema().require_numeric(field)?,
            SortKey::Categorical(field) => self.store.schema().require_facet(field)?,
            SortKey::Insertion | SortKey::Timestamp => {}
        }
        self.sort = sort;
        self.recompute();
        Ok(())
    }

    pub fn set_summary(&mut self, summary: SummarySpec) -> Result<(), ViewError> {
        summary.validate(self.store.schema())?;
        self.summary = summary;
        self.recompute();
        Ok(())
    }

    pub fn append(&mut self, record: DataRecord) -> Result<(), ViewError> {
        self.store.append(record)?;
        self.recompute();
        Ok(())
    }

    pub fn update(&mut self, id: &str, patch: &RecordPatch) -> Result<(), ViewError> {
        self.store.update_by_id(id, patch)?;
        self.recompute();
        Ok(())
    }

    /// Remove a record; absent ids are a no-op.
    pub fn remove(&mut self, id: &str) -> Option<DataRecord> {
        let removed = self.store.remove_by_id(id);
        if removed.is_some() {
            self.recompute();
        }
        removed
    }

    /// Re-evaluate against the current time (date ranges are relative to now).
    pub fn refresh(&mut self) {
        self.recompute();
    }

    /// Distinct values of `field` present in the store, in first-seen order.
    pub fn facet_options(&self, field: &str) -> Result<Vec<FacetValue>, ViewError> {
        self.store.schema().require_facet(field)?;
        let options: IndexSet<&str> = self
            .store
            .iter()
            .filter_map(|record| record.facet_value(field))
            .collect();
        Ok(options.into_iter().map(str::to_string).collect())
    }

    /// Append every record queued by `feed`; returns how many were added.
    ///
    /// Records the store rejects are logged and skipped. Each source that
    /// contributed records raises one `info` notification.
    pub fn drain_feed(&mut self, feed: &RecordFeed) -> usize {
        let mut appended = 0usize;
        for batch in feed.drain() {
            match batch.result {
                Ok(records) => {
                    let mut from_source = 0usize;
                    for record in records {
                        let id = record.id().to_string();
                        match self.store.append(record) {
                            Ok(()) => from_source += 1,
                            Err(err) => warn!(
                                source = %batch.source,
                                record_id = %id,
                                error = %err,
                                "feed record rejected"
                            ),
                        }
                    }
                    if from_source > 0 {
                        self.notify(
                            &format!("{from_source} new record(s) from {}", batch.source),
                            Severity::Info,
                            Some(&batch.source),
                        );
                    }
                    appended += from_source;
                }
                Err(err) => {
                    warn!(source = %batch.source, error = %err, "feed batch failed");
                    self.notify(
                        &format!("{} feed failed: {err}", batch.source),
                        Severity::Error,
                        Some(&batch.source),
                    );
                }
            }
        }
        if appended > 0 {
            self.recompute();
        }
        appended
    }

    /// Apply `rule` to every due record; returns the ids that transitioned.
    pub fn apply_status_timeouts(
        &mut self,
        rule: &StatusTimeoutRule,
    ) -> Result<Vec<RecordId>, ViewError> {
        self.store.schema().check_facet_value(&rule.field, &rule.to)?;
        let now = self.clock.now();
        let due: Vec<RecordId> = self
            .store
            .iter()
            .filter(|record| rule.is_due(record, now))
            .map(|record| record.id().to_string())
            .collect();
        if due.is_empty() {
            return Ok(due);
        }
        let patch = rule.patch();
        for id in &due {
            self.store.update_by_id(id, &patch)?;
            self.notify(
                &format!("{id} moved from {} to {}", rule.from, rule.to),
                Severity::Success,
                Some(TIMEOUT_SOURCE),
            );
        }
        debug!(count = due.len(), field = %rule.field, to = %rule.to, "status timeouts applied");
        self.recompute();
        Ok(due)
    }

    /// One column per declared field of the schema.
    pub fn default_columns(&self) -> Vec<Column> {
        schema_columns(self.store.schema())
    }

    /// Serialize the current view to `sink`; returns the row count.
    pub fn export_csv<W: Write + ?Sized>(
        &self,
        sink: &mut W,
        columns: &[Column],
    ) -> Result<usize, ViewError> {
        write_csv(sink, columns, &self.derived.records)
    }

    /// Write the current view to `<dir>/<feature>-<timestamp>.csv`.
    ///
    /// Failure raises a single `error` notification and leaves the store and
    /// filters untouched.
    pub fn export_to_dir(&self, dir: &Path, columns: &[Column]) -> Result<PathBuf, ViewError> {
        let now = self.clock.now();
        match write_export_file(dir, &self.feature, now, columns, &self.derived.records) {
            Ok(path) => {
                info!(feature = %self.feature, path = %path.display(), rows = self.derived.records.len(), "view exported");
                self.notify(
                    &format!("Exported {} record(s)", self.derived.records.len()),
                    Severity::Success,
                    Some(NOTIFY_SOURCE),
                );
                Ok(path)
            }
            Err(err) => {
                warn!(feature = %self.feature, error = %err, "view export failed");
                self.notify(&err.to_string(), Severity::Error, Some(NOTIFY_SOURCE));
                Err(err)
            }
        }
    }

    fn notify(&self, message: &str, severity: Severity, source: Option<&str>) {
        if let Some(notifier) = &self.notifier {
            notifier.notify(message, severity, source);
        }
    }

    fn recompute(&mut self) {
        let now = self.clock.now();
        let mut records = apply_filters(self.store.iter(), &self.filters, now);
        self.sort.apply(&mut records);
        let summary = summarize(&records, &self.summary);
        self.derived = DerivedView {
            records,
            summary,
            evaluated_at: now,
            revision: self.store.revision(),
        };
    }
}

fn summarize(records: &[DataRecord], spec: &SummarySpec) -> ViewSummary {
    let value_field = spec.value_field.as_deref();
    ViewSummary {
        count: records.len(),
        totals: value_field.map(|field| totals(records, field)),
        breakdowns: value_field
            .map(|value| {
                spec.breakdowns
                    .iter()
                    .map(|group| group_by(records, group, value))
                    .collect()
            })
            .unwrap_or_default(),
        owners: match value_field {
            Some(value) if !spec.owner_distinct.is_empty() => {
                owner_ranking(records, value, &spec.owner_distinct)
            }
            _ => Vec::new(),
        },
        efficiency: spec
            .ratio
            .as_ref()
            .map(|(processed, received)| field_ratio(records, processed, received)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::entities;
    use chrono::TimeZone;

    fn controller() -> ViewController {
        let clock = FixedClock::new(Utc.with_ymd_and_hms(2025, 5, 1, 12, 0, 0).unwrap());
        ViewController::new(
            "issues",
            entities::issue(),
            ViewConfig::default(),
            Arc::new(clock),
        )
    }

    fn issue(id: &str, status: &str, hour: u32) -> DataRecord {
        DataRecord::new(id, entities::ISSUE, Utc.with_ymd_and_hms(2025, 5, 1, hour, 0, 0).unwrap())
            .with_category("status", status)
            .with_category("priority", "low")
            .with_text("title", format!("Issue {id}"))
    }

    #[test]
    fn derived_view_tracks_store_revision() {
        let mut view = controller();
        view.append(issue("a", "open", 8)).unwrap();
        view.append(issue("b", "resolved", 9)).unwrap();
        assert_eq!(view.view().revision, view.store().revision());
        assert_eq!(view.summary().count, 2);

        view.set_facet("status", "open").unwrap();
        assert_eq!(view.records().len(), 1);
        view.remove("a");
        assert!(view.records().is_empty());
    }

    #[test]
    fn unknown_facet_field_is_rejected() {
        let mut view = controller();
        let err = view.set_facet("colour", "red").unwrap_err();
        assert!(matches!(err, ViewError::UnknownField { .. }));
        assert!(view.filters().facets.is_empty());
    }

    #[test]
    fn summary_spec_fields_are_validated() {
        let view = controller();
        let err = view.with_summary(SummarySpec::value("title")).err().unwrap();
        assert!(matches!(err, ViewError::UnknownField { .. }));
    }
}
