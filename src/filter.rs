//! Filter pipeline and view ordering.
//!
//! Filtering is a pure function of `(records, FilterState, now)`: predicates
//! are combined with logical AND, the input order is preserved, and running
//! the same filter twice yields the same result.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::constants::filter::{ALL_SENTINEL, OWNER_FACET};
use crate::data::DataRecord;
use crate::dates::{end_of_day, start_of_day};
use crate::errors::ViewError;
use crate::session::Session;
use crate::types::{FacetValue, FieldName};
use crate::utils::{contains_folded, fold_search_text};

/// Case-insensitive substring search across a list of text-bearing fields.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TextSearch {
    term: String,
    folded: String,
    fields: Vec<FieldName>,
}

impl TextSearch {
    /// Search `fields` for `term`; an empty field list searches every text-bearing field.
    pub fn new(term: impl Into<String>, fields: Vec<FieldName>) -> Self {
        let term = term.into();
        let folded = fold_search_text(&term);
        Self {
            term,
            folded,
            fields,
        }
    }

    pub fn term(&self) -> &str {
        &self.term
    }

    pub fn fields(&self) -> &[FieldName] {
        &self.fields
    }

    /// Returns `true` when the term is blank (matches everything).
    pub fn is_empty(&self) -> bool {
        self.folded.is_empty()
    }

    /// Returns `true` if ANY searched field contains the term.
    pub fn matches(&self, record: &DataRecord) -> bool {
        if self.is_empty() {
            return true;
        }
        if self.fields.is_empty() {
            return record
                .text
                .values()
                .chain(record.categorical.values())
                .chain(record.tags.iter())
                .any(|value| contains_folded(value, &self.folded));
        }
        self.fields.iter().any(|field| {
            record
                .field_text(field)
                .is_some_and(|value| contains_folded(&value, &self.folded))
        })
    }
}

/// Canned or explicit date window applied to record timestamps.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateRange {
    #[default]
    All,
    /// The current UTC calendar day.
    Today,
    /// The previous UTC calendar day.
    Yesterday,
    Last7Days,
    Last30Days,
    Last90Days,
    Last365Days,
    /// Explicit inclusive window.
    Between {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
}

impl DateRange {
    /// Resolve to an inclusive `[start, end]` window relative to `now`.
    ///
    /// `None` means unbounded. Canned ranges start at midnight of the first
    /// day in the window and end at the last instant of today.
    pub fn bounds(&self, now: DateTime<Utc>) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        let today = now.date_naive();
        let trailing = |days: i64| {
            let first = today - Duration::days(days);
            Some((start_of_day(first), end_of_day(today)))
        };
        match *self {
            DateRange::All => None,
            DateRange::Today => Some((start_of_day(today), end_of_day(today))),
            DateRange::Yesterday => {
                let yesterday = today - Duration::days(1);
                Some((start_of_day(yesterday), end_of_day(yesterday)))
            }
            DateRange::Last7Days => trailing(7),
            DateRange::Last30Days => trailing(30),
            DateRange::Last90Days => trailing(90),
            DateRange::Last365Days => trailing(365),
            DateRange::Between { start, end } => Some((start, end)),
        }
    }

    pub fn contains(&self, timestamp: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        match self.bounds(now) {
            None => true,
            Some((start, end)) => timestamp >= start && timestamp <= end,
        }
    }
}

impl FromStr for DateRange {
    type Err = ViewError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "" | ALL_SENTINEL => Ok(DateRange::All),
            "today" => Ok(DateRange::Today),
            "yesterday" => Ok(DateRange::Yesterday),
            "7d" | "week" => Ok(DateRange::Last7Days),
            "30d" | "month" => Ok(DateRange::Last30Days),
            "90d" | "quarter" => Ok(DateRange::Last90Days),
            "365d" | "year" => Ok(DateRange::Last365Days),
            other => Err(ViewError::Configuration(format!(
                "unknown date range '{other}' (expected all, today, yesterday, 7d, 30d, 90d, 365d)"
            ))),
        }
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DateRange::All => f.write_str(ALL_SENTINEL),
            DateRange::Today => f.write_str("today"),
            DateRange::Yesterday => f.write_str("yesterday"),
            DateRange::Last7Days => f.write_str("7d"),
            DateRange::Last30Days => f.write_str("30d"),
            DateRange::Last90Days => f.write_str("90d"),
            DateRange::Last365Days => f.write_str("365d"),
            DateRange::Between { start, end } => {
                write!(f, "{}..{}", start.to_rfc3339(), end.to_rfc3339())
            }
        }
    }
}

/// Complete filter tuple owned by a view.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FilterState {
    pub search: TextSearch,
    /// Facet selections; a value of `all` disables that facet.
    pub facets: IndexMap<FieldName, FacetValue>,
    pub date_range: DateRange,
}

impl FilterState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_search(mut self, term: impl Into<String>, fields: Vec<FieldName>) -> Self {
        self.search = TextSearch::new(term, fields);
        self
    }

    pub fn with_facet(mut self, field: impl Into<FieldName>, value: impl Into<FacetValue>) -> Self {
        self.facets.insert(field.into(), value.into());
        self
    }

    pub fn with_date_range(mut self, range: DateRange) -> Self {
        self.date_range = range;
        self
    }

    /// Restrict to records owned by the session user ("my" view).
    ///
    /// Without a signed-in user the owner facet is reset to `all`.
    pub fn owned_by(self, session: &dyn Session) -> Self {
        let owner = session
            .current_user()
            .map(str::to_string)
            .unwrap_or_else(|| ALL_SENTINEL.to_string());
        self.with_facet(OWNER_FACET, owner)
    }

    /// Facet selections that actually constrain results.
    pub fn active_facets(&self) -> impl Iterator<Item = (&str, &str)> {
        self.facets
            .iter()
            .filter(|(_, value)| value.as_str() != ALL_SENTINEL)
            .map(|(field, value)| (field.as_str(), value.as_str()))
    }

    /// Returns `true` when no predicate constrains results.
    pub fn is_unconstrained(&self) -> bool {
        self.search.is_empty()
            && self.active_facets().next().is_none()
            && self.date_range == DateRange::All
    }

    /// Evaluate every predicate against `record`.
    pub fn matches(&self, record: &DataRecord, now: DateTime<Utc>) -> bool {
        self.active_facets()
            .all(|(field, value)| record.facet_value(field) == Some(value))
            && self.date_range.contains(record.timestamp, now)
            && self.search.matches(record)
    }
}

/// Reduce `records` to those matching `state`, preserving input order.
pub fn apply_filters<'a, I>(records: I, state: &FilterState, now: DateTime<Utc>) -> Vec<DataRecord>
where
    I: IntoIterator<Item = &'a DataRecord>,
{
    records
        .into_iter()
        .filter(|record| state.matches(record, now))
        .cloned()
        .collect()
}

/// Sort key for a filtered view.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    /// Keep store order.
    #[default]
    Insertion,
    Timestamp,
    Numeric(FieldName),
    Categorical(FieldName),
}

/// Ordering applied to a filtered view.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    pub key: SortKey,
    pub descending: bool,
}

impl SortSpec {
    /// Most-recent-first ordering.
    pub fn newest_first() -> Self {
        Self {
            key: SortKey::Timestamp,
            descending: true,
        }
    }

    pub fn by_numeric(field: impl Into<FieldName>, descending: bool) -> Self {
        Self {
            key: SortKey::Numeric(field.into()),
            descending,
        }
    }

    pub fn by_category(field: impl Into<FieldName>, descending: bool) -> Self {
        Self {
            key: SortKey::Categorical(field.into()),
            descending,
        }
    }

    /// Stable in-place sort; records missing the key sort last in either direction.
    pub fn apply(&self, records: &mut [DataRecord]) {
        let descending = self.descending;
        let directed = |ordering: Ordering| {
            if descending {
                ordering.reverse()
            } else {
                ordering
            }
        };
        match &self.key {
            SortKey::Insertion => {
                if descending {
                    records.reverse();
                }
            }
            SortKey::Timestamp => {
                records.sort_by(|a, b| directed(a.timestamp.cmp(&b.timestamp)));
            }
            SortKey::Numeric(field) => {
                records.sort_by(|a, b| match (a.number(field), b.number(field)) {
                    (Some(x), Some(y)) => directed(x.total_cmp(&y)),
                    (Some(_), None) => Ordering::Less,
                    (None, Some(_)) => Ordering::Greater,
                    (None, None) => Ordering::Equal,
                });
            }
            SortKey::Categorical(field) => {
                records.sort_by(|a, b| match (a.category(field), b.category(field)) {
                    (Some(x), Some(y)) => directed(x.cmp(y)),
                    (Some(_), None) => Ordering::Less,
                    (None, Some(_)) => Ordering::Greater,
                    (None, None) => Ordering::Equal,
                });
            }
        }
    }
}
