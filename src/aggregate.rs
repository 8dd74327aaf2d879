//! Summary statistics over filtered views.
//!
//! All sums, averages, shares, and ratios keep full `f64` precision; use
//! [`round_for_display`] only when rendering.

use std::collections::HashSet;

use indexmap::IndexMap;
use serde::Serialize;

use crate::constants::aggregate::UNGROUPED_LABEL;
use crate::data::DataRecord;
use crate::types::{FacetValue, FieldName, OwnerId};

/// Sum and count over one numeric field.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Totals {
    /// Records carrying the field.
    pub count: usize,
    pub sum: f64,
    /// `sum / count`, or 0 when no record carries the field.
    pub mean: f64,
}

/// Per-group statistics within a breakdown.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct GroupStats {
    pub key: FacetValue,
    /// Set for the group of records lacking the group field.
    pub ungrouped: bool,
    /// Records in the group.
    pub count: usize,
    /// Records in the group carrying the numeric field.
    pub valued: usize,
    pub sum: f64,
    pub mean: f64,
    /// Distinct owners contributing to the group.
    pub contributors: usize,
    /// Fraction of the breakdown total contributed by this group.
    pub share: f64,
}

/// Group-by result ordered by descending sum.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Breakdown {
    pub group_field: FieldName,
    pub value_field: FieldName,
    pub total: f64,
    pub groups: Vec<GroupStats>,
}

impl Breakdown {
    /// Group whose records carry `key`; never the ungrouped bucket.
    pub fn group(&self, key: &str) -> Option<&GroupStats> {
        self.groups
            .iter()
            .find(|group| !group.ungrouped && group.key == key)
    }

    /// Records lacking the group field, if any.
    pub fn ungrouped(&self) -> Option<&GroupStats> {
        self.groups.iter().find(|group| group.ungrouped)
    }

    /// Group keys in ranking order.
    pub fn keys(&self) -> Vec<&str> {
        self.groups.iter().map(|group| group.key.as_str()).collect()
    }
}

/// Per-owner ranking entry.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct OwnerStats {
    pub owner: OwnerId,
    pub count: usize,
    pub sum: f64,
    pub mean: f64,
    /// Distinct values touched per requested categorical field.
    pub distinct: IndexMap<FieldName, usize>,
}

/// Sum and count `field` over `records`.
pub fn totals<'a, I>(records: I, field: &str) -> Totals
where
    I: IntoIterator<Item = &'a DataRecord>,
{
    let mut count = 0usize;
    let mut sum = 0.0f64;
    for value in records.into_iter().filter_map(|record| record.number(field)) {
        count += 1;
        sum += value;
    }
    Totals {
        count,
        sum,
        mean: mean(sum, count),
    }
}

/// Partition by `group_field` and summarise `value_field` per group.
///
/// Records lacking `group_field` land in the `(none)` group so that group sums
/// always reconcile with [`totals`]. Groups are ranked by descending sum; ties
/// keep the order in which each group first appeared.
pub fn group_by<'a, I>(records: I, group_field: &str, value_field: &str) -> Breakdown
where
    I: IntoIterator<Item = &'a DataRecord>,
{
    struct Accumulator<'r> {
        count: usize,
        valued: usize,
        sum: f64,
        owners: HashSet<&'r str>,
    }

    let mut groups: IndexMap<Option<&'a str>, Accumulator<'a>> = IndexMap::new();
    for record in records {
        let key = record.facet_value(group_field);
        let entry = groups.entry(key).or_insert_with(|| Accumulator {
            count: 0,
            valued: 0,
            sum: 0.0,
            owners: HashSet::new(),
        });
        entry.count += 1;
        if let Some(value) = record.number(value_field) {
            entry.valued += 1;
            entry.sum += value;
        }
        if let Some(owner) = record.owner.as_deref() {
            entry.owners.insert(owner);
        }
    }

    let total: f64 = groups.values().map(|group| group.sum).sum();
    let mut ranked: Vec<GroupStats> = groups
        .into_iter()
        .map(|(key, group)| GroupStats {
            key: key.unwrap_or(UNGROUPED_LABEL).to_string(),
            ungrouped: key.is_none(),
            count: group.count,
            valued: group.valued,
            sum: group.sum,
            mean: mean(group.sum, group.valued),
            contributors: group.owners.len(),
            share: ratio(group.sum, total),
        })
        .collect();
    // Stable sort keeps first-occurrence order for equal sums.
    ranked.sort_by(|a, b| b.sum.total_cmp(&a.sum));

    Breakdown {
        group_field: group_field.to_string(),
        value_field: value_field.to_string(),
        total,
        groups: ranked,
    }
}

/// Rank owners by descending sum of `value_field`.
///
/// Records without an owner are skipped. `distinct_fields` names categorical
/// fields whose distinct values are counted per owner.
pub fn owner_ranking<'a, I>(records: I, value_field: &str, distinct_fields: &[FieldName]) -> Vec<OwnerStats>
where
    I: IntoIterator<Item = &'a DataRecord>,
{
    struct Accumulator<'r> {
        count: usize,
        valued: usize,
        sum: f64,
        distinct: Vec<HashSet<&'r str>>,
    }

    let mut owners: IndexMap<&'a str, Accumulator<'a>> = IndexMap::new();
    for record in records {
        let Some(owner) = record.owner.as_deref() else {
            continue;
        };
        let entry = owners.entry(owner).or_insert_with(|| Accumulator {
            count: 0,
            valued: 0,
            sum: 0.0,
            distinct: vec![HashSet::new(); distinct_fields.len()],
        });
        entry.count += 1;
        if let Some(value) = record.number(value_field) {
            entry.valued += 1;
            entry.sum += value;
        }
        for (seen, field) in entry.distinct.iter_mut().zip(distinct_fields) {
            if let Some(value) = record.category(field) {
                seen.insert(value);
            }
        }
    }

    let mut ranked: Vec<OwnerStats> = owners
        .into_iter()
        .map(|(owner, entry)| OwnerStats {
            owner: owner.to_string(),
            count: entry.count,
            sum: entry.sum,
            mean: mean(entry.sum, entry.valued),
            distinct: distinct_fields
                .iter()
                .cloned()
                .zip(entry.distinct.iter().map(HashSet::len))
                .collect(),
        })
        .collect();
    ranked.sort_by(|a, b| b.sum.total_cmp(&a.sum));
    ranked
}

/// `processed / received * 100`, or 0 when `received` is zero or non-finite.
pub fn efficiency_ratio(processed: f64, received: f64) -> f64 {
    let percent = ratio(processed, received) * 100.0;
    if percent.is_finite() { percent } else { 0.0 }
}

/// Efficiency ratio of two numeric field sums over `records`.
pub fn field_ratio<'a, I>(records: I, numerator: &str, denominator: &str) -> f64
where
    I: IntoIterator<Item = &'a DataRecord> + Clone,
{
    let processed = totals(records.clone(), numerator).sum;
    let received = totals(records, denominator).sum;
    efficiency_ratio(processed, received)
}

/// Percentage change from `previous` to `current`, or 0 when `previous` is zero.
pub fn growth_percentage(current: f64, previous: f64) -> f64 {
    if previous == 0.0 || !previous.is_finite() {
        return 0.0;
    }
    let growth = (current - previous) / previous * 100.0;
    if growth.is_finite() { growth } else { 0.0 }
}

/// Progress toward `target` as a percentage in `[0, 100]`, or 0 for a zero target.
pub fn progress_percentage(current: f64, target: f64) -> f64 {
    if target <= 0.0 || !target.is_finite() || !current.is_finite() {
        return 0.0;
    }
    (current / target * 100.0).clamp(0.0, 100.0)
}

/// Round for presentation only.
pub fn round_for_display(value: f64, decimals: u32) -> f64 {
    if !value.is_finite() {
        return 0.0;
    }
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}

fn mean(sum: f64, count: usize) -> f64 {
    if count == 0 { 0.0 } else { sum / count as f64 }
}

fn ratio(part: f64, whole: f64) -> f64 {
    if whole == 0.0 || !whole.is_finite() {
        0.0
    } else {
        part / whole
    }
}
