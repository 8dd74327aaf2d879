//! Built-in entity schemas for the dashboard's feature screens.
//!
//! Each function declares one entity type; the screens share the generic
//! store, filter, aggregate, and export engine.

use chrono::{DateTime, Utc};

use crate::aggregate::progress_percentage;
use crate::constants::entities::{
    ACTION, AVERAGE_PROCESSING_TIME, CHANNEL, CLAIMS_PROCESSED, CLAIMS_RECEIVED, CURRENT_VALUE,
    DESCRIPTION, END_DATE, EVENT_TYPE, GOAL_AT_RISK_DAYS_LEFT, GOAL_AT_RISK_PERCENT, GOAL_TYPE,
    INSURER, METRIC_TYPE, MONTH, PRIORITY, RECORD_REF, SEVERITY, SOURCE, STATUS, TABLE_NAME,
    TARGET_VALUE, TITLE, VALUE, YEAR,
};
use crate::data::{DataRecord, RecordPatch};
use crate::dates::{days_until, parse_record_timestamp};
use crate::errors::ViewError;
use crate::schema::{EntitySchema, ValueBounds};

pub const METRIC_ENTRY: &str = "metric_entry";
pub const TASK: &str = "task";
pub const GOAL: &str = "goal";
pub const ERROR_REPORT: &str = "error_report";
pub const ISSUE: &str = "issue";
pub const CLAIM: &str = "claim";
pub const TREND: &str = "trend";
pub const AUDIT_ENTRY: &str = "audit_entry";
pub const ANOMALY: &str = "anomaly";
pub const CALENDAR_EVENT: &str = "calendar_event";

/// Insurers reported on the claims screens.
pub const INSURERS: [&str; 8] = [
    "Kenya",
    "Tanzania",
    "Uganda",
    "UAP Old Mutual",
    "Leadway Assurance",
    "AXA Mansard",
    "AIICO Insurance",
    "Hadiel Tech",
];

/// Goal status values.
pub mod goal_status {
    pub const NOT_STARTED: &str = "not_started";
    pub const IN_PROGRESS: &str = "in_progress";
    pub const COMPLETED: &str = "completed";
    pub const AT_RISK: &str = "at_risk";
}

const SEVERITY_LEVELS: [&str; 4] = ["low", "medium", "high", "critical"];

/// Daily metric entry; `metric_types` lists the department's valid labels.
///
/// An empty list leaves the metric-type facet open-ended.
pub fn metric_entry(metric_types: &[String]) -> EntitySchema {
    EntitySchema::new(METRIC_ENTRY)
        .facet(METRIC_TYPE, "Metric Type", metric_types.iter().cloned())
        .open_facet(INSURER, "Insurer")
        .numeric(VALUE, "Value", ValueBounds::NON_NEGATIVE)
        .text(DESCRIPTION, "Notes")
}

pub fn task() -> EntitySchema {
    EntitySchema::new(TASK)
        .facet(STATUS, "Status", ["todo", "inprogress", "done"])
        .facet(PRIORITY, "Priority", ["low", "medium", "high"])
        .text(TITLE, "Title")
        .text(DESCRIPTION, "Description")
}

pub fn goal() -> EntitySchema {
    EntitySchema::new(GOAL)
        .facet(
            STATUS,
            "Status",
            [
                goal_status::NOT_STARTED,
                goal_status::IN_PROGRESS,
                goal_status::COMPLETED,
                goal_status::AT_RISK,
            ],
        )
        .facet(GOAL_TYPE, "Goal Type", ["daily", "weekly", "monthly", "quarterly"])
        .numeric(TARGET_VALUE, "Target", ValueBounds::NON_NEGATIVE)
        .numeric(CURRENT_VALUE, "Current", ValueBounds::NON_NEGATIVE)
        .text(TITLE, "Title")
        .text(DESCRIPTION, "Description")
        .text(END_DATE, "End Date")
}

/// Error reports raised by automation or posted in chat channels.
pub fn error_report() -> EntitySchema {
    EntitySchema::new(ERROR_REPORT)
        .facet(STATUS, "Status", ["new", "investigating", "resolved"])
        .facet(SOURCE, "Source", ["slack", "system"])
        .open_facet(CHANNEL, "Channel")
        .text(TITLE, "Title")
        .text(DESCRIPTION, "Message")
}

pub fn issue() -> EntitySchema {
    EntitySchema::new(ISSUE)
        .facet(STATUS, "Status", ["open", "investigating", "resolved"])
        .facet(PRIORITY, "Priority", SEVERITY_LEVELS)
        .text(TITLE, "Title")
        .text(DESCRIPTION, "Description")
}

/// Claims volume per insurer.
pub fn claim() -> EntitySchema {
    EntitySchema::new(CLAIM)
        .facet(INSURER, "Insurer", INSURERS)
        .numeric(CLAIMS_RECEIVED, "Claims Received", ValueBounds::NON_NEGATIVE)
        .numeric(CLAIMS_PROCESSED, "Claims Processed", ValueBounds::NON_NEGATIVE)
        .optional_numeric(
            AVERAGE_PROCESSING_TIME,
            "Average Processing Time",
            ValueBounds::NON_NEGATIVE,
        )
}

/// Monthly claims trend point, compared year over year.
pub fn trend() -> EntitySchema {
    EntitySchema::new(TREND)
        .open_facet(INSURER, "Insurer")
        .open_facet(MONTH, "Month")
        .numeric(YEAR, "Year", ValueBounds::new(1900.0, 9999.0))
        .numeric(CLAIMS_RECEIVED, "Claims Received", ValueBounds::NON_NEGATIVE)
        .numeric(CLAIMS_PROCESSED, "Claims Processed", ValueBounds::NON_NEGATIVE)
        .optional_numeric(
            AVERAGE_PROCESSING_TIME,
            "Average Processing Time",
            ValueBounds::NON_NEGATIVE,
        )
}

pub fn audit_entry() -> EntitySchema {
    EntitySchema::new(AUDIT_ENTRY)
        .facet(ACTION, "Action", ["CREATE", "UPDATE", "DELETE"])
        .open_facet(TABLE_NAME, "Table")
        .text(RECORD_REF, "Record ID")
        .text(DESCRIPTION, "Details")
}

pub fn anomaly() -> EntitySchema {
    EntitySchema::new(ANOMALY)
        .facet(SEVERITY, "Severity", SEVERITY_LEVELS)
        .facet(STATUS, "Status", ["active", "resolved", "dismissed"])
        .optional_numeric(VALUE, "Observed Value", ValueBounds::UNBOUNDED)
        .text(TITLE, "Title")
        .text(DESCRIPTION, "Description")
}

pub fn calendar_event() -> EntitySchema {
    EntitySchema::new(CALENDAR_EVENT)
        .facet(EVENT_TYPE, "Event Type", ["meeting", "deadline", "reminder"])
        .text(TITLE, "Title")
        .text(DESCRIPTION, "Description")
}

/// Patch recording new progress on a goal.
///
/// `value` is clamped to `[0, target]`. The goal is `completed` once progress
/// reaches the target, `at_risk` when below half the target with at most two
/// days left before `end_date`, and `in_progress` otherwise.
pub fn apply_goal_progress(
    goal: &DataRecord,
    value: f64,
    now: DateTime<Utc>,
) -> Result<RecordPatch, ViewError> {
    if goal.entity != GOAL {
        return Err(ViewError::EntityMismatch {
            expected: GOAL.to_string(),
            found: goal.entity.clone(),
        });
    }
    let target = goal
        .number(TARGET_VALUE)
        .ok_or_else(|| ViewError::SchemaViolation {
            id: goal.id().to_string(),
            details: format!("missing numeric field '{TARGET_VALUE}'"),
        })?;
    let clamped = ValueBounds::new(0.0, target.max(0.0)).clamp(value);
    let percent = progress_percentage(clamped, target);

    let status = if target > 0.0 && percent >= 100.0 {
        goal_status::COMPLETED
    } else if percent < GOAL_AT_RISK_PERCENT
        && goal
            .text
            .get(END_DATE)
            .and_then(|raw| parse_record_timestamp(raw))
            .is_some_and(|end| days_until(now, end) <= GOAL_AT_RISK_DAYS_LEFT)
    {
        goal_status::AT_RISK
    } else {
        goal_status::IN_PROGRESS
    };

    Ok(RecordPatch::new()
        .number(CURRENT_VALUE, clamped)
        .category(STATUS, status))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 10, 12, 0, 0).unwrap()
    }

    fn goal_record(target: f64, end_date: &str) -> DataRecord {
        DataRecord::new("goal-1", GOAL, now())
            .with_category(STATUS, goal_status::NOT_STARTED)
            .with_category(GOAL_TYPE, "weekly")
            .with_number(TARGET_VALUE, target)
            .with_number(CURRENT_VALUE, 0.0)
            .with_text(TITLE, "Map providers")
            .with_text(END_DATE, end_date)
    }

    #[test]
    fn builtin_schemas_accept_representative_records() {
        let issue = DataRecord::new("issue-1", ISSUE, now())
            .with_category(STATUS, "open")
            .with_category(PRIORITY, "critical")
            .with_text(TITLE, "Sync job stalled");
        assert!(super::issue().validate(&issue).is_ok());

        let claim = DataRecord::new("claim-1", CLAIM, now())
            .with_category(INSURER, "Uganda")
            .with_number(CLAIMS_RECEIVED, 120.0)
            .with_number(CLAIMS_PROCESSED, 96.0);
        assert!(super::claim().validate(&claim).is_ok());

        let audit = DataRecord::new("audit-1", AUDIT_ENTRY, now())
            .with_category(ACTION, "DELETE")
            .with_category(TABLE_NAME, "tasks");
        assert!(audit_entry().validate(&audit).is_ok());

        assert!(goal().validate(&goal_record(10.0, "2025-03-20")).is_ok());
    }

    #[test]
    fn schemas_reject_undeclared_values_and_negative_counts() {
        let task = DataRecord::new("task-1", TASK, now())
            .with_category(STATUS, "blocked")
            .with_category(PRIORITY, "low");
        assert!(matches!(
            super::task().validate(&task),
            Err(ViewError::SchemaViolation { .. })
        ));

        let claim = DataRecord::new("claim-1", CLAIM, now())
            .with_category(INSURER, "Kenya")
            .with_number(CLAIMS_RECEIVED, -1.0)
            .with_number(CLAIMS_PROCESSED, 0.0);
        assert!(matches!(
            super::claim().validate(&claim),
            Err(ViewError::OutOfBounds { .. })
        ));
    }

    #[test]
    fn metric_entry_without_types_is_open_ended() {
        let schema = metric_entry(&[]);
        assert!(schema.check_facet_value(METRIC_TYPE, "Anything").is_ok());
        let schema = metric_entry(&["Flagged Care Items".to_string()]);
        assert!(schema.check_facet_value(METRIC_TYPE, "Anything").is_err());
    }

    #[test]
    fn goal_progress_clamps_and_completes_at_target() {
        let patch = apply_goal_progress(&goal_record(10.0, "2025-04-01"), 14.0, now()).unwrap();
        assert_eq!(patch.numeric.get(CURRENT_VALUE), Some(&10.0));
        assert_eq!(
            patch.categorical.get(STATUS).map(String::as_str),
            Some(goal_status::COMPLETED)
        );

        let patch = apply_goal_progress(&goal_record(10.0, "2025-04-01"), -3.0, now()).unwrap();
        assert_eq!(patch.numeric.get(CURRENT_VALUE), Some(&0.0));
    }

    #[test]
    fn lagging_goal_near_deadline_is_at_risk() {
        let near = goal_record(10.0, "2025-03-12");
        let patch = apply_goal_progress(&near, 4.0, now()).unwrap();
        assert_eq!(
            patch.categorical.get(STATUS).map(String::as_str),
            Some(goal_status::AT_RISK)
        );

        let far = goal_record(10.0, "2025-03-30");
        let patch = apply_goal_progress(&far, 4.0, now()).unwrap();
        assert_eq!(
            patch.categorical.get(STATUS).map(String::as_str),
            Some(goal_status::IN_PROGRESS)
        );
    }

    #[test]
    fn goal_progress_rejects_other_entities() {
        let task = DataRecord::new("task-1", TASK, now());
        assert!(matches!(
            apply_goal_progress(&task, 1.0, now()),
            Err(ViewError::EntityMismatch { .. })
        ));
    }
}
