/// Constants used by the filter pipeline and facet handling.
pub mod filter {
    /// Facet selection that disables a categorical predicate.
    pub const ALL_SENTINEL: &str = "all";
    /// Pseudo-field name that addresses a record's owner reference as a facet.
    pub const OWNER_FACET: &str = "owner";
    /// Pseudo-field name that addresses a record's tag list in text search.
    pub const TAGS_FIELD: &str = "tags";
}

/// Constants used by aggregation breakdowns.
pub mod aggregate {
    /// Group label used for records that do not carry the group-by field.
    pub const UNGROUPED_LABEL: &str = "(none)";
}

/// Constants used by the CSV exporter and export file naming.
pub mod export {
    /// Field delimiter for exported rows.
    pub const DELIMITER: char = ',';
    /// Quote character used when a field needs quoting.
    pub const QUOTE: char = '"';
    /// Line terminator for exported rows.
    pub const LINE_TERMINATOR: &str = "\n";
    /// File extension for exported views.
    pub const FILE_EXTENSION: &str = "csv";
    /// Timestamp layout embedded in export file names (filesystem-safe ISO 8601).
    pub const FILE_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H-%M-%SZ";
    /// Notification source label used for export outcomes.
    pub const NOTIFY_SOURCE: &str = "export";
}

/// Constants used by the notification center.
pub mod notify {
    /// Seconds before a notification auto-expires from the visible list.
    pub const AUTO_DISMISS_SECS: u64 = 5;
    /// Number of most-recent notifications shown at once.
    pub const VISIBLE_LIMIT: usize = 5;
    /// Number of notifications retained in the ring buffer.
    pub const RETENTION: usize = 50;
}

/// Constants used by event feeds and timed status transitions.
pub mod feeds {
    /// Notification source label used for timed status transitions.
    pub const TIMEOUT_SOURCE: &str = "automation";
    /// Seconds an error may stay under investigation before it is auto-resolved.
    pub const INVESTIGATION_TIMEOUT_SECS: i64 = 120;
    /// Source id of the simulated claims feed.
    pub const CLAIMS_FEED_ID: &str = "nova";
}

/// Constants naming the fields declared by the built-in entity schemas.
pub mod entities {
    /// Categorical status field shared by most entity types.
    pub const STATUS: &str = "status";
    /// Categorical priority field.
    pub const PRIORITY: &str = "priority";
    /// Categorical severity field.
    pub const SEVERITY: &str = "severity";
    /// Categorical metric type field.
    pub const METRIC_TYPE: &str = "metric_type";
    /// Categorical insurer field.
    pub const INSURER: &str = "insurer";
    /// Categorical reporting channel field.
    pub const CHANNEL: &str = "channel";
    /// Numeric value field of a metric entry.
    pub const VALUE: &str = "value";
    /// Numeric goal target.
    pub const TARGET_VALUE: &str = "target_value";
    /// Numeric goal progress.
    pub const CURRENT_VALUE: &str = "current_value";
    /// Text title field.
    pub const TITLE: &str = "title";
    /// Text description field.
    pub const DESCRIPTION: &str = "description";
    /// Goal end date stored as RFC 3339 text.
    pub const END_DATE: &str = "end_date";
    /// Numeric received-claims count.
    pub const CLAIMS_RECEIVED: &str = "claims_received";
    /// Numeric processed-claims count.
    pub const CLAIMS_PROCESSED: &str = "claims_processed";
    /// Numeric average processing time (days).
    pub const AVERAGE_PROCESSING_TIME: &str = "average_processing_time";
    /// Categorical goal cadence.
    pub const GOAL_TYPE: &str = "goal_type";
    /// Categorical origin of an error report.
    pub const SOURCE: &str = "source";
    /// Categorical audit action.
    pub const ACTION: &str = "action";
    /// Categorical audited table name.
    pub const TABLE_NAME: &str = "table_name";
    /// Text id of the audited record.
    pub const RECORD_REF: &str = "record_id";
    /// Categorical calendar event kind.
    pub const EVENT_TYPE: &str = "event_type";
    /// Categorical reporting month of a trend point.
    pub const MONTH: &str = "month";
    /// Numeric reporting year of a trend point.
    pub const YEAR: &str = "year";
    /// Goal progress percentage below which a goal near its deadline is at risk.
    pub const GOAL_AT_RISK_PERCENT: f64 = 50.0;
    /// Days remaining at or below which a lagging goal is flagged at risk.
    pub const GOAL_AT_RISK_DAYS_LEFT: i64 = 2;
}
