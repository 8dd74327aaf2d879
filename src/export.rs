//! Delimited-text export of record views.
//!
//! Serialization writes into any `io::Write` sink and knows nothing about
//! delivery; `write_export_file` is one delivery mechanism on top of it.

use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::constants::export::{
    DELIMITER, FILE_EXTENSION, FILE_TIMESTAMP_FORMAT, LINE_TERMINATOR, QUOTE,
};
use crate::constants::filter::{OWNER_FACET, TAGS_FIELD};
use crate::data::DataRecord;
use crate::errors::ViewError;
use crate::schema::EntitySchema;

type Accessor = Arc<dyn Fn(&DataRecord) -> String + Send + Sync>;

/// One exported column: header text plus a field accessor.
#[derive(Clone)]
pub struct Column {
    name: String,
    accessor: Accessor,
}

impl Column {
    /// Column computed by `accessor`.
    pub fn new<F>(name: impl Into<String>, accessor: F) -> Self
    where
        F: Fn(&DataRecord) -> String + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            accessor: Arc::new(accessor),
        }
    }

    /// Column rendering a named field (empty when absent).
    pub fn field(name: impl Into<String>, field: impl Into<String>) -> Self {
        let field = field.into();
        Self::new(name, move |record| record.field_text(&field).unwrap_or_default())
    }

    /// Column rendering the record id.
    pub fn id(name: impl Into<String>) -> Self {
        Self::new(name, |record| record.id().to_string())
    }

    /// Column rendering the record timestamp as RFC 3339.
    pub fn timestamp(name: impl Into<String>) -> Self {
        Self::new(name, |record| record.timestamp.to_rfc3339())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self, record: &DataRecord) -> String {
        (self.accessor)(record)
    }
}

impl fmt::Debug for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Column").field("name", &self.name).finish()
    }
}

/// Default columns for `schema`: id, timestamp, owner, then every declared field.
pub fn schema_columns(schema: &EntitySchema) -> Vec<Column> {
    let mut columns = vec![
        Column::id("ID"),
        Column::timestamp("Timestamp"),
        Column::field("Owner", OWNER_FACET),
    ];
    for field in schema.facets().keys() {
        columns.push(Column::field(schema.label(field), field.clone()));
    }
    for field in schema.numeric_fields().keys() {
        columns.push(Column::field(schema.label(field), field.clone()));
    }
    for field in schema.search_fields() {
        if field == OWNER_FACET || schema.facets().contains_key(&field) {
            continue;
        }
        if field == TAGS_FIELD {
            columns.push(Column::field("Tags", field));
            continue;
        }
        columns.push(Column::field(schema.label(&field), field));
    }
    columns
}

/// Quote `value` when it contains the delimiter, a quote, or a line break.
pub fn escape_field(value: &str) -> String {
    let needs_quotes = value
        .chars()
        .any(|ch| ch == DELIMITER || ch == QUOTE || ch == '\n' || ch == '\r');
    if !needs_quotes {
        return value.to_string();
    }
    let mut escaped = String::with_capacity(value.len() + 2);
    escaped.push(QUOTE);
    for ch in value.chars() {
        if ch == QUOTE {
            escaped.push(QUOTE);
        }
        escaped.push(ch);
    }
    escaped.push(QUOTE);
    escaped
}

/// Render one delimited line (without terminator).
pub fn format_row<I, S>(fields: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut line = String::new();
    for (idx, field) in fields.into_iter().enumerate() {
        if idx > 0 {
            line.push(DELIMITER);
        }
        line.push_str(&escape_field(field.as_ref()));
    }
    line
}

/// Write a header line and one line per record to `sink`.
///
/// Returns the number of data rows written.
pub fn write_csv<'a, W, I>(sink: &mut W, columns: &[Column], records: I) -> Result<usize, ViewError>
where
    W: Write + ?Sized,
    I: IntoIterator<Item = &'a DataRecord>,
{
    if columns.is_empty() {
        return Err(ViewError::Export("no columns selected".to_string()));
    }
    write_line(sink, &format_row(columns.iter().map(Column::name)))?;
    let mut rows = 0usize;
    for record in records {
        let line = format_row(columns.iter().map(|column| column.value(record)));
        write_line(sink, &line)?;
        rows += 1;
    }
    sink.flush()?;
    Ok(rows)
}

/// Serialize to an in-memory string.
pub fn to_csv_string<'a, I>(columns: &[Column], records: I) -> Result<String, ViewError>
where
    I: IntoIterator<Item = &'a DataRecord>,
{
    let mut buffer = Vec::new();
    write_csv(&mut buffer, columns, records)?;
    String::from_utf8(buffer).map_err(|err| ViewError::Export(err.to_string()))
}

/// Export file name `<feature>-<timestamp>.csv`.
pub fn export_file_name(feature: &str, now: DateTime<Utc>) -> String {
    format!(
        "{}-{}.{}",
        feature,
        now.format(FILE_TIMESTAMP_FORMAT),
        FILE_EXTENSION
    )
}

/// Write an export file for `feature` inside `dir`, creating the directory.
///
/// The file is written to a temporary sibling first and renamed into place,
/// so a failed write never leaves a truncated export behind.
pub fn write_export_file<'a, I>(
    dir: &Path,
    feature: &str,
    now: DateTime<Utc>,
    columns: &[Column],
    records: I,
) -> Result<PathBuf, ViewError>
where
    I: IntoIterator<Item = &'a DataRecord>,
{
    fs::create_dir_all(dir)?;
    let path = dir.join(export_file_name(feature, now));
    let staging = path.with_extension(format!("{FILE_EXTENSION}.partial"));
    let result = (|| {
        let mut file = io::BufWriter::new(fs::File::create(&staging)?);
        write_csv(&mut file, columns, records)?;
        file.into_inner()
            .map_err(|err| ViewError::Io(err.into_error()))?
            .sync_all()?;
        fs::rename(&staging, &path)?;
        Ok::<_, ViewError>(())
    })();
    if let Err(err) = result {
        let _ = fs::remove_file(&staging);
        return Err(err);
    }
    Ok(path)
}

fn write_line<W: Write + ?Sized>(sink: &mut W, line: &str) -> Result<(), ViewError> {
    sink.write_all(line.as_bytes())?;
    sink.write_all(LINE_TERMINATOR.as_bytes())?;
    Ok(())
}
