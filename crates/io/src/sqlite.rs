// SQLite attempt source: range query over a payments table

use std::path::PathBuf;

use chrono::Timelike;
use rusqlite::types::ValueRef;
use rusqlite::{params, Connection, OpenFlags};

use payreport_retry::config::{ColumnMapping, MetadataFlag};
use payreport_retry::model::AttemptRecord;
use payreport_retry::normalize::parse_timestamp;
use payreport_retry::RetryError;

use crate::source::{AttemptSource, ColumnIndex};

/// Where the payments table lives. Passed explicitly to every query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    pub database: PathBuf,
    pub table: String,
}

impl ConnectionConfig {
    /// Open the database read-only. A missing file is an error, never a
    /// freshly created empty database.
    pub fn open(&self) -> Result<Connection, RetryError> {
        Connection::open_with_flags(
            &self.database,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| RetryError::Database(format!("{}: {e}", self.database.display())))
    }
}

/// Attempts whose `created_at` falls in `[start, end)`.
#[derive(Debug, Clone)]
pub struct SqliteSource {
    pub connection: ConnectionConfig,
    pub start: String,
    pub end: String,
    /// Backup flag extracted from a JSON column instead of `columns.backup_flag`.
    pub metadata_flag: Option<MetadataFlag>,
    pub columns: ColumnMapping,
}

/// Alias of the extracted metadata flag in the result set.
const FLAG_ALIAS: &str = "__backup_flag";

impl AttemptSource for SqliteSource {
    fn describe(&self) -> String {
        format!(
            "sqlite {} table {} [{}, {})",
            self.connection.database.display(),
            self.connection.table,
            self.start,
            self.end
        )
    }

    fn load(&self) -> Result<Vec<AttemptRecord>, RetryError> {
        let conn = self.connection.open()?;
        let origin = format!(
            "{} table {}",
            self.connection.database.display(),
            self.connection.table
        );

        let table_columns = table_columns(&conn, &self.connection.table)?;
        if table_columns.is_empty() {
            return Err(RetryError::Database(format!("{origin}: no such table")));
        }

        // Column check against the table schema, before any rows are read
        let mut required = self.columns.clone();
        if let Some(ref flag) = self.metadata_flag {
            required.backup_flag = Some(flag.column.clone());
        }
        ColumnIndex::resolve(&origin, &required, &table_columns)?;

        let (sql, selected) = self.build_query();
        log::debug!("{sql}");

        let start = bound(&self.start)?;
        let end = bound(&self.end)?;
        let flag_path = self.metadata_flag.as_ref().map(|f| f.path.as_str());

        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| RetryError::Database(format!("{origin}: {e}")))?;

        let rows = match flag_path {
            Some(path) => stmt.query_map(params![start, end, path], row_fields(selected.len())),
            None => stmt.query_map(params![start, end], row_fields(selected.len())),
        }
        .map_err(|e| RetryError::Database(format!("{origin}: {e}")))?;

        let index = ColumnIndex::resolve(&origin, &self.select_mapping(), &selected)?;
        let mut records = Vec::new();
        for (i, row) in rows.enumerate() {
            let fields = row.map_err(|e| RetryError::Database(format!("{origin}: {e}")))?;
            records.push(index.record(i + 1, &fields));
        }
        Ok(records)
    }
}

impl SqliteSource {
    /// The mapping as seen by the result set: the metadata flag, when used,
    /// arrives under [`FLAG_ALIAS`].
    fn select_mapping(&self) -> ColumnMapping {
        let mut mapping = self.columns.clone();
        if self.metadata_flag.is_some() {
            mapping.backup_flag = Some(FLAG_ALIAS.to_string());
        }
        mapping
    }

    /// `SELECT` over the mapped columns, range-bound on `created_at`.
    /// Returns the SQL and the result-set column names in order.
    fn build_query(&self) -> (String, Vec<String>) {
        let mapping = self.select_mapping();
        let selected = mapping.mapped_columns();

        let exprs: Vec<String> = selected
            .iter()
            .map(|name| match &self.metadata_flag {
                Some(flag) if name == FLAG_ALIAS => format!(
                    "json_extract({}, ?3) AS {}",
                    quote_ident(&flag.column),
                    quote_ident(FLAG_ALIAS)
                ),
                _ => quote_ident(name),
            })
            .collect();

        let created_at = quote_ident(&self.columns.created_at);
        let sql = format!(
            "SELECT {} FROM {} WHERE {created_at} >= ?1 AND {created_at} < ?2 ORDER BY {created_at}",
            exprs.join(", "),
            quote_ident(&self.connection.table),
        );
        (sql, selected)
    }
}

fn row_fields(
    width: usize,
) -> impl FnMut(&rusqlite::Row<'_>) -> rusqlite::Result<Vec<Option<String>>> {
    move |row| {
        (0..width)
            .map(|i| row.get_ref(i).map(value_text))
            .collect()
    }
}

fn value_text(value: ValueRef<'_>) -> Option<String> {
    match value {
        ValueRef::Null => None,
        ValueRef::Integer(i) => Some(i.to_string()),
        ValueRef::Real(f) => Some(f.to_string()),
        ValueRef::Text(t) | ValueRef::Blob(t) => {
            let s = String::from_utf8_lossy(t);
            if s.is_empty() {
                None
            } else {
                Some(s.into_owned())
            }
        }
    }
}

/// Column names of `table`, in schema order. Empty when the table is absent.
fn table_columns(conn: &Connection, table: &str) -> Result<Vec<String>, RetryError> {
    let mut stmt = conn
        .prepare(&format!("PRAGMA table_info({})", quote_ident(table)))
        .map_err(|e| RetryError::Database(e.to_string()))?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(1))
        .map_err(|e| RetryError::Database(e.to_string()))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| RetryError::Database(e.to_string()))?;
    Ok(names)
}

/// Range bounds are compared as text in the `YYYY-MM-DD HH:MM:SS` layout,
/// with milliseconds kept when the bound has any.
fn bound(raw: &str) -> Result<String, RetryError> {
    let t = parse_timestamp(raw, None)
        .ok_or_else(|| RetryError::ConfigValidation(format!("cannot parse range bound '{raw}'")))?;
    let layout = if t.nanosecond() == 0 {
        "%Y-%m-%d %H:%M:%S"
    } else {
        "%Y-%m-%d %H:%M:%S%.3f"
    };
    Ok(t.format(layout).to_string())
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
