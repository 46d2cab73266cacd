// Attempt sources: where payment attempt rows come from

use std::path::{Path, PathBuf};

use payreport_retry::config::{ColumnMapping, ReportConfig, SourceKind};
use payreport_retry::model::{AttemptRecord, EntityKey};
use payreport_retry::RetryError;

use crate::sqlite::ConnectionConfig;

/// A place payment attempts can be loaded from.
pub trait AttemptSource {
    /// Human-readable origin, used in log lines and error messages.
    fn describe(&self) -> String;

    /// Load every attempt row. An empty vector is not an error here.
    fn load(&self) -> Result<Vec<AttemptRecord>, RetryError>;
}

/// Build the source described by `config`. Relative paths resolve against
/// `base_dir` (the directory holding the config file).
pub fn open_source(
    config: &ReportConfig,
    base_dir: &Path,
) -> Result<Box<dyn AttemptSource>, RetryError> {
    let src = &config.source;
    let columns = config.columns.clone();

    let source: Box<dyn AttemptSource> = match src.kind {
        SourceKind::Csv => Box::new(crate::csv::CsvSource {
            path: resolve_path(base_dir, required(&src.file, "file")?),
            encoding: src.encoding.clone(),
            columns,
        }),
        SourceKind::Json => Box::new(crate::json::JsonSource {
            path: resolve_path(base_dir, required(&src.file, "file")?),
            columns,
        }),
        SourceKind::Sqlite => Box::new(crate::sqlite::SqliteSource {
            connection: ConnectionConfig {
                database: resolve_path(base_dir, required(&src.database, "database")?),
                table: src.table.clone(),
            },
            start: required(&src.start, "start")?.to_string(),
            end: required(&src.end, "end")?.to_string(),
            metadata_flag: src.metadata_flag.clone(),
            columns,
        }),
    };

    Ok(source)
}

fn required<'a>(value: &'a Option<String>, field: &str) -> Result<&'a str, RetryError> {
    value.as_deref().ok_or_else(|| {
        RetryError::ConfigValidation(format!("source.{field} is required for this source kind"))
    })
}

pub fn resolve_path(base_dir: &Path, path: &str) -> PathBuf {
    let p = Path::new(path);
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        base_dir.join(p)
    }
}

// ---------------------------------------------------------------------------
// Header → record projection (shared by tabular sources)
// ---------------------------------------------------------------------------

/// Positions of the mapped columns within a header row.
#[derive(Debug, Clone)]
pub(crate) struct ColumnIndex {
    id: Option<usize>,
    key: Vec<usize>,
    created_at: usize,
    status: usize,
    payment_method: Option<usize>,
    backup_flag: Option<usize>,
    customer_id: Option<usize>,
}

impl ColumnIndex {
    /// Locate every mapped column in `headers`. Any that are absent are
    /// reported together.
    pub(crate) fn resolve(
        origin: &str,
        mapping: &ColumnMapping,
        headers: &[String],
    ) -> Result<Self, RetryError> {
        let expected = mapping.mapped_columns();
        let missing: Vec<String> = expected
            .iter()
            .filter(|name| !headers.iter().any(|h| h == *name))
            .cloned()
            .collect();
        if !missing.is_empty() {
            return Err(RetryError::MissingRequiredColumn {
                origin: origin.to_string(),
                missing,
                expected,
                found: headers.to_vec(),
            });
        }

        // Every mapped name was found above
        let pos = |name: &str| headers.iter().position(|h| h == name).unwrap_or(0);
        let opt = |name: &Option<String>| name.as_deref().map(pos);

        Ok(Self {
            id: opt(&mapping.id),
            key: mapping.entity_key.names().iter().map(|n| pos(n)).collect(),
            created_at: pos(&mapping.created_at),
            status: pos(&mapping.status),
            payment_method: opt(&mapping.payment_method),
            backup_flag: opt(&mapping.backup_flag),
            customer_id: opt(&mapping.customer_id),
        })
    }

    /// Project one row. `row_number` is 1-based and stands in for the id
    /// when no id column is mapped.
    pub(crate) fn record(&self, row_number: usize, fields: &[Option<String>]) -> AttemptRecord {
        let get = |i: usize| fields.get(i).cloned().flatten();
        let text = |i: usize| get(i).unwrap_or_default();

        AttemptRecord {
            id: match self.id {
                Some(i) => text(i),
                None => row_number.to_string(),
            },
            entity_key: EntityKey(self.key.iter().map(|&i| text(i)).collect()),
            created_at: text(self.created_at),
            status: text(self.status),
            payment_method: self.payment_method.and_then(get),
            backup_flag: self.backup_flag.and_then(get),
            customer_id: self.customer_id.and_then(get),
        }
    }
}

/// Columns every individual record must carry: the id when mapped, the key
/// parts, `created_at` and `status`.
pub(crate) fn required_columns(mapping: &ColumnMapping) -> Vec<String> {
    let mut cols: Vec<String> = Vec::new();
    let names = mapping
        .id
        .iter()
        .chain(mapping.entity_key.names())
        .chain([&mapping.created_at, &mapping.status]);
    for name in names {
        if !cols.contains(name) {
            cols.push(name.clone());
        }
    }
    cols
}

/// Empty cells read as missing values.
pub(crate) fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}
