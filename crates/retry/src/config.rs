use serde::Deserialize;

use crate::error::RetryError;
use crate::normalize::parse_timestamp;
use crate::policy::ResolutionPolicy;
use crate::summary::ErrorRateBasis;

pub const DEFAULT_MAX_COLUMN_WIDTH: u16 = 55;
pub const DEFAULT_REPORT_FILE: &str = "backup_payment_report.xlsx";

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct ReportConfig {
    pub name: String,
    pub source: SourceConfig,
    pub columns: ColumnMapping,
    /// Explicit policy. Inferred from `columns` when omitted.
    #[serde(default)]
    pub policy: Option<ResolutionPolicy>,
    #[serde(default)]
    pub summary: SummaryConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

// ---------------------------------------------------------------------------
// Source
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    pub kind: SourceKind,
    /// CSV / JSON file, relative to the config file.
    #[serde(default)]
    pub file: Option<String>,
    /// CSV encoding label (`utf-8`, `latin1`, `windows-1252`, ...).
    #[serde(default)]
    pub encoding: Option<String>,
    /// SQLite database path, relative to the config file.
    #[serde(default)]
    pub database: Option<String>,
    #[serde(default = "default_table")]
    pub table: String,
    /// Inclusive lower bound on `created_at` (sqlite only).
    #[serde(default)]
    pub start: Option<String>,
    /// Exclusive upper bound on `created_at` (sqlite only).
    #[serde(default)]
    pub end: Option<String>,
    /// Read the backup flag out of a JSON metadata column (sqlite only).
    #[serde(default)]
    pub metadata_flag: Option<MetadataFlag>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Csv,
    Json,
    Sqlite,
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Csv => write!(f, "csv"),
            Self::Json => write!(f, "json"),
            Self::Sqlite => write!(f, "sqlite"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MetadataFlag {
    pub column: String,
    pub path: String,
}

fn default_table() -> String {
    "payments".into()
}

// ---------------------------------------------------------------------------
// Column mapping
// ---------------------------------------------------------------------------

/// One column name, or several forming a composite key.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum KeyColumns {
    Single(String),
    Composite(Vec<String>),
}

impl KeyColumns {
    pub fn names(&self) -> &[String] {
        match self {
            Self::Single(name) => std::slice::from_ref(name),
            Self::Composite(names) => names,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ColumnMapping {
    /// Attempt id. When unmapped, the 1-based row number is used.
    #[serde(default)]
    pub id: Option<String>,
    pub entity_key: KeyColumns,
    pub created_at: String,
    pub status: String,
    #[serde(default)]
    pub payment_method: Option<String>,
    #[serde(default)]
    pub backup_flag: Option<String>,
    #[serde(default)]
    pub customer_id: Option<String>,
    /// chrono layout for `created_at`; flexible parsing when omitted.
    #[serde(default)]
    pub timestamp_format: Option<String>,
}

impl ColumnMapping {
    /// Every mapped column name, in report order, without duplicates.
    pub fn mapped_columns(&self) -> Vec<String> {
        let mut cols: Vec<String> = Vec::new();
        let mut push = |name: &String| {
            if !cols.contains(name) {
                cols.push(name.clone());
            }
        };

        if let Some(ref id) = self.id {
            push(id);
        }
        for name in self.entity_key.names() {
            push(name);
        }
        push(&self.created_at);
        push(&self.status);
        for name in [&self.payment_method, &self.backup_flag, &self.customer_id]
            .into_iter()
            .flatten()
        {
            push(name);
        }
        cols
    }
}

// ---------------------------------------------------------------------------
// Summary + Output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SummaryConfig {
    #[serde(default)]
    pub error_rate: ErrorRateBasis,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Workbook path. Derived from the date range when omitted.
    #[serde(default)]
    pub file: Option<String>,
    /// Also write the "All Payments (Detail)" sheet.
    #[serde(default)]
    pub include_detail: bool,
    #[serde(default = "default_max_column_width")]
    pub max_column_width: u16,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            file: None,
            include_detail: false,
            max_column_width: DEFAULT_MAX_COLUMN_WIDTH,
        }
    }
}

fn default_max_column_width() -> u16 {
    DEFAULT_MAX_COLUMN_WIDTH
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl ReportConfig {
    pub fn from_toml(input: &str) -> Result<Self, RetryError> {
        let config: ReportConfig =
            toml::from_str(input).map_err(|e| RetryError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), RetryError> {
        if self.name.trim().is_empty() {
            return Err(RetryError::ConfigValidation("name must not be empty".into()));
        }

        let key_names = self.columns.entity_key.names();
        if key_names.is_empty() || key_names.iter().any(|n| n.trim().is_empty()) {
            return Err(RetryError::ConfigValidation(
                "columns.entity_key needs at least one non-empty column name".into(),
            ));
        }

        let src = &self.source;
        match src.kind {
            SourceKind::Csv | SourceKind::Json => {
                if src.file.is_none() {
                    return Err(RetryError::ConfigValidation(format!(
                        "{} source requires `file`",
                        src.kind
                    )));
                }
                if src.start.is_some() || src.end.is_some() || src.metadata_flag.is_some() {
                    return Err(RetryError::ConfigValidation(format!(
                        "`start`, `end` and `metadata_flag` apply only to sqlite sources, not {}",
                        src.kind
                    )));
                }
            }
            SourceKind::Sqlite => {
                if src.database.is_none() {
                    return Err(RetryError::ConfigValidation(
                        "sqlite source requires `database`".into(),
                    ));
                }
                let (Some(start), Some(end)) = (&src.start, &src.end) else {
                    return Err(RetryError::ConfigValidation(
                        "sqlite source requires both `start` and `end`".into(),
                    ));
                };
                let start_at = parse_timestamp(start, None).ok_or_else(|| {
                    RetryError::ConfigValidation(format!("cannot parse start '{start}'"))
                })?;
                let end_at = parse_timestamp(end, None).ok_or_else(|| {
                    RetryError::ConfigValidation(format!("cannot parse end '{end}'"))
                })?;
                if start_at >= end_at {
                    return Err(RetryError::ConfigValidation(format!(
                        "start '{start}' must be before end '{end}'"
                    )));
                }
            }
        }

        // Resolves and checks the policy's column
        self.policy()?;

        let width = self.output.max_column_width;
        if width == 0 || width > 255 {
            return Err(RetryError::ConfigValidation(format!(
                "output.max_column_width must be between 1 and 255, got {width}"
            )));
        }

        Ok(())
    }

    /// Effective resolution policy: the configured one, or inferred from
    /// which columns are mapped (a backup flag wins over a method id).
    pub fn policy(&self) -> Result<ResolutionPolicy, RetryError> {
        let has_flag =
            self.columns.backup_flag.is_some() || self.source.metadata_flag.is_some();
        let has_method = self.columns.payment_method.is_some();

        match self.policy {
            Some(ResolutionPolicy::ExplicitFlag) if !has_flag => {
                Err(RetryError::ConfigValidation(
                    "policy explicit_flag requires columns.backup_flag or source.metadata_flag"
                        .into(),
                ))
            }
            Some(ResolutionPolicy::MethodSwitch) if !has_method => {
                Err(RetryError::ConfigValidation(
                    "policy method_switch requires columns.payment_method".into(),
                ))
            }
            Some(policy) => Ok(policy),
            None if has_flag => Ok(ResolutionPolicy::ExplicitFlag),
            None if has_method => Ok(ResolutionPolicy::MethodSwitch),
            None => Err(RetryError::ConfigValidation(
                "cannot infer policy: map columns.backup_flag or columns.payment_method".into(),
            )),
        }
    }

    /// Output workbook name. Range reports encode their bounds.
    pub fn report_file_name(&self) -> String {
        if let Some(ref file) = self.output.file {
            return file.clone();
        }
        match (&self.source.start, &self.source.end) {
            (Some(start), Some(end)) => {
                sanitize_file_name(&format!("backup_payment_methods_{start}_to_{end}.xlsx"))
            }
            _ => DEFAULT_REPORT_FILE.into(),
        }
    }

    /// Preset for a Stripe-style payments CSV export: attempts grouped by
    /// (Customer Email, Description), backup inferred from `Card ID`.
    pub fn stripe_export(file: impl Into<String>) -> Self {
        Self {
            name: "Backup payment methods (CSV export)".into(),
            source: SourceConfig {
                kind: SourceKind::Csv,
                file: Some(file.into()),
                encoding: None,
                database: None,
                table: default_table(),
                start: None,
                end: None,
                metadata_flag: None,
            },
            columns: ColumnMapping {
                id: None,
                entity_key: KeyColumns::Composite(vec![
                    "Customer Email".into(),
                    "Description".into(),
                ]),
                created_at: "Created date (UTC)".into(),
                status: "Status".into(),
                payment_method: Some("Card ID".into()),
                backup_flag: None,
                customer_id: None,
                timestamp_format: Some("%Y-%m-%d %H:%M:%S".into()),
            },
            policy: Some(ResolutionPolicy::MethodSwitch),
            summary: SummaryConfig {
                error_rate: ErrorRateBasis::ErrorsOverPayments,
            },
            output: OutputConfig::default(),
        }
    }

    /// Preset for the `payments` table: one payment per `entityId`, backup
    /// flag read from `metadata ->> '$.isBackupPayment'`.
    pub fn payments_table(
        database: impl Into<String>,
        start: impl Into<String>,
        end: impl Into<String>,
    ) -> Self {
        Self {
            name: "Backup payment methods".into(),
            source: SourceConfig {
                kind: SourceKind::Sqlite,
                file: None,
                encoding: None,
                database: Some(database.into()),
                table: default_table(),
                start: Some(start.into()),
                end: Some(end.into()),
                metadata_flag: Some(MetadataFlag {
                    column: "metadata".into(),
                    path: "$.isBackupPayment".into(),
                }),
            },
            columns: ColumnMapping {
                id: Some("id".into()),
                entity_key: KeyColumns::Single("entityId".into()),
                created_at: "createdAt".into(),
                status: "status".into(),
                payment_method: None,
                backup_flag: None,
                customer_id: Some("customerId".into()),
                timestamp_format: None,
            },
            policy: Some(ResolutionPolicy::ExplicitFlag),
            summary: SummaryConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

/// Make a report name filesystem-safe: `:` becomes `-`, spaces become `_`.
pub fn sanitize_file_name(name: &str) -> String {
    name.replace(':', "-").replace(' ', "_")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
