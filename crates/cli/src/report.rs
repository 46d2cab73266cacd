//! `payreport run|validate|csv|db`: load attempts, aggregate, write the workbook.

use std::path::{Path, PathBuf};

use payreport_io::source::{open_source, resolve_path};
use payreport_io::tables::{report_tables, TIMESTAMP_FORMAT};
use payreport_io::xlsx;
use payreport_retry::config::ReportConfig;
use payreport_retry::model::RetryReport;
use payreport_retry::RetryError;

use crate::util::render_columns;
use crate::{CliError, OutputArgs};

/// Rows shown in the console's backup-resolved listing.
const TOP_N: usize = 10;
const CONSOLE_COLUMN_WIDTH: usize = 40;

pub fn cmd_run(
    config_path: PathBuf,
    output: Option<PathBuf>,
    out: OutputArgs,
) -> Result<(), CliError> {
    let config = load_config(&config_path)?;

    // Resolve file paths relative to config file's directory
    let base_dir = config_path.parent().unwrap_or_else(|| Path::new("."));
    let workbook = output.unwrap_or_else(|| {
        resolve_path(base_dir, &config.report_file_name())
    });

    execute(&config, base_dir, &workbook, &out)
}

pub fn cmd_validate(config_path: PathBuf) -> Result<(), CliError> {
    let config = load_config(&config_path)?;
    let policy = config.policy()?;
    eprintln!(
        "ok: \"{}\" ({} source, {} policy, {} mapped column(s))",
        config.name,
        config.source.kind,
        policy,
        config.columns.mapped_columns().len()
    );
    Ok(())
}

pub fn cmd_csv(
    input: PathBuf,
    output: PathBuf,
    encoding: Option<String>,
    out: OutputArgs,
) -> Result<(), CliError> {
    let mut config = ReportConfig::stripe_export(input.to_string_lossy());
    config.source.encoding = encoding;
    config.validate()?;

    execute(&config, Path::new("."), &output, &out)
}

pub fn cmd_db(
    database: PathBuf,
    start: String,
    end: String,
    table: String,
    output: Option<PathBuf>,
    out: OutputArgs,
) -> Result<(), CliError> {
    let mut config = ReportConfig::payments_table(database.to_string_lossy(), start, end);
    config.source.table = table;
    config.validate()?;

    let workbook = output.unwrap_or_else(|| PathBuf::from(config.report_file_name()));
    execute(&config, Path::new("."), &workbook, &out)
}

fn load_config(path: &Path) -> Result<ReportConfig, CliError> {
    let config_str = std::fs::read_to_string(path)
        .map_err(|e| CliError::io(format!("cannot read config {}: {e}", path.display())))?;
    Ok(ReportConfig::from_toml(&config_str)?)
}

/// Load, aggregate and write. An empty source writes nothing and succeeds.
fn execute(
    config: &ReportConfig,
    base_dir: &Path,
    workbook: &Path,
    out: &OutputArgs,
) -> Result<(), CliError> {
    let is_xlsx = workbook
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("xlsx"));
    if !is_xlsx {
        return Err(CliError::args(format!(
            "workbook path must end in .xlsx: {}",
            workbook.display()
        ))
        .with_hint("pass -o <name>.xlsx"));
    }

    let source = open_source(config, base_dir)?;
    log::info!("loading attempts from {}", source.describe());
    let records = source.load()?;
    log::info!("loaded {} attempt row(s)", records.len());

    if records.is_empty() {
        eprintln!("{}; no report written.", RetryError::EmptyInput(source.describe()));
        return Ok(());
    }

    let report = payreport_retry::run(config, &records)?;

    let include_detail = out.include_detail || config.output.include_detail;
    let tables = report_tables(&report, &config.columns, include_detail);
    xlsx::export(&tables, workbook, config.output.max_column_width)
        .map_err(|e| CliError::io(format!("{}: {e}", workbook.display())))?;

    if out.json || out.json_output.is_some() {
        let json_str = serde_json::to_string_pretty(&report)
            .map_err(|e| CliError::other(format!("JSON serialization error: {e}")))?;

        if let Some(ref path) = out.json_output {
            std::fs::write(path, &json_str)
                .map_err(|e| CliError::io(format!("cannot write output: {e}")))?;
            eprintln!("wrote {}", path.display());
        }
        if out.json {
            println!("{json_str}");
        }
    }

    for line in console_summary(&report, config) {
        eprintln!("{line}");
    }
    eprintln!("wrote {}", workbook.display());

    Ok(())
}

/// Control totals plus the first backup-resolved payments, for stderr.
fn console_summary(report: &RetryReport, config: &ReportConfig) -> Vec<String> {
    let s = &report.summary;
    let mut lines = vec![
        format!(
            "{}: {} payment(s) from {} attempt(s)",
            report.meta.report_name, s.total_payments, report.meta.attempt_count
        ),
        format!(
            "  with errors: {}  resolved: {}  resolved by backup: {}",
            s.with_error, s.resolved, s.resolved_by_backup
        ),
    ];

    let backup = report.backup_resolved();
    if backup.is_empty() {
        lines.push("No backup-resolved payments in this range.".into());
        return lines;
    }

    lines.push(format!(
        "Backup-resolved payments (first {} of {}):",
        backup.len().min(TOP_N),
        backup.len()
    ));

    let with_customer = config.columns.customer_id.is_some();
    let mut header = vec!["KEY"];
    if with_customer {
        header.push("CUSTOMER");
    }
    header.extend(["ATTEMPTS", "LAST ATTEMPT"]);

    let rows: Vec<Vec<String>> = backup
        .iter()
        .take(TOP_N)
        .map(|row| {
            let mut cells = vec![row.entity_key.to_string()];
            if with_customer {
                cells.push(row.customer_id.clone().unwrap_or_default());
            }
            cells.push(row.attempts.to_string());
            cells.push(row.last_attempt_at.format(TIMESTAMP_FORMAT).to_string());
            cells
        })
        .collect();

    lines.extend(
        render_columns(&header, &rows, CONSOLE_COLUMN_WIDTH)
            .into_iter()
            .map(|l| format!("  {l}")),
    );
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use payreport_retry::model::{AttemptRecord, EntityKey};

    fn rec(id: &str, key: &str, at: &str, status: &str, flag: &str) -> AttemptRecord {
        AttemptRecord {
            id: id.into(),
            entity_key: EntityKey::single(key),
            created_at: at.into(),
            status: status.into(),
            backup_flag: Some(flag.into()),
            customer_id: Some(format!("cus_{key}")),
            ..Default::default()
        }
    }

    #[test]
    fn summary_lists_backup_resolved() {
        let config = ReportConfig::payments_table("db", "2025-12-01", "2026-01-01");
        let records = vec![
            rec("1", "sub_1", "2025-12-02 10:00:00", "FAILED", "false"),
            rec("2", "sub_1", "2025-12-03 10:00:00", "SUCCESS", "true"),
            rec("3", "sub_2", "2025-12-02 11:00:00", "SUCCESS", "false"),
        ];
        let report = payreport_retry::run(&config, &records).unwrap();
        let lines = console_summary(&report, &config);

        assert_eq!(lines[0], "Backup payment methods: 2 payment(s) from 3 attempt(s)");
        assert!(lines[1].contains("resolved by backup: 1"));
        assert!(lines[3].contains("CUSTOMER"));
        assert!(lines[4].contains("sub_1"));
        assert!(lines[4].contains("cus_sub_1"));
        assert!(lines[4].ends_with("2025-12-03 10:00:00.000"));
    }

    #[test]
    fn summary_without_backup_says_so() {
        let config = ReportConfig::payments_table("db", "2025-12-01", "2026-01-01");
        let records = vec![rec("1", "sub_1", "2025-12-02 10:00:00", "FAILED", "false")];
        let report = payreport_retry::run(&config, &records).unwrap();
        let lines = console_summary(&report, &config);
        assert_eq!(lines.last().unwrap(), "No backup-resolved payments in this range.");
    }
}
