// Report → named tables, ready for a spreadsheet sink

use chrono::NaiveDateTime;

use payreport_retry::config::ColumnMapping;
use payreport_retry::model::{BackupEvidence, DetailRow, RetryReport};
use payreport_retry::summary::MetricValue;
use payreport_retry::ResolutionPolicy;

pub const BACKUP_RESOLVED_SHEET: &str = "Backup Resolved";
pub const SUMMARY_SHEET: &str = "Summary";
pub const DETAIL_SHEET: &str = "All Payments (Detail)";

/// Display format of timestamp cells.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Text(String),
    Int(i64),
    /// A fraction rendered as a percentage.
    Ratio(f64),
    DateTime(NaiveDateTime),
    Empty,
}

impl Cell {
    fn text(s: impl Into<String>) -> Self {
        Cell::Text(s.into())
    }

    fn yes_no(b: bool) -> Self {
        Cell::text(if b { "Yes" } else { "No" })
    }

    /// Characters the cell occupies when displayed; drives column fitting.
    pub fn display_len(&self) -> usize {
        match self {
            Cell::Text(s) => s.chars().count(),
            Cell::Int(n) => n.to_string().len(),
            Cell::Ratio(r) => format!("{:.2}%", r * 100.0).len(),
            Cell::DateTime(dt) => dt.format(TIMESTAMP_FORMAT).to_string().len(),
            Cell::Empty => 0,
        }
    }
}

/// A named sheet's worth of data.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub name: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

/// Tables in workbook order: Backup Resolved, Summary, then Detail when
/// requested.
pub fn report_tables(
    report: &RetryReport,
    columns: &ColumnMapping,
    include_detail: bool,
) -> Vec<Table> {
    let backup: Vec<&DetailRow> = report.backup_resolved();
    let mut tables = vec![
        payment_table(BACKUP_RESOLVED_SHEET, &backup, columns, report.meta.policy),
        summary_table(report),
    ];
    if include_detail {
        let all: Vec<&DetailRow> = report.detail.iter().collect();
        tables.push(payment_table(DETAIL_SHEET, &all, columns, report.meta.policy));
    }
    tables
}

pub fn summary_table(report: &RetryReport) -> Table {
    let rows = report
        .summary
        .metrics()
        .into_iter()
        .map(|m| {
            let value = match m.value {
                MetricValue::Count(n) => Cell::Int(n as i64),
                MetricValue::Ratio(r) => Cell::Ratio(r),
            };
            vec![Cell::text(m.label), value]
        })
        .collect();

    Table {
        name: SUMMARY_SHEET.into(),
        headers: vec!["Metric".into(), "Value".into()],
        rows,
    }
}

/// Column headers of the per-payment tables.
pub fn payment_headers(columns: &ColumnMapping, policy: ResolutionPolicy) -> Vec<String> {
    let mut headers: Vec<String> = Vec::new();
    if let Some(ref customer) = columns.customer_id {
        headers.push(customer.clone());
    }
    headers.extend(columns.entity_key.names().iter().cloned());
    headers.extend(
        [
            "Attempts",
            "Had Error",
            "Resolved",
            "Resolved by Backup",
            "First Attempt UTC",
            "Last Attempt UTC",
            "Last Attempt Status",
            "Last Attempt ID",
        ]
        .map(String::from),
    );
    match policy {
        ResolutionPolicy::ExplicitFlag => headers.push("Last Attempt BackupPayment".into()),
        ResolutionPolicy::MethodSwitch => {
            headers.push("Failed Method IDs".into());
            headers.push("Resolving Method ID".into());
        }
    }
    headers
}

fn payment_table(
    name: &str,
    rows: &[&DetailRow],
    columns: &ColumnMapping,
    policy: ResolutionPolicy,
) -> Table {
    let with_customer = columns.customer_id.is_some();
    let rows = rows
        .iter()
        .map(|row| {
            let mut cells = Vec::new();
            if with_customer {
                cells.push(row.customer_id.clone().map_or(Cell::Empty, Cell::Text));
            }
            cells.extend(row.entity_key.parts().iter().map(|p| Cell::text(p.as_str())));
            cells.push(Cell::Int(row.attempts as i64));
            cells.push(Cell::yes_no(row.had_error));
            cells.push(Cell::yes_no(row.resolved));
            cells.push(Cell::yes_no(row.resolved_by_backup));
            cells.push(Cell::DateTime(row.first_attempt_at));
            cells.push(Cell::DateTime(row.last_attempt_at));
            cells.push(Cell::text(row.last_attempt_status.as_str()));
            cells.push(Cell::text(row.last_attempt_id.as_str()));
            cells.extend(evidence_cells(&row.evidence));
            cells
        })
        .collect();

    Table {
        name: name.into(),
        headers: payment_headers(columns, policy),
        rows,
    }
}

fn evidence_cells(evidence: &BackupEvidence) -> Vec<Cell> {
    match evidence {
        BackupEvidence::ExplicitFlag {
            last_attempt_backup,
        } => vec![Cell::text(last_attempt_backup.to_string())],
        BackupEvidence::MethodSwitch {
            failed_methods,
            resolving_method,
        } => {
            let failed = failed_methods
                .iter()
                .map(String::as_str)
                .collect::<Vec<_>>()
                .join(", ");
            vec![
                Cell::text(format!("{{{failed}}}")),
                Cell::text(resolving_method.as_deref().unwrap_or("(none)")),
            ]
        }
    }
}
