// Excel (.xlsx) report export

use std::path::Path;

use rust_xlsxwriter::{Format, Workbook, Worksheet};

use crate::tables::{Cell, Table};

/// Excel number format of timestamp cells.
pub const DATETIME_NUM_FORMAT: &str = "yyyy-mm-dd hh:mm:ss.000";
pub const RATIO_NUM_FORMAT: &str = "0.00%";

/// Result of an Excel export operation
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ExportResult {
    /// Number of sheets exported
    pub sheets_exported: usize,
    /// Non-empty cells written, headers included
    pub cells_exported: usize,
}

impl ExportResult {
    /// Returns a summary message suitable for display
    pub fn summary(&self) -> String {
        format!(
            "{} sheet{}, {} cells",
            self.sheets_exported,
            if self.sheets_exported == 1 { "" } else { "s" },
            self.cells_exported
        )
    }
}

struct Formats {
    header: Format,
    datetime: Format,
    ratio: Format,
    plain: Format,
}

impl Formats {
    fn new() -> Self {
        Self {
            header: Format::new().set_bold(),
            datetime: Format::new().set_num_format(DATETIME_NUM_FORMAT),
            ratio: Format::new().set_num_format(RATIO_NUM_FORMAT),
            plain: Format::new(),
        }
    }
}

/// Write `tables` as one worksheet each, in order.
///
/// Headers are bold and frozen. Every column is fit to its widest cell
/// plus 2, capped at `max_column_width`.
pub fn export(
    tables: &[Table],
    path: &Path,
    max_column_width: u16,
) -> Result<ExportResult, String> {
    let mut result = ExportResult::default();
    let mut workbook = Workbook::new();
    let formats = Formats::new();

    for table in tables {
        let worksheet = workbook
            .add_worksheet()
            .set_name(&table.name)
            .map_err(|e| format!("Failed to create sheet '{}': {}", table.name, e))?;

        result.cells_exported += write_table(worksheet, table, &formats)?;
        fit_columns(worksheet, table, max_column_width)?;

        worksheet
            .set_freeze_panes(1, 0)
            .map_err(|e| format!("Failed to set freeze panes: {}", e))?;

        result.sheets_exported += 1;
    }

    workbook
        .save(path)
        .map_err(|e| format!("Failed to save XLSX file: {}", e))?;

    log::info!("wrote {} ({})", path.display(), result.summary());
    Ok(result)
}

fn write_table(worksheet: &mut Worksheet, table: &Table, formats: &Formats) -> Result<usize, String> {
    let mut cells = 0;

    for (col, header) in table.headers.iter().enumerate() {
        worksheet
            .write_string_with_format(0, col as u16, header, &formats.header)
            .map_err(|e| format!("Failed to write header '{}': {}", header, e))?;
        cells += 1;
    }

    for (r, row) in table.rows.iter().enumerate() {
        let xl_row = (r + 1) as u32;
        for (c, cell) in row.iter().enumerate() {
            let xl_col = c as u16;
            let written = match cell {
                Cell::Text(s) => worksheet
                    .write_string_with_format(xl_row, xl_col, s, &formats.plain)
                    .map(|_| true),
                Cell::Int(n) => worksheet
                    .write_number_with_format(xl_row, xl_col, *n as f64, &formats.plain)
                    .map(|_| true),
                Cell::Ratio(v) => worksheet
                    .write_number_with_format(xl_row, xl_col, *v, &formats.ratio)
                    .map(|_| true),
                Cell::DateTime(dt) => worksheet
                    .write_datetime_with_format(xl_row, xl_col, dt, &formats.datetime)
                    .map(|_| true),
                Cell::Empty => Ok(false),
            }
            .map_err(|e| format!("Failed to write {}!R{}C{}: {}", table.name, r + 2, c + 1, e))?;

            if written {
                cells += 1;
            }
        }
    }

    Ok(cells)
}

/// Width of each column in characters: widest header or cell plus 2, capped.
pub fn column_widths(table: &Table, cap: u16) -> Vec<u16> {
    let cap = cap as usize;
    table
        .headers
        .iter()
        .enumerate()
        .map(|(col, header)| {
            let widest = table
                .rows
                .iter()
                .filter_map(|row| row.get(col))
                .map(Cell::display_len)
                .chain(std::iter::once(header.chars().count()))
                .max()
                .unwrap_or(0);
            (widest + 2).min(cap) as u16
        })
        .collect()
}

fn fit_columns(worksheet: &mut Worksheet, table: &Table, cap: u16) -> Result<(), String> {
    for (col, width) in column_widths(table, cap).into_iter().enumerate() {
        worksheet
            .set_column_width(col as u16, width as f64)
            .map_err(|e| format!("Failed to set column {} width: {}", col, e))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use calamine::{open_workbook, Data, Reader, Xlsx};
    use chrono::NaiveDateTime;

    fn dt(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f").unwrap()
    }

    fn sample() -> Vec<Table> {
        vec![
            Table {
                name: "Backup Resolved".into(),
                headers: vec!["entityId".into(), "Attempts".into(), "Last Attempt UTC".into()],
                rows: vec![vec![
                    Cell::Text("sub_1".into()),
                    Cell::Int(3),
                    Cell::DateTime(dt("2025-12-12 16:06:21.419")),
                ]],
            },
            Table {
                name: "Summary".into(),
                headers: vec!["Metric".into(), "Value".into()],
                rows: vec![
                    vec![Cell::Text("Total payments".into()), Cell::Int(4)],
                    vec![Cell::Text("Backup share".into()), Cell::Ratio(0.25)],
                    vec![Cell::Text("Customer".into()), Cell::Empty],
                ],
            },
        ]
    }

    fn serial_at(cell: Option<&Data>) -> f64 {
        match cell {
            Some(Data::DateTime(d)) => d.as_f64(),
            Some(Data::Float(f)) => *f,
            other => panic!("expected timestamp, got {other:?}"),
        }
    }

    #[test]
    fn timestamps_written_as_excel_dates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dates.xlsx");
        let table = Table {
            name: "Dates".into(),
            headers: vec!["At".into()],
            rows: vec![
                vec![Cell::DateTime(dt("2026-01-01 12:00:00"))],
                vec![Cell::DateTime(dt("2025-12-01 00:00:00.250"))],
            ],
        };
        export(&[table], &path, 55).unwrap();

        let mut wb: Xlsx<_> = open_workbook(&path).unwrap();
        let range = wb.worksheet_range("Dates").unwrap();
        assert!((serial_at(range.get_value((1, 0))) - 46023.5).abs() < 1e-9);
        let quarter_second = 0.25 / 86_400.0;
        assert!((serial_at(range.get_value((2, 0))) - (45992.0 + quarter_second)).abs() < 1e-9);
    }

    #[test]
    fn widths_fit_content_with_cap() {
        let table = Table {
            name: "t".into(),
            headers: vec!["id".into(), "note".into()],
            rows: vec![
                vec![Cell::Text("abc".into()), Cell::Text("x".repeat(80))],
                vec![Cell::Text("abcdefgh".into())],
            ],
        };
        assert_eq!(column_widths(&table, 55), vec![10, 55]);
        assert_eq!(column_widths(&table, 5), vec![5, 5]);
    }

    #[test]
    fn export_and_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.xlsx");

        let result = export(&sample(), &path, 55).unwrap();
        assert_eq!(result.sheets_exported, 2);
        // 3 + 3 headers/cells, 2 headers + 5 non-empty summary cells
        assert_eq!(result.cells_exported, 13);
        assert_eq!(result.summary(), "2 sheets, 13 cells");

        let mut wb: Xlsx<_> = open_workbook(&path).unwrap();
        assert_eq!(wb.sheet_names(), vec!["Backup Resolved", "Summary"]);

        let range = wb.worksheet_range("Backup Resolved").unwrap();
        assert_eq!(range.get_value((0, 0)), Some(&Data::String("entityId".into())));
        assert_eq!(range.get_value((1, 0)), Some(&Data::String("sub_1".into())));
        match range.get_value((1, 1)) {
            Some(Data::Float(f)) => assert_eq!(*f, 3.0),
            other => panic!("expected number, got {other:?}"),
        }
        // 2025-12-12 16:06:21.419
        assert!((serial_at(range.get_value((1, 2))) - 46003.671081238426).abs() < 1e-8);

        let summary = wb.worksheet_range("Summary").unwrap();
        match summary.get_value((2, 1)) {
            Some(Data::Float(f)) => assert_eq!(*f, 0.25),
            other => panic!("expected ratio, got {other:?}"),
        }
    }
}
