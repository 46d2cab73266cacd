//! `payreport-io`: where attempts come from and where reports go.
//!
//! Sources (CSV, JSON, SQLite) sit behind [`source::AttemptSource`]; a
//! finished report is projected into [`tables::Table`]s and written by
//! [`xlsx::export`].

pub mod csv;
pub mod json;
pub mod source;
pub mod sqlite;
pub mod tables;
pub mod xlsx;

pub use source::{open_source, AttemptSource};
pub use sqlite::ConnectionConfig;
pub use tables::{report_tables, Cell, Table};
pub use xlsx::ExportResult;
