//! CLI Exit Code Registry
//!
//! This is the single source of truth for all CLI exit codes.
//! Exit codes are part of the shell contract; scripts rely on them.
//!
//! # Exit Code Ranges
//!
//! | Code | Domain    | Description                                     |
//! |------|-----------|-------------------------------------------------|
//! | 0    | Universal | Success (including "no attempts in range")      |
//! | 1    | Universal | General error (unspecified)                     |
//! | 2    | Universal | CLI usage error (bad args)                      |
//! | 3    | report    | Cannot read input / write output                |
//! | 4    | report    | Invalid report config                           |
//! | 5    | report    | Input lacks a mapped column                     |
//! | 6    | report    | One or more unparseable `created_at` values     |
//! | 7    | report    | Database open / query failure                   |
//!
//! # Adding New Exit Codes
//!
//! 1. Add the constant in the appropriate range
//! 2. Document what triggers it
//! 3. Update the table above
//! 4. Wire it into [`retry_exit_code`] or the relevant command

use payreport_retry::RetryError;

// =============================================================================
// Universal (0-2)
// =============================================================================

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
/// Avoid using this; prefer a specific error code.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, missing required options.
/// clap exits with this code on its own parse failures.
pub const EXIT_USAGE: u8 = 2;

// =============================================================================
// Report (3-9)
// =============================================================================

/// Input file unreadable or workbook / JSON output unwritable.
pub const EXIT_REPORT_IO: u8 = 3;

/// Config failed to parse or validate.
pub const EXIT_REPORT_INVALID_CONFIG: u8 = 4;

/// A mapped column is absent from the input.
pub const EXIT_REPORT_MISSING_COLUMN: u8 = 5;

/// At least one `created_at` value could not be parsed. Nothing is written.
pub const EXIT_REPORT_INVALID_TIMESTAMP: u8 = 6;

/// Database could not be opened or queried.
pub const EXIT_REPORT_DATABASE: u8 = 7;

/// Map an engine error to its exit code.
pub fn retry_exit_code(err: &RetryError) -> u8 {
    match err {
        RetryError::ConfigParse(_) | RetryError::ConfigValidation(_) => EXIT_REPORT_INVALID_CONFIG,
        RetryError::MissingRequiredColumn { .. } => EXIT_REPORT_MISSING_COLUMN,
        RetryError::InvalidTimestamp { .. } => EXIT_REPORT_INVALID_TIMESTAMP,
        RetryError::Io(_) => EXIT_REPORT_IO,
        RetryError::Database(_) => EXIT_REPORT_DATABASE,
        // Handled before it can reach here; an empty run is not a failure
        RetryError::EmptyInput(_) => EXIT_SUCCESS,
    }
}

/// Follow-up advice printed under the error line.
pub fn retry_hint(err: &RetryError) -> Option<&'static str> {
    match err {
        RetryError::MissingRequiredColumn { .. } => {
            Some("check the [columns] mapping against the input headers")
        }
        RetryError::InvalidTimestamp { .. } => {
            Some("fix the listed rows, or set columns.timestamp_format to match the input")
        }
        RetryError::Database(_) => Some("check the database path and `table` name"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_distinct() {
        let codes = [
            EXIT_SUCCESS,
            EXIT_ERROR,
            EXIT_USAGE,
            EXIT_REPORT_IO,
            EXIT_REPORT_INVALID_CONFIG,
            EXIT_REPORT_MISSING_COLUMN,
            EXIT_REPORT_INVALID_TIMESTAMP,
            EXIT_REPORT_DATABASE,
        ];
        let mut sorted = codes.to_vec();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(sorted.len(), codes.len());
    }

    #[test]
    fn engine_errors_map() {
        assert_eq!(retry_exit_code(&RetryError::ConfigParse("x".into())), 4);
        assert_eq!(retry_exit_code(&RetryError::Database("x".into())), 7);
        assert_eq!(
            retry_exit_code(&RetryError::InvalidTimestamp {
                total: 1,
                samples: vec![]
            }),
            6
        );
        assert!(retry_hint(&RetryError::Io("x".into())).is_none());
    }
}
