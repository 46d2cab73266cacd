use thiserror::Error;

/// Maximum number of offending rows carried by [`RetryError::InvalidTimestamp`].
pub const MAX_BAD_SAMPLES: usize = 10;

#[derive(Debug, Error)]
pub enum RetryError {
    /// TOML parse / deserialization error.
    #[error("config parse error: {0}")]
    ConfigParse(String),

    /// Config validation error (unmapped policy column, bad range, etc.).
    #[error("config validation error: {0}")]
    ConfigValidation(String),

    /// Input schema lacks one or more mapped columns.
    #[error(
        "{origin}: missing required column(s): {}\n  expected: {}\n  found:    {}",
        .missing.join(", "),
        .expected.join(", "),
        .found.join(", ")
    )]
    MissingRequiredColumn {
        origin: String,
        missing: Vec<String>,
        expected: Vec<String>,
        found: Vec<String>,
    },

    /// One or more `created_at` values did not parse. Carries at most
    /// [`MAX_BAD_SAMPLES`] rows; `total` counts all of them.
    #[error("{}", describe_bad_timestamps(.total, .samples))]
    InvalidTimestamp {
        total: usize,
        samples: Vec<BadTimestamp>,
    },

    /// The source produced no rows.
    #[error("no payment attempts found in {0}")]
    EmptyInput(String),

    /// File read/write error.
    #[error("IO error: {0}")]
    Io(String),

    /// Database open/query error.
    #[error("database error: {0}")]
    Database(String),
}

/// A row rejected because its timestamp could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BadTimestamp {
    /// 1-based position in the input sequence.
    pub row: usize,
    pub id: String,
    pub entity_key: String,
    pub value: String,
}

fn describe_bad_timestamps(total: &usize, samples: &[BadTimestamp]) -> String {
    let mut out = format!(
        "{total} row(s) have an invalid 'created_at'. Examples (up to {MAX_BAD_SAMPLES}):"
    );
    for s in samples {
        out.push_str(&format!(
            "\n  row {}: id={} entity={} created_at={:?}",
            s.row, s.id, s.entity_key, s.value
        ));
    }
    out
}
