use chrono::{DateTime, NaiveDate, NaiveDateTime};

use crate::error::{BadTimestamp, RetryError, MAX_BAD_SAMPLES};
use crate::model::{AttemptRecord, AttemptStatus, PaymentAttempt};

pub const SUCCESS_TOKENS: &[&str] = &["SUCCESS", "PAID"];
pub const FAILURE_TOKENS: &[&str] = &["FAILED"];
const TRUE_TOKENS: &[&str] = &["true", "1", "yes", "y", "t"];

/// Layouts tried when no explicit timestamp format is configured.
const DATETIME_LAYOUTS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
];

/// Trim + uppercase.
pub fn normalize_status(raw: &str) -> String {
    raw.trim().to_uppercase()
}

pub fn classify_status(token: &str) -> AttemptStatus {
    if SUCCESS_TOKENS.contains(&token) {
        AttemptStatus::Success
    } else if FAILURE_TOKENS.contains(&token) {
        AttemptStatus::Failed
    } else {
        AttemptStatus::Other
    }
}

/// Boolean-like flag tokens. Missing and unrecognized values are false.
pub fn normalize_backup_flag(raw: Option<&str>) -> bool {
    match raw {
        Some(v) => {
            let v = v.trim().to_lowercase();
            TRUE_TOKENS.contains(&v.as_str())
        }
        None => false,
    }
}

/// Parse a timestamp. With `format`, only that layout is accepted. Without
/// it, RFC 3339 (converted to UTC), the common `Y-m-d H:M:S[.f]` layouts and
/// bare dates (midnight) are accepted.
pub fn parse_timestamp(raw: &str, format: Option<&str>) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Some(fmt) = format {
        return NaiveDateTime::parse_from_str(raw, fmt).ok();
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_utc());
    }

    for layout in DATETIME_LAYOUTS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, layout) {
            return Some(dt);
        }
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Validate and normalize raw records. Fails if any timestamp does not
/// parse, listing up to [`MAX_BAD_SAMPLES`] offending rows.
pub fn normalize_records(
    records: &[AttemptRecord],
    timestamp_format: Option<&str>,
) -> Result<Vec<PaymentAttempt>, RetryError> {
    let mut attempts = Vec::with_capacity(records.len());
    let mut samples = Vec::new();
    let mut total_bad = 0;

    for (seq, record) in records.iter().enumerate() {
        let Some(created_at) = parse_timestamp(&record.created_at, timestamp_format) else {
            total_bad += 1;
            if samples.len() < MAX_BAD_SAMPLES {
                samples.push(BadTimestamp {
                    row: seq + 1,
                    id: record.id.clone(),
                    entity_key: record.entity_key.to_string(),
                    value: record.created_at.clone(),
                });
            }
            continue;
        };

        let status_token = normalize_status(&record.status);
        let status = classify_status(&status_token);

        attempts.push(PaymentAttempt {
            seq,
            id: record.id.clone(),
            entity_key: record.entity_key.clone(),
            created_at,
            status_token,
            status,
            payment_method: record.payment_method.clone(),
            backup_flag: normalize_backup_flag(record.backup_flag.as_deref()),
            customer_id: record.customer_id.clone(),
        });
    }

    if total_bad > 0 {
        log::debug!("{total_bad} record(s) rejected for invalid created_at");
        return Err(RetryError::InvalidTimestamp {
            total: total_bad,
            samples,
        });
    }

    Ok(attempts)
}
