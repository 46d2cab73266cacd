use std::collections::BTreeSet;
use std::fmt;

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::policy::ResolutionPolicy;
use crate::summary::ErrorRateBasis;

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// Grouping key of a payment. A single entity id, or a composite such as
/// (customer email, product description).
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct EntityKey(pub Vec<String>);

impl EntityKey {
    pub fn single(value: impl Into<String>) -> Self {
        Self(vec![value.into()])
    }

    pub fn composite<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(parts.into_iter().map(Into::into).collect())
    }

    pub fn parts(&self) -> &[String] {
        &self.0
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join(" | "))
    }
}

/// One attempt row as delivered by a data source. Timestamp and status are
/// still raw text; the engine validates and normalizes them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AttemptRecord {
    pub id: String,
    pub entity_key: EntityKey,
    pub created_at: String,
    pub status: String,
    pub payment_method: Option<String>,
    pub backup_flag: Option<String>,
    pub customer_id: Option<String>,
}

/// Canonical class of a normalized status token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    Success,
    Failed,
    Other,
}

/// A validated attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentAttempt {
    /// Position in the input sequence; breaks timestamp ties.
    pub seq: usize,
    pub id: String,
    pub entity_key: EntityKey,
    pub created_at: NaiveDateTime,
    /// Trimmed, uppercased status text.
    pub status_token: String,
    pub status: AttemptStatus,
    pub payment_method: Option<String>,
    pub backup_flag: bool,
    pub customer_id: Option<String>,
}

// ---------------------------------------------------------------------------
// Grouping
// ---------------------------------------------------------------------------

/// All attempts sharing an entity key, ordered by `created_at` ascending.
#[derive(Debug, Clone)]
pub struct PaymentGroup {
    pub entity_key: EntityKey,
    pub attempts: Vec<PaymentAttempt>,
}

impl PaymentGroup {
    pub fn attempt_count(&self) -> usize {
        self.attempts.len()
    }

    pub fn had_error(&self) -> bool {
        self.attempts.iter().any(|a| a.status == AttemptStatus::Failed)
    }

    /// Groups are never built empty, so the last attempt always exists.
    pub fn last_attempt(&self) -> &PaymentAttempt {
        &self.attempts[self.attempts.len() - 1]
    }

    pub fn first_attempt_time(&self) -> NaiveDateTime {
        self.attempts[0].created_at
    }

    pub fn last_attempt_time(&self) -> NaiveDateTime {
        self.last_attempt().created_at
    }

    /// Customer carried by the earliest attempt.
    pub fn customer_id(&self) -> Option<&str> {
        self.attempts[0].customer_id.as_deref()
    }
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

/// Policy-specific facts behind a `resolved_by_backup` verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum BackupEvidence {
    ExplicitFlag {
        last_attempt_backup: bool,
    },
    MethodSwitch {
        failed_methods: BTreeSet<String>,
        resolving_method: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub had_error: bool,
    pub resolved: bool,
    pub resolved_by_backup: bool,
    pub evidence: BackupEvidence,
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

/// One row of the Detail table: a payment group plus its verdicts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetailRow {
    pub entity_key: EntityKey,
    pub customer_id: Option<String>,
    pub attempts: usize,
    pub had_error: bool,
    pub resolved: bool,
    pub resolved_by_backup: bool,
    pub first_attempt_at: NaiveDateTime,
    pub last_attempt_at: NaiveDateTime,
    pub last_attempt_status: String,
    pub last_attempt_id: String,
    pub evidence: BackupEvidence,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrySummary {
    pub total_payments: usize,
    pub with_error: usize,
    pub resolved: usize,
    pub resolved_by_backup: usize,
    pub error_rate_basis: ErrorRateBasis,
    pub error_rate: f64,
    pub resolution_rate: f64,
    pub backup_share: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportMeta {
    pub report_name: String,
    pub policy: ResolutionPolicy,
    pub attempt_count: usize,
    pub engine_version: String,
    pub run_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RetryReport {
    pub meta: ReportMeta,
    pub summary: RetrySummary,
    pub detail: Vec<DetailRow>,
}

impl RetryReport {
    /// The Backup-Resolved table: Detail rows with `resolved_by_backup`.
    pub fn backup_resolved(&self) -> Vec<&DetailRow> {
        self.detail.iter().filter(|r| r.resolved_by_backup).collect()
    }
}
