use serde::{Deserialize, Serialize};

use crate::model::{DetailRow, RetrySummary};

/// Formula behind the "payment error rate" row.
///
/// `ResolvedOverErrors` reuses the resolution-rate formula, which is what the
/// database report always printed. `ErrorsOverPayments` is the share of
/// payments that saw at least one failure.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorRateBasis {
    #[default]
    ResolvedOverErrors,
    ErrorsOverPayments,
}

/// `n / d`, or 0 when `d` is 0.
pub fn safe_ratio(n: usize, d: usize) -> f64 {
    if d == 0 {
        0.0
    } else {
        n as f64 / d as f64
    }
}

/// Compute summary counts and ratios from Detail rows.
pub fn compute_summary(detail: &[DetailRow], basis: ErrorRateBasis) -> RetrySummary {
    let mut with_error = 0;
    let mut resolved = 0;
    let mut resolved_by_backup = 0;

    for row in detail {
        if row.had_error {
            with_error += 1;
        }
        if row.resolved {
            resolved += 1;
        }
        if row.resolved_by_backup {
            resolved_by_backup += 1;
        }
    }

    let total_payments = detail.len();
    let resolution_rate = safe_ratio(resolved, with_error);
    let error_rate = match basis {
        ErrorRateBasis::ResolvedOverErrors => resolution_rate,
        ErrorRateBasis::ErrorsOverPayments => safe_ratio(with_error, total_payments),
    };

    RetrySummary {
        total_payments,
        with_error,
        resolved,
        resolved_by_backup,
        error_rate_basis: basis,
        error_rate,
        resolution_rate,
        backup_share: safe_ratio(resolved_by_backup, resolved),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MetricValue {
    Count(usize),
    Ratio(f64),
}

/// One labeled row of the Summary table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryMetric {
    pub label: &'static str,
    pub value: MetricValue,
}

impl RetrySummary {
    /// Labeled Summary rows in report order. Both rate rows are always
    /// present, even when they share a formula.
    pub fn metrics(&self) -> Vec<SummaryMetric> {
        let error_rate_label = match self.error_rate_basis {
            ErrorRateBasis::ResolvedOverErrors => {
                "Payment error rate (total resolved / total errors)"
            }
            ErrorRateBasis::ErrorsOverPayments => {
                "Payment error rate (total errors / total payments)"
            }
        };

        vec![
            SummaryMetric {
                label: "Total payments",
                value: MetricValue::Count(self.total_payments),
            },
            SummaryMetric {
                label: "Total payment errors (payments with ≥1 FAILED)",
                value: MetricValue::Count(self.with_error),
            },
            SummaryMetric {
                label: "Total resolved payments (error resolved)",
                value: MetricValue::Count(self.resolved),
            },
            SummaryMetric {
                label: "Total resolved by backup",
                value: MetricValue::Count(self.resolved_by_backup),
            },
            SummaryMetric {
                label: error_rate_label,
                value: MetricValue::Ratio(self.error_rate),
            },
            SummaryMetric {
                label: "Resolved payment rate (total resolved / total errors)",
                value: MetricValue::Ratio(self.resolution_rate),
            },
            SummaryMetric {
                label: "Backup resolution share (resolved by backup / total resolved)",
                value: MetricValue::Ratio(self.backup_share),
            },
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BackupEvidence, EntityKey};
    use chrono::NaiveDateTime;

    fn row(had_error: bool, resolved: bool, backup: bool) -> DetailRow {
        let at = NaiveDateTime::parse_from_str("2026-01-01 00:00:00", "%Y-%m-%d %H:%M:%S").unwrap();
        DetailRow {
            entity_key: EntityKey::single("k"),
            customer_id: None,
            attempts: 1,
            had_error,
            resolved,
            resolved_by_backup: backup,
            first_attempt_at: at,
            last_attempt_at: at,
            last_attempt_status: "SUCCESS".into(),
            last_attempt_id: "pay_1".into(),
            evidence: BackupEvidence::ExplicitFlag {
                last_attempt_backup: backup,
            },
        }
    }

    #[test]
    fn summary_counts_and_ratios() {
        let detail = vec![
            row(true, true, true),
            row(true, true, false),
            row(true, false, false),
            row(true, true, false),
            row(false, false, false),
        ];
        let s = compute_summary(&detail, ErrorRateBasis::ResolvedOverErrors);
        assert_eq!(s.total_payments, 5);
        assert_eq!(s.with_error, 4);
        assert_eq!(s.resolved, 3);
        assert_eq!(s.resolved_by_backup, 1);
        assert!((s.resolution_rate - 0.75).abs() < 1e-12);
        assert_eq!(s.error_rate, s.resolution_rate);
        assert!((s.backup_share - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn errors_over_payments_basis() {
        let detail = vec![row(true, false, false), row(false, false, false)];
        let s = compute_summary(&detail, ErrorRateBasis::ErrorsOverPayments);
        assert!((s.error_rate - 0.5).abs() < 1e-12);
        assert_eq!(s.resolution_rate, 0.0);
    }

    #[test]
    fn empty_detail_has_zero_ratios() {
        let s = compute_summary(&[], ErrorRateBasis::ErrorsOverPayments);
        assert_eq!(s.total_payments, 0);
        assert_eq!(s.error_rate, 0.0);
        assert_eq!(s.resolution_rate, 0.0);
        assert_eq!(s.backup_share, 0.0);
    }

    #[test]
    fn metrics_always_list_both_rates() {
        let s = compute_summary(&[row(true, true, false)], ErrorRateBasis::ResolvedOverErrors);
        let metrics = s.metrics();
        assert_eq!(metrics.len(), 7);
        assert_eq!(metrics[0].label, "Total payments");
        assert_eq!(metrics[4].value, MetricValue::Ratio(1.0));
        assert_eq!(metrics[5].value, MetricValue::Ratio(1.0));
        assert!(metrics[4].label.contains("total resolved / total errors"));
    }
}
