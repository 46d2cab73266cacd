use crate::config::ReportConfig;
use crate::error::RetryError;
use crate::group::group_attempts;
use crate::model::{AttemptRecord, DetailRow, ReportMeta, RetryReport, RetrySummary};
use crate::normalize::normalize_records;
use crate::policy::ResolutionPolicy;
use crate::summary::{compute_summary, ErrorRateBasis};

/// Knobs of a single aggregation pass.
#[derive(Debug, Clone)]
pub struct AggregateOptions {
    pub policy: ResolutionPolicy,
    pub error_rate: ErrorRateBasis,
    pub timestamp_format: Option<String>,
}

impl AggregateOptions {
    pub fn new(policy: ResolutionPolicy) -> Self {
        Self {
            policy,
            error_rate: ErrorRateBasis::default(),
            timestamp_format: None,
        }
    }

    pub fn from_config(config: &ReportConfig) -> Result<Self, RetryError> {
        Ok(Self {
            policy: config.policy()?,
            error_rate: config.summary.error_rate,
            timestamp_format: config.columns.timestamp_format.clone(),
        })
    }
}

/// Group, resolve and summarize. Pure: the same records and options always
/// give the same Detail and Summary.
pub fn aggregate(
    options: &AggregateOptions,
    records: &[AttemptRecord],
) -> Result<(Vec<DetailRow>, RetrySummary), RetryError> {
    let attempts = normalize_records(records, options.timestamp_format.as_deref())?;
    let groups = group_attempts(attempts);

    let detail: Vec<DetailRow> = groups
        .iter()
        .map(|group| {
            let resolution = options.policy.resolve(group);
            let last = group.last_attempt();
            DetailRow {
                entity_key: group.entity_key.clone(),
                customer_id: group.customer_id().map(String::from),
                attempts: group.attempt_count(),
                had_error: resolution.had_error,
                resolved: resolution.resolved,
                resolved_by_backup: resolution.resolved_by_backup,
                first_attempt_at: group.first_attempt_time(),
                last_attempt_at: group.last_attempt_time(),
                last_attempt_status: last.status_token.clone(),
                last_attempt_id: last.id.clone(),
                evidence: resolution.evidence,
            }
        })
        .collect();

    let summary = compute_summary(&detail, options.error_rate);
    log::debug!(
        "aggregated {} attempt(s) into {} payment(s) using {}",
        records.len(),
        detail.len(),
        options.policy
    );

    Ok((detail, summary))
}

/// Run the report described by `config` over pre-loaded records.
pub fn run(config: &ReportConfig, records: &[AttemptRecord]) -> Result<RetryReport, RetryError> {
    let options = AggregateOptions::from_config(config)?;
    let (detail, summary) = aggregate(&options, records)?;

    Ok(RetryReport {
        meta: ReportMeta {
            report_name: config.name.clone(),
            policy: options.policy,
            attempt_count: records.len(),
            engine_version: env!("CARGO_PKG_VERSION").to_string(),
            run_at: chrono::Utc::now().to_rfc3339(),
        },
        summary,
        detail,
    })
}
