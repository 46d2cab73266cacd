use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::model::{AttemptStatus, BackupEvidence, PaymentGroup, Resolution};

/// How a resolved payment is attributed to a backup payment method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionPolicy {
    /// The resolving attempt carries an explicit backup flag.
    ExplicitFlag,
    /// Backup use is inferred from a switch of payment method id.
    MethodSwitch,
}

impl std::fmt::Display for ResolutionPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ExplicitFlag => write!(f, "explicit_flag"),
            Self::MethodSwitch => write!(f, "method_switch"),
        }
    }
}

impl ResolutionPolicy {
    /// Resolve one group.
    ///
    /// `resolved` is shared by both policies: the group saw a FAILED attempt
    /// and its last attempt succeeded. Only `resolved_by_backup` differs.
    pub fn resolve(&self, group: &PaymentGroup) -> Resolution {
        let had_error = group.had_error();
        let last = group.last_attempt();
        let resolved = had_error && last.status == AttemptStatus::Success;

        match self {
            Self::ExplicitFlag => Resolution {
                had_error,
                resolved,
                resolved_by_backup: resolved && last.backup_flag,
                evidence: BackupEvidence::ExplicitFlag {
                    last_attempt_backup: last.backup_flag,
                },
            },
            Self::MethodSwitch => {
                let failed_methods: BTreeSet<String> = group
                    .attempts
                    .iter()
                    .filter(|a| a.status == AttemptStatus::Failed)
                    .map(|a| a.payment_method.clone().unwrap_or_default())
                    .collect();

                let resolving_method = group
                    .attempts
                    .iter()
                    .rev()
                    .find(|a| a.status == AttemptStatus::Success)
                    .map(|a| a.payment_method.clone().unwrap_or_default());

                // With several failed methods the switch cannot be attributed.
                let resolved_by_backup = resolved
                    && failed_methods.len() == 1
                    && match (&resolving_method, failed_methods.iter().next()) {
                        (Some(paid), Some(failed)) => paid != failed,
                        _ => false,
                    };

                Resolution {
                    had_error,
                    resolved,
                    resolved_by_backup,
                    evidence: BackupEvidence::MethodSwitch {
                        failed_methods,
                        resolving_method,
                    },
                }
            }
        }
    }
}
