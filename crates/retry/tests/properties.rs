// Property-based tests for grouping and resolution invariants.
// CI: 256 cases (default). Soak: PROPTEST_CASES=10000 cargo test --release

use std::collections::HashMap;

use chrono::{Duration, NaiveDate};
use proptest::prelude::*;
use payreport_retry::model::{AttemptRecord, BackupEvidence, EntityKey};
use payreport_retry::{aggregate, AggregateOptions, ResolutionPolicy};

fn config_256() -> ProptestConfig {
    ProptestConfig {
        cases: std::env::var("PROPTEST_CASES")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(256),
        failure_persistence: None,
        ..ProptestConfig::default()
    }
}

// ---------------------------------------------------------------------------
// Generators
// ---------------------------------------------------------------------------

fn arb_status() -> impl Strategy<Value = String> {
    prop_oneof![
        3 => Just("FAILED".to_string()),
        3 => Just("SUCCESS".to_string()),
        1 => Just(" paid ".to_string()),
        1 => Just("pending".to_string()),
    ]
}

fn arb_flag() -> impl Strategy<Value = Option<String>> {
    prop_oneof![
        Just(None),
        Just(Some("true".to_string())),
        Just(Some("false".to_string())),
        Just(Some("1".to_string())),
    ]
}

/// Attempts over a handful of keys and cards. Every attempt gets a distinct
/// timestamp so ordering never depends on ties.
fn arb_records(max: usize) -> impl Strategy<Value = Vec<AttemptRecord>> {
    prop::collection::vec(
        (0..5usize, arb_status(), 0..3usize, arb_flag()),
        0..max,
    )
    .prop_flat_map(|rows| {
        let n = rows.len();
        (Just(rows), Just((0..n as i64).collect::<Vec<i64>>()).prop_shuffle())
    })
    .prop_map(|(rows, minutes)| {
        let base = NaiveDate::from_ymd_opt(2026, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        rows.into_iter()
            .zip(minutes)
            .enumerate()
            .map(|(i, ((key, status, card, flag), minute))| AttemptRecord {
                id: format!("pay_{i}"),
                entity_key: EntityKey::single(format!("ent_{key}")),
                created_at: (base + Duration::minutes(minute))
                    .format("%Y-%m-%d %H:%M:%S")
                    .to_string(),
                status,
                payment_method: Some(format!("card_{card}")),
                backup_flag: flag,
                customer_id: None,
            })
            .collect()
    })
}

fn arb_policy() -> impl Strategy<Value = ResolutionPolicy> {
    prop_oneof![
        Just(ResolutionPolicy::ExplicitFlag),
        Just(ResolutionPolicy::MethodSwitch),
    ]
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(config_256())]
    #[test]
    fn attempt_counts_match_input(records in arb_records(40), policy in arb_policy()) {
        let (detail, summary) = aggregate(&AggregateOptions::new(policy), &records).unwrap();

        let mut expected: HashMap<EntityKey, usize> = HashMap::new();
        for r in &records {
            *expected.entry(r.entity_key.clone()).or_insert(0) += 1;
        }

        prop_assert_eq!(detail.len(), expected.len());
        prop_assert_eq!(summary.total_payments, expected.len());
        for row in &detail {
            prop_assert_eq!(row.attempts, expected[&row.entity_key]);
        }
        let total: usize = detail.iter().map(|r| r.attempts).sum();
        prop_assert_eq!(total, records.len());
    }
}

proptest! {
    #![proptest_config(config_256())]
    #[test]
    fn implication_chain_holds(records in arb_records(40), policy in arb_policy()) {
        let (detail, summary) = aggregate(&AggregateOptions::new(policy), &records).unwrap();
        for row in &detail {
            prop_assert!(!row.resolved_by_backup || row.resolved);
            prop_assert!(!row.resolved || row.had_error);
            prop_assert!(row.first_attempt_at <= row.last_attempt_at);
        }
        prop_assert!(summary.resolved_by_backup <= summary.resolved);
        prop_assert!(summary.resolved <= summary.with_error);
        prop_assert!(summary.with_error <= summary.total_payments);
    }
}

proptest! {
    #![proptest_config(config_256())]
    #[test]
    fn multiple_failed_methods_never_backup(records in arb_records(40)) {
        let opts = AggregateOptions::new(ResolutionPolicy::MethodSwitch);
        let (detail, _) = aggregate(&opts, &records).unwrap();
        for row in &detail {
            if let BackupEvidence::MethodSwitch { failed_methods, .. } = &row.evidence {
                if failed_methods.len() >= 2 {
                    prop_assert!(!row.resolved_by_backup);
                }
            } else {
                prop_assert!(false, "method_switch run produced flag evidence");
            }
        }
    }
}

proptest! {
    #![proptest_config(config_256())]
    #[test]
    fn permutation_invariant(
        (records, shuffled) in arb_records(30).prop_flat_map(|r| {
            let copy = r.clone();
            (Just(r), Just(copy).prop_shuffle())
        }),
        policy in arb_policy(),
    ) {
        let opts = AggregateOptions::new(policy);
        let (d1, s1) = aggregate(&opts, &records).unwrap();
        let (d2, s2) = aggregate(&opts, &shuffled).unwrap();

        // Timestamps are unique, so even group order is stable
        prop_assert_eq!(d1, d2);
        prop_assert_eq!(s1, s2);
    }
}
