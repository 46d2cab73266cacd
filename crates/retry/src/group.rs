use std::collections::HashMap;

use crate::model::{EntityKey, PaymentAttempt, PaymentGroup};

/// Partition attempts by entity key, each group ordered by `created_at`
/// ascending. Timestamp ties keep input order. Groups come out in order of
/// their first attempt.
pub fn group_attempts(mut attempts: Vec<PaymentAttempt>) -> Vec<PaymentGroup> {
    attempts.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.seq.cmp(&b.seq)));

    let mut index: HashMap<EntityKey, usize> = HashMap::new();
    let mut groups: Vec<PaymentGroup> = Vec::new();

    for attempt in attempts {
        match index.get(&attempt.entity_key) {
            Some(&i) => groups[i].attempts.push(attempt),
            None => {
                index.insert(attempt.entity_key.clone(), groups.len());
                groups.push(PaymentGroup {
                    entity_key: attempt.entity_key.clone(),
                    attempts: vec![attempt],
                });
            }
        }
    }

    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::AttemptStatus;
    use chrono::NaiveDateTime;

    fn attempt(seq: usize, key: &str, at: &str, status: AttemptStatus) -> PaymentAttempt {
        PaymentAttempt {
            seq,
            id: format!("pay_{seq}"),
            entity_key: EntityKey::single(key),
            created_at: NaiveDateTime::parse_from_str(at, "%Y-%m-%d %H:%M:%S").unwrap(),
            status_token: String::new(),
            status,
            payment_method: None,
            backup_flag: false,
            customer_id: None,
        }
    }

    #[test]
    fn groups_by_key_in_time_order() {
        let attempts = vec![
            attempt(0, "sub_2", "2026-01-03 00:00:00", AttemptStatus::Success),
            attempt(1, "sub_1", "2026-01-02 00:00:00", AttemptStatus::Success),
            attempt(2, "sub_1", "2026-01-01 00:00:00", AttemptStatus::Failed),
            attempt(3, "sub_2", "2026-01-01 12:00:00", AttemptStatus::Failed),
        ];
        let groups = group_attempts(attempts);
        assert_eq!(groups.len(), 2);

        // sub_1 starts first (01-01 00:00), then sub_2 (01-01 12:00)
        assert_eq!(groups[0].entity_key, EntityKey::single("sub_1"));
        assert_eq!(groups[1].entity_key, EntityKey::single("sub_2"));

        let ids: Vec<&str> = groups[0].attempts.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["pay_2", "pay_1"]);
        assert_eq!(groups[0].attempt_count(), 2);
        assert!(groups[0].had_error());
        assert_eq!(groups[0].last_attempt().id, "pay_1");
    }

    #[test]
    fn timestamp_ties_keep_input_order() {
        let attempts = vec![
            attempt(0, "sub_1", "2026-01-01 00:00:00", AttemptStatus::Failed),
            attempt(1, "sub_1", "2026-01-01 00:00:00", AttemptStatus::Success),
        ];
        let groups = group_attempts(attempts);
        assert_eq!(groups[0].last_attempt().id, "pay_1");
    }

    #[test]
    fn composite_keys_do_not_merge() {
        let mut a = attempt(0, "x", "2026-01-01 00:00:00", AttemptStatus::Failed);
        a.entity_key = EntityKey::composite(["ana@example.com", "Beard Kit"]);
        let mut b = attempt(1, "x", "2026-01-02 00:00:00", AttemptStatus::Success);
        b.entity_key = EntityKey::composite(["ana@example.com", "Hair Kit"]);

        let groups = group_attempts(vec![a, b]);
        assert_eq!(groups.len(), 2);
    }

    #[test]
    fn empty_input_yields_no_groups() {
        assert!(group_attempts(Vec::new()).is_empty());
    }
}
