// JSON attempt source

use std::path::PathBuf;

use serde_json::Value;

use payreport_retry::config::ColumnMapping;
use payreport_retry::model::AttemptRecord;
use payreport_retry::RetryError;

use crate::source::{required_columns, AttemptSource, ColumnIndex};

/// Attempts from a JSON array of objects keyed by column name.
#[derive(Debug, Clone)]
pub struct JsonSource {
    pub path: PathBuf,
    pub columns: ColumnMapping,
}

impl AttemptSource for JsonSource {
    fn describe(&self) -> String {
        format!("json file {}", self.path.display())
    }

    fn load(&self) -> Result<Vec<AttemptRecord>, RetryError> {
        let content = std::fs::read_to_string(&self.path)
            .map_err(|e| RetryError::Io(format!("{}: {e}", self.path.display())))?;
        parse_attempts(&self.path.display().to_string(), &content, &self.columns)
    }
}

/// Parse a JSON array of attempt objects.
pub fn parse_attempts(
    origin: &str,
    content: &str,
    columns: &ColumnMapping,
) -> Result<Vec<AttemptRecord>, RetryError> {
    let value: Value = serde_json::from_str(content)
        .map_err(|e| RetryError::Io(format!("{origin}: invalid JSON: {e}")))?;
    let Value::Array(items) = value else {
        return Err(RetryError::Io(format!(
            "{origin}: expected a JSON array of attempt objects"
        )));
    };

    let mut objects = Vec::with_capacity(items.len());
    for (i, item) in items.into_iter().enumerate() {
        match item {
            Value::Object(map) => objects.push(map),
            other => {
                return Err(RetryError::Io(format!(
                    "{origin}: element {} is {}, expected an object",
                    i + 1,
                    type_name(&other)
                )))
            }
        }
    }

    if objects.is_empty() {
        return Ok(Vec::new());
    }

    // Field names in first-seen order
    let mut headers: Vec<String> = Vec::new();
    for obj in &objects {
        for key in obj.keys() {
            if !headers.contains(key) {
                headers.push(key.clone());
            }
        }
    }

    let index = ColumnIndex::resolve(origin, columns, &headers)?;

    // Optional fields may vary per object; required ones may not
    let required = required_columns(columns);
    for (i, obj) in objects.iter().enumerate() {
        let missing: Vec<String> = required
            .iter()
            .filter(|name| obj.get(name.as_str()).map_or(true, Value::is_null))
            .cloned()
            .collect();
        if !missing.is_empty() {
            return Err(RetryError::MissingRequiredColumn {
                origin: format!("{origin}: element {}", i + 1),
                missing,
                expected: required.clone(),
                found: obj.keys().cloned().collect(),
            });
        }
    }

    Ok(objects
        .iter()
        .enumerate()
        .map(|(i, obj)| {
            let fields: Vec<Option<String>> =
                headers.iter().map(|h| obj.get(h).and_then(field_text)).collect();
            index.record(i + 1, &fields)
        })
        .collect())
}

fn field_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        other => Some(other.to_string()),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use payreport_retry::config::KeyColumns;

    fn columns() -> ColumnMapping {
        ColumnMapping {
            id: Some("id".into()),
            entity_key: KeyColumns::Single("entityId".into()),
            created_at: "createdAt".into(),
            status: "status".into(),
            payment_method: None,
            backup_flag: Some("isBackupPayment".into()),
            customer_id: Some("customerId".into()),
            timestamp_format: None,
        }
    }

    #[test]
    fn scalar_values_become_text() {
        let content = r#"[
            {"id": 17, "entityId": "sub_1", "createdAt": "2025-12-12 16:06:21.419",
             "status": "FAILED", "isBackupPayment": null, "customerId": "cus_1"},
            {"id": 18, "entityId": "sub_1", "createdAt": "2025-12-13 09:00:00",
             "status": "SUCCESS", "isBackupPayment": true}
        ]"#;
        let records = parse_attempts("attempts.json", content, &columns()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id, "17");
        assert_eq!(records[0].backup_flag, None);
        assert_eq!(records[0].customer_id.as_deref(), Some("cus_1"));
        assert_eq!(records[1].backup_flag.as_deref(), Some("true"));
        assert_eq!(records[1].customer_id, None);
    }

    #[test]
    fn field_absent_everywhere_is_missing_column() {
        let content = r#"[{"id": 1, "entityId": "a", "createdAt": "2025-12-12", "status": "FAILED"}]"#;
        let err = parse_attempts("attempts.json", content, &columns()).unwrap_err();
        match err {
            RetryError::MissingRequiredColumn { missing, .. } => {
                assert_eq!(missing, vec!["isBackupPayment", "customerId"]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn object_without_key_field_rejected() {
        let content = r#"[
            {"id": 1, "entityId": "sub_1", "createdAt": "2025-12-12", "status": "FAILED",
             "isBackupPayment": false, "customerId": "cus_1"},
            {"id": 2, "createdAt": "2025-12-13", "status": "SUCCESS", "isBackupPayment": true},
            {"id": 3, "entityId": "sub_2", "createdAt": "2025-12-14", "status": null}
        ]"#;
        let err = parse_attempts("attempts.json", content, &columns()).unwrap_err();
        match err {
            RetryError::MissingRequiredColumn {
                origin,
                missing,
                expected,
                found,
            } => {
                assert_eq!(origin, "attempts.json: element 2");
                assert_eq!(missing, vec!["entityId"]);
                assert_eq!(expected, vec!["id", "entityId", "createdAt", "status"]);
                let mut found = found;
                found.sort();
                assert_eq!(found, vec!["createdAt", "id", "isBackupPayment", "status"]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn null_status_rejected() {
        let content = r#"[
            {"id": 1, "entityId": "sub_1", "createdAt": "2025-12-12", "status": "FAILED",
             "isBackupPayment": false, "customerId": "cus_1"},
            {"id": 3, "entityId": "sub_2", "createdAt": "2025-12-14", "status": null}
        ]"#;
        let err = parse_attempts("attempts.json", content, &columns()).unwrap_err();
        let msg = err.to_string();
        assert!(msg.starts_with("attempts.json: element 2: missing required column(s): status"));
    }

    #[test]
    fn empty_array_is_empty_input() {
        assert!(parse_attempts("attempts.json", "[]", &columns()).unwrap().is_empty());
    }

    #[test]
    fn non_object_element_rejected() {
        let err = parse_attempts("attempts.json", "[1]", &columns()).unwrap_err();
        assert!(err.to_string().contains("element 1 is a number"));
    }
}
