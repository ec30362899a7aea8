use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A stored content record.
///
/// Serialises flat: system fields plus whatever data fields the resource
/// declares, e.g. `{"id":1,"title":"A","imageUrl":"..","createdAt":".."}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    pub id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Record {
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }
}

/// Uniform response body of every content route.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct Envelope<T> {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> Envelope<T> {
    pub fn ok(data: T, message: impl Into<String>) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: Some(message.into()),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn record_serialises_flat_camel_case() {
        let mut fields = Map::new();
        fields.insert("title".into(), json!("A"));
        fields.insert("imageUrl".into(), json!("http://x/y.png"));
        let ts = DateTime::parse_from_rfc3339("2024-05-01T08:30:00.250Z")
            .unwrap()
            .with_timezone(&Utc);
        let record = Record {
            id: 3,
            created_at: ts,
            updated_at: ts,
            fields,
        };
        let v = serde_json::to_value(&record).unwrap();
        assert_eq!(v["id"], 3);
        assert_eq!(v["title"], "A");
        assert_eq!(v["imageUrl"], "http://x/y.png");
        assert!(v["createdAt"].as_str().unwrap().starts_with("2024-05-01T08:30:00.250"));

        let back: Record = serde_json::from_value(v).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn failure_envelope_omits_data() {
        let env: Envelope<Vec<Record>> = Envelope::failure("nope");
        let v = serde_json::to_value(&env).unwrap();
        assert_eq!(v, json!({"success": false, "message": "nope"}));
    }

    #[test]
    fn envelope_without_data_reads_as_none() {
        let env: Envelope<Vec<Record>> =
            serde_json::from_value(json!({"success": false, "message": "nope"})).unwrap();
        assert_eq!(env, Envelope::failure("nope"));
    }
}
