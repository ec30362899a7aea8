//! Request body checks shared by every content route.
use serde_json::{Map, Value};
use thiserror::Error;

use crate::resource::{FieldRule, SYSTEM_KEYS};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ValidationError {
    /// JSON key of the first field that failed, if any.
    pub field: Option<&'static str>,
    pub message: String,
}

impl ValidationError {
    fn new(field: Option<&'static str>, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Check `body` against `rules`.
///
/// A required field must be present, be a JSON string, and be non-empty after
/// trimming. A declared optional field may be absent or null, but if present it
/// must be a string. The first failing rule is reported.
pub fn validate(body: &Map<String, Value>, rules: &[FieldRule]) -> Result<(), ValidationError> {
    for rule in rules {
        match body.get(rule.key) {
            Some(Value::String(s)) if rule.required && s.trim().is_empty() => {
                return Err(required_message(rule));
            }
            Some(Value::String(_)) => {}
            None | Some(Value::Null) if rule.required => return Err(required_message(rule)),
            None | Some(Value::Null) => {}
            Some(_) if rule.required => return Err(required_message(rule)),
            Some(_) => {
                return Err(ValidationError::new(
                    Some(rule.key),
                    format!("{} must be a string.", rule.label),
                ));
            }
        }
    }
    Ok(())
}

fn required_message(rule: &FieldRule) -> ValidationError {
    ValidationError::new(
        Some(rule.key),
        format!("{} is required and must be a non-empty string.", rule.label),
    )
}

/// Open-schema bodies need at least one key besides the store-owned ones.
pub fn validate_document(body: &Map<String, Value>) -> Result<(), ValidationError> {
    if body.keys().all(|k| SYSTEM_KEYS.contains(&k.as_str())) {
        return Err(ValidationError::new(None, "Request body cannot be empty."));
    }
    Ok(())
}

/// What the caller intends to do with the extracted id; only affects the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdPurpose {
    Update,
    Delete,
}

/// Extract the positive integer `id` an update or delete targets.
///
/// Accepts a JSON integer or a string holding one.
pub fn parse_id(body: &Map<String, Value>, purpose: IdPurpose) -> Result<i64, ValidationError> {
    let id = match body.get("id") {
        Some(Value::Number(n)) => n.as_i64(),
        Some(Value::String(s)) => s.trim().parse::<i64>().ok(),
        _ => None,
    };
    match id {
        Some(id) if id > 0 => Ok(id),
        _ => {
            let verb = match purpose {
                IdPurpose::Update => "updating",
                IdPurpose::Delete => "deleting",
            };
            Err(ValidationError::new(
                Some("id"),
                format!("ID is required for {verb} an item."),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::{CONTACTS, NEWSLIST};
    use serde_json::json;

    fn obj(v: Value) -> Map<String, Value> {
        match v {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn accepts_complete_body() {
        let body = obj(json!({"title": "A", "imageUrl": "http://x/y.png"}));
        assert!(validate(&body, NEWSLIST.fields()).is_ok());
    }

    #[test]
    fn reports_first_failing_field() {
        let body = obj(json!({"title": ""}));
        let err = validate(&body, NEWSLIST.fields()).unwrap_err();
        assert_eq!(err.field, Some("title"));
        assert!(err.message.contains("Title"));

        let body = obj(json!({"title": "ok"}));
        let err = validate(&body, NEWSLIST.fields()).unwrap_err();
        assert_eq!(err.field, Some("imageUrl"));
        assert!(err.message.starts_with("Image URL is required"));
    }

    #[test]
    fn whitespace_only_is_empty() {
        let body = obj(json!({"email": "   \t"}));
        let err = validate(&body, CONTACTS.fields()).unwrap_err();
        assert_eq!(err.field, Some("email"));
    }

    #[test]
    fn non_string_required_field_fails() {
        let body = obj(json!({"title": 42, "imageUrl": "u"}));
        let err = validate(&body, NEWSLIST.fields()).unwrap_err();
        assert_eq!(err.field, Some("title"));
    }

    #[test]
    fn optional_fields_may_be_null_but_not_other_types() {
        let body = obj(json!({"email": "a@b.c", "name": null}));
        assert!(validate(&body, CONTACTS.fields()).is_ok());

        let body = obj(json!({"email": "a@b.c", "message": ["x"]}));
        let err = validate(&body, CONTACTS.fields()).unwrap_err();
        assert_eq!(err.field, Some("message"));
        assert_eq!(err.message, "Message must be a string.");
    }

    #[test]
    fn document_must_not_be_empty() {
        assert!(validate_document(&Map::new()).is_err());
        assert!(validate_document(&obj(json!({"name": "x"}))).is_ok());
        assert!(validate_document(&obj(json!({"id": 3}))).is_err());
        assert!(validate_document(&obj(json!({"id": 3, "is_completed": true}))).is_ok());
    }

    #[test]
    fn parse_id_variants() {
        assert_eq!(parse_id(&obj(json!({"id": 7})), IdPurpose::Update), Ok(7));
        assert_eq!(parse_id(&obj(json!({"id": "12"})), IdPurpose::Delete), Ok(12));

        let err = parse_id(&obj(json!({})), IdPurpose::Update).unwrap_err();
        assert_eq!(err.message, "ID is required for updating an item.");
        let err = parse_id(&obj(json!({"id": 0})), IdPurpose::Delete).unwrap_err();
        assert_eq!(err.message, "ID is required for deleting an item.");
        assert!(parse_id(&obj(json!({"id": "abc"})), IdPurpose::Delete).is_err());
        assert!(parse_id(&obj(json!({"id": 1.5})), IdPurpose::Delete).is_err());
    }
}
