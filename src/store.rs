pub mod memory;
pub mod records;
pub mod sqlite;

use async_trait::async_trait;
use serde_json::{Map, Value};
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

use crate::error::StoreError;

pub use memory::MemoryStore;
pub use records::RecordStore;
pub use sqlite::SqliteStore;

/// Equality filter on a top-level document field.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Eq(String, Value),
}

impl Predicate {
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Predicate::Eq(field.into(), value.into())
    }

    pub fn matches(&self, document: &Value) -> bool {
        match self {
            Predicate::Eq(field, value) => document.get(field) == Some(value),
        }
    }
}

/// Remote document database holding JSON objects in flat collections.
///
/// Returned documents always carry their `id` and the store-assigned
/// `lastUpdated` timestamp.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Insert `document` under a freshly generated id.
    async fn create(&self, collection: &str, document: Value) -> Result<String, StoreError>;

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>, StoreError>;

    async fn query(&self, collection: &str, predicates: &[Predicate]) -> Result<Vec<Value>, StoreError>;

    /// Merge `partial` into the document, creating it if absent. Top-level keys
    /// replace whole fields; dotted keys such as `teacherFeedback.elderStory`
    /// replace a single nested field. Returns the timestamp written.
    async fn upsert(
        &self,
        collection: &str,
        id: &str,
        partial: Value,
    ) -> Result<OffsetDateTime, StoreError>;
}

pub(crate) fn new_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

fn as_object(value: Value) -> Result<Map<String, Value>, StoreError> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(StoreError::Malformed(format!("expected an object, got {other}"))),
    }
}

/// Apply `partial` onto `target` with field-path semantics.
pub(crate) fn merge_partial(target: &mut Map<String, Value>, partial: Value) -> Result<(), StoreError> {
    for (key, value) in as_object(partial)? {
        let mut path = key.split('.').peekable();
        let mut node = &mut *target;
        while let Some(segment) = path.next() {
            if path.peek().is_none() {
                node.insert(segment.to_string(), value);
                break;
            }
            let child = node
                .entry(segment.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !child.is_object() {
                *child = Value::Object(Map::new());
            }
            node = match child {
                Value::Object(map) => map,
                _ => unreachable!("replaced with an object above"),
            };
        }
    }
    Ok(())
}

pub(crate) fn stamp(
    document: &mut Map<String, Value>,
    id: &str,
    now: OffsetDateTime,
) -> Result<(), StoreError> {
    let formatted = now
        .format(&Rfc3339)
        .map_err(|e| StoreError::Malformed(e.to_string()))?;
    document.insert("id".to_string(), Value::String(id.to_string()));
    document.insert("lastUpdated".to_string(), Value::String(formatted));
    Ok(())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn dotted_keys_touch_only_nested_field() {
        let mut doc = as_object(json!({
            "name": "Ava",
            "teacherFeedback": { "introduction": { "comment": "good" } },
            "introduction": { "content": "<p>hi</p>" }
        }))
        .unwrap();
        merge_partial(
            &mut doc,
            json!({ "teacherFeedback.elderStory": { "comment": "more detail" } }),
        )
        .unwrap();
        assert_eq!(doc["teacherFeedback"]["introduction"]["comment"], "good");
        assert_eq!(doc["teacherFeedback"]["elderStory"]["comment"], "more detail");
        assert_eq!(doc["introduction"]["content"], "<p>hi</p>");
    }

    #[test]
    fn top_level_keys_replace_whole_fields() {
        let mut doc = as_object(json!({ "introduction": { "content": "a", "images": ["x"] } })).unwrap();
        merge_partial(&mut doc, json!({ "introduction": { "content": "b" } })).unwrap();
        assert_eq!(doc["introduction"], json!({ "content": "b" }));
    }

    #[test]
    fn dotted_key_creates_missing_parents() {
        let mut doc = Map::new();
        merge_partial(&mut doc, json!({ "a.b.c": 1 })).unwrap();
        assert_eq!(Value::Object(doc), json!({ "a": { "b": { "c": 1 } } }));
    }

    #[test]
    fn non_object_partial_is_malformed() {
        let mut doc = Map::new();
        assert!(matches!(
            merge_partial(&mut doc, json!([1, 2])),
            Err(StoreError::Malformed(_))
        ));
    }
}
