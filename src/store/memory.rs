use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::{Map, Value};
use time::OffsetDateTime;

use super::{DocumentStore, Predicate, as_object, merge_partial, new_id, stamp};
use crate::{error::StoreError, record::STUDENTS, utils::now_utc};

/// In-process document store with the same semantics as [`super::SqliteStore`],
/// including the `(name, classCode)` uniqueness on students.
#[derive(Debug)]
pub struct MemoryStore {
    collections: DashMap<String, Vec<(String, Map<String, Value>)>>,
    unique: Vec<(String, Vec<String>)>,
    offline: AtomicBool,
    writes: AtomicUsize,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            collections: DashMap::new(),
            unique: vec![(
                STUDENTS.to_string(),
                vec!["name".to_string(), "classCode".to_string()],
            )],
            offline: AtomicBool::new(false),
            writes: AtomicUsize::new(0),
        }
    }

    /// Make every write fail as if the backend were unreachable.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Successful `create` and `upsert` calls so far.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn check_online(&self) -> Result<(), StoreError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Io(std::io::Error::new(
                std::io::ErrorKind::NotConnected,
                "document store unreachable",
            )));
        }
        Ok(())
    }

    fn violates_unique(
        &self,
        collection: &str,
        docs: &[(String, Map<String, Value>)],
        id: &str,
        candidate: &Map<String, Value>,
    ) -> bool {
        self.unique
            .iter()
            .filter(|(c, _)| c == collection)
            .any(|(_, fields)| {
                docs.iter().any(|(other_id, other)| {
                    other_id != id && fields.iter().all(|f| other.get(f) == candidate.get(f))
                })
            })
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn create(&self, collection: &str, document: Value) -> Result<String, StoreError> {
        self.check_online()?;
        let mut document = as_object(document)?;
        let id = new_id();
        stamp(&mut document, &id, now_utc())?;
        let mut docs = self.collections.entry(collection.to_string()).or_default();
        if self.violates_unique(collection, &docs, &id, &document) {
            return Err(StoreError::Conflict {
                collection: collection.to_string(),
            });
        }
        docs.push((id.clone(), document));
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(id)
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.collections.get(collection).and_then(|docs| {
            docs.iter()
                .find(|(doc_id, _)| doc_id == id)
                .map(|(_, doc)| Value::Object(doc.clone()))
        }))
    }

    async fn query(&self, collection: &str, predicates: &[Predicate]) -> Result<Vec<Value>, StoreError> {
        let Some(docs) = self.collections.get(collection) else {
            return Ok(vec![]);
        };
        Ok(docs
            .iter()
            .map(|(_, doc)| Value::Object(doc.clone()))
            .filter(|doc| predicates.iter().all(|p| p.matches(doc)))
            .collect())
    }

    async fn upsert(
        &self,
        collection: &str,
        id: &str,
        partial: Value,
    ) -> Result<OffsetDateTime, StoreError> {
        self.check_online()?;
        let now = now_utc();
        let mut docs = self.collections.entry(collection.to_string()).or_default();
        let index = docs.iter().position(|(doc_id, _)| doc_id == id);
        let mut document = match index {
            Some(i) => docs[i].1.clone(),
            None => Map::new(),
        };
        merge_partial(&mut document, partial)?;
        stamp(&mut document, id, now)?;
        if self.violates_unique(collection, &docs, id, &document) {
            return Err(StoreError::Conflict {
                collection: collection.to_string(),
            });
        }
        match index {
            Some(i) => docs[i].1 = document,
            None => docs.push((id.to_string(), document)),
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(now)
    }
}
