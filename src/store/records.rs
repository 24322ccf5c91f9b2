use std::sync::Arc;

use serde_json::{Map, Value};
use time::OffsetDateTime;
use tracing::{info, warn};

use super::{DocumentStore, Predicate};
use crate::{
    error::{Error, Result, StoreError, ValidationError},
    record::{FeedbackItem, ReviewSection, STUDENTS, StudentRecord},
};

/// Typed client for the `students` collection.
#[derive(Clone)]
pub struct RecordStore {
    documents: Arc<dyn DocumentStore>,
}

fn decode(document: Value) -> Result<StudentRecord> {
    Ok(serde_json::from_value(document)?)
}

/// Everything the student owns, for a full-record save. Reviewer feedback is
/// left out so a student save never overwrites a concurrent review.
fn student_owned(record: &StudentRecord) -> Result<Value> {
    let mut document = serde_json::to_value(record)?;
    if let Value::Object(map) = &mut document {
        map.remove("id");
        map.remove("lastUpdated");
        map.remove("teacherFeedback");
    }
    Ok(document)
}

impl RecordStore {
    pub fn new(documents: Arc<dyn DocumentStore>) -> Self {
        Self { documents }
    }

    pub fn documents(&self) -> &Arc<dyn DocumentStore> {
        &self.documents
    }

    pub async fn create_record(&self, record: &StudentRecord) -> Result<StudentRecord> {
        let mut document = serde_json::to_value(record)?;
        if let Value::Object(map) = &mut document {
            map.remove("id");
        }
        let id = self.documents.create(STUDENTS, document).await?;
        self.get_record(&id).await
    }

    pub async fn get_record(&self, id: &str) -> Result<StudentRecord> {
        match self.documents.get(STUDENTS, id).await? {
            Some(document) => decode(document),
            None => Err(Error::NotFound {
                collection: STUDENTS.to_string(),
                id: id.to_string(),
            }),
        }
    }

    pub async fn find_by_identity(&self, name: &str, class_code: &str) -> Result<Option<StudentRecord>> {
        let found = self
            .documents
            .query(
                STUDENTS,
                &[
                    Predicate::eq("name", name),
                    Predicate::eq("classCode", class_code),
                ],
            )
            .await?;
        if found.len() > 1 {
            warn!("{} records share identity {name}/{class_code}", found.len());
        }
        found.into_iter().next().map(decode).transpose()
    }

    /// The login lookup: reuse the record for `(name, class_code)` or create it.
    /// A uniqueness conflict means another session created it first, so the
    /// lookup is repeated instead of creating a duplicate.
    pub async fn open_or_create(&self, name: &str, class_code: &str) -> Result<StudentRecord> {
        let name = name.trim();
        let class_code = class_code.trim();
        if name.is_empty() {
            return Err(ValidationError::EmptyField("name").into());
        }
        if class_code.is_empty() {
            return Err(ValidationError::EmptyField("classCode").into());
        }
        if let Some(record) = self.find_by_identity(name, class_code).await? {
            info!("student {name}/{class_code} reuses record {}", record.id);
            return Ok(record);
        }
        match self.create_record(&StudentRecord::new(name, class_code)).await {
            Ok(record) => {
                info!("student {name}/{class_code} created record {}", record.id);
                Ok(record)
            }
            Err(Error::Store(StoreError::Conflict { .. })) => {
                self.find_by_identity(name, class_code).await?.ok_or_else(|| {
                    Error::Fatal(anyhow::anyhow!(
                        "record for {name}/{class_code} conflicted but cannot be found"
                    ))
                })
            }
            Err(e) => Err(e),
        }
    }

    pub async fn list_by_class(&self, class_code: &str) -> Result<Vec<StudentRecord>> {
        self.documents
            .query(STUDENTS, &[Predicate::eq("classCode", class_code)])
            .await?
            .into_iter()
            .map(decode)
            .collect()
    }

    pub async fn list_all(&self) -> Result<Vec<StudentRecord>> {
        self.documents
            .query(STUDENTS, &[])
            .await?
            .into_iter()
            .map(decode)
            .collect()
    }

    /// Write every student-owned field of `record`. Returns the store's timestamp.
    pub async fn save_record(&self, record: &StudentRecord) -> Result<OffsetDateTime> {
        let document = student_owned(record)?;
        Ok(self.documents.upsert(STUDENTS, &record.id, document).await?)
    }

    /// Set one feedback entry without reading or rewriting anything else.
    pub async fn attach_feedback(
        &self,
        id: &str,
        section: ReviewSection,
        item: &FeedbackItem,
    ) -> Result<OffsetDateTime> {
        if self.documents.get(STUDENTS, id).await?.is_none() {
            return Err(Error::NotFound {
                collection: STUDENTS.to_string(),
                id: id.to_string(),
            });
        }
        let mut patch = Map::new();
        patch.insert(format!("teacherFeedback.{section}"), serde_json::to_value(item)?);
        Ok(self.documents.upsert(STUDENTS, id, Value::Object(patch)).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        record::FeedbackStatus,
        store::{MemoryStore, SqliteStore},
        utils::now_utc,
    };

    async fn stores() -> Vec<RecordStore> {
        vec![
            RecordStore::new(Arc::new(MemoryStore::new())),
            RecordStore::new(Arc::new(SqliteStore::in_memory().await.unwrap())),
        ]
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_saves_and_feedback_on_a_file_database() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("elders.db").display());
        let store = RecordStore::new(Arc::new(SqliteStore::connect(&url).await.unwrap()));
        let record = store.open_or_create("Ava", "X1").await.unwrap();

        let mut tasks = Vec::new();
        for i in 0..20 {
            let save_store = store.clone();
            let mut draft = record.clone();
            tasks.push(tokio::spawn(async move {
                draft.introduction.content = format!("<p>draft {i}</p>");
                save_store.save_record(&draft).await.map(|_| ())
            }));
            let store = store.clone();
            let id = record.id.clone();
            tasks.push(tokio::spawn(async move {
                let item = FeedbackItem {
                    comment: format!("note {i}"),
                    status: FeedbackStatus::NeedsRevision,
                    date: now_utc(),
                };
                let section = ReviewSection::ALL[i % ReviewSection::ALL.len()];
                store.attach_feedback(&id, section, &item).await.map(|_| ())
            }));
        }
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let back = store.get_record(&record.id).await.unwrap();
        assert!(back.introduction.content.starts_with("<p>draft "));
        assert_eq!(back.teacher_feedback.len(), ReviewSection::ALL.len());
    }

    #[tokio::test]
    async fn relogin_reuses_record() {
        for store in stores().await {
            let first = store.open_or_create("Ava", "X1").await.unwrap();
            let second = store.open_or_create(" Ava ", "X1").await.unwrap();
            assert_eq!(first.id, second.id);
            assert_eq!(first.completion_percentage, 0);
            assert_eq!(store.list_all().await.unwrap().len(), 1);
        }
    }

    #[tokio::test]
    async fn concurrent_first_logins_converge() {
        for store in stores().await {
            let (a, b) = tokio::join!(
                store.open_or_create("Ava", "X1"),
                store.open_or_create("Ava", "X1")
            );
            assert_eq!(a.unwrap().id, b.unwrap().id);
            assert_eq!(store.list_by_class("X1").await.unwrap().len(), 1);
        }
    }

    #[tokio::test]
    async fn blank_identity_is_rejected() {
        let store = RecordStore::new(Arc::new(MemoryStore::new()));
        let err = store.open_or_create("  ", "X1").await.unwrap_err();
        assert!(matches!(err, Error::Validation(ValidationError::EmptyField("name"))));
    }

    #[tokio::test]
    async fn save_then_read_round_trips() {
        for store in stores().await {
            let mut record = store.open_or_create("Ava", "X1").await.unwrap();
            let item = FeedbackItem {
                comment: "Lovely opening".into(),
                status: FeedbackStatus::Approved,
                date: now_utc(),
            };
            store
                .attach_feedback(&record.id, ReviewSection::Introduction, &item)
                .await
                .unwrap();

            record.introduction.content = "<p>Once upon a time</p>".into();
            record.elder_story.images = vec!["file:///b.png".into(), "file:///a.png".into()];
            record.cultural_context.reference_links = vec!["https://example.org".into()];
            record.refresh_derived();
            let stamped = store.save_record(&record).await.unwrap();

            let back = store.get_record(&record.id).await.unwrap();
            assert_eq!(back.introduction, record.introduction);
            assert_eq!(back.elder_story.images, record.elder_story.images);
            assert_eq!(back.cultural_context, record.cultural_context);
            assert_eq!(back.last_updated.unix_timestamp(), stamped.unix_timestamp());
            // the stale in-memory record had no feedback; the save kept the review
            let kept = &back.teacher_feedback[&ReviewSection::Introduction];
            assert_eq!(kept.comment, item.comment);
            assert_eq!(kept.status, item.status);
        }
    }

    #[tokio::test]
    async fn feedback_on_missing_record_fails() {
        let store = RecordStore::new(Arc::new(MemoryStore::new()));
        let item = FeedbackItem {
            comment: "x".into(),
            status: FeedbackStatus::NeedsRevision,
            date: now_utc(),
        };
        let err = store
            .attach_feedback("nope", ReviewSection::ElderStory, &item)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }
}
