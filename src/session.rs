use std::sync::Arc;

use time::OffsetDateTime;
use tracing::info;

use crate::{
    analytics::ClassAnalytics,
    anthology::{Page, compile_anthology, compile_preview},
    auth::{Authenticator, TeacherIdentity},
    autosave::{AutosaveCoordinator, SaveStatus},
    blob::{BlobStore, Progress, UploadRule, upload_media},
    config::Config,
    error::{Result, ValidationError},
    record::{FeedbackItem, FeedbackStatus, ReviewSection, SectionEdit, SectionKey, StudentRecord},
    review::{self, StudentCard, overview},
    store::RecordStore,
};

/// A student's editing session, from login to logout. Owns the autosave
/// coordinator for the student's record.
pub struct StudentSession {
    autosave: AutosaveCoordinator,
}

impl StudentSession {
    /// Resolve the record for `(name, class_code)`, creating it on first login.
    pub async fn begin(store: RecordStore, config: &Config, name: &str, class_code: &str) -> Result<Self> {
        let record = store.open_or_create(name, class_code).await?;
        info!(
            "student session for {} ({}) on record {}",
            record.name, record.class_code, record.id
        );
        Ok(Self {
            autosave: AutosaveCoordinator::new(store, record, config.debounce_window()),
        })
    }

    /// The in-memory record, including edits not yet saved.
    pub fn record(&self) -> StudentRecord {
        self.autosave.record()
    }

    pub fn edit(&self, edit: SectionEdit) -> std::result::Result<(), ValidationError> {
        self.autosave.edit(edit)
    }

    pub fn edit_with(
        &self,
        build: impl FnOnce(&StudentRecord) -> std::result::Result<SectionEdit, ValidationError>,
    ) -> std::result::Result<(), ValidationError> {
        self.autosave.edit_with(build)
    }

    /// Validate and upload a file for `section`; the caller attaches the url
    /// through an editor.
    pub async fn upload(
        &self,
        blobs: &dyn BlobStore,
        rule: UploadRule,
        section: SectionKey,
        file_name: &str,
        bytes: &[u8],
        on_progress: Progress<'_>,
    ) -> Result<String> {
        let record = self.record();
        upload_media(blobs, rule, &record, section, file_name, bytes, on_progress).await
    }

    pub async fn save_now(&self) -> Result<OffsetDateTime> {
        self.autosave.save_now().await
    }

    pub fn status(&self) -> SaveStatus {
        self.autosave.status()
    }

    pub fn preview(&self) -> Vec<Page> {
        self.autosave.with_record(compile_preview)
    }

    /// Flush any pending save and close the session.
    pub async fn end(self) -> Result<Option<OffsetDateTime>> {
        let saved = self.autosave.close().await?;
        info!("student session ended");
        Ok(saved)
    }
}

/// A signed-in reviewer.
pub struct TeacherSession {
    identity: TeacherIdentity,
    store: RecordStore,
}

impl TeacherSession {
    pub async fn begin(
        authenticator: Arc<dyn Authenticator>,
        store: RecordStore,
        email: &str,
        password: &str,
    ) -> Result<Self> {
        let identity = authenticator.sign_in(email, password).await?;
        info!("teacher session for {}", identity.email);
        Ok(Self { identity, store })
    }

    pub fn identity(&self) -> &TeacherIdentity {
        &self.identity
    }

    pub async fn students(&self) -> Result<Vec<StudentCard>> {
        Ok(overview(&self.store.list_all().await?))
    }

    pub async fn student(&self, id: &str) -> Result<StudentRecord> {
        self.store.get_record(id).await
    }

    pub async fn give_feedback(
        &self,
        record_id: &str,
        section: ReviewSection,
        comment: &str,
        status: FeedbackStatus,
    ) -> Result<FeedbackItem> {
        review::attach_feedback(&self.store, record_id, section, comment, status).await
    }

    pub async fn analytics(&self) -> Result<ClassAnalytics> {
        Ok(ClassAnalytics::from_records(&self.store.list_all().await?))
    }

    pub async fn anthology(&self, threshold: u8) -> Result<Vec<Page>> {
        let records = self.store.list_all().await?;
        let pages = compile_anthology(&records, threshold);
        info!("compiled anthology of {} pages from {} records", pages.len(), records.len());
        Ok(pages)
    }

    pub fn end(self) {
        info!("teacher session for {} ended", self.identity.email);
    }
}
