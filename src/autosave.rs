//! Debounced persistence of a student's in-memory record.
//!
//! Every edit lands in memory at once and re-arms a single quiet-period timer.
//! When the timer fires, derived fields are recomputed and the whole record is
//! written. Writes are serialized through one gate, so at most one is in flight
//! per coordinator; edits made meanwhile arm a fresh timer and reach the store
//! with the next write.

use std::{sync::Arc, time::Duration};

use parking_lot::Mutex;
use time::OffsetDateTime;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::{
    error::{Result, ValidationError},
    record::{SectionEdit, StudentRecord},
    store::RecordStore,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SavePhase {
    Idle,
    PendingSave,
    Saving,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveTrigger {
    Autosave,
    Manual,
    Flush,
}

/// Identity of one armed timer. Only the timer holding the current token may save.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerToken(u64);

struct PendingTimer {
    token: TimerToken,
    handle: JoinHandle<()>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SaveStatus {
    pub phase: SavePhase,
    pub last_saved: Option<OffsetDateTime>,
    pub last_error: Option<String>,
}

struct State {
    record: StudentRecord,
    pending: Option<PendingTimer>,
    next_token: u64,
    /// Writes queued on or holding the gate.
    writers: usize,
    last_saved: Option<OffsetDateTime>,
    last_error: Option<String>,
}

struct Inner {
    store: RecordStore,
    window: Duration,
    state: Mutex<State>,
    gate: tokio::sync::Mutex<()>,
}

pub struct AutosaveCoordinator {
    inner: Arc<Inner>,
}

impl AutosaveCoordinator {
    pub fn new(store: RecordStore, record: StudentRecord, window: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                window,
                state: Mutex::new(State {
                    record,
                    pending: None,
                    next_token: 0,
                    writers: 0,
                    last_saved: None,
                    last_error: None,
                }),
                gate: tokio::sync::Mutex::new(()),
            }),
        }
    }

    /// Snapshot of the in-memory record, including unsaved edits.
    pub fn record(&self) -> StudentRecord {
        self.inner.state.lock().record.clone()
    }

    pub fn with_record<T>(&self, f: impl FnOnce(&StudentRecord) -> T) -> T {
        f(&self.inner.state.lock().record)
    }

    pub fn window(&self) -> Duration {
        self.inner.window
    }

    pub fn status(&self) -> SaveStatus {
        let state = self.inner.state.lock();
        let phase = if state.writers > 0 {
            SavePhase::Saving
        } else if state.pending.is_some() {
            SavePhase::PendingSave
        } else {
            SavePhase::Idle
        };
        SaveStatus {
            phase,
            last_saved: state.last_saved,
            last_error: state.last_error.clone(),
        }
    }

    pub fn has_pending_timer(&self) -> bool {
        self.inner.state.lock().pending.is_some()
    }

    /// Merge `edit` into the in-memory record and restart the quiet period.
    /// Must be called from within a tokio runtime.
    pub fn edit(&self, edit: SectionEdit) -> std::result::Result<(), ValidationError> {
        self.edit_with(|_| Ok(edit))
    }

    /// Like [`Self::edit`], with the edit built from the latest in-memory record.
    pub fn edit_with(
        &self,
        build: impl FnOnce(&StudentRecord) -> std::result::Result<SectionEdit, ValidationError>,
    ) -> std::result::Result<(), ValidationError> {
        let mut state = self.inner.state.lock();
        let edit = build(&state.record)?;
        state.record.apply(edit)?;
        Inner::arm(&self.inner, &mut state);
        Ok(())
    }

    /// Cancel any pending timer and write the current record now.
    pub async fn save_now(&self) -> Result<OffsetDateTime> {
        self.inner.disarm();
        self.inner.write(SaveTrigger::Manual).await
    }

    /// Write a pending save immediately, or wait out a write already in flight.
    /// Returns the timestamp when a write happened.
    pub async fn flush(&self) -> Result<Option<OffsetDateTime>> {
        if self.inner.disarm() {
            return self.inner.write(SaveTrigger::Flush).await.map(Some);
        }
        let _gate = self.inner.gate.lock().await;
        Ok(None)
    }

    /// Flush and tear down.
    pub async fn close(self) -> Result<Option<OffsetDateTime>> {
        self.flush().await
    }
}

impl Drop for AutosaveCoordinator {
    fn drop(&mut self) {
        if self.inner.disarm() {
            warn!(
                "autosave coordinator for {} dropped with unsaved edits",
                self.inner.state.lock().record.id
            );
        }
    }
}

/// Counts one write as queued or running for as long as it lives, so a
/// cancelled save never leaves the phase stuck at `Saving`.
struct Writing<'a> {
    state: &'a Mutex<State>,
}

impl<'a> Writing<'a> {
    fn enter(state: &'a Mutex<State>) -> Self {
        state.lock().writers += 1;
        Self { state }
    }
}

impl Drop for Writing<'_> {
    fn drop(&mut self) {
        self.state.lock().writers -= 1;
    }
}

impl Inner {
    fn arm(this: &Arc<Inner>, state: &mut State) {
        if let Some(previous) = state.pending.take() {
            previous.handle.abort();
        }
        let token = TimerToken(state.next_token);
        state.next_token += 1;
        let inner = Arc::clone(this);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(inner.window).await;
            inner.fire(token).await;
        });
        state.pending = Some(PendingTimer { token, handle });
    }

    /// Cancel the armed timer, if any. Returns whether one was armed.
    fn disarm(&self) -> bool {
        match self.state.lock().pending.take() {
            Some(pending) => {
                pending.handle.abort();
                true
            }
            None => false,
        }
    }

    async fn fire(&self, token: TimerToken) {
        {
            let mut state = self.state.lock();
            if state.pending.as_ref().map(|p| p.token) != Some(token) {
                debug!("stale autosave timer {token:?} ignored");
                return;
            }
            state.pending = None;
        }
        if let Err(e) = self.write(SaveTrigger::Autosave).await {
            // edits stay in memory; the next edit or manual save retries
            warn!("autosave failed: {e}");
        }
    }

    async fn write(&self, trigger: SaveTrigger) -> Result<OffsetDateTime> {
        let writing = Writing::enter(&self.state);
        let _gate = self.gate.lock().await;
        let snapshot = {
            let mut state = self.state.lock();
            state.record.refresh_derived();
            state.record.clone()
        };
        let result = self.store.save_record(&snapshot).await;
        drop(writing);
        let mut state = self.state.lock();
        match result {
            Ok(stamped) => {
                state.record.last_updated = stamped;
                state.last_saved = Some(stamped);
                state.last_error = None;
                info!(
                    "saved record {} at {}% ({trigger:?})",
                    snapshot.id, snapshot.completion_percentage
                );
                Ok(stamped)
            }
            Err(e) => {
                state.last_error = Some(e.to_string());
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use async_trait::async_trait;
    use serde_json::Value;
    use tokio::time::{Instant, sleep};

    use super::*;
    use crate::{
        error::{Error, StoreError},
        record::edit::{CoverPatch, IntroductionPatch},
        store::{DocumentStore, MemoryStore, Predicate},
    };

    /// Records every upsert with the paused-clock instant it was issued at.
    struct RecordingStore {
        inner: MemoryStore,
        delay: Duration,
        fail: AtomicBool,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        writes: Mutex<Vec<(Instant, Value)>>,
    }

    impl RecordingStore {
        fn new(delay: Duration) -> Self {
            Self {
                inner: MemoryStore::new(),
                delay,
                fail: AtomicBool::new(false),
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
                writes: Mutex::new(vec![]),
            }
        }

        fn writes(&self) -> Vec<(Instant, Value)> {
            self.writes.lock().clone()
        }
    }

    #[async_trait]
    impl DocumentStore for RecordingStore {
        async fn create(&self, collection: &str, document: Value) -> std::result::Result<String, StoreError> {
            self.inner.create(collection, document).await
        }

        async fn get(&self, collection: &str, id: &str) -> std::result::Result<Option<Value>, StoreError> {
            self.inner.get(collection, id).await
        }

        async fn query(
            &self,
            collection: &str,
            predicates: &[Predicate],
        ) -> std::result::Result<Vec<Value>, StoreError> {
            self.inner.query(collection, predicates).await
        }

        async fn upsert(
            &self,
            collection: &str,
            id: &str,
            partial: Value,
        ) -> std::result::Result<OffsetDateTime, StoreError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            self.writes.lock().push((Instant::now(), partial.clone()));
            sleep(self.delay).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            if self.fail.load(Ordering::SeqCst) {
                return Err(StoreError::Malformed("backend unavailable".into()));
            }
            self.inner.upsert(collection, id, partial).await
        }
    }

    async fn setup(delay: Duration) -> (Arc<RecordingStore>, AutosaveCoordinator) {
        let documents = Arc::new(RecordingStore::new(delay));
        let store = RecordStore::new(documents.clone());
        let record = store.open_or_create("Ava", "X1").await.unwrap();
        let coordinator = AutosaveCoordinator::new(store, record, Duration::from_secs(2));
        (documents, coordinator)
    }

    fn intro(content: &str) -> SectionEdit {
        SectionEdit::Introduction(IntroductionPatch {
            content: Some(content.to_string()),
            ..Default::default()
        })
    }

    #[tokio::test(start_paused = true)]
    async fn burst_of_edits_yields_one_write() {
        let (documents, coordinator) = setup(Duration::ZERO).await;
        let start = Instant::now();

        coordinator.edit(intro("<p>one</p>")).unwrap();
        sleep(Duration::from_millis(500)).await;
        coordinator.edit(intro("<p>one two</p>")).unwrap();
        sleep(Duration::from_millis(500)).await;
        coordinator.edit(intro("<p>one two three</p>")).unwrap();
        assert_eq!(coordinator.status().phase, SavePhase::PendingSave);
        // in memory immediately
        assert_eq!(coordinator.record().introduction.word_count, 3);

        sleep(Duration::from_millis(1990)).await;
        assert!(documents.writes().is_empty());

        sleep(Duration::from_millis(20)).await;
        let writes = documents.writes();
        assert_eq!(writes.len(), 1);
        let (at, body) = &writes[0];
        let elapsed = *at - start;
        assert!(elapsed >= Duration::from_secs(3) && elapsed < Duration::from_millis(3010));
        assert_eq!(body["introduction"]["content"], "<p>one two three</p>");
        assert_eq!(body["introduction"]["wordCount"], 3);

        let status = coordinator.status();
        assert_eq!(status.phase, SavePhase::Idle);
        assert!(status.last_saved.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn manual_save_preempts_timer() {
        let (documents, coordinator) = setup(Duration::ZERO).await;
        let start = Instant::now();

        coordinator.edit(intro("<p>draft</p>")).unwrap();
        sleep(Duration::from_millis(300)).await;
        coordinator.save_now().await.unwrap();
        assert!(!coordinator.has_pending_timer());

        sleep(Duration::from_secs(5)).await;
        let writes = documents.writes();
        assert_eq!(writes.len(), 1);
        assert!(writes[0].0 - start < Duration::from_millis(310));
        assert_eq!(writes[0].1["introduction"]["content"], "<p>draft</p>");
    }

    #[tokio::test(start_paused = true)]
    async fn edit_during_save_is_captured_by_next_write() {
        let (documents, coordinator) = setup(Duration::from_secs(1)).await;

        coordinator.edit(intro("<p>first</p>")).unwrap();
        // timer fires at 2s, write runs until 3s
        sleep(Duration::from_millis(2500)).await;
        assert_eq!(coordinator.status().phase, SavePhase::Saving);
        coordinator.edit(intro("<p>first second</p>")).unwrap();
        assert!(coordinator.has_pending_timer());

        sleep(Duration::from_secs(10)).await;
        let writes = documents.writes();
        assert_eq!(writes.len(), 2);
        assert_eq!(writes[0].1["introduction"]["content"], "<p>first</p>");
        assert_eq!(writes[1].1["introduction"]["content"], "<p>first second</p>");
        assert_eq!(documents.max_in_flight.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn abandoned_manual_save_does_not_stick_in_saving() {
        let (documents, coordinator) = setup(Duration::from_secs(5)).await;
        coordinator.edit(intro("<p>slow</p>")).unwrap();
        let abandoned = tokio::time::timeout(Duration::from_millis(100), coordinator.save_now()).await;
        assert!(abandoned.is_err());
        assert_eq!(documents.writes().len(), 1);
        assert_eq!(coordinator.status().phase, SavePhase::Idle);

        // the gate is free again for the next save
        coordinator.edit(intro("<p>slow again</p>")).unwrap();
        coordinator.save_now().await.unwrap();
        assert_eq!(coordinator.status().phase, SavePhase::Idle);
        assert_eq!(documents.writes().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn manual_save_waits_for_write_in_flight() {
        let (documents, coordinator) = setup(Duration::from_secs(1)).await;
        coordinator.edit(intro("<p>a</p>")).unwrap();
        sleep(Duration::from_millis(2200)).await;
        coordinator.edit(intro("<p>a b</p>")).unwrap();
        coordinator.save_now().await.unwrap();

        assert_eq!(documents.max_in_flight.load(Ordering::SeqCst), 1);
        let writes = documents.writes();
        assert_eq!(writes.len(), 2);
        assert_eq!(writes[1].1["introduction"]["content"], "<p>a b</p>");
        sleep(Duration::from_secs(10)).await;
        assert_eq!(documents.writes().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_autosave_keeps_edits_and_does_not_retry() {
        let (documents, coordinator) = setup(Duration::ZERO).await;
        documents.fail.store(true, Ordering::SeqCst);

        coordinator.edit(intro("<p>keep me safe</p>")).unwrap();
        sleep(Duration::from_secs(30)).await;
        assert_eq!(documents.writes().len(), 1);
        let status = coordinator.status();
        assert_eq!(status.phase, SavePhase::Idle);
        assert!(status.last_error.is_some());
        assert_eq!(coordinator.record().introduction.content, "<p>keep me safe</p>");

        // manual saves surface the failure
        let err = coordinator.save_now().await.unwrap_err();
        assert!(matches!(err, Error::Store(_)));

        documents.fail.store(false, Ordering::SeqCst);
        coordinator
            .edit(SectionEdit::Cover(CoverPatch {
                title: Some("River Songs".into()),
                ..Default::default()
            }))
            .unwrap();
        sleep(Duration::from_secs(3)).await;
        assert!(coordinator.status().last_error.is_none());
        let saved = documents
            .inner
            .get(crate::record::STUDENTS, &coordinator.record().id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(saved["introduction"]["content"], "<p>keep me safe</p>");
        assert_eq!(saved["coverPage"]["title"], "River Songs");
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_edit_arms_nothing() {
        let (documents, coordinator) = setup(Duration::ZERO).await;
        let images = (0..3).map(|i| format!("file:///{i}.png")).collect();
        let err = coordinator
            .edit(SectionEdit::Introduction(IntroductionPatch {
                images: Some(images),
                ..Default::default()
            }))
            .unwrap_err();
        assert!(matches!(err, ValidationError::MediaLimit { .. }));
        assert_eq!(coordinator.status().phase, SavePhase::Idle);
        sleep(Duration::from_secs(5)).await;
        assert!(documents.writes().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn close_flushes_pending_edits() {
        let (documents, coordinator) = setup(Duration::ZERO).await;
        coordinator.edit(intro("<p>last words</p>")).unwrap();
        let flushed = coordinator.close().await.unwrap();
        assert!(flushed.is_some());
        let writes = documents.writes();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].1["introduction"]["content"], "<p>last words</p>");
    }

    #[tokio::test(start_paused = true)]
    async fn save_recomputes_completion() {
        let (documents, coordinator) = setup(Duration::ZERO).await;
        coordinator
            .edit(SectionEdit::CulturalContext(crate::record::edit::CulturalPatch {
                content: Some("<p>Lunar new year</p>".into()),
                ..Default::default()
            }))
            .unwrap();
        coordinator.save_now().await.unwrap();
        assert_eq!(coordinator.record().completion_percentage, 20);
        assert_eq!(documents.writes()[0].1["completionPercentage"], 20);
    }
}
