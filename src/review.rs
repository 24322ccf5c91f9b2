use time::OffsetDateTime;
use tracing::info;

use crate::{
    error::Result,
    record::{FeedbackItem, FeedbackStatus, ReviewSection, StudentRecord},
    store::RecordStore,
    utils::now_utc,
};

/// Attach reviewer feedback to one section of a stored record. Writes only
/// `teacherFeedback.<section>`, immediately and without debouncing, so it can
/// never clobber a student's concurrent edits. Failures go straight back to
/// the caller.
pub async fn attach_feedback(
    store: &RecordStore,
    record_id: &str,
    section: ReviewSection,
    comment: impl Into<String>,
    status: FeedbackStatus,
) -> Result<FeedbackItem> {
    let item = FeedbackItem {
        comment: comment.into(),
        status,
        date: now_utc(),
    };
    store.attach_feedback(record_id, section, &item).await?;
    info!("feedback on {record_id}/{section}: {status:?}");
    Ok(item)
}

/// One card on the reviewer's overview.
#[derive(Debug, Clone, PartialEq)]
pub struct StudentCard {
    pub id: String,
    pub title: String,
    pub name: String,
    pub class_code: String,
    pub cover_image: Option<String>,
    pub completion_percentage: u8,
    pub last_updated: OffsetDateTime,
    /// Reviewed sections only, in book order.
    pub badges: Vec<(&'static str, FeedbackStatus)>,
}

impl From<&StudentRecord> for StudentCard {
    fn from(record: &StudentRecord) -> Self {
        let badges = ReviewSection::ALL
            .iter()
            .filter_map(|s| record.teacher_feedback.get(s).map(|f| (s.badge(), f.status)))
            .collect();
        Self {
            id: record.id.clone(),
            title: record.display_title().to_string(),
            name: record.name.clone(),
            class_code: record.class_code.clone(),
            cover_image: Some(record.cover_page.image_url.clone()).filter(|u| !u.is_empty()),
            completion_percentage: record.completion_percentage,
            last_updated: record.last_updated,
            badges,
        }
    }
}

/// Cards for every record, most recently updated first.
pub fn overview(records: &[StudentRecord]) -> Vec<StudentCard> {
    let mut cards: Vec<StudentCard> = records.iter().map(StudentCard::from).collect();
    cards.sort_by(|a, b| b.last_updated.cmp(&a.last_updated));
    cards
}
