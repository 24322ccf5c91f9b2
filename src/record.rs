pub mod edit;
pub mod feedback;
pub mod section;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

pub use edit::SectionEdit;
pub use feedback::{FeedbackItem, FeedbackStatus, ReviewSection, TeacherFeedback};
pub use section::{
    CoverPage, CulturalContext, ElderStory, Introduction, LessonsLearned, SectionKey,
};

use crate::{completion, utils::now_utc, word_count::word_count};

pub const STUDENTS: &str = "students";
pub const DEFAULT_EBOOK_TITLE: &str = "Untitled E-Book";
pub const DEFAULT_FONT: &str = "ancient-scroll";

/// One student's e-book. `word_count` fields and `completion_percentage` are
/// caches: they are recomputed before every save and never taken as input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentRecord {
    #[serde(default)]
    pub id: String,
    pub name: String,
    pub class_code: String,
    pub ebook_title: String,
    pub selected_font: String,
    #[serde(with = "time::serde::rfc3339")]
    pub last_updated: OffsetDateTime,
    pub completion_percentage: u8,
    pub cover_page: CoverPage,
    pub introduction: Introduction,
    pub elder_story: ElderStory,
    pub lessons_learned: LessonsLearned,
    pub cultural_context: CulturalContext,
    #[serde(default)]
    pub teacher_feedback: TeacherFeedback,
}

impl StudentRecord {
    /// A blank record for a first login. The id is assigned by the store.
    pub fn new(name: impl Into<String>, class_code: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id: String::new(),
            cover_page: CoverPage {
                author_name: name.clone(),
                font_style: DEFAULT_FONT.to_string(),
                ..Default::default()
            },
            name,
            class_code: class_code.into(),
            ebook_title: DEFAULT_EBOOK_TITLE.to_string(),
            selected_font: DEFAULT_FONT.to_string(),
            last_updated: now_utc(),
            completion_percentage: 0,
            introduction: Introduction::default(),
            elder_story: ElderStory::default(),
            lessons_learned: LessonsLearned::default(),
            cultural_context: CulturalContext::default(),
            teacher_feedback: TeacherFeedback::default(),
        }
    }

    /// Title shown in tables of contents: the cover title, else the e-book title.
    pub fn display_title(&self) -> &str {
        if self.cover_page.title.is_empty() {
            &self.ebook_title
        } else {
            &self.cover_page.title
        }
    }

    pub fn display_author(&self) -> &str {
        if self.cover_page.author_name.is_empty() {
            &self.name
        } else {
            &self.cover_page.author_name
        }
    }

    /// Merge `edit` into its section. A rejected edit leaves the record untouched.
    pub fn apply(&mut self, edit: SectionEdit) -> Result<(), crate::error::ValidationError> {
        edit.validate()?;
        edit.merge_into(self);
        Ok(())
    }

    /// Recompute every cached field from the source fields.
    pub fn refresh_derived(&mut self) {
        self.introduction.word_count = word_count(&self.introduction.content);
        self.elder_story.word_count = word_count(&self.elder_story.content);
        self.lessons_learned.word_count = word_count(&self.lessons_learned.content);
        self.cultural_context.word_count = word_count(&self.cultural_context.content);
        self.completion_percentage = completion::completion_percentage(self);
    }

    pub fn content(&self, key: SectionKey) -> &str {
        match key {
            SectionKey::Cover => &self.cover_page.title,
            SectionKey::Introduction => &self.introduction.content,
            SectionKey::ElderStory => &self.elder_story.content,
            SectionKey::LessonsLearned => &self.lessons_learned.content,
            SectionKey::CulturalContext => &self.cultural_context.content,
        }
    }

    pub fn cached_word_count(&self, key: SectionKey) -> usize {
        match key {
            SectionKey::Cover => 0,
            SectionKey::Introduction => self.introduction.word_count,
            SectionKey::ElderStory => self.elder_story.word_count,
            SectionKey::LessonsLearned => self.lessons_learned.word_count,
            SectionKey::CulturalContext => self.cultural_context.word_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_record_defaults() {
        let record = StudentRecord::new("Ava", "X1");
        assert_eq!(record.cover_page.author_name, "Ava");
        assert_eq!(record.ebook_title, DEFAULT_EBOOK_TITLE);
        assert_eq!(record.completion_percentage, 0);
        assert!(record.teacher_feedback.is_empty());
        assert_eq!(record.display_title(), DEFAULT_EBOOK_TITLE);
    }

    #[test]
    fn serializes_camel_case_document() {
        let mut record = StudentRecord::new("Ava", "X1");
        record.elder_story.audio_files.push("file:///a.mp3".into());
        let doc = serde_json::to_value(&record).unwrap();
        assert_eq!(doc["classCode"], "X1");
        assert_eq!(doc["coverPage"]["authorName"], "Ava");
        assert_eq!(doc["elderStory"]["audioFiles"][0], "file:///a.mp3");
        assert!(doc["lastUpdated"].is_string());
        let back: StudentRecord = serde_json::from_value(doc).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn refresh_derived_recounts_words() {
        let mut record = StudentRecord::new("Ava", "X1");
        record.introduction.content = "<p>one two three</p>".into();
        record.introduction.word_count = 999;
        record.refresh_derived();
        assert_eq!(record.introduction.word_count, 3);
        assert_eq!(record.completion_percentage, 0);
    }
}
