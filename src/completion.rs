use crate::record::{SectionKey, StudentRecord};

pub const INTRODUCTION_MIN_WORDS: usize = 150;
pub const ELDER_STORY_MIN_WORDS: usize = 500;
pub const LESSONS_MIN_WORDS: usize = 100;

/// Minimum completion for a record to appear in the class anthology.
pub const ANTHOLOGY_THRESHOLD: u8 = 50;

/// Word range suggested to students while writing a section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WordTarget {
    pub min: usize,
    pub max: Option<usize>,
}

impl WordTarget {
    pub fn for_section(key: SectionKey) -> Option<Self> {
        match key {
            SectionKey::Introduction => Some(Self {
                min: INTRODUCTION_MIN_WORDS,
                max: Some(200),
            }),
            SectionKey::ElderStory => Some(Self {
                min: ELDER_STORY_MIN_WORDS,
                max: Some(800),
            }),
            SectionKey::LessonsLearned => Some(Self {
                min: LESSONS_MIN_WORDS,
                max: None,
            }),
            SectionKey::Cover | SectionKey::CulturalContext => None,
        }
    }

    pub fn within(&self, words: usize) -> bool {
        words >= self.min && self.max.is_none_or(|max| words <= max)
    }
}

/// Whether `key` counts towards completion. Each predicate is independent.
pub fn section_satisfied(record: &StudentRecord, key: SectionKey) -> bool {
    match key {
        SectionKey::Cover => {
            !record.cover_page.image_url.is_empty() && !record.cover_page.title.is_empty()
        }
        SectionKey::Introduction => {
            !record.introduction.content.is_empty()
                && record.introduction.word_count >= INTRODUCTION_MIN_WORDS
        }
        SectionKey::ElderStory => {
            !record.elder_story.content.is_empty()
                && record.elder_story.word_count >= ELDER_STORY_MIN_WORDS
        }
        SectionKey::LessonsLearned => {
            !record.lessons_learned.content.is_empty()
                && record.lessons_learned.word_count >= LESSONS_MIN_WORDS
        }
        SectionKey::CulturalContext => !record.cultural_context.content.is_empty(),
    }
}

/// `round(100 * satisfied / 5)`, no partial credit within a section.
pub fn completion_percentage(record: &StudentRecord) -> u8 {
    let total = SectionKey::ALL.len();
    let satisfied = SectionKey::ALL
        .iter()
        .filter(|key| section_satisfied(record, **key))
        .count();
    ((200 * satisfied + total) / (2 * total)) as u8
}
