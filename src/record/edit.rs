use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{StudentRecord, section::limits};
use crate::{error::ValidationError, word_count::word_count};

/// A partial update to exactly one section. Only `Some` fields are written;
/// sibling sections are never touched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "section", content = "patch", rename_all = "camelCase")]
pub enum SectionEdit {
    Cover(CoverPatch),
    Introduction(IntroductionPatch),
    ElderStory(ElderStoryPatch),
    LessonsLearned(LessonsPatch),
    CulturalContext(CulturalPatch),
    /// Book-level settings shown on the cover tab.
    Book(BookPatch),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CoverPatch {
    pub image_url: Option<String>,
    pub title: Option<String>,
    pub subtitle: Option<String>,
    pub author_name: Option<String>,
    pub font_style: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct IntroductionPatch {
    pub content: Option<String>,
    pub images: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ElderStoryPatch {
    pub content: Option<String>,
    pub images: Option<Vec<String>>,
    pub audio_files: Option<Vec<String>>,
    pub video_file: Option<String>,
    pub media_captions: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct LessonsPatch {
    pub content: Option<String>,
    pub images: Option<Vec<String>>,
    pub quotes: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CulturalPatch {
    pub content: Option<String>,
    pub cultural_images: Option<Vec<String>>,
    pub audio_pronunciation: Option<String>,
    pub reference_links: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct BookPatch {
    pub ebook_title: Option<String>,
    pub selected_font: Option<String>,
}

fn check_len(
    list: &Option<Vec<String>>,
    max: usize,
    section: &'static str,
    kind: &'static str,
) -> Result<(), ValidationError> {
    match list {
        Some(list) if list.len() > max => Err(ValidationError::MediaLimit { section, kind, max }),
        _ => Ok(()),
    }
}

fn set<T>(slot: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *slot = value;
    }
}

impl SectionEdit {
    /// Parse an edit from its JSON form, rejecting fields outside the schema.
    pub fn from_json(value: serde_json::Value) -> Result<Self, ValidationError> {
        serde_json::from_value(value).map_err(|e| ValidationError::UnknownField(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        match self {
            SectionEdit::Cover(_) | SectionEdit::Book(_) => Ok(()),
            SectionEdit::Introduction(p) => {
                check_len(&p.images, limits::INTRODUCTION_IMAGES, "introduction", "images")
            }
            SectionEdit::ElderStory(p) => {
                check_len(&p.images, limits::ELDER_STORY_IMAGES, "elderStory", "images")?;
                check_len(&p.audio_files, limits::ELDER_STORY_AUDIO, "elderStory", "audio files")
            }
            SectionEdit::LessonsLearned(p) => {
                check_len(&p.images, limits::LESSONS_IMAGES, "lessonsLearned", "images")
            }
            SectionEdit::CulturalContext(p) => {
                check_len(&p.cultural_images, limits::CULTURAL_IMAGES, "culturalContext", "images")
            }
        }
    }

    /// Shallow merge. Content changes re-derive the section's word count.
    pub(super) fn merge_into(self, record: &mut StudentRecord) {
        match self {
            SectionEdit::Cover(p) => {
                let cover = &mut record.cover_page;
                set(&mut cover.image_url, p.image_url);
                set(&mut cover.title, p.title);
                set(&mut cover.subtitle, p.subtitle);
                set(&mut cover.author_name, p.author_name);
                set(&mut cover.font_style, p.font_style);
            }
            SectionEdit::Introduction(p) => {
                let s = &mut record.introduction;
                if let Some(content) = p.content {
                    s.word_count = word_count(&content);
                    s.content = content;
                }
                set(&mut s.images, p.images);
            }
            SectionEdit::ElderStory(p) => {
                let s = &mut record.elder_story;
                if let Some(content) = p.content {
                    s.word_count = word_count(&content);
                    s.content = content;
                }
                set(&mut s.images, p.images);
                set(&mut s.audio_files, p.audio_files);
                set(&mut s.video_file, p.video_file);
                set(&mut s.media_captions, p.media_captions);
            }
            SectionEdit::LessonsLearned(p) => {
                let s = &mut record.lessons_learned;
                if let Some(content) = p.content {
                    s.word_count = word_count(&content);
                    s.content = content;
                }
                set(&mut s.images, p.images);
                set(&mut s.quotes, p.quotes);
            }
            SectionEdit::CulturalContext(p) => {
                let s = &mut record.cultural_context;
                if let Some(content) = p.content {
                    s.word_count = word_count(&content);
                    s.content = content;
                }
                set(&mut s.cultural_images, p.cultural_images);
                set(&mut s.audio_pronunciation, p.audio_pronunciation);
                set(&mut s.reference_links, p.reference_links);
            }
            SectionEdit::Book(p) => {
                set(&mut record.ebook_title, p.ebook_title);
                set(&mut record.selected_font, p.selected_font);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn content_edit_rederives_word_count_only_in_its_section() {
        let mut record = StudentRecord::new("Ava", "X1");
        record.lessons_learned.content = "<p>keep me</p>".into();
        record.lessons_learned.word_count = 2;
        let before = record.clone();

        record
            .apply(SectionEdit::Introduction(IntroductionPatch {
                content: Some("<p>my grandfather was a fisherman</p>".into()),
                ..Default::default()
            }))
            .unwrap();

        assert_eq!(record.introduction.word_count, 5);
        assert_eq!(record.lessons_learned, before.lessons_learned);
        assert_eq!(record.cover_page, before.cover_page);
        assert_eq!(record.elder_story, before.elder_story);
    }

    #[test]
    fn over_limit_media_is_rejected_without_mutation() {
        let mut record = StudentRecord::new("Ava", "X1");
        let before = record.clone();
        let images = (0..3).map(|i| format!("file:///img{i}.png")).collect();
        let err = record
            .apply(SectionEdit::Introduction(IntroductionPatch {
                content: Some("changed".into()),
                images: Some(images),
            }))
            .unwrap_err();
        assert_eq!(
            err,
            ValidationError::MediaLimit {
                section: "introduction",
                kind: "images",
                max: 2
            }
        );
        assert_eq!(record, before);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let ok = SectionEdit::from_json(json!({
            "section": "cover",
            "patch": { "title": "River Songs" }
        }))
        .unwrap();
        assert_eq!(
            ok,
            SectionEdit::Cover(CoverPatch {
                title: Some("River Songs".into()),
                ..Default::default()
            })
        );

        let err = SectionEdit::from_json(json!({
            "section": "cover",
            "patch": { "title": "x", "completionPercentage": 100 }
        }))
        .unwrap_err();
        assert!(matches!(err, ValidationError::UnknownField(_)));
    }

    #[test]
    fn book_edit_touches_only_book_settings() {
        let mut record = StudentRecord::new("Ava", "X1");
        record
            .apply(SectionEdit::Book(BookPatch {
                ebook_title: Some("Voices of the Valley".into()),
                selected_font: None,
            }))
            .unwrap();
        assert_eq!(record.ebook_title, "Voices of the Valley");
        assert_eq!(record.selected_font, crate::record::DEFAULT_FONT);
    }
}
