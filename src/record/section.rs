use std::{collections::BTreeMap, fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// The five editable areas of a record, in book order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SectionKey {
    Cover,
    Introduction,
    ElderStory,
    LessonsLearned,
    CulturalContext,
}

impl SectionKey {
    pub const ALL: [SectionKey; 5] = [
        SectionKey::Cover,
        SectionKey::Introduction,
        SectionKey::ElderStory,
        SectionKey::LessonsLearned,
        SectionKey::CulturalContext,
    ];

    /// Field name of the sub-document in a stored record.
    pub fn field(&self) -> &'static str {
        match self {
            SectionKey::Cover => "coverPage",
            SectionKey::Introduction => "introduction",
            SectionKey::ElderStory => "elderStory",
            SectionKey::LessonsLearned => "lessonsLearned",
            SectionKey::CulturalContext => "culturalContext",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SectionKey::Cover => "Cover Page",
            SectionKey::Introduction => "Introduction",
            SectionKey::ElderStory => "The Elder's Story",
            SectionKey::LessonsLearned => "Lessons Learned",
            SectionKey::CulturalContext => "Cultural Context",
        }
    }

    /// Folder name for uploads belonging to this section.
    pub fn storage_dir(&self) -> &'static str {
        match self {
            SectionKey::Cover => "cover",
            SectionKey::Introduction => "introduction",
            SectionKey::ElderStory => "elder-story",
            SectionKey::LessonsLearned => "lessons",
            SectionKey::CulturalContext => "cultural",
        }
    }
}

impl fmt::Display for SectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.field())
    }
}

impl FromStr for SectionKey {
    type Err = crate::error::ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cover" | "coverPage" => Ok(SectionKey::Cover),
            "introduction" => Ok(SectionKey::Introduction),
            "story" | "elderStory" => Ok(SectionKey::ElderStory),
            "lessons" | "lessonsLearned" => Ok(SectionKey::LessonsLearned),
            "cultural" | "culturalContext" => Ok(SectionKey::CulturalContext),
            other => Err(crate::error::ValidationError::UnknownField(other.to_string())),
        }
    }
}

/// Upper bounds on media references per section.
pub mod limits {
    pub const INTRODUCTION_IMAGES: usize = 2;
    pub const ELDER_STORY_IMAGES: usize = 5;
    pub const ELDER_STORY_AUDIO: usize = 2;
    pub const LESSONS_IMAGES: usize = 3;
    pub const CULTURAL_IMAGES: usize = 3;
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CoverPage {
    pub image_url: String,
    pub title: String,
    pub subtitle: String,
    pub author_name: String,
    pub font_style: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Introduction {
    pub content: String,
    pub images: Vec<String>,
    pub word_count: usize,
}

pub const VIDEO_CAPTION: &str = "video";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ElderStory {
    pub content: String,
    pub images: Vec<String>,
    pub audio_files: Vec<String>,
    /// Empty when no video is attached.
    pub video_file: String,
    /// Keyed `image{i}` / `audio{i}` by position in the media lists, and
    /// `video` for the single video.
    pub media_captions: BTreeMap<String, String>,
    pub word_count: usize,
}

impl ElderStory {
    pub fn image_caption(&self, index: usize) -> Option<&str> {
        self.media_captions
            .get(&format!("image{index}"))
            .map(String::as_str)
            .filter(|c| !c.is_empty())
    }

    pub fn audio_caption(&self, index: usize) -> Option<&str> {
        self.media_captions
            .get(&format!("audio{index}"))
            .map(String::as_str)
            .filter(|c| !c.is_empty())
    }

    /// None when there is no video, even if a stale caption is stored.
    pub fn video_caption(&self) -> Option<&str> {
        if self.video_file.is_empty() {
            return None;
        }
        self.media_captions
            .get(VIDEO_CAPTION)
            .map(String::as_str)
            .filter(|c| !c.is_empty())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LessonsLearned {
    pub content: String,
    pub images: Vec<String>,
    pub quotes: Vec<String>,
    pub word_count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CulturalContext {
    pub content: String,
    pub cultural_images: Vec<String>,
    /// Empty when no pronunciation recording is attached.
    pub audio_pronunciation: String,
    pub reference_links: Vec<String>,
    pub word_count: usize,
}
