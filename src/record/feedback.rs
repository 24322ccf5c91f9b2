use std::{collections::BTreeMap, fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::SectionKey;
use crate::error::ValidationError;

/// Sections a reviewer can comment on. The cover is not reviewed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ReviewSection {
    Introduction,
    ElderStory,
    LessonsLearned,
    CulturalContext,
}

impl ReviewSection {
    pub const ALL: [ReviewSection; 4] = [
        ReviewSection::Introduction,
        ReviewSection::ElderStory,
        ReviewSection::LessonsLearned,
        ReviewSection::CulturalContext,
    ];

    pub fn section(&self) -> SectionKey {
        match self {
            ReviewSection::Introduction => SectionKey::Introduction,
            ReviewSection::ElderStory => SectionKey::ElderStory,
            ReviewSection::LessonsLearned => SectionKey::LessonsLearned,
            ReviewSection::CulturalContext => SectionKey::CulturalContext,
        }
    }

    /// Short label used on overview badges.
    pub fn badge(&self) -> &'static str {
        match self {
            ReviewSection::Introduction => "Intro",
            ReviewSection::ElderStory => "Story",
            ReviewSection::LessonsLearned => "Lessons",
            ReviewSection::CulturalContext => "Cultural",
        }
    }
}

impl TryFrom<SectionKey> for ReviewSection {
    type Error = ValidationError;

    fn try_from(key: SectionKey) -> Result<Self, Self::Error> {
        match key {
            SectionKey::Cover => Err(ValidationError::UnknownField("teacherFeedback.coverPage".into())),
            SectionKey::Introduction => Ok(ReviewSection::Introduction),
            SectionKey::ElderStory => Ok(ReviewSection::ElderStory),
            SectionKey::LessonsLearned => Ok(ReviewSection::LessonsLearned),
            SectionKey::CulturalContext => Ok(ReviewSection::CulturalContext),
        }
    }
}

impl FromStr for ReviewSection {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<SectionKey>()?.try_into()
    }
}

impl fmt::Display for ReviewSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.section().field())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackStatus {
    Approved,
    NeedsRevision,
}

impl FromStr for FeedbackStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "approved" => Ok(FeedbackStatus::Approved),
            "needs_revision" | "needs-revision" => Ok(FeedbackStatus::NeedsRevision),
            other => Err(ValidationError::UnknownField(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackItem {
    pub comment: String,
    pub status: FeedbackStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub date: OffsetDateTime,
}

/// Absence of an entry means the section has not been reviewed.
pub type TeacherFeedback = BTreeMap<ReviewSection, FeedbackItem>;
