//! Per-section editors. Each reads the current sub-document of a record and
//! builds a [`SectionEdit`] scoped to that section, for
//! [`crate::autosave::AutosaveCoordinator::edit_with`].

use std::collections::BTreeMap;

use crate::{
    completion::WordTarget,
    error::ValidationError,
    record::{
        CoverPage, CulturalContext, ElderStory, Introduction, LessonsLearned, SectionEdit,
        SectionKey, StudentRecord,
        edit::{BookPatch, CoverPatch, CulturalPatch, ElderStoryPatch, IntroductionPatch, LessonsPatch},
        section::{VIDEO_CAPTION, limits},
    },
    word_count::word_count,
};

/// Words written so far against the section's suggested range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WordProgress {
    pub words: usize,
    pub target: Option<WordTarget>,
}

impl WordProgress {
    fn of(key: SectionKey, content: &str) -> Self {
        Self {
            words: word_count(content),
            target: WordTarget::for_section(key),
        }
    }

    pub fn on_target(&self) -> bool {
        self.target.is_none_or(|t| t.within(self.words))
    }
}

fn pushed(
    list: &[String],
    item: String,
    max: usize,
    section: &'static str,
    kind: &'static str,
) -> Result<Vec<String>, ValidationError> {
    if item.trim().is_empty() {
        return Err(ValidationError::EmptyField(kind));
    }
    if list.len() >= max {
        return Err(ValidationError::MediaLimit { section, kind, max });
    }
    let mut list = list.to_vec();
    list.push(item);
    Ok(list)
}

fn replaced(list: &[String], index: usize, item: String) -> Result<Vec<String>, ValidationError> {
    if index >= list.len() {
        return Err(ValidationError::IndexOutOfRange {
            index,
            len: list.len(),
        });
    }
    let mut list = list.to_vec();
    list[index] = item;
    Ok(list)
}

/// Drops the reference only; the stored blob is left alone.
fn removed(list: &[String], index: usize) -> Result<Vec<String>, ValidationError> {
    if index >= list.len() {
        return Err(ValidationError::IndexOutOfRange {
            index,
            len: list.len(),
        });
    }
    let mut list = list.to_vec();
    list.remove(index);
    Ok(list)
}

fn trimmed_non_empty(value: &str, field: &'static str) -> Result<String, ValidationError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ValidationError::EmptyField(field));
    }
    Ok(value.to_string())
}

pub struct CoverEditor<'a> {
    record: &'a StudentRecord,
}

impl<'a> CoverEditor<'a> {
    pub fn new(record: &'a StudentRecord) -> Self {
        Self { record }
    }

    pub fn section(&self) -> &CoverPage {
        &self.record.cover_page
    }

    fn patch(patch: CoverPatch) -> SectionEdit {
        SectionEdit::Cover(patch)
    }

    pub fn set_title(&self, title: impl Into<String>) -> SectionEdit {
        Self::patch(CoverPatch {
            title: Some(title.into()),
            ..Default::default()
        })
    }

    pub fn set_subtitle(&self, subtitle: impl Into<String>) -> SectionEdit {
        Self::patch(CoverPatch {
            subtitle: Some(subtitle.into()),
            ..Default::default()
        })
    }

    pub fn set_author(&self, author: impl Into<String>) -> SectionEdit {
        Self::patch(CoverPatch {
            author_name: Some(author.into()),
            ..Default::default()
        })
    }

    pub fn set_font(&self, font_id: impl Into<String>) -> SectionEdit {
        Self::patch(CoverPatch {
            font_style: Some(font_id.into()),
            ..Default::default()
        })
    }

    /// An empty url clears the cover image.
    pub fn set_image(&self, url: impl Into<String>) -> SectionEdit {
        Self::patch(CoverPatch {
            image_url: Some(url.into()),
            ..Default::default()
        })
    }

    pub fn set_ebook_title(&self, title: impl Into<String>) -> SectionEdit {
        SectionEdit::Book(BookPatch {
            ebook_title: Some(title.into()),
            selected_font: None,
        })
    }

    pub fn select_book_font(&self, font_id: impl Into<String>) -> SectionEdit {
        SectionEdit::Book(BookPatch {
            ebook_title: None,
            selected_font: Some(font_id.into()),
        })
    }
}

pub struct IntroductionEditor<'a> {
    section: &'a Introduction,
}

impl<'a> IntroductionEditor<'a> {
    pub fn new(record: &'a StudentRecord) -> Self {
        Self {
            section: &record.introduction,
        }
    }

    pub fn section(&self) -> &Introduction {
        self.section
    }

    pub fn word_progress(&self) -> WordProgress {
        WordProgress::of(SectionKey::Introduction, &self.section.content)
    }

    pub fn set_content(&self, html: impl Into<String>) -> SectionEdit {
        SectionEdit::Introduction(IntroductionPatch {
            content: Some(html.into()),
            images: None,
        })
    }

    fn images(images: Vec<String>) -> SectionEdit {
        SectionEdit::Introduction(IntroductionPatch {
            content: None,
            images: Some(images),
        })
    }

    pub fn add_image(&self, url: impl Into<String>) -> Result<SectionEdit, ValidationError> {
        pushed(
            &self.section.images,
            url.into(),
            limits::INTRODUCTION_IMAGES,
            "introduction",
            "images",
        )
        .map(Self::images)
    }

    pub fn replace_image(&self, index: usize, url: impl Into<String>) -> Result<SectionEdit, ValidationError> {
        replaced(&self.section.images, index, url.into()).map(Self::images)
    }

    pub fn remove_image(&self, index: usize) -> Result<SectionEdit, ValidationError> {
        removed(&self.section.images, index).map(Self::images)
    }
}

/// Which elder-story media a caption belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptionTarget {
    Image,
    Audio,
    /// The single video; the index must be 0.
    Video,
}

/// Captions after removing `{prefix}{index}`: later positions move down by one.
fn shifted_captions(
    captions: &BTreeMap<String, String>,
    prefix: &str,
    index: usize,
) -> BTreeMap<String, String> {
    captions
        .iter()
        .filter_map(|(key, caption)| {
            let position = key.strip_prefix(prefix).and_then(|i| i.parse::<usize>().ok());
            match position {
                Some(i) if i == index => None,
                Some(i) if i > index => Some((format!("{prefix}{}", i - 1), caption.clone())),
                _ => Some((key.clone(), caption.clone())),
            }
        })
        .collect()
}

pub struct ElderStoryEditor<'a> {
    section: &'a ElderStory,
}

impl<'a> ElderStoryEditor<'a> {
    pub fn new(record: &'a StudentRecord) -> Self {
        Self {
            section: &record.elder_story,
        }
    }

    pub fn section(&self) -> &ElderStory {
        self.section
    }

    pub fn word_progress(&self) -> WordProgress {
        WordProgress::of(SectionKey::ElderStory, &self.section.content)
    }

    pub fn set_content(&self, html: impl Into<String>) -> SectionEdit {
        SectionEdit::ElderStory(ElderStoryPatch {
            content: Some(html.into()),
            ..Default::default()
        })
    }

    fn images(images: Vec<String>) -> SectionEdit {
        SectionEdit::ElderStory(ElderStoryPatch {
            images: Some(images),
            ..Default::default()
        })
    }

    fn audio(audio_files: Vec<String>) -> SectionEdit {
        SectionEdit::ElderStory(ElderStoryPatch {
            audio_files: Some(audio_files),
            ..Default::default()
        })
    }

    pub fn add_image(&self, url: impl Into<String>) -> Result<SectionEdit, ValidationError> {
        pushed(
            &self.section.images,
            url.into(),
            limits::ELDER_STORY_IMAGES,
            "elderStory",
            "images",
        )
        .map(Self::images)
    }

    pub fn replace_image(&self, index: usize, url: impl Into<String>) -> Result<SectionEdit, ValidationError> {
        replaced(&self.section.images, index, url.into()).map(Self::images)
    }

    /// Removes the image and moves later image captions down with it.
    pub fn remove_image(&self, index: usize) -> Result<SectionEdit, ValidationError> {
        let images = removed(&self.section.images, index)?;
        Ok(SectionEdit::ElderStory(ElderStoryPatch {
            images: Some(images),
            media_captions: Some(shifted_captions(&self.section.media_captions, "image", index)),
            ..Default::default()
        }))
    }

    pub fn add_audio(&self, url: impl Into<String>) -> Result<SectionEdit, ValidationError> {
        pushed(
            &self.section.audio_files,
            url.into(),
            limits::ELDER_STORY_AUDIO,
            "elderStory",
            "audio files",
        )
        .map(Self::audio)
    }

    pub fn remove_audio(&self, index: usize) -> Result<SectionEdit, ValidationError> {
        let audio_files = removed(&self.section.audio_files, index)?;
        Ok(SectionEdit::ElderStory(ElderStoryPatch {
            audio_files: Some(audio_files),
            media_captions: Some(shifted_captions(&self.section.media_captions, "audio", index)),
            ..Default::default()
        }))
    }

    /// One video at most; setting replaces it and an empty url removes it
    /// along with its caption.
    pub fn set_video(&self, url: impl Into<String>) -> SectionEdit {
        let url = url.into();
        let media_captions = (url.is_empty() && self.section.media_captions.contains_key(VIDEO_CAPTION))
            .then(|| {
                let mut captions = self.section.media_captions.clone();
                captions.remove(VIDEO_CAPTION);
                captions
            });
        SectionEdit::ElderStory(ElderStoryPatch {
            video_file: Some(url),
            media_captions,
            ..Default::default()
        })
    }

    pub fn set_caption(
        &self,
        target: CaptionTarget,
        index: usize,
        caption: impl Into<String>,
    ) -> Result<SectionEdit, ValidationError> {
        let len = match target {
            CaptionTarget::Image => self.section.images.len(),
            CaptionTarget::Audio => self.section.audio_files.len(),
            CaptionTarget::Video => usize::from(!self.section.video_file.is_empty()),
        };
        if index >= len {
            return Err(ValidationError::IndexOutOfRange { index, len });
        }
        let key = match target {
            CaptionTarget::Image => format!("image{index}"),
            CaptionTarget::Audio => format!("audio{index}"),
            CaptionTarget::Video => VIDEO_CAPTION.to_string(),
        };
        let mut captions: BTreeMap<String, String> = self.section.media_captions.clone();
        captions.insert(key, caption.into());
        Ok(SectionEdit::ElderStory(ElderStoryPatch {
            media_captions: Some(captions),
            ..Default::default()
        }))
    }
}

pub struct LessonsEditor<'a> {
    section: &'a LessonsLearned,
}

impl<'a> LessonsEditor<'a> {
    pub fn new(record: &'a StudentRecord) -> Self {
        Self {
            section: &record.lessons_learned,
        }
    }

    pub fn section(&self) -> &LessonsLearned {
        self.section
    }

    pub fn word_progress(&self) -> WordProgress {
        WordProgress::of(SectionKey::LessonsLearned, &self.section.content)
    }

    pub fn set_content(&self, html: impl Into<String>) -> SectionEdit {
        SectionEdit::LessonsLearned(LessonsPatch {
            content: Some(html.into()),
            ..Default::default()
        })
    }

    fn images(images: Vec<String>) -> SectionEdit {
        SectionEdit::LessonsLearned(LessonsPatch {
            images: Some(images),
            ..Default::default()
        })
    }

    fn quotes(quotes: Vec<String>) -> SectionEdit {
        SectionEdit::LessonsLearned(LessonsPatch {
            quotes: Some(quotes),
            ..Default::default()
        })
    }

    pub fn add_image(&self, url: impl Into<String>) -> Result<SectionEdit, ValidationError> {
        pushed(
            &self.section.images,
            url.into(),
            limits::LESSONS_IMAGES,
            "lessonsLearned",
            "images",
        )
        .map(Self::images)
    }

    pub fn remove_image(&self, index: usize) -> Result<SectionEdit, ValidationError> {
        removed(&self.section.images, index).map(Self::images)
    }

    pub fn add_quote(&self, quote: &str) -> Result<SectionEdit, ValidationError> {
        let quote = trimmed_non_empty(quote, "quote")?;
        let mut quotes = self.section.quotes.clone();
        quotes.push(quote);
        Ok(Self::quotes(quotes))
    }

    pub fn remove_quote(&self, index: usize) -> Result<SectionEdit, ValidationError> {
        removed(&self.section.quotes, index).map(Self::quotes)
    }
}

pub struct CulturalEditor<'a> {
    section: &'a CulturalContext,
}

impl<'a> CulturalEditor<'a> {
    pub fn new(record: &'a StudentRecord) -> Self {
        Self {
            section: &record.cultural_context,
        }
    }

    pub fn section(&self) -> &CulturalContext {
        self.section
    }

    pub fn word_progress(&self) -> WordProgress {
        WordProgress::of(SectionKey::CulturalContext, &self.section.content)
    }

    pub fn set_content(&self, html: impl Into<String>) -> SectionEdit {
        SectionEdit::CulturalContext(CulturalPatch {
            content: Some(html.into()),
            ..Default::default()
        })
    }

    fn images(images: Vec<String>) -> SectionEdit {
        SectionEdit::CulturalContext(CulturalPatch {
            cultural_images: Some(images),
            ..Default::default()
        })
    }

    fn links(links: Vec<String>) -> SectionEdit {
        SectionEdit::CulturalContext(CulturalPatch {
            reference_links: Some(links),
            ..Default::default()
        })
    }

    pub fn add_image(&self, url: impl Into<String>) -> Result<SectionEdit, ValidationError> {
        pushed(
            &self.section.cultural_images,
            url.into(),
            limits::CULTURAL_IMAGES,
            "culturalContext",
            "images",
        )
        .map(Self::images)
    }

    pub fn remove_image(&self, index: usize) -> Result<SectionEdit, ValidationError> {
        removed(&self.section.cultural_images, index).map(Self::images)
    }

    /// Empty url removes the pronunciation recording.
    pub fn set_pronunciation(&self, url: impl Into<String>) -> SectionEdit {
        SectionEdit::CulturalContext(CulturalPatch {
            audio_pronunciation: Some(url.into()),
            ..Default::default()
        })
    }

    pub fn add_link(&self, link: &str) -> Result<SectionEdit, ValidationError> {
        let link = trimmed_non_empty(link, "reference link")?;
        let mut links = self.section.reference_links.clone();
        links.push(link);
        Ok(Self::links(links))
    }

    pub fn remove_link(&self, index: usize) -> Result<SectionEdit, ValidationError> {
        removed(&self.section.reference_links, index).map(Self::links)
    }
}

/// Content edit for any section with a text body, used by bulk imports. The
/// cover has none: its title is plain text set through [`CoverEditor`].
pub fn set_section_content(
    record: &StudentRecord,
    key: SectionKey,
    html: String,
) -> Result<SectionEdit, ValidationError> {
    Ok(match key {
        SectionKey::Cover => {
            return Err(ValidationError::UnknownField("coverPage.content".to_string()));
        }
        SectionKey::Introduction => IntroductionEditor::new(record).set_content(html),
        SectionKey::ElderStory => ElderStoryEditor::new(record).set_content(html),
        SectionKey::LessonsLearned => LessonsEditor::new(record).set_content(html),
        SectionKey::CulturalContext => CulturalEditor::new(record).set_content(html),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> StudentRecord {
        StudentRecord::new("Ava", "X1")
    }

    #[test]
    fn image_slots_are_bounded() {
        let mut record = record();
        for i in 0..5 {
            let edit = ElderStoryEditor::new(&record)
                .add_image(format!("file:///{i}.png"))
                .unwrap();
            record.apply(edit).unwrap();
        }
        let err = ElderStoryEditor::new(&record)
            .add_image("file:///6.png")
            .unwrap_err();
        assert_eq!(
            err,
            ValidationError::MediaLimit {
                section: "elderStory",
                kind: "images",
                max: 5
            }
        );

        for i in 0..2 {
            let edit = ElderStoryEditor::new(&record)
                .add_audio(format!("file:///{i}.mp3"))
                .unwrap();
            record.apply(edit).unwrap();
        }
        assert!(ElderStoryEditor::new(&record).add_audio("file:///x.mp3").is_err());
    }

    #[test]
    fn removing_media_keeps_order() {
        let mut record = record();
        for url in ["a", "b", "c"] {
            let edit = CulturalEditor::new(&record).add_image(url).unwrap();
            record.apply(edit).unwrap();
        }
        let edit = CulturalEditor::new(&record).remove_image(1).unwrap();
        record.apply(edit).unwrap();
        assert_eq!(record.cultural_context.cultural_images, vec!["a", "c"]);
        assert!(CulturalEditor::new(&record).remove_image(5).is_err());
    }

    #[test]
    fn quotes_and_links_are_trimmed() {
        let mut record = record();
        let edit = LessonsEditor::new(&record).add_quote("  Patience grows rice  ").unwrap();
        record.apply(edit).unwrap();
        assert_eq!(record.lessons_learned.quotes, vec!["Patience grows rice"]);
        assert_eq!(
            LessonsEditor::new(&record).add_quote("   ").unwrap_err(),
            ValidationError::EmptyField("quote")
        );
        assert!(CulturalEditor::new(&record).add_link("").is_err());
    }

    #[test]
    fn captions_require_existing_media() {
        let mut record = record();
        assert!(ElderStoryEditor::new(&record)
            .set_caption(CaptionTarget::Image, 0, "Grandpa")
            .is_err());
        let edit = ElderStoryEditor::new(&record).add_image("file:///g.png").unwrap();
        record.apply(edit).unwrap();
        let edit = ElderStoryEditor::new(&record)
            .set_caption(CaptionTarget::Image, 0, "Grandpa")
            .unwrap();
        record.apply(edit).unwrap();
        assert_eq!(record.elder_story.image_caption(0), Some("Grandpa"));
    }

    #[test]
    fn removing_story_media_moves_captions_down() {
        let mut record = record();
        for url in ["a.png", "b.png", "c.png"] {
            let edit = ElderStoryEditor::new(&record).add_image(url).unwrap();
            record.apply(edit).unwrap();
        }
        for (i, caption) in [(0, "caption of a"), (2, "caption of c")] {
            let edit = ElderStoryEditor::new(&record)
                .set_caption(CaptionTarget::Image, i, caption)
                .unwrap();
            record.apply(edit).unwrap();
        }
        let edit = ElderStoryEditor::new(&record).add_audio("voice.mp3").unwrap();
        record.apply(edit).unwrap();
        let edit = ElderStoryEditor::new(&record)
            .set_caption(CaptionTarget::Audio, 0, "her voice")
            .unwrap();
        record.apply(edit).unwrap();

        let edit = ElderStoryEditor::new(&record).remove_image(0).unwrap();
        record.apply(edit).unwrap();
        let story = &record.elder_story;
        assert_eq!(story.images, vec!["b.png", "c.png"]);
        assert_eq!(story.image_caption(0), None);
        assert_eq!(story.image_caption(1), Some("caption of c"));
        assert_eq!(story.image_caption(2), None);
        assert_eq!(story.audio_caption(0), Some("her voice"));

        let edit = ElderStoryEditor::new(&record).remove_audio(0).unwrap();
        record.apply(edit).unwrap();
        assert!(record.elder_story.audio_files.is_empty());
        assert_eq!(record.elder_story.audio_caption(0), None);
        assert_eq!(record.elder_story.image_caption(1), Some("caption of c"));
    }

    #[test]
    fn video_caption_follows_the_video() {
        let mut record = record();
        assert!(ElderStoryEditor::new(&record)
            .set_caption(CaptionTarget::Video, 0, "Dancing")
            .is_err());
        let edit = ElderStoryEditor::new(&record).set_video("file:///dance.mp4");
        record.apply(edit).unwrap();
        assert!(ElderStoryEditor::new(&record)
            .set_caption(CaptionTarget::Video, 1, "Dancing")
            .is_err());
        let edit = ElderStoryEditor::new(&record)
            .set_caption(CaptionTarget::Video, 0, "Dancing")
            .unwrap();
        record.apply(edit).unwrap();
        assert_eq!(record.elder_story.video_caption(), Some("Dancing"));

        let edit = ElderStoryEditor::new(&record).set_video("");
        record.apply(edit).unwrap();
        assert_eq!(record.elder_story.video_file, "");
        assert!(!record.elder_story.media_captions.contains_key("video"));
        assert_eq!(record.elder_story.video_caption(), None);
    }

    #[test]
    fn content_edit_tracks_word_progress() {
        let mut record = record();
        let edit = IntroductionEditor::new(&record).set_content("<p>a few words</p>");
        record.apply(edit).unwrap();
        let progress = IntroductionEditor::new(&record).word_progress();
        assert_eq!(progress.words, 3);
        assert!(!progress.on_target());
        assert!(CulturalEditor::new(&record).word_progress().on_target());
        assert_eq!(record.introduction.word_count, 3);
    }

    #[test]
    fn bulk_content_import_skips_the_cover() {
        let mut record = record();
        let err = set_section_content(&record, SectionKey::Cover, "<h1>Title</h1>".into()).unwrap_err();
        assert_eq!(err, ValidationError::UnknownField("coverPage.content".into()));
        let edit = set_section_content(&record, SectionKey::LessonsLearned, "<p>be kind</p>".into()).unwrap();
        record.apply(edit).unwrap();
        assert_eq!(record.lessons_learned.word_count, 2);
        assert_eq!(record.cover_page.title, "");
    }

    #[test]
    fn cover_edits_leave_other_sections() {
        let mut record = record();
        let before = record.clone();
        let edit = CoverEditor::new(&record).set_title("Songs of the Delta");
        record.apply(edit).unwrap();
        assert_eq!(record.cover_page.title, "Songs of the Delta");
        assert_eq!(record.introduction, before.introduction);
        assert_eq!(record.cover_page.author_name, "Ava");
    }
}
