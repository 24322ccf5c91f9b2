pub mod pdf;

use serde::Serialize;

use crate::{
    fonts::font_family,
    record::{SectionKey, StudentRecord},
    utils::{now_utc, slug},
};

pub use pdf::{DirectorySink, JsonRasterizer, PageImage, PageRasterizer, PdfSink, export_pdf};

pub const ANTHOLOGY_TITLE: &str = "The Elders' Wisdom";
pub const ANTHOLOGY_FILENAME: &str = "elders-wisdom-anthology.pdf";
/// Images shown on the elder-story media page of a preview.
pub const PREVIEW_STORY_IMAGES: usize = 4;

const CREDITS: &str = "This anthology represents the collective wisdom and dedication of our \
                       students in preserving and sharing the knowledge of elders.";

/// Filename for a single-book preview export.
pub fn preview_filename(record: &StudentRecord) -> String {
    let title = record.ebook_title.trim();
    if title.is_empty() {
        "ebook.pdf".to_string()
    } else {
        format!("{title}.pdf")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentsEntry {
    pub chapter: usize,
    pub title: String,
    /// The student's name; the cover's author line may differ.
    pub student: String,
    pub anchor: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CoverView {
    pub title: String,
    pub subtitle: Option<String>,
    pub author: String,
    pub image_url: Option<String>,
    pub font_family: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionView {
    pub section: SectionKey,
    pub heading: &'static str,
    /// Rich text, passed through as written.
    pub content: String,
    pub images: Vec<String>,
    pub quotes: Vec<String>,
    pub links: Vec<String>,
    pub font_family: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Figure {
    pub url: String,
    pub caption: Option<String>,
}

/// One printable page. Rendering is left to a [`PageRasterizer`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Page {
    #[serde(rename_all = "camelCase")]
    AnthologyCover { title: String, story_count: usize },
    Contents { entries: Vec<ContentsEntry> },
    Divider {
        chapter: usize,
        title: String,
        student: String,
    },
    Cover(CoverView),
    Section(SectionView),
    StoryMedia {
        images: Vec<Figure>,
        audio: Vec<Figure>,
        video: Option<Figure>,
    },
    Credits { message: String, year: i32 },
}

fn non_empty(s: &str) -> Option<String> {
    Some(s.trim()).filter(|s| !s.is_empty()).map(str::to_string)
}

fn cover_view(record: &StudentRecord) -> CoverView {
    let cover = &record.cover_page;
    CoverView {
        title: record.display_title().to_string(),
        subtitle: non_empty(&cover.subtitle),
        author: record.display_author().to_string(),
        image_url: non_empty(&cover.image_url),
        font_family: font_family(&cover.font_style),
    }
}

fn section_view(record: &StudentRecord, key: SectionKey) -> SectionView {
    let mut view = SectionView {
        section: key,
        heading: key.label(),
        content: record.content(key).to_string(),
        images: Vec::new(),
        quotes: Vec::new(),
        links: Vec::new(),
        font_family: font_family(&record.selected_font),
    };
    match key {
        SectionKey::Cover => {}
        SectionKey::Introduction => view.images = record.introduction.images.clone(),
        SectionKey::ElderStory => {}
        SectionKey::LessonsLearned => view.quotes = record.lessons_learned.quotes.clone(),
        SectionKey::CulturalContext => {
            view.images = record.cultural_context.cultural_images.clone();
            view.links = record.cultural_context.reference_links.clone();
        }
    }
    view
}

fn story_media(record: &StudentRecord) -> Option<Page> {
    let story = &record.elder_story;
    if story.images.is_empty() && story.audio_files.is_empty() && story.video_file.is_empty() {
        return None;
    }
    let images = story
        .images
        .iter()
        .take(PREVIEW_STORY_IMAGES)
        .enumerate()
        .map(|(i, url)| Figure {
            url: url.clone(),
            caption: story.image_caption(i).map(str::to_string),
        })
        .collect();
    let audio = story
        .audio_files
        .iter()
        .enumerate()
        .map(|(i, url)| Figure {
            url: url.clone(),
            caption: story.audio_caption(i).map(str::to_string),
        })
        .collect();
    let video = non_empty(&story.video_file).map(|url| Figure {
        url,
        caption: story.video_caption().map(str::to_string),
    });
    Some(Page::StoryMedia { images, audio, video })
}

const BODY_SECTIONS: [SectionKey; 4] = [
    SectionKey::Introduction,
    SectionKey::ElderStory,
    SectionKey::LessonsLearned,
    SectionKey::CulturalContext,
];

/// Pages of one student's book as the student sees it, empty sections included.
pub fn compile_preview(record: &StudentRecord) -> Vec<Page> {
    let mut pages = vec![Page::Cover(cover_view(record))];
    for key in BODY_SECTIONS {
        pages.push(Page::Section(section_view(record, key)));
        if key == SectionKey::ElderStory {
            pages.extend(story_media(record));
        }
    }
    pages
}

/// The class anthology: every record at or above `threshold` percent, in the
/// order given. Empty when no record qualifies.
pub fn compile_anthology(records: &[StudentRecord], threshold: u8) -> Vec<Page> {
    compile_anthology_for_year(records, threshold, now_utc().year())
}

fn compile_anthology_for_year(records: &[StudentRecord], threshold: u8, year: i32) -> Vec<Page> {
    let included: Vec<&StudentRecord> = records
        .iter()
        .filter(|r| r.completion_percentage >= threshold)
        .collect();
    if included.is_empty() {
        return Vec::new();
    }

    let entries = included
        .iter()
        .enumerate()
        .map(|(i, record)| ContentsEntry {
            chapter: i + 1,
            title: record.display_title().to_string(),
            student: record.name.clone(),
            anchor: format!("chapter-{}-{}", i + 1, slug(record.display_title())),
        })
        .collect();
    let mut pages = vec![
        Page::AnthologyCover {
            title: ANTHOLOGY_TITLE.to_string(),
            story_count: included.len(),
        },
        Page::Contents { entries },
    ];

    for (i, record) in included.iter().enumerate() {
        pages.push(Page::Divider {
            chapter: i + 1,
            title: record.display_title().to_string(),
            student: record.name.clone(),
        });
        pages.push(Page::Cover(cover_view(record)));
        for key in BODY_SECTIONS {
            if !record.content(key).trim().is_empty() {
                pages.push(Page::Section(section_view(record, key)));
            }
        }
    }

    pages.push(Page::Credits {
        message: CREDITS.to_string(),
        year,
    });
    pages
}
