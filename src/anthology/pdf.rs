use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tracing::info;

use super::Page;
use crate::error::{Error, Result};

/// One rendered page.
#[derive(Debug, Clone, PartialEq)]
pub struct PageImage {
    pub bytes: Vec<u8>,
    /// File extension for the encoded bytes, e.g. `jpeg`.
    pub format: &'static str,
}

/// Renders a single page. Called once per page, in order.
#[async_trait]
pub trait PageRasterizer: Send + Sync {
    async fn rasterize(&self, index: usize, page: &Page) -> Result<PageImage>;
}

/// Collects rendered pages into a document.
#[async_trait]
pub trait PdfSink: Send {
    async fn add_page(&mut self, image: PageImage) -> Result<()>;

    /// Write the document out under `filename`, returning where it went.
    async fn save(&mut self, filename: &str) -> Result<PathBuf>;
}

/// Rasterize `pages` one at a time into `sink` and save it as `filename`.
/// Any failing page aborts the export.
pub async fn export_pdf(
    pages: &[Page],
    rasterizer: &dyn PageRasterizer,
    sink: &mut dyn PdfSink,
    filename: &str,
) -> Result<PathBuf> {
    if pages.is_empty() {
        return Err(Error::Fatal(anyhow::anyhow!("nothing to export for {filename}")));
    }
    for (index, page) in pages.iter().enumerate() {
        let image = rasterizer.rasterize(index, page).await?;
        sink.add_page(image).await?;
    }
    let path = sink.save(filename).await?;
    info!("exported {} pages to {}", pages.len(), path.display());
    Ok(path)
}

/// Renders each page as its JSON view-model.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonRasterizer;

#[async_trait]
impl PageRasterizer for JsonRasterizer {
    async fn rasterize(&self, _index: usize, page: &Page) -> Result<PageImage> {
        Ok(PageImage {
            bytes: serde_json::to_vec_pretty(page).map_err(anyhow::Error::from)?,
            format: "json",
        })
    }
}

/// Writes pages as numbered files in a folder named after the document.
#[derive(Debug)]
pub struct DirectorySink {
    root: PathBuf,
    pages: Vec<PageImage>,
}

impl DirectorySink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            pages: Vec::new(),
        }
    }
}

#[async_trait]
impl PdfSink for DirectorySink {
    async fn add_page(&mut self, image: PageImage) -> Result<()> {
        self.pages.push(image);
        Ok(())
    }

    async fn save(&mut self, filename: &str) -> Result<PathBuf> {
        let stem = Path::new(filename)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("document");
        let dir = self.root.join(stem);
        fs::create_dir_all(&dir).await.map_err(anyhow::Error::from)?;
        for (i, page) in self.pages.drain(..).enumerate() {
            let path = dir.join(format!("page-{:03}.{}", i + 1, page.format));
            fs::write(&path, &page.bytes).await.map_err(anyhow::Error::from)?;
        }
        Ok(dir)
    }
}
