use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tokio::{fs, io::AsyncWriteExt};
use tracing::{info, warn};

use crate::{
    error::{Error, Result, ValidationError},
    record::{SectionKey, StudentRecord},
    utils::unix_millis,
};

const CHUNK: usize = 64 * 1024;
const MB: u64 = 1024 * 1024;

/// Progress callback, called with the percentage uploaded so far.
pub type Progress<'a> = Option<&'a (dyn Fn(f64) + Send + Sync)>;

/// External file storage. The record keeps only the returned url.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn upload(&self, path: &str, bytes: &[u8], on_progress: Progress<'_>) -> Result<String>;

    /// Best effort; failures are logged and ignored.
    async fn delete(&self, url: &str);
}

/// What a particular upload widget accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadRule {
    pub accept: &'static [&'static str],
    pub max_mb: u64,
}

impl UploadRule {
    pub const IMAGE: UploadRule = UploadRule {
        accept: &["jpg", "jpeg", "png"],
        max_mb: 5,
    };
    pub const AUDIO: UploadRule = UploadRule {
        accept: &["mp3", "m4a", "wav"],
        max_mb: 10,
    };
    pub const VIDEO: UploadRule = UploadRule {
        accept: &["mp4", "mov", "webm"],
        max_mb: 50,
    };

    pub fn accepted(&self) -> String {
        self.accept
            .iter()
            .map(|ext| format!(".{ext}"))
            .collect::<Vec<_>>()
            .join(",")
    }

    pub fn validate(&self, file_name: &str, size: u64) -> std::result::Result<(), ValidationError> {
        if size > self.max_mb * MB {
            return Err(ValidationError::FileTooLarge { max_mb: self.max_mb });
        }
        let extension = Path::new(file_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .unwrap_or_default();
        if !self.accept.contains(&extension.as_str()) {
            return Err(ValidationError::UnsupportedFileType {
                accepted: self.accepted(),
            });
        }
        Ok(())
    }
}

/// `elders-wisdom/{class}/{name}/{section}/{millis}-{file}`
pub fn storage_path(record: &StudentRecord, section: SectionKey, file_name: &str) -> String {
    let file_name = Path::new(file_name)
        .file_name()
        .and_then(|f| f.to_str())
        .unwrap_or("upload");
    format!(
        "elders-wisdom/{}/{}/{}/{}-{}",
        record.class_code,
        record.name,
        section.storage_dir(),
        unix_millis(),
        file_name
    )
}

/// Validate and upload one file for `section`, returning its url.
pub async fn upload_media(
    blobs: &dyn BlobStore,
    rule: UploadRule,
    record: &StudentRecord,
    section: SectionKey,
    file_name: &str,
    bytes: &[u8],
    on_progress: Progress<'_>,
) -> Result<String> {
    rule.validate(file_name, bytes.len() as u64)?;
    let path = storage_path(record, section, file_name);
    blobs.upload(&path, bytes, on_progress).await
}

/// Blob store on the local filesystem, handing out `file://` urls.
#[derive(Debug, Clone)]
pub struct LocalBlobStore {
    root: PathBuf,
}

impl LocalBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, path: &str) -> Result<PathBuf> {
        let relative = Path::new(path);
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            return Err(Error::Upload(format!("refusing path {path}")));
        }
        Ok(self.root.join(relative))
    }

    fn url_of(path: &Path) -> String {
        format!("file://{}", path.display())
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn upload(&self, path: &str, bytes: &[u8], on_progress: Progress<'_>) -> Result<String> {
        let target = self.resolve(path)?;
        let io = |e: std::io::Error| Error::Upload(e.to_string());
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await.map_err(io)?;
        }
        let absolute = std::path::absolute(&target).map_err(io)?;
        let mut file = fs::File::create(&absolute).await.map_err(io)?;
        let total = bytes.len().max(1) as f64;
        let mut written = 0usize;
        for chunk in bytes.chunks(CHUNK) {
            file.write_all(chunk).await.map_err(io)?;
            written += chunk.len();
            if let Some(report) = on_progress {
                report(written as f64 * 100.0 / total);
            }
        }
        file.flush().await.map_err(io)?;
        if bytes.is_empty() {
            if let Some(report) = on_progress {
                report(100.0);
            }
        }
        info!("uploaded {} bytes to {}", bytes.len(), absolute.display());
        Ok(Self::url_of(&absolute))
    }

    async fn delete(&self, url: &str) {
        let Some(path) = url.strip_prefix("file://") else {
            warn!("not a local blob url: {url}");
            return;
        };
        let path = Path::new(path);
        if !path.starts_with(std::path::absolute(&self.root).unwrap_or_else(|_| self.root.clone())) {
            warn!("refusing to delete {url} outside the blob root");
            return;
        }
        if let Err(e) = fs::remove_file(path).await {
            warn!("Error deleting file {url}: {e}");
        }
    }
}
