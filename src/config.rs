use std::{path::{Path, PathBuf}, time::Duration};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::completion::ANTHOLOGY_THRESHOLD;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database_url: String,
    pub blob_root: PathBuf,
    /// Quiet period after the last edit before an autosave fires.
    pub debounce_ms: u64,
    pub anthology_threshold: u8,
    pub log_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: "sqlite://database/elders.db".to_string(),
            blob_root: PathBuf::from("./blobs"),
            debounce_ms: 2000,
            anthology_threshold: ANTHOLOGY_THRESHOLD,
            log_dir: None,
        }
    }
}

impl Config {
    /// Reads `path` when it exists, then applies `ELDERS_*` environment overrides
    /// (including a `.env` file).
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let mut config = Self::from_file(path)?;
        let _ = dotenvy::dotenv();
        config.apply_env(|key| dotenvy::var(key).ok())?;
        Ok(config)
    }

    /// The file's settings over the defaults; defaults alone when it is absent.
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Ok(Config::default());
        }
        let raw = std::fs::read_to_string(path)?;
        toml::from_str::<Config>(&raw).with_context(|| format!("invalid config {}", path.display()))
    }

    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) -> anyhow::Result<()> {
        if let Some(url) = var("ELDERS_DATABASE_URL") {
            self.database_url = url;
        }
        if let Some(root) = var("ELDERS_BLOB_ROOT") {
            self.blob_root = PathBuf::from(root);
        }
        if let Some(ms) = var("ELDERS_DEBOUNCE_MS") {
            self.debounce_ms = ms
                .parse()
                .with_context(|| format!("ELDERS_DEBOUNCE_MS={ms} is not a number of milliseconds"))?;
        }
        Ok(())
    }

    pub fn debounce_window(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}
