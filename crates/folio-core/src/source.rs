//! Where the navigation store gets `plays.json` from.
//!
//! The deployed asset root is either an `http(s)://` base URL (one GET of
//! `data/plays.json` beneath it) or a local directory holding the same layout.

use crate::config::CORPUS_ASSET_PATH;
use crate::model::Corpus;
use anyhow::{Context, Result, anyhow};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

pub trait CorpusSource {
    fn load(&self) -> Result<Corpus>;

    /// Human-readable location for logs.
    fn describe(&self) -> String;
}

#[derive(Debug, Clone)]
pub struct HttpCorpusSource {
    url: String,
}

impl HttpCorpusSource {
    pub fn new(asset_root: &str) -> Self {
        Self {
            url: format!("{}/{CORPUS_ASSET_PATH}", asset_root.trim_end_matches('/')),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl CorpusSource for HttpCorpusSource {
    fn load(&self) -> Result<Corpus> {
        let client = reqwest::blocking::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .build()
            .context("failed to build HTTP client")?;
        let response = client
            .get(&self.url)
            .send()
            .with_context(|| format!("failed to fetch {}", self.url))?;
        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("Failed to load plays ({})", status.as_u16()));
        }
        let body = response
            .text()
            .with_context(|| format!("failed to read body from {}", self.url))?;
        debug!(url = %self.url, bytes = body.len(), "Fetched corpus");
        serde_json::from_str(&body).context("failed to parse plays.json")
    }

    fn describe(&self) -> String {
        self.url.clone()
    }
}

#[derive(Debug, Clone)]
pub struct FileCorpusSource {
    path: PathBuf,
}

impl FileCorpusSource {
    pub fn new(asset_root: &str) -> Self {
        Self {
            path: PathBuf::from(asset_root).join(CORPUS_ASSET_PATH),
        }
    }

    pub fn from_path(path: PathBuf) -> Self {
        Self { path }
    }
}

impl CorpusSource for FileCorpusSource {
    fn load(&self) -> Result<Corpus> {
        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to load plays from {}", self.path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse {}", self.path.display()))
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Pick the source type for an asset root from config or the command line.
pub fn source_for_root(asset_root: &str) -> Box<dyn CorpusSource> {
    let trimmed = asset_root.trim();
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        Box::new(HttpCorpusSource::new(trimmed))
    } else {
        Box::new(FileCorpusSource::new(trimmed))
    }
}
