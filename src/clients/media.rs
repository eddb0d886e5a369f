use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Error, Result, anyhow};
use reqwest::{Client, Url};
use tempfile::NamedTempFile;
use tokio::{fs::File, io::AsyncWriteExt};
use tracing::{debug, info, warn};

use crate::config::Config;

const IMAGE_EXTENSIONS: [&str; 6] = ["jpg", "jpeg", "png", "gif", "webp", "bmp"];

/// An attachment ready to send. Temporary files are deleted on drop.
#[derive(Debug)]
pub enum MediaAttachment {
    Temporary(NamedTempFile),
    Local(PathBuf),
}

impl MediaAttachment {
    pub fn path(&self) -> &Path {
        match self {
            MediaAttachment::Temporary(file) => file.path(),
            MediaAttachment::Local(path) => path,
        }
    }

    /// Removes a temporary file now, logging failures. Local files are kept.
    pub fn cleanup(self) {
        if let MediaAttachment::Temporary(file) = self {
            let path = file.path().to_path_buf();

            match file.close() {
                Ok(()) => debug!(path = %path.display(), "Temporary media file removed"),
                Err(e) => warn!(
                    path = %path.display(),
                    error = %e,
                    "Failed to remove temporary media file"
                ),
            }
        }
    }
}

pub struct MediaFetcher {
    http_client: Client,
    timeout: Duration,
    media_dir: Option<PathBuf>,
}

impl MediaFetcher {
    pub fn new(config: &Config) -> Result<Self, Error> {
        Self::with_settings(config.media_fetch_timeout(), config.media_dir.clone())
    }

    pub fn with_settings(timeout: Duration, media_dir: Option<PathBuf>) -> Result<Self, Error> {
        let http_client = Client::builder()
            .build()
            .map_err(|_| anyhow!("Failed to create HTTP client"))?;

        info!(
            timeout_ms = timeout.as_millis() as u64,
            media_dir = ?media_dir,
            "Media fetcher initialized"
        );

        Ok(Self {
            http_client,
            timeout,
            media_dir,
        })
    }

    /// Resolves a locator to a file. Remote URLs are downloaded within the
    /// configured timeout unless `media_dir` already holds a copy; other
    /// locators are only looked up inside `media_dir`.
    pub async fn fetch(&self, locator: &str) -> Result<MediaAttachment, Error> {
        match Url::parse(locator) {
            Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {
                if let Some(path) = self.local_copy(url.path()).await {
                    debug!(path = %path.display(), "Using local media copy");
                    return Ok(MediaAttachment::Local(path));
                }

                tokio::time::timeout(self.timeout, self.download(&url))
                    .await
                    .map_err(|_| {
                        anyhow!(
                            "Media fetch timed out after {}ms",
                            self.timeout.as_millis()
                        )
                    })?
            }
            _ => self
                .local_copy(locator)
                .await
                .map(MediaAttachment::Local)
                .ok_or_else(|| anyhow!("Media {} not found locally", locator)),
        }
    }

    async fn local_copy(&self, name: &str) -> Option<PathBuf> {
        let dir = self.media_dir.as_ref()?;
        let file_name = Path::new(name).file_name()?;
        let path = dir.join(file_name);

        match tokio::fs::try_exists(&path).await {
            Ok(true) => Some(path),
            _ => None,
        }
    }

    async fn download(&self, url: &Url) -> Result<MediaAttachment, Error> {
        let file = tempfile::Builder::new()
            .prefix("alert_media_")
            .suffix(&image_extension(url))
            .tempfile()
            .map_err(|e| anyhow!("Failed to create temporary media file: {}", e))?;

        let mut response = self
            .http_client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| anyhow!("Media request failed: {}", e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("Media server returned status {}", status));
        }

        let mut out = File::create(file.path())
            .await
            .map_err(|e| anyhow!("Failed to open temporary media file: {}", e))?;
        let mut written: u64 = 0;

        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| anyhow!("Failed to read media body: {}", e))?
        {
            out.write_all(&chunk)
                .await
                .map_err(|e| anyhow!("Failed to write temporary media file: {}", e))?;
            written += chunk.len() as u64;
        }

        out.flush()
            .await
            .map_err(|e| anyhow!("Failed to write temporary media file: {}", e))?;

        debug!(path = %file.path().display(), bytes = written, "Media downloaded");

        Ok(MediaAttachment::Temporary(file))
    }
}

fn image_extension(url: &Url) -> String {
    Path::new(url.path())
        .extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .filter(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
        .map(|ext| format!(".{}", ext))
        .unwrap_or_else(|| ".jpg".to_string())
}
