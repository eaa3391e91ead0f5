//! Content-addressed cache for remote image assets.
//!
//! Each URL maps to `<hex sha256(url)>.<ext>` inside a writable cache
//! directory. An in-memory index short-circuits repeat lookups; files already
//! on disk (from an earlier process) are adopted without a download. Fetch
//! and storage failures are absorbed: the caller receives the original URL
//! and the browser loads it directly.

use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::RwLock;

/// Image extensions kept from the URL path; anything else becomes `png`
const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp", "bmp", "svg"];
const DEFAULT_EXTENSION: &str = "png";

/// Characters escaped when turning a filesystem path into a `file://` URL
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Where an image should be loaded from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedAsset {
    /// Stored locally at this absolute path
    Cached(PathBuf),
    /// Not cached; load the original URL
    Remote(String),
}

impl ResolvedAsset {
    /// Location to put into an `<img src>`
    pub fn to_src(&self) -> String {
        match self {
            ResolvedAsset::Cached(path) => file_url(path),
            ResolvedAsset::Remote(url) => url.clone(),
        }
    }

    pub fn is_cached(&self) -> bool {
        matches!(self, ResolvedAsset::Cached(_))
    }
}

/// Hex-encoded SHA-256 of the URL string
pub fn cache_key(url: &str) -> String {
    hex::encode(Sha256::digest(url.as_bytes()))
}

/// File extension for a cached URL, taken from its path suffix when it is a known image type
pub fn guess_extension(url: &str) -> &'static str {
    let Ok(parsed) = reqwest::Url::parse(url) else {
        tracing::debug!(url = %url, "Unparsable URL, using default extension");
        return DEFAULT_EXTENSION;
    };

    let path = parsed.path();
    let Some(dot) = path.rfind('.') else {
        return DEFAULT_EXTENSION;
    };
    if dot == 0 {
        return DEFAULT_EXTENSION;
    }

    let candidate = path[dot + 1..].to_ascii_lowercase();
    IMAGE_EXTENSIONS
        .iter()
        .find(|ext| **ext == candidate)
        .copied()
        .unwrap_or(DEFAULT_EXTENSION)
}

/// `file://` URL for an absolute filesystem path
pub fn file_url(path: &Path) -> String {
    let raw = path.to_string_lossy().replace('\\', "/");
    let encoded = utf8_percent_encode(&raw, PATH_SEGMENT).to_string();
    if encoded.starts_with('/') {
        format!("file://{encoded}")
    } else {
        format!("file:///{encoded}")
    }
}

/// Create `dir` (mode 0755 on unix) if needed and prove it accepts new files.
pub fn ensure_writable_dir(dir: &Path) -> io::Result<PathBuf> {
    let mut builder = std::fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o755);
    }
    builder.create(dir)?;

    // Existence is not enough: a read-only mount passes `exists()`.
    let check = tempfile::Builder::new()
        .prefix(".write-check")
        .tempfile_in(dir)?;
    drop(check);

    std::fs::canonicalize(dir)
}

/// Two-tier (memory + disk) image cache shared by all requests
pub struct AssetCache {
    primary_dir: PathBuf,
    fallback_dir: PathBuf,
    client: reqwest::Client,
    entries: RwLock<HashMap<String, PathBuf>>,
    /// Directory chosen by the last successful write check
    chosen_dir: RwLock<Option<PathBuf>>,
}

impl AssetCache {
    pub fn new(primary_dir: PathBuf, fallback_dir: PathBuf, fetch_timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(fetch_timeout)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(%e, "Failed to build HTTP client, using defaults");
                reqwest::Client::new()
            });

        Self {
            primary_dir,
            fallback_dir,
            client,
            entries: RwLock::new(HashMap::new()),
            chosen_dir: RwLock::new(None),
        }
    }

    /// Number of URLs in the in-memory index
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Writable cache directory: the primary one, else the fallback.
    ///
    /// The choice is remembered until a write into it fails.
    pub async fn cache_dir(&self) -> Option<PathBuf> {
        if let Some(dir) = self.chosen_dir.read().await.clone() {
            return Some(dir);
        }

        let primary = self.primary_dir.clone();
        let fallback = self.fallback_dir.clone();
        let chosen = tokio::task::spawn_blocking(move || choose_dir(&primary, &fallback))
            .await
            .unwrap_or_else(|e| {
                tracing::error!(%e, "Cache directory check task failed");
                None
            });

        if let Some(dir) = &chosen {
            *self.chosen_dir.write().await = Some(dir.clone());
        }
        chosen
    }

    async fn forget_cache_dir(&self) {
        *self.chosen_dir.write().await = None;
    }

    /// Map `url` to a local file, downloading it on a miss.
    ///
    /// Never fails: any problem yields [`ResolvedAsset::Remote`] with the original URL.
    pub async fn resolve(&self, url: &str) -> ResolvedAsset {
        if let Some(path) = self.entries.read().await.get(url) {
            tracing::debug!(url = %truncate(url), "Image cache hit");
            return ResolvedAsset::Cached(path.clone());
        }

        let Some(dir) = self.cache_dir().await else {
            return ResolvedAsset::Remote(url.to_string());
        };
        let key = cache_key(url);
        let path = dir.join(format!("{key}.{}", guess_extension(url)));

        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            tracing::debug!(url = %truncate(url), file = %path.display(), "Image cache disk hit");
            self.entries
                .write()
                .await
                .insert(url.to_string(), path.clone());
            return ResolvedAsset::Cached(path);
        }

        tracing::debug!(url = %truncate(url), "Downloading image");
        match self.download(url, &dir, &key, &path).await {
            Ok(bytes) => {
                tracing::info!(
                    url = %truncate(url),
                    file = %path.display(),
                    bytes,
                    "Image downloaded"
                );
                self.entries
                    .write()
                    .await
                    .insert(url.to_string(), path.clone());
                ResolvedAsset::Cached(path)
            }
            Err(e) => {
                if matches!(e, DownloadError::Io(_)) {
                    self.forget_cache_dir().await;
                }
                tracing::warn!(url = %truncate(url), error = %e, "Image download failed, using remote URL");
                ResolvedAsset::Remote(url.to_string())
            }
        }
    }

    async fn download(
        &self,
        url: &str,
        dir: &Path,
        key: &str,
        path: &Path,
    ) -> Result<usize, DownloadError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::Status(status.as_u16()));
        }
        let body = response.bytes().await?;

        // Write beside the target and rename, so a concurrent reader of the
        // same URL never sees a half-written file. Last rename wins.
        let suffix: u64 = rand::random();
        let partial = dir.join(format!(".{key}.{suffix:016x}.part"));
        if let Err(e) = tokio::fs::write(&partial, &body).await {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(e.into());
        }
        if let Err(e) = tokio::fs::rename(&partial, path).await {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(e.into());
        }

        Ok(body.len())
    }
}

fn choose_dir(primary: &Path, fallback: &Path) -> Option<PathBuf> {
    match ensure_writable_dir(primary) {
        Ok(dir) => {
            tracing::info!(dir = %dir.display(), "Image cache directory ready");
            Some(dir)
        }
        Err(primary_err) => match ensure_writable_dir(fallback) {
            Ok(dir) => {
                tracing::warn!(
                    %primary_err,
                    primary = %primary.display(),
                    dir = %dir.display(),
                    "Image cache directory not writable, using fallback"
                );
                Some(dir)
            }
            Err(e) => {
                tracing::error!(
                    %primary_err,
                    fallback_err = %e,
                    "No writable cache directory"
                );
                None
            }
        },
    }
}

#[derive(Debug, thiserror::Error)]
enum DownloadError {
    #[error("HTTP {0}")]
    Status(u16),

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("storage failed: {0}")]
    Io(#[from] io::Error),
}

fn truncate(url: &str) -> &str {
    match url.char_indices().nth(80) {
        Some((idx, _)) => &url[..idx],
        None => url,
    }
}
