use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Failure of a single HTTP fetch attempt.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Transport(String),
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    #[error("HTTP {0}")]
    Status(u16),
    #[error("empty response body")]
    EmptyBody,
}

impl FetchError {
    /// Transport errors, timeouts and non-2xx statuses are worth another attempt.
    /// An empty 200 body will not change on retry.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, FetchError::EmptyBody)
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("state file I/O failed at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("state value for `{key}` is malformed: {source}")]
    Json {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Error)]
pub enum AssetError {
    #[error("not an absolute http(s) URL: {0}")]
    InvalidUrl(String),
    #[error("failed to fetch {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: FetchError,
    },
    #[error("failed to write asset {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("failed to write captured page {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {path:?}: {source}")]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("site_url `{0}` must be an absolute http(s) URL with a host")]
    InvalidSiteUrl(String),
}

/// Failure inside the streaming page rewrite. Callers fall back to the
/// untouched page.
#[derive(Debug, Error)]
pub enum RewriteError {
    #[error("HTML rewrite failed: {0}")]
    Html(#[from] lol_html::errors::RewritingError),
    #[error("rewritten page is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("archive {0:?} would be written inside the static tree")]
    InsideTree(PathBuf),
    #[error("archive I/O failed at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to build archive: {0}")]
    Zip(#[from] zip::result::ZipError),
}

/// Errors surfaced by the [`crate::StaticMirror`] facade.
#[derive(Debug, Error)]
pub enum MirrorError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Asset(#[from] AssetError),
    #[error(transparent)]
    Archive(#[from] ArchiveError),
    #[error("failed to prepare static root {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
