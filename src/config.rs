use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::ConfigError;

pub const DEFAULT_SITE_URL: &str = "http://localhost";
pub const DEFAULT_OUTPUT_DIR: &str = "./static-site";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MirrorConfig {
    /// Public base URL of the live site.
    pub site_url: String,
    /// Root of the captured static tree.
    pub output_dir: PathBuf,
    /// Durable state file; defaults to `<output_dir>.state.json`.
    pub state_file: Option<PathBuf>,
    /// Stamped into every captured page; pages from older versions are stale.
    pub generator_version: String,
    /// Maximum page age in seconds. `0` turns the age check off.
    pub cache_ttl_secs: u64,
    pub fetch: FetchConfig,
    pub batch: BatchConfig,
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            site_url: DEFAULT_SITE_URL.to_string(),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            state_file: None,
            generator_version: env!("CARGO_PKG_VERSION").to_string(),
            cache_ttl_secs: 86_400,
            fetch: FetchConfig::default(),
            batch: BatchConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub timeout_secs: u64,
    /// Extra attempts after the first one.
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 20,
            max_retries: 2,
            retry_backoff_ms: 1_000,
            user_agent: format!("StaticMirror/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Items drained per interactive ("process now") call.
    pub interactive_size: usize,
    /// Items drained per deferred background job.
    pub background_size: usize,
    pub initial_delay_secs: u64,
    pub reschedule_delay_secs: u64,
    /// Additional batch runs a failed URL gets before it is dropped.
    pub failed_asset_retries: u32,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            interactive_size: 5,
            background_size: 10,
            initial_delay_secs: 10,
            reschedule_delay_secs: 30,
            failed_asset_retries: 0,
        }
    }
}

impl BatchConfig {
    pub fn initial_delay(&self) -> Duration {
        Duration::from_secs(self.initial_delay_secs)
    }

    pub fn reschedule_delay(&self) -> Duration {
        Duration::from_secs(self.reschedule_delay_secs)
    }
}

impl MirrorConfig {
    /// Reads a TOML file; missing keys take their defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::Toml {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn site(&self) -> Result<Url, ConfigError> {
        let invalid = || ConfigError::InvalidSiteUrl(self.site_url.clone());
        let url = Url::parse(&self.site_url).map_err(|_| invalid())?;
        if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
            return Err(invalid());
        }
        Ok(url)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.site().map(|_| ())
    }

    pub fn state_file(&self) -> PathBuf {
        self.state_file.clone().unwrap_or_else(|| {
            let mut name = self
                .output_dir
                .file_name()
                .map(|n| n.to_os_string())
                .unwrap_or_else(|| "static-site".into());
            name.push(".state.json");
            self.output_dir.with_file_name(name)
        })
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}
