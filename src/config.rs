//! Configuration types for speech-dl

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

/// Default upper bound on a derived directory name, in bytes.
///
/// Held consistently by every flow that derives storage locations.
pub const DEFAULT_MAX_DIR_NAME_LEN: usize = 100;

/// Smallest accepted name bound: `YYYY-MM-DD_` + one title char + `_` + a 16-char suffix
pub const MIN_DIR_NAME_LEN: usize = 29;

/// Remote API settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the speeches API, with trailing slash
    /// (default: "https://otter.ai/forward/api/v1/")
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Value sent in the `x-client-version` header
    #[serde(default = "default_client_version")]
    pub client_version: String,

    /// Per-request timeout (default: 120 seconds)
    #[serde(default = "default_request_timeout", with = "duration_serde")]
    pub request_timeout: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            client_version: default_client_version(),
            request_timeout: default_request_timeout(),
        }
    }
}

/// Pagination settings for enumerating the remote collection
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EnumerationConfig {
    /// Records requested per page (default: 45)
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// Source scope sent with each page request (default: "all")
    #[serde(default = "default_source")]
    pub source: String,

    /// Folder scope sent with each page request (default: 0, every folder)
    #[serde(default)]
    pub folder: i64,

    /// Stop after this many pages even if the server never signals end-of-list
    /// (None = unbounded)
    #[serde(default)]
    pub max_pages: Option<usize>,
}

impl Default for EnumerationConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            source: default_source(),
            folder: 0,
            max_pages: None,
        }
    }
}

/// Download behavior configuration (storage root, formats, concurrency)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Storage root for per-record directories (default: "./downloads")
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,

    /// Formats requested in every content bundle (default: txt, pdf, mp3, docx, srt)
    #[serde(default = "default_formats")]
    pub formats: Vec<String>,

    /// Upper bound on derived directory names in bytes (default: 100)
    #[serde(default = "default_max_dir_name_len")]
    pub max_dir_name_len: usize,

    /// Records fetched in parallel (default: 1, strictly sequential)
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_downloads: usize,

    /// Backoff for transient content-fetch failures
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            download_dir: default_download_dir(),
            formats: default_formats(),
            max_dir_name_len: default_max_dir_name_len(),
            max_concurrent_downloads: default_max_concurrent(),
            retry: RetryConfig::default(),
        }
    }
}

/// Locations of the persisted artifacts
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// Enumeration snapshot (default: "speeches_list.json")
    #[serde(default = "default_snapshot_path")]
    pub snapshot_path: PathBuf,

    /// Progress ledger (default: "download_progress.json")
    #[serde(default = "default_ledger_path")]
    pub ledger_path: PathBuf,

    /// Validation report (default: "validation_report.json")
    #[serde(default = "default_validation_report_path")]
    pub validation_report_path: PathBuf,

    /// Failure analysis report (default: "download_report.json")
    #[serde(default = "default_failure_report_path")]
    pub failure_report_path: PathBuf,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            snapshot_path: default_snapshot_path(),
            ledger_path: default_ledger_path(),
            validation_report_path: default_validation_report_path(),
            failure_report_path: default_failure_report_path(),
        }
    }
}

/// Main configuration for SpeechDownloader
///
/// Sub-configs other than `api` are flattened, so the serialized form is a single
/// flat object:
///
/// ```
/// use speech_dl::Config;
///
/// let config: Config = serde_json::from_str(r#"{
///     "page_size": 20,
///     "download_dir": "/srv/speeches",
///     "ledger_path": "/srv/speeches/progress.json"
/// }"#).unwrap();
///
/// assert_eq!(config.enumeration.page_size, 20);
/// assert_eq!(config.download.max_dir_name_len, 100);
/// ```
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Remote API settings
    #[serde(default)]
    pub api: ApiConfig,

    /// Pagination settings
    #[serde(flatten)]
    pub enumeration: EnumerationConfig,

    /// Download behavior settings
    #[serde(flatten)]
    pub download: DownloadConfig,

    /// Persisted artifact locations
    #[serde(flatten)]
    pub persistence: PersistenceConfig,
}

impl Config {
    /// Storage root for per-record directories
    pub fn download_dir(&self) -> &PathBuf {
        &self.download.download_dir
    }

    /// Reject settings the orchestrator cannot honor
    pub fn validate(&self) -> Result<()> {
        if self.enumeration.page_size == 0 {
            return Err(config_error("page_size must be greater than zero", "page_size"));
        }
        if self.download.max_concurrent_downloads == 0 {
            return Err(config_error(
                "max_concurrent_downloads must be at least 1",
                "max_concurrent_downloads",
            ));
        }
        if self.download.formats.is_empty() {
            return Err(config_error("at least one format is required", "formats"));
        }
        if self.download.max_dir_name_len < MIN_DIR_NAME_LEN {
            return Err(config_error(
                format!("max_dir_name_len must be at least {MIN_DIR_NAME_LEN}"),
                "max_dir_name_len",
            ));
        }
        if url::Url::parse(&self.api.base_url).is_err() {
            return Err(config_error(
                format!("invalid base_url '{}'", self.api.base_url),
                "base_url",
            ));
        }
        Ok(())
    }
}

fn config_error(message: impl Into<String>, key: &str) -> Error {
    Error::Config {
        message: message.into(),
        key: Some(key.to_string()),
    }
}

/// Retry configuration for transient content-fetch failures
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (default: 2)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Initial delay before first retry (default: 2 seconds)
    #[serde(default = "default_initial_delay", with = "duration_serde")]
    pub initial_delay: Duration,

    /// Maximum delay between retries (default: 30 seconds)
    #[serde(default = "default_max_delay", with = "duration_serde")]
    pub max_delay: Duration,

    /// Multiplier for exponential backoff (default: 2.0)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to delays (default: true)
    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: true,
        }
    }
}

fn default_base_url() -> String {
    "https://otter.ai/forward/api/v1/".to_string()
}

fn default_client_version() -> String {
    "Otter v3.68.1".to_string()
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(120)
}

fn default_page_size() -> u32 {
    45
}

fn default_source() -> String {
    "all".to_string()
}

fn default_download_dir() -> PathBuf {
    PathBuf::from("downloads")
}

fn default_formats() -> Vec<String> {
    ["txt", "pdf", "mp3", "docx", "srt"]
        .iter()
        .map(|f| f.to_string())
        .collect()
}

fn default_max_dir_name_len() -> usize {
    DEFAULT_MAX_DIR_NAME_LEN
}

fn default_max_concurrent() -> usize {
    1
}

fn default_snapshot_path() -> PathBuf {
    PathBuf::from("speeches_list.json")
}

fn default_ledger_path() -> PathBuf {
    PathBuf::from("download_progress.json")
}

fn default_validation_report_path() -> PathBuf {
    PathBuf::from("validation_report.json")
}

fn default_failure_report_path() -> PathBuf {
    PathBuf::from("download_report.json")
}

fn default_true() -> bool {
    true
}

fn default_max_attempts() -> u32 {
    2
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(2)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(30)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
