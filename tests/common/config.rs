//! Configurations rooted in a temporary directory

use std::path::Path;
use std::time::Duration;

use speech_dl::Config;

/// Config with every artifact under `root`, no fetch retries and a small page size
pub fn test_config(root: &Path) -> Config {
    let mut config = Config::default();
    config.enumeration.page_size = 2;
    config.download.download_dir = root.join("downloads");
    config.download.formats = vec!["txt".to_string(), "pdf".to_string()];
    config.download.retry.max_attempts = 0;
    config.persistence.snapshot_path = root.join("speeches_list.json");
    config.persistence.ledger_path = root.join("download_progress.json");
    config.persistence.validation_report_path = root.join("validation_report.json");
    config.persistence.failure_report_path = root.join("download_report.json");
    config
}

/// Point the API settings at a mock server
pub fn with_server(mut config: Config, uri: &str) -> Config {
    config.api.base_url = format!("{uri}/forward/api/v1/");
    config.api.request_timeout = Duration::from_secs(5);
    config
}

/// Enable fast fetch retries
pub fn with_retries(mut config: Config, max_attempts: u32) -> Config {
    config.download.retry.max_attempts = max_attempts;
    config.download.retry.initial_delay = Duration::from_millis(10);
    config.download.retry.max_delay = Duration::from_millis(50);
    config.download.retry.jitter = false;
    config
}
