//! Shared test helpers for creating SpeechDownloader instances in tests.

use async_trait::async_trait;
use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tempfile::tempdir;
use tokio_util::sync::CancellationToken;

use crate::client::{ContentFetcher, EnumerationClient};
use crate::config::Config;
use crate::downloader::SpeechDownloader;
use crate::error::{Error, Result};
use crate::types::{Cursor, Page, PageRequest, RawSpeech, Speech, SpeechId};
use crate::utils::sibling_with_suffix;

/// What a successful fake fetch leaves on disk
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ArtifactMode {
    /// A small non-empty archive
    Write,
    /// A zero-length archive
    Empty,
    /// Nothing at all
    Skip,
}

/// Content fetcher that writes fake archives and records every call
pub(crate) struct FakeFetcher {
    failing: Mutex<HashSet<String>>,
    calls: Mutex<Vec<String>>,
    mode: Mutex<ArtifactMode>,
    cancel_after: Mutex<Option<(usize, CancellationToken)>>,
}

impl FakeFetcher {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            failing: Mutex::new(HashSet::new()),
            calls: Mutex::new(Vec::new()),
            mode: Mutex::new(ArtifactMode::Write),
            cancel_after: Mutex::new(None),
        })
    }

    /// Make fetches for `content_id` fail
    pub(crate) fn fail_for(&self, content_id: &str) {
        self.failing.lock().unwrap().insert(content_id.to_string());
    }

    /// Make every fetch succeed again
    pub(crate) fn heal(&self) {
        self.failing.lock().unwrap().clear();
    }

    pub(crate) fn set_mode(&self, mode: ArtifactMode) {
        *self.mode.lock().unwrap() = mode;
    }

    /// Fire `token` once `calls` fetches have completed
    pub(crate) fn cancel_after(&self, calls: usize, token: CancellationToken) {
        *self.cancel_after.lock().unwrap() = Some((calls, token));
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ContentFetcher for FakeFetcher {
    async fn fetch(
        &self,
        content_id: &SpeechId,
        destination_base: &Path,
        _formats: &[String],
    ) -> Result<()> {
        let call_count = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(content_id.to_string());
            calls.len()
        };
        if let Some((after, token)) = self.cancel_after.lock().unwrap().as_ref()
            && call_count >= *after
        {
            token.cancel();
        }

        if self.failing.lock().unwrap().contains(content_id.as_str()) {
            return Err(Error::Transport {
                message: format!("HTTP 404 for {content_id}"),
                status: Some(404),
            });
        }

        let archive = sibling_with_suffix(destination_base, "zip");
        let mode = *self.mode.lock().unwrap();
        match mode {
            ArtifactMode::Write => std::fs::write(&archive, b"PK\x03\x04fake archive")?,
            ArtifactMode::Empty => std::fs::write(&archive, b"")?,
            ArtifactMode::Skip => {}
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "fake"
    }
}

/// Config rooted in `root` with retries disabled
pub(crate) fn test_config(root: &Path) -> Config {
    let mut config = Config::default();
    config.download.download_dir = root.join("downloads");
    config.download.retry.max_attempts = 0;
    config.persistence.snapshot_path = root.join("speeches_list.json");
    config.persistence.ledger_path = root.join("download_progress.json");
    config.persistence.validation_report_path = root.join("validation_report.json");
    config.persistence.failure_report_path = root.join("download_report.json");
    config
}

/// Helper to create a test SpeechDownloader backed by `fetcher`.
/// Returns the downloader and the tempdir (which must be kept alive).
pub(crate) async fn create_test_downloader(
    fetcher: Arc<FakeFetcher>,
) -> (SpeechDownloader, tempfile::TempDir) {
    let temp_dir = tempdir().unwrap();
    let downloader = SpeechDownloader::new(test_config(temp_dir.path()), fetcher)
        .await
        .unwrap();
    (downloader, temp_dir)
}

/// `[a1 "Talk", a2 "Talk", ...]`, all created at epoch 0
pub(crate) fn talks(count: usize) -> Vec<Speech> {
    (1..=count)
        .map(|i| Speech::new(format!("a{i}"), Some("Talk"), Some(0)))
        .collect()
}

/// Enumeration client serving one page per entry of `pages`, then an empty page
pub(crate) struct FakeListing {
    pages: Mutex<std::collections::VecDeque<Page>>,
}

impl FakeListing {
    pub(crate) fn new(pages: Vec<Vec<Speech>>) -> Self {
        let count = pages.len();
        let pages = pages
            .into_iter()
            .enumerate()
            .map(|(i, speeches)| Page {
                speeches: speeches.into_iter().map(RawSpeech::from).collect(),
                next_cursor: Cursor::new(format!("{}", i + 1)),
                end_of_list: i + 1 == count,
                status: Some(Page::STATUS_OK.to_string()),
            })
            .collect();
        Self {
            pages: Mutex::new(pages),
        }
    }
}

#[async_trait]
impl EnumerationClient for FakeListing {
    async fn fetch_page(&self, _request: &PageRequest<'_>) -> Result<Page> {
        Ok(self.pages.lock().unwrap().pop_front().unwrap_or(Page {
            status: Some(Page::STATUS_OK.to_string()),
            ..Default::default()
        }))
    }
}
