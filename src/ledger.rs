//! Durable per-identity download progress
//!
//! The ledger holds two disjoint sets, `downloaded` and `failed`; every identity in
//! neither is pending. It is loaded once at startup and persisted after every single
//! outcome, so an abrupt stop loses at most the record that was in flight.
//!
//! On disk it is `{"downloaded": [...], "failed": [...]}` in insertion order.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::error::Result;
use crate::types::{LedgerState, SpeechId};
use crate::utils::{JsonFile, read_json, write_json_atomic};

#[derive(Debug, Default, Serialize, Deserialize)]
struct LedgerFile {
    #[serde(default)]
    downloaded: Vec<SpeechId>,
    #[serde(default)]
    failed: Vec<SpeechId>,
}

/// Resolution state of every identity seen by the orchestrator
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProgressLedger {
    downloaded: Vec<SpeechId>,
    failed: Vec<SpeechId>,
    states: HashMap<SpeechId, LedgerState>,
}

impl ProgressLedger {
    /// Create an empty ledger
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the ledger at `path`
    ///
    /// Never fails: a missing file yields an empty ledger, and an unreadable or
    /// undecodable one yields an empty ledger plus a warning.
    pub async fn load(path: &Path) -> Self {
        match read_json::<LedgerFile>(path).await {
            JsonFile::Loaded(file) => {
                let ledger = Self::from_file(file);
                tracing::info!(
                    path = %path.display(),
                    downloaded = ledger.downloaded.len(),
                    failed = ledger.failed.len(),
                    "Loaded progress ledger"
                );
                ledger
            }
            JsonFile::Missing => {
                tracing::debug!(path = %path.display(), "No progress ledger yet, starting empty");
                Self::new()
            }
            JsonFile::Corrupt(reason) => {
                tracing::warn!(
                    path = %path.display(),
                    reason = %reason,
                    "Corrupt progress ledger, starting fresh"
                );
                Self::new()
            }
        }
    }

    fn from_file(file: LedgerFile) -> Self {
        let mut ledger = Self::new();
        for id in file.downloaded {
            ledger.mark_downloaded(id);
        }
        for id in file.failed {
            if ledger.is_downloaded(&id) {
                tracing::warn!(
                    speech_id = %id,
                    "Identity listed as both downloaded and failed, keeping downloaded"
                );
                continue;
            }
            ledger.mark_failed(id);
        }
        ledger
    }

    /// Atomically write the whole ledger to `path`
    pub async fn persist(&self, path: &Path) -> Result<()> {
        let file = LedgerFile {
            downloaded: self.downloaded.clone(),
            failed: self.failed.clone(),
        };
        write_json_atomic(path, &file).await
    }

    /// Current state of `id`
    pub fn state(&self, id: &SpeechId) -> LedgerState {
        self.states.get(id).copied().unwrap_or(LedgerState::Pending)
    }

    /// Whether `id` is downloaded or failed
    pub fn is_resolved(&self, id: &SpeechId) -> bool {
        self.state(id) != LedgerState::Pending
    }

    /// Whether `id` is downloaded
    pub fn is_downloaded(&self, id: &SpeechId) -> bool {
        self.state(id) == LedgerState::Downloaded
    }

    /// Whether `id` is failed
    pub fn is_failed(&self, id: &SpeechId) -> bool {
        self.state(id) == LedgerState::Failed
    }

    /// Move `id` into `downloaded`, removing it from `failed` first
    ///
    /// Returns false if it was already downloaded.
    pub fn mark_downloaded(&mut self, id: SpeechId) -> bool {
        self.transition(id, LedgerState::Downloaded)
    }

    /// Move `id` into `failed`, removing it from `downloaded` first
    ///
    /// Returns false if it was already failed.
    pub fn mark_failed(&mut self, id: SpeechId) -> bool {
        self.transition(id, LedgerState::Failed)
    }

    fn transition(&mut self, id: SpeechId, to: LedgerState) -> bool {
        let from = self.state(&id);
        if from == to {
            return false;
        }
        match from {
            LedgerState::Downloaded => self.downloaded.retain(|d| d != &id),
            LedgerState::Failed => self.failed.retain(|f| f != &id),
            LedgerState::Pending => {}
        }
        match to {
            LedgerState::Downloaded => self.downloaded.push(id.clone()),
            LedgerState::Failed => self.failed.push(id.clone()),
            LedgerState::Pending => {}
        }
        self.states.insert(id, to);
        true
    }

    /// Downloaded identities in insertion order
    pub fn downloaded(&self) -> &[SpeechId] {
        &self.downloaded
    }

    /// Failed identities in insertion order
    pub fn failed(&self) -> &[SpeechId] {
        &self.failed
    }
}

/// Single serialized writer for a ledger shared by concurrent workers
///
/// Marking and persisting happen under one lock, so the file on disk always reflects
/// every outcome recorded so far and no two workers interleave writes.
#[derive(Clone, Debug)]
pub struct SharedLedger {
    inner: Arc<Mutex<ProgressLedger>>,
    path: PathBuf,
}

impl SharedLedger {
    /// Wrap an already loaded ledger that persists to `path`
    pub fn new(ledger: ProgressLedger, path: impl Into<PathBuf>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(ledger)),
            path: path.into(),
        }
    }

    /// Load the ledger at `path` (see [`ProgressLedger::load`])
    pub async fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let ledger = ProgressLedger::load(&path).await;
        Self::new(ledger, path)
    }

    /// Where the ledger is persisted
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Record the outcome for `id` and persist before returning
    pub async fn record(&self, id: SpeechId, state: LedgerState) -> Result<()> {
        let mut ledger = self.inner.lock().await;
        match state {
            LedgerState::Downloaded => ledger.mark_downloaded(id),
            LedgerState::Failed => ledger.mark_failed(id),
            LedgerState::Pending => return Ok(()),
        };
        ledger.persist(&self.path).await
    }

    /// Apply several transitions and persist once
    pub async fn record_all(
        &self,
        updates: impl IntoIterator<Item = (SpeechId, LedgerState)>,
    ) -> Result<usize> {
        let mut ledger = self.inner.lock().await;
        let mut changed = 0;
        for (id, state) in updates {
            let applied = match state {
                LedgerState::Downloaded => ledger.mark_downloaded(id),
                LedgerState::Failed => ledger.mark_failed(id),
                LedgerState::Pending => false,
            };
            if applied {
                changed += 1;
            }
        }
        if changed > 0 {
            ledger.persist(&self.path).await?;
        }
        Ok(changed)
    }

    /// Copy of the current ledger
    pub async fn snapshot(&self) -> ProgressLedger {
        self.inner.lock().await.clone()
    }

    /// Current state of `id`
    pub async fn state(&self, id: &SpeechId) -> LedgerState {
        self.inner.lock().await.state(id)
    }
}
