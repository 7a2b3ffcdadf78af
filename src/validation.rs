//! Filesystem audit of downloaded records
//!
//! Validation re-derives every `downloaded` identity's outcome from the storage tree:
//! - `not_found`: no directory for the identity exists
//! - `missing_files`: the directory lacks a non-empty metadata artifact or archive
//! - `verified`: both artifacts are present and non-empty
//!
//! Directories are matched by the identity suffix after the last `_` of their name.
//! An identity may own several directories (a renamed title leaves the old one
//! behind); it verifies if any of them is complete.
//!
//! [`validate`] only reads. Correcting the ledger from a report is the separate
//! [`repair_ledger`] operation.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::ledger::{ProgressLedger, SharedLedger};
use crate::naming::{
    BUCKET_METADATA_SUFFIX, DirectoryNamer, ERROR_BUCKET, METADATA_FILE, dir_name_suffix,
    is_error_bucket,
};
use crate::snapshot::EnumerationSnapshot;
use crate::types::{LedgerState, Speech, SpeechId};
use crate::utils::non_empty_file_len;

/// Format used for report timestamps (local time)
pub const REPORT_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Classification of a single downloaded identity
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verdict {
    /// Metadata and archive present and non-empty
    Verified,
    /// Directory found but an artifact is absent or empty
    MissingFiles,
    /// No directory for the identity
    NotFound,
}

/// Identities grouped by verdict, each in ledger order
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResults {
    /// Fully present on disk
    pub verified: Vec<SpeechId>,
    /// Directory present, artifact absent or empty
    pub missing_files: Vec<SpeechId>,
    /// No directory located
    pub not_found: Vec<SpeechId>,
}

impl ValidationResults {
    fn push(&mut self, id: SpeechId, verdict: Verdict) {
        match verdict {
            Verdict::Verified => self.verified.push(id),
            Verdict::MissingFiles => self.missing_files.push(id),
            Verdict::NotFound => self.not_found.push(id),
        }
    }

    /// Identities that were marked downloaded but did not verify
    pub fn discrepancies(&self) -> impl Iterator<Item = &SpeechId> {
        self.missing_files.iter().chain(self.not_found.iter())
    }

    /// Number of identities classified
    pub fn total(&self) -> usize {
        self.verified.len() + self.missing_files.len() + self.not_found.len()
    }
}

/// Result of one validation run, persisted as `validation_report.json`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    /// When the audit ran
    pub timestamp: String,
    /// Classification of every downloaded identity
    pub validation_results: ValidationResults,
    /// Snapshot records of the identities the ledger marks failed
    pub failed_details: Vec<Speech>,
}

/// Directories in the storage tree, addressable by identity suffix
#[derive(Debug, Default)]
struct StorageIndex {
    by_suffix: HashMap<String, Vec<PathBuf>>,
    error_bucket: Option<PathBuf>,
}

impl StorageIndex {
    /// Walk `root` once; a missing root yields an empty index
    fn scan(root: &Path) -> Self {
        let mut index = Self::default();
        if !root.is_dir() {
            tracing::warn!(root = %root.display(), "Storage root does not exist");
            return index;
        }

        for entry in WalkDir::new(root).min_depth(1).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!(error = %e, "Skipping unreadable storage entry");
                    continue;
                }
            };
            if !entry.file_type().is_dir() {
                continue;
            }
            let Some(name) = entry.file_name().to_str() else {
                continue;
            };
            if name == ERROR_BUCKET {
                index.error_bucket.get_or_insert_with(|| entry.path().to_path_buf());
                continue;
            }
            if let Some(suffix) = dir_name_suffix(name) {
                index
                    .by_suffix
                    .entry(suffix.to_string())
                    .or_default()
                    .push(entry.path().to_path_buf());
            }
        }
        index
    }

    /// Every directory that may hold the record with identity suffix `suffix`
    ///
    /// The error bucket only counts when it holds the record's archive.
    fn candidates(&self, suffix: &str, archive_name: &str) -> Vec<&Path> {
        let mut found: Vec<&Path> = self
            .by_suffix
            .get(suffix)
            .map(|dirs| dirs.iter().map(PathBuf::as_path).collect())
            .unwrap_or_default();
        if let Some(bucket) = self.error_bucket.as_deref()
            && bucket.join(archive_name).exists()
        {
            found.push(bucket);
        }
        found
    }
}

/// Check a record directory for the record's metadata and archive
pub fn check_directory(directory: &Path, namer: &DirectoryNamer, id: &SpeechId) -> Verdict {
    let metadata = directory.join(namer.metadata_file_name(directory, id));
    let archive = directory.join(namer.archive_file_name(id));

    for artifact in [&metadata, &archive] {
        if non_empty_file_len(artifact).is_none() {
            tracing::debug!(path = %artifact.display(), "Artifact absent or empty");
            return Verdict::MissingFiles;
        }
    }
    Verdict::Verified
}

fn classify(ledger: &ProgressLedger, root: &Path, namer: &DirectoryNamer) -> ValidationResults {
    let index = StorageIndex::scan(root);
    let mut results = ValidationResults::default();

    for id in ledger.downloaded() {
        let suffix = namer.identity_suffix(id);
        let candidates = index.candidates(&suffix, &namer.archive_file_name(id));
        let verdict = if candidates.is_empty() {
            Verdict::NotFound
        } else if candidates
            .iter()
            .any(|directory| check_directory(directory, namer, id) == Verdict::Verified)
        {
            Verdict::Verified
        } else {
            Verdict::MissingFiles
        };
        if verdict != Verdict::Verified {
            tracing::warn!(
                speech_id = %id,
                ?verdict,
                directories = candidates.len(),
                "Downloaded record did not verify"
            );
        }
        results.push(id.clone(), verdict);
    }
    results
}

/// Audit every identity the ledger marks downloaded against the storage tree
///
/// Never mutates the ledger or the tree. The directory walk runs on the blocking
/// thread pool.
pub async fn validate(
    ledger: &ProgressLedger,
    snapshot: &EnumerationSnapshot,
    root: &Path,
    namer: &DirectoryNamer,
) -> Result<ValidationReport> {
    let audited = ledger.clone();
    let root_owned = root.to_path_buf();
    let namer_owned = namer.clone();
    let validation_results =
        tokio::task::spawn_blocking(move || classify(&audited, &root_owned, &namer_owned))
            .await
            .map_err(|e| Error::Other(format!("validation task failed: {e}")))?;

    let index = snapshot.index();
    let failed_details = ledger
        .failed()
        .iter()
        .filter_map(|id| index.get(id).map(|speech| (*speech).clone()))
        .collect();

    tracing::info!(
        root = %root.display(),
        verified = validation_results.verified.len(),
        missing_files = validation_results.missing_files.len(),
        not_found = validation_results.not_found.len(),
        "Validation complete"
    );

    Ok(ValidationReport {
        timestamp: chrono::Local::now()
            .format(REPORT_TIMESTAMP_FORMAT)
            .to_string(),
        validation_results,
        failed_details,
    })
}

/// Records whose directories already hold metadata and a non-empty archive
///
/// Used to adopt downloads that predate the ledger. Inside the shared error bucket
/// only per-record metadata files (`{suffix}.metadata.json`) are considered.
pub async fn discover_completed(root: &Path, namer: &DirectoryNamer) -> Result<Vec<Speech>> {
    let root = root.to_path_buf();
    let namer = namer.clone();
    tokio::task::spawn_blocking(move || scan_completed(&root, &namer))
        .await
        .map_err(|e| Error::Other(format!("storage scan task failed: {e}")))
}

fn scan_completed(root: &Path, namer: &DirectoryNamer) -> Vec<Speech> {
    if !root.is_dir() {
        return Vec::new();
    }

    let mut found = Vec::new();
    for entry in WalkDir::new(root)
        .min_depth(2)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| entry.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }
        let Some(directory) = entry.path().parent() else {
            continue;
        };
        let name = entry.file_name().to_string_lossy();
        let is_metadata = if is_error_bucket(directory) {
            name.ends_with(BUCKET_METADATA_SUFFIX)
        } else {
            name == METADATA_FILE
        };
        if !is_metadata {
            continue;
        }

        let speech: Speech = match std::fs::read(entry.path())
            .map_err(|e| e.to_string())
            .and_then(|bytes| serde_json::from_slice(&bytes).map_err(|e| e.to_string()))
        {
            Ok(speech) => speech,
            Err(reason) => {
                tracing::warn!(
                    path = %entry.path().display(),
                    reason = %reason,
                    "Ignoring unreadable metadata"
                );
                continue;
            }
        };

        match check_directory(directory, namer, speech.id()) {
            Verdict::Verified => found.push(speech),
            _ => tracing::debug!(
                speech_id = %speech.id(),
                directory = %directory.display(),
                "Existing directory is incomplete, not adopting"
            ),
        }
    }
    found
}

/// Identities moved from `downloaded` to `failed` by [`repair_ledger`]
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RepairSummary {
    /// Demoted identities
    pub demoted: Vec<SpeechId>,
}

/// Demote every identity the report could not verify so a retry re-fetches it
///
/// Identities the ledger no longer marks downloaded are left alone.
pub async fn repair_ledger(ledger: &SharedLedger, report: &ValidationReport) -> Result<RepairSummary> {
    let current = ledger.snapshot().await;
    let demoted: Vec<SpeechId> = report
        .validation_results
        .discrepancies()
        .filter(|id| current.is_downloaded(id))
        .cloned()
        .collect();

    ledger
        .record_all(demoted.iter().map(|id| (id.clone(), LedgerState::Failed)))
        .await?;

    if !demoted.is_empty() {
        tracing::info!(demoted = demoted.len(), "Repaired ledger from validation report");
    }
    Ok(RepairSummary { demoted })
}
