//! Directory preparation for a single record.

use std::path::Path;

use crate::error::DownloadError;
use crate::naming::{dir_name_suffix, is_error_bucket};

/// Which kind of attempt a record download is
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Attempt {
    /// First attempt for a pending record; an existing directory is reused
    First,
    /// Retry of a failed record; whatever a previous attempt left behind is discarded
    Retry,
}

/// Create the record directory, discarding stale content first
///
/// The record's own archive is always removed so a fetch that silently produces
/// nothing cannot be verified against a leftover file. On retry the whole record
/// directory is recreated, except for the shared error bucket, which only loses
/// this record's archive. A retry also removes directories left under `root` by
/// earlier attempts under another title (same identity `suffix`).
pub(super) async fn prepare_directory(
    root: &Path,
    directory: &Path,
    suffix: &str,
    archive: &Path,
    attempt: Attempt,
) -> Result<(), DownloadError> {
    let failed = |reason: String| DownloadError::DirectoryFailed {
        path: directory.to_path_buf(),
        reason,
    };

    if attempt == Attempt::Retry {
        remove_other_attempts(root, directory, suffix)
            .await
            .map_err(|e| failed(format!("cannot clear earlier attempts: {e}")))?;
    }

    if attempt == Attempt::Retry && !is_error_bucket(directory) {
        match tokio::fs::remove_dir_all(directory).await {
            Ok(()) => {
                tracing::debug!(directory = %directory.display(), "Cleared previous attempt");
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(failed(format!("cannot clear previous attempt: {e}"))),
        }
    }

    tokio::fs::create_dir_all(directory)
        .await
        .map_err(|e| failed(e.to_string()))?;

    match tokio::fs::remove_file(archive).await {
        Ok(()) => {
            tracing::debug!(archive = %archive.display(), "Removed stale archive");
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(failed(format!("cannot remove stale archive: {e}"))),
    }
}

async fn remove_other_attempts(root: &Path, keep: &Path, suffix: &str) -> std::io::Result<()> {
    let mut entries = match tokio::fs::read_dir(root).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e),
    };

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path == keep || is_error_bucket(&path) || !entry.file_type().await?.is_dir() {
            continue;
        }
        let owned_by_record = entry
            .file_name()
            .to_str()
            .and_then(dir_name_suffix)
            .is_some_and(|found| found == suffix);
        if owned_by_record {
            tokio::fs::remove_dir_all(&path).await?;
            tracing::debug!(directory = %path.display(), "Removed directory of an earlier attempt");
        }
    }
    Ok(())
}
