//! Archive verification -- the last step of the success criterion.

use std::path::Path;

use crate::error::DownloadError;

/// Size of the archive at `archive`, or why it does not count as downloaded
///
/// A fetch that returned success is not enough: the archive must exist and be
/// non-empty.
pub(super) async fn verify_archive(archive: &Path) -> Result<u64, DownloadError> {
    match tokio::fs::metadata(archive).await {
        Ok(meta) if meta.is_file() && meta.len() > 0 => Ok(meta.len()),
        Ok(meta) if meta.is_file() => Err(DownloadError::ArtifactEmpty {
            path: archive.to_path_buf(),
        }),
        _ => Err(DownloadError::ArtifactMissing {
            path: archive.to_path_buf(),
        }),
    }
}
