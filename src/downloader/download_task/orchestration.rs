//! Download task orchestration -- the ordered steps for a single record.

use crate::downloader::SpeechDownloader;
use crate::error::DownloadError;
use crate::retry::with_backoff;
use crate::types::{RecordOutcome, Speech};
use crate::utils::write_json_atomic;

use super::context::{Attempt, prepare_directory};
use super::finalization::verify_archive;

impl SpeechDownloader {
    /// Resolve one record to an outcome
    ///
    /// Phases:
    /// 1. Derive the record directory and clear stale content
    /// 2. Write the metadata artifact
    /// 3. Fetch the content bundle (transient failures are retried with backoff)
    /// 4. Verify the archive exists and is non-empty
    ///
    /// Every failure becomes [`RecordOutcome::Failed`]; nothing here aborts a batch.
    pub(crate) async fn download_record(&self, speech: &Speech, attempt: Attempt) -> RecordOutcome {
        match self.try_download_record(speech, attempt).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(speech_id = %speech.id(), error = %e, "Download failed");
                RecordOutcome::Failed(e)
            }
        }
    }

    async fn try_download_record(
        &self,
        speech: &Speech,
        attempt: Attempt,
    ) -> Result<RecordOutcome, DownloadError> {
        let root = self.config.download_dir();
        let directory = self.namer.dir_path(root, speech);
        let suffix = self.namer.identity_suffix(speech.id());
        let base = self.namer.content_base(&directory, speech.id());
        let archive = directory.join(self.namer.archive_file_name(speech.id()));

        // Phase 1: Directory
        prepare_directory(root, &directory, &suffix, &archive, attempt).await?;

        // Phase 2: Metadata (per record inside the shared error bucket)
        let metadata = directory.join(self.namer.metadata_file_name(&directory, speech.id()));
        write_json_atomic(&metadata, speech)
            .await
            .map_err(|e| DownloadError::MetadataFailed {
                path: metadata.clone(),
                reason: e.to_string(),
            })?;

        // Phase 3: Content
        let content_id = speech.content_id();
        let formats = &self.config.download.formats;
        with_backoff(&self.config.download.retry, &self.cancel, || {
            self.fetcher.fetch(content_id, &base, formats)
        })
        .await
        .map_err(|e| DownloadError::FetchFailed {
            content_id: content_id.to_string(),
            reason: e.to_string(),
        })?;

        // Phase 4: Verification
        let bytes = verify_archive(&archive).await?;

        tracing::info!(
            speech_id = %speech.id(),
            directory = %directory.display(),
            bytes,
            "Downloaded record"
        );
        Ok(RecordOutcome::Downloaded { directory, bytes })
    }
}
