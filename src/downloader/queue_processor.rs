//! Batch processing -- resolves every pending record and records each outcome.

use futures::StreamExt;

use crate::error::Result;
use crate::ledger::SharedLedger;
use crate::types::{Event, LedgerState, RecordOutcome, Speech, SpeechId, Summary};

use super::{Attempt, SpeechDownloader};

impl SpeechDownloader {
    /// Download every record the ledger has not resolved yet
    ///
    /// Records in `downloaded` or `failed` are skipped, so re-running with the same
    /// snapshot and ledger only attempts what is still pending. Each outcome is
    /// persisted before the next record's outcome can be recorded.
    ///
    /// # Errors
    ///
    /// Only a ledger that cannot be persisted aborts the batch; per-record failures
    /// end up in [`Summary::failed`].
    pub async fn download_records(&self, speeches: &[Speech], ledger: &SharedLedger) -> Result<Summary> {
        let current = ledger.snapshot().await;
        let (resolved, pending): (Vec<&Speech>, Vec<&Speech>) = speeches
            .iter()
            .partition(|speech| current.is_resolved(speech.id()));

        tracing::info!(
            total = speeches.len(),
            pending = pending.len(),
            already_resolved = resolved.len(),
            "Starting download run"
        );

        self.process_records(pending, resolved.len(), ledger, Attempt::First)
            .await
    }

    /// Run the per-record procedure over `records` with bounded concurrency
    ///
    /// Cancellation is checked before each record starts; a cancelled run returns
    /// normally with [`Summary::interrupted`] set.
    pub(crate) async fn process_records(
        &self,
        records: Vec<&Speech>,
        skipped: usize,
        ledger: &SharedLedger,
        attempt: Attempt,
    ) -> Result<Summary> {
        let total = records.len();
        let concurrency = self.config.download.max_concurrent_downloads.max(1);

        let mut outcomes = futures::stream::iter(records)
            .map(|speech| self.resolve_record(speech, ledger, attempt))
            .buffer_unordered(concurrency);

        let mut summary = Summary {
            skipped,
            ..Default::default()
        };
        while let Some(result) = outcomes.next().await {
            match result? {
                Some((id, LedgerState::Downloaded)) => summary.succeeded.push(id),
                Some((id, _)) => summary.failed.push(id),
                None => {}
            }
        }

        let remaining = total - summary.attempted();
        if remaining > 0 {
            summary.interrupted = true;
            tracing::warn!(
                remaining,
                "Run interrupted, remaining records stay pending"
            );
            self.emit_event(Event::Interrupted { remaining });
        }

        tracing::info!(
            succeeded = summary.succeeded.len(),
            failed = summary.failed.len(),
            skipped = summary.skipped,
            "Download run complete"
        );
        self.emit_event(Event::RunComplete {
            succeeded: summary.succeeded.len(),
            failed: summary.failed.len(),
            skipped: summary.skipped,
        });
        Ok(summary)
    }

    /// Download one record and persist its outcome; None if cancelled before starting
    async fn resolve_record(
        &self,
        speech: &Speech,
        ledger: &SharedLedger,
        attempt: Attempt,
    ) -> Result<Option<(SpeechId, LedgerState)>> {
        if self.cancel.is_cancelled() {
            return Ok(None);
        }

        let id = speech.id().clone();
        self.emit_event(Event::DownloadStarted {
            id: id.clone(),
            directory: self.namer.dir_path(self.config.download_dir(), speech),
        });

        let outcome = self.download_record(speech, attempt).await;
        let state = outcome.ledger_state();
        ledger.record(id.clone(), state).await?;

        match outcome {
            RecordOutcome::Downloaded { directory, bytes } => {
                self.emit_event(Event::Downloaded {
                    id: id.clone(),
                    directory,
                    bytes,
                });
            }
            RecordOutcome::Failed(e) => {
                self.emit_event(Event::DownloadFailed {
                    id: id.clone(),
                    error: e.to_string(),
                });
            }
        }
        Ok(Some((id, state)))
    }
}
