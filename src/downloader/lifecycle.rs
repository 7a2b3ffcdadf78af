//! Cancellation and shutdown.

use tokio_util::sync::CancellationToken;

use super::SpeechDownloader;

impl SpeechDownloader {
    /// Request a graceful stop
    ///
    /// Records already in flight finish and are persisted to the ledger; no new
    /// record is started and enumeration stops before the next page. Idempotent.
    pub fn shutdown(&self) {
        if !self.cancel.is_cancelled() {
            tracing::info!("Initiating graceful shutdown");
        }
        self.cancel.cancel();
    }

    /// Whether `shutdown()` has been requested
    pub fn is_shutting_down(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Token fired by `shutdown()`, for callers that run their own work alongside
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }
}
