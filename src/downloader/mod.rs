//! Core downloader implementation split into focused submodules.
//!
//! The `SpeechDownloader` struct and its methods are organized by concern:
//! - [`commands`] - One entry point per operation (enumerate, download, validate, ...)
//! - [`queue_processor`] - The batch loop that resolves pending records
//! - [`retry_failed`] - Re-running the batch loop over the ledger's failures
//! - [`download_task`] - The per-record download procedure
//! - [`lifecycle`] - Cancellation and shutdown

mod commands;
mod download_task;
mod lifecycle;
mod queue_processor;
mod retry_failed;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

pub(crate) use download_task::Attempt;

use std::sync::Arc;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::client::ContentFetcher;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::naming::DirectoryNamer;
use crate::types::Event;

/// Main downloader instance (cloneable - all shared state is Arc-wrapped)
///
/// Owns the configuration, the content capability and the cancellation token. The
/// enumeration capability is passed per call because only some operations need it.
#[derive(Clone)]
pub struct SpeechDownloader {
    /// Configuration (wrapped in Arc for sharing across tasks)
    pub(crate) config: Arc<Config>,
    /// Content capability used for every record download
    pub(crate) fetcher: Arc<dyn ContentFetcher>,
    /// Directory naming derived from the configured bound
    pub(crate) namer: DirectoryNamer,
    /// Event broadcast channel sender (multiple subscribers supported)
    pub(crate) event_tx: broadcast::Sender<Event>,
    /// Fired by `shutdown()`; checked between records and between pages
    pub(crate) cancel: CancellationToken,
}

impl SpeechDownloader {
    /// Create a new SpeechDownloader instance
    ///
    /// Validates the configuration and creates the storage root.
    ///
    /// # Errors
    ///
    /// [`Error::Config`] for unusable settings and [`Error::Filesystem`] if the
    /// storage root cannot be created.
    pub async fn new(config: Config, fetcher: Arc<dyn ContentFetcher>) -> Result<Self> {
        config.validate()?;

        tokio::fs::create_dir_all(config.download_dir())
            .await
            .map_err(|e| Error::filesystem(config.download_dir(), e))?;

        // Buffer of 1000 events per subscriber before lagging
        let (event_tx, _rx) = broadcast::channel(1000);

        tracing::info!(
            download_dir = %config.download_dir().display(),
            fetcher = fetcher.name(),
            max_concurrent = config.download.max_concurrent_downloads,
            "Speech downloader initialized"
        );

        Ok(Self {
            namer: DirectoryNamer::new(config.download.max_dir_name_len),
            config: Arc::new(config),
            fetcher,
            event_tx,
            cancel: CancellationToken::new(),
        })
    }

    /// Subscribe to progress events
    ///
    /// Multiple subscribers are supported. Each subscriber receives all events independently.
    /// Events are buffered, but if a subscriber falls behind by more than 1000 events,
    /// it will receive a `RecvError::Lagged` error.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use std::sync::Arc;
    /// use speech_dl::{Config, HttpClient, Session, SpeechDownloader};
    ///
    /// #[tokio::main]
    /// async fn main() -> Result<(), Box<dyn std::error::Error>> {
    ///     let config = Config::default();
    ///     let client = Arc::new(HttpClient::new(&config.api, Session::new("12345"))?);
    ///     let downloader = SpeechDownloader::new(config, client).await?;
    ///
    ///     let mut events = downloader.subscribe();
    ///     tokio::spawn(async move {
    ///         while let Ok(event) = events.recv().await {
    ///             tracing::info!(?event, "progress");
    ///         }
    ///     });
    ///
    ///     Ok(())
    /// }
    /// ```
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Get the current configuration
    pub fn get_config(&self) -> Arc<Config> {
        Arc::clone(&self.config)
    }

    /// Directory naming used for every record
    pub fn namer(&self) -> &DirectoryNamer {
        &self.namer
    }

    /// Emit an event to all subscribers
    ///
    /// With no subscribers the event is dropped; progress reporting never blocks
    /// or fails a download.
    pub(crate) fn emit_event(&self, event: Event) {
        self.event_tx.send(event).ok();
    }
}
