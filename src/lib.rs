//! # speech-dl
//!
//! Resumable enumerate-then-download archiver for a remote speech collection.
//!
//! ## Design Philosophy
//!
//! speech-dl is designed to be:
//! - **Resumable** - Every outcome is persisted before the next one, so any run can
//!   be interrupted and re-invoked
//! - **Auditable** - A validation pass compares the ledger against the storage tree
//! - **Library-first** - Transport and credentials are injected capabilities
//! - **Event-driven** - Consumers subscribe to progress events, no polling required
//!
//! ## Pipeline
//!
//! 1. Enumerate the collection page by page into a snapshot file
//! 2. Download each record not yet resolved by the progress ledger into its own
//!    directory (metadata plus a content archive)
//! 3. Retry failed records, validate the storage tree, analyze failures
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use speech_dl::{Config, HttpClient, Session, SpeechDownloader, run_until_interrupted};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::default();
//!     let client = Arc::new(HttpClient::new(&config.api, Session::new("12345"))?);
//!     let downloader = SpeechDownloader::new(config, client.clone()).await?;
//!
//!     let summary = run_until_interrupted(&downloader, downloader.download_all(client.as_ref())).await?;
//!     println!("{} downloaded, {} failed", summary.succeeded.len(), summary.failed.len());
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Remote service capabilities and the HTTP implementation
pub mod client;
/// Configuration types
pub mod config;
/// Orchestrator (decomposed into focused submodules)
pub mod downloader;
/// Paginated enumeration
pub mod enumerator;
/// Error types
pub mod error;
/// Persistent download progress
pub mod ledger;
/// Storage directory naming
pub mod naming;
/// Failure analysis
pub mod reports;
/// Retry logic with exponential backoff
pub mod retry;
/// Persisted enumeration result
pub mod snapshot;
/// Core types and events
pub mod types;
/// Utility functions
pub mod utils;
/// Storage audit and ledger repair
pub mod validation;

// Re-export commonly used types
pub use client::{ContentFetcher, EnumerationClient, HttpClient, Session};
pub use config::Config;
pub use downloader::SpeechDownloader;
pub use enumerator::{AlwaysContinue, PageGate};
pub use error::{DownloadError, Error, Result, ToExitCode, exit_code_for};
pub use types::{Event, LedgerState, Speech, SpeechId, Summary};

/// Run `operation` with graceful signal handling.
///
/// On a termination signal the downloader's `shutdown()` is called and the
/// operation is allowed to reach its next record or page boundary. Download runs
/// then return their partial [`Summary`] with `interrupted` set; everything else
/// returns [`Error::Interrupted`].
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use speech_dl::{Config, HttpClient, Session, SpeechDownloader, run_until_interrupted};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = Config::default();
///     let client = Arc::new(HttpClient::new(&config.api, Session::new("12345"))?);
///     let downloader = SpeechDownloader::new(config, client).await?;
///
///     let summary = run_until_interrupted(&downloader, downloader.retry_failed()).await?;
///     if summary.interrupted {
///         println!("interrupted, re-run to continue");
///     }
///     Ok(())
/// }
/// ```
pub async fn run_until_interrupted<F, T>(downloader: &SpeechDownloader, operation: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::pin!(operation);
    tokio::select! {
        result = &mut operation => result,
        _ = wait_for_signal() => {
            downloader.shutdown();
            tracing::info!("Shutdown requested, waiting for the current step to finish");
            operation.await
        }
    }
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Set up signal handlers - these may fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), _) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            if let Ok(mut sigint) = signal(SignalKind::interrupt()) {
                sigint.recv().await;
                tracing::info!("Received SIGINT signal (Ctrl+C)");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
        (_, Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                sigterm.recv().await;
                tracing::info!("Received SIGTERM signal");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
