//! Retry logic with exponential backoff
//!
//! Content fetches hit the network once per record; a dropped connection or a busy
//! server should not turn into a `failed` ledger entry when a second attempt a few
//! seconds later would succeed. Enumeration pages are deliberately not retried.
//!
//! # Example
//!
//! ```no_run
//! use speech_dl::retry::{IsRetryable, with_backoff};
//! use speech_dl::config::RetryConfig;
//! use tokio_util::sync::CancellationToken;
//!
//! #[derive(Debug)]
//! enum MyError {
//!     Transient,
//!     Permanent,
//! }
//!
//! impl std::fmt::Display for MyError {
//!     fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
//!         write!(f, "{self:?}")
//!     }
//! }
//!
//! impl IsRetryable for MyError {
//!     fn is_retryable(&self) -> bool {
//!         matches!(self, MyError::Transient)
//!     }
//! }
//!
//! # async fn example() -> Result<(), MyError> {
//! let config = RetryConfig::default();
//! let cancel = CancellationToken::new();
//! with_backoff(&config, &cancel, || async {
//!     // Your operation here
//!     Ok::<_, MyError>(())
//! }).await?;
//! # Ok(())
//! # }
//! ```

use crate::config::RetryConfig;
use crate::error::Error;
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Trait for errors that can be classified as retryable or not
///
/// Transient failures (timeouts, refused connections, 5xx answers) return `true`.
/// Permanent failures (bad request, missing record, expired session, disk errors)
/// return `false`.
pub trait IsRetryable {
    /// Returns true if the error is transient and the operation should be retried
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for Error {
    fn is_retryable(&self) -> bool {
        match self {
            // No status means the server was never reached or the stream broke
            Error::Transport { status: None, .. } => true,
            // Server-side trouble and rate limiting clear up on their own
            Error::Transport {
                status: Some(status),
                ..
            } => *status >= 500 || *status == 429 || *status == 408,
            Error::Network(e) => e.is_timeout() || e.is_connect(),
            Error::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::ConnectionRefused
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::NotConnected
                    | std::io::ErrorKind::BrokenPipe
                    | std::io::ErrorKind::Interrupted
            ),
            Error::Protocol(_) => false,
            // Local disk problems do not fix themselves between attempts
            Error::Filesystem { .. } => false,
            Error::Config { .. }
            | Error::CorruptState { .. }
            | Error::MissingInput { .. }
            | Error::Download(_)
            | Error::Serialization(_)
            | Error::Interrupted
            | Error::Other(_) => false,
        }
    }
}

/// Delay schedule between attempts
///
/// Starts at `initial_delay`, grows by `backoff_multiplier` after every retry and
/// never exceeds `max_delay`. Jitter is applied to each delay handed out, not to the
/// schedule itself.
struct Backoff<'a> {
    config: &'a RetryConfig,
    next: Duration,
}

impl<'a> Backoff<'a> {
    fn new(config: &'a RetryConfig) -> Self {
        Self {
            config,
            next: config.initial_delay.min(config.max_delay),
        }
    }

    fn next_delay(&mut self) -> Duration {
        let base = self.next;
        self.next = Duration::try_from_secs_f64(base.as_secs_f64() * self.config.backoff_multiplier)
            .map_or(self.config.max_delay, |grown| grown.min(self.config.max_delay));
        if self.config.jitter {
            add_jitter(base)
        } else {
            base
        }
    }
}

/// Run `operation`, retrying transient failures with exponential backoff
///
/// The operation runs at most `1 + config.max_attempts` times. Non-retryable errors
/// are returned immediately. A backoff wait ends early when `cancel` fires, returning
/// the last error without another attempt.
pub async fn with_backoff<F, Fut, T, E>(
    config: &RetryConfig,
    cancel: &CancellationToken,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: IsRetryable + std::fmt::Display,
{
    let mut backoff = Backoff::new(config);
    let mut retries = 0;

    loop {
        let error = match operation().await {
            Ok(value) => {
                if retries > 0 {
                    tracing::info!(attempts = retries + 1, "Succeeded after retry");
                }
                return Ok(value);
            }
            Err(e) => e,
        };

        if !error.is_retryable() {
            tracing::debug!(error = %error, "Permanent failure, not retrying");
            return Err(error);
        }
        if retries >= config.max_attempts {
            tracing::warn!(error = %error, attempts = retries + 1, "Retries exhausted");
            return Err(error);
        }

        retries += 1;
        let delay = backoff.next_delay();
        tracing::warn!(
            error = %error,
            retry = retries,
            max_attempts = config.max_attempts,
            delay_ms = delay.as_millis() as u64,
            "Transient failure, backing off"
        );

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::info!(retry = retries, "Shutdown requested, abandoning retry");
                return Err(error);
            }
            _ = tokio::time::sleep(delay) => {}
        }
    }
}

/// Add random jitter to a delay to prevent thundering herd
///
/// The result lies between `delay` and `2 * delay`.
fn add_jitter(delay: Duration) -> Duration {
    let mut rng = rand::thread_rng();
    let jitter_factor: f64 = rng.gen_range(0.0..=1.0);
    Duration::from_secs_f64(delay.as_secs_f64() * (1.0 + jitter_factor))
}
