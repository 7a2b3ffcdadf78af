//! Capabilities the orchestrator consumes from the remote service
//!
//! ## Architecture
//!
//! Two traits separate the pipeline from the transport:
//!
//! - [`EnumerationClient`]: fetches one page of the listing
//! - [`ContentFetcher`]: downloads one record's content bundle to disk
//!
//! [`HttpClient`] implements both against the speeches HTTP API using an
//! authenticated [`Session`]. Tests and alternative transports provide their own
//! implementations.
//!
//! ## Usage
//!
//! ```no_run
//! use speech_dl::client::{HttpClient, Session};
//! use speech_dl::config::ApiConfig;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let session = Session::new("12345")
//!     .with_csrf_token("token")
//!     .with_cookie_header("csrftoken=token; sessionid=abc");
//! let client = HttpClient::new(&ApiConfig::default(), session)?;
//! # Ok(())
//! # }
//! ```

mod http;

pub use http::HttpClient;

use async_trait::async_trait;
use std::path::Path;

use crate::types::{Page, PageRequest, SpeechId};

/// An authenticated session with the remote service
///
/// Obtaining one (credential loading, login handshake) happens outside this crate;
/// the session is handed to [`HttpClient`] explicitly instead of living in global state.
#[derive(Clone)]
pub struct Session {
    user_id: String,
    csrf_token: Option<String>,
    cookie_header: Option<String>,
}

impl Session {
    /// Create a session for `user_id`
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            csrf_token: None,
            cookie_header: None,
        }
    }

    /// Set the CSRF token sent as `x-csrftoken`
    #[must_use]
    pub fn with_csrf_token(mut self, token: impl Into<String>) -> Self {
        self.csrf_token = Some(token.into());
        self
    }

    /// Set the raw `cookie` header value
    #[must_use]
    pub fn with_cookie_header(mut self, cookies: impl Into<String>) -> Self {
        self.cookie_header = Some(cookies.into());
        self
    }

    /// The authenticated user id
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub(crate) fn csrf_token(&self) -> Option<&str> {
        self.csrf_token.as_deref()
    }

    pub(crate) fn cookie_header(&self) -> Option<&str> {
        self.cookie_header.as_deref()
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("user_id", &self.user_id)
            .field("csrf_token", &self.csrf_token.as_ref().map(|_| "<redacted>"))
            .field("cookie_header", &self.cookie_header.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Paged listing of remote records
#[async_trait]
pub trait EnumerationClient: Send + Sync {
    /// Fetch the page after `request.cursor` (the first page when it is None)
    ///
    /// # Errors
    ///
    /// - [`Error::Transport`](crate::Error::Transport) if the request fails
    /// - [`Error::Protocol`](crate::Error::Protocol) if the response cannot be decoded
    ///
    /// A non-OK `status` in a decoded page is reported through [`Page::status`] and
    /// checked by the caller.
    async fn fetch_page(&self, request: &PageRequest<'_>) -> crate::Result<Page>;
}

/// Download of one record's content bundle
#[async_trait]
pub trait ContentFetcher: Send + Sync {
    /// Download the bundle for `content_id` in `formats` to `destination_base` + ".zip"
    ///
    /// Success only means the call returned; the caller verifies the archive exists
    /// and is non-empty.
    async fn fetch(
        &self,
        content_id: &SpeechId,
        destination_base: &Path,
        formats: &[String],
    ) -> crate::Result<()>;

    /// Human-readable name for logging
    fn name(&self) -> &'static str;
}
