//! HTTP implementation of the enumeration and content capabilities

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::path::Path;
use tokio::io::AsyncWriteExt;
use url::Url;

use super::{ContentFetcher, EnumerationClient, Session};
use crate::config::ApiConfig;
use crate::error::{Error, Result};
use crate::naming::ARCHIVE_EXTENSION;
use crate::types::{Cursor, Page, PageRequest, RawSpeech, SpeechId};
use crate::utils::sibling_with_suffix;

const REFERER: &str = "https://otter.ai/";

#[derive(Debug, Deserialize)]
struct SpeechesResponse {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    speeches: Option<Vec<RawSpeech>>,
    #[serde(default)]
    last_load_ts: Option<Value>,
    #[serde(default)]
    end_of_list: Option<bool>,
}

impl From<SpeechesResponse> for Page {
    fn from(response: SpeechesResponse) -> Self {
        Page {
            speeches: response.speeches.unwrap_or_default(),
            next_cursor: response.last_load_ts.as_ref().and_then(Cursor::from_json),
            end_of_list: response.end_of_list.unwrap_or(false),
            status: response.status,
        }
    }
}

/// Client for the speeches HTTP API
///
/// Listing: `GET {base}speeches`. Content: `POST {base}bulk_export`, which answers
/// with a zip archive of the requested formats.
#[derive(Clone, Debug)]
pub struct HttpClient {
    http: reqwest::Client,
    base_url: Url,
    client_version: String,
    session: Session,
}

impl HttpClient {
    /// Create a client for the API described by `config`
    pub fn new(config: &ApiConfig, session: Session) -> Result<Self> {
        let mut base = config.base_url.clone();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base_url = Url::parse(&base).map_err(|e| Error::Config {
            message: format!("invalid base_url '{}': {}", config.base_url, e),
            key: Some("base_url".to_string()),
        })?;

        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            http,
            base_url,
            client_version: config.client_version.clone(),
            session,
        })
    }

    fn endpoint(&self, name: &str) -> Result<Url> {
        self.base_url
            .join(name)
            .map_err(|e| Error::Other(format!("cannot build URL for {name}: {e}")))
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let mut request = request
            .header("x-client-version", &self.client_version)
            .header("referer", REFERER);
        if let Some(token) = self.session.csrf_token() {
            request = request.header("x-csrftoken", token);
        }
        if let Some(cookies) = self.session.cookie_header() {
            request = request.header("cookie", cookies);
        }
        request
    }

    async fn send(&self, request: reqwest::RequestBuilder, url: &Url) -> Result<reqwest::Response> {
        let response = request.send().await.map_err(|e| {
            let message = if e.is_timeout() {
                format!("timeout requesting {url}")
            } else if e.is_connect() {
                format!("connection failed for {url}: {e}")
            } else {
                format!("request to {url} failed: {e}")
            };
            Error::transport(message)
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Transport {
                message: format!("HTTP {status} from {url}"),
                status: Some(status.as_u16()),
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl EnumerationClient for HttpClient {
    async fn fetch_page(&self, request: &PageRequest<'_>) -> Result<Page> {
        let url = self.endpoint("speeches")?;

        let mut query: Vec<(&str, String)> = vec![
            ("userid", self.session.user_id().to_string()),
            ("folder", request.folder.to_string()),
            ("page_size", request.page_size.to_string()),
            ("source", request.source.to_string()),
            ("speech_metadata", "true".to_string()),
        ];
        if let Some(cursor) = request.cursor {
            query.push(("last_load_ts", cursor.as_str().to_string()));
            query.push(("modified_after", chrono::Utc::now().timestamp().to_string()));
        }

        tracing::debug!(url = %url, cursor = ?request.cursor.map(Cursor::as_str), "Requesting page");
        let response = self
            .send(self.authorize(self.http.get(url.clone()).query(&query)), &url)
            .await?;

        let body = response
            .bytes()
            .await
            .map_err(|e| Error::transport(format!("failed to read page body from {url}: {e}")))?;
        let decoded: SpeechesResponse = serde_json::from_slice(&body)
            .map_err(|e| Error::Protocol(format!("undecodable speeches page: {e}")))?;

        Ok(decoded.into())
    }
}

#[async_trait]
impl ContentFetcher for HttpClient {
    async fn fetch(
        &self,
        content_id: &SpeechId,
        destination_base: &Path,
        formats: &[String],
    ) -> Result<()> {
        let url = self.endpoint("bulk_export")?;
        let form = [
            ("formats", formats.join(",")),
            ("speech_otid_list", content_id.to_string()),
        ];

        let request = self
            .http
            .post(url.clone())
            .query(&[("userid", self.session.user_id())])
            .form(&form);
        let mut response = self.send(self.authorize(request), &url).await?;

        let archive = sibling_with_suffix(destination_base, ARCHIVE_EXTENSION);
        let partial = sibling_with_suffix(&archive, "part");
        let saved = match save_stream(&mut response, &partial, content_id).await {
            Ok(written) => tokio::fs::rename(&partial, &archive)
                .await
                .map(|()| written)
                .map_err(|e| Error::filesystem(&archive, e)),
            Err(e) => Err(e),
        };
        let written = match saved {
            Ok(written) => written,
            Err(e) => {
                let _ = tokio::fs::remove_file(&partial).await;
                return Err(e);
            }
        };

        tracing::debug!(
            content_id = %content_id,
            path = %archive.display(),
            bytes = written,
            "Saved content archive"
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

/// Stream the response body into `partial`, returning the byte count
async fn save_stream(
    response: &mut reqwest::Response,
    partial: &Path,
    content_id: &SpeechId,
) -> Result<u64> {
    let mut file = tokio::fs::File::create(partial)
        .await
        .map_err(|e| Error::filesystem(partial, e))?;

    let mut written: u64 = 0;
    while let Some(chunk) = response.chunk().await.map_err(|e| {
        Error::transport(format!("archive stream for {content_id} interrupted: {e}"))
    })? {
        file.write_all(&chunk)
            .await
            .map_err(|e| Error::filesystem(partial, e))?;
        written += chunk.len() as u64;
    }
    file.sync_all()
        .await
        .map_err(|e| Error::filesystem(partial, e))?;
    Ok(written)
}
