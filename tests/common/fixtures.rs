//! Fake capabilities and mock-server fixtures

use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, Mutex};
use wiremock::matchers::{body_string_contains, method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

use speech_dl::utils::sibling_with_suffix;
use speech_dl::{ContentFetcher, Error, Result, SpeechId};

/// Path of the listing endpoint under [`with_server`](super::with_server)
pub const SPEECHES_PATH: &str = "/forward/api/v1/speeches";
/// Path of the export endpoint under [`with_server`](super::with_server)
pub const EXPORT_PATH: &str = "/forward/api/v1/bulk_export";

/// Bytes served as a content archive
pub const ARCHIVE_BYTES: &[u8] = b"PK\x03\x04speech archive";

/// Wire record for `speech_id` with content id `otid`
pub fn record(speech_id: &str, otid: &str, title: &str, created_at: i64) -> Value {
    json!({
        "speech_id": speech_id,
        "otid": otid,
        "title": title,
        "created_at": created_at,
        "summary": format!("notes for {speech_id}")
    })
}

/// Serve `pages` in order. Page `n` (0-based) after the first is requested with
/// cursor `n`; the last page sets `end_of_list`.
pub async fn mount_listing(server: &MockServer, pages: Vec<Vec<Value>>) {
    let count = pages.len();
    for (i, speeches) in pages.into_iter().enumerate() {
        let body = json!({
            "status": "OK",
            "speeches": speeches,
            "last_load_ts": i + 1,
            "end_of_list": i + 1 == count
        });
        let mock = Mock::given(method("GET")).and(path(SPEECHES_PATH));
        let mock = if i == 0 {
            mock.and(query_param_is_missing("last_load_ts"))
        } else {
            mock.and(query_param("last_load_ts", i.to_string()))
        };
        mock.respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(server)
            .await;
    }
}

/// Answer exports of `otid` with an archive
pub async fn mount_export(server: &MockServer, otid: &str) {
    Mock::given(method("POST"))
        .and(path(EXPORT_PATH))
        .and(body_string_contains(format!("speech_otid_list={otid}")))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(ARCHIVE_BYTES.to_vec()))
        .mount(server)
        .await;
}

/// Answer the next `times` exports of `otid` with `status`, taking priority over
/// [`mount_export`]
pub async fn mount_export_failure(server: &MockServer, otid: &str, status: u16, times: u64) {
    Mock::given(method("POST"))
        .and(path(EXPORT_PATH))
        .and(body_string_contains(format!("speech_otid_list={otid}")))
        .respond_with(ResponseTemplate::new(status))
        .up_to_n_times(times)
        .with_priority(1)
        .mount(server)
        .await;
}

/// Content fetcher writing fixed archives, failing for selected content ids
pub struct FakeFetcher {
    failing: Mutex<HashSet<String>>,
    calls: Mutex<Vec<String>>,
}

impl FakeFetcher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            failing: Mutex::new(HashSet::new()),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn fail_for(&self, content_id: &str) {
        self.failing.lock().unwrap().insert(content_id.to_string());
    }

    pub fn heal(&self) {
        self.failing.lock().unwrap().clear();
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ContentFetcher for FakeFetcher {
    async fn fetch(
        &self,
        content_id: &SpeechId,
        destination_base: &Path,
        _formats: &[String],
    ) -> Result<()> {
        self.calls.lock().unwrap().push(content_id.to_string());
        if self.failing.lock().unwrap().contains(content_id.as_str()) {
            return Err(Error::Transport {
                message: format!("HTTP 500 for {content_id}"),
                status: Some(500),
            });
        }
        std::fs::write(sibling_with_suffix(destination_base, "zip"), ARCHIVE_BYTES)?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "fake"
    }
}
