//! Core types for speech-dl

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::PathBuf;

use crate::error::{DownloadError, Error};

/// Title used when a record carries none
pub const UNTITLED: &str = "Untitled";

/// Unique identifier of a remote record (the list id)
///
/// Deduplication and every ledger operation key on this value.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SpeechId(String);

impl SpeechId {
    /// Create a new SpeechId
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the inner string value
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SpeechId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for SpeechId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl AsRef<str> for SpeechId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl PartialEq<&str> for SpeechId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

impl std::fmt::Display for SpeechId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque pagination token issued by the enumeration source (`last_load_ts`)
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cursor(String);

impl Cursor {
    /// Wrap a server-issued token; empty tokens are treated as absent
    pub fn new(token: impl Into<String>) -> Option<Self> {
        let token = token.into();
        if token.trim().is_empty() {
            None
        } else {
            Some(Self(token))
        }
    }

    /// Interpret a JSON cursor value; servers send either numbers or strings
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Self::new(s.clone()),
            Value::Number(n) => Self::new(n.to_string()),
            _ => None,
        }
    }

    /// Get the token as sent back to the server
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// A record exactly as the remote service describes it
///
/// Every field is optional on the wire. Unknown fields are preserved in `extra` so the
/// metadata artifact is a full serialization of what was enumerated.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RawSpeech {
    /// List id used for enumeration and deduplication
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speech_id: Option<String>,

    /// Primary id used for addressing content
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub otid: Option<String>,

    /// Human title
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Creation time in epoch seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<i64>,

    /// Remaining fields, carried through untouched
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A validated, immutable record
///
/// Built once at enumeration time from a [`RawSpeech`]:
/// - identity is `speech_id`, falling back to `otid`
/// - content id is `otid`, falling back to `speech_id`
/// - title defaults to [`UNTITLED`], creation time to epoch 0
///
/// Serializes back to the raw wire shape.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawSpeech", into = "RawSpeech")]
pub struct Speech {
    id: SpeechId,
    content_id: SpeechId,
    raw: RawSpeech,
}

impl Speech {
    /// Create a record keyed by `speech_id` with no separate content id
    pub fn new(speech_id: impl Into<String>, title: Option<&str>, created_at: Option<i64>) -> Self {
        let speech_id = speech_id.into();
        Self {
            id: SpeechId::new(speech_id.clone()),
            content_id: SpeechId::new(speech_id.clone()),
            raw: RawSpeech {
                speech_id: Some(speech_id),
                otid: None,
                title: title.map(str::to_string),
                created_at,
                extra: Map::new(),
            },
        }
    }

    /// Set the content-addressing id
    #[must_use]
    pub fn with_otid(mut self, otid: impl Into<String>) -> Self {
        let otid = otid.into();
        self.content_id = SpeechId::new(otid.clone());
        self.raw.otid = Some(otid);
        self
    }

    /// Identity (list id)
    pub fn id(&self) -> &SpeechId {
        &self.id
    }

    /// Content-addressing id handed to the content fetcher
    pub fn content_id(&self) -> &SpeechId {
        &self.content_id
    }

    /// Title, or [`UNTITLED`] when absent or blank
    pub fn title(&self) -> &str {
        match self.raw.title.as_deref().map(str::trim) {
            Some(title) if !title.is_empty() => title,
            _ => UNTITLED,
        }
    }

    /// Creation time in epoch seconds, 0 when absent
    pub fn created_at(&self) -> i64 {
        self.raw.created_at.unwrap_or(0)
    }

    /// The record as enumerated
    pub fn raw(&self) -> &RawSpeech {
        &self.raw
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

impl TryFrom<RawSpeech> for Speech {
    type Error = Error;

    fn try_from(raw: RawSpeech) -> Result<Self, Self::Error> {
        let list_id = non_empty(&raw.speech_id);
        let primary_id = non_empty(&raw.otid);

        let (id, content_id) = match (list_id, primary_id) {
            (Some(list), Some(primary)) => (list, primary),
            (Some(list), None) => (list, list),
            (None, Some(primary)) => (primary, primary),
            (None, None) => {
                return Err(Error::Protocol(
                    "record has neither speech_id nor otid".to_string(),
                ));
            }
        };

        Ok(Self {
            id: SpeechId::new(id),
            content_id: SpeechId::new(content_id),
            raw,
        })
    }
}

impl From<Speech> for RawSpeech {
    fn from(speech: Speech) -> Self {
        speech.raw
    }
}

/// Parameters for a single page request
#[derive(Clone, Debug)]
pub struct PageRequest<'a> {
    /// Cursor returned by the previous page (None for the first page)
    pub cursor: Option<&'a Cursor>,
    /// Records requested per page
    pub page_size: u32,
    /// Source scope
    pub source: &'a str,
    /// Folder scope
    pub folder: i64,
}

/// One page of the remote listing
#[derive(Clone, Debug, Default)]
pub struct Page {
    /// Records in source order
    pub speeches: Vec<RawSpeech>,
    /// Cursor for the next page, if the server issued one
    pub next_cursor: Option<Cursor>,
    /// Server-signalled end of the listing
    pub end_of_list: bool,
    /// Response status string; anything but "OK" is a protocol error
    pub status: Option<String>,
}

impl Page {
    /// Status value the service uses for success
    pub const STATUS_OK: &'static str = "OK";

    /// Whether the response carried a success status
    pub fn is_ok(&self) -> bool {
        self.status.as_deref() == Some(Self::STATUS_OK)
    }
}

/// Resolution state of one identity in the progress ledger
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LedgerState {
    /// Not yet attempted
    Pending,
    /// Content verified on disk
    Downloaded,
    /// Last attempt failed
    Failed,
}

/// Result of the per-record download procedure
#[derive(Debug)]
pub enum RecordOutcome {
    /// Metadata written and a non-empty archive verified
    Downloaded {
        /// Record directory
        directory: PathBuf,
        /// Size of the content archive
        bytes: u64,
    },
    /// Any step failed
    Failed(DownloadError),
}

impl RecordOutcome {
    /// Ledger state this outcome transitions the identity to
    pub fn ledger_state(&self) -> LedgerState {
        match self {
            RecordOutcome::Downloaded { .. } => LedgerState::Downloaded,
            RecordOutcome::Failed(_) => LedgerState::Failed,
        }
    }
}

/// Counts for one orchestrator or retry run
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    /// Identities downloaded in this run, in completion order
    pub succeeded: Vec<SpeechId>,
    /// Identities that failed in this run, in completion order
    pub failed: Vec<SpeechId>,
    /// Records skipped because the ledger already resolved them
    pub skipped: usize,
    /// Whether the run stopped early because of cancellation
    pub interrupted: bool,
}

impl Summary {
    /// Records attempted in this run
    pub fn attempted(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }
}

/// Events emitted while enumerating and downloading
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// One enumeration page processed
    PageFetched {
        /// 1-based page number
        page: usize,
        /// Records on the page not seen before
        new_records: usize,
        /// Unique records so far
        total_unique: usize,
    },

    /// Enumeration finished
    EnumerationComplete {
        /// Unique records enumerated
        total: usize,
        /// Pages requested
        pages: usize,
    },

    /// A record download is starting
    DownloadStarted {
        /// Record identity
        id: SpeechId,
        /// Record directory
        directory: PathBuf,
    },

    /// A record was downloaded and recorded
    Downloaded {
        /// Record identity
        id: SpeechId,
        /// Record directory
        directory: PathBuf,
        /// Archive size
        bytes: u64,
    },

    /// A record failed and was recorded
    DownloadFailed {
        /// Record identity
        id: SpeechId,
        /// Error message
        error: String,
    },

    /// A download or retry run finished
    RunComplete {
        /// Records downloaded in this run
        succeeded: usize,
        /// Records failed in this run
        failed: usize,
        /// Records already resolved
        skipped: usize,
    },

    /// The run stopped at a record boundary because of cancellation
    Interrupted {
        /// Records left unattempted
        remaining: usize,
    },
}
