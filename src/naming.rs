//! Deterministic storage locations for records
//!
//! A record directory is named `{YYYY-MM-DD}_{title}_{suffix}`:
//! - the date is the record's creation time in UTC
//! - the title keeps only alphanumerics, space, hyphen and underscore
//! - the suffix is the full identity when it is filesystem-safe and fits, otherwise a
//!   16-hex-digit SHA-256 prefix of it
//!
//! A suffix never contains `_`, so the text after the last `_` of a directory name is
//! exactly the identity suffix (see [`dir_name_suffix`]).
//!
//! Only the title is ever truncated, so two distinct identities never share a
//! directory, and the whole name never exceeds the configured byte bound.

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

use crate::config::DEFAULT_MAX_DIR_NAME_LEN;
use crate::types::{Speech, SpeechId, UNTITLED};

/// Metadata artifact written into every record directory
pub const METADATA_FILE: &str = "metadata.json";

/// Per-record metadata artifact name inside the shared error bucket is
/// `{suffix}` followed by this
pub const BUCKET_METADATA_SUFFIX: &str = ".metadata.json";

/// Shared directory used when no name can be derived for a record
pub const ERROR_BUCKET: &str = "error_downloads";

/// Extension the content fetcher appends to the destination base path
pub const ARCHIVE_EXTENSION: &str = "zip";

const HASH_SUFFIX_LEN: usize = 16;

/// Maps records to directory names under the storage root
#[derive(Clone, Debug)]
pub struct DirectoryNamer {
    max_len: usize,
}

impl Default for DirectoryNamer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_DIR_NAME_LEN)
    }
}

impl DirectoryNamer {
    /// Create a namer whose names never exceed `max_len` bytes
    pub fn new(max_len: usize) -> Self {
        Self { max_len }
    }

    /// Upper bound on derived names, in bytes
    pub fn max_len(&self) -> usize {
        self.max_len
    }

    /// Directory name for `speech`, or [`ERROR_BUCKET`] if none can be derived
    pub fn dir_name(&self, speech: &Speech) -> String {
        match self.derive(speech) {
            Ok(name) => name,
            Err(reason) => {
                tracing::warn!(
                    speech_id = %speech.id(),
                    reason = %reason,
                    "Cannot derive directory name, using shared error bucket"
                );
                ERROR_BUCKET.to_string()
            }
        }
    }

    /// Full directory path for `speech` under `root`
    pub fn dir_path(&self, root: &Path, speech: &Speech) -> PathBuf {
        root.join(self.dir_name(speech))
    }

    /// The part of a directory name that identifies the record
    ///
    /// Also the file stem of the record's content archive.
    pub fn identity_suffix(&self, id: &SpeechId) -> String {
        let id = id.as_str();
        if is_filesystem_safe(id) && id.len() <= self.max_verbatim_id_len() {
            id.to_string()
        } else {
            hashed_suffix(id)
        }
    }

    /// Base path handed to the content fetcher (the archive lands at `<base>.zip`)
    pub fn content_base(&self, directory: &Path, id: &SpeechId) -> PathBuf {
        directory.join(self.identity_suffix(id))
    }

    /// File name of the record's content archive
    pub fn archive_file_name(&self, id: &SpeechId) -> String {
        format!("{}.{}", self.identity_suffix(id), ARCHIVE_EXTENSION)
    }

    /// File name of the record's metadata artifact inside `directory`
    ///
    /// Records sharing the error bucket each get their own file.
    pub fn metadata_file_name(&self, directory: &Path, id: &SpeechId) -> String {
        if is_error_bucket(directory) {
            format!("{}{}", self.identity_suffix(id), BUCKET_METADATA_SUFFIX)
        } else {
            METADATA_FILE.to_string()
        }
    }

    // "YYYY-MM-DD" + two separators + at least one title byte
    fn max_verbatim_id_len(&self) -> usize {
        self.max_len.saturating_sub(13)
    }

    fn derive(&self, speech: &Speech) -> Result<String, String> {
        let created = DateTime::<Utc>::from_timestamp(speech.created_at(), 0)
            .ok_or_else(|| format!("created_at {} is out of range", speech.created_at()))?;
        let date = created.format("%Y-%m-%d").to_string();
        let suffix = self.identity_suffix(speech.id());

        let fixed = date.len() + suffix.len() + 2;
        if fixed >= self.max_len {
            return Err(format!(
                "name bound {} cannot hold date and identity ({} bytes)",
                self.max_len, fixed
            ));
        }
        let budget = self.max_len - fixed;

        let sanitized = sanitize_title(speech.title());
        let mut title = truncate_to_bytes(&sanitized, budget).trim_end().to_string();
        if title.is_empty() {
            title = truncate_to_bytes(UNTITLED, budget).to_string();
        }

        Ok(format!("{date}_{title}_{suffix}"))
    }
}

/// Whether `path` is the shared error bucket
pub fn is_error_bucket(path: &Path) -> bool {
    path.file_name().and_then(|n| n.to_str()) == Some(ERROR_BUCKET)
}

/// Identity suffix encoded in a record directory name (text after the last `_`)
///
/// ```
/// use speech_dl::naming::dir_name_suffix;
///
/// assert_eq!(dir_name_suffix("2024-01-01_Q3_review_a1"), Some("a1"));
/// assert_eq!(dir_name_suffix("error_downloads"), Some("downloads"));
/// assert_eq!(dir_name_suffix("loose"), None);
/// ```
pub fn dir_name_suffix(name: &str) -> Option<&str> {
    name.rsplit_once('_')
        .map(|(_, suffix)| suffix)
        .filter(|suffix| !suffix.is_empty())
}

/// Keep alphanumerics, space, hyphen and underscore; trim surrounding whitespace
///
/// ```
/// use speech_dl::naming::sanitize_title;
///
/// assert_eq!(sanitize_title(" Q3 review: a/b \\ c? "), "Q3 review ab  c");
/// ```
#[must_use]
pub fn sanitize_title(title: &str) -> String {
    title
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '-' | '_'))
        .collect::<String>()
        .trim()
        .to_string()
}

// `_` is excluded: it separates the fields of a directory name
fn is_filesystem_safe(id: &str) -> bool {
    !id.is_empty() && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
}

fn hashed_suffix(id: &str) -> String {
    let digest = Sha256::digest(id.as_bytes());
    let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
    hex[..HASH_SUFFIX_LEN].to_string()
}

fn truncate_to_bytes(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
