//! Utility functions for artifact persistence and file checks

use crate::error::{Error, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use std::io::Write;

/// Outcome of reading a JSON state file
#[derive(Debug)]
pub enum JsonFile<T> {
    /// The file decoded successfully
    Loaded(T),
    /// The file does not exist
    Missing,
    /// The file exists but could not be read or decoded
    Corrupt(String),
}

/// Read and decode a JSON file without treating absence or corruption as errors
///
/// Callers decide whether a missing or corrupt file degrades to a default or is fatal.
pub async fn read_json<T: DeserializeOwned>(path: &Path) -> JsonFile<T> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return JsonFile::Missing,
        Err(e) => return JsonFile::Corrupt(e.to_string()),
    };

    match serde_json::from_slice(&bytes) {
        Ok(value) => JsonFile::Loaded(value),
        Err(e) => JsonFile::Corrupt(e.to_string()),
    }
}

/// Serialize `value` as pretty JSON and atomically replace `path` with it
///
/// The bytes go to a uniquely named temporary file in the target directory, which is
/// flushed to disk before being renamed over the target. Readers only ever see the
/// old or the new content, and concurrent writers to one path never share a temp file.
pub async fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_vec_pretty(value)?;
    let target = path.to_path_buf();
    tokio::task::spawn_blocking(move || replace_file(&target, &json))
        .await
        .map_err(|e| Error::Other(format!("write task for {} failed: {e}", path.display())))?
}

fn replace_file(path: &Path, bytes: &[u8]) -> Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent).map_err(|e| Error::filesystem(parent, e))?;

    let prefix = format!(
        ".{}.",
        path.file_name().unwrap_or_default().to_string_lossy()
    );
    let mut file = tempfile::Builder::new()
        .prefix(&prefix)
        .suffix(".tmp")
        .tempfile_in(parent)
        .map_err(|e| Error::filesystem(parent, e))?;
    file.write_all(bytes)
        .map_err(|e| Error::filesystem(file.path(), e))?;
    file.as_file()
        .sync_all()
        .map_err(|e| Error::filesystem(file.path(), e))?;

    // A failed persist drops the temp file, which deletes it
    file.persist(path)
        .map_err(|e| Error::filesystem(path, e.error))?;
    Ok(())
}

/// `path` with `.suffix` appended to its full file name (`a.json` -> `a.json.tmp`)
pub fn sibling_with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".");
    name.push(suffix);
    path.with_file_name(name)
}

/// Size of the regular file at `path`, or None if it is absent, not a file, or empty
#[must_use]
pub fn non_empty_file_len(path: &Path) -> Option<u64> {
    std::fs::metadata(path)
        .ok()
        .filter(|m| m.is_file() && m.len() > 0)
        .map(|m| m.len())
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    #[tokio::test]
    async fn write_then_read_json() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("state.json");

        let mut value = BTreeMap::new();
        value.insert("downloaded".to_string(), vec!["a1".to_string()]);
        write_json_atomic(&path, &value).await.unwrap();

        match read_json::<BTreeMap<String, Vec<String>>>(&path).await {
            JsonFile::Loaded(read) => assert_eq!(read, value),
            other => panic!("expected loaded file, got {other:?}"),
        }
        let leftovers: Vec<_> = std::fs::read_dir(path.parent().unwrap())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(leftovers, vec![std::ffi::OsString::from("state.json")]);
    }

    #[tokio::test]
    async fn concurrent_writers_to_one_path_never_collide() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("metadata.json");

        let writers: Vec<_> = (0..32)
            .map(|i| {
                let path = path.clone();
                tokio::spawn(async move { write_json_atomic(&path, &vec![i; 64]).await })
            })
            .collect();
        for writer in writers {
            writer.await.unwrap().unwrap();
        }

        match read_json::<Vec<i32>>(&path).await {
            JsonFile::Loaded(read) => assert_eq!(read.len(), 64),
            other => panic!("expected loaded file, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn read_json_distinguishes_missing_and_corrupt() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("absent.json");
        assert!(matches!(
            read_json::<serde_json::Value>(&missing).await,
            JsonFile::Missing
        ));

        let corrupt = temp_dir.path().join("corrupt.json");
        std::fs::write(&corrupt, "{\"downloaded\": [").unwrap();
        assert!(matches!(
            read_json::<serde_json::Value>(&corrupt).await,
            JsonFile::Corrupt(_)
        ));
    }

    #[test]
    fn sibling_suffix_keeps_extension() {
        let path = Path::new("/data/download_progress.json");
        assert_eq!(
            sibling_with_suffix(path, "tmp"),
            PathBuf::from("/data/download_progress.json.tmp")
        );
    }

    #[test]
    fn non_empty_file_len_rejects_empty_and_missing() {
        let temp_dir = TempDir::new().unwrap();
        let empty = temp_dir.path().join("empty.zip");
        std::fs::write(&empty, b"").unwrap();
        let full = temp_dir.path().join("full.zip");
        std::fs::write(&full, b"PK\x03\x04").unwrap();

        assert_eq!(non_empty_file_len(&empty), None);
        assert_eq!(non_empty_file_len(&full), Some(4));
        assert_eq!(non_empty_file_len(&temp_dir.path().join("nope")), None);
        assert_eq!(non_empty_file_len(temp_dir.path()), None);
    }
}
