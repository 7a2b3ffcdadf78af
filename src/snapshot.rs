//! Persisted enumeration result

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;

use crate::error::{Error, Result};
use crate::types::{Speech, SpeechId};
use crate::utils::{JsonFile, read_json, write_json_atomic};

/// The full deduplicated record list of one enumeration run
///
/// Serialized as `{total_count, speeches, unique_ids}`. Regenerated (overwritten) by
/// every enumeration; never updated incrementally.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EnumerationSnapshot {
    /// Number of records in `speeches`
    pub total_count: usize,
    /// Records in first-seen order
    pub speeches: Vec<Speech>,
    /// Identities of `speeches`, in the same order
    pub unique_ids: Vec<SpeechId>,
}

impl EnumerationSnapshot {
    /// Build a snapshot from records that are already deduplicated
    pub fn new(speeches: Vec<Speech>) -> Self {
        let unique_ids = speeches.iter().map(|s| s.id().clone()).collect();
        Self {
            total_count: speeches.len(),
            speeches,
            unique_ids,
        }
    }

    /// Build a snapshot from arbitrary records, keeping the first occurrence of each identity
    pub fn from_records(records: impl IntoIterator<Item = Speech>) -> Self {
        let mut seen = HashSet::new();
        let speeches = records
            .into_iter()
            .filter(|s| seen.insert(s.id().clone()))
            .collect();
        Self::new(speeches)
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.speeches.len()
    }

    /// Whether the snapshot holds no records
    pub fn is_empty(&self) -> bool {
        self.speeches.is_empty()
    }

    /// Lookup table from identity to record
    pub fn index(&self) -> HashMap<&SpeechId, &Speech> {
        self.speeches.iter().map(|s| (s.id(), s)).collect()
    }

    /// Find the record for `id`
    pub fn get(&self, id: &SpeechId) -> Option<&Speech> {
        self.speeches.iter().find(|s| s.id() == id)
    }

    /// Load a snapshot that the caller cannot proceed without
    ///
    /// # Errors
    ///
    /// [`Error::MissingInput`] if the file does not exist and [`Error::CorruptState`]
    /// if it cannot be decoded; there is no sensible default for either.
    pub async fn load(path: &Path) -> Result<Self> {
        match read_json::<Self>(path).await {
            JsonFile::Loaded(snapshot) => {
                let snapshot = snapshot.normalized();
                tracing::debug!(
                    path = %path.display(),
                    records = snapshot.len(),
                    "Loaded enumeration snapshot"
                );
                Ok(snapshot)
            }
            JsonFile::Missing => Err(Error::MissingInput {
                path: path.to_path_buf(),
                hint: "run enumeration first".to_string(),
            }),
            JsonFile::Corrupt(reason) => Err(Error::CorruptState {
                path: path.to_path_buf(),
                reason,
            }),
        }
    }

    /// Overwrite `path` with this snapshot
    pub async fn save(&self, path: &Path) -> Result<()> {
        write_json_atomic(path, self).await?;
        tracing::info!(
            path = %path.display(),
            records = self.len(),
            "Saved enumeration snapshot"
        );
        Ok(())
    }

    // Hand-edited files may disagree with themselves; the record list wins.
    fn normalized(self) -> Self {
        if self.total_count == self.speeches.len()
            && self.unique_ids.len() == self.speeches.len()
        {
            return self;
        }
        tracing::warn!(
            total_count = self.total_count,
            records = self.speeches.len(),
            unique_ids = self.unique_ids.len(),
            "Snapshot counts disagree with its record list, rebuilding"
        );
        Self::from_records(self.speeches)
    }
}
