//! Failure analysis report
//!
//! Summarizes the ledger's `failed` set against the enumeration snapshot and is
//! persisted as `download_report.json`.

use serde::{Deserialize, Serialize};

use crate::ledger::ProgressLedger;
use crate::snapshot::EnumerationSnapshot;
use crate::types::SpeechId;
use crate::validation::REPORT_TIMESTAMP_FORMAT;

/// Placeholder for fields of identities missing from the snapshot
pub const UNKNOWN: &str = "Unknown";

/// One failed identity with what the snapshot knows about it
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedRecord {
    /// Identity from the ledger
    pub speech_id: SpeechId,
    /// Title, or [`UNKNOWN`]
    pub title: String,
    /// Creation time in epoch seconds, 0 when unknown
    pub created_at: i64,
    /// Content-addressing id, or [`UNKNOWN`]
    pub otid: String,
}

/// Persisted failure analysis
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureReport {
    /// When the report was generated
    pub timestamp: String,
    /// Records in the snapshot
    pub total_speeches: usize,
    /// Identities marked downloaded
    pub downloaded: usize,
    /// Identities marked failed
    pub failed: usize,
    /// Every failed identity, in ledger order
    pub failed_details: Vec<FailedRecord>,
}

impl FailureReport {
    /// Whether there is anything to retry
    pub fn has_failures(&self) -> bool {
        !self.failed_details.is_empty()
    }
}

/// Build the failure report for `ledger` against `snapshot`
pub fn analyze_failures(ledger: &ProgressLedger, snapshot: &EnumerationSnapshot) -> FailureReport {
    let index = snapshot.index();
    let failed_details = ledger
        .failed()
        .iter()
        .map(|id| match index.get(id) {
            Some(speech) => FailedRecord {
                speech_id: id.clone(),
                title: speech
                    .raw()
                    .title
                    .clone()
                    .unwrap_or_else(|| UNKNOWN.to_string()),
                created_at: speech.created_at(),
                otid: speech
                    .raw()
                    .otid
                    .clone()
                    .unwrap_or_else(|| UNKNOWN.to_string()),
            },
            None => FailedRecord {
                speech_id: id.clone(),
                title: UNKNOWN.to_string(),
                created_at: 0,
                otid: UNKNOWN.to_string(),
            },
        })
        .collect();

    FailureReport {
        timestamp: chrono::Local::now()
            .format(REPORT_TIMESTAMP_FORMAT)
            .to_string(),
        total_speeches: snapshot.len(),
        downloaded: ledger.downloaded().len(),
        failed: ledger.failed().len(),
        failed_details,
    }
}
