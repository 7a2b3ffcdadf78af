//! Retry of failed records.

use crate::error::Result;
use crate::ledger::SharedLedger;
use crate::snapshot::EnumerationSnapshot;
use crate::types::{Speech, Summary};

use super::{Attempt, SpeechDownloader};

impl SpeechDownloader {
    /// Re-run the per-record procedure for every identity the ledger marks failed
    ///
    /// Each identity is looked up in `snapshot`; identities without a record there
    /// are skipped. Every retry starts from a fresh directory. A success moves the
    /// identity from `failed` to `downloaded`.
    pub async fn retry_records(
        &self,
        snapshot: &EnumerationSnapshot,
        ledger: &SharedLedger,
    ) -> Result<Summary> {
        let failed = ledger.snapshot().await.failed().to_vec();
        if failed.is_empty() {
            tracing::info!("No failed downloads to retry");
            return Ok(Summary::default());
        }

        let index = snapshot.index();
        let candidates: Vec<&Speech> = failed
            .iter()
            .filter_map(|id| {
                let found = index.get(id).copied();
                if found.is_none() {
                    tracing::debug!(speech_id = %id, "Failed identity not in snapshot, skipping");
                }
                found
            })
            .collect();

        tracing::info!(
            failed = failed.len(),
            retrying = candidates.len(),
            "Retrying failed downloads"
        );

        self.process_records(candidates, 0, ledger, Attempt::Retry)
            .await
    }
}
