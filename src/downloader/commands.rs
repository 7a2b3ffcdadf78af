//! Entry points, one per operation.
//!
//! Each one loads what it needs from the configured artifact paths, does its work
//! and persists its result, so any of them can be re-invoked safely.

use crate::client::EnumerationClient;
use crate::enumerator::{AlwaysContinue, Enumerator, FirstPageProbe, PageGate, probe_first_page};
use crate::error::Result;
use crate::ledger::{ProgressLedger, SharedLedger};
use crate::reports::{FailureReport, analyze_failures};
use crate::snapshot::EnumerationSnapshot;
use crate::types::{LedgerState, Summary};
use crate::utils::write_json_atomic;
use crate::validation::{self, RepairSummary, ValidationReport};

use super::SpeechDownloader;

impl SpeechDownloader {
    /// Enumerate the remote collection and overwrite the snapshot file
    pub async fn enumerate(&self, client: &dyn EnumerationClient) -> Result<EnumerationSnapshot> {
        self.enumerate_with_gate(client, &AlwaysContinue).await
    }

    /// Enumerate, consulting `gate` between pages
    pub async fn enumerate_with_gate(
        &self,
        client: &dyn EnumerationClient,
        gate: &dyn PageGate,
    ) -> Result<EnumerationSnapshot> {
        let snapshot = Enumerator::new(client, &self.config.enumeration)
            .with_gate(gate)
            .with_events(self.event_tx.clone())
            .with_cancellation(self.cancel.clone())
            .enumerate()
            .await?;
        snapshot.save(&self.config.persistence.snapshot_path).await?;
        Ok(snapshot)
    }

    /// Enumerate, adopt complete downloads already on disk, then download the rest
    pub async fn download_all(&self, client: &dyn EnumerationClient) -> Result<Summary> {
        let snapshot = self.enumerate(client).await?;
        let ledger = self.load_ledger().await;
        self.adopt_existing(&ledger).await?;
        self.download_records(&snapshot.speeches, &ledger).await
    }

    /// Download the records of the persisted snapshot
    ///
    /// # Errors
    ///
    /// [`Error::MissingInput`](crate::Error::MissingInput) or
    /// [`Error::CorruptState`](crate::Error::CorruptState) if the snapshot is
    /// absent or unreadable.
    pub async fn download_from_list(&self) -> Result<Summary> {
        let snapshot = self.load_snapshot().await?;
        let ledger = self.load_ledger().await;
        self.download_records(&snapshot.speeches, &ledger).await
    }

    /// Retry every failed identity of the persisted ledger
    pub async fn retry_failed(&self) -> Result<Summary> {
        let snapshot = self.load_snapshot().await?;
        let ledger = self.load_ledger().await;
        self.retry_records(&snapshot, &ledger).await
    }

    /// Audit the storage tree against the ledger and write the validation report
    ///
    /// Read-only with respect to the ledger.
    pub async fn validate(&self) -> Result<ValidationReport> {
        let snapshot = self.load_snapshot().await?;
        let ledger = ProgressLedger::load(&self.config.persistence.ledger_path).await;
        let report =
            validation::validate(&ledger, &snapshot, self.config.download_dir(), &self.namer)
                .await?;
        write_json_atomic(&self.config.persistence.validation_report_path, &report).await?;
        Ok(report)
    }

    /// Describe every failed identity and write the failure report
    pub async fn analyze_failures(&self) -> Result<FailureReport> {
        let snapshot = self.load_snapshot().await?;
        let ledger = ProgressLedger::load(&self.config.persistence.ledger_path).await;
        let report = analyze_failures(&ledger, &snapshot);
        tracing::info!(
            failed = report.failed,
            downloaded = report.downloaded,
            total = report.total_speeches,
            "Failure analysis complete"
        );
        write_json_atomic(&self.config.persistence.failure_report_path, &report).await?;
        Ok(report)
    }

    /// Validate, then demote every unverified download to `failed`
    pub async fn repair_ledger(&self) -> Result<RepairSummary> {
        let report = self.validate().await?;
        let ledger = self.load_ledger().await;
        validation::repair_ledger(&ledger, &report).await
    }

    /// Fetch and summarize only the first page of the listing
    pub async fn count_first_page(&self, client: &dyn EnumerationClient) -> Result<FirstPageProbe> {
        probe_first_page(client, &self.config.enumeration).await
    }

    /// Mark complete directories already in the storage tree as downloaded
    ///
    /// Returns the number of identities newly marked.
    pub async fn adopt_existing(&self, ledger: &SharedLedger) -> Result<usize> {
        let found = validation::discover_completed(self.config.download_dir(), &self.namer).await?;
        let adopted = ledger
            .record_all(
                found
                    .into_iter()
                    .map(|speech| (speech.id().clone(), LedgerState::Downloaded)),
            )
            .await?;
        if adopted > 0 {
            tracing::info!(adopted, "Adopted existing downloads into the ledger");
        }
        Ok(adopted)
    }

    async fn load_snapshot(&self) -> Result<EnumerationSnapshot> {
        EnumerationSnapshot::load(&self.config.persistence.snapshot_path).await
    }

    async fn load_ledger(&self) -> SharedLedger {
        SharedLedger::load(self.config.persistence.ledger_path.clone()).await
    }
}
