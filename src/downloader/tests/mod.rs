use super::*;
use crate::downloader::test_helpers::{FakeFetcher, create_test_downloader, talks};
use crate::error::Error;
use crate::ledger::{ProgressLedger, SharedLedger};
use crate::snapshot::EnumerationSnapshot;
use crate::types::{Event, SpeechId};

mod commands;
mod retry_failed;

fn ids(list: &[SpeechId]) -> Vec<&str> {
    list.iter().map(|id| id.as_str()).collect()
}

async fn shared_ledger(downloader: &SpeechDownloader) -> SharedLedger {
    SharedLedger::load(downloader.get_config().persistence.ledger_path.clone()).await
}

async fn ledger_on_disk(downloader: &SpeechDownloader) -> ProgressLedger {
    ProgressLedger::load(&downloader.get_config().persistence.ledger_path).await
}
