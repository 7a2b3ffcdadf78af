use super::*;
use crate::downloader::test_helpers::{ArtifactMode, FakeListing};
use crate::naming::METADATA_FILE;
use crate::types::Speech;

async fn save_snapshot(downloader: &SpeechDownloader, speeches: Vec<Speech>) {
    EnumerationSnapshot::new(speeches)
        .save(&downloader.get_config().persistence.snapshot_path)
        .await
        .unwrap();
}

#[tokio::test]
async fn download_from_list_requires_a_snapshot() {
    let (downloader, _temp_dir) = create_test_downloader(FakeFetcher::new()).await;

    let result = downloader.download_from_list().await;
    assert!(matches!(result, Err(Error::MissingInput { .. })));
}

#[tokio::test]
async fn download_from_list_rejects_a_corrupt_snapshot() {
    let (downloader, _temp_dir) = create_test_downloader(FakeFetcher::new()).await;
    std::fs::write(
        &downloader.get_config().persistence.snapshot_path,
        b"{ not json",
    )
    .unwrap();

    let result = downloader.download_from_list().await;
    assert!(matches!(result, Err(Error::CorruptState { .. })));
}

#[tokio::test]
async fn list_download_then_retry_resolves_every_record() {
    let fetcher = FakeFetcher::new();
    fetcher.fail_for("a2");
    let (downloader, _temp_dir) = create_test_downloader(fetcher.clone()).await;
    save_snapshot(&downloader, talks(3)).await;

    let first = downloader.download_from_list().await.unwrap();
    assert_eq!(first.succeeded.len(), 2);
    assert_eq!(first.failed.len(), 1);

    fetcher.heal();
    let retried = downloader.retry_failed().await.unwrap();
    assert_eq!(retried.succeeded.len(), 1);
    assert_eq!(retried.failed.len(), 0);

    let ledger = ledger_on_disk(&downloader).await;
    assert_eq!(ids(ledger.downloaded()), vec!["a1", "a3", "a2"]);
    assert!(ledger.failed().is_empty());
}

#[tokio::test]
async fn enumerate_overwrites_the_snapshot() {
    let (downloader, _temp_dir) = create_test_downloader(FakeFetcher::new()).await;
    save_snapshot(&downloader, talks(5)).await;

    let listing = FakeListing::new(vec![talks(2), vec![talks(3).remove(2)]]);
    let snapshot = downloader.enumerate(&listing).await.unwrap();
    assert_eq!(snapshot.len(), 3);

    let persisted = EnumerationSnapshot::load(&downloader.get_config().persistence.snapshot_path)
        .await
        .unwrap();
    assert_eq!(ids(&persisted.unique_ids), vec!["a1", "a2", "a3"]);
    assert_eq!(persisted.total_count, 3);
}

#[tokio::test]
async fn download_all_adopts_complete_directories() {
    let fetcher = FakeFetcher::new();
    let (downloader, _temp_dir) = create_test_downloader(fetcher.clone()).await;

    // A complete download from before the ledger existed
    let speech = Speech::new("a1", Some("Talk"), Some(0));
    let directory = downloader
        .namer()
        .dir_path(downloader.get_config().download_dir(), &speech);
    std::fs::create_dir_all(&directory).unwrap();
    std::fs::write(
        directory.join(METADATA_FILE),
        serde_json::to_vec(&speech).unwrap(),
    )
    .unwrap();
    std::fs::write(directory.join("a1.zip"), b"PK").unwrap();

    let listing = FakeListing::new(vec![talks(2)]);
    let summary = downloader.download_all(&listing).await.unwrap();

    assert_eq!(summary.succeeded.len(), 1);
    assert_eq!(summary.skipped, 1);
    assert_eq!(fetcher.calls(), vec!["a2".to_string()]);

    let ledger = ledger_on_disk(&downloader).await;
    assert_eq!(ids(ledger.downloaded()), vec!["a1", "a2"]);
}

#[tokio::test]
async fn adopt_existing_ignores_incomplete_directories() {
    let (downloader, _temp_dir) = create_test_downloader(FakeFetcher::new()).await;
    let speech = Speech::new("a1", Some("Talk"), Some(0));
    let directory = downloader
        .namer()
        .dir_path(downloader.get_config().download_dir(), &speech);
    std::fs::create_dir_all(&directory).unwrap();
    std::fs::write(
        directory.join(METADATA_FILE),
        serde_json::to_vec(&speech).unwrap(),
    )
    .unwrap();
    std::fs::write(directory.join("a1.zip"), b"").unwrap();

    let ledger = shared_ledger(&downloader).await;
    assert_eq!(downloader.adopt_existing(&ledger).await.unwrap(), 0);
    assert!(ledger.snapshot().await.downloaded().is_empty());
}

#[tokio::test]
async fn validate_reports_discrepancies_and_leaves_the_ledger_alone() {
    let fetcher = FakeFetcher::new();
    let (downloader, _temp_dir) = create_test_downloader(fetcher.clone()).await;
    save_snapshot(&downloader, talks(3)).await;
    downloader.download_from_list().await.unwrap();

    let root = downloader.get_config().download_dir().to_path_buf();
    let namer = downloader.namer().clone();
    let records = talks(3);
    // a2 loses its archive, a3 loses its whole directory
    std::fs::write(namer.dir_path(&root, &records[1]).join("a2.zip"), b"").unwrap();
    std::fs::remove_dir_all(namer.dir_path(&root, &records[2])).unwrap();

    let report = downloader.validate().await.unwrap();
    assert_eq!(ids(&report.validation_results.verified), vec!["a1"]);
    assert_eq!(ids(&report.validation_results.missing_files), vec!["a2"]);
    assert_eq!(ids(&report.validation_results.not_found), vec!["a3"]);
    assert!(
        downloader
            .get_config()
            .persistence
            .validation_report_path
            .exists()
    );

    let ledger = ledger_on_disk(&downloader).await;
    assert_eq!(ledger.downloaded().len(), 3);
}

#[tokio::test]
async fn repair_then_retry_refetches_broken_downloads() {
    let fetcher = FakeFetcher::new();
    let (downloader, _temp_dir) = create_test_downloader(fetcher.clone()).await;
    save_snapshot(&downloader, talks(2)).await;
    downloader.download_from_list().await.unwrap();

    let root = downloader.get_config().download_dir().to_path_buf();
    std::fs::remove_dir_all(downloader.namer().dir_path(&root, &talks(2)[1])).unwrap();

    let repaired = downloader.repair_ledger().await.unwrap();
    assert_eq!(ids(&repaired.demoted), vec!["a2"]);
    let ledger = ledger_on_disk(&downloader).await;
    assert_eq!(ids(ledger.failed()), vec!["a2"]);

    let retried = downloader.retry_failed().await.unwrap();
    assert_eq!(retried.succeeded.len(), 1);
    let report = downloader.validate().await.unwrap();
    assert_eq!(report.validation_results.discrepancies().count(), 0);
}

#[tokio::test]
async fn analyze_failures_writes_the_report() {
    let fetcher = FakeFetcher::new();
    fetcher.set_mode(ArtifactMode::Empty);
    let (downloader, _temp_dir) = create_test_downloader(fetcher.clone()).await;
    save_snapshot(&downloader, talks(2)).await;
    downloader.download_from_list().await.unwrap();

    let report = downloader.analyze_failures().await.unwrap();
    assert_eq!(report.total_speeches, 2);
    assert_eq!(report.failed, 2);
    assert_eq!(report.downloaded, 0);
    assert_eq!(report.failed_details[0].title, "Talk");

    let written: serde_json::Value = serde_json::from_slice(
        &std::fs::read(&downloader.get_config().persistence.failure_report_path).unwrap(),
    )
    .unwrap();
    assert_eq!(written["failed"], 2);
}

#[tokio::test]
async fn count_first_page_fetches_only_one_page() {
    let (downloader, _temp_dir) = create_test_downloader(FakeFetcher::new()).await;
    let listing = FakeListing::new(vec![talks(4), talks(8)]);

    let probe = downloader.count_first_page(&listing).await.unwrap();
    assert_eq!(probe.records, 4);
    assert_eq!(probe.sample_titles, vec!["Talk", "Talk", "Talk"]);
    assert!(!probe.end_of_list);
    assert!(!downloader.get_config().persistence.snapshot_path.exists());
}

#[tokio::test]
async fn shutdown_before_enumeration_interrupts() {
    let (downloader, _temp_dir) = create_test_downloader(FakeFetcher::new()).await;
    downloader.shutdown();

    let listing = FakeListing::new(vec![talks(2)]);
    let result = downloader.download_all(&listing).await;
    assert!(matches!(result, Err(Error::Interrupted)));
    assert!(downloader.is_shutting_down());
}

#[tokio::test]
async fn shutdown_before_a_list_download_reports_interrupted() {
    let fetcher = FakeFetcher::new();
    let (downloader, _temp_dir) = create_test_downloader(fetcher.clone()).await;
    save_snapshot(&downloader, talks(3)).await;
    let mut events = downloader.subscribe();
    downloader.shutdown();

    let summary = downloader.download_from_list().await.unwrap();
    assert!(summary.interrupted);
    assert_eq!(summary.attempted(), 0);
    assert!(fetcher.calls().is_empty());

    let mut saw_interrupted = false;
    while let Ok(event) = events.try_recv() {
        if let Event::Interrupted { remaining } = event {
            assert_eq!(remaining, 3);
            saw_interrupted = true;
        }
    }
    assert!(saw_interrupted);
}
