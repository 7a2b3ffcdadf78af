use super::*;

#[tokio::test]
async fn retry_moves_recovered_identity_to_downloaded() {
    let fetcher = FakeFetcher::new();
    fetcher.fail_for("a2");
    let (downloader, _temp_dir) = create_test_downloader(fetcher.clone()).await;
    let snapshot = EnumerationSnapshot::new(talks(2));

    downloader
        .download_records(&snapshot.speeches, &shared_ledger(&downloader).await)
        .await
        .unwrap();
    let after_first = ledger_on_disk(&downloader).await;
    assert_eq!(ids(after_first.downloaded()), vec!["a1"]);
    assert_eq!(ids(after_first.failed()), vec!["a2"]);

    fetcher.heal();
    let retry = downloader
        .retry_records(&snapshot, &shared_ledger(&downloader).await)
        .await
        .unwrap();

    assert_eq!(ids(&retry.succeeded), vec!["a2"]);
    let after_retry = ledger_on_disk(&downloader).await;
    assert_eq!(ids(after_retry.downloaded()), vec!["a1", "a2"]);
    assert!(after_retry.failed().is_empty());
    assert_eq!(fetcher.calls(), vec!["a1", "a2", "a2"]);
}

#[tokio::test]
async fn retry_that_fails_again_stays_failed() {
    let fetcher = FakeFetcher::new();
    fetcher.fail_for("a1");
    let (downloader, _temp_dir) = create_test_downloader(fetcher.clone()).await;
    let snapshot = EnumerationSnapshot::new(talks(1));
    let ledger = shared_ledger(&downloader).await;

    downloader
        .download_records(&snapshot.speeches, &ledger)
        .await
        .unwrap();
    let retry = downloader.retry_records(&snapshot, &ledger).await.unwrap();

    assert_eq!(ids(&retry.failed), vec!["a1"]);
    let on_disk = ledger_on_disk(&downloader).await;
    assert!(on_disk.downloaded().is_empty());
    assert_eq!(ids(on_disk.failed()), vec!["a1"]);
}

#[tokio::test]
async fn failed_identity_missing_from_snapshot_is_skipped() {
    let fetcher = FakeFetcher::new();
    let (downloader, _temp_dir) = create_test_downloader(fetcher.clone()).await;
    let ledger = shared_ledger(&downloader).await;
    ledger
        .record(SpeechId::from("ghost"), crate::types::LedgerState::Failed)
        .await
        .unwrap();

    let summary = downloader
        .retry_records(&EnumerationSnapshot::new(talks(1)), &ledger)
        .await
        .unwrap();

    assert_eq!(summary.attempted(), 0);
    assert!(fetcher.calls().is_empty());
    assert_eq!(ids(ledger_on_disk(&downloader).await.failed()), vec!["ghost"]);
}

#[tokio::test]
async fn nothing_failed_means_nothing_to_retry() {
    let fetcher = FakeFetcher::new();
    let (downloader, _temp_dir) = create_test_downloader(fetcher.clone()).await;

    let summary = downloader
        .retry_records(
            &EnumerationSnapshot::new(talks(2)),
            &shared_ledger(&downloader).await,
        )
        .await
        .unwrap();
    assert_eq!(summary, crate::types::Summary::default());
}
