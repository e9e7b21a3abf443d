//! ClickHouse metadata store against a real server.
//!
//! Requires Docker (or `PIPELINE_TEST_CLICKHOUSE_URL`); run with
//! `cargo test -p integration-tests -- --ignored`.

use chrono::Duration;
use clickhouse_client::{health, ClickHouseClient, ClickHouseMetadataStore};
use integration_tests::{containers::TestContainers, setup::frozen_now};
use pipeline_core::{MetadataRecord, MetadataStore, ProcessingStatus, TimeWindow};
use uuid::Uuid;

async fn store(containers: &TestContainers, page_size: u64) -> ClickHouseMetadataStore {
    let client = ClickHouseClient::new(containers.clickhouse_config(page_size));
    let table = format!("file_metadata_{}", Uuid::new_v4().simple());
    health::init_schema(&client, &table)
        .await
        .expect("Failed to initialize schema");
    ClickHouseMetadataStore::new(client, &table)
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_latest_write_wins() {
    let containers = TestContainers::start().await;
    let store = store(&containers, 100).await;
    let now = frozen_now();

    let processing = MetadataRecord::processing("rec-1", "uploads", "a.csv", 10, now);
    store.put(&processing).await.unwrap();
    let completed = processing
        .complete("s3://processed/a.json", 4, now + Duration::seconds(2))
        .unwrap();
    store.put(&completed).await.unwrap();

    let window = TimeWindow::trailing(now, Duration::hours(24));
    let page = store.scan_page(&window, None).await.unwrap();

    assert_eq!(page.items.len(), 1);
    assert_eq!(page.items[0].status, ProcessingStatus::Completed);
    assert_eq!(page.items[0].record_count, Some(4));
    assert_eq!(page.items[0].upload_timestamp, now.timestamp());
    assert!(page.next_cursor.is_none());
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_scan_paginates_within_window() {
    let containers = TestContainers::start().await;
    let store = store(&containers, 100).await;
    let now = frozen_now();

    for i in 0..150 {
        let record = MetadataRecord::processing(
            format!("rec-{:04}", i),
            "uploads",
            format!("f{}.csv", i),
            1,
            now - Duration::minutes(i),
        );
        store.put(&record).await.unwrap();
    }
    let stale = MetadataRecord::processing("old", "uploads", "old.csv", 1, now - Duration::days(2));
    store.put(&stale).await.unwrap();

    let window = TimeWindow::trailing(now, Duration::hours(24));
    let first = store.scan_page(&window, None).await.unwrap();
    assert_eq!(first.items.len(), 100);
    let cursor = first.next_cursor.expect("full page has a cursor");

    let second = store.scan_page(&window, Some(&cursor)).await.unwrap();
    assert_eq!(second.items.len(), 50);
    assert!(second.next_cursor.is_none());
    assert!(second.items.iter().all(|r| r.record_id != "old"));
}
