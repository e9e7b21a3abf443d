//! Failure isolation in the ingestion worker.
//!
//! A failing event is recorded as FAILED and counted; it never fails the
//! batch or its sibling events.

use integration_tests::{
    fixtures,
    setup::{TestContext, OUTPUT_BUCKET, UPLOAD_BUCKET},
};
use pipeline_core::{ProcessingStatus, UNKNOWN_SOURCE};

#[tokio::test]
async fn test_unreachable_object_fails_only_its_event() {
    let ctx = TestContext::new();
    ctx.upload("good.csv", &fixtures::csv_rows(3));
    ctx.upload("locked.csv", &fixtures::csv_rows(3));
    ctx.objects.fail_reads_of("locked.csv");

    let envelope = fixtures::envelope(vec![
        fixtures::upload_descriptor(UPLOAD_BUCKET, "locked.csv", 1),
        fixtures::upload_descriptor(UPLOAD_BUCKET, "good.csv", 1),
    ]);
    let outcome = ctx.ingestion().process_batch(&[envelope]).await;

    assert_eq!(outcome.successful, 1);
    assert_eq!(outcome.failed, 1);

    let records = ctx.metadata.records();
    let failed = records
        .iter()
        .find(|r| r.source_name == "locked.csv")
        .unwrap();
    assert_eq!(failed.status, ProcessingStatus::Failed);
    assert!(failed.error_detail.as_deref().unwrap().contains("access denied"));
    assert!(failed.output_location.is_none());
    assert!(failed.record_count.is_none());

    let good = records.iter().find(|r| r.source_name == "good.csv").unwrap();
    assert_eq!(good.status, ProcessingStatus::Completed);
    assert_eq!(ctx.objects.keys(OUTPUT_BUCKET).len(), 1);

    let statuses: Vec<ProcessingStatus> = ctx
        .metadata
        .history_of(&failed.record_id)
        .iter()
        .map(|r| r.status)
        .collect();
    assert_eq!(
        statuses,
        vec![ProcessingStatus::Processing, ProcessingStatus::Failed]
    );
}

#[tokio::test]
async fn test_missing_object_is_recorded_failed() {
    let ctx = TestContext::new();

    let outcome = ctx
        .ingestion()
        .process_batch(&[fixtures::upload_envelope(UPLOAD_BUCKET, "gone.csv", 7)])
        .await;

    assert_eq!(outcome.failed, 1);
    let record = &ctx.metadata.records()[0];
    assert_eq!(record.status, ProcessingStatus::Failed);
    assert_eq!(record.size_bytes, 7);
    assert!(record.error_detail.as_deref().unwrap().contains("STORE_001"));
}

#[tokio::test]
async fn test_malformed_envelope_is_counted_without_metadata() {
    let ctx = TestContext::new();
    ctx.upload("fine.csv", &fixtures::csv_rows(1));

    let outcome = ctx
        .ingestion()
        .process_batch(&[
            fixtures::malformed_envelope(),
            fixtures::upload_envelope(UPLOAD_BUCKET, "fine.csv", 1),
        ])
        .await;

    assert_eq!(outcome.successful, 1);
    assert_eq!(outcome.failed, 1);
    assert_eq!(ctx.metadata.records().len(), 1);
}

#[tokio::test]
async fn test_unreadable_descriptor_gets_unknown_failed_record() {
    let ctx = TestContext::new();
    let envelope = fixtures::envelope(vec![serde_json::json!({ "s3": { "bucket": {} } })]);

    let outcome = ctx.ingestion().process_batch(&[envelope]).await;
    assert_eq!(outcome.failed, 1);

    let history = ctx.metadata.history();
    assert_eq!(history.len(), 1, "only the FAILED record is written");
    let record = &history[0];
    assert_eq!(record.status, ProcessingStatus::Failed);
    assert_eq!(record.source_name, UNKNOWN_SOURCE);
    assert_eq!(record.source_bucket, UNKNOWN_SOURCE);
    assert_eq!(record.size_bytes, 0);
    assert!(!record.record_id.is_empty());
    assert!(record.error_detail.as_deref().unwrap().contains("INPUT_001"));
}

#[tokio::test]
async fn test_non_utf8_object_is_malformed_input() {
    let ctx = TestContext::new();
    ctx.objects
        .insert(UPLOAD_BUCKET, "binary.csv", vec![0xff_u8, 0xfe, 0x00, 0x41]);

    let outcome = ctx
        .ingestion()
        .process_batch(&[fixtures::upload_envelope(UPLOAD_BUCKET, "binary.csv", 4)])
        .await;

    assert_eq!(outcome.failed, 1);
    let record = &ctx.metadata.records()[0];
    assert_eq!(record.status, ProcessingStatus::Failed);
    assert!(record.error_detail.as_deref().unwrap().contains("INPUT_002"));
}

#[tokio::test]
async fn test_artifact_write_failure_is_recorded() {
    let ctx = TestContext::new();
    ctx.upload("blocked.csv", &fixtures::csv_rows(2));
    ctx.objects.set_fail_writes(true);

    let outcome = ctx
        .ingestion()
        .process_batch(&[fixtures::upload_envelope(UPLOAD_BUCKET, "blocked.csv", 2)])
        .await;

    assert_eq!(outcome.failed, 1);
    assert!(ctx.objects.keys(OUTPUT_BUCKET).is_empty());
    assert_eq!(ctx.metadata.records()[0].status, ProcessingStatus::Failed);
}

#[tokio::test]
async fn test_metadata_outage_is_counted_and_swallowed() {
    let ctx = TestContext::new();
    ctx.upload("any.csv", &fixtures::csv_rows(2));
    ctx.metadata.set_fail_writes(true);

    let outcome = ctx
        .ingestion()
        .process_batch(&[fixtures::upload_envelope(UPLOAD_BUCKET, "any.csv", 2)])
        .await;

    assert_eq!(outcome.successful, 0);
    assert_eq!(outcome.failed, 1);
    assert!(ctx.metadata.history().is_empty());
    assert!(ctx.objects.keys(OUTPUT_BUCKET).is_empty());
}

#[tokio::test]
async fn test_failures_do_not_stop_later_envelopes() {
    let ctx = TestContext::new();
    ctx.upload("last.csv", &fixtures::csv_rows(1));

    let outcome = ctx
        .ingestion()
        .process_batch(&[
            fixtures::malformed_envelope(),
            fixtures::upload_envelope(UPLOAD_BUCKET, "absent.csv", 1),
            fixtures::upload_envelope(UPLOAD_BUCKET, "last.csv", 1),
        ])
        .await;

    assert_eq!(outcome.successful, 1);
    assert_eq!(outcome.failed, 2);
}
