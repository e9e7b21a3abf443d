//! Fetch → ingest → commit loop of the consumer worker.

use integration_tests::{
    fixtures,
    mocks::{Fetch, ScriptedEnvelopeSource},
    setup::{TestContext, OUTPUT_BUCKET, UPLOAD_BUCKET},
};
use pipeline_core::ProcessingStatus;
use redpanda::Offset;
use std::sync::Arc;
use worker::ConsumerWorker;

fn offset(offset: i64) -> Offset {
    Offset {
        partition: 0,
        offset,
    }
}

fn consumer(ctx: &TestContext, source: &ScriptedEnvelopeSource) -> ConsumerWorker {
    ConsumerWorker::new(Arc::new(source.clone()), Arc::new(ctx.ingestion()))
}

#[tokio::test]
async fn test_successful_batch_commits_offset() {
    let ctx = TestContext::new();
    ctx.upload("a.csv", &fixtures::csv_rows(2));
    let source = ScriptedEnvelopeSource::new([Fetch::Batch(
        vec![fixtures::upload_envelope(UPLOAD_BUCKET, "a.csv", 10)],
        Some(offset(5)),
    )]);

    let outcome = consumer(&ctx, &source).process_batch().await.unwrap();

    assert_eq!(outcome.successful, 1);
    assert_eq!(source.commits(), vec![offset(5)]);
    assert_eq!(ctx.objects.keys(OUTPUT_BUCKET).len(), 1);
}

#[tokio::test]
async fn test_all_failed_batch_still_commits() {
    let ctx = TestContext::new();
    let source = ScriptedEnvelopeSource::new([Fetch::Batch(
        vec![
            fixtures::upload_envelope(UPLOAD_BUCKET, "missing.csv", 10),
            fixtures::malformed_envelope(),
        ],
        Some(offset(9)),
    )]);

    let outcome = consumer(&ctx, &source).process_batch().await.unwrap();

    assert_eq!(outcome.successful, 0);
    assert_eq!(outcome.failed, 2);
    assert_eq!(source.commits(), vec![offset(9)]);
    assert!(ctx
        .metadata
        .records()
        .iter()
        .all(|r| r.status == ProcessingStatus::Failed));
}

#[tokio::test]
async fn test_tombstone_only_batch_advances_offset() {
    let ctx = TestContext::new();
    let source = ScriptedEnvelopeSource::new([Fetch::Batch(Vec::new(), Some(offset(43)))]);

    let outcome = consumer(&ctx, &source).process_batch().await.unwrap();

    assert_eq!(outcome.total(), 0);
    assert_eq!(source.commits(), vec![offset(43)]);
    assert!(ctx.metadata.records().is_empty());
}

#[tokio::test]
async fn test_empty_fetch_commits_nothing() {
    let ctx = TestContext::new();
    let source = ScriptedEnvelopeSource::new([Fetch::Batch(Vec::new(), None)]);

    consumer(&ctx, &source).process_batch().await.unwrap();

    assert!(source.commits().is_empty());
}

#[tokio::test]
async fn test_fetch_error_does_not_commit() {
    let ctx = TestContext::new();
    let source = ScriptedEnvelopeSource::new([Fetch::Error("broker unavailable".to_string())]);

    let err = consumer(&ctx, &source).process_batch().await.unwrap_err();

    assert!(err.to_string().contains("broker unavailable"));
    assert!(source.commits().is_empty());
    assert!(ctx.metadata.records().is_empty());
}
