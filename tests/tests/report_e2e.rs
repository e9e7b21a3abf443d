//! End-to-end tests for the daily report generator.
//!
//! Metadata window scan → aggregation → JSON/HTML artifacts → notification,
//! with the clock frozen so reports are reproducible.

use chrono::Duration;
use integration_tests::{
    fixtures::{self, record_at, RecordOutcome},
    mocks::{
        CyclingCursorMetadataStore, InMemoryMetadataStore, InMemoryObjectStore, RecordingNotifier,
    },
    setup::{frozen_now, TestContext, ENVIRONMENT, REPORTS_BUCKET, UPLOAD_BUCKET},
};
use std::sync::Arc;
use worker::{FixedClock, ReportGenerator};

const JSON_KEY: &str = "daily-reports/2024/07/15/report_20240715_063000.json";
const HTML_KEY: &str = "daily-reports/2024/07/15/report_20240715_063000.html";

fn completed(ctx: &TestContext, minutes_ago: i64, name: &str, rows: u64) {
    ctx.metadata.seed([record_at(
        ctx.now,
        minutes_ago,
        name,
        RecordOutcome::Completed(rows),
    )]);
}

fn failed(ctx: &TestContext, minutes_ago: i64, name: &str, detail: &str) {
    ctx.metadata.seed([record_at(
        ctx.now,
        minutes_ago,
        name,
        RecordOutcome::Failed(detail.to_string()),
    )]);
}

#[tokio::test]
async fn test_empty_window_report() {
    let ctx = TestContext::new();

    let outcome = ctx.reports().run().await.unwrap();

    assert_eq!(outcome.summary.total_files_processed, 0);
    assert_eq!(outcome.summary.success_rate_percent, 0.0);
    assert_eq!(outcome.json_location, format!("s3://{}/{}", REPORTS_BUCKET, JSON_KEY));
    assert_eq!(outcome.html_location, format!("s3://{}/{}", REPORTS_BUCKET, HTML_KEY));

    let report = ctx.objects.get_json(REPORTS_BUCKET, JSON_KEY).unwrap();
    assert_eq!(report["summary"]["success_rate_percent"], 0.0);
    assert!(report["hourly_breakdown"].as_object().unwrap().is_empty());
    assert!(report["top_files"].as_array().unwrap().is_empty());
    assert!(report["errors"].as_array().unwrap().is_empty());
    assert_eq!(report["report_metadata"]["environment"], ENVIRONMENT);

    let sent = ctx.notifier.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].subject, "Daily Data Processing Report - TEST - 2024-07-15");
    assert!(!sent[0].body.contains("WARNING"));
}

#[tokio::test]
async fn test_artifacts_are_stored_with_content_types() {
    let ctx = TestContext::new();
    completed(&ctx, 10, "a.csv", 3);

    ctx.reports().run().await.unwrap();

    assert_eq!(
        ctx.objects.keys(REPORTS_BUCKET),
        vec![HTML_KEY.to_string(), JSON_KEY.to_string()]
    );
    let json = ctx.objects.get(REPORTS_BUCKET, JSON_KEY).unwrap();
    assert_eq!(json.content_type, "application/json");
    let html = ctx.objects.get(REPORTS_BUCKET, HTML_KEY).unwrap();
    assert_eq!(html.content_type, "text/html");
    assert!(String::from_utf8(html.body.to_vec())
        .unwrap()
        .contains("<td>a.csv</td>"));
}

#[tokio::test]
async fn test_three_of_five_success_rate() {
    let ctx = TestContext::new();
    completed(&ctx, 5, "one.csv", 10);
    completed(&ctx, 15, "two.csv", 20);
    completed(&ctx, 25, "three.csv", 30);
    failed(&ctx, 35, "four.csv", "[INPUT_002] bad row");
    failed(&ctx, 45, "five.csv", "[STORE_001] denied");

    let outcome = ctx.reports().run().await.unwrap();

    assert_eq!(outcome.summary.success_rate_percent, 60.0);
    assert_eq!(outcome.summary.total_records_processed, 60);
    assert_eq!(outcome.summary.failed_files, 2);

    let body = &ctx.notifier.sent()[0].body;
    assert!(body.contains("Success Rate: 60.00%"));
    assert!(body.contains(
        "WARNING: 2 files failed processing. Check the full report for details."
    ));

    let report = ctx.objects.get_json(REPORTS_BUCKET, JSON_KEY).unwrap();
    assert_eq!(report["errors"].as_array().unwrap().len(), 2);
    assert_eq!(report["top_files"][0]["fileName"], "three.csv");
    assert_eq!(report["top_files"][0]["recordCount"], 30);
}

#[tokio::test]
async fn test_pagination_collects_every_record() {
    let ctx = TestContext::with_metadata(InMemoryMetadataStore::with_page_size(100));
    for i in 0..150 {
        completed(&ctx, i % 600, &format!("file-{}.csv", i), 1);
    }

    let outcome = ctx.reports().run().await.unwrap();

    assert_eq!(outcome.summary.total_files_processed, 150);
    assert_eq!(outcome.summary.total_records_processed, 150);
    assert_eq!(ctx.metadata.scan_calls(), 2);
}

#[tokio::test]
async fn test_records_outside_window_are_excluded() {
    let ctx = TestContext::new();
    completed(&ctx, 60, "recent.csv", 1);
    completed(&ctx, 25 * 60, "old.csv", 1);

    let outcome = ctx.reports().run().await.unwrap();
    assert_eq!(outcome.summary.total_files_processed, 1);
}

#[tokio::test]
async fn test_custom_window_length() {
    let ctx = TestContext::new();
    completed(&ctx, 30, "recent.csv", 1);
    completed(&ctx, 90, "earlier.csv", 1);

    let outcome = ctx
        .reports()
        .with_window(Duration::hours(1))
        .run()
        .await
        .unwrap();
    assert_eq!(outcome.summary.total_files_processed, 1);
}

#[tokio::test]
async fn test_reports_are_reproducible_with_frozen_clock() {
    let ctx = TestContext::new();
    completed(&ctx, 10, "a.csv", 4);
    failed(&ctx, 20, "b.csv", "nope");

    ctx.reports().run().await.unwrap();
    let first = ctx.objects.get(REPORTS_BUCKET, JSON_KEY).unwrap().body;
    ctx.reports().run().await.unwrap();
    let second = ctx.objects.get(REPORTS_BUCKET, JSON_KEY).unwrap().body;

    assert_eq!(first, second);
}

#[tokio::test]
async fn test_top_files_skip_records_without_counts() {
    let ctx = TestContext::new();
    ctx.metadata
        .seed([record_at(ctx.now, 1, "pending.csv", RecordOutcome::Processing)]);
    failed(&ctx, 2, "broken.csv", "boom");
    for i in 0..12u64 {
        completed(&ctx, 3 + i as i64, &format!("f{}.csv", i), i);
    }

    ctx.reports().run().await.unwrap();
    let report = ctx.objects.get_json(REPORTS_BUCKET, JSON_KEY).unwrap();
    let top = report["top_files"].as_array().unwrap();

    assert_eq!(top.len(), 10);
    assert_eq!(top[0]["recordCount"], 11);
    assert!(top
        .iter()
        .all(|f| f["fileName"] != "pending.csv" && f["fileName"] != "broken.csv"));
    assert_eq!(report["summary"]["in_progress_files"], 1);
}

#[tokio::test]
async fn test_scan_failure_sends_error_notification() {
    let ctx = TestContext::new();
    ctx.metadata.set_fail_scans(true);

    let err = ctx.reports().run().await.unwrap_err();
    assert_eq!(err.error_code(), Some("STORE_002"));

    let sent = ctx.notifier.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].subject, "ERROR: Daily Report Generation Failed - TEST");
    assert!(sent[0].body.contains("mock metadata store scan failure"));
    assert!(ctx.objects.keys(REPORTS_BUCKET).is_empty());
}

#[tokio::test]
async fn test_report_write_failure_sends_error_notification() {
    let ctx = TestContext::new();
    completed(&ctx, 5, "a.csv", 1);
    ctx.objects.set_fail_writes(true);

    assert!(ctx.reports().run().await.is_err());

    let sent = ctx.notifier.sent();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].subject.starts_with("ERROR:"));
}

#[tokio::test]
async fn test_notifier_outage_returns_original_error() {
    let ctx = TestContext::new();
    ctx.notifier.set_should_fail(true);

    let err = ctx.reports().run().await.unwrap_err();
    assert_eq!(err.error_code(), Some("STORE_003"));

    // Report notification attempt, then the error notification attempt
    let sent = ctx.notifier.sent();
    assert_eq!(sent.len(), 2);
    assert!(sent[1].subject.starts_with("ERROR:"));
}

async fn run_with_cursors(cursors: &[&str]) -> (String, RecordingNotifier, InMemoryObjectStore) {
    let objects = InMemoryObjectStore::new();
    let notifier = RecordingNotifier::new();
    let generator = ReportGenerator::new(
        Arc::new(CyclingCursorMetadataStore::new(cursors.iter().copied())),
        Arc::new(objects.clone()),
        Arc::new(notifier.clone()),
        REPORTS_BUCKET,
        ENVIRONMENT,
        Arc::new(FixedClock(frozen_now())),
    );

    let err = generator.run().await.unwrap_err();
    (err.to_string(), notifier, objects)
}

#[tokio::test]
async fn test_cursor_that_does_not_advance_is_an_error() {
    let (err, notifier, objects) = run_with_cursors(&["same"]).await;

    assert!(err.contains("did not advance"));
    assert_eq!(notifier.sent().len(), 1);
    assert!(objects.keys(REPORTS_BUCKET).is_empty());
}

#[tokio::test]
async fn test_cursor_cycle_is_an_error() {
    let (err, notifier, objects) = run_with_cursors(&["page-a", "page-b"]).await;

    assert!(err.contains("page-a was already visited"));
    assert!(notifier.sent()[0].subject.starts_with("ERROR:"));
    assert!(objects.keys(REPORTS_BUCKET).is_empty());
}

#[tokio::test]
async fn test_ingest_then_report() {
    let ctx = TestContext::new();
    ctx.upload("jan.csv", &fixtures::csv_rows(7));
    ctx.upload("feb.csv", &fixtures::csv_rows(2));

    let outcome = ctx
        .ingestion()
        .process_batch(&[
            fixtures::upload_envelope(UPLOAD_BUCKET, "jan.csv", 700),
            fixtures::upload_envelope(UPLOAD_BUCKET, "feb.csv", 200),
            fixtures::upload_envelope(UPLOAD_BUCKET, "mar.csv", 100),
        ])
        .await;
    assert_eq!(outcome.successful, 2);
    assert_eq!(outcome.failed, 1);

    let report = ctx.reports().run().await.unwrap();
    assert_eq!(report.summary.total_files_processed, 3);
    assert_eq!(report.summary.successful_files, 2);
    assert_eq!(report.summary.failed_files, 1);
    assert_eq!(report.summary.total_records_processed, 9);
    assert_eq!(report.summary.total_data_size_bytes, 1000);
    assert_eq!(report.summary.success_rate_percent, 66.67);

    let json = ctx.objects.get_json(REPORTS_BUCKET, JSON_KEY).unwrap();
    assert_eq!(json["hourly_breakdown"]["2024-07-15 06:00"]["count"], 3);
    assert_eq!(json["errors"][0]["fileName"], "mar.csv");
    assert_eq!(json["top_files"][0]["fileName"], "jan.csv");
}
