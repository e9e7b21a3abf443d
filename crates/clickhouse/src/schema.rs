//! ClickHouse table schemas.
//!
//! The metadata table is a ReplacingMergeTree keyed by record id, so each
//! write replaces the whole row and `FINAL` reads see only the latest one.

/// SQL for creating the database.
pub fn create_database(database: &str) -> String {
    format!("CREATE DATABASE IF NOT EXISTS {}", database)
}

/// SQL for creating the metadata table.
pub fn create_metadata_table(qualified_table: &str) -> String {
    format!(
        r#"
CREATE TABLE IF NOT EXISTS {} (
    record_id String,
    source_name String,
    source_bucket String,
    status LowCardinality(String),
    upload_timestamp Int64,
    size_bytes UInt64,
    last_updated String,
    output_location Nullable(String),
    record_count Nullable(UInt64),
    error_detail Nullable(String),

    -- Write sequence; the highest version wins on merge
    version UInt64
)
ENGINE = ReplacingMergeTree(version)
ORDER BY record_id
"#,
        qualified_table
    )
}

/// All DDL statements in execution order.
pub fn all_statements(database: &str, qualified_table: &str) -> Vec<String> {
    vec![
        create_database(database),
        create_metadata_table(qualified_table),
    ]
}
