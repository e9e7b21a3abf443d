//! ClickHouse health checks.

use crate::client::ClickHouseClient;
use crate::schema::all_statements;
use pipeline_core::{Error, Result};
use tracing::{debug, error};

/// Check ClickHouse connection health.
pub async fn check_connection(client: &ClickHouseClient) -> bool {
    match client.inner().query("SELECT 1").fetch_one::<u8>().await {
        Ok(_) => {
            debug!("ClickHouse connection healthy");
            true
        }
        Err(e) => {
            error!("ClickHouse health check failed: {}", e);
            false
        }
    }
}

/// Initialize the database and metadata table.
pub async fn init_schema(client: &ClickHouseClient, table: &str) -> Result<()> {
    // The configured database may not exist yet
    let bootstrap = client.inner().clone().with_database("default");
    let database = client.config().database.clone();

    for ddl in all_statements(&database, &client.qualified(table)) {
        bootstrap
            .query(&ddl)
            .execute()
            .await
            .map_err(|e| Error::metadata_store(format!("Failed to execute DDL: {}", e)))?;
    }

    debug!(table = table, "ClickHouse schema initialized");
    Ok(())
}
