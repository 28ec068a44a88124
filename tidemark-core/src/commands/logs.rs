//! List audit log entries, most recent first.

use tokio_postgres::Client;

use crate::config::TidemarkConfig;
use crate::error::Result;
use crate::history::{self, MigrationLogEntry};

/// Execute the logs command.
pub async fn execute(
    client: &Client,
    config: &TidemarkConfig,
    limit: u32,
) -> Result<Vec<MigrationLogEntry>> {
    let schema = &config.schema.database_schema;
    history::create_control_tables(client, schema).await?;
    history::get_logs(client, schema, i64::from(limit)).await
}
