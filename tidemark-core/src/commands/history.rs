//! List control-table rows, most recent first.

use tokio_postgres::Client;

use crate::config::TidemarkConfig;
use crate::error::Result;
use crate::history::{self, MigrationRecord};

/// Execute the history command.
pub async fn execute(
    client: &Client,
    config: &TidemarkConfig,
    limit: u32,
    table_filter: Option<&str>,
) -> Result<Vec<MigrationRecord>> {
    let schema = &config.schema.database_schema;
    history::create_control_tables(client, schema).await?;
    history::get_history(client, schema, i64::from(limit), table_filter).await
}
