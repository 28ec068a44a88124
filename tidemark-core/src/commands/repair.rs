//! Clear failed control rows so corrected files can be applied again.

use serde::Serialize;
use tokio_postgres::Client;

use crate::config::TidemarkConfig;
use crate::error::Result;
use crate::history::{self, LogLevel};

/// Report returned after a repair operation.
#[derive(Debug, Serialize)]
pub struct RepairReport {
    /// Filenames whose failed rows were removed.
    pub cleared: Vec<String>,
}

/// Execute the repair command.
pub async fn execute(client: &Client, config: &TidemarkConfig) -> Result<RepairReport> {
    let schema = &config.schema.database_schema;
    let executor = config.migrations.executor();
    history::create_control_tables(client, schema).await?;

    let failed = history::get_failed(client, schema).await?;
    if failed.is_empty() {
        log::info!("No failed migrations to repair; schema={}", schema);
        return Ok(RepairReport {
            cleared: Vec::new(),
        });
    }

    let removed = history::delete_failed(client, schema).await?;
    let cleared: Vec<String> = failed.into_iter().map(|r| r.filename).collect();
    log::warn!(
        "Removed failed migration records; count={}, scripts={}",
        removed,
        cleared.join(", ")
    );
    for filename in &cleared {
        history::insert_log(
            client,
            schema,
            LogLevel::Warn,
            "Failed migration record cleared",
            &executor,
            None,
            Some(filename),
        )
        .await?;
    }

    Ok(RepairReport { cleared })
}
