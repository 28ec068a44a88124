//! Plan, then persist the synthesized SQL as a new migration file.

use serde::Serialize;
use tokio_postgres::Client;

use crate::commands::plan::{self, PlanReport};
use crate::config::TidemarkConfig;
use crate::error::Result;
use crate::migration_file;

/// Report returned by the generate command.
#[derive(Debug, Serialize)]
pub struct GenerateReport {
    pub plan: PlanReport,
    /// Path of the written migration file, `None` when there was nothing to write.
    pub path: Option<String>,
}

/// Write the plan to disk when it has changes.
pub fn write_plan(config: &TidemarkConfig, plan: PlanReport) -> Result<GenerateReport> {
    if !plan.has_changes {
        log::info!("Schema is up to date, no migration written");
        return Ok(GenerateReport { plan, path: None });
    }
    let path = migration_file::write_migration_file(
        &config.migrations.directory,
        &plan.forward,
        &plan.rollback,
    )?;
    Ok(GenerateReport {
        plan,
        path: Some(path.display().to_string()),
    })
}

/// Execute the generate command.
pub async fn execute(client: &Client, config: &TidemarkConfig) -> Result<GenerateReport> {
    let plan = plan::execute(client, config).await?;
    write_plan(config, plan)
}
