//! Reconcile the desired model against the live schema and synthesize SQL
//! without touching the database or the migrations directory.

use serde::Serialize;
use tokio_postgres::Client;

use crate::config::TidemarkConfig;
use crate::diff;
use crate::error::Result;
use crate::introspect;
use crate::model::{self, ExistingTable, Model};
use crate::operation::{self, Operation};
use crate::synth::SqlGenerator;

/// Operations and the SQL that would implement and reverse them.
#[derive(Debug, Serialize)]
pub struct PlanReport {
    /// Operations in the order they will run.
    pub operations: Vec<Operation>,
    /// Forward DDL, one statement per operation.
    pub forward: Vec<String>,
    /// Rollback DDL, last operation first.
    pub rollback: Vec<String>,
    /// Whether any differences were detected.
    pub has_changes: bool,
    /// Number of operations that can lose data.
    pub destructive: usize,
}

/// Build a plan from already-loaded desired and observed state.
pub fn build_plan(
    config: &TidemarkConfig,
    desired: &[Model],
    existing: &[ExistingTable],
) -> Result<PlanReport> {
    let mut operations = diff::reconcile(desired, existing);
    if config.synthesis.phase_ordering {
        operations = operation::order_by_phase(operations);
    }

    let generator = SqlGenerator::new(config.synthesis.clone());
    let forward = generator.forward(&operations)?;
    let rollback = generator.rollback(&operations)?;
    let destructive = operations.iter().filter(|op| op.is_destructive()).count();

    for op in &operations {
        log::debug!("Planned operation; op={}", op);
    }

    Ok(PlanReport {
        has_changes: !operations.is_empty(),
        operations,
        forward,
        rollback,
        destructive,
    })
}

/// Execute the plan command.
pub async fn execute(client: &Client, config: &TidemarkConfig) -> Result<PlanReport> {
    let desired = model::load_desired_models(&config.schema.paths)?;
    let existing =
        introspect::introspect_existing(client, &config.schema.database_schema).await?;
    log::info!(
        "Reconciling schema; desired_tables={}, existing_tables={}, schema={}",
        desired.len(),
        existing.len(),
        config.schema.database_schema
    );
    build_plan(config, &desired, &existing)
}
