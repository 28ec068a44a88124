//! Roll back the most recently applied migrations using their Down blocks.

use serde::Serialize;
use tokio_postgres::Client;

use crate::config::TidemarkConfig;
use crate::db;
use crate::error::{format_db_error, Result, TidemarkError};
use crate::history::{self, LogLevel, MigrationRecord};
use crate::migration_file;

/// Report returned after a rollback operation.
#[derive(Debug, Serialize)]
pub struct RollbackReport {
    /// Steps asked for by the caller.
    pub requested: usize,
    /// Number of migrations that were rolled back.
    pub migrations_rolled_back: usize,
    /// Total execution time of all Down blocks in milliseconds.
    pub total_time_ms: f64,
    /// Per-migration details, most recent first.
    pub details: Vec<RollbackDetail>,
}

/// Details of a single rolled-back migration.
#[derive(Debug, Serialize)]
pub struct RollbackDetail {
    pub filename: String,
    pub execution_time_ms: f64,
}

/// Take the first `steps` of the newest-first applied list, warning when
/// fewer are available than requested.
fn select_for_rollback(applied_desc: Vec<MigrationRecord>, steps: usize) -> Vec<MigrationRecord> {
    if steps > applied_desc.len() {
        log::warn!(
            "Fewer applied migrations than requested; requested={}, available={}",
            steps,
            applied_desc.len()
        );
    }
    applied_desc.into_iter().take(steps).collect()
}

/// Execute the rollback command.
///
/// Runs each Down block newest first and deletes its control row. The first
/// failure stops the pass; the failing migration stays recorded as applied.
pub async fn execute(client: &Client, config: &TidemarkConfig, steps: usize) -> Result<RollbackReport> {
    let schema = &config.schema.database_schema;
    let executor = config.migrations.executor();

    history::create_control_tables(client, schema).await?;

    let applied = history::get_applied_desc(client, schema).await?;
    let targets = select_for_rollback(applied, steps);

    let mut report = RollbackReport {
        requested: steps,
        migrations_rolled_back: 0,
        total_time_ms: 0.0,
        details: Vec::new(),
    };

    for record in &targets {
        let filename = record.filename.as_str();
        log::info!("Rolling back migration; migration={}, schema={}", filename, schema);

        let path = config.migrations.directory.join(filename);
        let parsed = match migration_file::read_migration(&path) {
            Ok(p) => p,
            Err(e) => {
                log::error!("Migration file unreadable; migration={}, error={}", filename, e);
                history::insert_log_best_effort(
                    client,
                    schema,
                    LogLevel::Error,
                    "Rollback aborted: migration file could not be read",
                    &executor,
                    Some(&e.to_string()),
                    Some(filename),
                )
                .await;
                return Err(e);
            }
        };

        match db::execute_block(client, &parsed.down, config.migrations.transactional).await {
            Ok(exec_time) => {
                history::delete_applied(client, schema, filename).await?;
                history::insert_log_best_effort(
                    client,
                    schema,
                    LogLevel::Success,
                    "Migration rolled back",
                    &executor,
                    Some(&format!("execution_time_ms={:.1}", exec_time)),
                    Some(filename),
                )
                .await;
                log::info!(
                    "Migration rolled back; migration={}, execution_time_ms={:.1}",
                    filename,
                    exec_time
                );
                report.migrations_rolled_back += 1;
                report.total_time_ms += exec_time;
                report.details.push(RollbackDetail {
                    filename: filename.to_string(),
                    execution_time_ms: exec_time,
                });
            }
            Err(e) => {
                let reason = match &e {
                    TidemarkError::DatabaseError(db_err) => format_db_error(db_err),
                    other => other.to_string(),
                };
                history::insert_log_best_effort(
                    client,
                    schema,
                    LogLevel::Error,
                    "Rollback failed",
                    &executor,
                    Some(&reason),
                    Some(filename),
                )
                .await;
                log::error!("Rollback failed; migration={}, reason={}", filename, reason);
                if db::is_transient_error(&e) {
                    return Err(TidemarkError::ConnectionLost {
                        operation: format!("rolling back {}", filename),
                        detail: reason,
                    });
                }
                return Err(TidemarkError::RollbackFailed {
                    script: filename.to_string(),
                    reason,
                });
            }
        }
    }

    Ok(report)
}
