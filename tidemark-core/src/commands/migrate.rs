//! Apply pending migration files to the database.

use serde::Serialize;
use tokio_postgres::Client;

use crate::config::TidemarkConfig;
use crate::db;
use crate::error::{format_db_error, Result, TidemarkError};
use crate::history::{self, LogLevel, NewRecord, STATUS_FAILED, STATUS_SUCCESS};
use crate::migration_file::{self, checksum};
use crate::sql_parser;

/// Report returned after a migrate operation.
#[derive(Debug, Serialize)]
pub struct MigrateReport {
    /// Number of migrations that were applied in this run.
    pub migrations_applied: usize,
    /// Total execution time of all migrations in milliseconds.
    pub total_time_ms: f64,
    /// Per-migration details for each applied migration.
    pub details: Vec<MigrateDetail>,
}

/// Details of a single applied migration within a migrate run.
#[derive(Debug, Serialize)]
pub struct MigrateDetail {
    pub filename: String,
    pub checksum: String,
    pub table_affected: Option<String>,
    pub execution_time_ms: f64,
}

/// Execute the migrate command.
///
/// Any `failed` row in the control table blocks the whole pass. Pending
/// files run in lexicographic order; the first failure is recorded and stops
/// the pass, leaving earlier files applied.
pub async fn execute(client: &Client, config: &TidemarkConfig) -> Result<MigrateReport> {
    let schema = &config.schema.database_schema;
    let executor = config.migrations.executor();

    history::create_control_tables(client, schema).await?;

    let failed = history::get_failed(client, schema).await?;
    if !failed.is_empty() {
        let scripts = failed
            .iter()
            .map(|r| r.filename.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        log::error!(
            "Failed migrations block apply; count={}, scripts={}",
            failed.len(),
            scripts
        );
        history::insert_log_best_effort(
            client,
            schema,
            LogLevel::Error,
            "Apply aborted: failed migrations must be resolved first",
            &executor,
            Some(&scripts),
            None,
        )
        .await;
        return Err(TidemarkError::FailedMigrationsPresent {
            count: failed.len(),
            scripts,
        });
    }

    let files = migration_file::list_migration_files(&config.migrations.directory)?;
    let records = history::get_records(client, schema).await?;
    let pending = history::pending_files(&files, &records);

    let mut report = MigrateReport {
        migrations_applied: 0,
        total_time_ms: 0.0,
        details: Vec::new(),
    };

    if pending.is_empty() {
        log::info!("No pending migrations; schema={}", schema);
        return Ok(report);
    }

    for filename in &pending {
        let detail = apply_file(client, config, filename, &executor).await?;
        report.total_time_ms += detail.execution_time_ms;
        report.migrations_applied += 1;
        report.details.push(detail);
    }

    log::info!(
        "Migrations applied; count={}, total_time_ms={:.1}",
        report.migrations_applied,
        report.total_time_ms
    );
    Ok(report)
}

async fn apply_file(
    client: &Client,
    config: &TidemarkConfig,
    filename: &str,
    executor: &str,
) -> Result<MigrateDetail> {
    let schema = &config.schema.database_schema;
    log::info!("Applying migration; migration={}, schema={}", filename, schema);
    history::insert_log_best_effort(
        client,
        schema,
        LogLevel::Info,
        "Applying migration",
        executor,
        None,
        Some(filename),
    )
    .await;

    let path = config.migrations.directory.join(filename);
    let parsed = match migration_file::read_migration(&path) {
        Ok(p) => p,
        Err(e) => {
            log::error!("Migration file unreadable; migration={}, error={}", filename, e);
            history::insert_log_best_effort(
                client,
                schema,
                LogLevel::Error,
                "Migration file could not be parsed",
                executor,
                Some(&e.to_string()),
                Some(filename),
            )
            .await;
            return Err(e);
        }
    };

    let sql = parsed.up;
    let sum = checksum(&sql);
    let table_affected = sql_parser::table_affected_summary(&sql);

    let start = std::time::Instant::now();
    match db::execute_block(client, &sql, config.migrations.transactional).await {
        Ok(exec_time) => {
            history::insert_record(
                client,
                schema,
                &NewRecord {
                    filename,
                    execution_time_ms: exec_time,
                    executed_by: executor,
                    status: STATUS_SUCCESS,
                    error_message: None,
                    checksum: &sum,
                    table_affected: table_affected.as_deref(),
                },
            )
            .await?;
            history::insert_log_best_effort(
                client,
                schema,
                LogLevel::Success,
                "Migration applied",
                executor,
                Some(&format!("execution_time_ms={:.1}", exec_time)),
                Some(filename),
            )
            .await;
            log::info!(
                "Migration applied; migration={}, execution_time_ms={:.1}",
                filename,
                exec_time
            );

            Ok(MigrateDetail {
                filename: filename.to_string(),
                checksum: sum,
                table_affected,
                execution_time_ms: exec_time,
            })
        }
        Err(e) => {
            let elapsed = start.elapsed().as_secs_f64() * 1000.0;
            let reason = match &e {
                TidemarkError::DatabaseError(db_err) => format_db_error(db_err),
                other => other.to_string(),
            };

            if let Err(record_err) = history::insert_record(
                client,
                schema,
                &NewRecord {
                    filename,
                    execution_time_ms: elapsed,
                    executed_by: executor,
                    status: STATUS_FAILED,
                    error_message: Some(&reason),
                    checksum: &sum,
                    table_affected: table_affected.as_deref(),
                },
            )
            .await
            {
                log::warn!(
                    "Failed to record migration failure in control table; migration={}, error={}",
                    filename,
                    record_err
                );
            }
            history::insert_log_best_effort(
                client,
                schema,
                LogLevel::Error,
                "Migration failed",
                executor,
                Some(&reason),
                Some(filename),
            )
            .await;

            log::error!("Migration failed; migration={}, reason={}", filename, reason);
            if db::is_transient_error(&e) {
                return Err(TidemarkError::ConnectionLost {
                    operation: format!("applying {}", filename),
                    detail: reason,
                });
            }
            Err(TidemarkError::MigrationFailed {
                script: filename.to_string(),
                reason,
            })
        }
    }
}
