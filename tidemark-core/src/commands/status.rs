//! Show which migration files are applied, pending, or failed.

use serde::Serialize;
use tokio_postgres::Client;

use crate::config::TidemarkConfig;
use crate::error::Result;
use crate::history::{self, MigrationRecord};
use crate::migration_file;

/// Applied, pending and failed migrations, as seen from disk and the control table.
#[derive(Debug, Serialize)]
pub struct StatusReport {
    /// Successfully applied filenames, oldest first.
    pub applied: Vec<String>,
    /// Files on disk with no control row, in apply order.
    pub pending: Vec<String>,
    /// Control rows with status `failed`.
    pub failed: Vec<MigrationRecord>,
    /// Applied filenames whose file is no longer on disk.
    pub missing: Vec<String>,
}

impl StatusReport {
    fn build(files: &[String], records: Vec<MigrationRecord>) -> Self {
        let pending = history::pending_files(files, &records);
        let (failed, succeeded): (Vec<_>, Vec<_>) =
            records.into_iter().partition(|r| r.is_failed());
        let applied: Vec<String> = succeeded.into_iter().map(|r| r.filename).collect();
        let missing = applied
            .iter()
            .filter(|name| !files.contains(name))
            .cloned()
            .collect();
        StatusReport {
            applied,
            pending,
            failed,
            missing,
        }
    }
}

/// Execute the status command.
pub async fn execute(client: &Client, config: &TidemarkConfig) -> Result<StatusReport> {
    let schema = &config.schema.database_schema;
    history::create_control_tables(client, schema).await?;

    let files = migration_file::list_migration_files(&config.migrations.directory)?;
    let records = history::get_records(client, schema).await?;
    Ok(StatusReport::build(&files, records))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(filename: &str, status: &str) -> MigrationRecord {
        MigrationRecord {
            id: 0,
            filename: filename.to_string(),
            applied_at: None,
            execution_time_ms: None,
            executed_by: None,
            status: status.to_string(),
            error_message: None,
            checksum: None,
            table_affected: None,
        }
    }

    #[test]
    fn test_build_splits_states() {
        let files = vec![
            "20240101000000_migration.sql".to_string(),
            "20240102000000_migration.sql".to_string(),
            "20240103000000_migration.sql".to_string(),
        ];
        let records = vec![
            record("20231231000000_migration.sql", history::STATUS_SUCCESS),
            record("20240101000000_migration.sql", history::STATUS_SUCCESS),
            record("20240102000000_migration.sql", history::STATUS_FAILED),
        ];

        let report = StatusReport::build(&files, records);
        assert_eq!(
            report.applied,
            vec!["20231231000000_migration.sql", "20240101000000_migration.sql"]
        );
        assert_eq!(report.pending, vec!["20240103000000_migration.sql"]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].filename, "20240102000000_migration.sql");
        assert_eq!(report.missing, vec!["20231231000000_migration.sql"]);
    }
}
