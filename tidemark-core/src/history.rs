//! Control table (`schema_migrations`) and audit log (`migration_logs`) operations.

use std::collections::HashSet;

use chrono::NaiveDateTime;
use serde::Serialize;
use tokio_postgres::{Client, Row};

use crate::db::{qualified, quote_ident};
use crate::error::Result;

/// Table tracking applied and failed migration files.
pub const CONTROL_TABLE: &str = "schema_migrations";
/// Append-only audit log table.
pub const LOG_TABLE: &str = "migration_logs";

pub const STATUS_SUCCESS: &str = "success";
pub const STATUS_FAILED: &str = "failed";

/// A row from the control table.
#[derive(Debug, Clone, Serialize)]
pub struct MigrationRecord {
    pub id: i32,
    pub filename: String,
    pub applied_at: Option<NaiveDateTime>,
    /// Execution time in milliseconds.
    pub execution_time_ms: Option<f64>,
    pub executed_by: Option<String>,
    pub status: String,
    pub error_message: Option<String>,
    pub checksum: Option<String>,
    pub table_affected: Option<String>,
}

impl MigrationRecord {
    pub fn is_failed(&self) -> bool {
        self.status == STATUS_FAILED
    }

    fn from_row(row: &Row) -> Self {
        Self {
            id: row.get(0),
            filename: row.get(1),
            applied_at: row.get(2),
            execution_time_ms: row.get(3),
            executed_by: row.get(4),
            status: row.get(5),
            error_message: row.get(6),
            checksum: row.get(7),
            table_affected: row.get(8),
        }
    }
}

/// Values for a new control-table row.
#[derive(Debug, Clone)]
pub struct NewRecord<'a> {
    pub filename: &'a str,
    pub execution_time_ms: f64,
    pub executed_by: &'a str,
    pub status: &'a str,
    pub error_message: Option<&'a str>,
    pub checksum: &'a str,
    pub table_affected: Option<&'a str>,
}

/// Severity of an audit log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LogLevel {
    Info,
    Error,
    Success,
    Warn,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Info => "INFO",
            LogLevel::Error => "ERROR",
            LogLevel::Success => "SUCCESS",
            LogLevel::Warn => "WARN",
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A row from the audit log.
#[derive(Debug, Clone, Serialize)]
pub struct MigrationLogEntry {
    pub id: i32,
    pub timestamp: Option<NaiveDateTime>,
    pub level: String,
    pub message: String,
    pub user_name: Option<String>,
    pub details: Option<String>,
    pub migration_name: Option<String>,
}

/// Create both control tables if they do not exist.
pub async fn create_control_tables(client: &Client, schema: &str) -> Result<()> {
    let sql = format!(
        r#"
CREATE TABLE IF NOT EXISTS {control} (
    id SERIAL PRIMARY KEY,
    filename TEXT UNIQUE NOT NULL,
    applied_at TIMESTAMP DEFAULT now(),
    execution_time INTERVAL,
    executed_by TEXT,
    status TEXT DEFAULT 'success',
    error_message TEXT,
    checksum TEXT,
    table_affected TEXT
);

CREATE TABLE IF NOT EXISTS {logs} (
    id SERIAL PRIMARY KEY,
    timestamp TIMESTAMP DEFAULT now(),
    level TEXT NOT NULL,
    message TEXT NOT NULL,
    user_name TEXT,
    details TEXT,
    migration_name TEXT
);
"#,
        control = qualified(schema, CONTROL_TABLE),
        logs = qualified(schema, LOG_TABLE),
    );

    client.batch_execute(&sql).await?;
    Ok(())
}

fn record_select(schema: &str) -> String {
    format!(
        "SELECT id, filename, applied_at, \
         (EXTRACT(EPOCH FROM execution_time) * 1000)::float8, \
         executed_by, COALESCE(status, '{success}'), error_message, checksum, table_affected \
         FROM {fq}",
        success = STATUS_SUCCESS,
        fq = qualified(schema, CONTROL_TABLE),
    )
}

/// All control rows, oldest first.
pub async fn get_records(client: &Client, schema: &str) -> Result<Vec<MigrationRecord>> {
    let sql = format!("{} ORDER BY applied_at, id", record_select(schema));
    let rows = client.query(&sql, &[]).await?;
    Ok(rows.iter().map(MigrationRecord::from_row).collect())
}

/// Rows with status `failed`, oldest first.
pub async fn get_failed(client: &Client, schema: &str) -> Result<Vec<MigrationRecord>> {
    let sql = format!(
        "{} WHERE status = $1 ORDER BY applied_at, id",
        record_select(schema)
    );
    let rows = client.query(&sql, &[&STATUS_FAILED]).await?;
    Ok(rows.iter().map(MigrationRecord::from_row).collect())
}

/// Successfully applied rows, most recent first (ties broken by id).
pub async fn get_applied_desc(client: &Client, schema: &str) -> Result<Vec<MigrationRecord>> {
    let sql = format!(
        "{} WHERE COALESCE(status, '{}') = $1 ORDER BY applied_at DESC, id DESC",
        record_select(schema),
        STATUS_SUCCESS
    );
    let rows = client.query(&sql, &[&STATUS_SUCCESS]).await?;
    Ok(rows.iter().map(MigrationRecord::from_row).collect())
}

/// Insert one control row for an apply attempt.
pub async fn insert_record(client: &Client, schema: &str, record: &NewRecord<'_>) -> Result<()> {
    let sql = format!(
        "INSERT INTO {} \
         (filename, execution_time, executed_by, status, error_message, checksum, table_affected) \
         VALUES ($1, $2::float8 * interval '1 millisecond', $3, $4, $5, $6, $7)",
        qualified(schema, CONTROL_TABLE)
    );
    client
        .execute(
            &sql,
            &[
                &record.filename,
                &record.execution_time_ms,
                &record.executed_by,
                &record.status,
                &record.error_message,
                &record.checksum,
                &record.table_affected,
            ],
        )
        .await?;
    Ok(())
}

/// Delete the success row for `filename`, returning the number of rows removed.
pub async fn delete_applied(client: &Client, schema: &str, filename: &str) -> Result<u64> {
    let sql = format!(
        "DELETE FROM {} WHERE filename = $1 AND COALESCE(status, '{}') = $2",
        qualified(schema, CONTROL_TABLE),
        STATUS_SUCCESS
    );
    Ok(client.execute(&sql, &[&filename, &STATUS_SUCCESS]).await?)
}

/// Delete every failed row, returning the number removed.
pub async fn delete_failed(client: &Client, schema: &str) -> Result<u64> {
    let sql = format!(
        "DELETE FROM {} WHERE status = $1",
        qualified(schema, CONTROL_TABLE)
    );
    Ok(client.execute(&sql, &[&STATUS_FAILED]).await?)
}

/// Append one audit log row.
pub async fn insert_log(
    client: &Client,
    schema: &str,
    level: LogLevel,
    message: &str,
    user: &str,
    details: Option<&str>,
    migration: Option<&str>,
) -> Result<()> {
    let sql = format!(
        "INSERT INTO {} (level, message, user_name, details, migration_name) \
         VALUES ($1, $2, $3, $4, $5)",
        qualified(schema, LOG_TABLE)
    );
    client
        .execute(
            &sql,
            &[&level.as_str(), &message, &user, &details, &migration],
        )
        .await?;
    Ok(())
}

/// Audit write that must not mask an earlier failure.
pub async fn insert_log_best_effort(
    client: &Client,
    schema: &str,
    level: LogLevel,
    message: &str,
    user: &str,
    details: Option<&str>,
    migration: Option<&str>,
) {
    if let Err(e) = insert_log(client, schema, level, message, user, details, migration).await {
        log::warn!(
            "Failed to write audit log entry; level={}, migration={}, error={}",
            level,
            migration.unwrap_or("-"),
            e
        );
    }
}

/// Escape LIKE wildcards so the filter matches a literal substring.
fn like_substring(filter: &str) -> String {
    let escaped = filter
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

/// Control rows most recent first, optionally filtered by a
/// case-insensitive substring of `table_affected`.
pub async fn get_history(
    client: &Client,
    schema: &str,
    limit: i64,
    table_filter: Option<&str>,
) -> Result<Vec<MigrationRecord>> {
    let rows = match table_filter {
        Some(filter) => {
            let sql = format!(
                "{} WHERE table_affected ILIKE $2 ORDER BY applied_at DESC, id DESC LIMIT $1",
                record_select(schema)
            );
            client
                .query(&sql, &[&limit, &like_substring(filter)])
                .await?
        }
        None => {
            let sql = format!(
                "{} ORDER BY applied_at DESC, id DESC LIMIT $1",
                record_select(schema)
            );
            client.query(&sql, &[&limit]).await?
        }
    };
    Ok(rows.iter().map(MigrationRecord::from_row).collect())
}

/// Audit log rows most recent first.
pub async fn get_logs(client: &Client, schema: &str, limit: i64) -> Result<Vec<MigrationLogEntry>> {
    let sql = format!(
        "SELECT id, {ts}, level, message, user_name, details, migration_name \
         FROM {fq} ORDER BY {ts} DESC, id DESC LIMIT $1",
        ts = quote_ident("timestamp"),
        fq = qualified(schema, LOG_TABLE),
    );
    let rows = client.query(&sql, &[&limit]).await?;
    Ok(rows
        .iter()
        .map(|row| MigrationLogEntry {
            id: row.get(0),
            timestamp: row.get(1),
            level: row.get(2),
            message: row.get(3),
            user_name: row.get(4),
            details: row.get(5),
            migration_name: row.get(6),
        })
        .collect())
}

/// Files on disk with no control row. Failed files are not pending:
/// they stay blocked until repaired.
pub fn pending_files(files: &[String], records: &[MigrationRecord]) -> Vec<String> {
    let recorded: HashSet<&str> = records.iter().map(|r| r.filename.as_str()).collect();
    files
        .iter()
        .filter(|f| !recorded.contains(f.as_str()))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(filename: &str, status: &str) -> MigrationRecord {
        MigrationRecord {
            id: 1,
            filename: filename.to_string(),
            applied_at: None,
            execution_time_ms: Some(1.5),
            executed_by: Some("ci".to_string()),
            status: status.to_string(),
            error_message: None,
            checksum: None,
            table_affected: None,
        }
    }

    #[test]
    fn test_pending_excludes_applied_and_failed() {
        let files = vec![
            "20240101000000_migration.sql".to_string(),
            "20240102000000_migration.sql".to_string(),
            "20240103000000_migration.sql".to_string(),
        ];
        let records = vec![
            record("20240101000000_migration.sql", STATUS_SUCCESS),
            record("20240102000000_migration.sql", STATUS_FAILED),
        ];
        assert_eq!(
            pending_files(&files, &records),
            vec!["20240103000000_migration.sql"]
        );
    }

    #[test]
    fn test_pending_keeps_disk_order() {
        let files = vec!["a.sql".to_string(), "b.sql".to_string()];
        assert_eq!(pending_files(&files, &[]), files);
    }

    #[test]
    fn test_record_is_failed() {
        assert!(record("x.sql", STATUS_FAILED).is_failed());
        assert!(!record("x.sql", STATUS_SUCCESS).is_failed());
    }

    #[test]
    fn test_like_substring_escapes_wildcards() {
        assert_eq!(like_substring("users"), "%users%");
        assert_eq!(like_substring("user_roles"), "%user\\_roles%");
        assert_eq!(like_substring("100%"), "%100\\%%");
    }

    #[test]
    fn test_log_level_strings() {
        assert_eq!(LogLevel::Info.to_string(), "INFO");
        assert_eq!(LogLevel::Error.as_str(), "ERROR");
        assert_eq!(LogLevel::Success.as_str(), "SUCCESS");
        assert_eq!(LogLevel::Warn.as_str(), "WARN");
    }
}
