//! Error types for Tidemark operations.

use thiserror::Error;

/// Extract the full error message from a tokio_postgres::Error,
/// including the underlying DbError details that Display hides.
pub fn format_db_error(e: &tokio_postgres::Error) -> String {
    if let Some(db_err) = e.as_db_error() {
        let mut msg = db_err.message().to_string();
        if let Some(detail) = db_err.detail() {
            msg.push_str(&format!("\n  Detail: {}", detail));
        }
        if let Some(hint) = db_err.hint() {
            msg.push_str(&format!("\n  Hint: {}", hint));
        }
        if let Some(position) = db_err.position() {
            msg.push_str(&format!("\n  Position: {:?}", position));
        }
        return msg;
    }
    // Fallback: walk the source chain
    let mut msg = e.to_string();
    let mut source = std::error::Error::source(e);
    while let Some(s) = source {
        msg.push_str(&format!(": {}", s));
        source = s.source();
    }
    if e.is_closed() {
        msg.push_str("\n  Note: The database connection was closed unexpectedly. This may indicate a network issue or server restart.");
    }
    msg
}

/// All error types that Tidemark operations can produce.
#[derive(Error, Debug)]
pub enum TidemarkError {
    /// Invalid or missing configuration (TOML parse errors, missing required fields, etc.).
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// A database query failed.
    #[error("Database error: {}", format_db_error(.0))]
    DatabaseError(#[from] tokio_postgres::Error),

    /// The connection pool could not be built or could not hand out a connection.
    #[error("Connection pool error: {0}")]
    PoolError(String),

    /// The database connection was lost during an operation.
    #[error("Connection lost during {operation}: {detail}")]
    ConnectionLost { operation: String, detail: String },

    /// A filesystem I/O operation failed without a known path.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// A filesystem I/O operation on a specific path failed.
    #[error("IO error on {path}: {source}")]
    FileError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// A migration file is malformed (missing or misordered Up/Down sections).
    #[error("Migration parse error in {file}: {reason}")]
    MigrationParseError { file: String, reason: String },

    /// A desired-state schema file could not be parsed.
    #[error("Schema model error in {path}: {reason}")]
    ModelParseError { path: String, reason: String },

    /// An operation could not be turned into SQL.
    #[error("SQL synthesis failed: {0}")]
    SynthesisError(String),

    /// Refused to overwrite an existing migration file.
    #[error("Migration file {path} already exists")]
    MigrationExists { path: String },

    /// The forward SQL of a migration failed to execute.
    #[error("Migration failed for {script}: {reason}")]
    MigrationFailed { script: String, reason: String },

    /// The rollback SQL of a migration failed to execute; the migration stays applied.
    #[error("Rollback failed for {script}: {reason}")]
    RollbackFailed { script: String, reason: String },

    /// Previously failed migrations block any further apply until resolved.
    #[error("{count} failed migration(s) must be resolved before applying: {scripts}")]
    FailedMigrationsPresent { count: usize, scripts: String },
}

impl TidemarkError {
    /// Wrap an I/O error with the path it occurred on.
    pub fn file(path: impl AsRef<std::path::Path>, source: std::io::Error) -> Self {
        TidemarkError::FileError {
            path: path.as_ref().display().to_string(),
            source,
        }
    }
}

/// Convenience type alias for `Result<T, TidemarkError>`.
pub type Result<T> = std::result::Result<T, TidemarkError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_error_includes_path() {
        let err = TidemarkError::file(
            "migrations/20240101000000_migration.sql",
            std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
        );
        let msg = err.to_string();
        assert!(msg.contains("migrations/20240101000000_migration.sql"));
        assert!(msg.contains("missing"));
    }

    #[test]
    fn test_failed_gate_message_lists_scripts() {
        let err = TidemarkError::FailedMigrationsPresent {
            count: 2,
            scripts: "a.sql, b.sql".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "2 failed migration(s) must be resolved before applying: a.sql, b.sql"
        );
    }
}
