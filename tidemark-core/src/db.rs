//! Connection pool, TLS support, and SQL execution helpers.

use std::time::Duration;

use deadpool_postgres::{Manager, ManagerConfig, Object, Pool, RecyclingMethod};
use tokio_postgres::Client;

use crate::config::{DatabaseConfig, SslMode};
use crate::error::{Result, TidemarkError};

/// Quote a SQL identifier to prevent SQL injection.
///
/// Doubles any embedded double-quotes and wraps in double-quotes.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Validate that a SQL identifier contains only safe characters.
///
/// Returns an error for names with characters outside `[a-zA-Z0-9_]`.
pub fn validate_identifier(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(TidemarkError::ConfigError(
            "Identifier cannot be empty".to_string(),
        ));
    }
    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(TidemarkError::ConfigError(format!(
            "Identifier '{}' contains invalid characters. Only [a-zA-Z0-9_] are allowed.",
            name
        )));
    }
    Ok(())
}

/// Schema-qualified, quoted table name.
pub fn qualified(schema: &str, table: &str) -> String {
    format!("{}.{}", quote_ident(schema), quote_ident(table))
}

/// Build a rustls ClientConfig using the Mozilla CA bundle and ring crypto provider.
fn make_rustls_config() -> Result<rustls::ClientConfig> {
    let root_store =
        rustls::RootCertStore::from_iter(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    let config = rustls::ClientConfig::builder_with_provider(std::sync::Arc::new(
        rustls::crypto::ring::default_provider(),
    ))
    .with_safe_default_protocol_versions()
    .map_err(|e| TidemarkError::ConfigError(format!("TLS setup failed: {}", e)))?
    .with_root_certificates(root_store)
    .with_no_client_auth();
    Ok(config)
}

/// Check if a postgres error is a permanent authentication failure that should not be retried.
fn is_permanent_error(e: &tokio_postgres::Error) -> bool {
    if let Some(db_err) = e.as_db_error() {
        let code = db_err.code().code();
        // 28P01 = invalid_password, 28000 = invalid_authorization_specification
        return code == "28P01" || code == "28000";
    }
    false
}

/// Translate the connection string plus pool settings into a driver config.
///
/// A non-`public` schema becomes the session `search_path`, so synthesized
/// DDL with unqualified table names lands in the reconciled schema.
fn build_pg_config(
    conn_string: &str,
    db: &DatabaseConfig,
    schema: &str,
) -> Result<tokio_postgres::Config> {
    let mut pg_config: tokio_postgres::Config = conn_string
        .parse()
        .map_err(|e| TidemarkError::ConfigError(format!("Invalid connection string: {}", e)))?;

    if db.connect_timeout_secs > 0 {
        pg_config.connect_timeout(Duration::from_secs(db.connect_timeout_secs as u64));
    }
    if db.keepalive_secs > 0 {
        pg_config.keepalives(true);
        pg_config.keepalives_idle(Duration::from_secs(db.keepalive_secs as u64));
    }
    pg_config.ssl_mode(match db.ssl_mode {
        SslMode::Disable => tokio_postgres::config::SslMode::Disable,
        SslMode::Prefer => tokio_postgres::config::SslMode::Prefer,
        SslMode::Require => tokio_postgres::config::SslMode::Require,
    });
    if schema != "public" {
        validate_identifier(schema)?;
        pg_config.options(&format!("-c search_path={}", schema));
    }

    Ok(pg_config)
}

/// Build the connection pool. No connection is opened until first use.
pub fn build_pool(conn_string: &str, db: &DatabaseConfig, schema: &str) -> Result<Pool> {
    let pg_config = build_pg_config(conn_string, db, schema)?;
    let mut manager_config = ManagerConfig::default();
    manager_config.recycling_method = RecyclingMethod::Fast;

    let manager = match db.ssl_mode {
        SslMode::Disable => {
            Manager::from_config(pg_config, tokio_postgres::NoTls, manager_config)
        }
        SslMode::Prefer | SslMode::Require => {
            let tls = tokio_postgres_rustls::MakeRustlsConnect::new(make_rustls_config()?);
            Manager::from_config(pg_config, tls, manager_config)
        }
    };

    Pool::builder(manager)
        .max_size(db.pool_size)
        .build()
        .map_err(|e| TidemarkError::PoolError(e.to_string()))
}

/// Build the pool and verify it can hand out a live connection,
/// retrying up to `connect_retries` times with exponential backoff + jitter.
///
/// Each retry waits `min(2^attempt, 30) + rand(0..1000ms)` before the next attempt.
/// Authentication failures are not retried.
pub async fn connect_pool(conn_string: &str, db: &DatabaseConfig, schema: &str) -> Result<Pool> {
    let pool = build_pool(conn_string, db, schema)?;
    let retries = db.connect_retries;
    let mut last_err = None;

    for attempt in 0..=retries {
        if attempt > 0 {
            let base_delay = std::cmp::min(1u64 << attempt, 30);
            let jitter_ms = fastrand::u64(0..1000);
            let delay = Duration::from_secs(base_delay) + Duration::from_millis(jitter_ms);
            log::info!(
                "Connection attempt failed, retrying; attempt={}, max_attempts={}, delay_ms={}",
                attempt + 1,
                retries + 1,
                delay.as_millis() as u64
            );
            tokio::time::sleep(delay).await;
        }

        match pool.get().await {
            Ok(client) => {
                check_connection(&client).await?;
                if attempt > 0 {
                    log::info!(
                        "Connected successfully after retry; attempt={}, max_attempts={}",
                        attempt + 1,
                        retries + 1
                    );
                }
                return Ok(pool);
            }
            Err(deadpool_postgres::PoolError::Backend(e)) => {
                if is_permanent_error(&e) {
                    log::error!("Permanent connection error, not retrying: {}", e);
                    return Err(TidemarkError::DatabaseError(e));
                }
                last_err = Some(TidemarkError::DatabaseError(e));
            }
            Err(e) => {
                last_err = Some(TidemarkError::PoolError(e.to_string()));
            }
        }
    }

    Err(last_err.unwrap_or_else(|| {
        TidemarkError::PoolError("no connection attempt was made".to_string())
    }))
}

/// Check a connection out of the pool.
pub async fn get_client(pool: &Pool) -> Result<Object> {
    pool.get().await.map_err(|e| match e {
        deadpool_postgres::PoolError::Backend(e) => TidemarkError::DatabaseError(e),
        other => TidemarkError::PoolError(other.to_string()),
    })
}

/// Execute a SQL string within a transaction using SQL-level BEGIN/COMMIT.
/// Returns the execution time in milliseconds.
pub async fn execute_in_transaction(client: &Client, sql: &str) -> Result<f64> {
    let start = std::time::Instant::now();

    client.batch_execute("BEGIN").await?;

    match client.batch_execute(sql).await {
        Ok(()) => {
            client.batch_execute("COMMIT").await?;
        }
        Err(e) => {
            if let Err(rollback_err) = client.batch_execute("ROLLBACK").await {
                log::warn!("Failed to rollback transaction: {}", rollback_err);
            }
            return Err(TidemarkError::DatabaseError(e));
        }
    }

    Ok(start.elapsed().as_secs_f64() * 1000.0)
}

/// Execute SQL as a single batch without a transaction wrapper.
/// Returns the execution time in milliseconds.
pub async fn execute_raw(client: &Client, sql: &str) -> Result<f64> {
    let start = std::time::Instant::now();
    client.batch_execute(sql).await?;
    Ok(start.elapsed().as_secs_f64() * 1000.0)
}

/// Execute `sql` either as a plain batch or wrapped in BEGIN/COMMIT.
pub async fn execute_block(client: &Client, sql: &str, transactional: bool) -> Result<f64> {
    if transactional {
        execute_in_transaction(client, sql).await
    } else {
        execute_raw(client, sql).await
    }
}

/// Check if an error is a transient connection error that may be retried.
///
/// Detects PostgreSQL server shutdown codes, connection exception codes,
/// closed connections, and common network error message patterns.
pub fn is_transient_error(e: &TidemarkError) -> bool {
    match e {
        TidemarkError::DatabaseError(pg_err) => {
            if pg_err.is_closed() {
                return true;
            }
            if let Some(db_err) = pg_err.as_db_error() {
                let code = db_err.code().code();
                // 57P01 = admin_shutdown, 57P02 = crash_shutdown, 57P03 = cannot_connect_now
                // 08000 = connection_exception, 08003 = connection_does_not_exist,
                // 08006 = connection_failure
                return matches!(
                    code,
                    "57P01" | "57P02" | "57P03" | "08000" | "08003" | "08006"
                );
            }
            let msg = pg_err.to_string().to_lowercase();
            msg.contains("connection reset")
                || msg.contains("broken pipe")
                || msg.contains("connection closed")
                || msg.contains("unexpected eof")
        }
        TidemarkError::ConnectionLost { .. } | TidemarkError::PoolError(_) => true,
        _ => false,
    }
}

/// Verify the database connection is still alive with a minimal round-trip.
pub async fn check_connection(client: &Client) -> Result<()> {
    client
        .simple_query("")
        .await
        .map_err(|e| TidemarkError::ConnectionLost {
            operation: "health check".to_string(),
            detail: e.to_string(),
        })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_pg_config_applies_settings() {
        let db = DatabaseConfig {
            connect_timeout_secs: 7,
            keepalive_secs: 60,
            ssl_mode: SslMode::Require,
            ..Default::default()
        };
        let cfg = build_pg_config("postgres://u:p@localhost:5433/app", &db, "public").unwrap();
        assert_eq!(cfg.get_connect_timeout(), Some(&Duration::from_secs(7)));
        assert!(cfg.get_keepalives());
        assert_eq!(cfg.get_keepalives_idle(), Duration::from_secs(60));
        assert_eq!(
            cfg.get_ssl_mode(),
            tokio_postgres::config::SslMode::Require
        );
        assert_eq!(cfg.get_dbname(), Some("app"));
    }

    #[test]
    fn test_build_pg_config_zero_timeout_leaves_unset() {
        let db = DatabaseConfig {
            connect_timeout_secs: 0,
            keepalive_secs: 0,
            ssl_mode: SslMode::Disable,
            ..Default::default()
        };
        let cfg = build_pg_config("host=localhost user=admin dbname=mydb", &db, "public").unwrap();
        assert_eq!(cfg.get_connect_timeout(), None);
        assert_eq!(cfg.get_options(), None);
        assert_eq!(
            cfg.get_ssl_mode(),
            tokio_postgres::config::SslMode::Disable
        );
    }

    #[test]
    fn test_build_pg_config_rejects_garbage() {
        let db = DatabaseConfig::default();
        let err = build_pg_config("postgres://host:notaport/db", &db, "public").unwrap_err();
        assert!(matches!(err, TidemarkError::ConfigError(_)));
    }

    #[test]
    fn test_build_pg_config_sets_search_path_for_custom_schema() {
        let db = DatabaseConfig::default();
        let cfg = build_pg_config("host=localhost user=admin", &db, "tenant_a").unwrap();
        assert_eq!(cfg.get_options(), Some("-c search_path=tenant_a"));

        let err = build_pg_config("host=localhost user=admin", &db, "bad-schema").unwrap_err();
        assert!(matches!(err, TidemarkError::ConfigError(_)));
    }

    #[test]
    fn test_build_pool_is_lazy() {
        let db = DatabaseConfig {
            pool_size: 2,
            ssl_mode: SslMode::Disable,
            ..Default::default()
        };
        let pool = build_pool("postgres://nobody@127.0.0.1:1/none", &db, "public").unwrap();
        assert_eq!(pool.status().max_size, 2);
        assert_eq!(pool.status().size, 0);
    }

    #[test]
    fn test_transient_error_connection_lost() {
        let err = TidemarkError::ConnectionLost {
            operation: "test".to_string(),
            detail: "gone".to_string(),
        };
        assert!(is_transient_error(&err));
    }

    #[test]
    fn test_transient_error_config_is_not_transient() {
        let err = TidemarkError::ConfigError("bad config".to_string());
        assert!(!is_transient_error(&err));
    }

    #[test]
    fn test_transient_error_migration_failed_is_not_transient() {
        let err = TidemarkError::MigrationFailed {
            script: "20240101000000_migration.sql".to_string(),
            reason: "syntax error".to_string(),
        };
        assert!(!is_transient_error(&err));
    }

    #[test]
    fn test_validate_identifier_valid() {
        assert!(validate_identifier("public").is_ok());
        assert!(validate_identifier("my_schema").is_ok());
        assert!(validate_identifier("Schema123").is_ok());
    }

    #[test]
    fn test_validate_identifier_invalid() {
        assert!(validate_identifier("").is_err());
        assert!(validate_identifier("my-schema").is_err());
        assert!(validate_identifier("my schema").is_err());
        assert!(validate_identifier("a.b").is_err());
        assert!(validate_identifier("x;drop").is_err());
    }

    #[test]
    fn test_quote_ident_embedded_quotes() {
        assert_eq!(quote_ident("users"), "\"users\"");
        assert_eq!(quote_ident("my\"table"), "\"my\"\"table\"");
    }

    #[test]
    fn test_qualified() {
        assert_eq!(
            qualified("public", "schema_migrations"),
            "\"public\".\"schema_migrations\""
        );
    }
}
