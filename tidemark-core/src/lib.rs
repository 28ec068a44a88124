//! Declarative PostgreSQL schema reconciliation.
//!
//! Tidemark compares a desired table model against the live catalog, emits
//! forward and rollback DDL as timestamped migration files, and applies or
//! reverts those files while keeping a control table and an audit log.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use tidemark_core::config::{CliOverrides, TidemarkConfig};
//! use tidemark_core::Tidemark;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = TidemarkConfig::load(None, &CliOverrides::default())?;
//! let tm = Tidemark::new(config).await?;
//! let generated = tm.generate().await?;
//! if let Some(path) = generated.path {
//!     println!("Wrote {}", path);
//! }
//! let report = tm.migrate().await?;
//! println!("Applied {} migrations", report.migrations_applied);
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! - [`config`]: configuration loading (TOML, env vars, CLI overrides)
//! - [`model`]: desired-state model files and observed-state types
//! - [`introspect`]: catalog snapshot of the live schema
//! - [`compat`]: type and default equivalence rules
//! - [`diff`]: desired vs. observed reconciliation into operations
//! - [`operation`]: the operation enum and phase ordering
//! - [`synth`]: forward and rollback SQL synthesis
//! - [`migration_file`]: migration file rendering, parsing and listing
//! - [`history`]: control table and audit log access
//! - [`db`]: connection pool, TLS and statement execution
//! - [`sql_parser`]: affected-table extraction and statement splitting
//! - [`commands`]: individual command implementations
//! - [`error`]: error types

pub mod commands;
pub mod compat;
pub mod config;
pub mod db;
pub mod diff;
pub mod error;
pub mod history;
pub mod introspect;
pub mod migration_file;
pub mod model;
pub mod operation;
pub mod sql_parser;
pub mod synth;

use deadpool_postgres::Pool;

use config::TidemarkConfig;
use error::Result;

pub use commands::generate::GenerateReport;
pub use commands::migrate::{MigrateDetail, MigrateReport};
pub use commands::plan::PlanReport;
pub use commands::repair::RepairReport;
pub use commands::rollback::{RollbackDetail, RollbackReport};
pub use commands::status::StatusReport;
pub use config::CliOverrides;
pub use error::TidemarkError;
pub use history::{MigrationLogEntry, MigrationRecord};
pub use model::{Column, ExistingTable, Model};
pub use operation::Operation;

/// Main entry point for the Tidemark library.
///
/// Holds the configuration and a connection pool; every command checks out
/// its own client for the duration of the call.
pub struct Tidemark {
    pub config: TidemarkConfig,
    pool: Pool,
}

impl Tidemark {
    /// Create a new Tidemark instance, building the pool and verifying that
    /// the database is reachable.
    pub async fn new(config: TidemarkConfig) -> Result<Self> {
        let conn_string = config.connection_string()?;
        let pool = db::connect_pool(
            &conn_string,
            &config.database,
            &config.schema.database_schema,
        )
        .await?;
        Ok(Self { config, pool })
    }

    /// Create a Tidemark instance around an existing pool.
    pub fn with_pool(config: TidemarkConfig, pool: Pool) -> Self {
        Self { config, pool }
    }

    /// The underlying connection pool.
    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    /// Close the pool. Checked-out clients are dropped as they are returned.
    pub fn close(self) {
        self.pool.close();
    }

    /// Compute the operations and SQL needed to reach the desired model.
    pub async fn plan(&self) -> Result<PlanReport> {
        let client = db::get_client(&self.pool).await?;
        commands::plan::execute(&client, &self.config).await
    }

    /// Plan and write a migration file when there are changes.
    pub async fn generate(&self) -> Result<GenerateReport> {
        let client = db::get_client(&self.pool).await?;
        commands::generate::execute(&client, &self.config).await
    }

    /// Apply pending migration files.
    pub async fn migrate(&self) -> Result<MigrateReport> {
        let client = db::get_client(&self.pool).await?;
        commands::migrate::execute(&client, &self.config).await
    }

    /// Roll back the `steps` most recently applied migrations.
    pub async fn rollback(&self, steps: usize) -> Result<RollbackReport> {
        let client = db::get_client(&self.pool).await?;
        commands::rollback::execute(&client, &self.config, steps).await
    }

    /// Applied, pending and failed migrations.
    pub async fn status(&self) -> Result<StatusReport> {
        let client = db::get_client(&self.pool).await?;
        commands::status::execute(&client, &self.config).await
    }

    /// Control-table rows, newest first, optionally filtered by affected table.
    pub async fn history(&self, limit: u32, table_filter: Option<&str>) -> Result<Vec<MigrationRecord>> {
        let client = db::get_client(&self.pool).await?;
        commands::history::execute(&client, &self.config, limit, table_filter).await
    }

    /// Most recent audit log entries.
    pub async fn logs(&self, limit: u32) -> Result<Vec<MigrationLogEntry>> {
        let client = db::get_client(&self.pool).await?;
        commands::logs::execute(&client, &self.config, limit).await
    }

    /// Delete failed control rows so that migrate can run again.
    pub async fn repair(&self) -> Result<RepairReport> {
        let client = db::get_client(&self.pool).await?;
        commands::repair::execute(&client, &self.config).await
    }
}
