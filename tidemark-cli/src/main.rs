//! CLI entry point for the tidemark schema reconciliation tool.
//! Provides clap-based command routing and exit code mapping based on
//! error type.

mod output;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use colored::Colorize;

use tidemark_core::config::{CliOverrides, TidemarkConfig};
use tidemark_core::error::TidemarkError;
use tidemark_core::Tidemark;

/// Top-level CLI definition with global flags and subcommand dispatch.
#[derive(Parser)]
#[command(
    name = "tidemark",
    about = "Declarative PostgreSQL schema reconciliation and migrations",
    version,
    propagate_version = true
)]
struct Cli {
    /// Config file path
    #[arg(short, long, value_name = "PATH")]
    config: Option<String>,

    /// Database URL (overrides config)
    #[arg(long, value_name = "URL")]
    url: Option<String>,

    /// Database schema to reconcile and store control tables in (overrides config)
    #[arg(long, value_name = "SCHEMA")]
    schema: Option<String>,

    /// Migrations directory (overrides config)
    #[arg(long, value_name = "DIR")]
    migrations_dir: Option<PathBuf>,

    /// Model files or directories, comma-separated (overrides config)
    #[arg(long, value_name = "PATHS", value_delimiter = ',')]
    models: Vec<PathBuf>,

    /// Number of retries when connecting to the database
    #[arg(long, value_name = "N")]
    connect_retries: Option<u32>,

    /// SSL/TLS mode: disable, prefer, require
    #[arg(long, value_name = "MODE")]
    ssl_mode: Option<String>,

    /// Connection timeout in seconds (default: 30, 0 = no timeout)
    #[arg(long, value_name = "SECS")]
    connect_timeout: Option<u32>,

    /// Wrap each migration block in a transaction
    #[arg(long)]
    transactional: bool,

    /// Output results as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Enable verbose/debug output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// All available tidemark subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Show the operations and SQL needed to reach the desired model
    Plan,

    /// Write a migration file for the current differences
    Generate,

    /// Apply pending migration files
    Migrate,

    /// Roll back the most recently applied migrations
    Rollback {
        /// Number of migrations to roll back
        #[arg(long, default_value_t = 1, value_name = "N")]
        steps: usize,
    },

    /// Show applied, pending and failed migrations
    Status,

    /// Show the migration history
    History {
        /// Maximum number of rows
        #[arg(long, default_value_t = 50, value_name = "N")]
        limit: u32,

        /// Only show migrations that touched this table
        #[arg(long, value_name = "TABLE")]
        table: Option<String>,
    },

    /// Show the migration audit log
    Logs {
        /// Maximum number of entries
        #[arg(long, default_value_t = 50, value_name = "N")]
        limit: u32,
    },

    /// Clear failed migration records so migrate can run again
    Repair,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Set up logging (suppress when JSON output is requested)
    let filter = if cli.json {
        "error"
    } else if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "info"
    };

    env_logger::Builder::new()
        .parse_env(env_logger::Env::default().default_filter_or(filter))
        .format_target(false)
        .format_timestamp(None)
        .init();

    if let Err(e) = run(cli).await {
        print_error(&e);
        process::exit(exit_code(&e));
    }
}

/// Map error types to differentiated exit codes.
fn exit_code(error: &TidemarkError) -> i32 {
    match error {
        TidemarkError::ConfigError(_) => 2,
        TidemarkError::DatabaseError(_) => 4,
        TidemarkError::PoolError(_) => 4,
        TidemarkError::ConnectionLost { .. } => 4,
        TidemarkError::MigrationFailed { .. } => 5,
        TidemarkError::RollbackFailed { .. } => 5,
        TidemarkError::FailedMigrationsPresent { .. } => 6,
        TidemarkError::MigrationParseError { .. } => 7,
        TidemarkError::ModelParseError { .. } => 7,
        TidemarkError::SynthesisError(_) => 8,
        TidemarkError::MigrationExists { .. } => 8,
        _ => 1,
    }
}

/// Build configuration and dispatch the chosen subcommand.
async fn run(cli: Cli) -> Result<(), TidemarkError> {
    let json_output = cli.json;

    let overrides = CliOverrides {
        url: cli.url,
        database_schema: cli.schema,
        migrations_dir: cli.migrations_dir,
        schema_paths: if cli.models.is_empty() {
            None
        } else {
            Some(cli.models)
        },
        connect_retries: cli.connect_retries,
        ssl_mode: cli.ssl_mode,
        connect_timeout: cli.connect_timeout,
        transactional: if cli.transactional { Some(true) } else { None },
    };

    let config = TidemarkConfig::load(cli.config.as_deref(), &overrides)?;
    log::debug!(
        "Configuration loaded; schema={}, migrations_dir={}, model_paths={}",
        config.schema.database_schema,
        config.migrations.directory.display(),
        config.schema.paths.len()
    );
    let tm = Tidemark::new(config).await?;

    let result = run_command(&cli.command, &tm, json_output).await;
    tm.close();
    result
}

/// Execute a subcommand against the connected instance.
async fn run_command(
    command: &Commands,
    tm: &Tidemark,
    json_output: bool,
) -> Result<(), TidemarkError> {
    match command {
        Commands::Plan => {
            let report = tm.plan().await?;
            if json_output {
                println!("{}", serde_json::to_string_pretty(&report).unwrap());
            } else {
                output::print_plan(&report);
            }
        }
        Commands::Generate => {
            let report = tm.generate().await?;
            if json_output {
                println!("{}", serde_json::to_string_pretty(&report).unwrap());
            } else {
                output::print_generate_result(&report);
            }
        }
        Commands::Migrate => {
            let report = tm.migrate().await?;
            if json_output {
                println!("{}", serde_json::to_string_pretty(&report).unwrap());
            } else {
                output::print_migrate_summary(&report);
            }
        }
        Commands::Rollback { steps } => {
            let report = tm.rollback(*steps).await?;
            if json_output {
                println!("{}", serde_json::to_string_pretty(&report).unwrap());
            } else {
                output::print_rollback_summary(&report);
            }
        }
        Commands::Status => {
            let report = tm.status().await?;
            if json_output {
                println!("{}", serde_json::to_string_pretty(&report).unwrap());
            } else {
                output::print_status(&report);
            }
        }
        Commands::History { limit, table } => {
            let records = tm.history(*limit, table.as_deref()).await?;
            if json_output {
                println!("{}", serde_json::to_string_pretty(&records).unwrap());
            } else {
                output::print_history_table(&records);
            }
        }
        Commands::Logs { limit } => {
            let entries = tm.logs(*limit).await?;
            if json_output {
                println!("{}", serde_json::to_string_pretty(&entries).unwrap());
            } else {
                output::print_logs_table(&entries);
            }
        }
        Commands::Repair => {
            let report = tm.repair().await?;
            if json_output {
                println!("{}", serde_json::to_string_pretty(&report).unwrap());
            } else {
                output::print_repair_result(&report);
            }
        }
    }

    Ok(())
}

/// Print a formatted error message with actionable hints to stderr.
fn print_error(error: &TidemarkError) {
    eprintln!("{} {}", "ERROR:".red().bold(), error);

    match error {
        TidemarkError::ConfigError(_) => {
            eprintln!(
                "{}",
                "Hint: Check your tidemark.toml or set TIDEMARK_DATABASE_URL environment variable."
                    .dimmed()
            );
        }
        TidemarkError::DatabaseError(_)
        | TidemarkError::PoolError(_)
        | TidemarkError::ConnectionLost { .. } => {
            eprintln!(
                "{}",
                "Hint: Verify database is running and connection details are correct.".dimmed()
            );
        }
        TidemarkError::FailedMigrationsPresent { .. } => {
            eprintln!(
                "{}",
                "Hint: Fix the failing migration file, then run 'tidemark repair' to clear its record."
                    .dimmed()
            );
        }
        TidemarkError::MigrationFailed { .. } => {
            eprintln!(
                "{}",
                "Hint: Inspect 'tidemark logs' for details; the failure is recorded and blocks further migrations."
                    .dimmed()
            );
        }
        TidemarkError::MigrationExists { .. } => {
            eprintln!(
                "{}",
                "Hint: Wait a second and run 'tidemark generate' again.".dimmed()
            );
        }
        TidemarkError::ModelParseError { .. } => {
            eprintln!(
                "{}",
                "Hint: Model files are TOML or JSON with a [[tables]] list, each with name and columns.".dimmed()
            );
        }
        _ => {}
    }
}
