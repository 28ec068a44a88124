//! Terminal output formatting for all tidemark commands.
//! Uses comfy-table for tabular output and colored for
//! severity-aware terminal styling.

use colored::Colorize;
use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, ContentArrangement, Table};

use tidemark_core::history::{LogLevel, MigrationLogEntry, MigrationRecord, STATUS_FAILED};
use tidemark_core::operation::Operation;
use tidemark_core::{
    GenerateReport, MigrateReport, PlanReport, RepairReport, RollbackReport, StatusReport,
};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

fn new_table(header: Vec<&str>) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header.into_iter().map(Cell::new).collect::<Vec<_>>());
    table
}

/// Return a colored one-line rendering of an operation.
fn format_operation(op: &Operation) -> String {
    let line = op.to_string();
    if op.is_destructive() {
        line.red().to_string()
    } else if line.starts_with('~') {
        line.yellow().to_string()
    } else {
        line.green().to_string()
    }
}

/// Print a reconciliation plan with its forward and rollback SQL.
pub fn print_plan(report: &PlanReport) {
    if !report.has_changes {
        println!(
            "{}",
            "Schema is up to date. No changes detected.".green()
        );
        return;
    }

    println!(
        "{}",
        format!("{} change(s) detected:", report.operations.len())
            .bold()
    );
    for op in &report.operations {
        println!("  {}", format_operation(op));
    }

    if report.destructive > 0 {
        println!(
            "{} {} operation(s) can lose data.",
            "WARNING:".yellow().bold(),
            report.destructive
        );
    }

    println!();
    println!("{}", "-- Up".dimmed());
    for stmt in &report.forward {
        println!("{}", stmt);
    }
    println!();
    println!("{}", "-- Down".dimmed());
    for stmt in &report.rollback {
        println!("{}", stmt);
    }
}

/// Print the outcome of generate.
pub fn print_generate_result(report: &GenerateReport) {
    match report.path {
        Some(ref path) => {
            for op in &report.plan.operations {
                println!("  {}", format_operation(op));
            }
            println!(
                "{}",
                format!(
                    "Wrote migration {} ({} operation(s))",
                    path,
                    report.plan.operations.len()
                )
                .green()
                .bold()
            );
        }
        None => println!(
            "{}",
            "Schema is up to date. No migration generated.".green()
        ),
    }
}

/// Print a migration report summary.
pub fn print_migrate_summary(report: &MigrateReport) {
    if report.migrations_applied == 0 {
        println!(
            "{}",
            "Schema is up to date. No migration necessary.".green()
        );
        return;
    }

    println!(
        "{}",
        format!(
            "Successfully applied {} migration(s) (execution time {:.1}ms)",
            report.migrations_applied, report.total_time_ms
        )
        .green()
        .bold()
    );

    for detail in &report.details {
        let tables = detail.table_affected.as_deref().unwrap_or("-");
        println!(
            "  {} {} [{}] ({:.1}ms)",
            "→".green(),
            detail.filename,
            tables,
            detail.execution_time_ms
        );
    }
}

/// Print a rollback report summary.
pub fn print_rollback_summary(report: &RollbackReport) {
    if report.migrations_rolled_back == 0 {
        println!("{}", "No applied migrations to roll back.".green());
        return;
    }

    println!(
        "{}",
        format!(
            "Successfully rolled back {} migration(s) (execution time {:.1}ms)",
            report.migrations_rolled_back, report.total_time_ms
        )
        .green()
        .bold()
    );
    if report.migrations_rolled_back < report.requested {
        println!(
            "{}",
            format!(
                "Requested {}, only {} were applied.",
                report.requested, report.migrations_rolled_back
            )
            .yellow()
        );
    }

    for detail in &report.details {
        println!(
            "  {} {} ({:.1}ms)",
            "←".magenta(),
            detail.filename,
            detail.execution_time_ms
        );
    }
}

/// Print applied, pending and failed migrations as one table.
pub fn print_status(report: &StatusReport) {
    if report.applied.is_empty() && report.pending.is_empty() && report.failed.is_empty() {
        println!("{}", "No migrations found.".yellow());
        return;
    }

    let mut table = new_table(vec!["Migration", "State", "Error"]);
    for name in &report.applied {
        let state = if report.missing.contains(name) {
            "Applied (file missing)".red().to_string()
        } else {
            "Applied".green().to_string()
        };
        table.add_row(vec![Cell::new(name), Cell::new(&state), Cell::new("")]);
    }
    for record in &report.failed {
        table.add_row(vec![
            Cell::new(&record.filename),
            Cell::new("Failed".red().bold().to_string()),
            Cell::new(record.error_message.as_deref().unwrap_or("")),
        ]);
    }
    for name in &report.pending {
        table.add_row(vec![
            Cell::new(name),
            Cell::new("Pending".yellow().to_string()),
            Cell::new(""),
        ]);
    }

    println!("{table}");
}

/// Print control-table rows.
pub fn print_history_table(records: &[MigrationRecord]) {
    if records.is_empty() {
        println!("{}", "No migration history.".yellow());
        return;
    }

    let mut table = new_table(vec![
        "Migration",
        "Status",
        "Applied At",
        "Execution Time",
        "Executed By",
        "Tables",
    ]);

    for record in records {
        let status = if record.status == STATUS_FAILED {
            record.status.red().bold().to_string()
        } else {
            record.status.green().to_string()
        };
        let applied_at = record
            .applied_at
            .map(|dt| dt.format(TIMESTAMP_FORMAT).to_string())
            .unwrap_or_default();
        let exec_time = record
            .execution_time_ms
            .map(|t| format!("{:.1}ms", t))
            .unwrap_or_default();

        table.add_row(vec![
            Cell::new(&record.filename),
            Cell::new(&status),
            Cell::new(&applied_at),
            Cell::new(&exec_time),
            Cell::new(record.executed_by.as_deref().unwrap_or("")),
            Cell::new(record.table_affected.as_deref().unwrap_or("")),
        ]);
    }

    println!("{table}");
}

/// Return a colored audit log level.
fn format_level(level: &str) -> String {
    match level {
        l if l == LogLevel::Error.as_str() => l.red().bold().to_string(),
        l if l == LogLevel::Warn.as_str() => l.yellow().to_string(),
        l if l == LogLevel::Success.as_str() => l.green().to_string(),
        l => l.to_string(),
    }
}

/// Print audit log entries.
pub fn print_logs_table(entries: &[MigrationLogEntry]) {
    if entries.is_empty() {
        println!("{}", "No log entries.".yellow());
        return;
    }

    let mut table = new_table(vec![
        "Time", "Level", "Migration", "Message", "User", "Details",
    ]);
    for entry in entries {
        let timestamp = entry
            .timestamp
            .map(|dt| dt.format(TIMESTAMP_FORMAT).to_string())
            .unwrap_or_default();
        table.add_row(vec![
            Cell::new(&timestamp),
            Cell::new(format_level(&entry.level)),
            Cell::new(entry.migration_name.as_deref().unwrap_or("")),
            Cell::new(&entry.message),
            Cell::new(entry.user_name.as_deref().unwrap_or("")),
            Cell::new(entry.details.as_deref().unwrap_or("")),
        ]);
    }

    println!("{table}");
}

/// Print a repair report.
pub fn print_repair_result(report: &RepairReport) {
    if report.cleared.is_empty() {
        println!("{}", "Repair complete. No failed migrations found.".green());
        return;
    }

    println!("{}", "Repair complete, cleared failed records:".green().bold());
    for filename in &report.cleared {
        println!("  {} {}", "→".green(), filename);
    }
}
