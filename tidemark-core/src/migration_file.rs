//! Timestamped migration files holding an Up and a Down block.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

use crate::error::{Result, TidemarkError};

/// Marker opening the forward block.
pub const UP_MARKER: &str = "-- Up Migration";
/// Marker opening the rollback block.
pub const DOWN_MARKER: &str = "-- Down Migration (Rollback)";

/// Suffix shared by every generated migration file name.
const FILE_SUFFIX: &str = "_migration.sql";

/// The two SQL blocks of a migration file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedMigration {
    pub up: String,
    pub down: String,
}

/// SHA-256 of the SQL text, hex encoded.
pub fn checksum(sql: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(sql.as_bytes());
    hex::encode(hasher.finalize())
}

/// Render the file body for `forward` and `rollback` statements.
pub fn render_migration(timestamp: &str, forward: &[String], rollback: &[String]) -> String {
    format!(
        "-- Migration: {}\n\
         -- Description: Auto-generated migration\n\
         \n\
         {}\n\
         -- ============\n\
         {}\n\
         \n\
         {}\n\
         -- =======================\n\
         {}\n",
        timestamp,
        UP_MARKER,
        forward.join("\n"),
        DOWN_MARKER,
        rollback.join("\n"),
    )
}

/// File name for a migration generated at `now`.
pub fn migration_filename(now: DateTime<Utc>) -> String {
    format!("{}{}", now.format("%Y%m%d%H%M%S"), FILE_SUFFIX)
}

/// Write a new migration file into `dir`, creating the directory if needed.
///
/// Refuses to overwrite an existing file.
pub fn write_migration_file(dir: &Path, forward: &[String], rollback: &[String]) -> Result<PathBuf> {
    write_migration_file_at(dir, forward, rollback, Utc::now())
}

pub(crate) fn write_migration_file_at(
    dir: &Path,
    forward: &[String],
    rollback: &[String],
    now: DateTime<Utc>,
) -> Result<PathBuf> {
    std::fs::create_dir_all(dir).map_err(|e| TidemarkError::file(dir, e))?;

    let path = dir.join(migration_filename(now));
    let content = render_migration(&now.format("%Y%m%d%H%M%S").to_string(), forward, rollback);

    let mut file = match std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&path)
    {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
            return Err(TidemarkError::MigrationExists {
                path: path.display().to_string(),
            });
        }
        Err(e) => return Err(TidemarkError::file(&path, e)),
    };
    std::io::Write::write_all(&mut file, content.as_bytes())
        .map_err(|e| TidemarkError::file(&path, e))?;

    log::info!(
        "Wrote migration file; path={}, statements={}",
        path.display(),
        forward.len()
    );
    Ok(path)
}

fn is_separator(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.len() > 3 && trimmed.starts_with("-- ") && trimmed[3..].chars().all(|c| c == '=')
}

fn block_body(lines: &[&str]) -> String {
    lines
        .iter()
        .filter(|line| !is_separator(line))
        .copied()
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

/// Split a migration file into its Up and Down blocks.
///
/// Both markers are required and the Down marker must follow the Up marker.
pub fn parse_migration(file: &str, content: &str) -> Result<ParsedMigration> {
    let parse_err = |reason: &str| TidemarkError::MigrationParseError {
        file: file.to_string(),
        reason: reason.to_string(),
    };

    let lines: Vec<&str> = content.lines().collect();
    let up = lines.iter().position(|l| l.trim() == UP_MARKER);
    let down = lines.iter().position(|l| l.trim() == DOWN_MARKER);

    let (up, down) = match (up, down) {
        (None, _) => return Err(parse_err("missing Up Migration section")),
        (_, None) => return Err(parse_err("missing Down Migration section")),
        (Some(u), Some(d)) if d < u => {
            return Err(parse_err("Down Migration section precedes Up Migration"))
        }
        (Some(u), Some(d)) => (u, d),
    };

    Ok(ParsedMigration {
        up: block_body(&lines[up + 1..down]),
        down: block_body(&lines[down + 1..]),
    })
}

/// Read and parse a migration file from disk.
pub fn read_migration(path: &Path) -> Result<ParsedMigration> {
    let content = std::fs::read_to_string(path).map_err(|e| TidemarkError::file(path, e))?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string());
    parse_migration(&name, &content)
}

/// All `*.sql` file names in `dir`, sorted lexicographically.
/// A missing directory yields an empty list.
pub fn list_migration_files(dir: &Path) -> Result<Vec<String>> {
    if !dir.exists() {
        log::debug!("Migrations directory does not exist; path={}", dir.display());
        return Ok(Vec::new());
    }

    let mut names = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(|e| TidemarkError::file(dir, e))? {
        let entry = entry.map_err(|e| TidemarkError::file(dir, e))?;
        let path = entry.path();
        if path.is_file() && path.extension().and_then(|e| e.to_str()) == Some("sql") {
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                names.push(name.to_string());
            }
        }
    }
    names.sort();
    Ok(names)
}
