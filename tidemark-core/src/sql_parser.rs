//! Lightweight regex-based table extraction from migration SQL.
//!
//! Feeds the `table_affected` column of the control table and the
//! history filter.

use std::sync::LazyLock;

use regex_lite::Regex;

/// A possibly quoted identifier, optionally schema-qualified.
const QUALIFIED_IDENT: &str = r#"(?:(?:"(?:[^"]|"")+"|\w+)\.)?(?P<table>"(?:[^"]|"")+"|\w+)"#;

static CREATE_TABLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)^CREATE\s+(?:UNLOGGED\s+)?TABLE\s+(?:IF\s+NOT\s+EXISTS\s+)?{}",
        QUALIFIED_IDENT
    ))
    .unwrap()
});

static DROP_TABLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)^DROP\s+TABLE\s+(?:IF\s+EXISTS\s+)?{}",
        QUALIFIED_IDENT
    ))
    .unwrap()
});

static ALTER_TABLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)^ALTER\s+TABLE\s+(?:IF\s+EXISTS\s+)?(?:ONLY\s+)?{}",
        QUALIFIED_IDENT
    ))
    .unwrap()
});

static CREATE_INDEX_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r#"(?i)^CREATE\s+(?:UNIQUE\s+)?INDEX\s+(?:CONCURRENTLY\s+)?(?:IF\s+NOT\s+EXISTS\s+)?(?:"(?:[^"]|"")+"|\w+)?\s*ON\s+(?:ONLY\s+)?{}"#,
        QUALIFIED_IDENT
    ))
    .unwrap()
});

/// Strip surrounding double quotes and undo `""` escaping.
fn unquote(ident: &str) -> String {
    if ident.len() >= 2 && ident.starts_with('"') && ident.ends_with('"') {
        ident[1..ident.len() - 1].replace("\"\"", "\"")
    } else {
        ident.to_string()
    }
}

/// Drop `--` comment lines so commented-out DDL is not picked up.
fn strip_line_comments(stmt: &str) -> String {
    stmt.lines()
        .filter(|line| !line.trim_start().starts_with("--"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn statement_table(stmt: &str) -> Option<String> {
    [
        &*CREATE_TABLE_RE,
        &*DROP_TABLE_RE,
        &*ALTER_TABLE_RE,
        &*CREATE_INDEX_RE,
    ]
    .iter()
    .find_map(|re| re.captures(stmt))
    .and_then(|caps| caps.name("table").map(|m| unquote(m.as_str())))
}

/// Tables touched by CREATE / DROP / ALTER TABLE and CREATE INDEX statements,
/// in first-seen order without duplicates.
pub fn affected_tables(sql: &str) -> Vec<String> {
    let mut tables: Vec<String> = Vec::new();
    for stmt in split_statements(sql) {
        let cleaned = strip_line_comments(stmt);
        let cleaned = cleaned.trim();
        if cleaned.is_empty() {
            continue;
        }
        if let Some(table) = statement_table(cleaned) {
            if !tables.contains(&table) {
                tables.push(table);
            }
        }
    }
    tables
}

/// Comma-joined [`affected_tables`], or `None` when nothing was recognized.
pub fn table_affected_summary(sql: &str) -> Option<String> {
    let tables = affected_tables(sql);
    if tables.is_empty() {
        None
    } else {
        Some(tables.join(", "))
    }
}

/// Split SQL into individual statements, respecting dollar-quoted blocks,
/// string literals, and comments.
pub fn split_statements(sql: &str) -> Vec<&str> {
    let bytes = sql.as_bytes();
    let len = bytes.len();
    let mut statements = Vec::new();
    let mut start = 0;
    let mut i = 0;

    while i < len {
        match bytes[i] {
            b'-' if i + 1 < len && bytes[i + 1] == b'-' => {
                while i < len && bytes[i] != b'\n' {
                    i += 1;
                }
            }
            b'/' if i + 1 < len && bytes[i + 1] == b'*' => {
                i += 2;
                let mut depth = 1;
                while i < len && depth > 0 {
                    if i + 1 < len && bytes[i] == b'/' && bytes[i + 1] == b'*' {
                        depth += 1;
                        i += 2;
                    } else if i + 1 < len && bytes[i] == b'*' && bytes[i + 1] == b'/' {
                        depth -= 1;
                        i += 2;
                    } else {
                        i += 1;
                    }
                }
                continue;
            }
            // Quoted identifier
            b'"' => {
                i += 1;
                while i < len {
                    if bytes[i] == b'"' {
                        if i + 1 < len && bytes[i + 1] == b'"' {
                            i += 2;
                        } else {
                            i += 1;
                            break;
                        }
                    } else {
                        i += 1;
                    }
                }
                continue;
            }
            // String literal (standard or E'...' escape string)
            b'\'' => {
                let is_escape_string = i > 0
                    && (bytes[i - 1] == b'E' || bytes[i - 1] == b'e')
                    && (i < 2 || !(bytes[i - 2].is_ascii_alphanumeric() || bytes[i - 2] == b'_'));
                i += 1;
                while i < len {
                    if is_escape_string && bytes[i] == b'\\' {
                        i += 2;
                        continue;
                    }
                    if bytes[i] == b'\'' {
                        if i + 1 < len && bytes[i + 1] == b'\'' {
                            i += 2;
                        } else {
                            i += 1;
                            break;
                        }
                    } else {
                        i += 1;
                    }
                }
                continue;
            }
            // Dollar-quoted string ($$...$$, $tag$...$tag$)
            b'$' => {
                let tag_start = i;
                i += 1;
                while i < len && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
                    i += 1;
                }
                if i < len && bytes[i] == b'$' {
                    let tag = &sql[tag_start..=i];
                    i += 1;
                    while i < len {
                        if bytes[i] == b'$' && sql[i..].starts_with(tag) {
                            i += tag.len();
                            break;
                        }
                        i += 1;
                    }
                }
                continue;
            }
            b';' => {
                let trimmed = sql[start..i].trim();
                if !trimmed.is_empty() {
                    statements.push(trimmed);
                }
                i += 1;
                start = i;
                continue;
            }
            _ => {}
        }
        i += 1;
    }

    let remainder = sql[start..].trim();
    if !remainder.is_empty() {
        statements.push(remainder);
    }

    statements
}
