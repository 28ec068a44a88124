//! Desired-state and observed-state schema shapes, and the file loader
//! for desired-state models.
//!
//! A model file is TOML or JSON holding a list of tables:
//!
//! ```toml
//! [[tables]]
//! name = "users"
//!
//! [[tables.columns]]
//! name = "id"
//! type = "serial"
//! primary = true
//!
//! [[tables.columns]]
//! name = "email"
//! type = "text"
//! unique = true
//! not_null = true
//! ```

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, TidemarkError};

/// One desired table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Model {
    pub name: String,
    #[serde(default)]
    pub columns: Vec<Column>,
    /// Table-level indexes. Only named ones are reconciled.
    #[serde(default)]
    pub indexes: Vec<IndexConfig>,
    /// Semantic relation metadata. Carried along, never diffed.
    #[serde(default)]
    pub relations: Vec<Relation>,
}

/// A desired column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: String,
    #[serde(default)]
    pub primary: bool,
    #[serde(default)]
    pub unique: bool,
    #[serde(default, alias = "notNull")]
    pub not_null: bool,
    #[serde(default)]
    pub default: Option<String>,
    #[serde(default, alias = "foreignKey")]
    pub foreign_key: Option<ForeignKey>,
    #[serde(default)]
    pub index: Option<IndexConfig>,
}

impl Column {
    /// A bare column with only a name and a type.
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            primary: false,
            unique: false,
            not_null: false,
            default: None,
            foreign_key: None,
            index: None,
        }
    }
}

/// A foreign key reference declared on a column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKey {
    pub table: String,
    pub column: String,
    #[serde(default, alias = "onDelete")]
    pub on_delete: Option<String>,
    #[serde(default, alias = "onUpdate")]
    pub on_update: Option<String>,
    /// Explicit constraint name; derived from the tables when absent.
    #[serde(default)]
    pub name: Option<String>,
}

impl ForeignKey {
    /// Constraint name used when adding or dropping this key on `table`.
    pub fn constraint_name(&self, table: &str) -> String {
        match self.name {
            Some(ref name) => name.clone(),
            None => format!("fk_{}_{}", table, self.table),
        }
    }
}

/// An index declaration, either table-level or attached to a column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexConfig {
    #[serde(default)]
    pub name: Option<String>,
    /// Indexed columns. Empty on a column-level index means "this column".
    #[serde(default)]
    pub columns: Vec<String>,
    #[serde(default)]
    pub unique: bool,
    /// Access method such as `btree`, `gin`, or `hash`.
    #[serde(default)]
    pub method: Option<String>,
}

/// Relation metadata (has-one, has-many, ...) kept for documentation purposes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relation {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub table: String,
    #[serde(default, alias = "foreignKey")]
    pub foreign_key: Option<String>,
}

/// A table observed in the live database.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ExistingTable {
    pub name: String,
    pub columns: Vec<ExistingColumn>,
    pub foreign_keys: Vec<ExistingForeignKey>,
    pub indexes: Vec<ExistingIndex>,
}

/// A column observed in the live database.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExistingColumn {
    pub name: String,
    pub data_type: String,
    pub is_nullable: bool,
    /// Default exactly as stored by the server, casts included.
    pub column_default: Option<String>,
    pub is_primary_key: bool,
    pub is_unique: bool,
}

impl ExistingColumn {
    /// The column exactly as the catalog reports it: type and default are
    /// kept verbatim.
    pub fn as_declared(&self) -> Column {
        Column {
            name: self.name.clone(),
            data_type: self.data_type.clone(),
            primary: self.is_primary_key,
            unique: self.is_unique && !self.is_primary_key,
            not_null: !self.is_nullable && !self.is_primary_key,
            default: self.column_default.clone(),
            foreign_key: None,
            index: None,
        }
    }

    /// Best-effort conversion back to a desired column, used to retain
    /// definitions inside destructive operations.
    ///
    /// Integer columns fed by `nextval(...)` come back as the matching
    /// serial type, since their sequence is dropped along with them.
    pub fn to_column(&self) -> Column {
        let is_sequence_default = self
            .column_default
            .as_deref()
            .is_some_and(|d| d.trim_start().to_lowercase().starts_with("nextval("));
        let serial = if is_sequence_default {
            match self.data_type.as_str() {
                "integer" => Some("serial"),
                "bigint" => Some("bigserial"),
                "smallint" => Some("smallserial"),
                _ => None,
            }
        } else {
            None
        };

        let mut column = self.as_declared();
        if let Some(serial) = serial {
            column.data_type = serial.to_string();
            column.default = None;
        }
        column
    }
}

/// A foreign key observed in the live database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExistingForeignKey {
    pub constraint_name: String,
    pub column_name: String,
    pub foreign_table: String,
    pub foreign_column: String,
    pub delete_rule: String,
    pub update_rule: String,
}

/// An index observed in the live database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExistingIndex {
    pub name: String,
    pub table: String,
    pub columns: Vec<String>,
    pub is_unique: bool,
    pub method: String,
}

#[derive(Deserialize)]
struct ModelFile {
    #[serde(default)]
    tables: Vec<Model>,
}

fn is_model_file(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("toml") | Some("json")
    )
}

/// Expand the configured paths into a list of model files.
/// Directories are scanned one level deep, sorted by name.
fn collect_model_files(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_dir() {
            let mut found = Vec::new();
            for entry in std::fs::read_dir(path).map_err(|e| TidemarkError::file(path, e))? {
                let entry = entry.map_err(|e| TidemarkError::file(path, e))?;
                let file = entry.path();
                if file.is_file() && is_model_file(&file) {
                    found.push(file);
                }
            }
            found.sort();
            files.extend(found);
        } else if path.is_file() {
            if !is_model_file(path) {
                return Err(TidemarkError::ModelParseError {
                    path: path.display().to_string(),
                    reason: "expected a .toml or .json file".to_string(),
                });
            }
            files.push(path.clone());
        } else {
            return Err(TidemarkError::file(
                path,
                std::io::Error::new(std::io::ErrorKind::NotFound, "schema path does not exist"),
            ));
        }
    }
    Ok(files)
}

/// Parse one model file.
pub fn parse_model_file(path: &Path, content: &str) -> Result<Vec<Model>> {
    let parse_err = |reason: String| TidemarkError::ModelParseError {
        path: path.display().to_string(),
        reason,
    };
    let file: ModelFile = match path.extension().and_then(|e| e.to_str()) {
        Some("json") => serde_json::from_str(content).map_err(|e| parse_err(e.to_string()))?,
        _ => toml::from_str(content).map_err(|e| parse_err(e.to_string()))?,
    };

    for model in &file.tables {
        if model.name.trim().is_empty() {
            return Err(parse_err("table with an empty name".to_string()));
        }
        let mut seen = HashSet::new();
        for col in &model.columns {
            if !seen.insert(col.name.as_str()) {
                return Err(parse_err(format!(
                    "column '{}' declared twice in table '{}'",
                    col.name, model.name
                )));
            }
        }
    }

    Ok(file.tables)
}

/// Load the desired-state model from files and directories.
///
/// Table names must be unique across all files.
pub fn load_desired_models(paths: &[PathBuf]) -> Result<Vec<Model>> {
    let mut models: Vec<Model> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();

    for file in collect_model_files(paths)? {
        let content = std::fs::read_to_string(&file).map_err(|e| TidemarkError::file(&file, e))?;
        let parsed = parse_model_file(&file, &content)?;
        log::debug!(
            "Loaded schema file; path={}, tables={}",
            file.display(),
            parsed.len()
        );
        for model in parsed {
            if !seen.insert(model.name.clone()) {
                return Err(TidemarkError::ConfigError(format!(
                    "Table '{}' is declared more than once (last seen in {})",
                    model.name,
                    file.display()
                )));
            }
            models.push(model);
        }
    }

    Ok(models)
}
