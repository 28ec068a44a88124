//! Typed schema change operations produced by reconciliation.

use serde::Serialize;

use crate::model::{Column, ForeignKey, IndexConfig};

/// One schema change. Each variant carries only its own payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Operation {
    /// Create a table with every declared column, in declaration order.
    CreateTable { table: String, columns: Vec<Column> },
    /// Add a column to an existing table.
    AddColumn { table: String, column: Column },
    /// Drop a column. `original` is retained so rollback can restore it.
    DropColumn {
        table: String,
        column: String,
        original: Option<Column>,
    },
    /// Change type, nullability, or default of a column.
    ModifyColumn {
        table: String,
        from: Column,
        to: Column,
    },
    /// Drop a table. `original` is retained so rollback can recreate it.
    DropTable {
        table: String,
        original: Option<Vec<Column>>,
    },
    /// Add a foreign key constraint on `column`.
    AddForeignKey {
        table: String,
        column: String,
        reference: ForeignKey,
    },
    /// Drop a named foreign key constraint.
    DropForeignKey {
        table: String,
        name: String,
        column: String,
        reference: ForeignKey,
    },
    /// Create a named index.
    CreateIndex { table: String, index: IndexConfig },
    /// Rename a column. Never produced by reconciliation.
    RenameColumn {
        table: String,
        from: String,
        to: String,
    },
    /// Drop a named index. Never produced by reconciliation.
    DropIndex { table: String, index: IndexConfig },
}

impl Operation {
    /// Table this operation applies to.
    pub fn table(&self) -> &str {
        match self {
            Operation::CreateTable { table, .. }
            | Operation::AddColumn { table, .. }
            | Operation::DropColumn { table, .. }
            | Operation::ModifyColumn { table, .. }
            | Operation::DropTable { table, .. }
            | Operation::AddForeignKey { table, .. }
            | Operation::DropForeignKey { table, .. }
            | Operation::CreateIndex { table, .. }
            | Operation::RenameColumn { table, .. }
            | Operation::DropIndex { table, .. } => table,
        }
    }

    /// Whether the operation can lose data when applied.
    pub fn is_destructive(&self) -> bool {
        matches!(
            self,
            Operation::DropColumn { .. } | Operation::DropTable { .. }
        )
    }

    /// Dependency-safe execution phase: drops before creates, tables before
    /// their columns, columns before the constraints and indexes on them.
    pub fn phase(&self) -> u8 {
        match self {
            Operation::DropForeignKey { .. } => 0,
            Operation::DropIndex { .. } => 1,
            Operation::DropColumn { .. } => 2,
            Operation::DropTable { .. } => 3,
            Operation::CreateTable { .. } => 4,
            Operation::AddColumn { .. }
            | Operation::ModifyColumn { .. }
            | Operation::RenameColumn { .. } => 5,
            Operation::AddForeignKey { .. } => 6,
            Operation::CreateIndex { .. } => 7,
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Operation::CreateTable { table, columns } => {
                write!(f, "+ TABLE {} ({} columns)", table, columns.len())
            }
            Operation::AddColumn { table, column } => {
                write!(f, "+ COLUMN {}.{} ({})", table, column.name, column.data_type)
            }
            Operation::DropColumn { table, column, .. } => {
                write!(f, "- COLUMN {}.{}", table, column)
            }
            Operation::ModifyColumn { table, to, .. } => {
                write!(f, "~ COLUMN {}.{}", table, to.name)
            }
            Operation::DropTable { table, .. } => write!(f, "- TABLE {}", table),
            Operation::AddForeignKey {
                table,
                column,
                reference,
            } => write!(
                f,
                "+ FOREIGN KEY {}.{} -> {}.{}",
                table, column, reference.table, reference.column
            ),
            Operation::DropForeignKey { table, name, .. } => {
                write!(f, "- FOREIGN KEY {} ON {}", name, table)
            }
            Operation::CreateIndex { table, index } => write!(
                f,
                "+ INDEX {} ON {}",
                index.name.as_deref().unwrap_or("<unnamed>"),
                table
            ),
            Operation::RenameColumn { table, from, to } => {
                write!(f, "~ COLUMN {}.{} -> {}", table, from, to)
            }
            Operation::DropIndex { table, index } => write!(
                f,
                "- INDEX {} ON {}",
                index.name.as_deref().unwrap_or("<unnamed>"),
                table
            ),
        }
    }
}

/// Stable reorder into dependency-safe phases.
///
/// Operations inside one phase keep their relative order.
pub fn order_by_phase(mut ops: Vec<Operation>) -> Vec<Operation> {
    ops.sort_by_key(|op| op.phase());
    ops
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fk(table: &str) -> ForeignKey {
        ForeignKey {
            table: table.to_string(),
            column: "id".to_string(),
            on_delete: None,
            on_update: None,
            name: None,
        }
    }

    #[test]
    fn test_order_by_phase_moves_fk_drop_before_column_drop() {
        let ops = vec![
            Operation::DropColumn {
                table: "posts".to_string(),
                column: "author_id".to_string(),
                original: None,
            },
            Operation::DropForeignKey {
                table: "posts".to_string(),
                name: "fk_posts_users".to_string(),
                column: "author_id".to_string(),
                reference: fk("users"),
            },
        ];
        let ordered = order_by_phase(ops);
        assert!(matches!(ordered[0], Operation::DropForeignKey { .. }));
        assert!(matches!(ordered[1], Operation::DropColumn { .. }));
    }

    #[test]
    fn test_order_by_phase_is_stable_within_phase() {
        let ops = vec![
            Operation::AddColumn {
                table: "b".to_string(),
                column: Column::new("x", "text"),
            },
            Operation::CreateTable {
                table: "z".to_string(),
                columns: vec![Column::new("id", "serial")],
            },
            Operation::AddColumn {
                table: "a".to_string(),
                column: Column::new("y", "text"),
            },
        ];
        let ordered = order_by_phase(ops);
        let tables: Vec<&str> = ordered.iter().map(|op| op.table()).collect();
        assert_eq!(tables, vec!["z", "b", "a"]);
    }

    #[test]
    fn test_full_phase_sequence() {
        let idx = IndexConfig {
            name: Some("idx".to_string()),
            columns: vec!["c".to_string()],
            unique: false,
            method: None,
        };
        let ops = vec![
            Operation::CreateIndex {
                table: "t".to_string(),
                index: idx.clone(),
            },
            Operation::AddForeignKey {
                table: "t".to_string(),
                column: "c".to_string(),
                reference: fk("u"),
            },
            Operation::AddColumn {
                table: "t".to_string(),
                column: Column::new("c", "int"),
            },
            Operation::CreateTable {
                table: "t".to_string(),
                columns: vec![Column::new("id", "serial")],
            },
            Operation::DropTable {
                table: "old".to_string(),
                original: None,
            },
            Operation::DropColumn {
                table: "t".to_string(),
                column: "gone".to_string(),
                original: None,
            },
            Operation::DropIndex {
                table: "t".to_string(),
                index: idx,
            },
        ];
        let phases: Vec<u8> = order_by_phase(ops).iter().map(|op| op.phase()).collect();
        assert_eq!(phases, vec![1, 2, 3, 4, 5, 6, 7]);
    }

    #[test]
    fn test_display() {
        let op = Operation::AddColumn {
            table: "posts".to_string(),
            column: Column::new("subtitle", "text"),
        };
        assert_eq!(op.to_string(), "+ COLUMN posts.subtitle (text)");
        let op = Operation::DropTable {
            table: "legacy".to_string(),
            original: None,
        };
        assert_eq!(op.to_string(), "- TABLE legacy");
        assert!(op.is_destructive());
    }
}
