//! Reconcile a desired-state model against an observed database snapshot.

use std::collections::HashMap;

use crate::compat;
use crate::history::{CONTROL_TABLE, LOG_TABLE};
use crate::model::{Column, ExistingColumn, ExistingTable, IndexConfig, Model};
use crate::operation::Operation;

/// Tables owned by the migration runner, never diffed.
pub fn is_system_table(name: &str) -> bool {
    name == CONTROL_TABLE || name == LOG_TABLE
}

/// Compute the operations that transform `existing` into `desired`.
///
/// Output follows desired-table order (creates, then per-table adds, drops,
/// modifies, foreign keys and indexes), followed by table drops in observed
/// order. Use [`crate::operation::order_by_phase`] for a dependency-safe order.
pub fn reconcile(desired: &[Model], existing: &[ExistingTable]) -> Vec<Operation> {
    let existing_map: HashMap<&str, &ExistingTable> = existing
        .iter()
        .filter(|t| !is_system_table(&t.name))
        .map(|t| (t.name.as_str(), t))
        .collect();
    let desired_names: HashMap<&str, &Model> =
        desired.iter().map(|m| (m.name.as_str(), m)).collect();

    let mut ops = Vec::new();

    for model in desired {
        match existing_map.get(model.name.as_str()) {
            None => create_table_ops(model, &mut ops),
            Some(table) => diff_table(model, table, &mut ops),
        }
    }

    for table in existing {
        if is_system_table(&table.name) || desired_names.contains_key(table.name.as_str()) {
            continue;
        }
        ops.push(Operation::DropTable {
            table: table.name.clone(),
            original: Some(table.columns.iter().map(ExistingColumn::to_column).collect()),
        });
    }

    ops
}

fn create_table_ops(model: &Model, ops: &mut Vec<Operation>) {
    ops.push(Operation::CreateTable {
        table: model.name.clone(),
        columns: model.columns.clone(),
    });

    for col in &model.columns {
        if let Some(ref fk) = col.foreign_key {
            ops.push(Operation::AddForeignKey {
                table: model.name.clone(),
                column: col.name.clone(),
                reference: fk.clone(),
            });
        }
    }

    for index in named_indexes(model) {
        ops.push(Operation::CreateIndex {
            table: model.name.clone(),
            index,
        });
    }
}

fn diff_table(model: &Model, table: &ExistingTable, ops: &mut Vec<Operation>) {
    let existing_cols: HashMap<&str, &ExistingColumn> =
        table.columns.iter().map(|c| (c.name.as_str(), c)).collect();
    let desired_cols: HashMap<&str, &Column> =
        model.columns.iter().map(|c| (c.name.as_str(), c)).collect();

    for col in &model.columns {
        if !existing_cols.contains_key(col.name.as_str()) {
            ops.push(Operation::AddColumn {
                table: model.name.clone(),
                column: col.clone(),
            });
        }
    }

    for col in &table.columns {
        if !desired_cols.contains_key(col.name.as_str()) {
            ops.push(Operation::DropColumn {
                table: model.name.clone(),
                column: col.name.clone(),
                original: Some(col.to_column()),
            });
        }
    }

    for col in &model.columns {
        let Some(observed) = existing_cols.get(col.name.as_str()) else {
            continue;
        };
        if col.primary || observed.is_primary_key {
            continue;
        }
        let from = observed.as_declared();
        if is_significant_change(&model.name, &from, col) {
            ops.push(Operation::ModifyColumn {
                table: model.name.clone(),
                from,
                to: col.clone(),
            });
        }
    }

    for col in &model.columns {
        let Some(ref fk) = col.foreign_key else {
            continue;
        };
        match table.foreign_keys.iter().find(|e| e.column_name == col.name) {
            None => ops.push(Operation::AddForeignKey {
                table: model.name.clone(),
                column: col.name.clone(),
                reference: fk.clone(),
            }),
            Some(existing_fk)
                if existing_fk.foreign_table != fk.table
                    || existing_fk.foreign_column != fk.column =>
            {
                log::warn!(
                    "Foreign key target differs, not replacing; table={}, column={}, existing={}.{}, desired={}.{}",
                    model.name,
                    col.name,
                    existing_fk.foreign_table,
                    existing_fk.foreign_column,
                    fk.table,
                    fk.column
                );
            }
            Some(_) => {}
        }
    }

    for index in named_indexes(model) {
        let exists = index
            .name
            .as_deref()
            .is_some_and(|name| table.indexes.iter().any(|e| e.name == name));
        if !exists {
            ops.push(Operation::CreateIndex {
                table: model.name.clone(),
                index,
            });
        }
    }
}

/// Table-level and column-level indexes that carry a name.
/// Column-level indexes with no column list index their own column.
fn named_indexes(model: &Model) -> Vec<IndexConfig> {
    let mut out: Vec<IndexConfig> = model
        .indexes
        .iter()
        .filter(|i| i.name.is_some())
        .cloned()
        .collect();

    for col in &model.columns {
        if let Some(ref index) = col.index {
            if index.name.is_none() {
                continue;
            }
            let mut index = index.clone();
            if index.columns.is_empty() {
                index.columns = vec![col.name.clone()];
            }
            out.push(index);
        }
    }

    out
}

/// Conservative significance test: type family change, nullability
/// mismatch, or a default that differs after normalization.
fn is_significant_change(table: &str, from: &Column, desired: &Column) -> bool {
    let delta = compat::column_delta(from, desired);
    if !delta.type_changed && !compat::types_equivalent(&desired.data_type, &from.data_type) {
        log::debug!(
            "Ignoring non-significant type difference; table={}, column={}, desired={}, existing={}",
            table,
            desired.name,
            desired.data_type,
            from.data_type
        );
    }
    !delta.is_empty()
}
