//! Forward and rollback DDL synthesis for reconciliation operations.

use std::collections::HashMap;

use crate::compat;
use crate::config::SynthesisSettings;
use crate::db::quote_ident;
use crate::error::{Result, TidemarkError};
use crate::model::{Column, ForeignKey, IndexConfig};
use crate::operation::Operation;

/// Referential actions accepted in ON DELETE / ON UPDATE.
const REFERENTIAL_ACTIONS: &[&str] = &["CASCADE", "RESTRICT", "SET NULL", "SET DEFAULT", "NO ACTION"];

/// Turns operations into SQL statements, one statement per operation.
#[derive(Debug, Clone, Default)]
pub struct SqlGenerator {
    options: SynthesisSettings,
}

impl SqlGenerator {
    pub fn new(options: SynthesisSettings) -> Self {
        Self { options }
    }

    /// Forward DDL for `ops`, in the given order.
    pub fn forward(&self, ops: &[Operation]) -> Result<Vec<String>> {
        check_constraint_names(ops)?;
        ops.iter().map(|op| self.forward_one(op)).collect()
    }

    /// Rollback DDL for `ops`: the structural inverse of each, last operation first.
    pub fn rollback(&self, ops: &[Operation]) -> Result<Vec<String>> {
        check_constraint_names(ops)?;
        ops.iter().rev().map(|op| self.rollback_one(op)).collect()
    }

    fn forward_one(&self, op: &Operation) -> Result<String> {
        match op {
            Operation::CreateTable { table, columns } => self.create_table(table, columns),
            Operation::AddColumn { table, column } => self.add_column(table, column),
            Operation::DropColumn { table, column, .. } => drop_column(table, column),
            Operation::ModifyColumn { table, from, to } => modify_column(table, from, to),
            Operation::DropTable { table, .. } => drop_table(table),
            Operation::AddForeignKey {
                table,
                column,
                reference,
            } => add_foreign_key(table, column, reference),
            Operation::DropForeignKey { table, name, .. } => drop_constraint(table, name),
            Operation::CreateIndex { table, index } => create_index(table, index),
            Operation::RenameColumn { table, from, to } => rename_column(table, from, to),
            Operation::DropIndex { index, .. } => drop_index(index),
        }
    }

    fn rollback_one(&self, op: &Operation) -> Result<String> {
        match op {
            Operation::CreateTable { table, .. } => drop_table(table),
            Operation::AddColumn { table, column } => drop_column(table, &column.name),
            Operation::DropColumn {
                table,
                column,
                original,
            } => match original {
                Some(original) => self.add_column(table, original),
                None => {
                    log::warn!(
                        "Dropped column definition unknown, restoring as text; table={}, column={}",
                        table,
                        column
                    );
                    self.add_column(table, &Column::new(column.clone(), "text"))
                }
            },
            Operation::ModifyColumn { table, from, to } => modify_column(table, to, from),
            Operation::DropTable { table, original } => match original {
                Some(columns) if !columns.is_empty() => self.create_table(table, columns),
                _ => {
                    log::warn!(
                        "Dropped table definition unknown, restoring placeholder; table={}",
                        table
                    );
                    let mut id = Column::new("id", "serial");
                    id.primary = true;
                    self.create_table(table, &[id])
                }
            },
            Operation::AddForeignKey {
                table, reference, ..
            } => drop_constraint(table, &reference.constraint_name(table)),
            Operation::DropForeignKey {
                table,
                name,
                column,
                reference,
            } => {
                let mut reference = reference.clone();
                reference.name = Some(name.clone());
                add_foreign_key(table, column, &reference)
            }
            Operation::CreateIndex { index, .. } => drop_index(index),
            Operation::RenameColumn { table, from, to } => rename_column(table, to, from),
            Operation::DropIndex { table, index } => create_index(table, index),
        }
    }

    fn create_table(&self, table: &str, columns: &[Column]) -> Result<String> {
        require_name("table", table)?;
        if columns.is_empty() {
            return Err(TidemarkError::SynthesisError(format!(
                "CREATE TABLE {} has no columns",
                table
            )));
        }
        let defs = columns
            .iter()
            .map(|c| self.create_column_def(c))
            .collect::<Result<Vec<_>>>()?;
        Ok(format!(
            "CREATE TABLE {} ({});",
            quote_ident(table),
            defs.join(", ")
        ))
    }

    fn create_column_def(&self, col: &Column) -> Result<String> {
        require_name("column", &col.name)?;
        require_name("column type", &col.data_type)?;
        let mut def = format!("{} {}", quote_ident(&col.name), col.data_type.trim());
        if col.primary {
            def.push_str(" PRIMARY KEY");
        }
        if col.unique {
            def.push_str(" UNIQUE");
        }
        if self.options.emit_not_null && col.not_null && !col.primary {
            def.push_str(" NOT NULL");
        }
        if let Some(ref default) = col.default {
            def.push_str(&format!(" DEFAULT {}", default));
        }
        Ok(def)
    }

    fn add_column(&self, table: &str, col: &Column) -> Result<String> {
        require_name("table", table)?;
        require_name("column", &col.name)?;
        require_name("column type", &col.data_type)?;
        let mut stmt = format!(
            "ALTER TABLE {} ADD COLUMN {} {}",
            quote_ident(table),
            quote_ident(&col.name),
            col.data_type.trim()
        );
        if col.primary {
            stmt.push_str(" PRIMARY KEY");
        }
        if self.options.emit_not_null && col.not_null && !col.primary {
            stmt.push_str(" NOT NULL");
        }
        if let Some(ref default) = col.default {
            stmt.push_str(&format!(" DEFAULT {}", default));
        }
        if col.unique && !col.primary {
            stmt.push_str(" UNIQUE");
        }
        stmt.push(';');
        Ok(stmt)
    }
}

/// Forward DDL with default synthesis options.
pub fn generate_forward(ops: &[Operation]) -> Result<Vec<String>> {
    SqlGenerator::default().forward(ops)
}

/// Rollback DDL with default synthesis options.
pub fn generate_rollback(ops: &[Operation]) -> Result<Vec<String>> {
    SqlGenerator::default().rollback(ops)
}

/// Reject two foreign keys added to one table under the same constraint name.
fn check_constraint_names(ops: &[Operation]) -> Result<()> {
    let mut seen: HashMap<(&str, String), &str> = HashMap::new();
    for op in ops {
        let Operation::AddForeignKey {
            table,
            column,
            reference,
        } = op
        else {
            continue;
        };
        let name = reference.constraint_name(table);
        if let Some(first) = seen.insert((table.as_str(), name.clone()), column.as_str()) {
            return Err(TidemarkError::SynthesisError(format!(
                "foreign keys {}.{} and {}.{} would both be named '{}'; set an explicit name on one of them",
                table, first, table, column, name
            )));
        }
    }
    Ok(())
}

fn require_name(kind: &str, name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(TidemarkError::SynthesisError(format!("empty {} name", kind)));
    }
    Ok(())
}

fn drop_table(table: &str) -> Result<String> {
    require_name("table", table)?;
    Ok(format!("DROP TABLE IF EXISTS {};", quote_ident(table)))
}

fn drop_column(table: &str, column: &str) -> Result<String> {
    require_name("table", table)?;
    require_name("column", column)?;
    Ok(format!(
        "ALTER TABLE {} DROP COLUMN {};",
        quote_ident(table),
        quote_ident(column)
    ))
}

fn rename_column(table: &str, from: &str, to: &str) -> Result<String> {
    require_name("table", table)?;
    require_name("column", from)?;
    require_name("column", to)?;
    Ok(format!(
        "ALTER TABLE {} RENAME COLUMN {} TO {};",
        quote_ident(table),
        quote_ident(from),
        quote_ident(to)
    ))
}

fn drop_constraint(table: &str, name: &str) -> Result<String> {
    require_name("table", table)?;
    require_name("constraint", name)?;
    Ok(format!(
        "ALTER TABLE {} DROP CONSTRAINT {};",
        quote_ident(table),
        quote_ident(name)
    ))
}

/// Upper-case and validate an ON DELETE / ON UPDATE rule.
fn referential_action(rule: &str) -> Result<String> {
    let normalized = rule.split_whitespace().collect::<Vec<_>>().join(" ").to_uppercase();
    if REFERENTIAL_ACTIONS.contains(&normalized.as_str()) {
        Ok(normalized)
    } else {
        Err(TidemarkError::SynthesisError(format!(
            "unsupported referential action '{}'",
            rule
        )))
    }
}

fn add_foreign_key(table: &str, column: &str, reference: &ForeignKey) -> Result<String> {
    require_name("table", table)?;
    require_name("column", column)?;
    require_name("referenced table", &reference.table)?;
    require_name("referenced column", &reference.column)?;
    let mut stmt = format!(
        "ALTER TABLE {} ADD CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {}({})",
        quote_ident(table),
        quote_ident(&reference.constraint_name(table)),
        quote_ident(column),
        quote_ident(&reference.table),
        quote_ident(&reference.column)
    );
    if let Some(ref rule) = reference.on_delete {
        stmt.push_str(&format!(" ON DELETE {}", referential_action(rule)?));
    }
    if let Some(ref rule) = reference.on_update {
        stmt.push_str(&format!(" ON UPDATE {}", referential_action(rule)?));
    }
    stmt.push(';');
    Ok(stmt)
}

fn index_name(index: &IndexConfig) -> Result<&str> {
    match index.name.as_deref() {
        Some(name) if !name.trim().is_empty() => Ok(name),
        _ => Err(TidemarkError::SynthesisError(
            "index has no name".to_string(),
        )),
    }
}

fn create_index(table: &str, index: &IndexConfig) -> Result<String> {
    require_name("table", table)?;
    let name = index_name(index)?;
    if index.columns.is_empty() {
        return Err(TidemarkError::SynthesisError(format!(
            "index {} has no columns",
            name
        )));
    }
    let mut stmt = format!(
        "CREATE {}INDEX {} ON {}",
        if index.unique { "UNIQUE " } else { "" },
        quote_ident(name),
        quote_ident(table)
    );
    if let Some(ref method) = index.method {
        if method.is_empty() || !method.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(TidemarkError::SynthesisError(format!(
                "invalid index method '{}'",
                method
            )));
        }
        stmt.push_str(&format!(" USING {}", method.to_lowercase()));
    }
    let cols = index
        .columns
        .iter()
        .map(|c| {
            require_name("index column", c)?;
            Ok(quote_ident(c))
        })
        .collect::<Result<Vec<_>>>()?;
    stmt.push_str(&format!(" ({});", cols.join(", ")));
    Ok(stmt)
}

fn drop_index(index: &IndexConfig) -> Result<String> {
    Ok(format!("DROP INDEX IF EXISTS {};", quote_ident(index_name(index)?)))
}

/// Type name usable in `ALTER COLUMN ... TYPE`; serial pseudo-types are
/// replaced by their storage type.
fn alter_type_name(data_type: &str) -> String {
    if compat::is_serial_type(data_type) {
        compat::canonical_type(data_type)
    } else {
        data_type.trim().to_string()
    }
}

/// `ALTER TABLE` with one `ALTER COLUMN` action per changed attribute.
fn modify_column(table: &str, from: &Column, to: &Column) -> Result<String> {
    require_name("table", table)?;
    require_name("column", &to.name)?;
    let column = quote_ident(&to.name);
    let delta = compat::column_delta(from, to);
    let mut actions = Vec::new();

    if delta.type_changed {
        let ty = alter_type_name(&to.data_type);
        actions.push(format!(
            "ALTER COLUMN {} TYPE {} USING {}::{}",
            column, ty, column, ty
        ));
    }

    if delta.nullability_changed {
        actions.push(format!(
            "ALTER COLUMN {} {} NOT NULL",
            column,
            if compat::implies_not_null(to) { "SET" } else { "DROP" }
        ));
    }

    if delta.default_changed {
        match compat::normalize_default(to.default.as_deref()) {
            Some(_) => actions.push(format!(
                "ALTER COLUMN {} SET DEFAULT {}",
                column,
                to.default.as_deref().unwrap_or_default().trim()
            )),
            None => actions.push(format!("ALTER COLUMN {} DROP DEFAULT", column)),
        }
    }

    if actions.is_empty() {
        return Err(TidemarkError::SynthesisError(format!(
            "no change detected for column {}.{}",
            table, to.name
        )));
    }

    Ok(format!(
        "ALTER TABLE {} {};",
        quote_ident(table),
        actions.join(", ")
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn users_model_columns() -> Vec<Column> {
        let mut id = Column::new("id", "serial");
        id.primary = true;
        let mut email = Column::new("email", "text");
        email.unique = true;
        email.not_null = true;
        vec![id, email]
    }

    fn fk(table: &str, on_delete: Option<&str>) -> ForeignKey {
        ForeignKey {
            table: table.to_string(),
            column: "id".to_string(),
            on_delete: on_delete.map(str::to_string),
            on_update: None,
            name: None,
        }
    }

    #[test]
    fn test_create_table_users_scenario() {
        let ops = vec![Operation::CreateTable {
            table: "users".to_string(),
            columns: users_model_columns(),
        }];
        assert_eq!(
            generate_forward(&ops).unwrap(),
            vec![r#"CREATE TABLE "users" ("id" serial PRIMARY KEY, "email" text UNIQUE);"#]
        );
    }

    #[test]
    fn test_create_table_emits_not_null_when_enabled() {
        let gen = SqlGenerator::new(SynthesisSettings {
            emit_not_null: true,
            ..Default::default()
        });
        let ops = vec![Operation::CreateTable {
            table: "users".to_string(),
            columns: users_model_columns(),
        }];
        assert_eq!(
            gen.forward(&ops).unwrap(),
            vec![r#"CREATE TABLE "users" ("id" serial PRIMARY KEY, "email" text UNIQUE NOT NULL);"#]
        );
    }

    #[test]
    fn test_add_column_posts_scenario() {
        let ops = vec![Operation::AddColumn {
            table: "posts".to_string(),
            column: Column::new("subtitle", "text"),
        }];
        assert_eq!(
            generate_forward(&ops).unwrap(),
            vec![r#"ALTER TABLE "posts" ADD COLUMN "subtitle" text;"#]
        );
    }

    #[test]
    fn test_add_column_default_then_unique() {
        let mut col = Column::new("slug", "varchar(64)");
        col.default = Some("''".to_string());
        col.unique = true;
        let ops = vec![Operation::AddColumn {
            table: "posts".to_string(),
            column: col,
        }];
        assert_eq!(
            generate_forward(&ops).unwrap(),
            vec![r#"ALTER TABLE "posts" ADD COLUMN "slug" varchar(64) DEFAULT '' UNIQUE;"#]
        );
    }

    #[test]
    fn test_foreign_key_forward_and_rollback_share_name() {
        let ops = vec![Operation::AddForeignKey {
            table: "posts".to_string(),
            column: "author_id".to_string(),
            reference: fk("users", Some("cascade")),
        }];
        assert_eq!(
            generate_forward(&ops).unwrap(),
            vec![r#"ALTER TABLE "posts" ADD CONSTRAINT "fk_posts_users" FOREIGN KEY ("author_id") REFERENCES "users"("id") ON DELETE CASCADE;"#]
        );
        assert_eq!(
            generate_rollback(&ops).unwrap(),
            vec![r#"ALTER TABLE "posts" DROP CONSTRAINT "fk_posts_users";"#]
        );
    }

    #[test]
    fn test_invalid_referential_action_fails_closed() {
        let ops = vec![Operation::AddForeignKey {
            table: "posts".to_string(),
            column: "author_id".to_string(),
            reference: fk("users", Some("DROP EVERYTHING")),
        }];
        assert!(matches!(
            generate_forward(&ops),
            Err(TidemarkError::SynthesisError(_))
        ));
    }

    #[test]
    fn test_drop_foreign_key_rollback_recreates_with_stored_name() {
        let ops = vec![Operation::DropForeignKey {
            table: "posts".to_string(),
            name: "posts_author_id_fkey".to_string(),
            column: "author_id".to_string(),
            reference: fk("users", None),
        }];
        assert_eq!(
            generate_forward(&ops).unwrap(),
            vec![r#"ALTER TABLE "posts" DROP CONSTRAINT "posts_author_id_fkey";"#]
        );
        assert_eq!(
            generate_rollback(&ops).unwrap(),
            vec![r#"ALTER TABLE "posts" ADD CONSTRAINT "posts_author_id_fkey" FOREIGN KEY ("author_id") REFERENCES "users"("id");"#]
        );
    }

    #[test]
    fn test_create_index_with_method() {
        let ops = vec![Operation::CreateIndex {
            table: "docs".to_string(),
            index: IndexConfig {
                name: Some("idx_docs_body".to_string()),
                columns: vec!["body".to_string(), "lang".to_string()],
                unique: true,
                method: Some("GIN".to_string()),
            },
        }];
        assert_eq!(
            generate_forward(&ops).unwrap(),
            vec![r#"CREATE UNIQUE INDEX "idx_docs_body" ON "docs" USING gin ("body", "lang");"#]
        );
        assert_eq!(
            generate_rollback(&ops).unwrap(),
            vec![r#"DROP INDEX IF EXISTS "idx_docs_body";"#]
        );
    }

    #[test]
    fn test_index_without_columns_fails_closed() {
        let ops = vec![Operation::CreateIndex {
            table: "docs".to_string(),
            index: IndexConfig {
                name: Some("idx_empty".to_string()),
                columns: vec![],
                unique: false,
                method: None,
            },
        }];
        assert!(generate_forward(&ops).is_err());
    }

    #[test]
    fn test_empty_names_fail_closed() {
        let ops = vec![Operation::CreateTable {
            table: "".to_string(),
            columns: vec![Column::new("id", "serial")],
        }];
        assert!(generate_forward(&ops).is_err());

        let ops = vec![Operation::CreateTable {
            table: "t".to_string(),
            columns: vec![],
        }];
        assert!(generate_forward(&ops).is_err());
    }

    #[test]
    fn test_rollback_walks_in_reverse() {
        let ops = vec![
            Operation::CreateTable {
                table: "users".to_string(),
                columns: users_model_columns(),
            },
            Operation::AddColumn {
                table: "posts".to_string(),
                column: Column::new("subtitle", "text"),
            },
        ];
        assert_eq!(
            generate_rollback(&ops).unwrap(),
            vec![
                r#"ALTER TABLE "posts" DROP COLUMN "subtitle";"#.to_string(),
                r#"DROP TABLE IF EXISTS "users";"#.to_string(),
            ]
        );
    }

    #[test]
    fn test_drop_column_rollback_uses_original_or_placeholder() {
        let mut original = Column::new("score", "integer");
        original.default = Some("0".to_string());
        let ops = vec![
            Operation::DropColumn {
                table: "t".to_string(),
                column: "score".to_string(),
                original: Some(original),
            },
            Operation::DropColumn {
                table: "t".to_string(),
                column: "mystery".to_string(),
                original: None,
            },
        ];
        assert_eq!(
            generate_rollback(&ops).unwrap(),
            vec![
                r#"ALTER TABLE "t" ADD COLUMN "mystery" text;"#.to_string(),
                r#"ALTER TABLE "t" ADD COLUMN "score" integer DEFAULT 0;"#.to_string(),
            ]
        );
    }

    #[test]
    fn test_drop_table_rollback_uses_original_or_placeholder() {
        let ops = vec![Operation::DropTable {
            table: "legacy".to_string(),
            original: None,
        }];
        assert_eq!(
            generate_forward(&ops).unwrap(),
            vec![r#"DROP TABLE IF EXISTS "legacy";"#]
        );
        assert_eq!(
            generate_rollback(&ops).unwrap(),
            vec![r#"CREATE TABLE "legacy" ("id" serial PRIMARY KEY);"#]
        );

        let ops = vec![Operation::DropTable {
            table: "legacy".to_string(),
            original: Some(users_model_columns()),
        }];
        assert_eq!(
            generate_rollback(&ops).unwrap(),
            vec![r#"CREATE TABLE "legacy" ("id" serial PRIMARY KEY, "email" text UNIQUE);"#]
        );
    }

    #[test]
    fn test_modify_column_forward_and_back() {
        let mut from = Column::new("age", "text");
        from.default = Some("'0'::text".to_string());
        let mut to = Column::new("age", "integer");
        to.not_null = true;
        let ops = vec![Operation::ModifyColumn {
            table: "people".to_string(),
            from,
            to,
        }];
        assert_eq!(
            generate_forward(&ops).unwrap(),
            vec![r#"ALTER TABLE "people" ALTER COLUMN "age" TYPE integer USING "age"::integer, ALTER COLUMN "age" SET NOT NULL, ALTER COLUMN "age" DROP DEFAULT;"#]
        );
        assert_eq!(
            generate_rollback(&ops).unwrap(),
            vec![r#"ALTER TABLE "people" ALTER COLUMN "age" TYPE text USING "age"::text, ALTER COLUMN "age" DROP NOT NULL, ALTER COLUMN "age" SET DEFAULT '0'::text;"#]
        );
    }

    #[test]
    fn test_modify_column_without_change_fails_closed() {
        let ops = vec![Operation::ModifyColumn {
            table: "t".to_string(),
            from: Column::new("a", "varchar"),
            to: Column::new("a", "text"),
        }];
        assert!(matches!(
            generate_forward(&ops),
            Err(TidemarkError::SynthesisError(_))
        ));
    }

    #[test]
    fn test_rename_and_drop_index_are_reversible() {
        let idx = IndexConfig {
            name: Some("idx_t_a".to_string()),
            columns: vec!["a".to_string()],
            unique: false,
            method: None,
        };
        let ops = vec![
            Operation::RenameColumn {
                table: "t".to_string(),
                from: "old".to_string(),
                to: "new".to_string(),
            },
            Operation::DropIndex {
                table: "t".to_string(),
                index: idx,
            },
        ];
        assert_eq!(
            generate_forward(&ops).unwrap(),
            vec![
                r#"ALTER TABLE "t" RENAME COLUMN "old" TO "new";"#.to_string(),
                r#"DROP INDEX IF EXISTS "idx_t_a";"#.to_string(),
            ]
        );
        assert_eq!(
            generate_rollback(&ops).unwrap(),
            vec![
                r#"CREATE INDEX "idx_t_a" ON "t" ("a");"#.to_string(),
                r#"ALTER TABLE "t" RENAME COLUMN "new" TO "old";"#.to_string(),
            ]
        );
    }

    #[test]
    fn test_modify_column_keeps_same_family_type() {
        let from = Column::new("n", "bigint");
        let mut to = Column::new("n", "integer");
        to.not_null = true;
        let ops = vec![Operation::ModifyColumn {
            table: "t".to_string(),
            from,
            to,
        }];
        assert_eq!(
            generate_forward(&ops).unwrap(),
            vec![r#"ALTER TABLE "t" ALTER COLUMN "n" SET NOT NULL;"#]
        );
        assert_eq!(
            generate_rollback(&ops).unwrap(),
            vec![r#"ALTER TABLE "t" ALTER COLUMN "n" DROP NOT NULL;"#]
        );
    }

    #[test]
    fn test_modify_column_drops_sequence_default() {
        let mut from = Column::new("n", "integer");
        from.not_null = true;
        from.default = Some("nextval('t_n_seq'::regclass)".to_string());
        let mut to = Column::new("n", "integer");
        to.not_null = true;
        let ops = vec![Operation::ModifyColumn {
            table: "t".to_string(),
            from,
            to,
        }];
        assert_eq!(
            generate_forward(&ops).unwrap(),
            vec![r#"ALTER TABLE "t" ALTER COLUMN "n" DROP DEFAULT;"#]
        );
        assert_eq!(
            generate_rollback(&ops).unwrap(),
            vec![r#"ALTER TABLE "t" ALTER COLUMN "n" SET DEFAULT nextval('t_n_seq'::regclass);"#]
        );
    }

    #[test]
    fn test_colliding_foreign_key_names_fail_closed() {
        let add = |column: &str| Operation::AddForeignKey {
            table: "items".to_string(),
            column: column.to_string(),
            reference: fk("users", None),
        };
        let ops = vec![add("owner_id"), add("editor_id")];
        match generate_forward(&ops) {
            Err(TidemarkError::SynthesisError(msg)) => {
                assert!(msg.contains("owner_id"));
                assert!(msg.contains("editor_id"));
                assert!(msg.contains("fk_items_users"));
            }
            other => panic!("Expected SynthesisError, got {:?}", other),
        }

        let mut named = fk("users", None);
        named.name = Some("fk_items_editor".to_string());
        let ops = vec![
            add("owner_id"),
            Operation::AddForeignKey {
                table: "items".to_string(),
                column: "editor_id".to_string(),
                reference: named,
            },
        ];
        assert_eq!(generate_forward(&ops).unwrap().len(), 2);
    }
}
