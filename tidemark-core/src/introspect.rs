//! Observed-state snapshot from the PostgreSQL catalog.

use std::collections::{HashMap, HashSet};

use tokio_postgres::Client;

use crate::error::Result;
use crate::model::{ExistingColumn, ExistingForeignKey, ExistingIndex, ExistingTable};

/// Key constraint membership of one column.
#[derive(Debug, Clone, PartialEq, Eq)]
struct KeyColumn {
    table: String,
    column: String,
    primary: bool,
}

/// Introspect every base table in `schema`, with columns, foreign keys and indexes.
///
/// Tables come back sorted by name, columns in ordinal order.
pub async fn introspect_existing(client: &Client, schema: &str) -> Result<Vec<ExistingTable>> {
    let table_rows = client
        .query(
            "SELECT table_name::text FROM information_schema.tables
             WHERE table_schema = $1 AND table_type = 'BASE TABLE'
             ORDER BY table_name",
            &[&schema],
        )
        .await?;
    let names: Vec<String> = table_rows.iter().map(|r| r.get(0)).collect();

    let column_rows = client
        .query(
            "SELECT c.table_name::text,
                    c.column_name::text,
                    CASE WHEN c.data_type = 'USER-DEFINED' THEN c.udt_name::text
                         ELSE c.data_type::text END,
                    c.is_nullable = 'YES',
                    c.column_default::text
             FROM information_schema.columns c
             WHERE c.table_schema = $1
             ORDER BY c.table_name, c.ordinal_position",
            &[&schema],
        )
        .await?;
    let columns: Vec<(String, ExistingColumn)> = column_rows
        .iter()
        .map(|r| {
            (
                r.get(0),
                ExistingColumn {
                    name: r.get(1),
                    data_type: r.get(2),
                    is_nullable: r.get(3),
                    column_default: r.get(4),
                    is_primary_key: false,
                    is_unique: false,
                },
            )
        })
        .collect();

    // Single-column UNIQUE constraints and every PRIMARY KEY member.
    let key_rows = client
        .query(
            "SELECT cl.relname::text, a.attname::text, con.contype = 'p'
             FROM pg_constraint con
             JOIN pg_class cl ON cl.oid = con.conrelid
             JOIN pg_namespace n ON n.oid = cl.relnamespace
             JOIN pg_attribute a ON a.attrelid = con.conrelid AND a.attnum = ANY(con.conkey)
             WHERE n.nspname = $1
               AND (con.contype = 'p' OR (con.contype = 'u' AND array_length(con.conkey, 1) = 1))",
            &[&schema],
        )
        .await?;
    let keys: Vec<KeyColumn> = key_rows
        .iter()
        .map(|r| KeyColumn {
            table: r.get(0),
            column: r.get(1),
            primary: r.get(2),
        })
        .collect();

    let fk_rows = client
        .query(
            "SELECT cl.relname::text,
                    con.conname::text,
                    a.attname::text,
                    fcl.relname::text,
                    fa.attname::text,
                    CASE con.confdeltype WHEN 'r' THEN 'RESTRICT' WHEN 'c' THEN 'CASCADE'
                         WHEN 'n' THEN 'SET NULL' WHEN 'd' THEN 'SET DEFAULT'
                         ELSE 'NO ACTION' END,
                    CASE con.confupdtype WHEN 'r' THEN 'RESTRICT' WHEN 'c' THEN 'CASCADE'
                         WHEN 'n' THEN 'SET NULL' WHEN 'd' THEN 'SET DEFAULT'
                         ELSE 'NO ACTION' END
             FROM pg_constraint con
             JOIN pg_class cl ON cl.oid = con.conrelid
             JOIN pg_namespace n ON n.oid = cl.relnamespace
             JOIN pg_class fcl ON fcl.oid = con.confrelid
             JOIN pg_attribute a ON a.attrelid = con.conrelid AND a.attnum = con.conkey[1]
             JOIN pg_attribute fa ON fa.attrelid = con.confrelid AND fa.attnum = con.confkey[1]
             WHERE n.nspname = $1 AND con.contype = 'f'
             ORDER BY cl.relname, con.conname",
            &[&schema],
        )
        .await?;
    let foreign_keys: Vec<(String, ExistingForeignKey)> = fk_rows
        .iter()
        .map(|r| {
            (
                r.get(0),
                ExistingForeignKey {
                    constraint_name: r.get(1),
                    column_name: r.get(2),
                    foreign_table: r.get(3),
                    foreign_column: r.get(4),
                    delete_rule: r.get(5),
                    update_rule: r.get(6),
                },
            )
        })
        .collect();

    let index_rows = client
        .query(
            "SELECT ic.relname::text,
                    t.relname::text,
                    ARRAY(SELECT a.attname::text
                          FROM unnest(ix.indkey::int2[]) WITH ORDINALITY AS k(attnum, ord)
                          JOIN pg_attribute a ON a.attrelid = t.oid AND a.attnum = k.attnum
                          ORDER BY k.ord),
                    ix.indisunique,
                    am.amname::text
             FROM pg_index ix
             JOIN pg_class ic ON ic.oid = ix.indexrelid
             JOIN pg_class t ON t.oid = ix.indrelid
             JOIN pg_namespace n ON n.oid = t.relnamespace
             JOIN pg_am am ON am.oid = ic.relam
             WHERE n.nspname = $1 AND t.relkind = 'r'
             ORDER BY t.relname, ic.relname",
            &[&schema],
        )
        .await?;
    let indexes: Vec<ExistingIndex> = index_rows
        .iter()
        .map(|r| ExistingIndex {
            name: r.get(0),
            table: r.get(1),
            columns: r.get(2),
            is_unique: r.get(3),
            method: r.get(4),
        })
        .collect();

    let tables = assemble(names, columns, &keys, foreign_keys, indexes);
    log::debug!(
        "Introspected schema; schema={}, tables={}",
        schema,
        tables.len()
    );
    Ok(tables)
}

/// Group flat catalog rows into tables, keeping the order of `names`.
fn assemble(
    names: Vec<String>,
    columns: Vec<(String, ExistingColumn)>,
    keys: &[KeyColumn],
    foreign_keys: Vec<(String, ExistingForeignKey)>,
    indexes: Vec<ExistingIndex>,
) -> Vec<ExistingTable> {
    let mut tables: Vec<ExistingTable> = names
        .into_iter()
        .map(|name| ExistingTable {
            name,
            ..Default::default()
        })
        .collect();
    let position: HashMap<String, usize> = tables
        .iter()
        .enumerate()
        .map(|(i, t)| (t.name.clone(), i))
        .collect();

    let primary: HashSet<(&str, &str)> = keys
        .iter()
        .filter(|k| k.primary)
        .map(|k| (k.table.as_str(), k.column.as_str()))
        .collect();
    let unique: HashSet<(&str, &str)> = keys
        .iter()
        .filter(|k| !k.primary)
        .map(|k| (k.table.as_str(), k.column.as_str()))
        .collect();

    for (table, mut column) in columns {
        let Some(&i) = position.get(&table) else {
            continue;
        };
        let key = (table.as_str(), column.name.as_str());
        column.is_primary_key = primary.contains(&key);
        column.is_unique = column.is_primary_key || unique.contains(&key);
        tables[i].columns.push(column);
    }

    for (table, fk) in foreign_keys {
        if let Some(&i) = position.get(&table) {
            tables[i].foreign_keys.push(fk);
        }
    }

    for index in indexes {
        if let Some(&i) = position.get(&index.table) {
            tables[i].indexes.push(index);
        }
    }

    tables
}
