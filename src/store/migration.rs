//! Apply the catalog to PostgreSQL: schemas, tables, then foreign keys.

use crate::config::loader::{primary_key_column, MANAGED_COLUMNS};
use crate::config::types::*;
use crate::config::{default_schema_id, validate, FullConfig};
use crate::error::{AppError, ConfigError};
use sqlx::PgPool;
use std::collections::{HashMap, HashSet};

fn quote(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

fn type_str(ty: &ColumnTypeConfig) -> String {
    match ty {
        ColumnTypeConfig::Simple(s) => s.clone(),
        ColumnTypeConfig::Parameterized { name, params } => {
            let p = params
                .as_ref()
                .map(|v| v.iter().map(|n| n.to_string()).collect::<Vec<_>>().join(", "))
                .unwrap_or_default();
            if p.is_empty() {
                name.clone()
            } else {
                format!("{}({})", name, p)
            }
        }
    }
}

fn missing(kind: &'static str, id: &str) -> ConfigError {
    ConfigError::MissingReference {
        kind,
        id: id.to_string(),
    }
}

/// DDL statements for the catalog in dependency order. Tables are `IF NOT EXISTS`; foreign keys
/// are plain `ADD CONSTRAINT` and expected to fail harmlessly once they exist.
pub fn table_ddl(config: &FullConfig) -> Result<Vec<String>, ConfigError> {
    validate(config)?;
    let default_sid = default_schema_id(config)?;
    let schemas_by_id: HashMap<_, _> = config.schemas.iter().map(|s| (s.id.as_str(), s)).collect();
    let tables_by_id: HashMap<_, _> = config.tables.iter().map(|t| (t.id.as_str(), t)).collect();
    let columns_by_id: HashMap<_, _> = config.columns.iter().map(|c| (c.id.as_str(), c)).collect();
    let columns_by_table: HashMap<_, Vec<&ColumnConfig>> = config.columns.iter().fold(HashMap::new(), |mut m, c| {
        m.entry(c.table_id.as_str()).or_default().push(c);
        m
    });
    let full_table_name = |t: &TableConfig| -> Result<String, ConfigError> {
        let sid = t.schema_id.as_deref().unwrap_or(default_sid);
        let schema = schemas_by_id.get(sid).ok_or_else(|| missing("schema", sid))?;
        Ok(format!("{}.{}", quote(&schema.name), quote(&t.name)))
    };

    let mut out = Vec::new();
    for s in &config.schemas {
        out.push(format!("CREATE SCHEMA IF NOT EXISTS {}", quote(&s.name)));
    }

    for t in &config.tables {
        let cols = columns_by_table.get(t.id.as_str()).map(|v| v.as_slice()).unwrap_or(&[]);
        let mut col_defs: Vec<String> = Vec::new();
        for c in cols {
            let mut def = format!("{} {}", quote(&c.name), type_str(&c.type_));
            if !c.nullable {
                def.push_str(" NOT NULL");
            }
            if let Some(ref d) = c.default {
                def.push_str(" DEFAULT ");
                match d {
                    ColumnDefaultConfig::Literal(s) => def.push_str(&format!("'{}'", s.replace('\'', "''"))),
                    ColumnDefaultConfig::Expression { expression } => def.push_str(expression),
                }
            }
            col_defs.push(def);
        }
        let declared: HashSet<&str> = cols.iter().map(|c| c.name.as_str()).collect();
        for name in MANAGED_COLUMNS {
            if !declared.contains(name) {
                col_defs.push(format!("{} TIMESTAMPTZ NOT NULL DEFAULT NOW()", quote(name)));
            }
        }
        col_defs.push(format!("PRIMARY KEY ({})", quote(&primary_key_column(t)?)));
        for u in &t.unique {
            let cols: Vec<String> = u.iter().map(|s| quote(s)).collect();
            col_defs.push(format!("UNIQUE ({})", cols.join(", ")));
        }
        out.push(format!(
            "CREATE TABLE IF NOT EXISTS {} (\n  {}\n)",
            full_table_name(t)?,
            col_defs.join(",\n  ")
        ));
    }

    for rel in &config.relationships {
        let from_table = tables_by_id.get(rel.from_table_id.as_str()).ok_or_else(|| missing("table", &rel.from_table_id))?;
        let to_table = tables_by_id.get(rel.to_table_id.as_str()).ok_or_else(|| missing("table", &rel.to_table_id))?;
        let from_col = columns_by_id.get(rel.from_column_id.as_str()).ok_or_else(|| missing("column", &rel.from_column_id))?;
        let to_col = columns_by_id.get(rel.to_column_id.as_str()).ok_or_else(|| missing("column", &rel.to_column_id))?;
        out.push(format!(
            "ALTER TABLE {} ADD CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({}) ON UPDATE {} ON DELETE {}",
            full_table_name(from_table)?,
            quote(rel.name.as_deref().unwrap_or(&rel.id)),
            quote(&from_col.name),
            full_table_name(to_table)?,
            quote(&to_col.name),
            rel.on_update.as_deref().unwrap_or("NO ACTION"),
            rel.on_delete.as_deref().unwrap_or("NO ACTION"),
        ));
    }
    Ok(out)
}

/// Create schemas, tables and foreign keys for the catalog. Safe to run on every start.
pub async fn apply_migrations(pool: &PgPool, config: &FullConfig) -> Result<(), AppError> {
    for sql in table_ddl(config)? {
        tracing::debug!(sql = %sql, "ddl");
        if sql.starts_with("ALTER TABLE") {
            if let Err(e) = sqlx::query(&sql).execute(pool).await {
                tracing::warn!(error = %e, "foreign key not added (usually already present)");
            }
        } else {
            sqlx::query(&sql).execute(pool).await?;
        }
    }
    Ok(())
}
