//! Builds parameterized INSERT, SELECT, UPDATE, DELETE from a resolved entity.

use crate::config::{ColumnInfo, ResolvedEntity};
use serde_json::{Map, Value};
use std::collections::HashSet;

/// Hard cap on list page size.
pub const MAX_LIMIT: u32 = 1000;

/// Quote identifier for PostgreSQL (safe: only from catalog).
fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

fn qualified_table(entity: &ResolvedEntity) -> String {
    format!("{}.{}", quoted(&entity.schema_name), quoted(&entity.table_name))
}

#[derive(Debug)]
pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<Value>,
}

impl QueryBuf {
    fn new() -> Self {
        QueryBuf {
            sql: String::new(),
            params: Vec::new(),
        }
    }

    fn push_param(&mut self, v: Value) -> u32 {
        let n = self.params.len() as u32 + 1;
        self.params.push(v);
        n
    }
}

/// `$n` with a cast when the column has a known PostgreSQL type, so text binds convert server-side.
fn placeholder(param_num: u32, column: Option<&ColumnInfo>) -> String {
    column
        .and_then(|c| c.pg_type.as_deref())
        .map(|t| format!("${}::{}", param_num, t))
        .unwrap_or_else(|| format!("${}", param_num))
}

/// SELECT list: numeric and custom types come back as text so rows decode uniformly.
fn select_column_list(entity: &ResolvedEntity) -> String {
    entity
        .columns
        .iter()
        .map(|c| {
            let q = quoted(&c.name);
            let pg_type = c.pg_type.as_deref().unwrap_or("");
            if pg_type.contains('.') || pg_type == "numeric" {
                format!("{}::text AS {}", q, q)
            } else {
                q
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// SELECT by primary key. The id is the sole param.
pub fn select_by_id(entity: &ResolvedEntity, id: &Value) -> QueryBuf {
    let mut q = QueryBuf::new();
    let n = q.push_param(id.clone());
    q.sql = format!(
        "SELECT {} FROM {} WHERE {} = {}",
        select_column_list(entity),
        qualified_table(entity),
        quoted(&entity.pk_column),
        placeholder(n, entity.column(&entity.pk_column))
    );
    q
}

/// SELECT list with exact-match filters (unknown columns skipped), ORDER BY pk, LIMIT/OFFSET.
pub fn select_list(
    entity: &ResolvedEntity,
    filters: &[(String, Value)],
    limit: Option<u32>,
    offset: Option<u32>,
) -> QueryBuf {
    let mut q = QueryBuf::new();
    let mut where_parts = Vec::new();
    for (col, val) in filters {
        let Some(c) = entity.column(col) else { continue };
        let n = q.push_param(val.clone());
        where_parts.push(format!("{} = {}", quoted(col), placeholder(n, Some(c))));
    }
    let where_clause = if where_parts.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", where_parts.join(" AND "))
    };
    let limit_clause = limit.map(|n| format!(" LIMIT {}", n.min(MAX_LIMIT))).unwrap_or_default();
    let offset_clause = offset.map(|n| format!(" OFFSET {}", n)).unwrap_or_default();
    q.sql = format!(
        "SELECT {} FROM {}{} ORDER BY {}{}{}",
        select_column_list(entity),
        qualified_table(entity),
        where_clause,
        quoted(&entity.pk_column),
        limit_clause,
        offset_clause
    );
    q
}

/// SELECT rows where column IN (values) ORDER BY pk. Used for batch-loading includes.
pub fn select_by_column_in(entity: &ResolvedEntity, column_name: &str, values: &[Value]) -> QueryBuf {
    let mut q = QueryBuf::new();
    let cols = select_column_list(entity);
    let table = qualified_table(entity);
    if values.is_empty() {
        q.sql = format!("SELECT {} FROM {} WHERE 1 = 0", cols, table);
        return q;
    }
    let column = entity.column(column_name);
    let placeholders: Vec<String> = values
        .iter()
        .map(|v| {
            let n = q.push_param(v.clone());
            placeholder(n, column)
        })
        .collect();
    q.sql = format!(
        "SELECT {} FROM {} WHERE {} IN ({}) ORDER BY {}",
        cols,
        table,
        quoted(column_name),
        placeholders.join(", "),
        quoted(&entity.pk_column)
    );
    q
}

/// INSERT writable columns from body; columns with a DB default are omitted when absent.
/// The PK is included only when the body provides it.
pub fn insert(entity: &ResolvedEntity, body: &Map<String, Value>) -> QueryBuf {
    let mut q = QueryBuf::new();
    let mut cols = Vec::new();
    let mut placeholders = Vec::new();
    for c in &entity.columns {
        let is_pk = c.pk_type.is_some();
        if c.managed {
            continue;
        }
        let val = body.get(&c.name).cloned();
        if val.is_none() && (c.has_default || is_pk) {
            continue;
        }
        let n = q.push_param(val.unwrap_or(Value::Null));
        cols.push(quoted(&c.name));
        placeholders.push(placeholder(n, Some(c)));
    }
    let returning = select_column_list(entity);
    q.sql = if cols.is_empty() {
        format!("INSERT INTO {} DEFAULT VALUES RETURNING {}", qualified_table(entity), returning)
    } else {
        format!(
            "INSERT INTO {} ({}) VALUES ({}) RETURNING {}",
            qualified_table(entity),
            cols.join(", "),
            placeholders.join(", "),
            returning
        )
    };
    q
}

/// UPDATE by id: SET writable columns present in body, refresh updated_at.
pub fn update(entity: &ResolvedEntity, id: &Value, body: &Map<String, Value>) -> QueryBuf {
    let mut q = QueryBuf::new();
    let mut sets = Vec::new();
    for (k, v) in body {
        if !entity.is_writable(k) {
            continue;
        }
        let n = q.push_param(v.clone());
        sets.push(format!("{} = {}", quoted(k), placeholder(n, entity.column(k))));
    }
    let names: HashSet<&str> = entity.columns.iter().map(|c| c.name.as_str()).collect();
    if names.contains("updated_at") {
        sets.push(format!("{} = NOW()", quoted("updated_at")));
    }
    let id_param = q.push_param(id.clone());
    let id_ph = placeholder(id_param, entity.column(&entity.pk_column));
    let returning = select_column_list(entity);
    if sets.is_empty() {
        q.sql = format!(
            "SELECT {} FROM {} WHERE {} = {}",
            returning,
            qualified_table(entity),
            quoted(&entity.pk_column),
            id_ph
        );
        return q;
    }
    q.sql = format!(
        "UPDATE {} SET {} WHERE {} = {} RETURNING {}",
        qualified_table(entity),
        sets.join(", "),
        quoted(&entity.pk_column),
        id_ph,
        returning
    );
    q
}

/// DELETE by id, returning the deleted row.
pub fn delete(entity: &ResolvedEntity, id: &Value) -> QueryBuf {
    let mut q = QueryBuf::new();
    let n = q.push_param(id.clone());
    q.sql = format!(
        "DELETE FROM {} WHERE {} = {} RETURNING {}",
        qualified_table(entity),
        quoted(&entity.pk_column),
        placeholder(n, entity.column(&entity.pk_column)),
        select_column_list(entity)
    );
    q
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{builtin_config, resolve, ResolvedModel};
    use serde_json::json;

    fn model() -> ResolvedModel {
        resolve(&builtin_config().unwrap()).unwrap()
    }

    fn obj(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn select_by_id_casts_uuid_pk() {
        let model = model();
        let rental = model.entity_by_path("rentals").unwrap();
        let q = select_by_id(rental, &json!("5a1c"));
        assert!(q.sql.starts_with("SELECT \"id\", \"rental_date\""));
        assert!(q.sql.ends_with("FROM \"public\".\"rental\" WHERE \"id\" = $1::uuid"));
        assert_eq!(q.params, vec![json!("5a1c")]);
    }

    #[test]
    fn update_sets_only_writable_fields_and_refreshes_updated_at() {
        let model = model();
        let rental = model.entity_by_path("rentals").unwrap();
        let body = obj(json!({
            "id": "ignored",
            "created_at": "ignored",
            "return_date": "2026-01-02T00:00:00Z",
            "tool_id": null
        }));
        let q = update(rental, &json!("abc"), &body);
        assert_eq!(
            q.sql,
            "UPDATE \"public\".\"rental\" SET \"return_date\" = $1::timestamptz, \"tool_id\" = $2::uuid, \
             \"updated_at\" = NOW() WHERE \"id\" = $3::uuid RETURNING \"id\", \"rental_date\", \"return_date\", \
             \"tool_id\", \"user_id\", \"outlet_id\", \"created_at\", \"updated_at\""
        );
        assert_eq!(q.params, vec![json!("2026-01-02T00:00:00Z"), Value::Null, json!("abc")]);
    }

    #[test]
    fn insert_omits_defaulted_pk_and_managed_columns() {
        let model = model();
        let tools = model.entity_by_path("tools").unwrap();
        let q = insert(tools, &obj(json!({ "name": "Drill" })));
        assert!(q.sql.starts_with(
            "INSERT INTO \"public\".\"tool\" (\"name\", \"description\", \"outlet_id\") VALUES ($1, $2, $3::uuid)"
        ));
        assert_eq!(q.params, vec![json!("Drill"), Value::Null, Value::Null]);
    }

    #[test]
    fn select_list_skips_unknown_filters_and_caps_limit() {
        let model = model();
        let tools = model.entity_by_path("tools").unwrap();
        let filters = vec![
            ("outlet_id".to_string(), json!("o1")),
            ("bogus".to_string(), json!("x")),
        ];
        let q = select_list(tools, &filters, Some(5000), Some(10));
        assert!(q.sql.contains(" WHERE \"outlet_id\" = $1::uuid ORDER BY \"id\" LIMIT 1000 OFFSET 10"));
        assert_eq!(q.params.len(), 1);
    }

    #[test]
    fn select_by_column_in_with_no_values_matches_nothing() {
        let model = model();
        let tools = model.entity_by_path("tools").unwrap();
        let q = select_by_column_in(tools, "id", &[]);
        assert!(q.sql.ends_with("WHERE 1 = 0"));
        let q = select_by_column_in(tools, "id", &[json!("a"), json!("b")]);
        assert!(q.sql.contains("WHERE \"id\" IN ($1::uuid, $2::uuid) ORDER BY \"id\""));
    }
}
