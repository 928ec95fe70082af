//! In-process record store. Mirrors the Postgres store's observable behaviour: generated uuids,
//! managed timestamps, value normalization and NO ACTION foreign keys from the catalog.

use super::RecordStore;
use crate::config::{ColumnInfo, PkType, ResolvedEntity, ResolvedModel};
use crate::dates;
use crate::error::AppError;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap, HashSet};
use tokio::sync::RwLock;

type Row = Map<String, Value>;
type Table = BTreeMap<String, Row>;

pub struct MemoryStore {
    entities: HashMap<String, ResolvedEntity>,
    tables: RwLock<HashMap<String, Table>>,
}

impl MemoryStore {
    pub fn new(model: &ResolvedModel) -> Self {
        let entities = model.entity_by_path.clone();
        let tables = entities.keys().map(|k| (k.clone(), Table::new())).collect();
        MemoryStore {
            entities,
            tables: RwLock::new(tables),
        }
    }

    fn related(&self, path: &str) -> Result<&ResolvedEntity, AppError> {
        self.entities
            .get(path)
            .ok_or_else(|| AppError::NotFound(format!("entity {}", path)))
    }
}

/// Row key for a primary key value.
fn key_of(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Rows in primary key order: numeric for integer keys, lexical otherwise.
fn ordered<'a>(entity: &ResolvedEntity, rows: &'a Table) -> Vec<&'a Row> {
    let mut out: Vec<&Row> = rows.values().collect();
    if matches!(entity.pk_type, PkType::Int | PkType::BigInt) {
        out.sort_by_key(|r| r.get(&entity.pk_column).and_then(Value::as_i64));
    }
    out
}

fn now() -> Value {
    Value::String(dates::to_wire(&chrono::Utc::now()))
}

/// Coerce a value the way the column's PostgreSQL type would.
fn normalize(column: &ColumnInfo, v: Value) -> Result<Value, AppError> {
    let Value::String(s) = &v else { return Ok(v) };
    match column.pg_type.as_deref() {
        Some("uuid") => uuid::Uuid::parse_str(s)
            .map(|u| Value::String(u.to_string()))
            .map_err(|_| AppError::BadRequest(format!("{}: invalid uuid '{}'", column.name, s))),
        Some("timestamptz") | Some("timestamp") => dates::parse_timestamp(s)
            .map(|d| Value::String(dates::to_wire(&d)))
            .ok_or_else(|| AppError::BadRequest(format!("{}: invalid timestamp '{}'", column.name, s))),
        Some("date") => dates::parse_timestamp(s)
            .map(|d| Value::String(d.format("%Y-%m-%d").to_string()))
            .ok_or_else(|| AppError::BadRequest(format!("{}: invalid date '{}'", column.name, s))),
        _ => Ok(v),
    }
}

fn table<'a>(tables: &'a HashMap<String, Table>, path: &str) -> Result<&'a Table, AppError> {
    tables
        .get(path)
        .ok_or_else(|| AppError::NotFound(format!("entity {}", path)))
}

fn table_mut<'a>(tables: &'a mut HashMap<String, Table>, path: &str) -> Result<&'a mut Table, AppError> {
    tables
        .get_mut(path)
        .ok_or_else(|| AppError::NotFound(format!("entity {}", path)))
}

impl MemoryStore {
    /// Every non-null FK in `row` must point at an existing row.
    fn check_references(
        &self,
        tables: &HashMap<String, Table>,
        entity: &ResolvedEntity,
        row: &Row,
    ) -> Result<(), AppError> {
        for rel in entity.references() {
            let value = match row.get(&rel.our_key_column) {
                None | Some(Value::Null) => continue,
                Some(v) => v,
            };
            let related = self.related(&rel.related_path_segment)?;
            let target = table(tables, &rel.related_path_segment)?;
            let exists = if rel.their_key_column == related.pk_column {
                target.contains_key(&key_of(value))
            } else {
                target.values().any(|r| r.get(&rel.their_key_column) == Some(value))
            };
            if !exists {
                return Err(AppError::Conflict(format!(
                    "insert or update on {} violates foreign key {} -> {}.{}",
                    entity.table_name, rel.our_key_column, related.table_name, rel.their_key_column
                )));
            }
        }
        Ok(())
    }

    /// No other row may still reference `row`.
    fn check_not_referenced(
        &self,
        tables: &HashMap<String, Table>,
        entity: &ResolvedEntity,
        row: &Row,
    ) -> Result<(), AppError> {
        for rel in entity.referenced_by() {
            let Some(value) = row.get(&rel.our_key_column).filter(|v| !v.is_null()) else { continue };
            let referencing = table(tables, &rel.related_path_segment)?;
            if referencing.values().any(|r| r.get(&rel.their_key_column) == Some(value)) {
                return Err(AppError::Conflict(format!(
                    "delete on {} violates foreign key from {}.{}",
                    entity.table_name, rel.related_path_segment, rel.their_key_column
                )));
            }
        }
        Ok(())
    }

    fn next_pk(&self, entity: &ResolvedEntity, existing: &Table) -> Result<Value, AppError> {
        match entity.pk_type {
            PkType::Uuid => Ok(Value::String(uuid::Uuid::new_v4().to_string())),
            PkType::Int | PkType::BigInt => {
                let max = existing
                    .values()
                    .filter_map(|r| r.get(&entity.pk_column).and_then(Value::as_i64))
                    .max()
                    .unwrap_or(0);
                Ok(Value::Number((max + 1).into()))
            }
            PkType::Text => Err(AppError::Validation(format!("{} is required", entity.pk_column))),
        }
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn find_by_id(&self, entity: &ResolvedEntity, id: &Value) -> Result<Option<Value>, AppError> {
        let tables = self.tables.read().await;
        let row = table(&tables, &entity.path_segment)?.get(&key_of(id));
        Ok(row.cloned().map(Value::Object))
    }

    async fn find_where_in(
        &self,
        entity: &ResolvedEntity,
        column: &str,
        values: &[Value],
    ) -> Result<Vec<Value>, AppError> {
        let wanted: HashSet<String> = values.iter().filter(|v| !v.is_null()).map(key_of).collect();
        if wanted.is_empty() {
            return Ok(Vec::new());
        }
        let tables = self.tables.read().await;
        Ok(ordered(entity, table(&tables, &entity.path_segment)?)
            .into_iter()
            .filter(|r| r.get(column).map(|v| wanted.contains(&key_of(v))).unwrap_or(false))
            .cloned()
            .map(Value::Object)
            .collect())
    }

    async fn list(
        &self,
        entity: &ResolvedEntity,
        filters: &[(String, Value)],
        limit: u32,
        offset: u32,
    ) -> Result<Vec<Value>, AppError> {
        let mut normalized = Vec::with_capacity(filters.len());
        for (col, val) in filters {
            if let Some(c) = entity.column(col) {
                normalized.push((col.as_str(), normalize(c, val.clone())?));
            }
        }
        let tables = self.tables.read().await;
        Ok(ordered(entity, table(&tables, &entity.path_segment)?)
            .into_iter()
            .filter(|r| normalized.iter().all(|(col, val)| r.get(*col) == Some(val)))
            .skip(offset as usize)
            .take(limit as usize)
            .cloned()
            .map(Value::Object)
            .collect())
    }

    async fn create(&self, entity: &ResolvedEntity, body: &Map<String, Value>) -> Result<Value, AppError> {
        let mut tables = self.tables.write().await;
        let mut row = Row::new();
        for c in &entity.columns {
            let value = if c.managed {
                now()
            } else if c.pk_type.is_some() {
                match body.get(&c.name).filter(|v| !v.is_null()) {
                    Some(v) => v.clone(),
                    None => self.next_pk(entity, table(&tables, &entity.path_segment)?)?,
                }
            } else {
                body.get(&c.name).cloned().unwrap_or(Value::Null)
            };
            let value = normalize(c, value)?;
            if value.is_null() && !c.nullable {
                return Err(AppError::Validation(format!("{} is required", c.name)));
            }
            row.insert(c.name.clone(), value);
        }
        self.check_references(&tables, entity, &row)?;
        let key = key_of(&row[&entity.pk_column]);
        let rows = table_mut(&mut tables, &entity.path_segment)?;
        if rows.contains_key(&key) {
            return Err(AppError::Conflict(format!("{} {} already exists", entity.name, key)));
        }
        tracing::debug!(entity = %entity.name, id = %key, "memory insert");
        rows.insert(key, row.clone());
        Ok(Value::Object(row))
    }

    async fn update(
        &self,
        entity: &ResolvedEntity,
        id: &Value,
        body: &Map<String, Value>,
    ) -> Result<Option<Value>, AppError> {
        let mut tables = self.tables.write().await;
        let key = key_of(id);
        let Some(mut row) = table(&tables, &entity.path_segment)?.get(&key).cloned() else {
            return Ok(None);
        };
        for (k, v) in body {
            if !entity.is_writable(k) {
                continue;
            }
            let Some(c) = entity.column(k) else { continue };
            let value = normalize(c, v.clone())?;
            if value.is_null() && !c.nullable {
                return Err(AppError::Validation(format!("{} must not be null", c.name)));
            }
            row.insert(k.clone(), value);
        }
        if entity.column("updated_at").is_some() {
            row.insert("updated_at".into(), now());
        }
        self.check_references(&tables, entity, &row)?;
        tracing::debug!(entity = %entity.name, id = %key, "memory update");
        table_mut(&mut tables, &entity.path_segment)?.insert(key, row.clone());
        Ok(Some(Value::Object(row)))
    }

    async fn delete(&self, entity: &ResolvedEntity, id: &Value) -> Result<Option<Value>, AppError> {
        let mut tables = self.tables.write().await;
        let key = key_of(id);
        let Some(row) = table(&tables, &entity.path_segment)?.get(&key).cloned() else {
            return Ok(None);
        };
        self.check_not_referenced(&tables, entity, &row)?;
        tracing::debug!(entity = %entity.name, id = %key, "memory delete");
        table_mut(&mut tables, &entity.path_segment)?.remove(&key);
        Ok(Some(Value::Object(row)))
    }

    async fn ping(&self) -> Result<(), AppError> {
        Ok(())
    }
}
