//! Entity-aware CRUD over a record store: validation before writes, includes on reads.
//! Rows are returned exactly as the store produced them.

use crate::config::{IncludeDirection, ResolvedEntity, ResolvedModel};
use crate::error::AppError;
use crate::service::RequestValidator;
use crate::store::RecordStore;
use serde_json::{Map, Value};

pub const DEFAULT_LIMIT: u32 = 100;
pub const MAX_LIMIT: u32 = crate::sql::MAX_LIMIT;

pub struct CrudService;

impl CrudService {
    /// Fetch one row by primary key, with the requested includes embedded.
    pub async fn read(
        store: &dyn RecordStore,
        model: &ResolvedModel,
        entity: &ResolvedEntity,
        id: &Value,
        includes: &[String],
    ) -> Result<Option<Value>, AppError> {
        let Some(row) = store.find_by_id(entity, id).await? else {
            return Ok(None);
        };
        let mut rows = vec![row];
        Self::attach_includes(store, model, entity, &mut rows, includes).await?;
        Ok(rows.pop())
    }

    /// List rows with optional filters (exact match), limit (default 100, max 1000), offset (default 0).
    pub async fn list(
        store: &dyn RecordStore,
        entity: &ResolvedEntity,
        filters: &[(String, Value)],
        limit: Option<u32>,
        offset: Option<u32>,
    ) -> Result<Vec<Value>, AppError> {
        let limit = limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT);
        let offset = offset.unwrap_or(0);
        store.list(entity, filters, limit, offset).await
    }

    /// Validate and insert one row. Returns the created row.
    pub async fn create(
        store: &dyn RecordStore,
        entity: &ResolvedEntity,
        body: &Map<String, Value>,
    ) -> Result<Value, AppError> {
        RequestValidator::validate_body(entity, body)?;
        store.create(entity, body).await
    }

    /// Validate and write the posted fields over the stored row. Returns the merged row.
    pub async fn update(
        store: &dyn RecordStore,
        entity: &ResolvedEntity,
        id: &Value,
        body: &Map<String, Value>,
    ) -> Result<Option<Value>, AppError> {
        RequestValidator::validate_body(entity, body)?;
        store.update(entity, id, body).await
    }

    /// Delete one row by id. Returns the deleted row or None.
    pub async fn delete(
        store: &dyn RecordStore,
        entity: &ResolvedEntity,
        id: &Value,
    ) -> Result<Option<Value>, AppError> {
        store.delete(entity, id).await
    }

    /// Batch-load each include for all rows with one store call per include.
    async fn attach_includes(
        store: &dyn RecordStore,
        model: &ResolvedModel,
        entity: &ResolvedEntity,
        rows: &mut [Value],
        names: &[String],
    ) -> Result<(), AppError> {
        for name in names {
            let spec = entity
                .include(name)
                .ok_or_else(|| AppError::BadRequest(format!("unknown include '{}' for {}", name, entity.name)))?;
            let related = model
                .entity_by_path(&spec.related_path_segment)
                .ok_or_else(|| AppError::NotFound(spec.related_path_segment.clone()))?;
            let keys: Vec<Value> = rows
                .iter()
                .filter_map(|r| r.get(&spec.our_key_column).cloned())
                .filter(|v| !v.is_null())
                .collect();
            let found = store.find_where_in(related, &spec.their_key_column, &keys).await?;
            for row in rows.iter_mut() {
                let key = row.get(&spec.our_key_column).cloned().unwrap_or(Value::Null);
                let mut matching = found
                    .iter()
                    .filter(|r| !key.is_null() && r.get(&spec.their_key_column) == Some(&key))
                    .cloned();
                let embedded = match spec.direction {
                    IncludeDirection::ToOne => matching.next().unwrap_or(Value::Null),
                    IncludeDirection::ToMany => Value::Array(matching.collect()),
                };
                if let Value::Object(map) = row {
                    map.insert(spec.name.clone(), embedded);
                }
            }
        }
        Ok(())
    }
}
