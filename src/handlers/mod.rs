//! HTTP handlers: one resource record by id, and resource collections.

pub mod collection;
pub mod resource;

use crate::authz::{AccessOperation, AccessRequest, Session};
use crate::config::{PkType, ResolvedEntity};
use crate::error::AppError;
use crate::state::AppState;
use axum::http::Method;
use serde_json::{Map, Value};
use std::collections::HashMap;

pub use collection::collection;
pub use resource::record;

fn entity_for<'a>(state: &'a AppState, path_segment: &str) -> Result<&'a ResolvedEntity, AppError> {
    state
        .model
        .entity_by_path(path_segment)
        .ok_or_else(|| AppError::NotFound(format!("unknown resource '{}'", path_segment)))
}

/// Catalog switch first (a disabled operation is a 405), then the policy service.
async fn authorize(
    state: &AppState,
    method: &Method,
    session: &Session,
    entity: &ResolvedEntity,
    record_id: Option<&str>,
    operation: AccessOperation,
) -> Result<(), AppError> {
    if !entity.allows(operation.as_str()) {
        tracing::debug!(entity = %entity.name, operation = %operation, "operation disabled in catalog");
        return Err(AppError::MethodNotAllowed(method.clone()));
    }
    let request = AccessRequest {
        session,
        entity: &entity.name,
        record_id,
        operation,
    };
    state.policy.has_access(&request).await
}

fn parse_id(id_str: &str, pk_type: &PkType) -> Result<Value, AppError> {
    Ok(match pk_type {
        PkType::Uuid => {
            let u = uuid::Uuid::parse_str(id_str).map_err(|_| AppError::BadRequest("invalid uuid".into()))?;
            Value::String(u.to_string())
        }
        PkType::BigInt | PkType::Int => {
            let n: i64 = id_str.parse().map_err(|_| AppError::BadRequest("invalid id".into()))?;
            Value::Number(n.into())
        }
        PkType::Text => Value::String(id_str.to_string()),
    })
}

fn body_to_map(body: &[u8]) -> Result<Map<String, Value>, AppError> {
    let value: Value =
        serde_json::from_slice(body).map_err(|e| AppError::BadRequest(format!("body must be JSON: {}", e)))?;
    match value {
        Value::Object(m) => Ok(m),
        _ => Err(AppError::BadRequest("body must be a JSON object".into())),
    }
}

/// Comma-separated `include` query parameter.
fn include_names(params: &HashMap<String, String>) -> Vec<String> {
    params
        .get("include")
        .map(|s| {
            s.split(',')
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .map(String::from)
                .collect()
        })
        .unwrap_or_default()
}
