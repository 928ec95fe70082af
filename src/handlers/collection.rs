//! `/:resource`: list (lookup lists for select widgets) and create.

use super::{authorize, body_to_map, entity_for};
use crate::authz::{AccessOperation, Session};
use crate::config::ResolvedEntity;
use crate::dates;
use crate::error::AppError;
use crate::response::{record_created, success_many};
use crate::service::CrudService;
use crate::state::AppState;
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, Method},
    response::{IntoResponse, Response},
};
use serde_json::Value;
use std::collections::HashMap;

const RESERVED_PARAMS: [&str; 3] = ["limit", "offset", "include"];

/// Typed filter value for a column: uuids and timestamps normalized, ints and bools parsed, other
/// types as text. A value the column type cannot hold is a bad request.
fn query_value_for_column(entity: &ResolvedEntity, col: &str, s: &str) -> Result<Value, AppError> {
    let Some(column) = entity.column(col) else {
        return Ok(Value::String(s.to_string()));
    };
    let invalid = |kind: &str| AppError::BadRequest(format!("filter {}: invalid {} '{}'", col, kind, s));
    match column.pg_type.as_deref() {
        Some("uuid") => {
            let u = uuid::Uuid::parse_str(s).map_err(|_| invalid("uuid"))?;
            return Ok(Value::String(u.to_string()));
        }
        Some("timestamptz" | "timestamp") => {
            let d = dates::parse_timestamp(s).ok_or_else(|| invalid("timestamp"))?;
            return Ok(Value::String(dates::to_wire(&d)));
        }
        Some("date") => {
            let d = dates::parse_timestamp(s).ok_or_else(|| invalid("date"))?;
            return Ok(Value::String(d.format("%Y-%m-%d").to_string()));
        }
        _ => {}
    }
    let base = column.base_type.as_str();
    if base.contains("int") || base.contains("serial") {
        let n: i64 = s.trim().parse().map_err(|_| invalid("integer"))?;
        return Ok(Value::Number(n.into()));
    }
    if base.starts_with("bool") {
        return match s.to_ascii_lowercase().as_str() {
            "true" => Ok(Value::Bool(true)),
            "false" => Ok(Value::Bool(false)),
            _ => Err(invalid("boolean")),
        };
    }
    Ok(Value::String(s.to_string()))
}

pub async fn collection(
    State(state): State<AppState>,
    method: Method,
    Path(path_segment): Path<String>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, AppError> {
    let operation = match method {
        Method::GET => AccessOperation::Read,
        Method::POST => AccessOperation::Create,
        _ => return Err(AppError::MethodNotAllowed(method)),
    };
    let session = Session::from_headers(&headers)?;
    let entity = entity_for(&state, &path_segment)?;
    authorize(&state, &method, &session, entity, None, operation).await?;
    let store = state.store.as_ref();

    if operation == AccessOperation::Create {
        let body = body_to_map(&body)?;
        let row = CrudService::create(store, entity, &body).await?;
        tracing::info!(entity = %entity.name, user_id = %session.user_id, "record created");
        return Ok(record_created(row).into_response());
    }

    let limit = params.get("limit").and_then(|v| v.parse().ok());
    let offset = params.get("offset").and_then(|v| v.parse().ok());
    let filters = params
        .iter()
        .filter(|(k, _)| !RESERVED_PARAMS.contains(&k.as_str()) && entity.column(k).is_some())
        .map(|(k, v)| Ok((k.clone(), query_value_for_column(entity, k, v)?)))
        .collect::<Result<Vec<(String, Value)>, AppError>>()?;
    let rows = CrudService::list(store, entity, &filters, limit, offset).await?;
    Ok(success_many(rows).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{builtin_config, resolve, ColumnTypeConfig};
    use serde_json::json;

    #[test]
    fn filter_values_follow_column_type() {
        let model = resolve(&builtin_config().unwrap()).unwrap();
        let tools = model.entity_by_path("tools").unwrap();
        let u = uuid::Uuid::new_v4();

        assert_eq!(
            query_value_for_column(tools, "outlet_id", &u.to_string().to_uppercase()).unwrap(),
            json!(u.to_string())
        );
        assert_eq!(query_value_for_column(tools, "name", "Drill").unwrap(), json!("Drill"));
        assert!(matches!(
            query_value_for_column(tools, "outlet_id", "zzz"),
            Err(AppError::BadRequest(_))
        ));

        let rentals = model.entity_by_path("rentals").unwrap();
        assert_eq!(
            query_value_for_column(rentals, "rental_date", "2024-03-01").unwrap(),
            json!("2024-03-01T00:00:00+00:00")
        );
        assert!(matches!(
            query_value_for_column(rentals, "rental_date", "soon"),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn integer_filters_are_parsed() {
        let mut config = builtin_config().unwrap();
        let id = config.columns.iter_mut().find(|c| c.id == "outlet.id").unwrap();
        id.type_ = ColumnTypeConfig::Simple("integer".into());
        id.default = None;
        let model = resolve(&config).unwrap();
        let outlets = model.entity_by_path("outlets").unwrap();

        assert_eq!(query_value_for_column(outlets, "id", "42").unwrap(), json!(42));
        assert!(matches!(
            query_value_for_column(outlets, "id", "forty-two"),
            Err(AppError::BadRequest(_))
        ));
    }
}
