//! `/:resource/:id`: authorize, then exactly one store call, record returned verbatim.

use super::{authorize, body_to_map, entity_for, include_names, parse_id};
use crate::authz::{AccessOperation, Session};
use crate::error::AppError;
use crate::response::record_ok;
use crate::service::CrudService;
use crate::state::AppState;
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, Method},
    response::{IntoResponse, Response},
};
use std::collections::HashMap;

/// Methods served on a single record.
const RECORD_METHODS: [Method; 3] = [Method::GET, Method::PUT, Method::DELETE];

pub async fn record(
    State(state): State<AppState>,
    method: Method,
    Path((path_segment, id_str)): Path<(String, String)>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, AppError> {
    let operation = AccessOperation::from_method(&method)
        .filter(|_| RECORD_METHODS.contains(&method))
        .ok_or_else(|| AppError::MethodNotAllowed(method.clone()))?;
    let session = Session::from_headers(&headers)?;
    let entity = entity_for(&state, &path_segment)?;
    let id = parse_id(&id_str, &entity.pk_type)?;
    authorize(&state, &method, &session, entity, Some(&id_str), operation).await?;

    let store = state.store.as_ref();
    let row = match operation {
        AccessOperation::Read => {
            let includes = include_names(&params);
            CrudService::read(store, &state.model, entity, &id, &includes).await?
        }
        AccessOperation::Update => {
            let body = body_to_map(&body)?;
            CrudService::update(store, entity, &id, &body).await?
        }
        AccessOperation::Delete => CrudService::delete(store, entity, &id).await?,
        AccessOperation::Create => return Err(AppError::MethodNotAllowed(method)),
    };
    let row = row.ok_or_else(|| AppError::NotFound(format!("{} {}", entity.name, id_str)))?;
    tracing::debug!(entity = %entity.name, id = %id_str, operation = %operation, user_id = %session.user_id, "record served");
    Ok(record_ok(row).into_response())
}
