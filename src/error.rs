//! Typed errors and HTTP mapping.

use axum::{
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;

/// Field name -> first failing rule message.
pub type FieldErrors = BTreeMap<String, String>;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing reference: {kind} id '{id}'")]
    MissingReference { kind: &'static str, id: String },
    #[error("invalid primary key: table {table_id} column {column}")]
    InvalidPrimaryKey { table_id: String, column: String },
    #[error("duplicate path segment: {0}")]
    DuplicatePathSegment(String),
    #[error("config load: {0}")]
    Load(String),
    #[error("validation: {0}")]
    Validation(String),
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("validation: {0}")]
    Validation(String),
    #[error("validation failed for {} field(s)", .0.len())]
    InvalidFields(FieldErrors),
    #[error("database: {0}")]
    Db(#[from] sqlx::Error),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("upstream: {0}")]
    Upstream(String),
    #[error("Method {0} not allowed")]
    MethodNotAllowed(Method),
}

#[derive(Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Body of the fixed 405 response.
#[derive(Serialize)]
pub struct MessageBody {
    pub message: String,
}

impl AppError {
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "config_error"),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            AppError::Validation(_) | AppError::InvalidFields(_) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "validation_error")
            }
            AppError::Db(e) => db_status(e),
            AppError::Conflict(_) => (StatusCode::CONFLICT, "conflict"),
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            AppError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "unauthorized"),
            AppError::Forbidden(_) => (StatusCode::FORBIDDEN, "forbidden"),
            AppError::Upstream(_) => (StatusCode::BAD_GATEWAY, "upstream_error"),
            AppError::MethodNotAllowed(_) => (StatusCode::METHOD_NOT_ALLOWED, "method_not_allowed"),
        }
    }
}

fn db_status(e: &sqlx::Error) -> (StatusCode, &'static str) {
    match e {
        sqlx::Error::RowNotFound => (StatusCode::NOT_FOUND, "not_found"),
        sqlx::Error::Database(db) if db.is_foreign_key_violation() || db.is_unique_violation() => {
            (StatusCode::CONFLICT, "conflict")
        }
        sqlx::Error::Database(db) if db.is_check_violation() => (StatusCode::UNPROCESSABLE_ENTITY, "validation_error"),
        // invalid_text_representation, invalid_datetime_format, datetime_field_overflow
        sqlx::Error::Database(db) if matches!(db.code().as_deref(), Some("22P02" | "22007" | "22008")) => {
            (StatusCode::BAD_REQUEST, "bad_request")
        }
        _ => (StatusCode::INTERNAL_SERVER_ERROR, "database_error"),
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(error = %self, "request rejected");
        }
        if let AppError::MethodNotAllowed(_) = &self {
            return (status, Json(MessageBody { message: self.to_string() })).into_response();
        }
        let details = match &self {
            AppError::InvalidFields(fields) => serde_json::to_value(fields).ok(),
            _ => None,
        };
        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message: self.to_string(),
                details,
            },
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_not_allowed_message_names_the_method() {
        let err = AppError::MethodNotAllowed(Method::PATCH);
        assert_eq!(err.to_string(), "Method PATCH not allowed");
        assert_eq!(err.status_and_code().0, StatusCode::METHOD_NOT_ALLOWED);
    }

    #[test]
    fn row_not_found_maps_to_404() {
        let err = AppError::Db(sqlx::Error::RowNotFound);
        assert_eq!(err.status_and_code(), (StatusCode::NOT_FOUND, "not_found"));
    }

    #[test]
    fn invalid_fields_is_unprocessable() {
        let mut fields = FieldErrors::new();
        fields.insert("rental_date".into(), "rental_date is required".into());
        let err = AppError::InvalidFields(fields);
        assert_eq!(err.status_and_code(), (StatusCode::UNPROCESSABLE_ENTITY, "validation_error"));
        assert_eq!(err.to_string(), "validation failed for 1 field(s)");
    }

    #[derive(Debug)]
    struct PgCode(&'static str);

    impl std::fmt::Display for PgCode {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "sqlstate {}", self.0)
        }
    }

    impl std::error::Error for PgCode {}

    impl sqlx::error::DatabaseError for PgCode {
        fn message(&self) -> &str {
            self.0
        }

        fn code(&self) -> Option<std::borrow::Cow<'_, str>> {
            Some(self.0.into())
        }

        fn as_error(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn std::error::Error + Send + Sync + 'static> {
            self
        }

        fn kind(&self) -> sqlx::error::ErrorKind {
            sqlx::error::ErrorKind::Other
        }
    }

    #[test]
    fn malformed_input_rejected_by_postgres_is_a_bad_request() {
        for code in ["22P02", "22007", "22008"] {
            let err = AppError::Db(sqlx::Error::Database(Box::new(PgCode(code))));
            assert_eq!(err.status_and_code(), (StatusCode::BAD_REQUEST, "bad_request"), "{}", code);
        }
        let err = AppError::Db(sqlx::Error::Database(Box::new(PgCode("XX000"))));
        assert_eq!(err.status_and_code().0, StatusCode::INTERNAL_SERVER_ERROR);
    }
}
