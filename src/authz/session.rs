//! Caller session from the identity headers set by the upstream session service.

use crate::error::AppError;
use async_trait::async_trait;
use axum::{
    extract::FromRequestParts,
    http::{request::Parts, HeaderMap},
};
use serde::Serialize;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const TENANT_ID_HEADER: &str = "x-tenant-id";
/// Comma-separated role names.
pub const ROLES_HEADER: &str = "x-roles";

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub user_id: String,
    pub tenant_id: String,
    pub roles: Vec<String>,
}

impl Session {
    pub fn new(user_id: impl Into<String>, tenant_id: impl Into<String>, roles: &[&str]) -> Self {
        Session {
            user_id: user_id.into(),
            tenant_id: tenant_id.into(),
            roles: roles.iter().map(|r| r.to_string()).collect(),
        }
    }

    /// User and tenant are required; roles may be absent (no grants).
    pub fn from_headers(headers: &HeaderMap) -> Result<Self, AppError> {
        let user_id = header_value(headers, USER_ID_HEADER)
            .ok_or_else(|| AppError::Unauthorized(format!("{} header is required", USER_ID_HEADER)))?;
        let tenant_id = header_value(headers, TENANT_ID_HEADER)
            .ok_or_else(|| AppError::Unauthorized(format!("{} header is required", TENANT_ID_HEADER)))?;
        let roles = header_value(headers, ROLES_HEADER)
            .map(|s| {
                s.split(',')
                    .map(str::trim)
                    .filter(|r| !r.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();
        Ok(Session {
            user_id,
            tenant_id,
            roles,
        })
    }

    /// Header pairs carrying this session on outgoing requests.
    pub fn to_headers(&self) -> [(&'static str, String); 3] {
        [
            (USER_ID_HEADER, self.user_id.clone()),
            (TENANT_ID_HEADER, self.tenant_id.clone()),
            (ROLES_HEADER, self.roles.join(",")),
        ]
    }
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

#[async_trait]
impl<S> FromRequestParts<S> for Session
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Session::from_headers(&parts.headers)
    }
}
