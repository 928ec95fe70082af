//! Authorization: caller session, access operations and the policy seam.
//!
//! Handlers never decide access themselves; they build an [`AccessRequest`] and hand it to the
//! configured [`PolicyService`], which answers pass/fail.

mod remote;
mod roles;
mod session;

pub use remote::RemotePolicy;
pub use roles::{RoleGrants, RolePolicy};
pub use session::{Session, ROLES_HEADER, TENANT_ID_HEADER, USER_ID_HEADER};

use crate::error::AppError;
use async_trait::async_trait;
use axum::http::Method;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessOperation {
    Create,
    Read,
    Update,
    Delete,
}

impl AccessOperation {
    /// POST -> create, GET -> read, PUT -> update, DELETE -> delete. Anything else has no operation.
    pub fn from_method(method: &Method) -> Option<Self> {
        match *method {
            Method::POST => Some(AccessOperation::Create),
            Method::GET => Some(AccessOperation::Read),
            Method::PUT => Some(AccessOperation::Update),
            Method::DELETE => Some(AccessOperation::Delete),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AccessOperation::Create => "create",
            AccessOperation::Read => "read",
            AccessOperation::Update => "update",
            AccessOperation::Delete => "delete",
        }
    }
}

impl fmt::Display for AccessOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One access question: may `session` perform `operation` on `entity` (optionally a single record)?
#[derive(Clone, Debug)]
pub struct AccessRequest<'a> {
    pub session: &'a Session,
    pub entity: &'a str,
    pub record_id: Option<&'a str>,
    pub operation: AccessOperation,
}

#[async_trait]
pub trait PolicyService: Send + Sync {
    /// `Ok(())` grants; `AppError::Forbidden` denies. Other errors mean the policy could not be evaluated.
    async fn has_access(&self, request: &AccessRequest<'_>) -> Result<(), AppError>;
}
