//! Static role grants: role -> entity (or `*`) -> operations (or `*`).

use super::{AccessRequest, PolicyService};
use crate::error::{AppError, ConfigError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;

const BUILTIN_POLICIES: &str = include_str!("../../catalog/policies.json");

pub type RoleGrants = HashMap<String, HashMap<String, Vec<String>>>;

#[derive(Clone, Debug, Default)]
pub struct RolePolicy {
    grants: RoleGrants,
}

impl RolePolicy {
    pub fn new(grants: RoleGrants) -> Self {
        RolePolicy { grants }
    }

    /// Grants shipped in `catalog/policies.json`.
    pub fn builtin() -> Result<Self, ConfigError> {
        Self::from_json(BUILTIN_POLICIES)
    }

    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let grants = serde_json::from_str(raw).map_err(|e| ConfigError::Load(format!("policies: {}", e)))?;
        Ok(RolePolicy { grants })
    }

    pub async fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&raw)
    }

    fn grants(&self, role: &str, entity: &str, operation: &str) -> bool {
        let Some(by_entity) = self.grants.get(role) else { return false };
        [entity, "*"]
            .iter()
            .filter_map(|e| by_entity.get(*e))
            .flatten()
            .any(|op| op == operation || op == "*")
    }
}

#[async_trait]
impl PolicyService for RolePolicy {
    async fn has_access(&self, request: &AccessRequest<'_>) -> Result<(), AppError> {
        let op = request.operation.as_str();
        if request.session.roles.iter().any(|role| self.grants(role, request.entity, op)) {
            return Ok(());
        }
        tracing::warn!(
            user_id = %request.session.user_id,
            tenant_id = %request.session.tenant_id,
            entity = %request.entity,
            operation = %op,
            "access denied by role policy"
        );
        Err(AppError::Forbidden(format!("{} on {} is not permitted", op, request.entity)))
    }
}
