//! Policy decisions delegated to an external authorization service over HTTP.

use super::{AccessRequest, PolicyService};
use crate::error::AppError;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Path appended to the service base URL.
pub const ACCESS_CHECK_PATH: &str = "/access/check";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AccessCheckBody<'a> {
    user_id: &'a str,
    tenant_id: &'a str,
    roles: &'a [String],
    entity: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    record_id: Option<&'a str>,
    operation: &'static str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccessCheckAnswer {
    has_access: bool,
}

#[derive(Clone)]
pub struct RemotePolicy {
    http: reqwest::Client,
    url: String,
}

impl RemotePolicy {
    pub fn new(base_url: &str) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| AppError::Upstream(format!("policy client: {}", e)))?;
        Ok(RemotePolicy {
            http,
            url: format!("{}{}", base_url.trim_end_matches('/'), ACCESS_CHECK_PATH),
        })
    }
}

#[async_trait]
impl PolicyService for RemotePolicy {
    async fn has_access(&self, request: &AccessRequest<'_>) -> Result<(), AppError> {
        let body = AccessCheckBody {
            user_id: &request.session.user_id,
            tenant_id: &request.session.tenant_id,
            roles: &request.session.roles,
            entity: request.entity,
            record_id: request.record_id,
            operation: request.operation.as_str(),
        };
        tracing::debug!(url = %self.url, entity = %request.entity, operation = %request.operation, "policy check");
        let res = self
            .http
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("policy service: {}", e)))?;
        let denied = || AppError::Forbidden(format!("{} on {} is not permitted", request.operation, request.entity));
        match res.status() {
            StatusCode::OK => {
                let answer: AccessCheckAnswer = res
                    .json()
                    .await
                    .map_err(|e| AppError::Upstream(format!("policy service answer: {}", e)))?;
                if answer.has_access {
                    Ok(())
                } else {
                    tracing::warn!(user_id = %request.session.user_id, entity = %request.entity, operation = %request.operation, "access denied by policy service");
                    Err(denied())
                }
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(denied()),
            other => Err(AppError::Upstream(format!("policy service returned {}", other))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authz::{AccessOperation, Session};
    use axum::{routing::post, Json, Router};
    use serde_json::{json, Value};

    /// Stub policy service: grants only `read`, answers 500 for entity "broken".
    async fn spawn_stub() -> String {
        async fn check(Json(body): Json<Value>) -> Result<Json<Value>, axum::http::StatusCode> {
            if body["entity"] == "broken" {
                return Err(axum::http::StatusCode::INTERNAL_SERVER_ERROR);
            }
            Ok(Json(json!({ "hasAccess": body["operation"] == "read" && body["tenantId"] == "t1" })))
        }
        let app = Router::new().route(ACCESS_CHECK_PATH, post(check));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}/", addr)
    }

    #[tokio::test]
    async fn honours_service_answer() {
        let policy = RemotePolicy::new(&spawn_stub().await).unwrap();
        let session = Session::new("u1", "t1", &["staff"]);
        let mut request = AccessRequest {
            session: &session,
            entity: "rental",
            record_id: Some("r1"),
            operation: AccessOperation::Read,
        };
        policy.has_access(&request).await.unwrap();

        request.operation = AccessOperation::Delete;
        assert!(matches!(policy.has_access(&request).await, Err(AppError::Forbidden(_))));

        request.entity = "broken";
        assert!(matches!(policy.has_access(&request).await, Err(AppError::Upstream(_))));
    }

    #[tokio::test]
    async fn unreachable_service_is_upstream_error() {
        let policy = RemotePolicy::new("http://127.0.0.1:9").unwrap();
        let session = Session::new("u1", "t1", &[]);
        let request = AccessRequest {
            session: &session,
            entity: "rental",
            record_id: None,
            operation: AccessOperation::Read,
        };
        assert!(matches!(policy.has_access(&request).await, Err(AppError::Upstream(_))));
    }
}
