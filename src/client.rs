//! HTTP client for the resource API, carrying the caller session on every request.

use crate::authz::Session;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("network error: {0}")]
    Network(String),
    #[error("API error {status}: {body}")]
    Api { status: u16, body: Value },
    #[error("parse error: {0}")]
    Parse(String),
}

impl ClientError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Human-readable message from an error body (`{"message"}` or `{"error":{"message"}}`),
    /// falling back to the raw error text.
    pub fn message(&self) -> String {
        if let ClientError::Api { body, .. } = self {
            let msg = body
                .get("message")
                .or_else(|| body.get("error").and_then(|e| e.get("message")))
                .and_then(Value::as_str);
            if let Some(m) = msg {
                return m.to_string();
            }
        }
        self.to_string()
    }

    /// Field errors from a 422 body, if any.
    pub fn field_details(&self) -> Option<&Map<String, Value>> {
        match self {
            ClientError::Api { body, .. } => body.get("error")?.get("details")?.as_object(),
            _ => None,
        }
    }
}

/// The calls the edit page needs. `resource` is the API path segment (e.g. `rentals`).
#[async_trait]
pub trait ResourceApi: Send + Sync {
    async fn get_by_id(&self, resource: &str, id: &str) -> Result<Value, ClientError>;

    async fn update_by_id(&self, resource: &str, id: &str, body: &Map<String, Value>) -> Result<Value, ClientError>;

    /// Rows of the collection, filtered by exact-match query params.
    async fn list(&self, resource: &str, query: &[(&str, &str)]) -> Result<Vec<Value>, ClientError>;
}

#[derive(Deserialize)]
struct ListBody {
    data: Vec<Value>,
}

#[derive(Clone)]
pub struct HttpResourceApi {
    http: reqwest::Client,
    api_url: String,
    session: Session,
}

impl HttpResourceApi {
    /// `api_url` is the resource prefix, e.g. `http://localhost:3000/api`.
    pub fn new(api_url: impl Into<String>, session: Session) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_url: api_url.into().trim_end_matches('/').to_string(),
            session,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let mut req = self.http.request(method, format!("{}/{}", self.api_url, path));
        for (name, value) in self.session.to_headers() {
            req = req.header(name, value);
        }
        req
    }

    async fn send(&self, req: reqwest::RequestBuilder) -> Result<Value, ClientError> {
        let resp = req.send().await.map_err(|e| ClientError::Network(e.to_string()))?;
        let status = resp.status();
        let text = resp.text().await.map_err(|e| ClientError::Network(e.to_string()))?;
        if !status.is_success() {
            let body = serde_json::from_str(&text).unwrap_or(Value::String(text));
            tracing::debug!(status = status.as_u16(), "resource API error");
            return Err(ClientError::Api {
                status: status.as_u16(),
                body,
            });
        }
        serde_json::from_str(&text).map_err(|e| ClientError::Parse(e.to_string()))
    }
}

#[async_trait]
impl ResourceApi for HttpResourceApi {
    async fn get_by_id(&self, resource: &str, id: &str) -> Result<Value, ClientError> {
        self.send(self.request(reqwest::Method::GET, &format!("{}/{}", resource, id)))
            .await
    }

    async fn update_by_id(&self, resource: &str, id: &str, body: &Map<String, Value>) -> Result<Value, ClientError> {
        self.send(self.request(reqwest::Method::PUT, &format!("{}/{}", resource, id)).json(body))
            .await
    }

    async fn list(&self, resource: &str, query: &[(&str, &str)]) -> Result<Vec<Value>, ClientError> {
        let value = self
            .send(self.request(reqwest::Method::GET, resource).query(query))
            .await?;
        let body: ListBody = serde_json::from_value(value).map_err(|e| ClientError::Parse(e.to_string()))?;
        Ok(body.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn message_prefers_body_message() {
        let e = ClientError::Api {
            status: 405,
            body: json!({"message": "Method PATCH not allowed"}),
        };
        assert_eq!(e.message(), "Method PATCH not allowed");

        let e = ClientError::Api {
            status: 422,
            body: json!({"error": {"code": "validation_error", "message": "bad", "details": {"rental_date": "required"}}}),
        };
        assert_eq!(e.message(), "bad");
        assert_eq!(e.field_details().unwrap()["rental_date"], "required");
        assert_eq!(e.status(), Some(422));

        let e = ClientError::Network("refused".into());
        assert_eq!(e.message(), "network error: refused");
        assert!(e.field_details().is_none());
    }
}
