//! The server side of a replay: one request per queued operation.

use async_trait::async_trait;
use reqwest::{Method, Url};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::{
    error::{OfflineError, Result},
    operation::{EntityType, OperationKind},
};

/// A queued operation with its references resolved to server ids.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncRequest {
    pub kind: OperationKind,
    pub entity: EntityType,
    /// Server id of the entity, `None` for creates.
    pub target: Option<String>,
    /// Server id of the parent trip, for diary entry and place creates.
    pub parent: Option<String>,
    pub payload: Value,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncOutcome {
    /// Identifier assigned by the server to a newly created entity.
    pub server_id: Option<String>,
}

/// Why a single replayed operation did not go through. Always retryable.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SyncFailure {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("server answered {status}: {message}")]
    Status { status: u16, message: String },
    #[error("reference {0} has no server id yet")]
    UnresolvedReference(String),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

#[async_trait]
pub trait SyncBackend: Send + Sync {
    async fn send(&self, request: &SyncRequest) -> std::result::Result<SyncOutcome, SyncFailure>;
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: String,
}

/// Method and path of the REST call for `request`.
pub fn route(request: &SyncRequest) -> std::result::Result<(Method, String), SyncFailure> {
    let target = || {
        request.target.as_deref().ok_or_else(|| {
            SyncFailure::InvalidRequest(format!("{:?} needs a target id", request.kind))
        })
    };
    let parent = || {
        request.parent.as_deref().ok_or_else(|| {
            SyncFailure::InvalidRequest(format!("{:?} create needs a trip id", request.entity))
        })
    };

    let resolved = match (request.kind, request.entity) {
        (OperationKind::Create, EntityType::Trip) => (Method::POST, "api/trips".to_string()),
        (OperationKind::Update, EntityType::Trip) => {
            (Method::PUT, format!("api/trips/{}", target()?))
        }
        (OperationKind::Delete, EntityType::Trip) => {
            (Method::DELETE, format!("api/trips/{}", target()?))
        }
        (OperationKind::Create, EntityType::DiaryEntry) => {
            (Method::POST, format!("api/diary/{}", parent()?))
        }
        (OperationKind::Update, EntityType::DiaryEntry) => {
            (Method::PUT, format!("api/diary/{}", target()?))
        }
        (OperationKind::Delete, EntityType::DiaryEntry) => {
            (Method::DELETE, format!("api/diary/{}", target()?))
        }
        (OperationKind::Create, EntityType::Place) => {
            (Method::POST, format!("api/places/{}/places", parent()?))
        }
        (OperationKind::Update, EntityType::Place) => {
            (Method::PUT, format!("api/places/places/{}", target()?))
        }
        (OperationKind::Delete, EntityType::Place) => {
            (Method::DELETE, format!("api/places/places/{}", target()?))
        }
    };
    Ok(resolved)
}

/// Extracts the `id` of a create response; numbers and strings are accepted.
pub fn server_id(body: &Value) -> Option<String> {
    match body.get("id")? {
        Value::String(id) if !id.is_empty() => Some(id.clone()),
        Value::Number(id) => Some(id.to_string()),
        _ => None,
    }
}

/// [`SyncBackend`] talking to the TravelMind REST API.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    base_url: Url,
    http: reqwest::Client,
}

impl HttpBackend {
    pub fn new(base_url: &str) -> Result<Self> {
        let mut base_url = base_url.to_string();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        let base_url = Url::parse(&base_url)
            .map_err(|err| OfflineError::InvalidArgument(format!("invalid base_url: {err}")))?;
        Ok(Self {
            base_url,
            http: reqwest::Client::new(),
        })
    }
}

#[async_trait]
impl SyncBackend for HttpBackend {
    async fn send(&self, request: &SyncRequest) -> std::result::Result<SyncOutcome, SyncFailure> {
        let (method, path) = route(request)?;
        let endpoint = self
            .base_url
            .join(&path)
            .map_err(|err| SyncFailure::InvalidRequest(format!("invalid path {path}: {err}")))?;

        let mut builder = self.http.request(method, endpoint);
        if request.kind != OperationKind::Delete {
            builder = builder.json(&request.payload);
        }
        let res = builder
            .send()
            .await
            .map_err(|err| SyncFailure::Transport(err.to_string()))?;

        let status = res.status();
        if !status.is_success() {
            let message = res
                .json::<ErrorResponse>()
                .await
                .map(|err| err.error)
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(SyncFailure::Status {
                status: status.as_u16(),
                message,
            });
        }

        if request.kind != OperationKind::Create {
            return Ok(SyncOutcome::default());
        }
        // The entity exists on the server from here on: an unreadable body
        // must not turn into a retry that creates it twice.
        match res.json::<Value>().await {
            Ok(body) => Ok(SyncOutcome {
                server_id: server_id(&body),
            }),
            Err(err) => {
                tracing::warn!("create accepted but its response is unreadable: {err}");
                Ok(SyncOutcome::default())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn request(kind: OperationKind, entity: EntityType) -> SyncRequest {
        SyncRequest {
            kind,
            entity,
            target: Some("7".to_string()),
            parent: Some("3".to_string()),
            payload: Value::Null,
        }
    }

    #[test]
    fn routes_follow_the_rest_api() {
        let cases = [
            (OperationKind::Create, EntityType::Trip, Method::POST, "api/trips"),
            (OperationKind::Update, EntityType::Trip, Method::PUT, "api/trips/7"),
            (OperationKind::Create, EntityType::DiaryEntry, Method::POST, "api/diary/3"),
            (OperationKind::Delete, EntityType::DiaryEntry, Method::DELETE, "api/diary/7"),
            (OperationKind::Create, EntityType::Place, Method::POST, "api/places/3/places"),
            (OperationKind::Update, EntityType::Place, Method::PUT, "api/places/places/7"),
        ];
        for (kind, entity, method, path) in cases {
            assert_eq!(
                route(&request(kind, entity)).unwrap(),
                (method, path.to_string())
            );
        }
    }

    #[test]
    fn missing_ids_are_rejected() {
        let mut req = request(OperationKind::Create, EntityType::Place);
        req.parent = None;
        assert!(matches!(route(&req), Err(SyncFailure::InvalidRequest(_))));

        let mut req = request(OperationKind::Delete, EntityType::Trip);
        req.target = None;
        assert!(matches!(route(&req), Err(SyncFailure::InvalidRequest(_))));
    }

    #[test]
    fn server_id_accepts_numbers_and_strings() {
        assert_eq!(server_id(&json!({ "id": 42 })), Some("42".to_string()));
        assert_eq!(
            server_id(&json!({ "id": "a1b2", "title": "x" })),
            Some("a1b2".to_string())
        );
        assert_eq!(server_id(&json!({ "id": null })), None);
        assert_eq!(server_id(&json!({ "title": "x" })), None);
    }

    #[test]
    fn base_url_gets_a_trailing_slash() {
        let backend = HttpBackend::new("http://127.0.0.1:3000/travel").unwrap();
        assert_eq!(backend.base_url.as_str(), "http://127.0.0.1:3000/travel/");
        assert!(HttpBackend::new("not a url").is_err());
    }
}
