//! # Resource Client
//!
//! Generic CRUD calls against one `/{endpoint}` collection. Every call reads the
//! credential first and fails with an auth error before touching the network when it
//! is absent. Responses are classified into [`SyncError`] and never recovered here.

use crate::credential::CredentialStore;
use crate::entity::SyncEntity;
use crate::error::{AuthFailure, SyncError};
use crate::transport::{HttpRequest, HttpResponse, HttpTransport, Method};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Stateless request/response client for entity `T`. Cheap to clone.
pub struct ResourceClient<T: SyncEntity> {
    base_url: Arc<str>,
    transport: Arc<dyn HttpTransport>,
    credentials: CredentialStore,
    _entity: PhantomData<fn() -> T>,
}

impl<T: SyncEntity> Clone for ResourceClient<T> {
    fn clone(&self) -> Self {
        Self {
            base_url: self.base_url.clone(),
            transport: self.transport.clone(),
            credentials: self.credentials.clone(),
            _entity: PhantomData,
        }
    }
}

impl<T: SyncEntity> ResourceClient<T> {
    pub fn new(
        base_url: &str,
        transport: Arc<dyn HttpTransport>,
        credentials: CredentialStore,
    ) -> Self {
        Self {
            base_url: Arc::from(base_url.trim_end_matches('/')),
            transport,
            credentials,
            _entity: PhantomData,
        }
    }

    pub fn endpoint(&self) -> &'static str {
        T::ENDPOINT
    }

    fn collection_url(&self) -> String {
        format!("{}/{}", self.base_url, T::ENDPOINT)
    }

    /// `/{endpoint}/{id}` with the id percent-encoded as a single path segment.
    fn member_url(&self, id: &T::Id) -> Result<String, SyncError> {
        let mut url = reqwest::Url::parse(&self.collection_url())
            .map_err(|e| SyncError::Network(format!("invalid resource URL: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| SyncError::Network("resource URL cannot take a path".to_string()))?
            .push(&id.to_string());
        Ok(url.into())
    }

    #[instrument(skip(self))]
    pub async fn list(&self) -> Result<Vec<T>, SyncError> {
        let credential = self.credentials.require()?;
        let request = HttpRequest::new(Method::Get, self.collection_url()).bearer(&credential);
        let response = self.execute(request, None).await?;
        decode(&response)
    }

    #[instrument(skip(self, draft))]
    pub async fn create(&self, draft: &T::Draft) -> Result<T, SyncError> {
        let credential = self.credentials.require()?;
        debug!(endpoint = T::ENDPOINT, ?draft, "Create");
        let request = HttpRequest::new(Method::Post, self.collection_url()).bearer(&credential);
        let request = encode_draft::<T>(request, draft, None)?;
        let response = self.execute(request, None).await?;
        decode(&response)
    }

    #[instrument(skip(self, draft))]
    pub async fn update(&self, id: &T::Id, draft: &T::Draft) -> Result<T, SyncError> {
        let credential = self.credentials.require()?;
        debug!(endpoint = T::ENDPOINT, ?draft, "Update");
        let request = HttpRequest::new(Method::Put, self.collection_url()).bearer(&credential);
        let request = encode_draft::<T>(request, draft, Some(id))?;
        let response = self.execute(request, Some(id)).await?;
        decode(&response)
    }

    /// Any 2xx body is ignored.
    #[instrument(skip(self))]
    pub async fn remove(&self, id: &T::Id) -> Result<(), SyncError> {
        let credential = self.credentials.require()?;
        let request = HttpRequest::new(Method::Delete, self.member_url(id)?).bearer(&credential);
        self.execute(request, Some(id)).await?;
        Ok(())
    }

    async fn execute(
        &self,
        request: HttpRequest,
        id: Option<&T::Id>,
    ) -> Result<HttpResponse, SyncError> {
        let method = request.method;
        let response = self.transport.send(request).await.map_err(|e| {
            warn!(endpoint = T::ENDPOINT, %method, error = %e, "Transport failure");
            SyncError::Network(e.to_string())
        })?;
        if response.is_success() {
            debug!(endpoint = T::ENDPOINT, %method, status = response.status, "Response");
            return Ok(response);
        }
        let error = classify(T::ENDPOINT, id.map(|id| id.to_string()), &response);
        warn!(endpoint = T::ENDPOINT, %method, status = response.status, error = %error, "Request failed");
        Err(error)
    }
}

/// Builds a JSON body, or a multipart body when the draft carries attachments.
fn encode_draft<T: SyncEntity>(
    request: HttpRequest,
    draft: &T::Draft,
    id: Option<&T::Id>,
) -> Result<HttpRequest, SyncError> {
    let mut value = serde_json::to_value(draft).map_err(encode_error)?;
    if let Some(id) = id {
        let id = serde_json::to_value(id).map_err(encode_error)?;
        match value.as_object_mut() {
            Some(fields) => {
                fields.insert(T::ID_FIELD.to_string(), id);
            }
            None => return Err(encode_error("draft is not a JSON object")),
        }
    }

    let files = T::attachments(draft);
    if files.is_empty() {
        return Ok(request.json(value));
    }
    let fields = match value {
        Value::Object(map) => map
            .into_iter()
            .filter_map(|(name, value)| match value {
                Value::Null => None,
                Value::String(text) => Some((name, text)),
                other => Some((name, other.to_string())),
            })
            .collect(),
        _ => return Err(encode_error("draft is not a JSON object")),
    };
    Ok(request.multipart(fields, files))
}

fn encode_error(e: impl std::fmt::Display) -> SyncError {
    SyncError::Network(format!("could not encode request body: {e}"))
}

fn decode<R: DeserializeOwned>(response: &HttpResponse) -> Result<R, SyncError> {
    serde_json::from_slice(&response.body).map_err(|e| SyncError::Server {
        status: response.status,
        message: format!("unexpected response body: {e}"),
    })
}

/// Maps a non-2xx response onto the error taxonomy.
pub(crate) fn classify(resource: &str, id: Option<String>, response: &HttpResponse) -> SyncError {
    match (response.status, id) {
        (401 | 403, _) => SyncError::Auth(AuthFailure::Rejected {
            status: response.status,
        }),
        (404, Some(id)) => SyncError::NotFound {
            resource: resource.to_string(),
            id,
        },
        (status, _) => SyncError::Server {
            status,
            message: server_message(status, &response.body),
        },
    }
}

/// Message from a `message`/`error` JSON field or a short text body, else a
/// generic message for the status.
pub(crate) fn server_message(status: u16, body: &[u8]) -> String {
    if let Ok(value) = serde_json::from_slice::<Value>(body) {
        let found = match &value {
            Value::String(text) => Some(text.clone()),
            Value::Object(map) => ["message", "error"]
                .iter()
                .find_map(|key| match map.get(*key) {
                    Some(Value::String(text)) => Some(text.clone()),
                    Some(Value::Array(items)) => {
                        let parts: Vec<&str> = items.iter().filter_map(Value::as_str).collect();
                        (!parts.is_empty()).then(|| parts.join(", "))
                    }
                    _ => None,
                }),
            _ => None,
        };
        if let Some(message) = found.filter(|m| !m.trim().is_empty()) {
            return message;
        }
    } else if let Ok(text) = std::str::from_utf8(body) {
        let text = text.trim();
        if !text.is_empty() && text.len() <= 200 && !text.starts_with('<') {
            return text.to_string();
        }
    }
    generic_message(status)
}

fn generic_message(status: u16) -> String {
    match status {
        400 => "Bad request".to_string(),
        404 => "Not found".to_string(),
        409 => "Conflict".to_string(),
        422 => "Unprocessable entity".to_string(),
        500..=599 => format!("Server error ({status})"),
        _ => format!("Request failed with status {status}"),
    }
}
