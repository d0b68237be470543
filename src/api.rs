//! Remote notes API.
//!
//! [`NotesApi`] is the seam the store talks through; [`HttpNotesApi`] is the
//! REST implementation over reqwest.
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use log::{debug, trace};
use reqwest::{Client, RequestBuilder, Response};
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::Value;

use crate::{Note, NoteFields, NotePatch, NotesPage, Result, StoreConfig, SyncError};

/// Operations the store needs from the server.
#[async_trait]
pub trait NotesApi: Send + Sync {
    /// One page of notes from the active or archived partition.
    async fn list_notes(&self, page: u32, limit: u32, archived: bool) -> Result<NotesPage>;

    async fn get_note(&self, id: &str) -> Result<Note>;

    /// Creates a note; the server assigns id and timestamps.
    async fn create_note(&self, fields: &NoteFields) -> Result<Note>;

    /// Applies a partial update; the server recomputes `updatedAt`.
    async fn update_note(&self, id: &str, patch: &NotePatch) -> Result<Note>;

    async fn delete_note(&self, id: &str) -> Result<()>;
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: T,
}

/// REST client for the notes service.
pub struct HttpNotesApi {
    base_url: String,
    token: RwLock<Option<String>>,
    http: Client,
}

impl HttpNotesApi {
    pub fn new(config: &StoreConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.request_timeout())
            .build()?;
        let base_url = config.base_url();
        debug!("Notes API client targeting {}", base_url);

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token: RwLock::new(None),
            http,
        })
    }

    /// Sets the bearer token sent with every request.
    pub fn with_token(self, token: impl Into<String>) -> Self {
        self.set_token(Some(token.into()));
        self
    }

    pub fn set_token(&self, token: Option<String>) {
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = token;
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/v1{}", self.base_url, path)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        let token = self
            .token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        match token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let response = self.authorize(request).send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(SyncError::Api {
            status: status.as_u16(),
            message: error_message(&body, status.as_u16()),
        })
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = self.send(request).await?;
        let bytes = response.bytes().await?;
        trace!("Response body: {} bytes", bytes.len());
        let envelope: Envelope<T> = serde_json::from_slice(&bytes)?;
        Ok(envelope.data)
    }
}

/// Picks the most useful message out of an error body.
fn error_message(body: &str, status: u16) -> String {
    let parsed: Option<Value> = serde_json::from_str(body).ok();
    let field = |name: &str| {
        parsed
            .as_ref()
            .and_then(|v| v.get(name))
            .and_then(Value::as_str)
            .map(str::to_string)
    };
    field("message")
        .or_else(|| field("error"))
        .unwrap_or_else(|| format!("HTTP error! status: {}", status))
}

#[async_trait]
impl NotesApi for HttpNotesApi {
    async fn list_notes(&self, page: u32, limit: u32, archived: bool) -> Result<NotesPage> {
        debug!("GET notes page={} limit={} archived={}", page, limit, archived);
        let request = self.http.get(self.url("/notes")).query(&[
            ("page", page.to_string()),
            ("limit", limit.to_string()),
            ("archived", archived.to_string()),
        ]);
        self.send_json(request).await
    }

    async fn get_note(&self, id: &str) -> Result<Note> {
        debug!("GET note {}", id);
        self.send_json(self.http.get(self.url(&format!("/notes/{}", id))))
            .await
    }

    async fn create_note(&self, fields: &NoteFields) -> Result<Note> {
        debug!("POST note '{}'", fields.title);
        self.send_json(self.http.post(self.url("/notes")).json(fields))
            .await
    }

    async fn update_note(&self, id: &str, patch: &NotePatch) -> Result<Note> {
        debug!("PATCH note {}", id);
        self.send_json(
            self.http
                .patch(self.url(&format!("/notes/{}", id)))
                .json(patch),
        )
        .await
    }

    async fn delete_note(&self, id: &str) -> Result<()> {
        debug!("DELETE note {}", id);
        self.send(self.http.delete(self.url(&format!("/notes/{}", id))))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_message_prefers_message_then_error() {
        assert_eq!(
            error_message(r#"{"message":"Note not found","error":"Not Found"}"#, 404),
            "Note not found"
        );
        assert_eq!(error_message(r#"{"error":"Unauthorized"}"#, 401), "Unauthorized");
        assert_eq!(error_message("<html>", 502), "HTTP error! status: 502");
    }

    #[test]
    fn urls_are_versioned_and_trimmed() {
        let config = StoreConfig {
            api_base_url: Some("http://example.test/".to_string()),
            ..StoreConfig::default()
        };
        let api = HttpNotesApi::new(&config).unwrap();
        assert_eq!(api.url("/notes/1"), "http://example.test/api/v1/notes/1");
    }
}
