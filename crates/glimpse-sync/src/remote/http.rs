//! HTTP adapter for the hosted backend (PostgREST-style table API)

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::config::SyncConfig;

use super::{ConversationRow, MessageRow, RemoteError, RemoteResult, RemoteStore};

const CONVERSATIONS_TABLE: &str = "conversations";
const MESSAGES_TABLE: &str = "messages";

/// Remote store speaking the backend's REST dialect
///
/// Each entity table gets `POST /<table>`, `PATCH`/`DELETE` filtered by
/// `?id=eq.<id>`, and a pull query filtered by `?updated_at=gt.<ts>`. The
/// API key travels as both the `apikey` header and the bearer token.
pub struct HttpRemoteStore {
    client: Client,
    base_url: String,
    api_key: String,
}

impl HttpRemoteStore {
    /// Create an adapter rooted at the given base URL
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        request_timeout: Duration,
    ) -> RemoteResult<Self> {
        let base_url = normalize_base_url(base_url.into())?;
        let client = Client::builder().timeout(request_timeout).build()?;
        Ok(Self {
            client,
            base_url,
            api_key: api_key.into(),
        })
    }

    /// Build an adapter from config; `None` when no remote is configured
    pub fn from_config(config: &SyncConfig) -> RemoteResult<Option<Self>> {
        match (&config.base_url, &config.api_key) {
            (Some(url), Some(key)) => Ok(Some(Self::new(
                url.clone(),
                key.clone(),
                config.request_timeout,
            )?)),
            _ => Ok(None),
        }
    }

    fn request(&self, method: Method, url: String) -> RequestBuilder {
        self.client
            .request(method, url)
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }

    async fn create<T: Serialize>(&self, table: &str, row: &T, id: &str) -> RemoteResult<()> {
        let response = self
            .request(Method::POST, table_url(&self.base_url, table))
            .header("Prefer", "return=minimal")
            .json(row)
            .send()
            .await?;
        check_status(response, id).await
    }

    async fn update<T: Serialize>(&self, table: &str, id: &str, row: &T) -> RemoteResult<()> {
        let response = self
            .request(Method::PATCH, row_url(&self.base_url, table, id))
            .header("Prefer", "return=minimal")
            .json(row)
            .send()
            .await?;
        check_status(response, id).await
    }

    async fn delete(&self, table: &str, id: &str) -> RemoteResult<()> {
        let response = self
            .request(Method::DELETE, row_url(&self.base_url, table, id))
            .send()
            .await?;
        check_status(response, id).await
    }

    async fn changed_since<T: DeserializeOwned>(
        &self,
        table: &str,
        since: DateTime<Utc>,
    ) -> RemoteResult<Vec<T>> {
        let response = self
            .request(Method::GET, changes_url(&self.base_url, table, since))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &body, table));
        }
        Ok(response.json().await?)
    }
}

#[async_trait]
impl RemoteStore for HttpRemoteStore {
    async fn create_conversation(&self, row: &ConversationRow) -> RemoteResult<()> {
        self.create(CONVERSATIONS_TABLE, row, &row.id).await
    }

    async fn update_conversation(&self, id: &str, row: &ConversationRow) -> RemoteResult<()> {
        self.update(CONVERSATIONS_TABLE, id, row).await
    }

    async fn delete_conversation(&self, id: &str) -> RemoteResult<()> {
        self.delete(CONVERSATIONS_TABLE, id).await
    }

    async fn create_message(&self, row: &MessageRow) -> RemoteResult<()> {
        self.create(MESSAGES_TABLE, row, &row.id).await
    }

    async fn update_message(&self, id: &str, row: &MessageRow) -> RemoteResult<()> {
        self.update(MESSAGES_TABLE, id, row).await
    }

    async fn delete_message(&self, id: &str) -> RemoteResult<()> {
        self.delete(MESSAGES_TABLE, id).await
    }

    async fn conversations_changed_since(
        &self,
        since: DateTime<Utc>,
    ) -> RemoteResult<Vec<ConversationRow>> {
        self.changed_since(CONVERSATIONS_TABLE, since).await
    }

    async fn messages_changed_since(
        &self,
        since: DateTime<Utc>,
    ) -> RemoteResult<Vec<MessageRow>> {
        self.changed_since(MESSAGES_TABLE, since).await
    }
}

fn normalize_base_url(base_url: String) -> RemoteResult<String> {
    let trimmed = base_url.trim();
    if trimmed.is_empty() {
        return Err(RemoteError::Permanent {
            status: 0,
            body: "remote base URL must not be empty".to_string(),
        });
    }
    if !trimmed.starts_with("http://") && !trimmed.starts_with("https://") {
        return Err(RemoteError::Permanent {
            status: 0,
            body: format!("remote base URL must start with http:// or https://: {trimmed}"),
        });
    }
    Ok(trimmed.trim_end_matches('/').to_string())
}

fn table_url(base_url: &str, table: &str) -> String {
    format!("{base_url}/{table}")
}

fn row_url(base_url: &str, table: &str, id: &str) -> String {
    format!(
        "{base_url}/{table}?id=eq.{}",
        urlencoding::encode(id)
    )
}

fn changes_url(base_url: &str, table: &str, since: DateTime<Utc>) -> String {
    let since = since.to_rfc3339_opts(SecondsFormat::Millis, true);
    format!(
        "{base_url}/{table}?updated_at=gt.{}&order=updated_at.asc",
        urlencoding::encode(&since)
    )
}

async fn check_status(response: Response, id: &str) -> RemoteResult<()> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    let body = response.text().await.unwrap_or_default();
    Err(classify_status(status, &body, id))
}

fn classify_status(status: StatusCode, body: &str, subject: &str) -> RemoteError {
    match status.as_u16() {
        401 | 403 => RemoteError::Auth(format!("HTTP {status}: {body}")),
        409 => RemoteError::Conflict(subject.to_string()),
        408 | 429 => RemoteError::Transient(format!("HTTP {status}")),
        code if status.is_server_error() => RemoteError::Transient(format!("HTTP {code}")),
        code => RemoteError::Permanent {
            status: code,
            body: body.to_string(),
        },
    }
}
