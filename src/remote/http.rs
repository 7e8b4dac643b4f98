//! Document store backed by the tourney document server.
//!
//! Every write lands in the on-disk [`Outbox`] first. While the channel is
//! enabled writes are pushed straight away; otherwise they wait for
//! [`flush_pending_writes`](DocumentStore::flush_pending_writes). A write
//! only fails when the outbox cannot take it or the server rejects it; an
//! unreachable server leaves it queued and the write succeeds locally.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::Value;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tourney_core::{Collection, DocumentStore, ErrorKind, StoreError};
use uuid::Uuid;

use super::outbox::{Outbox, OutboxEntry, OutboxError, OutboxOp};
use crate::config::Config;
use crate::server::ErrorBody;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum HttpStoreError {
    #[error("Server not configured. Set server.server_url and server.api_key in config")]
    NotConfigured,

    #[error("Failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

pub struct HttpDocumentStore {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    outbox: Mutex<Outbox>,
    channel_enabled: AtomicBool,
    flush_lock: tokio::sync::Mutex<()>,
}

impl HttpDocumentStore {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        data_dir: impl AsRef<Path>,
    ) -> Result<Self, HttpStoreError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            outbox: Mutex::new(Outbox::new(data_dir)),
            channel_enabled: AtomicBool::new(true),
            flush_lock: tokio::sync::Mutex::new(()),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, HttpStoreError> {
        match (&config.server.server_url, &config.server.api_key) {
            (Some(url), Some(key)) => Self::new(url, key, &config.data_dir.value),
            _ => Err(HttpStoreError::NotConfigured),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn is_channel_enabled(&self) -> bool {
        self.channel_enabled.load(Ordering::SeqCst)
    }

    /// Writes still waiting for a server acknowledgement.
    pub fn pending(&self) -> Result<Vec<OutboxEntry>, OutboxError> {
        self.outbox().load()
    }

    pub fn pending_count(&self) -> Result<usize, OutboxError> {
        self.outbox().len()
    }

    fn outbox(&self) -> MutexGuard<'_, Outbox> {
        self.outbox.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn document_url(&self, collection: Collection, id: Uuid) -> String {
        format!("{}/collections/{}/{}", self.base_url, collection.name(), id)
    }

    async fn enqueue(
        &self,
        collection: Collection,
        id: Uuid,
        op: OutboxOp,
    ) -> Result<(), StoreError> {
        let entry = self
            .outbox()
            .enqueue(collection, id, op)
            .map_err(outbox_error)?;

        if !self.is_channel_enabled() {
            tracing::debug!(%collection, %id, "Channel disabled, write queued");
            return Ok(());
        }
        match self.deliver(&entry).await {
            // Saved locally; the next flush retries it.
            Err(e) if e.kind().is_retryable() => Ok(()),
            other => other,
        }
    }

    /// Pushes one entry and settles it in the outbox.
    ///
    /// Acknowledged and permanently rejected entries leave the outbox;
    /// transient failures stay queued for the next flush.
    async fn deliver(&self, entry: &OutboxEntry) -> Result<(), StoreError> {
        match self.push(entry).await {
            Ok(()) => {
                self.outbox().acknowledge(entry).map_err(outbox_error)?;
                Ok(())
            }
            Err(e) if e.kind().is_retryable() => {
                tracing::debug!(
                    collection = %entry.collection,
                    id = %entry.id,
                    "Write kept queued: {}",
                    e
                );
                Err(e)
            }
            Err(e) => {
                tracing::warn!(
                    collection = %entry.collection,
                    id = %entry.id,
                    "Server rejected write, dropping it: {}",
                    e
                );
                self.outbox().acknowledge(entry).map_err(outbox_error)?;
                Err(e)
            }
        }
    }

    async fn push(&self, entry: &OutboxEntry) -> Result<(), StoreError> {
        let url = self.document_url(entry.collection, entry.id);
        let request = match &entry.op {
            OutboxOp::Put(document) => self.client.put(&url).json(document),
            OutboxOp::Delete => self.client.delete(&url),
        };

        let response = request
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        // Already gone is as good as deleted.
        if status == StatusCode::NOT_FOUND && entry.op == OutboxOp::Delete {
            return Ok(());
        }

        let body = response.json::<ErrorBody>().await.ok();
        Err(response_error(status, body))
    }
}

#[async_trait]
impl DocumentStore for HttpDocumentStore {
    async fn enable_channel(&self) -> Result<(), StoreError> {
        let url = format!("{}/health", self.base_url);
        let response = self.client.get(&url).send().await.map_err(transport_error)?;
        if !response.status().is_success() {
            return Err(StoreError::unavailable(format!(
                "Health check returned status {}",
                response.status()
            )));
        }
        self.channel_enabled.store(true, Ordering::SeqCst);
        tracing::debug!(url = %self.base_url, "Network channel enabled");
        Ok(())
    }

    async fn disable_channel(&self) -> Result<(), StoreError> {
        self.channel_enabled.store(false, Ordering::SeqCst);
        tracing::debug!(url = %self.base_url, "Network channel disabled");
        Ok(())
    }

    async fn flush_pending_writes(&self) -> Result<(), StoreError> {
        let _flushing = self.flush_lock.lock().await;

        if !self.is_channel_enabled() {
            return Err(StoreError::unavailable("network channel is disabled"));
        }

        let entries = self.outbox().load().map_err(outbox_error)?;
        let total = entries.len();
        let mut rejected = None;

        for entry in entries {
            match self.deliver(&entry).await {
                Ok(()) => {}
                // Order matters: stop at the first transient failure.
                Err(e) if e.kind().is_retryable() => return Err(e),
                Err(e) => {
                    rejected.get_or_insert(e);
                }
            }
        }

        match rejected {
            Some(e) => Err(e),
            None => {
                tracing::debug!(count = total, "Outbox flushed");
                Ok(())
            }
        }
    }

    async fn put(
        &self,
        collection: Collection,
        id: Uuid,
        document: Value,
    ) -> Result<(), StoreError> {
        self.enqueue(collection, id, OutboxOp::Put(document)).await
    }

    async fn delete(&self, collection: Collection, id: Uuid) -> Result<(), StoreError> {
        self.enqueue(collection, id, OutboxOp::Delete).await
    }
}

fn outbox_error(e: OutboxError) -> StoreError {
    match e {
        OutboxError::Corrupt(..) => StoreError::new(ErrorKind::DataLoss.code(), e.to_string()),
        OutboxError::Io(..) => StoreError::uncoded(e.to_string()),
    }
}

fn transport_error(e: reqwest::Error) -> StoreError {
    StoreError::unavailable(e.to_string())
}

/// Backend code for an HTTP status the server answered with.
fn status_code(status: StatusCode) -> ErrorKind {
    match status.as_u16() {
        400 | 412 => ErrorKind::FailedPrecondition,
        401 => ErrorKind::Unauthenticated,
        403 => ErrorKind::PermissionDenied,
        404 => ErrorKind::NotFound,
        409 => ErrorKind::AlreadyExists,
        429 => ErrorKind::ResourceExhausted,
        499 => ErrorKind::Cancelled,
        502..=504 => ErrorKind::Unavailable,
        _ => ErrorKind::Unknown,
    }
}

fn response_error(status: StatusCode, body: Option<ErrorBody>) -> StoreError {
    match body {
        Some(body) => StoreError::new(body.code, body.message),
        None => StoreError::new(
            status_code(status).code(),
            format!("Server returned status {}", status),
        ),
    }
}
