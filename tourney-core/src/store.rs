//! Document store capability consumed by the sync layer.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::{Collection, RecordChange};

/// Remote document database with a local write cache.
///
/// Writes are keyed by a client-generated id; writing the same id twice
/// overwrites, which is what makes retried writes safe.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Re-enables the network channel to the remote store.
    async fn enable_channel(&self) -> Result<(), StoreError>;

    /// Disables the network channel. Writes keep landing locally.
    async fn disable_channel(&self) -> Result<(), StoreError>;

    /// Resolves once every locally queued write is acknowledged remotely.
    async fn flush_pending_writes(&self) -> Result<(), StoreError>;

    async fn put(&self, collection: Collection, id: Uuid, document: Value)
        -> Result<(), StoreError>;

    async fn delete(&self, collection: Collection, id: Uuid) -> Result<(), StoreError>;

    /// Applies a validated form submission.
    async fn apply(&self, change: &RecordChange) -> Result<(), StoreError> {
        match change {
            RecordChange::Upsert(record) => {
                let document = record.to_document().map_err(|e| {
                    StoreError::new("failed-precondition", format!("serialize record: {}", e))
                })?;
                self.put(record.collection(), record.id(), document).await
            }
            RecordChange::Delete { collection, id } => self.delete(*collection, *id).await,
        }
    }
}

type Key = (Collection, Uuid);

#[derive(Debug, Clone)]
enum PendingOp {
    Put(Value),
    Delete,
}

#[derive(Debug)]
struct MemoryState {
    channel_enabled: bool,
    local: HashMap<Key, Value>,
    pending: Vec<(Key, PendingOp)>,
    remote: HashMap<Key, Value>,
    flushes: usize,
}

/// In-process document store.
///
/// Writes apply to a local cache and queue until
/// [`flush_pending_writes`](DocumentStore::flush_pending_writes), which
/// replays the queue into the "remote" map. Flushing with the channel
/// disabled fails with `unavailable`.
#[derive(Debug)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MemoryState {
                channel_enabled: true,
                local: HashMap::new(),
                pending: Vec::new(),
                remote: HashMap::new(),
                flushes: 0,
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_channel_enabled(&self) -> bool {
        self.state().channel_enabled
    }

    pub fn pending_count(&self) -> usize {
        self.state().pending.len()
    }

    /// Number of successful flushes so far.
    pub fn flush_count(&self) -> usize {
        self.state().flushes
    }

    pub fn local(&self, collection: Collection, id: Uuid) -> Option<Value> {
        self.state().local.get(&(collection, id)).cloned()
    }

    pub fn remote(&self, collection: Collection, id: Uuid) -> Option<Value> {
        self.state().remote.get(&(collection, id)).cloned()
    }

    pub fn remote_len(&self, collection: Collection) -> usize {
        self.state()
            .remote
            .keys()
            .filter(|(c, _)| *c == collection)
            .count()
    }

    fn enqueue(&self, key: Key, op: PendingOp) {
        let mut state = self.state();
        match &op {
            PendingOp::Put(doc) => {
                state.local.insert(key, doc.clone());
            }
            PendingOp::Delete => {
                state.local.remove(&key);
            }
        }
        // Only the latest write per key needs to reach the remote.
        state.pending.retain(|(k, _)| *k != key);
        state.pending.push((key, op));
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn enable_channel(&self) -> Result<(), StoreError> {
        self.state().channel_enabled = true;
        Ok(())
    }

    async fn disable_channel(&self) -> Result<(), StoreError> {
        self.state().channel_enabled = false;
        Ok(())
    }

    async fn flush_pending_writes(&self) -> Result<(), StoreError> {
        let mut state = self.state();
        if !state.channel_enabled {
            return Err(StoreError::unavailable("network channel is disabled"));
        }
        let pending = std::mem::take(&mut state.pending);
        for (key, op) in pending {
            match op {
                PendingOp::Put(doc) => {
                    state.remote.insert(key, doc);
                }
                PendingOp::Delete => {
                    state.remote.remove(&key);
                }
            }
        }
        state.flushes += 1;
        Ok(())
    }

    async fn put(
        &self,
        collection: Collection,
        id: Uuid,
        document: Value,
    ) -> Result<(), StoreError> {
        self.enqueue((collection, id), PendingOp::Put(document));
        Ok(())
    }

    async fn delete(&self, collection: Collection, id: Uuid) -> Result<(), StoreError> {
        self.enqueue((collection, id), PendingOp::Delete);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::models::{Record, Sponsor, SponsorTier};
    use serde_json::json;

    #[tokio::test]
    async fn test_writes_queue_until_flush() {
        let store = MemoryStore::new();
        let id = Uuid::new_v4();

        store
            .put(Collection::Sponsors, id, json!({ "name": "Ace" }))
            .await
            .unwrap();
        assert_eq!(store.pending_count(), 1);
        assert!(store.local(Collection::Sponsors, id).is_some());
        assert!(store.remote(Collection::Sponsors, id).is_none());

        store.flush_pending_writes().await.unwrap();
        assert_eq!(store.pending_count(), 0);
        assert_eq!(
            store.remote(Collection::Sponsors, id),
            Some(json!({ "name": "Ace" }))
        );
    }

    #[tokio::test]
    async fn test_same_id_overwrites() {
        let store = MemoryStore::new();
        let id = Uuid::new_v4();

        for name in ["first", "second", "third"] {
            store
                .put(Collection::RegisteredTeams, id, json!({ "name": name }))
                .await
                .unwrap();
        }
        assert_eq!(store.pending_count(), 1);

        store.flush_pending_writes().await.unwrap();
        assert_eq!(store.remote_len(Collection::RegisteredTeams), 1);
        assert_eq!(
            store.remote(Collection::RegisteredTeams, id).unwrap()["name"],
            "third"
        );
    }

    #[tokio::test]
    async fn test_flush_fails_while_channel_disabled() {
        let store = MemoryStore::new();
        store
            .put(Collection::Results, Uuid::new_v4(), json!({}))
            .await
            .unwrap();
        store.disable_channel().await.unwrap();

        let err = store.flush_pending_writes().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unavailable);
        assert_eq!(store.pending_count(), 1);

        store.enable_channel().await.unwrap();
        store.flush_pending_writes().await.unwrap();
        assert_eq!(store.pending_count(), 0);
        assert_eq!(store.flush_count(), 1);
    }

    #[tokio::test]
    async fn test_apply_upsert_and_delete() {
        let store = MemoryStore::new();
        let sponsor = Sponsor::new("Ace", SponsorTier::Gold);
        let id = sponsor.id;

        store
            .apply(&RecordChange::Upsert(Record::Sponsor(sponsor)))
            .await
            .unwrap();
        store.flush_pending_writes().await.unwrap();
        assert_eq!(store.remote(Collection::Sponsors, id).unwrap()["tier"], "Gold");

        store
            .apply(&RecordChange::Delete {
                collection: Collection::Sponsors,
                id,
            })
            .await
            .unwrap();
        assert!(store.local(Collection::Sponsors, id).is_none());
        store.flush_pending_writes().await.unwrap();
        assert!(store.remote(Collection::Sponsors, id).is_none());
    }
}
