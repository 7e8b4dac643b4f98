//! Scripted document store for exercising retry and reconnect paths.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio::time::Instant;
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::Collection;
use crate::store::DocumentStore;

/// Outcome queue: pops scripted results, falling back to `default` when empty.
#[derive(Debug)]
pub struct Script {
    queue: Mutex<VecDeque<Result<(), StoreError>>>,
    default: Result<(), StoreError>,
    calls: AtomicUsize,
    times: Mutex<Vec<Instant>>,
}

impl Script {
    pub fn ok() -> Self {
        Self::with_default(Ok(()))
    }

    pub fn failing(code: &str) -> Self {
        Self::with_default(Err(StoreError::new(code, "scripted failure")))
    }

    fn with_default(default: Result<(), StoreError>) -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            default,
            calls: AtomicUsize::new(0),
            times: Mutex::new(Vec::new()),
        }
    }

    /// Queues `count` failures with `code` ahead of the default outcome.
    pub fn then_fail(self, code: &str, count: usize) -> Self {
        {
            let mut queue = self.queue.lock().unwrap();
            for _ in 0..count {
                queue.push_back(Err(StoreError::new(code, "scripted failure")));
            }
        }
        self
    }

    pub fn next(&self) -> Result<(), StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.times.lock().unwrap().push(Instant::now());
        self.queue
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.default.clone())
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn times(&self) -> Vec<Instant> {
        self.times.lock().unwrap().clone()
    }
}

#[derive(Debug)]
pub struct ScriptedStore {
    pub enable: Script,
    pub disable: Script,
    pub flush: Script,
    pub write: Script,
}

impl Default for ScriptedStore {
    fn default() -> Self {
        Self {
            enable: Script::ok(),
            disable: Script::ok(),
            flush: Script::ok(),
            write: Script::ok(),
        }
    }
}

#[async_trait]
impl DocumentStore for ScriptedStore {
    async fn enable_channel(&self) -> Result<(), StoreError> {
        self.enable.next()
    }

    async fn disable_channel(&self) -> Result<(), StoreError> {
        self.disable.next()
    }

    async fn flush_pending_writes(&self) -> Result<(), StoreError> {
        self.flush.next()
    }

    async fn put(&self, _: Collection, _: Uuid, _: Value) -> Result<(), StoreError> {
        self.write.next()
    }

    async fn delete(&self, _: Collection, _: Uuid) -> Result<(), StoreError> {
        self.write.next()
    }
}
