//! Waiting for locally queued writes to reach the remote store.

use std::sync::Arc;
use thiserror::Error;

use crate::connectivity::ConnectivityMonitor;
use crate::error::{classify, ErrorRecord};
use crate::store::DocumentStore;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    /// The store is unreachable, so pending writes cannot be flushed.
    #[error("Cannot sync while offline")]
    Unavailable,

    /// The flush itself failed.
    #[error("{0}")]
    Flush(ErrorRecord),
}

#[derive(Clone)]
pub struct SyncCoordinator {
    monitor: ConnectivityMonitor,
    store: Arc<dyn DocumentStore>,
}

impl SyncCoordinator {
    pub fn new(monitor: ConnectivityMonitor, store: Arc<dyn DocumentStore>) -> Self {
        Self { monitor, store }
    }

    /// Resolves once every pending local write has been flushed.
    ///
    /// Fails immediately with [`SyncError::Unavailable`] when the monitor
    /// reports the store unreachable; no backend call is made. Flush errors
    /// are not retried here.
    pub async fn wait_for_sync(&self) -> Result<(), SyncError> {
        if !self.monitor.current_state() {
            tracing::debug!("Skipping flush, document store unreachable");
            return Err(SyncError::Unavailable);
        }

        match self.store.flush_pending_writes().await {
            Ok(()) => {
                tracing::debug!("Pending writes flushed");
                Ok(())
            }
            Err(e) => {
                tracing::warn!("Error waiting for sync: {}", e);
                Err(SyncError::Flush(classify(&e)))
            }
        }
    }
}
