//! Process-wide wiring of the sync layer.

use std::sync::Arc;

use crate::connectivity::ConnectivityMonitor;
use crate::coordinator::SyncCoordinator;
use crate::settings::SyncSettings;
use crate::store::DocumentStore;
use crate::writer::{RetryPolicy, RetryingWriter};

/// Owns the one [`ConnectivityMonitor`] for a document store and hands out
/// the components that depend on it.
///
/// Build one at startup and pass it (or clones of its parts) to whatever
/// needs connectivity or writes. Tests build their own isolated contexts.
pub struct SyncContext {
    store: Arc<dyn DocumentStore>,
    monitor: ConnectivityMonitor,
    coordinator: SyncCoordinator,
    settings: SyncSettings,
}

impl SyncContext {
    /// `platform_online` seeds the monitor's initial state.
    pub fn new(
        store: Arc<dyn DocumentStore>,
        platform_online: bool,
        settings: SyncSettings,
    ) -> Self {
        let monitor = ConnectivityMonitor::new(Arc::clone(&store), platform_online, &settings);
        let coordinator = SyncCoordinator::new(monitor.clone(), Arc::clone(&store));
        tracing::debug!(online = platform_online, "Sync context initialised");
        Self {
            store,
            monitor,
            coordinator,
            settings,
        }
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    pub fn monitor(&self) -> &ConnectivityMonitor {
        &self.monitor
    }

    pub fn coordinator(&self) -> &SyncCoordinator {
        &self.coordinator
    }

    pub fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    /// A writer for one logical write, with its own in-flight flag.
    pub fn writer(&self) -> RetryingWriter {
        RetryingWriter::new(
            self.coordinator.clone(),
            Arc::clone(&self.store),
            RetryPolicy::from_settings(&self.settings),
        )
    }
}
