//! Online/offline tracking and network channel control.
//!
//! [`ConnectivityMonitor`] is the single source of truth for whether the
//! document store is reachable, and the only component that toggles the
//! store's network channel. It is driven by two platform signals:
//!
//! - [`handle_offline`](ConnectivityMonitor::handle_offline): go `Offline`
//!   and disable the channel (best effort).
//! - [`handle_online`](ConnectivityMonitor::handle_online): enter
//!   `Reconnecting(1)` and try to enable the channel, backing off
//!   `min(base * 2^n, cap)` after each failed attempt `n`, up to
//!   `max_reconnect_attempts`. After that it stays `Reconnecting(max)` until
//!   the next platform signal.
//!
//! A monitor seeded offline disables the channel on construction so it
//! agrees with its phase. Listeners are told whenever the reachable view
//! (`phase == Online`) flips.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::thread::{self, ThreadId};

use crate::backoff::Backoff;
use crate::settings::SyncSettings;
use crate::store::DocumentStore;

type Listener = Arc<dyn Fn(bool) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionPhase {
    Online,
    Offline,
    /// Channel enable attempt `n` is running or scheduled.
    Reconnecting(u32),
}

impl ConnectionPhase {
    pub fn is_reachable(&self) -> bool {
        matches!(self, ConnectionPhase::Online)
    }
}

/// Read-only snapshot of the monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectivityState {
    pub online: bool,
    pub reconnect_attempts: u32,
    pub max_reconnect_attempts: u32,
}

#[derive(Debug)]
struct MonitorState {
    phase: ConnectionPhase,
    /// Bumped by every accepted platform signal; stale reconnect loops compare
    /// against it and stop.
    epoch: u64,
    reconnect_active: bool,
}

struct Registry {
    next_id: u64,
    listeners: Vec<(u64, Listener)>,
}

struct Inner {
    store: Arc<dyn DocumentStore>,
    state: Mutex<MonitorState>,
    registry: Mutex<Registry>,
    /// Held for a whole transition including its notifications, so one
    /// transition's notifications never interleave with another's.
    transitions: Mutex<()>,
    /// Thread currently running listeners, if any.
    notifying: Mutex<Option<ThreadId>>,
    /// Held around every enable/disable call.
    channel: tokio::sync::Mutex<()>,
    max_reconnect_attempts: u32,
    backoff: Backoff,
}

/// Tracks reachability of the document store.
///
/// Cloning yields another handle to the same monitor. Construct one per
/// process through [`SyncContext`](crate::context::SyncContext).
#[derive(Clone)]
pub struct ConnectivityMonitor {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for ConnectivityMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectivityMonitor")
            .field("phase", &self.phase())
            .finish_non_exhaustive()
    }
}

impl ConnectivityMonitor {
    pub(crate) fn new(
        store: Arc<dyn DocumentStore>,
        platform_online: bool,
        settings: &SyncSettings,
    ) -> Self {
        let phase = if platform_online {
            ConnectionPhase::Online
        } else {
            ConnectionPhase::Offline
        };
        let inner = Arc::new(Inner {
            store,
            state: Mutex::new(MonitorState {
                phase,
                epoch: 0,
                reconnect_active: false,
            }),
            registry: Mutex::new(Registry {
                next_id: 0,
                listeners: Vec::new(),
            }),
            transitions: Mutex::new(()),
            notifying: Mutex::new(None),
            channel: tokio::sync::Mutex::new(()),
            max_reconnect_attempts: settings.max_reconnect_attempts.max(1),
            backoff: settings.reconnect_backoff(),
        });

        if !platform_online {
            tracing::info!("Starting offline, disabling network channel");
            spawn(Arc::clone(&inner).disconnect(0));
        }

        Self { inner }
    }

    /// Registers a listener for reachability changes.
    ///
    /// Listeners run synchronously, in subscription order, on whichever task
    /// performed the transition. A listener registered during a notification
    /// first hears the next transition. Listeners may read the monitor,
    /// subscribe and unsubscribe, but must not deliver platform signals from
    /// inside the callback.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(bool) + Send + Sync + 'static,
    {
        let mut registry = self.inner.registry();
        let id = registry.next_id;
        registry.next_id += 1;
        registry.listeners.push((id, Arc::new(listener)));
        Subscription {
            id,
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Whether the store is reachable right now.
    pub fn current_state(&self) -> bool {
        self.phase().is_reachable()
    }

    pub fn phase(&self) -> ConnectionPhase {
        self.inner.state().phase
    }

    pub fn state(&self) -> ConnectivityState {
        let phase = self.phase();
        ConnectivityState {
            online: phase.is_reachable(),
            reconnect_attempts: match phase {
                ConnectionPhase::Reconnecting(n) => n,
                _ => 0,
            },
            max_reconnect_attempts: self.inner.max_reconnect_attempts,
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.registry().listeners.len()
    }

    /// Platform reports the network as reachable.
    pub fn handle_online(&self) {
        let epoch = self.inner.transition(|state| match state.phase {
            ConnectionPhase::Online => {
                tracing::debug!("Duplicate online signal ignored");
                None
            }
            ConnectionPhase::Reconnecting(n) if state.reconnect_active => {
                tracing::debug!(attempt = n, "Online signal ignored, reconnect in progress");
                None
            }
            _ => {
                state.epoch += 1;
                state.phase = ConnectionPhase::Reconnecting(1);
                state.reconnect_active = true;
                Some(state.epoch)
            }
        });

        if let Some(epoch) = epoch {
            tracing::info!("Platform online, reconnecting to document store");
            let inner = Arc::clone(&self.inner);
            spawn(inner.reconnect(epoch));
        }
    }

    /// Platform reports the network as unreachable.
    pub fn handle_offline(&self) {
        let epoch = self.inner.transition(|state| {
            if state.phase == ConnectionPhase::Offline {
                tracing::debug!("Duplicate offline signal ignored");
                return None;
            }
            state.epoch += 1;
            state.phase = ConnectionPhase::Offline;
            state.reconnect_active = false;
            Some(state.epoch)
        });

        if let Some(epoch) = epoch {
            tracing::info!("Platform offline, disabling network channel");
            let inner = Arc::clone(&self.inner);
            spawn(inner.disconnect(epoch));
        }
    }
}

impl Inner {
    fn state(&self) -> MutexGuard<'_, MonitorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn registry(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn transitions(&self) -> MutexGuard<'_, ()> {
        self.transitions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn notifying(&self) -> MutexGuard<'_, Option<ThreadId>> {
        self.notifying.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_registered(&self, id: u64) -> bool {
        self.registry().listeners.iter().any(|(l, _)| *l == id)
    }

    fn remove_listener(&self, id: u64) {
        let on_notifying_thread = *self.notifying() == Some(thread::current().id());
        // Called from inside a listener: the transition lock is already ours,
        // and the liveness check before each call skips the removed listener.
        let _serial = if on_notifying_thread {
            None
        } else {
            Some(self.transitions())
        };
        self.registry().listeners.retain(|(l, _)| *l != id);
    }

    fn is_current(&self, epoch: u64) -> bool {
        self.state().epoch == epoch
    }

    /// Applies `apply` to the state and notifies listeners if reachability
    /// flipped.
    fn transition<R>(&self, apply: impl FnOnce(&mut MonitorState) -> R) -> R {
        let _serial = self.transitions();
        let (result, before, after) = {
            let mut state = self.state();
            let before = state.phase.is_reachable();
            let result = apply(&mut state);
            (result, before, state.phase.is_reachable())
        };
        if before != after {
            let snapshot = self.registry().listeners.clone();
            tracing::debug!(online = after, "Notifying {} listener(s)", snapshot.len());
            let _notifying = NotifyingGuard::enter(self);
            for (id, listener) in snapshot {
                if self.is_registered(id) {
                    listener(after);
                }
            }
        }
        result
    }

    async fn reconnect(self: Arc<Self>, epoch: u64) {
        loop {
            let attempt = {
                let state = self.state();
                match state.phase {
                    ConnectionPhase::Reconnecting(n) if state.epoch == epoch => n,
                    _ => return,
                }
            };

            let result = {
                let _channel = self.channel.lock().await;
                let current = self.is_current(epoch);
                if !current {
                    return;
                }
                self.store.enable_channel().await
            };

            match result {
                Ok(()) => {
                    let applied = self.transition(|state| {
                        if state.epoch != epoch {
                            return false;
                        }
                        state.phase = ConnectionPhase::Online;
                        state.reconnect_active = false;
                        true
                    });
                    if applied {
                        tracing::info!(attempt, "Reconnected to document store");
                    }
                    return;
                }
                Err(e) => {
                    tracing::warn!(attempt, "Failed to enable network channel: {}", e);

                    if attempt >= self.max_reconnect_attempts {
                        self.transition(|state| {
                            if state.epoch == epoch {
                                state.reconnect_active = false;
                            }
                        });
                        tracing::warn!(
                            attempt,
                            "Giving up on reconnect; waiting for next online signal"
                        );
                        return;
                    }

                    let advanced = self.transition(|state| {
                        if state.epoch != epoch {
                            return false;
                        }
                        state.phase = ConnectionPhase::Reconnecting(attempt + 1);
                        true
                    });
                    if !advanced {
                        return;
                    }

                    let delay = self.backoff.delay(attempt);
                    tracing::debug!(
                        next_attempt = attempt + 1,
                        "Retrying channel enable in {}ms",
                        delay.as_millis()
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    async fn disconnect(self: Arc<Self>, epoch: u64) {
        let _channel = self.channel.lock().await;
        // A newer signal already decided what the channel should be.
        let current = self.is_current(epoch);
        if !current {
            return;
        }
        match self.store.disable_channel().await {
            Ok(()) => tracing::info!("Network channel disabled"),
            Err(e) => tracing::warn!("Failed to disable network channel: {}", e),
        }
    }
}

/// Marks the current thread as running listeners until dropped.
struct NotifyingGuard<'a> {
    inner: &'a Inner,
}

impl<'a> NotifyingGuard<'a> {
    fn enter(inner: &'a Inner) -> Self {
        *inner.notifying() = Some(thread::current().id());
        Self { inner }
    }
}

impl Drop for NotifyingGuard<'_> {
    fn drop(&mut self) {
        *self.inner.notifying() = None;
    }
}

fn spawn<F>(future: F)
where
    F: Future<Output = ()> + Send + 'static,
{
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => {
            handle.spawn(future);
        }
        Err(_) => tracing::error!("No async runtime available; network channel left untouched"),
    }
}

/// Handle returned by [`ConnectivityMonitor::subscribe`].
///
/// Dropping it does not remove the listener; only
/// [`unsubscribe`](Subscription::unsubscribe) does.
#[must_use = "the listener stays registered until unsubscribe() is called"]
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    inner: Weak<Inner>,
}

impl Subscription {
    /// Removes the listener. It is not invoked again once this returns.
    pub fn unsubscribe(self) {
        if let Some(inner) = self.inner.upgrade() {
            inner.remove_listener(self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Script, ScriptedStore};
    use std::time::Duration;

    fn monitor(store: &Arc<ScriptedStore>, online: bool) -> ConnectivityMonitor {
        let store: Arc<dyn DocumentStore> = store.clone();
        ConnectivityMonitor::new(store, online, &SyncSettings::default())
    }

    fn record_events(monitor: &ConnectivityMonitor) -> (Arc<Mutex<Vec<bool>>>, Subscription) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let sub = monitor.subscribe(move |online| sink.lock().unwrap().push(online));
        (events, sub)
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_initial_state_follows_platform() {
        let store = Arc::new(ScriptedStore::default());
        assert!(monitor(&store, true).current_state());

        settle().await;
        assert_eq!(store.disable.calls(), 0);

        let offline = monitor(&store, false);
        assert!(!offline.current_state());
        assert_eq!(offline.phase(), ConnectionPhase::Offline);

        // Seeded offline: the channel is brought in line with the phase.
        settle().await;
        assert_eq!(store.enable.calls(), 0);
        assert_eq!(store.disable.calls(), 1);
        assert_eq!(offline.phase(), ConnectionPhase::Offline);
    }

    #[tokio::test(start_paused = true)]
    async fn test_online_signal_supersedes_initial_disable() {
        let store = Arc::new(ScriptedStore::default());
        let monitor = monitor(&store, false);

        monitor.handle_online();
        settle().await;

        assert_eq!(store.disable.calls(), 0);
        assert_eq!(store.enable.calls(), 1);
        assert_eq!(monitor.phase(), ConnectionPhase::Online);
    }

    #[tokio::test(start_paused = true)]
    async fn test_duplicate_online_enters_reconnecting_once() {
        let store = Arc::new(ScriptedStore::default());
        let monitor = monitor(&store, false);
        let (events, _sub) = record_events(&monitor);

        monitor.handle_online();
        assert_eq!(monitor.phase(), ConnectionPhase::Reconnecting(1));
        monitor.handle_online();
        assert_eq!(monitor.phase(), ConnectionPhase::Reconnecting(1));

        settle().await;
        assert_eq!(monitor.phase(), ConnectionPhase::Online);
        assert_eq!(store.enable.calls(), 1);
        assert_eq!(*events.lock().unwrap(), vec![true]);

        // Online -> Online is a no-op.
        monitor.handle_online();
        settle().await;
        assert_eq!(store.enable.calls(), 1);
        assert_eq!(*events.lock().unwrap(), vec![true]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnect_stops_after_max_attempts() {
        let store = Arc::new(ScriptedStore {
            enable: Script::failing("unavailable"),
            ..Default::default()
        });
        let monitor = monitor(&store, false);

        monitor.handle_online();
        tokio::time::sleep(Duration::from_secs(600)).await;

        assert_eq!(store.enable.calls(), 5);
        assert_eq!(monitor.phase(), ConnectionPhase::Reconnecting(5));
        assert_eq!(monitor.state().reconnect_attempts, 5);
        assert!(!monitor.current_state());

        tokio::time::sleep(Duration::from_secs(600)).await;
        assert_eq!(store.enable.calls(), 5);

        // A fresh online signal re-enters the machine.
        monitor.handle_online();
        assert_eq!(monitor.phase(), ConnectionPhase::Reconnecting(1));
        tokio::time::sleep(Duration::from_secs(600)).await;
        assert_eq!(store.enable.calls(), 10);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnect_backoff_schedule() {
        let store = Arc::new(ScriptedStore {
            enable: Script::ok().then_fail("unavailable", 2),
            ..Default::default()
        });
        let monitor = monitor(&store, false);
        let (events, _sub) = record_events(&monitor);

        monitor.handle_online();
        tokio::time::sleep(Duration::from_secs(60)).await;

        let times = store.enable.times();
        assert_eq!(times.len(), 3);
        let first_gap = times[1] - times[0];
        let second_gap = times[2] - times[1];
        assert!(first_gap >= Duration::from_millis(2000));
        assert!(first_gap < Duration::from_millis(2010));
        assert!(second_gap >= Duration::from_millis(4000));
        assert!(second_gap < Duration::from_millis(4010));

        assert_eq!(monitor.phase(), ConnectionPhase::Online);
        assert_eq!(monitor.state().reconnect_attempts, 0);
        assert_eq!(*events.lock().unwrap(), vec![true]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_offline_disables_channel_and_notifies() {
        let store = Arc::new(ScriptedStore::default());
        let monitor = monitor(&store, true);
        let (events, _sub) = record_events(&monitor);

        monitor.handle_offline();
        assert!(!monitor.current_state());
        monitor.handle_offline();
        settle().await;

        assert_eq!(store.disable.calls(), 1);
        assert_eq!(*events.lock().unwrap(), vec![false]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disable_failure_is_swallowed() {
        let store = Arc::new(ScriptedStore {
            disable: Script::failing("unknown"),
            ..Default::default()
        });
        let monitor = monitor(&store, true);

        monitor.handle_offline();
        settle().await;

        assert_eq!(store.disable.calls(), 1);
        assert_eq!(monitor.phase(), ConnectionPhase::Offline);
    }

    #[tokio::test(start_paused = true)]
    async fn test_offline_supersedes_pending_reconnect() {
        let store = Arc::new(ScriptedStore {
            enable: Script::failing("unavailable"),
            ..Default::default()
        });
        let monitor = monitor(&store, false);

        monitor.handle_online();
        settle().await;
        assert_eq!(store.enable.calls(), 1);
        assert_eq!(monitor.phase(), ConnectionPhase::Reconnecting(2));

        monitor.handle_offline();
        tokio::time::sleep(Duration::from_secs(600)).await;

        assert_eq!(store.enable.calls(), 1);
        assert_eq!(monitor.phase(), ConnectionPhase::Offline);
    }

    #[tokio::test(start_paused = true)]
    async fn test_listeners_in_subscription_order() {
        let store = Arc::new(ScriptedStore::default());
        let monitor = monitor(&store, true);
        let order = Arc::new(Mutex::new(Vec::new()));

        let subs: Vec<Subscription> = ["a", "b", "c"]
            .into_iter()
            .map(|name| {
                let order = order.clone();
                monitor.subscribe(move |online| order.lock().unwrap().push((name, online)))
            })
            .collect();

        monitor.handle_offline();
        assert_eq!(
            *order.lock().unwrap(),
            vec![("a", false), ("b", false), ("c", false)]
        );

        for sub in subs {
            sub.unsubscribe();
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_notification_after_unsubscribe() {
        let store = Arc::new(ScriptedStore::default());
        let monitor = monitor(&store, true);
        let (events, sub) = record_events(&monitor);
        let (other, _other_sub) = record_events(&monitor);
        assert_eq!(monitor.subscriber_count(), 2);

        sub.unsubscribe();
        assert_eq!(monitor.subscriber_count(), 1);

        monitor.handle_offline();
        monitor.handle_online();
        settle().await;

        assert!(events.lock().unwrap().is_empty());
        assert_eq!(*other.lock().unwrap(), vec![false, true]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_listener_may_read_state() {
        let store = Arc::new(ScriptedStore::default());
        let monitor = monitor(&store, true);
        let seen = Arc::new(Mutex::new(None));

        let reader = monitor.clone();
        let sink = seen.clone();
        let _sub = monitor.subscribe(move |online| {
            *sink.lock().unwrap() = Some((online, reader.current_state()));
        });

        monitor.handle_offline();
        assert_eq!(*seen.lock().unwrap(), Some((false, false)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_listener_may_unsubscribe_itself() {
        let store = Arc::new(ScriptedStore::default());
        let monitor = monitor(&store, true);
        let calls = Arc::new(Mutex::new(Vec::new()));
        let own: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));

        let sub = {
            let calls = calls.clone();
            let own = own.clone();
            monitor.subscribe(move |online| {
                calls.lock().unwrap().push(online);
                if let Some(sub) = own.lock().unwrap().take() {
                    sub.unsubscribe();
                }
            })
        };
        *own.lock().unwrap() = Some(sub);
        let (other, _other_sub) = record_events(&monitor);

        monitor.handle_offline();
        assert_eq!(monitor.subscriber_count(), 1);
        monitor.handle_online();
        settle().await;

        assert_eq!(*calls.lock().unwrap(), vec![false]);
        assert_eq!(*other.lock().unwrap(), vec![false, true]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_listener_unsubscribing_a_later_listener_skips_it() {
        let store = Arc::new(ScriptedStore::default());
        let monitor = monitor(&store, true);
        let victim: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));
        let counts = Arc::new(Mutex::new(Vec::new()));

        let _first = {
            let victim = victim.clone();
            let counts = counts.clone();
            let reader = monitor.clone();
            monitor.subscribe(move |_| {
                counts.lock().unwrap().push(reader.subscriber_count());
                if let Some(sub) = victim.lock().unwrap().take() {
                    sub.unsubscribe();
                }
            })
        };
        let (events, sub) = record_events(&monitor);
        *victim.lock().unwrap() = Some(sub);

        // Subscribing from a callback does not deadlock either.
        let late = Arc::new(Mutex::new(None));
        let _second = {
            let reader = monitor.clone();
            let late = late.clone();
            monitor.subscribe(move |_| {
                let mut late = late.lock().unwrap();
                if late.is_none() {
                    *late = Some(reader.subscribe(|_| {}));
                }
            })
        };

        monitor.handle_offline();

        assert!(events.lock().unwrap().is_empty());
        assert_eq!(*counts.lock().unwrap(), vec![3]);
        assert_eq!(monitor.subscriber_count(), 3);
    }

    #[test]
    fn test_signals_without_runtime_do_not_panic() {
        let store = Arc::new(ScriptedStore::default());
        let online = monitor(&store, true);
        online.handle_offline();
        assert_eq!(online.phase(), ConnectionPhase::Offline);

        let offline = monitor(&store, false);
        assert_eq!(offline.phase(), ConnectionPhase::Offline);
        assert_eq!(store.disable.calls(), 0);
    }
}
