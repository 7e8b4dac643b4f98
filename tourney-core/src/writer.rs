//! Single-flight writes with bounded exponential-backoff retry.
//!
//! A [`RetryingWriter`] backs one logical write, e.g. one registration form.
//! Each `submit`:
//!
//! 1. claims the writer's in-flight flag, rejecting a concurrent submit;
//! 2. invokes the write, retrying `unavailable`/`cancelled` failures after
//!    `min(base * 2^attempt, cap)` while `attempt < max_retries`;
//! 3. on success waits for the coordinator to flush, so "confirmed" means the
//!    write is durable remotely. A flush failure is reported as
//!    [`SyncStatus::Pending`], never as a failed write.
//!
//! Writes may run more than once for the same payload. Payloads carry a
//! client-generated id so repeats overwrite instead of duplicating.

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use thiserror::Error;

use crate::backoff::Backoff;
use crate::coordinator::{SyncCoordinator, SyncError};
use crate::error::{classify, ErrorKind, ErrorRecord, StoreError};
use crate::models::{RecordChange, ValidationError};
use crate::settings::SyncSettings;
use crate::store::DocumentStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff: Backoff,
    pub retry_resource_exhausted: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_settings(&SyncSettings::default())
    }
}

impl RetryPolicy {
    pub fn from_settings(settings: &SyncSettings) -> Self {
        Self {
            max_retries: settings.write_max_retries,
            backoff: settings.write_backoff(),
            retry_resource_exhausted: settings.retry_resource_exhausted,
        }
    }

    pub fn should_retry(&self, kind: ErrorKind) -> bool {
        match kind {
            ErrorKind::Unavailable | ErrorKind::Cancelled => true,
            ErrorKind::ResourceExhausted => self.retry_resource_exhausted,
            _ => false,
        }
    }
}

/// Whether a successful write has reached the remote store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncStatus {
    Confirmed,
    /// Saved locally; the flush did not complete.
    Pending(SyncError),
}

impl SyncStatus {
    pub fn is_confirmed(&self) -> bool {
        matches!(self, SyncStatus::Confirmed)
    }

    /// Soft warning to show instead of a confirmation.
    pub fn warning(&self) -> Option<&'static str> {
        match self {
            SyncStatus::Confirmed => None,
            SyncStatus::Pending(_) => {
                Some("Saved locally. Changes will sync when the connection is restored.")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteOutcome {
    /// Number of times the write was invoked.
    pub attempts: u32,
    pub sync: SyncStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WriteError {
    #[error("A submission is already in progress")]
    InFlight,

    #[error(transparent)]
    Invalid(#[from] ValidationError),

    #[error("{record}")]
    Failed { record: ErrorRecord, attempts: u32 },
}

impl WriteError {
    pub fn record(&self) -> Option<&ErrorRecord> {
        match self {
            WriteError::Failed { record, .. } => Some(record),
            _ => None,
        }
    }
}

/// Retry wrapper around one logical write. Clones share the in-flight flag.
#[derive(Clone)]
pub struct RetryingWriter {
    coordinator: SyncCoordinator,
    store: Arc<dyn DocumentStore>,
    policy: RetryPolicy,
    in_flight: Arc<AtomicBool>,
    attempt: Arc<AtomicU32>,
}

impl RetryingWriter {
    pub fn new(
        coordinator: SyncCoordinator,
        store: Arc<dyn DocumentStore>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            coordinator,
            store,
            policy,
            in_flight: Arc::new(AtomicBool::new(false)),
            attempt: Arc::new(AtomicU32::new(0)),
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Retry index of the running submission (0 on the first attempt).
    pub fn attempt(&self) -> u32 {
        self.attempt.load(Ordering::Acquire)
    }

    /// Runs `write_fn(payload)` under the retry policy.
    pub async fn submit<P, F, Fut>(
        &self,
        mut write_fn: F,
        payload: P,
    ) -> Result<WriteOutcome, WriteError>
    where
        P: Clone,
        F: FnMut(P) -> Fut,
        Fut: Future<Output = Result<(), StoreError>>,
    {
        let _guard = match InFlightGuard::acquire(self) {
            Some(guard) => guard,
            None => {
                tracing::debug!("Rejected submit, previous submission still in flight");
                return Err(WriteError::InFlight);
            }
        };

        let mut attempt: u32 = 0;
        loop {
            self.attempt.store(attempt, Ordering::Release);

            match write_fn(payload.clone()).await {
                Ok(()) => {
                    let sync = match self.coordinator.wait_for_sync().await {
                        Ok(()) => SyncStatus::Confirmed,
                        Err(e) => {
                            tracing::warn!("Write saved locally but not synced: {}", e);
                            SyncStatus::Pending(e)
                        }
                    };
                    return Ok(WriteOutcome {
                        attempts: attempt + 1,
                        sync,
                    });
                }
                Err(e) => {
                    let record = classify(&e);
                    if self.policy.should_retry(record.kind) && attempt < self.policy.max_retries {
                        let delay = self.policy.backoff.delay(attempt);
                        tracing::warn!(
                            attempt = attempt + 1,
                            kind = %record.kind,
                            "Write failed, retrying in {}ms",
                            delay.as_millis()
                        );
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                        continue;
                    }

                    tracing::error!(
                        attempts = attempt + 1,
                        kind = %record.kind,
                        "Write failed: {}",
                        e
                    );
                    return Err(WriteError::Failed {
                        record,
                        attempts: attempt + 1,
                    });
                }
            }
        }
    }

    /// Validates a record change and writes it to the store.
    pub async fn write_change(&self, change: RecordChange) -> Result<WriteOutcome, WriteError> {
        change.validate()?;
        let store = Arc::clone(&self.store);
        self.submit(
            move |change: RecordChange| {
                let store = Arc::clone(&store);
                async move { store.apply(&change).await }
            },
            change,
        )
        .await
    }
}

struct InFlightGuard<'a> {
    writer: &'a RetryingWriter,
}

impl<'a> InFlightGuard<'a> {
    fn acquire(writer: &'a RetryingWriter) -> Option<Self> {
        writer
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { writer })
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.writer.attempt.store(0, Ordering::Release);
        self.writer.in_flight.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connectivity::ConnectivityMonitor;
    use crate::models::{Record, Sponsor, SponsorTier};
    use crate::testing::{Script, ScriptedStore};
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;
    use tokio::time::Instant;

    fn writer_with(
        store: &Arc<ScriptedStore>,
        online: bool,
        settings: SyncSettings,
    ) -> RetryingWriter {
        let store: Arc<dyn DocumentStore> = store.clone();
        let monitor = ConnectivityMonitor::new(store.clone(), online, &settings);
        let coordinator = SyncCoordinator::new(monitor, store.clone());
        RetryingWriter::new(coordinator, store, RetryPolicy::from_settings(&settings))
    }

    fn writer(store: &Arc<ScriptedStore>) -> RetryingWriter {
        writer_with(store, true, SyncSettings::default())
    }

    /// Write function that consults the store's `write` script.
    fn scripted(
        store: &Arc<ScriptedStore>,
    ) -> impl FnMut(u32) -> std::future::Ready<Result<(), StoreError>> {
        let store = store.clone();
        move |_payload| std::future::ready(store.write.next())
    }

    #[tokio::test(start_paused = true)]
    async fn test_unavailable_twice_then_success() {
        let store = Arc::new(ScriptedStore {
            write: Script::ok().then_fail("unavailable", 2),
            ..Default::default()
        });
        let writer = writer(&store);

        let outcome = writer.submit(scripted(&store), 7).await.unwrap();

        assert_eq!(outcome.attempts, 3);
        assert_eq!(outcome.sync, SyncStatus::Confirmed);
        assert_eq!(store.write.calls(), 3);
        assert_eq!(store.flush.calls(), 1);

        let times = store.write.times();
        let first_gap = times[1] - times[0];
        let second_gap = times[2] - times[1];
        assert!(first_gap >= Duration::from_millis(1000));
        assert!(first_gap < Duration::from_millis(1010));
        assert!(second_gap >= Duration::from_millis(2000));
        assert!(second_gap < Duration::from_millis(2010));
    }

    #[tokio::test(start_paused = true)]
    async fn test_permission_denied_is_terminal() {
        let store = Arc::new(ScriptedStore {
            write: Script::failing("permission-denied"),
            ..Default::default()
        });
        let writer = writer(&store);
        let started = Instant::now();

        let err = writer.submit(scripted(&store), 1).await.unwrap_err();

        assert_eq!(store.write.calls(), 1);
        assert_eq!(store.flush.calls(), 0);
        assert_eq!(started.elapsed(), Duration::ZERO);
        assert_eq!(err.record().map(|r| r.kind), Some(ErrorKind::PermissionDenied));
        assert_eq!(err.to_string(), ErrorKind::PermissionDenied.message());
        assert!(!writer.is_in_flight());
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_are_bounded() {
        let store = Arc::new(ScriptedStore {
            write: Script::failing("unavailable"),
            ..Default::default()
        });
        let writer = writer(&store);
        let started = Instant::now();

        let err = writer.submit(scripted(&store), 1).await.unwrap_err();

        // One initial attempt plus three retries: 1s + 2s + 4s of backoff.
        assert_eq!(store.write.calls(), 4);
        assert!(started.elapsed() >= Duration::from_secs(7));
        match err {
            WriteError::Failed { record, attempts } => {
                assert_eq!(record.kind, ErrorKind::Unavailable);
                assert_eq!(attempts, 4);
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_is_retried() {
        let store = Arc::new(ScriptedStore {
            write: Script::ok().then_fail("cancelled", 1),
            ..Default::default()
        });
        let writer = writer(&store);

        let outcome = writer.submit(scripted(&store), 1).await.unwrap();
        assert_eq!(outcome.attempts, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_resource_exhausted_retry_is_opt_in() {
        let store = Arc::new(ScriptedStore {
            write: Script::ok().then_fail("resource-exhausted", 1),
            ..Default::default()
        });
        let err = writer(&store).submit(scripted(&store), 1).await.unwrap_err();
        assert_eq!(err.record().map(|r| r.kind), Some(ErrorKind::ResourceExhausted));
        assert_eq!(store.write.calls(), 1);

        let store = Arc::new(ScriptedStore {
            write: Script::ok().then_fail("resource-exhausted", 1),
            ..Default::default()
        });
        let settings = SyncSettings {
            retry_resource_exhausted: true,
            ..Default::default()
        };
        let outcome = writer_with(&store, true, settings)
            .submit(scripted(&store), 1)
            .await
            .unwrap();
        assert_eq!(outcome.attempts, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_submit_rejected() {
        let store = Arc::new(ScriptedStore::default());
        let writer = writer(&store);
        let gate = Arc::new(tokio::sync::Notify::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let first = {
            let writer = writer.clone();
            let gate = gate.clone();
            let calls = calls.clone();
            tokio::spawn(async move {
                writer
                    .submit(
                        move |_payload: u32| {
                            calls.fetch_add(1, Ordering::SeqCst);
                            let gate = gate.clone();
                            async move {
                                gate.notified().await;
                                Ok(())
                            }
                        },
                        1,
                    )
                    .await
            })
        };

        tokio::time::sleep(Duration::from_millis(1)).await;
        assert!(writer.is_in_flight());

        let second_calls = calls.clone();
        let second = writer
            .submit(
                move |_payload: u32| {
                    second_calls.fetch_add(1, Ordering::SeqCst);
                    std::future::ready(Ok(()))
                },
                2,
            )
            .await;
        assert_eq!(second, Err(WriteError::InFlight));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        gate.notify_one();
        let outcome = first.await.unwrap().unwrap();
        assert_eq!(outcome.attempts, 1);
        assert!(!writer.is_in_flight());
    }

    #[tokio::test(start_paused = true)]
    async fn test_flag_released_after_terminal_failure() {
        let store = Arc::new(ScriptedStore {
            write: Script::ok().then_fail("not-found", 1),
            ..Default::default()
        });
        let writer = writer(&store);

        assert!(writer.submit(scripted(&store), 1).await.is_err());
        assert!(!writer.is_in_flight());
        assert!(writer.submit(scripted(&store), 1).await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_offline_success_is_pending() {
        let store = Arc::new(ScriptedStore::default());
        let writer = writer_with(&store, false, SyncSettings::default());

        let outcome = writer.submit(scripted(&store), 1).await.unwrap();

        assert_eq!(outcome.sync, SyncStatus::Pending(SyncError::Unavailable));
        assert!(outcome.sync.warning().is_some());
        assert_eq!(store.flush.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_failure_does_not_fail_write() {
        let store = Arc::new(ScriptedStore {
            flush: Script::failing("unavailable"),
            ..Default::default()
        });
        let writer = writer(&store);

        let outcome = writer.submit(scripted(&store), 1).await.unwrap();

        assert!(matches!(outcome.sync, SyncStatus::Pending(SyncError::Flush(_))));
        assert_eq!(store.write.calls(), 1);
        assert_eq!(store.flush.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_write_change_validates_first() {
        let store = Arc::new(ScriptedStore::default());
        let writer = writer(&store);

        let bad = Sponsor::new("", SponsorTier::Gold);
        let err = writer
            .write_change(RecordChange::Upsert(Record::Sponsor(bad)))
            .await
            .unwrap_err();
        assert!(matches!(err, WriteError::Invalid(_)));
        assert_eq!(store.write.calls(), 0);

        let good = Sponsor::new("Ace", SponsorTier::Gold);
        let outcome = writer
            .write_change(RecordChange::Upsert(Record::Sponsor(good)))
            .await
            .unwrap();
        assert!(outcome.sync.is_confirmed());
        assert_eq!(store.write.calls(), 1);
    }
}
