//! Tourney Core Library
//!
//! Client-side sync layer for the tournament app: connectivity tracking,
//! pending-write flushing and retrying writes against a document store,
//! plus the typed records those writes carry.

pub mod backoff;
pub mod connectivity;
pub mod context;
pub mod coordinator;
pub mod error;
pub mod models;
pub mod notify;
pub mod registration;
pub mod settings;
pub mod store;
pub mod writer;

#[cfg(test)]
mod testing;

pub use backoff::Backoff;
pub use connectivity::{ConnectionPhase, ConnectivityMonitor, ConnectivityState, Subscription};
pub use context::SyncContext;
pub use coordinator::{SyncCoordinator, SyncError};
pub use error::{classify, ErrorKind, ErrorRecord, StoreError};
pub use models::{
    AgeGroupSpots, Announcement, Collection, Division, PaymentStatus, PickUpPlayer, Priority,
    Record, RecordChange, Registration, ResultFormat, SkillLevel, Sponsor, SponsorTier, SportKind,
    Team, Tournament, TournamentResult, ValidationError,
};
pub use notify::{LogNotifier, Notice, Notifier, NotifyError, RegistrationDetails};
pub use registration::{RegistrationOutcome, RegistrationService};
pub use settings::SyncSettings;
pub use store::{DocumentStore, MemoryStore};
pub use writer::{RetryPolicy, RetryingWriter, SyncStatus, WriteError, WriteOutcome};

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
