mod config_cmd;
mod record;
mod register;
mod sync_cmd;

pub use config_cmd::ConfigCommand;
pub use record::RecordCommand;
pub use register::RegisterCommand;
pub use sync_cmd::{StatusCommand, SyncCommand, WatchCommand};

use std::sync::Arc;
use tourney::config::Config;
use tourney::probe::check_server;
use tourney::remote::HttpDocumentStore;
use tourney_core::{SyncContext, WriteOutcome};

/// A connected sync layer for one command invocation.
pub struct Session {
    pub store: Arc<HttpDocumentStore>,
    pub ctx: SyncContext,
}

/// Builds the store and sync context, seeding connectivity from a probe.
pub async fn connect(config: &Config) -> Result<Session, Box<dyn std::error::Error>> {
    let store = Arc::new(HttpDocumentStore::from_config(config)?);
    let online = check_server(store.base_url()).await;
    if !online {
        tracing::info!(url = store.base_url(), "Server unreachable, working offline");
    }

    let ctx = SyncContext::new(store.clone(), online, config.sync.clone());
    Ok(Session { store, ctx })
}

pub fn print_outcome(what: &str, outcome: &WriteOutcome) {
    match outcome.sync.warning() {
        None => println!("✓ {}", what),
        Some(warning) => {
            println!("✓ {} (saved locally)", what);
            println!("  {}", warning);
        }
    }
    if outcome.attempts > 1 {
        println!("  (succeeded after {} attempts)", outcome.attempts);
    }
}
