//! Connectivity and sync commands.

use clap::Args;
use std::time::Duration;

use tourney::config::Config;
use tourney::probe::{check_server, HealthProbe};
use tourney::remote::{HttpDocumentStore, OutboxOp};
use tourney_core::SyncError;

use super::connect;

/// Show server reachability and queued writes
#[derive(Args)]
pub struct StatusCommand {}

impl StatusCommand {
    pub async fn run(&self, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
        if !config.server.is_configured() {
            println!("Status: Not configured");
            println!();
            println!("To connect, add to your config file:");
            println!();
            println!("  server:");
            println!("    server_url: \"http://localhost:8080\"");
            println!("    api_key: \"your-api-key\"");
            println!();
            println!("Or set environment variables:");
            println!("  TOURNEY_SERVER_URL");
            println!("  TOURNEY_API_KEY");
            return Ok(());
        }

        let store = HttpDocumentStore::from_config(config)?;
        println!("Server: {}", store.base_url());
        if check_server(store.base_url()).await {
            println!("Status: ✓ online");
        } else {
            println!("Status: ✗ offline");
        }
        println!();

        let pending = store.pending()?;
        if pending.is_empty() {
            println!("No queued writes.");
            return Ok(());
        }

        println!("Queued writes ({}):", pending.len());
        for entry in pending {
            let op = match entry.op {
                OutboxOp::Put(_) => "put",
                OutboxOp::Delete => "delete",
            };
            println!(
                "  {:<6} {}/{}  queued {}",
                op,
                entry.collection,
                entry.id,
                entry.queued_at.format("%Y-%m-%d %H:%M:%S")
            );
        }
        Ok(())
    }
}

/// Push queued writes to the server
#[derive(Args)]
pub struct SyncCommand {}

impl SyncCommand {
    pub async fn run(&self, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
        let session = connect(config).await?;
        let queued = session.store.pending_count()?;

        match session.ctx.coordinator().wait_for_sync().await {
            Ok(()) => {
                if queued == 0 {
                    println!("Already up to date.");
                } else {
                    println!("✓ Synced {} queued write(s).", queued);
                }
                Ok(())
            }
            Err(SyncError::Unavailable) => {
                println!("{} queued write(s) kept for later.", queued);
                Err(SyncError::Unavailable.into())
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Watch connectivity until interrupted
#[derive(Args)]
pub struct WatchCommand {
    /// Seconds between probes (default from config)
    #[arg(long)]
    interval: Option<u64>,
}

impl WatchCommand {
    pub async fn run(&self, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
        let session = connect(config).await?;
        let monitor = session.ctx.monitor().clone();
        let secs = self.interval.unwrap_or(config.probe_interval_secs).max(1);
        let interval = Duration::from_secs(secs);

        println!(
            "Watching {} every {}s (Ctrl-C to stop)",
            session.store.base_url(),
            interval.as_secs()
        );
        println!("{}", describe(monitor.current_state()));

        let subscription = monitor.subscribe(|online| println!("{}", describe(online)));
        let probe = HealthProbe::new(session.store.base_url(), interval);

        tokio::select! {
            _ = probe.run(monitor.clone()) => {}
            result = tokio::signal::ctrl_c() => result?,
        }

        subscription.unsubscribe();
        Ok(())
    }
}

fn describe(online: bool) -> &'static str {
    if online {
        "● online"
    } else {
        "○ offline"
    }
}
