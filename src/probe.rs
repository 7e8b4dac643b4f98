//! Platform connectivity signals, derived by polling the server's health
//! endpoint.

use std::time::Duration;
use tourney_core::ConnectivityMonitor;

const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Returns true if the server answers `GET /health` with a success status.
pub async fn check_server(url: &str) -> bool {
    let client = match reqwest::Client::builder().timeout(PROBE_TIMEOUT).build() {
        Ok(client) => client,
        Err(e) => {
            tracing::warn!("Failed to build probe client: {}", e);
            return false;
        }
    };
    let health_url = format!("{}/health", url.trim_end_matches('/'));

    match client.get(&health_url).send().await {
        Ok(response) => response.status().is_success(),
        Err(e) => {
            tracing::debug!(url = %health_url, "Health probe failed: {}", e);
            false
        }
    }
}

/// Polls the server and feeds online/offline signals to a monitor.
pub struct HealthProbe {
    url: String,
    interval: Duration,
    last: Option<bool>,
}

impl HealthProbe {
    pub fn new(url: impl Into<String>, interval: Duration) -> Self {
        Self {
            url: url.into(),
            interval,
            last: None,
        }
    }

    /// Records one observation; signals the monitor only when it differs
    /// from the previous one. Returns whether a signal was delivered.
    pub fn observe(&mut self, online: bool, monitor: &ConnectivityMonitor) -> bool {
        if self.last == Some(online) {
            return false;
        }
        self.last = Some(online);
        if online {
            monitor.handle_online();
        } else {
            monitor.handle_offline();
        }
        true
    }

    /// Probes forever. Cancel by dropping the future.
    pub async fn run(mut self, monitor: ConnectivityMonitor) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let online = check_server(&self.url).await;
            if self.observe(online, &monitor) {
                tracing::info!(online, url = %self.url, "Connectivity changed");
            }
        }
    }
}
