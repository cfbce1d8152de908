//! Periodic status refresh: uptime and watched-player details.

use std::sync::Arc;
use std::time::Duration;

use mirador_core::{Dashboard, ServerControl, SyncError};
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Refreshes `server.uptime` and every watched player's game info.
pub struct StatusTicker {
    control: Arc<dyn ServerControl>,
    online_since: watch::Receiver<Instant>,
}

impl StatusTicker {
    /// Create a ticker measuring uptime from the latest value of
    /// `online_since`.
    pub fn new(control: Arc<dyn ServerControl>, online_since: watch::Receiver<Instant>) -> Self {
        Self {
            control,
            online_since,
        }
    }

    /// Run one refresh. Returns the number of watched players updated.
    ///
    /// # Errors
    ///
    /// Returns a [`SyncError`] if the tree rejects an update.
    pub async fn tick(&self, dashboard: &Dashboard) -> Result<usize, SyncError> {
        let since = *self.online_since.borrow();
        let uptime = u64::try_from(since.elapsed().as_millis()).unwrap_or(u64::MAX);
        dashboard.set_uptime(uptime).await?;
        dashboard.refresh_watched(self.control.as_ref()).await
    }

    /// Tick every `interval`, forever.
    pub async fn run(self, dashboard: Arc<Dashboard>, interval: Duration) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            match self.tick(&dashboard).await {
                Ok(refreshed) => debug!(refreshed, "status refreshed"),
                Err(error) => warn!(%error, "failed to refresh status"),
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use mirador_core::{HostInfo, PanelConfig};

    use super::*;
    use crate::standalone::StandaloneControl;

    #[tokio::test(start_paused = true)]
    async fn uptime_counts_from_the_latest_start() {
        let dashboard = Dashboard::new(&PanelConfig::default(), &HostInfo::probe()).unwrap();
        let (control, _, _) = StandaloneControl::channel();
        let (started, online_since) = watch::channel(Instant::now());
        let ticker = StatusTicker::new(Arc::new(control), online_since);

        tokio::time::advance(Duration::from_millis(1500)).await;
        assert_eq!(ticker.tick(&dashboard).await.unwrap(), 0);
        let uptime = dashboard.sync().get(&mirador_types::path!["server", "uptime"]).await;
        assert_eq!(uptime, Some(serde_json::json!(1500)));

        started.send_replace(Instant::now());
        tokio::time::advance(Duration::from_millis(200)).await;
        ticker.tick(&dashboard).await.unwrap();
        let uptime = dashboard.sync().get(&mirador_types::path!["server", "uptime"]).await;
        assert_eq!(uptime, Some(serde_json::json!(200)));
    }
}
