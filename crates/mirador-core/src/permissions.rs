//! Reloads the permissions file into the tree when it changes.
//!
//! The file is polled by modification time. A file that cannot be read or
//! parsed leaves the previously published document in place.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::dashboard::Dashboard;
use crate::sync::SyncError;

/// Result of one poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// The file is unchanged since the last poll.
    Unchanged,
    /// The file changed and was published.
    Reloaded,
    /// The file changed but could not be read or parsed.
    Rejected,
    /// The file does not exist.
    Missing,
}

/// Watches one permissions file.
#[derive(Debug)]
pub struct PermissionsWatcher {
    path: PathBuf,
    last_modified: Option<SystemTime>,
}

impl PermissionsWatcher {
    /// Watch `path`. The first poll always loads the file.
    pub const fn new(path: PathBuf) -> Self {
        Self {
            path,
            last_modified: None,
        }
    }

    /// The watched file.
    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    /// Check the file and publish it if it changed.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError`] only if the tree rejects the write.
    pub async fn poll(&mut self, dashboard: &Dashboard) -> Result<PollOutcome, SyncError> {
        let modified = match std::fs::metadata(&self.path).and_then(|m| m.modified()) {
            Ok(modified) => modified,
            Err(error) => {
                if self.last_modified.take().is_some() {
                    warn!(path = %self.path.display(), %error, "permissions file disappeared");
                }
                return Ok(PollOutcome::Missing);
            }
        };
        if self.last_modified == Some(modified) {
            return Ok(PollOutcome::Unchanged);
        }
        self.last_modified = Some(modified);

        let document = std::fs::read_to_string(&self.path)
            .map_err(|error| error.to_string())
            .and_then(|text| {
                serde_json::from_str::<Value>(&text).map_err(|error| error.to_string())
            });
        match document {
            Ok(document) => {
                dashboard.set_permissions(document).await?;
                info!(path = %self.path.display(), "permissions reloaded");
                Ok(PollOutcome::Reloaded)
            }
            Err(error) => {
                warn!(path = %self.path.display(), %error, "ignoring unreadable permissions file");
                Ok(PollOutcome::Rejected)
            }
        }
    }

    /// Poll every `interval`, forever.
    pub async fn run(mut self, dashboard: Arc<Dashboard>, interval: Duration) {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            match self.poll(&dashboard).await {
                Ok(outcome) => debug!(?outcome, "permissions polled"),
                Err(error) => warn!(%error, "failed to publish permissions"),
            }
        }
    }
}
