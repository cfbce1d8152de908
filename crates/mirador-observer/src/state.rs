//! Shared application state for the dashboard server.

use std::sync::Arc;

use mirador_core::config::AccountConfig;
use mirador_core::{Dashboard, PanelConfig, ServerControl, SyncService};

/// Shared state for the Axum application.
///
/// Wrapped in [`Arc`] and injected via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    /// The dashboard model and its sync service.
    pub dashboard: Arc<Dashboard>,
    /// The game server boundary.
    pub control: Arc<dyn ServerControl>,
    /// The one account allowed to log in.
    pub account: AccountConfig,
    /// Sender name for chat lines typed in the dashboard.
    pub chat_name: String,
}

impl AppState {
    /// Assemble the state from its parts.
    pub fn new(
        dashboard: Arc<Dashboard>,
        control: Arc<dyn ServerControl>,
        config: &PanelConfig,
    ) -> Self {
        Self {
            dashboard,
            control,
            account: config.account.clone(),
            chat_name: config.chat_name.clone(),
        }
    }

    /// The sync service behind the dashboard.
    pub fn sync(&self) -> &SyncService {
        self.dashboard.sync()
    }
}

impl core::fmt::Debug for AppState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AppState")
            .field("account", &self.account)
            .field("chat_name", &self.chat_name)
            .finish_non_exhaustive()
    }
}
