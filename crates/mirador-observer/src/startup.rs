//! Dashboard server startup helper for embedding in the panel binary.
//!
//! Provides [`spawn_observer`] which binds the listening socket eagerly
//! and then serves on a background Tokio task, so a port conflict is
//! reported to the caller instead of only being logged.

use std::future::Future;
use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::server::{self, ServerConfig, ServerError};
use crate::state::AppState;

/// Bind and spawn the dashboard server.
///
/// The returned handle completes once `shutdown` resolves and open
/// connections have drained.
///
/// # Errors
///
/// Returns [`ServerError::Bind`] if the address cannot be bound.
pub async fn spawn_observer<F>(
    config: &ServerConfig,
    state: Arc<AppState>,
    shutdown: F,
) -> Result<JoinHandle<()>, ServerError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = server::bind(config).await?;

    let handle = tokio::spawn(async move {
        if let Err(e) = server::serve(listener, state, shutdown).await {
            tracing::error!(error = %e, "Dashboard server exited with error");
        }
    });

    tracing::info!(port = config.port, "Dashboard server spawned on background task");

    Ok(handle)
}
