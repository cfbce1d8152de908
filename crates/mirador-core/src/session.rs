//! Per-connection session state machine.
//!
//! A dashboard connection moves `Connected -> Authenticated -> Synced ->
//! Disconnected`. Only an authenticated session may subscribe, and it
//! subscribes exactly once: [`Session::bootstrap`] attaches to the
//! [`SyncService`], which queues the full snapshot before any patch.

use mirador_types::{ServerEvent, SessionId, SubscriberId};
use tracing::{debug, info, warn};

use crate::config::AccountConfig;
use crate::sync::{Subscription, SyncService};

/// Lifecycle phase of one dashboard connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Socket open, not yet logged in. Only a login is accepted.
    Connected,
    /// Credentials accepted, not yet subscribed.
    Authenticated,
    /// Snapshot queued and receiving the patch stream.
    Synced,
    /// Socket closed and subscriber removed.
    Disconnected,
}

impl core::fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let name = match self {
            Self::Connected => "connected",
            Self::Authenticated => "authenticated",
            Self::Synced => "synced",
            Self::Disconnected => "disconnected",
        };
        f.write_str(name)
    }
}

/// Errors from session transitions.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// Username or password did not match the configured account.
    #[error("invalid username or password")]
    InvalidCredentials,

    /// The requested step is not valid from the current phase.
    #[error("cannot {action} while {phase}")]
    InvalidTransition {
        /// The attempted step.
        action: &'static str,
        /// The phase the session was in.
        phase: SessionPhase,
    },
}

/// One dashboard connection.
#[derive(Debug)]
pub struct Session {
    id: SessionId,
    phase: SessionPhase,
    subscriber: Option<SubscriberId>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    /// Start a session in the `Connected` phase.
    pub fn new() -> Self {
        Self {
            id: SessionId::new(),
            phase: SessionPhase::Connected,
            subscriber: None,
        }
    }

    /// The session's identifier.
    pub const fn id(&self) -> SessionId {
        self.id
    }

    /// The current phase.
    pub const fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// The fan-out registration, once synced.
    pub const fn subscriber(&self) -> Option<SubscriberId> {
        self.subscriber
    }

    /// Check credentials and move to `Authenticated`.
    ///
    /// A failed check leaves the session `Connected`.
    ///
    /// # Errors
    ///
    /// - [`SessionError::InvalidCredentials`] if the account does not match.
    /// - [`SessionError::InvalidTransition`] if the session is past
    ///   `Connected` (repeated logins are not re-processed).
    pub fn authenticate(
        &mut self,
        account: &AccountConfig,
        username: &str,
        password: &str,
    ) -> Result<(), SessionError> {
        if self.phase != SessionPhase::Connected {
            return Err(SessionError::InvalidTransition {
                action: "log in",
                phase: self.phase,
            });
        }
        if !account.matches(username, password) {
            warn!(session = %self.id, username, "login rejected");
            return Err(SessionError::InvalidCredentials);
        }
        self.phase = SessionPhase::Authenticated;
        info!(session = %self.id, username, "login accepted");
        Ok(())
    }

    /// Subscribe to the patch stream and move to `Synced`.
    ///
    /// The returned subscription yields the snapshot, then a
    /// resource-usage notice so charts render on first paint, then every
    /// later patch. All three are ordered under one tree lock.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::InvalidTransition`] unless the session is
    /// `Authenticated`.
    pub async fn bootstrap(&mut self, sync: &SyncService) -> Result<Subscription, SessionError> {
        if self.phase != SessionPhase::Authenticated {
            return Err(SessionError::InvalidTransition {
                action: "subscribe",
                phase: self.phase,
            });
        }
        let subscription = sync
            .attach_with(Some(ServerEvent::UpdateResourceUsage))
            .await;
        self.subscriber = Some(subscription.id);
        self.phase = SessionPhase::Synced;
        debug!(session = %self.id, subscriber = %subscription.id, "session synced");
        Ok(subscription)
    }

    /// Drop the subscription and return to `Connected`, so the client
    /// can log in again after the server logged everyone out.
    pub async fn logout(&mut self, sync: &SyncService) {
        if let Some(id) = self.subscriber.take() {
            sync.detach(id).await;
        }
        if self.phase != SessionPhase::Disconnected {
            debug!(session = %self.id, from = %self.phase, "session logged out");
            self.phase = SessionPhase::Connected;
        }
    }

    /// Remove the subscriber (if any) and move to `Disconnected`.
    pub async fn disconnect(&mut self, sync: &SyncService) {
        if let Some(id) = self.subscriber.take() {
            sync.detach(id).await;
        }
        if self.phase != SessionPhase::Disconnected {
            debug!(session = %self.id, from = %self.phase, "session disconnected");
        }
        self.phase = SessionPhase::Disconnected;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use mirador_types::{path, Patch};
    use serde_json::json;

    use super::*;

    fn account() -> AccountConfig {
        AccountConfig {
            username: String::from("admin"),
            password: String::from("secret"),
        }
    }

    #[test]
    fn bad_credentials_stay_connected() {
        let mut session = Session::new();
        let result = session.authenticate(&account(), "admin", "nope");
        assert_eq!(result, Err(SessionError::InvalidCredentials));
        assert_eq!(session.phase(), SessionPhase::Connected);

        session.authenticate(&account(), "admin", "secret").unwrap();
        assert_eq!(session.phase(), SessionPhase::Authenticated);
    }

    #[tokio::test]
    async fn cannot_subscribe_before_login() {
        let sync = SyncService::new(json!({})).unwrap();
        let mut session = Session::new();
        let result = session.bootstrap(&sync).await;
        assert!(matches!(
            result,
            Err(SessionError::InvalidTransition {
                phase: SessionPhase::Connected,
                ..
            })
        ));
        assert_eq!(sync.subscriber_count().await, 0);
    }

    #[tokio::test]
    async fn bootstrap_queues_snapshot_then_usage_notice() {
        let sync = SyncService::new(json!({"status": 0})).unwrap();
        let mut session = Session::new();
        session.authenticate(&account(), "admin", "secret").unwrap();
        let mut sub = session.bootstrap(&sync).await.unwrap();
        sync.set(&path!["status"], 1).await.unwrap();

        assert_eq!(session.phase(), SessionPhase::Synced);
        let first = sub.rx.recv().await.unwrap();
        assert_eq!(*first, ServerEvent::Sync(Patch::snapshot(json!({"status": 0}))));
        let second = sub.rx.recv().await.unwrap();
        assert_eq!(*second, ServerEvent::UpdateResourceUsage);
        let third = sub.rx.recv().await.unwrap();
        assert_eq!(*third, ServerEvent::Sync(Patch::set(path!["status"], json!(1))));
    }

    #[tokio::test]
    async fn repeated_login_is_rejected_without_resubscribing() {
        let sync = SyncService::new(json!({})).unwrap();
        let mut session = Session::new();
        session.authenticate(&account(), "admin", "secret").unwrap();
        let _sub = session.bootstrap(&sync).await.unwrap();

        let again = session.authenticate(&account(), "admin", "secret");
        assert!(matches!(again, Err(SessionError::InvalidTransition { .. })));
        assert!(session.bootstrap(&sync).await.is_err());
        assert_eq!(sync.subscriber_count().await, 1);
    }

    #[tokio::test]
    async fn disconnect_detaches() {
        let sync = SyncService::new(json!({})).unwrap();
        let mut session = Session::new();
        session.authenticate(&account(), "admin", "secret").unwrap();
        let _sub = session.bootstrap(&sync).await.unwrap();

        session.disconnect(&sync).await;
        assert_eq!(session.phase(), SessionPhase::Disconnected);
        assert_eq!(session.subscriber(), None);
        assert_eq!(sync.subscriber_count().await, 0);
    }

    #[tokio::test]
    async fn logout_allows_a_fresh_login() {
        let sync = SyncService::new(json!({})).unwrap();
        let mut session = Session::new();
        session.authenticate(&account(), "admin", "secret").unwrap();
        let _sub = session.bootstrap(&sync).await.unwrap();

        session.logout(&sync).await;
        assert_eq!(session.phase(), SessionPhase::Connected);
        assert_eq!(sync.subscriber_count().await, 0);

        session.authenticate(&account(), "admin", "secret").unwrap();
        let _sub = session.bootstrap(&sync).await.unwrap();
        assert_eq!(sync.subscriber_count().await, 1);
    }
}
