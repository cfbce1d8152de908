//! `WebSocket` handler for dashboard sessions.
//!
//! Clients connect to `GET /ws` and log in. On success the socket
//! receives `login`, an optional success toast, the full state snapshot,
//! an `update_resource_usage` notice, and then every patch in order.
//! Requests arriving on the socket are handed to [`commands::dispatch`].
//!
//! A `logout` event returns the socket to the login step; the client
//! logs in again and receives a fresh snapshot.
//!
//! A slow client never holds back others: its queue grows until it
//! catches up or disconnects.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use mirador_core::sync::Outbound;
use mirador_core::{Session, SessionError, SessionPhase, Subscription};
use mirador_types::{ClientRequest, ServerEvent, ToastLevel};
use tracing::{debug, warn};

use crate::commands;
use crate::state::AppState;

/// Upgrade an HTTP request to a `WebSocket` dashboard session.
///
/// # Route
///
/// `GET /ws`
pub async fn ws_session(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_ws(socket, state))
}

/// Serialize and send one event. Returns `false` if the socket is gone.
async fn send_event(socket: &mut WebSocket, event: &ServerEvent) -> bool {
    let json = match serde_json::to_string(event) {
        Ok(j) => j,
        Err(e) => {
            warn!("Failed to serialize server event: {e}");
            return true;
        }
    };
    socket.send(Message::Text(json.into())).await.is_ok()
}

/// Wait for the next queued event, or forever before the session syncs.
async fn next_event(subscription: Option<&mut Subscription>) -> Option<Outbound> {
    match subscription {
        Some(sub) => sub.rx.recv().await,
        None => std::future::pending().await,
    }
}

/// What the socket loop should do after a client frame.
enum Flow {
    Continue,
    Close,
}

/// Handle the `WebSocket` lifecycle from accept to close.
async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>) {
    let mut session = Session::new();
    let mut subscription: Option<Subscription> = None;
    debug!(session = %session.id(), "WebSocket client connected");

    loop {
        tokio::select! {
            event = next_event(subscription.as_mut()) => {
                let Some(event) = event else {
                    debug!(session = %session.id(), "subscriber queue closed");
                    break;
                };
                if !send_event(&mut socket, &event).await {
                    debug!(session = %session.id(), "WebSocket client disconnected (send failed)");
                    break;
                }
                if matches!(*event, ServerEvent::Logout) {
                    session.logout(state.sync()).await;
                    subscription = None;
                }
            }
            msg = socket.recv() => {
                let flow = match msg {
                    Some(Ok(Message::Text(text))) => {
                        on_text(&mut socket, &state, &mut session, &mut subscription, text.as_str()).await
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if socket.send(Message::Pong(data)).await.is_err() {
                            Flow::Close
                        } else {
                            Flow::Continue
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => Flow::Close,
                    Some(Err(e)) => {
                        debug!(session = %session.id(), "WebSocket error: {e}");
                        Flow::Close
                    }
                    Some(Ok(_)) => Flow::Continue,
                };
                if matches!(flow, Flow::Close) {
                    break;
                }
            }
        }
    }

    session.disconnect(state.sync()).await;
    debug!(session = %session.id(), "WebSocket client disconnected");
}

async fn on_text(
    socket: &mut WebSocket,
    state: &Arc<AppState>,
    session: &mut Session,
    subscription: &mut Option<Subscription>,
    text: &str,
) -> Flow {
    let request: ClientRequest = match serde_json::from_str(text) {
        Ok(request) => request,
        Err(e) => {
            debug!(session = %session.id(), "ignoring malformed request: {e}");
            return Flow::Continue;
        }
    };

    match (session.phase(), request) {
        (
            SessionPhase::Connected,
            ClientRequest::Login {
                username,
                password,
                silent,
            },
        ) => login(socket, state, session, subscription, &username, &password, silent).await,
        (SessionPhase::Synced, request) => {
            let Some(from) = session.subscriber() else {
                return Flow::Continue;
            };
            if let Err(e) = commands::dispatch(state, from, request).await {
                warn!(session = %session.id(), "request failed: {e}");
            }
            Flow::Continue
        }
        (phase, request) => {
            debug!(session = %session.id(), %phase, request = request.name(), "ignoring request");
            Flow::Continue
        }
    }
}

async fn login(
    socket: &mut WebSocket,
    state: &Arc<AppState>,
    session: &mut Session,
    subscription: &mut Option<Subscription>,
    username: &str,
    password: &str,
    silent: bool,
) -> Flow {
    match session.authenticate(&state.account, username, password) {
        Ok(()) => {}
        Err(SessionError::InvalidCredentials) => {
            let toast = ServerEvent::toast("Invalid username or password.", ToastLevel::Danger);
            return if send_event(socket, &toast).await {
                Flow::Continue
            } else {
                Flow::Close
            };
        }
        Err(e) => {
            debug!(session = %session.id(), "login ignored: {e}");
            return Flow::Continue;
        }
    }

    if !send_event(socket, &ServerEvent::Login).await {
        return Flow::Close;
    }
    if !silent {
        let toast = ServerEvent::toast("Logged in successfully.", ToastLevel::Success);
        if !send_event(socket, &toast).await {
            return Flow::Close;
        }
    }

    let refresh = Arc::clone(state);
    tokio::spawn(async move {
        if let Err(e) = refresh
            .dashboard
            .refresh_online_plugins(refresh.control.as_ref())
            .await
        {
            warn!("failed to refresh the plugin catalogue: {e}");
        }
    });

    match session.bootstrap(state.sync()).await {
        Ok(sub) => {
            *subscription = Some(sub);
            Flow::Continue
        }
        Err(e) => {
            warn!(session = %session.id(), "bootstrap failed: {e}");
            Flow::Close
        }
    }
}
