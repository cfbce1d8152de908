//! End-to-end tests for the dashboard socket.
//!
//! Each test serves the real router on an ephemeral port and drives it
//! with a `tokio-tungstenite` client, so the login handshake, the frame
//! order after login and the logout round trip are checked on the wire.

#![allow(clippy::unwrap_used)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::{SinkExt as _, StreamExt as _};
use mirador_core::control::{ControlError, GameInfo};
use mirador_core::{Dashboard, HostInfo, PanelConfig, ServerControl};
use mirador_observer::server;
use mirador_observer::{AppState, ServerConfig};
use mirador_types::{path, ClientRequest, Patch, PluginUpdate, ServerEvent, ToastLevel};
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Records console commands and refuses everything else.
#[derive(Default)]
struct Recorder {
    commands: Mutex<Vec<String>>,
}

impl Recorder {
    fn commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }
}

impl ServerControl for Recorder {
    fn execute_command(&self, command: &str) -> Result<(), ControlError> {
        self.commands.lock().unwrap().push(command.to_owned());
        Ok(())
    }
    fn broadcast_chat(&self, _: &str, _: &str) -> Result<(), ControlError> {
        Err(ControlError::Unsupported("chat"))
    }
    fn kick_player(&self, uuid: &str, _: Option<&str>) -> Result<String, ControlError> {
        Err(ControlError::PlayerNotFound {
            uuid: uuid.to_owned(),
        })
    }
    fn set_game_rule(&self, _: &str, _: &Value) -> Result<(), ControlError> {
        Err(ControlError::Unsupported("game rules"))
    }
    fn set_commands_enabled(&self, _: bool) -> Result<(), ControlError> {
        Err(ControlError::Unsupported("cheats"))
    }
    fn player_info(&self, uuid: &str) -> Result<GameInfo, ControlError> {
        Err(ControlError::PlayerNotFound {
            uuid: uuid.to_owned(),
        })
    }
    fn install_plugin(&self, _: &str, _: Option<&str>) -> Result<(), ControlError> {
        Err(ControlError::Unsupported("plugins"))
    }
    fn remove_plugin(&self, _: &str) -> Result<(), ControlError> {
        Err(ControlError::Unsupported("plugins"))
    }
    fn check_plugin_update(&self, _: &str, _: &str) -> Result<PluginUpdate, ControlError> {
        Ok(PluginUpdate::NotPublished)
    }
    // Refusing the catalogue keeps login from writing `onlinePlugins`.
    fn online_plugins(&self) -> Result<Vec<Value>, ControlError> {
        Err(ControlError::Unsupported("plugin catalogue"))
    }
    fn loaded_plugins(&self) -> Vec<String> {
        Vec::new()
    }
    fn stop(&self) -> Result<(), ControlError> {
        Ok(())
    }
    fn restart(&self) -> Result<(), ControlError> {
        Ok(())
    }
}

/// Serve the dashboard on an ephemeral port and return its socket URL.
async fn start() -> (Arc<AppState>, Arc<Recorder>, String) {
    let config = PanelConfig::default();
    let dashboard = Arc::new(Dashboard::new(&config, &HostInfo::probe()).unwrap());
    let recorder = Arc::new(Recorder::default());
    let control: Arc<dyn ServerControl> = Arc::<Recorder>::clone(&recorder);
    let state = Arc::new(AppState::new(dashboard, control, &config));

    let listener = server::bind(&ServerConfig {
        host: String::from("127.0.0.1"),
        port: 0,
    })
    .await
    .unwrap();
    let url = format!("ws://{}/ws", listener.local_addr().unwrap());
    tokio::spawn(server::serve(
        listener,
        Arc::clone(&state),
        std::future::pending(),
    ));
    (state, recorder, url)
}

async fn connect(url: &str) -> Client {
    let (client, _) = tokio_tungstenite::connect_async(url).await.unwrap();
    client
}

async fn send(client: &mut Client, request: &ClientRequest) {
    let text = serde_json::to_string(request).unwrap();
    client.send(Message::Text(text.into())).await.unwrap();
}

fn login(password: &str, silent: bool) -> ClientRequest {
    ClientRequest::Login {
        username: String::from("admin"),
        password: password.to_owned(),
        silent,
    }
}

fn command(line: &str) -> ClientRequest {
    ClientRequest::InputCommand {
        command: line.to_owned(),
    }
}

/// Next server event, skipping control frames.
async fn next_event(client: &mut Client) -> ServerEvent {
    loop {
        let frame = tokio::time::timeout(Duration::from_secs(5), client.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        if let Message::Text(text) = frame {
            return serde_json::from_str(text.as_str()).unwrap();
        }
    }
}

/// Assert no event arrives for a short while.
async fn assert_quiet(client: &mut Client) {
    let frame = tokio::time::timeout(Duration::from_millis(200), client.next()).await;
    assert!(frame.is_err(), "unexpected frame: {frame:?}");
}

async fn wait_for_subscribers(state: &AppState, expected: usize) {
    for _ in 0..100 {
        if state.sync().subscriber_count().await == expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(state.sync().subscriber_count().await, expected);
}

/// Log in and consume the four bootstrap frames.
async fn log_in(client: &mut Client) {
    send(client, &login("admin", false)).await;
    for _ in 0..4 {
        let _ = next_event(client).await;
    }
}

#[tokio::test]
async fn wrong_password_is_answered_on_that_socket_only() {
    let (state, _, url) = start().await;
    let mut watcher = connect(&url).await;
    log_in(&mut watcher).await;

    let mut intruder = connect(&url).await;
    send(&mut intruder, &login("guess", false)).await;

    assert_eq!(
        next_event(&mut intruder).await,
        ServerEvent::toast("Invalid username or password.", ToastLevel::Danger)
    );
    assert_quiet(&mut watcher).await;
    assert_eq!(state.sync().subscriber_count().await, 1);

    // The rejected socket may still log in properly.
    send(&mut intruder, &login("admin", true)).await;
    assert_eq!(next_event(&mut intruder).await, ServerEvent::Login);
    wait_for_subscribers(&state, 2).await;
}

#[tokio::test]
async fn login_sends_ack_toast_snapshot_notice_then_patches() {
    let (state, _, url) = start().await;
    let expected = state.sync().snapshot().await;
    let mut client = connect(&url).await;

    send(&mut client, &login("admin", false)).await;

    assert_eq!(next_event(&mut client).await, ServerEvent::Login);
    assert_eq!(
        next_event(&mut client).await,
        ServerEvent::toast("Logged in successfully.", ToastLevel::Success)
    );
    assert_eq!(
        next_event(&mut client).await,
        ServerEvent::Sync(Patch::snapshot(expected))
    );
    assert_eq!(next_event(&mut client).await, ServerEvent::UpdateResourceUsage);

    state.dashboard.set_tps(7).await.unwrap();
    assert_eq!(
        next_event(&mut client).await,
        ServerEvent::Sync(Patch::set(path!["server", "game", "tps"], json!(7)))
    );
}

#[tokio::test]
async fn silent_login_skips_the_toast() {
    let (_, _, url) = start().await;
    let mut client = connect(&url).await;

    send(&mut client, &login("admin", true)).await;

    assert_eq!(next_event(&mut client).await, ServerEvent::Login);
    assert!(matches!(next_event(&mut client).await, ServerEvent::Sync(_)));
    assert_eq!(next_event(&mut client).await, ServerEvent::UpdateResourceUsage);
}

#[tokio::test]
async fn requests_before_login_are_ignored() {
    let (state, recorder, url) = start().await;
    let mut client = connect(&url).await;

    send(&mut client, &command("stop")).await;
    send(&mut client, &login("admin", false)).await;

    assert_eq!(next_event(&mut client).await, ServerEvent::Login);
    assert!(recorder.commands().is_empty());
    for _ in 0..3 {
        let _ = next_event(&mut client).await;
    }

    send(&mut client, &command("time set day")).await;
    assert_eq!(
        next_event(&mut client).await,
        ServerEvent::toast("Command sent.", ToastLevel::Success)
    );
    assert_eq!(recorder.commands(), vec![String::from("time set day")]);
    assert_eq!(state.sync().subscriber_count().await, 1);
}

#[tokio::test]
async fn logout_returns_the_socket_to_login() {
    let (state, recorder, url) = start().await;
    let mut client = connect(&url).await;
    log_in(&mut client).await;

    assert_eq!(state.sync().notify(ServerEvent::Logout).await, 1);
    assert_eq!(next_event(&mut client).await, ServerEvent::Logout);
    wait_for_subscribers(&state, 0).await;

    // Logged out: patches stop and requests are ignored again.
    state.dashboard.set_tps(3).await.unwrap();
    send(&mut client, &command("stop")).await;
    assert_quiet(&mut client).await;
    assert!(recorder.commands().is_empty());

    let expected = state.sync().snapshot().await;
    assert_eq!(expected["server"]["game"]["tps"], 3);
    send(&mut client, &login("admin", true)).await;
    assert_eq!(next_event(&mut client).await, ServerEvent::Login);
    assert_eq!(
        next_event(&mut client).await,
        ServerEvent::Sync(Patch::snapshot(expected))
    );
    assert_eq!(next_event(&mut client).await, ServerEvent::UpdateResourceUsage);
    assert_eq!(state.sync().subscriber_count().await, 1);
}
