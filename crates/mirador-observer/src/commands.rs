//! Client request handling.
//!
//! Each request from a synced session is carried out through the
//! [`ServerControl`] boundary; any resulting state change is written to
//! the tree through the [`Dashboard`](mirador_core::Dashboard), and the
//! requesting client is answered with toasts queued on its own subscriber
//! stream. Slow requests (plugin installs, registry checks) run on a
//! blocking thread in a background task so the socket keeps streaming.

use std::sync::Arc;

use mirador_core::control::ControlError;
use mirador_core::{plugin_display_name, ServerControl};
use mirador_types::{ClientRequest, PluginUpdate, ServerEvent, SubscriberId, ToastLevel};
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::ObserverError;
use crate::state::AppState;

/// Option category holding the game rules.
pub const GAME_RULES: &str = "Game Rules";

/// Option category holding world settings.
pub const WORLD: &str = "World";

/// World option toggling cheats.
pub const ALLOW_CHEATS: &str = "allow-cheats";

/// Queue a toast for one client.
async fn toast(state: &AppState, to: SubscriberId, message: impl Into<String>, level: ToastLevel) {
    state.sync().send_to(to, ServerEvent::toast(message, level)).await;
}

async fn toast_error(state: &AppState, to: SubscriberId, action: &str, error: &ControlError) {
    warn!(%error, action, "request failed");
    toast(state, to, format!("Failed to {action}: {error}"), ToastLevel::Danger).await;
}

/// Carry out one request from the synced subscriber `from`.
///
/// Returns the handle of the background task for slow requests, so
/// callers that care (tests) can wait for completion.
///
/// # Errors
///
/// Returns [`ObserverError::Sync`] if reflecting the result into the tree
/// fails. Failures of the game server are answered with a toast instead.
pub async fn dispatch(
    state: &Arc<AppState>,
    from: SubscriberId,
    request: ClientRequest,
) -> Result<Option<JoinHandle<()>>, ObserverError> {
    debug!(subscriber = %from, request = request.name(), "dispatching request");
    let control = Arc::clone(&state.control);
    match request {
        ClientRequest::Login { .. } => {
            debug!(subscriber = %from, "ignoring login on a synced session");
        }
        ClientRequest::InputCommand { command } => match control.execute_command(&command) {
            Ok(()) => toast(state, from, "Command sent.", ToastLevel::Success).await,
            Err(error) => toast_error(state, from, "run the command", &error).await,
        },
        ClientRequest::InputChat { message } => {
            match control.broadcast_chat(&state.chat_name, &message) {
                Ok(()) => {
                    toast(state, from, "Message sent.", ToastLevel::Success).await;
                    state
                        .dashboard
                        .record_chat(&state.chat_name, &message)
                        .await?;
                }
                Err(error) => toast_error(state, from, "send the message", &error).await,
            }
        }
        ClientRequest::KickPlayer { uuid, reason } => {
            match control.kick_player(&uuid, reason.as_deref()) {
                Ok(name) => toast(state, from, format!("Kicked {name}."), ToastLevel::Success).await,
                Err(error) => toast_error(state, from, "kick the player", &error).await,
            }
        }
        ClientRequest::ChangeSetting {
            category,
            name,
            value,
        } => change_setting(state, from, &category, &name, value).await?,
        ClientRequest::StartRequestPlayerInfo { uuid } => match control.player_info(&uuid) {
            Ok(info) => {
                state.dashboard.watch_player(&uuid, &info).await?;
            }
            Err(error) => debug!(%uuid, %error, "cannot watch player"),
        },
        ClientRequest::StopRequestPlayerInfo { uuid } => {
            state.dashboard.unwatch_player(&uuid).await;
        }
        ClientRequest::InstallPlugin { plugin, version } => {
            return Ok(Some(spawn_install(Arc::clone(state), from, plugin, version)));
        }
        ClientRequest::RemovePlugin { plugin } => {
            return Ok(Some(spawn_remove(Arc::clone(state), from, plugin)));
        }
        ClientRequest::CheckForPluginUpdates { plugin, version } => {
            return Ok(Some(spawn_update_check(Arc::clone(state), from, plugin, version)));
        }
        ClientRequest::StopServer => {
            toast(state, from, "Stopping server.", ToastLevel::Info).await;
            info!("stop requested from dashboard");
            if let Err(error) = control.stop() {
                toast_error(state, from, "stop the server", &error).await;
            }
        }
        ClientRequest::RestartServer => {
            toast(state, from, "Restarting server.", ToastLevel::Info).await;
            info!("restart requested from dashboard");
            if let Err(error) = control.restart() {
                toast_error(state, from, "restart the server", &error).await;
            }
        }
    }
    Ok(None)
}

async fn change_setting(
    state: &AppState,
    from: SubscriberId,
    category: &str,
    name: &str,
    value: Value,
) -> Result<(), ObserverError> {
    let applied = match (category, name) {
        (GAME_RULES, rule) => state.control.set_game_rule(rule, &value),
        (WORLD, ALLOW_CHEATS) => match value.as_bool() {
            Some(enabled) => state.control.set_commands_enabled(enabled),
            None => Err(ControlError::Failed(format!(
                "{ALLOW_CHEATS} expects true or false, got {value}"
            ))),
        },
        _ => Err(ControlError::Unsupported("this setting")),
    };
    match applied {
        Ok(()) => {
            state
                .dashboard
                .set_option_value(category, name, value)
                .await?;
        }
        Err(error) => toast_error(state, from, &format!("change {name}"), &error).await,
    }
    Ok(())
}

/// Run a blocking control call off the async runtime.
async fn blocking<T, F>(control: Arc<dyn ServerControl>, f: F) -> Result<T, ControlError>
where
    T: Send + 'static,
    F: FnOnce(&dyn ServerControl) -> Result<T, ControlError> + Send + 'static,
{
    tokio::task::spawn_blocking(move || f(control.as_ref()))
        .await
        .unwrap_or_else(|error| Err(ControlError::Failed(error.to_string())))
}

fn spawn_install(
    state: Arc<AppState>,
    from: SubscriberId,
    plugin: String,
    version: Option<String>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let display = plugin_display_name(&plugin);
        toast(&state, from, format!("Installing {display}."), ToastLevel::Info).await;
        let package = plugin.clone();
        let result = blocking(Arc::clone(&state.control), move |control| {
            control.install_plugin(&package, version.as_deref())
        })
        .await;
        match result {
            Ok(()) => {
                info!(%plugin, "plugin installed");
                toast(
                    &state,
                    from,
                    format!("Installed {display}, it will be loaded on the next restart."),
                    ToastLevel::Warning,
                )
                .await;
            }
            Err(error) => toast_error(&state, from, &format!("install {display}"), &error).await,
        }
    })
}

fn spawn_remove(state: Arc<AppState>, from: SubscriberId, plugin: String) -> JoinHandle<()> {
    tokio::spawn(async move {
        let display = plugin_display_name(&plugin);
        toast(&state, from, format!("Uninstalling {display}."), ToastLevel::Info).await;
        let package = plugin.clone();
        let result = blocking(Arc::clone(&state.control), move |control| {
            control.remove_plugin(&package)
        })
        .await;
        match result {
            Ok(()) => {
                info!(%plugin, "plugin removed");
                toast(
                    &state,
                    from,
                    format!("Uninstalled {display}, it will not be loaded on the next restart."),
                    ToastLevel::Warning,
                )
                .await;
            }
            Err(error) => {
                toast_error(&state, from, &format!("uninstall {display}"), &error).await;
            }
        }
    })
}

fn spawn_update_check(
    state: Arc<AppState>,
    from: SubscriberId,
    plugin: String,
    version: String,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let display = plugin_display_name(&plugin);
        let result = blocking(Arc::clone(&state.control), move |control| {
            control.check_plugin_update(&plugin, &version)
        })
        .await;
        match result {
            Ok(PluginUpdate::NotPublished) => {
                toast(
                    &state,
                    from,
                    format!("{display} is not published."),
                    ToastLevel::Danger,
                )
                .await;
            }
            Ok(PluginUpdate::UpToDate) => {
                toast(&state, from, format!("{display} is up to date."), ToastLevel::Success)
                    .await;
            }
            Ok(PluginUpdate::Available(latest)) => {
                toast(
                    &state,
                    from,
                    format!("{display} has an available update of {latest}."),
                    ToastLevel::Success,
                )
                .await;
            }
            Err(error) => {
                toast_error(&state, from, &format!("check {display} for updates"), &error).await;
            }
        }
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    use mirador_core::control::GameInfo;
    use mirador_core::dashboard::{OptionEntry, OptionKind};
    use mirador_core::{Dashboard, HostInfo, PanelConfig, PlayerProfile, Subscription};
    use mirador_types::path;
    use serde_json::json;

    use super::*;

    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<String>>,
    }

    impl Recorder {
        fn record(&self, call: String) {
            if let Ok(mut calls) = self.calls.lock() {
                calls.push(call);
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().map(|c| c.clone()).unwrap_or_default()
        }
    }

    impl ServerControl for Recorder {
        fn execute_command(&self, command: &str) -> Result<(), ControlError> {
            self.record(format!("command {command}"));
            Ok(())
        }
        fn broadcast_chat(&self, sender: &str, message: &str) -> Result<(), ControlError> {
            self.record(format!("chat {sender}: {message}"));
            Ok(())
        }
        fn kick_player(&self, uuid: &str, _: Option<&str>) -> Result<String, ControlError> {
            if uuid == "u-steve" {
                Ok(String::from("Steve"))
            } else {
                Err(ControlError::PlayerNotFound {
                    uuid: uuid.to_owned(),
                })
            }
        }
        fn set_game_rule(&self, name: &str, value: &Value) -> Result<(), ControlError> {
            self.record(format!("rule {name}={value}"));
            Ok(())
        }
        fn set_commands_enabled(&self, enabled: bool) -> Result<(), ControlError> {
            self.record(format!("cheats {enabled}"));
            Ok(())
        }
        fn player_info(&self, _: &str) -> Result<GameInfo, ControlError> {
            Ok(GameInfo {
                ping: 12,
                ..GameInfo::default()
            })
        }
        fn install_plugin(&self, plugin: &str, _: Option<&str>) -> Result<(), ControlError> {
            self.record(format!("install {plugin}"));
            Ok(())
        }
        fn remove_plugin(&self, _: &str) -> Result<(), ControlError> {
            Err(ControlError::Failed(String::from("npm exited with 1")))
        }
        fn check_plugin_update(&self, _: &str, _: &str) -> Result<PluginUpdate, ControlError> {
            Ok(PluginUpdate::Available(String::from("2.0.0")))
        }
        fn online_plugins(&self) -> Result<Vec<Value>, ControlError> {
            Ok(Vec::new())
        }
        fn loaded_plugins(&self) -> Vec<String> {
            Vec::new()
        }
        fn stop(&self) -> Result<(), ControlError> {
            self.record(String::from("stop"));
            Ok(())
        }
        fn restart(&self) -> Result<(), ControlError> {
            Err(ControlError::Unsupported("restart"))
        }
    }

    async fn setup() -> (Arc<AppState>, Arc<Recorder>, Subscription) {
        let config = PanelConfig::default();
        let dashboard = Arc::new(Dashboard::new(&config, &HostInfo::probe()).unwrap());
        let recorder = Arc::new(Recorder::default());
        let control: Arc<dyn ServerControl> = Arc::clone(&recorder) as Arc<dyn ServerControl>;
        let state = Arc::new(AppState::new(dashboard, control, &config));
        let mut sub = state.sync().attach().await;
        let _snapshot = sub.rx.recv().await.unwrap();
        (state, recorder, sub)
    }

    fn toasts(sub: &mut Subscription) -> Vec<(String, ToastLevel)> {
        let mut out = Vec::new();
        while let Ok(event) = sub.rx.try_recv() {
            if let ServerEvent::Toast { message, level } = &*event {
                out.push((message.clone(), *level));
            }
        }
        out
    }

    #[tokio::test]
    async fn command_is_forwarded_and_acknowledged() {
        let (state, recorder, mut sub) = setup().await;
        dispatch(
            &state,
            sub.id,
            ClientRequest::InputCommand {
                command: String::from("time set day"),
            },
        )
        .await
        .unwrap();

        assert_eq!(recorder.calls(), vec![String::from("command time set day")]);
        assert_eq!(
            toasts(&mut sub),
            vec![(String::from("Command sent."), ToastLevel::Success)]
        );
    }

    #[tokio::test]
    async fn chat_is_broadcast_and_logged() {
        let (state, recorder, mut sub) = setup().await;
        dispatch(
            &state,
            sub.id,
            ClientRequest::InputChat {
                message: String::from("hello"),
            },
        )
        .await
        .unwrap();

        assert_eq!(recorder.calls(), vec![String::from("chat Server: hello")]);
        let chat = state
            .sync()
            .get(&path!["server", "logs", "chat", 0_u64])
            .await
            .unwrap();
        assert_eq!(chat["name"], "Server");
        assert_eq!(chat["message"], "hello");
        assert_eq!(
            toasts(&mut sub),
            vec![(String::from("Message sent."), ToastLevel::Success)]
        );
    }

    #[tokio::test]
    async fn kick_reports_name_or_failure() {
        let (state, _, mut sub) = setup().await;
        for uuid in ["u-steve", "u-ghost"] {
            dispatch(
                &state,
                sub.id,
                ClientRequest::KickPlayer {
                    uuid: String::from(uuid),
                    reason: None,
                },
            )
            .await
            .unwrap();
        }
        let toasts = toasts(&mut sub);
        assert_eq!(
            toasts.first(),
            Some(&(String::from("Kicked Steve."), ToastLevel::Success))
        );
        assert_eq!(toasts.get(1).map(|t| t.1), Some(ToastLevel::Danger));
    }

    #[tokio::test]
    async fn cheats_toggle_updates_option() {
        let (state, recorder, mut sub) = setup().await;
        let mut world = BTreeMap::new();
        world.insert(
            String::from(ALLOW_CHEATS),
            OptionEntry {
                display_name: String::from("Allow Cheats"),
                kind: OptionKind::Bool,
                choices: None,
                value: json!(false),
            },
        );
        state.dashboard.set_options(WORLD, &world).await.unwrap();

        dispatch(
            &state,
            sub.id,
            ClientRequest::ChangeSetting {
                category: String::from(WORLD),
                name: String::from(ALLOW_CHEATS),
                value: json!(true),
            },
        )
        .await
        .unwrap();
        assert_eq!(recorder.calls(), vec![String::from("cheats true")]);
        let value = state
            .sync()
            .get(&path!["server", "game", "options", WORLD, ALLOW_CHEATS, "value"])
            .await;
        assert_eq!(value, Some(json!(true)));

        dispatch(
            &state,
            sub.id,
            ClientRequest::ChangeSetting {
                category: String::from("Mystery"),
                name: String::from("x"),
                value: json!(1),
            },
        )
        .await
        .unwrap();
        assert_eq!(toasts(&mut sub).last().map(|t| t.1), Some(ToastLevel::Danger));
    }

    #[tokio::test]
    async fn player_info_requests_toggle_watching() {
        let (state, _, sub) = setup().await;
        state
            .dashboard
            .player_joined(PlayerProfile {
                uuid: String::from("u-steve"),
                ..PlayerProfile::default()
            })
            .await
            .unwrap();

        dispatch(
            &state,
            sub.id,
            ClientRequest::StartRequestPlayerInfo {
                uuid: String::from("u-steve"),
            },
        )
        .await
        .unwrap();
        assert_eq!(state.dashboard.watched().await, vec![String::from("u-steve")]);
        let ping = state
            .sync()
            .get(&path!["server", "game", "players", "u-steve", "gameInfo", "ping"])
            .await;
        assert_eq!(ping, Some(json!(12)));

        dispatch(
            &state,
            sub.id,
            ClientRequest::StopRequestPlayerInfo {
                uuid: String::from("u-steve"),
            },
        )
        .await
        .unwrap();
        assert!(state.dashboard.watched().await.is_empty());
    }

    #[tokio::test]
    async fn install_runs_in_background_with_two_toasts() {
        let (state, recorder, mut sub) = setup().await;
        let task = dispatch(
            &state,
            sub.id,
            ClientRequest::InstallPlugin {
                plugin: String::from("@bdsx/world-edit"),
                version: None,
            },
        )
        .await
        .unwrap()
        .unwrap();
        task.await.unwrap();

        assert_eq!(recorder.calls(), vec![String::from("install @bdsx/world-edit")]);
        assert_eq!(
            toasts(&mut sub),
            vec![
                (String::from("Installing World Edit."), ToastLevel::Info),
                (
                    String::from("Installed World Edit, it will be loaded on the next restart."),
                    ToastLevel::Warning
                ),
            ]
        );
    }

    #[tokio::test]
    async fn failed_remove_is_reported() {
        let (state, _, mut sub) = setup().await;
        let task = dispatch(
            &state,
            sub.id,
            ClientRequest::RemovePlugin {
                plugin: String::from("economy"),
            },
        )
        .await
        .unwrap()
        .unwrap();
        task.await.unwrap();

        let toasts = toasts(&mut sub);
        assert_eq!(toasts.len(), 2);
        assert_eq!(toasts.last().map(|t| t.1), Some(ToastLevel::Danger));
    }

    #[tokio::test]
    async fn update_check_reports_latest_version() {
        let (state, _, mut sub) = setup().await;
        let task = dispatch(
            &state,
            sub.id,
            ClientRequest::CheckForPluginUpdates {
                plugin: String::from("economy"),
                version: String::from("1.0.0"),
            },
        )
        .await
        .unwrap()
        .unwrap();
        task.await.unwrap();

        assert_eq!(
            toasts(&mut sub),
            vec![(
                String::from("Economy has an available update of 2.0.0."),
                ToastLevel::Success
            )]
        );
    }

    #[tokio::test]
    async fn stop_and_restart_are_acknowledged() {
        let (state, recorder, mut sub) = setup().await;
        dispatch(&state, sub.id, ClientRequest::StopServer).await.unwrap();
        dispatch(&state, sub.id, ClientRequest::RestartServer).await.unwrap();

        assert_eq!(recorder.calls(), vec![String::from("stop")]);
        let levels: Vec<ToastLevel> = toasts(&mut sub).into_iter().map(|t| t.1).collect();
        assert_eq!(
            levels,
            vec![ToastLevel::Info, ToastLevel::Info, ToastLevel::Danger]
        );
    }
}
