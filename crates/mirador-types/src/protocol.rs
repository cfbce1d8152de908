//! Socket protocol between the panel server and dashboard clients.
//!
//! Every frame is a JSON text message of the form
//! `{"event": <name>, "data": <payload>}`. Server events carry the patch
//! stream plus a few out-of-band notices; client requests form the
//! separate write-back channel and never touch the tree directly.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use ts_rs::TS;

use crate::patch::Patch;

/// Severity of a toast shown in the dashboard.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum ToastLevel {
    /// Neutral information.
    #[default]
    Info,
    /// The request succeeded.
    Success,
    /// The request succeeded but needs attention (e.g. restart required).
    Warning,
    /// The request failed.
    Danger,
}

/// A message pushed from the server to one or more dashboard clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum ServerEvent {
    /// A change to the mirrored tree (or the full baseline at the root).
    Sync(Patch),
    /// The client's login was accepted.
    Login,
    /// The client must authenticate again (e.g. after a server restart).
    Logout,
    /// A human-readable notice for the requesting client.
    Toast {
        /// Text to display.
        message: String,
        /// Display severity.
        level: ToastLevel,
    },
    /// The sampled CPU/RAM history changed; clients should redraw charts.
    UpdateResourceUsage,
    /// A watched player went away; clients should close its detail view.
    StopRequestPlayerInfo {
        /// The player's identity UUID.
        uuid: String,
    },
}

impl ServerEvent {
    /// Convenience constructor for a toast.
    pub fn toast(message: impl Into<String>, level: ToastLevel) -> Self {
        Self::Toast {
            message: message.into(),
            level,
        }
    }
}

/// A request from a dashboard client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum ClientRequest {
    /// Authenticate the session.
    Login {
        /// Account name.
        username: String,
        /// Account password.
        password: String,
        /// Suppress the success toast (used for automatic re-login).
        #[serde(default)]
        silent: bool,
    },
    /// Broadcast a chat message to players.
    InputChat {
        /// Message text.
        message: String,
    },
    /// Run a console command on the game server.
    InputCommand {
        /// Command line, without the leading slash.
        command: String,
    },
    /// Disconnect a player.
    KickPlayer {
        /// The player's identity UUID.
        uuid: String,
        /// Optional reason shown to the player.
        #[serde(default)]
        reason: Option<String>,
    },
    /// Change a game option.
    ChangeSetting {
        /// Option category (e.g. `Game Rules`, `World`).
        category: String,
        /// Option name within the category.
        name: String,
        /// New value.
        value: Value,
    },
    /// Start streaming live details for one player.
    StartRequestPlayerInfo {
        /// The player's identity UUID.
        uuid: String,
    },
    /// Stop streaming live details for one player.
    StopRequestPlayerInfo {
        /// The player's identity UUID.
        uuid: String,
    },
    /// Install a plugin package.
    InstallPlugin {
        /// Package name.
        plugin: String,
        /// Optional version constraint.
        #[serde(default)]
        version: Option<String>,
    },
    /// Uninstall a plugin package.
    RemovePlugin {
        /// Package name.
        plugin: String,
    },
    /// Ask whether a newer version of a plugin is published.
    CheckForPluginUpdates {
        /// Package name.
        plugin: String,
        /// Currently installed version.
        version: String,
    },
    /// Stop the game server.
    StopServer,
    /// Restart the game server.
    RestartServer,
}

impl ClientRequest {
    /// Short event name for logging.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Login { .. } => "login",
            Self::InputChat { .. } => "input_chat",
            Self::InputCommand { .. } => "input_command",
            Self::KickPlayer { .. } => "kick_player",
            Self::ChangeSetting { .. } => "change_setting",
            Self::StartRequestPlayerInfo { .. } => "start_request_player_info",
            Self::StopRequestPlayerInfo { .. } => "stop_request_player_info",
            Self::InstallPlugin { .. } => "install_plugin",
            Self::RemovePlugin { .. } => "remove_plugin",
            Self::CheckForPluginUpdates { .. } => "check_for_plugin_updates",
            Self::StopServer => "stop_server",
            Self::RestartServer => "restart_server",
        }
    }
}

/// Result of checking a plugin against its package registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PluginUpdate {
    /// The plugin is not published to the registry.
    NotPublished,
    /// The installed version is the latest.
    UpToDate,
    /// A newer version is available.
    Available(String),
}
