//! The boundary between the panel and the game server it administers.
//!
//! Client requests never patch the tree; they go through [`ServerControl`]
//! and the results are reflected back into the tree by domain code. The
//! methods are synchronous; callers run the slow ones (plugin installs)
//! on a blocking thread.

use mirador_types::PluginUpdate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Errors reported by a [`ServerControl`] implementation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ControlError {
    /// The attached server cannot perform this operation.
    #[error("{0} is not supported by this server")]
    Unsupported(&'static str),

    /// No online player has the given identity.
    #[error("player {uuid} is not online")]
    PlayerNotFound {
        /// The requested identity UUID.
        uuid: String,
    },

    /// The operation was attempted and failed.
    #[error("{0}")]
    Failed(String),
}

/// A three-component vector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    /// X.
    pub x: f64,
    /// Y.
    pub y: f64,
    /// Z.
    pub z: f64,
}

/// Pitch and yaw.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Rotation {
    /// Pitch.
    pub x: f64,
    /// Yaw.
    pub y: f64,
}

/// A bounded gauge such as health or food.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Gauge {
    /// Current value.
    pub current: f64,
    /// Maximum value.
    pub max: f64,
}

/// Live details of a watched player.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GameInfo {
    /// Round-trip latency in milliseconds, `-1` when unknown.
    pub ping: i64,
    /// Position.
    pub pos: Vec3,
    /// Facing.
    pub rot: Rotation,
    /// Biome name at the player's position.
    pub biome: String,
    /// Experience level.
    pub lvl: u32,
    /// Health.
    pub health: Gauge,
    /// Food.
    pub food: Gauge,
}

/// Operations the dashboard can ask of the game server.
pub trait ServerControl: Send + Sync {
    /// Run a console command.
    ///
    /// # Errors
    ///
    /// Implementation-defined; see [`ControlError`].
    fn execute_command(&self, command: &str) -> Result<(), ControlError>;

    /// Broadcast a chat line to every player, attributed to `sender`.
    ///
    /// # Errors
    ///
    /// Implementation-defined; see [`ControlError`].
    fn broadcast_chat(&self, sender: &str, message: &str) -> Result<(), ControlError>;

    /// Disconnect a player. Returns the player's display name.
    ///
    /// # Errors
    ///
    /// [`ControlError::PlayerNotFound`] if no such player is online.
    fn kick_player(&self, uuid: &str, reason: Option<&str>) -> Result<String, ControlError>;

    /// Change one game rule.
    ///
    /// # Errors
    ///
    /// Implementation-defined; see [`ControlError`].
    fn set_game_rule(&self, name: &str, value: &Value) -> Result<(), ControlError>;

    /// Enable or disable cheats (commands) for the world.
    ///
    /// # Errors
    ///
    /// Implementation-defined; see [`ControlError`].
    fn set_commands_enabled(&self, enabled: bool) -> Result<(), ControlError>;

    /// Read the live details of one player.
    ///
    /// # Errors
    ///
    /// [`ControlError::PlayerNotFound`] if no such player is online.
    fn player_info(&self, uuid: &str) -> Result<GameInfo, ControlError>;

    /// Install a plugin package.
    ///
    /// # Errors
    ///
    /// Implementation-defined; see [`ControlError`].
    fn install_plugin(&self, plugin: &str, version: Option<&str>) -> Result<(), ControlError>;

    /// Uninstall a plugin package.
    ///
    /// # Errors
    ///
    /// Implementation-defined; see [`ControlError`].
    fn remove_plugin(&self, plugin: &str) -> Result<(), ControlError>;

    /// Compare an installed plugin version against the registry.
    ///
    /// # Errors
    ///
    /// Implementation-defined; see [`ControlError`].
    fn check_plugin_update(&self, plugin: &str, version: &str)
        -> Result<PluginUpdate, ControlError>;

    /// Fetch the catalogue of published plugins.
    ///
    /// Entries are registry search results, each with a
    /// `package.name` member.
    ///
    /// # Errors
    ///
    /// Implementation-defined; see [`ControlError`].
    fn online_plugins(&self) -> Result<Vec<Value>, ControlError>;

    /// Names of the plugins currently loaded.
    fn loaded_plugins(&self) -> Vec<String>;

    /// Stop the game server.
    ///
    /// # Errors
    ///
    /// Implementation-defined; see [`ControlError`].
    fn stop(&self) -> Result<(), ControlError>;

    /// Stop the game server and start it again.
    ///
    /// # Errors
    ///
    /// Implementation-defined; see [`ControlError`].
    fn restart(&self) -> Result<(), ControlError>;
}

/// Human-readable name of a plugin package.
///
/// Drops an npm scope and a conventional prefix, then title-cases the
/// dash-separated words: `@scope/plugin-world-edit` becomes `World Edit`.
pub fn plugin_display_name(package: &str) -> String {
    let bare = package.rsplit('/').next().unwrap_or(package);
    let bare = bare
        .strip_prefix("plugin-")
        .or_else(|| bare.strip_prefix("bdsx-"))
        .unwrap_or(bare);
    bare.split(['-', '_'])
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            chars.next().map_or_else(String::new, |first| {
                first.to_uppercase().chain(chars).collect::<String>()
            })
        })
        .collect::<Vec<_>>()
        .join(" ")
}
