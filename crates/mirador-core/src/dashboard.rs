//! Typed setters over the dashboard's tree layout.
//!
//! The tree mirrors what the dashboard renders:
//!
//! ```text
//! status                       0 offline, 1 online
//! machine  {os, name, network {ip, port}}
//! process  {sessionId, pid, cwd, user, usage {cpu, ram}}
//! server   {version, protocol, uptime, announcement, info,
//!           plugins, onlinePlugins, logs {chat, commands, console},
//!           game {tps, players, objectives, permissions, options}}
//! ```
//!
//! Key names are camelCase because the client reads them verbatim.
//! Appended series (logs, usage) are mappings keyed by an increasing
//! sequence number so that evicting the oldest entry is a single delete.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use mirador_tree::{ObservedTree, TreeError};
use mirador_types::{path, Key, Path, ServerEvent};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::PanelConfig;
use crate::control::{ControlError, GameInfo, ServerControl};
use crate::host::HostInfo;
use crate::sampler::UsageSample;
use crate::sync::{Fanout, SyncError, SyncService};

/// Name shown for scores whose player is no longer online.
pub const OFFLINE_PLAYER: &str = "Player Offline";

/// Highest ticks-per-second the server can report.
pub const MAX_TPS: u32 = 20;

/// Facts reported once the game server is up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerInfo {
    /// Game server session id.
    pub session_id: String,
    /// Full game version string.
    pub version: String,
    /// Network protocol version.
    pub protocol: u32,
    /// Message of the day.
    pub motd: String,
    /// Player slots.
    pub max_players: u32,
}

/// Player counts as advertised.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerCount {
    /// Online now.
    pub current: u32,
    /// Slots.
    pub max: u32,
}

/// The server's public query advertisement.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Announcement {
    /// Advertised server name.
    pub name: String,
    /// Advertised level name.
    pub level: String,
    /// Advertised player counts.
    pub players: PlayerCount,
}

/// Rendered skin assets.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Skin {
    /// Face image as a data URL, empty until rendered.
    pub head: String,
}

/// The client device a player joined from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    /// Platform code.
    #[serde(rename = "type")]
    pub kind: u32,
    /// Device model.
    pub model: String,
    /// Device id.
    pub id: String,
}

/// A connected player.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerProfile {
    /// Display name.
    pub name: String,
    /// Identity UUID; the player's key in the tree.
    pub uuid: String,
    /// Xbox user id.
    pub xuid: String,
    /// Remote address without port.
    pub ip: String,
    /// Skin assets.
    pub skin: Skin,
    /// Client device.
    pub device: Device,
    /// Client game version.
    pub version: String,
    /// Language code on join; replaced by the display name if known.
    pub lang: String,
    /// Scoreboard identity, once assigned.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scoreboard_id: Option<i64>,
    /// Live details while watched.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub game_info: Option<GameInfo>,
}

/// Maps language codes (`en_US`) to display names (`English (US)`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LanguageTable(BTreeMap<String, String>);

impl LanguageTable {
    /// Parse a `[[code, name], ...]` JSON document.
    ///
    /// # Errors
    ///
    /// Returns the JSON error if the document has another shape.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let pairs: Vec<(String, String)> = serde_json::from_str(json)?;
        Ok(Self(pairs.into_iter().collect()))
    }

    /// Display name for `code`, or `code` itself when unknown.
    pub fn resolve(&self, code: &str) -> String {
        self.0
            .get(code)
            .cloned()
            .unwrap_or_else(|| code.to_owned())
    }

    /// Number of known languages.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Scoreboard display slot an objective can be pinned to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplaySlot {
    /// Under player name tags.
    BelowName,
    /// In the player list.
    List,
    /// On the side of the screen.
    Sidebar,
}

impl DisplaySlot {
    /// Icon name the dashboard shows for this slot.
    pub const fn icon(self) -> &'static str {
        match self {
            Self::BelowName => "label",
            Self::List => "format_list_numbered_rtl",
            Self::Sidebar => "push_pin",
        }
    }
}

/// Value type of a game option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionKind {
    /// On or off.
    Bool,
    /// Whole number.
    Int,
    /// Decimal number.
    Float,
}

/// One configurable game option.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionEntry {
    /// Label shown in the dashboard.
    pub display_name: String,
    /// Value type.
    #[serde(rename = "type")]
    pub kind: OptionKind,
    /// Allowed values for enumerated options.
    #[serde(rename = "enum", skip_serializing_if = "Option::is_none")]
    pub choices: Option<Vec<String>>,
    /// Current value.
    pub value: Value,
}

/// Package metadata of a loaded plugin.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PluginManifest {
    /// Package name.
    pub name: String,
    /// Installed version.
    pub version: String,
    /// Package description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Registry keywords.
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Author, in whatever form the package declares.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<Value>,
    /// License identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,
}

/// A plugin loaded by the game server.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoadedPlugin {
    /// Directory or package name.
    pub name: String,
    /// Package metadata.
    pub json: PluginManifest,
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Key a scoreboard id is stored under.
fn score_key(id: i64) -> Key {
    u64::try_from(id).map_or_else(|_| Key::Field(id.to_string()), Key::Index)
}

mod paths {
    use mirador_types::{path, Path};

    pub fn players() -> Path {
        path!["server", "game", "players"]
    }

    pub fn objectives() -> Path {
        path!["server", "game", "objectives"]
    }

    pub fn options() -> Path {
        path!["server", "game", "options"]
    }

    pub fn logs(kind: &str) -> Path {
        path!["server", "logs", kind]
    }

    pub fn usage(series: &str) -> Path {
        path!["process", "usage", series]
    }
}

/// Append `entry` under the next sequence key of the mapping at `at`,
/// then delete the oldest entries until at most `cap` remain.
fn append_capped(
    tree: &mut ObservedTree<Fanout>,
    at: &Path,
    entry: Value,
    cap: usize,
) -> Result<(), TreeError> {
    let keys = tree.keys_at(at).ok_or_else(|| TreeError::MissingParent {
        path: at.clone(),
    })?;
    let next = keys
        .iter()
        .filter_map(Key::as_index)
        .max()
        .map_or(0, |last| last.saturating_add(1));
    tree.set(&at.child(next), entry)?;

    let len = keys.len().saturating_add(1);
    for oldest in keys.iter().take(len.saturating_sub(cap.max(1))) {
        tree.delete(&at.child(oldest.clone()))?;
    }
    Ok(())
}

/// The dashboard's view of the game server, backed by the synced tree.
#[derive(Debug)]
pub struct Dashboard {
    sync: Arc<SyncService>,
    watched: Mutex<BTreeSet<String>>,
    max_log_entries: usize,
    languages: LanguageTable,
}

impl Dashboard {
    /// Build the initial tree from configuration and host facts and wrap
    /// it in a fresh [`SyncService`].
    ///
    /// # Errors
    ///
    /// Returns [`SyncError`] if the initial tree cannot be observed.
    pub fn new(config: &PanelConfig, host: &HostInfo) -> Result<Self, SyncError> {
        let sync = Arc::new(SyncService::new(Self::initial_tree(config, host))?);
        Ok(Self {
            sync,
            watched: Mutex::new(BTreeSet::new()),
            max_log_entries: config.logs.max_entries.max(1),
            languages: LanguageTable::default(),
        })
    }

    /// Use `languages` to resolve player language codes.
    #[must_use]
    pub fn with_languages(mut self, languages: LanguageTable) -> Self {
        self.languages = languages;
        self
    }

    /// The tree layout before the game server has started.
    pub fn initial_tree(config: &PanelConfig, host: &HostInfo) -> Value {
        json!({
            "status": 0,
            "machine": {
                "os": host.os,
                "name": host.hostname,
                "network": {
                    "ip": host.ip.to_string(),
                    "port": config.game.port,
                },
            },
            "process": {
                "sessionId": "",
                "pid": host.pid,
                "cwd": host.cwd,
                "user": host.user,
                "usage": {"cpu": {}, "ram": {}},
            },
            "server": {
                "version": "0.0.0",
                "protocol": 0,
                "uptime": 0,
                "announcement": {
                    "name": "",
                    "level": "",
                    "players": {"current": 0, "max": 0},
                },
                "info": {
                    "name": config.game.server_name,
                    "level": config.game.level_name,
                    "players": {"current": 0, "max": config.game.max_players},
                },
                "plugins": [],
                "onlinePlugins": [],
                "logs": {"chat": {}, "commands": {}, "console": {}},
                "game": {
                    "tps": 0,
                    "players": {},
                    "objectives": {},
                    "permissions": [],
                    "options": {},
                },
            },
        })
    }

    /// The underlying sync service.
    pub const fn sync(&self) -> &Arc<SyncService> {
        &self.sync
    }

    // ---- server status ----

    /// Record that the game server is up.
    ///
    /// Connected clients are logged out first, so a restarted server
    /// always starts from a fresh login and snapshot.
    pub async fn mark_online(&self, server: &ServerInfo) -> Result<(), SyncError> {
        let server = server.clone();
        self.sync
            .mutate(move |tree| {
                tree.handler_mut().broadcast(ServerEvent::Logout);
                tree.set(&path!["status"], 1)?;
                tree.set(&path!["process", "sessionId"], server.session_id)?;
                tree.set(&path!["server", "version"], server.version)?;
                tree.set(&path!["server", "protocol"], server.protocol)?;
                tree.set(&path!["server", "info", "name"], server.motd)?;
                tree.set(&path!["server", "info", "players", "max"], server.max_players)
            })
            .await?;
        info!("game server marked online");
        Ok(())
    }

    /// Record the time since the server came up.
    pub async fn set_uptime(&self, uptime_ms: u64) -> Result<(), SyncError> {
        self.sync.set(&path!["server", "uptime"], uptime_ms).await
    }

    /// Record the measured ticks per second, capped at [`MAX_TPS`].
    pub async fn set_tps(&self, tps: u32) -> Result<(), SyncError> {
        self.sync
            .set(&path!["server", "game", "tps"], tps.min(MAX_TPS))
            .await
    }

    /// Record the latest query advertisement.
    pub async fn set_announcement(&self, announcement: &Announcement) -> Result<(), SyncError> {
        let value = serde_json::to_value(announcement)?;
        self.sync
            .set(&path!["server", "announcement"], value)
            .await
    }

    // ---- logs ----

    async fn append_log(&self, kind: &'static str, entry: Value) -> Result<(), SyncError> {
        let cap = self.max_log_entries;
        self.sync
            .mutate(move |tree| append_capped(tree, &paths::logs(kind), entry, cap))
            .await
    }

    /// Append a chat line.
    pub async fn record_chat(&self, name: &str, message: &str) -> Result<(), SyncError> {
        self.append_log(
            "chat",
            json!({"name": name, "message": message, "time": now_millis()}),
        )
        .await
    }

    /// Append an executed command.
    pub async fn record_command(&self, name: &str, command: &str) -> Result<(), SyncError> {
        self.append_log(
            "commands",
            json!({"name": name, "command": command, "time": now_millis()}),
        )
        .await
    }

    /// Append a console output line.
    pub async fn record_console(&self, line: &str) -> Result<(), SyncError> {
        self.append_log("console", json!({"log": line, "time": now_millis()}))
            .await
    }

    // ---- players ----

    /// Add a player who just logged in.
    pub async fn player_joined(&self, mut profile: PlayerProfile) -> Result<(), SyncError> {
        profile.lang = self.languages.resolve(&profile.lang);
        let at = paths::players().child(profile.uuid.as_str());
        let value = serde_json::to_value(&profile)?;
        self.sync.set(&at, value).await?;
        info!(player = %profile.name, uuid = %profile.uuid, "player joined");
        Ok(())
    }

    /// Attach a scoreboard identity to an online player.
    ///
    /// Returns `false` if the player is not in the tree.
    pub async fn set_scoreboard_id(&self, uuid: &str, id: i64) -> Result<bool, SyncError> {
        let player = paths::players().child(uuid);
        self.sync
            .mutate(move |tree| {
                if !tree.contains(&player) {
                    return Ok(false);
                }
                tree.set(&player.child("scoreboardId"), id)?;
                Ok(true)
            })
            .await
    }

    /// Remove a player who disconnected.
    ///
    /// Stops watching the player and tells clients to close its detail
    /// view, renames its scores to [`OFFLINE_PLAYER`], then deletes it.
    /// Returns `false` if the player was not in the tree.
    pub async fn player_left(&self, uuid: &str) -> Result<bool, SyncError> {
        let mut watched = self.watched.lock().await;
        watched.remove(uuid);
        let uuid = uuid.to_owned();
        let removed = self
            .sync
            .mutate(move |tree| {
                let player = paths::players().child(uuid.as_str());
                if !tree.contains(&player) {
                    return Ok(false);
                }
                tree.handler_mut()
                    .broadcast(ServerEvent::StopRequestPlayerInfo { uuid: uuid.clone() });

                let scoreboard_id = tree
                    .get(&player.child("scoreboardId"))
                    .and_then(|v| v.as_i64());
                if let Some(id) = scoreboard_id {
                    let objectives = paths::objectives();
                    for objective in tree.keys_at(&objectives).unwrap_or_default() {
                        let score = objectives
                            .child(objective)
                            .child("scores")
                            .child(score_key(id));
                        if tree.contains(&score) {
                            tree.set(&score.child("name"), OFFLINE_PLAYER)?;
                        }
                    }
                }
                tree.delete(&player)
            })
            .await?;
        drop(watched);
        if removed {
            debug!("player removed");
        }
        Ok(removed)
    }

    // ---- watched players ----

    /// Start streaming live details for an online player.
    ///
    /// Returns `false` if the player is not in the tree.
    pub async fn watch_player(&self, uuid: &str, info: &GameInfo) -> Result<bool, SyncError> {
        let mut watched = self.watched.lock().await;
        let at = paths::players().child(uuid).child("gameInfo");
        let player = paths::players().child(uuid);
        let value = serde_json::to_value(info)?;
        let stored = self
            .sync
            .mutate(move |tree| {
                if !tree.contains(&player) {
                    return Ok(false);
                }
                tree.set(&at, value)?;
                Ok(true)
            })
            .await?;
        if stored {
            watched.insert(uuid.to_owned());
        }
        Ok(stored)
    }

    /// Stop streaming live details. Returns whether the player was watched.
    pub async fn unwatch_player(&self, uuid: &str) -> bool {
        self.watched.lock().await.remove(uuid)
    }

    /// Players currently watched.
    pub async fn watched(&self) -> Vec<String> {
        self.watched.lock().await.iter().cloned().collect()
    }

    /// Pull fresh details for every watched player.
    ///
    /// Players the server no longer knows are unwatched. Returns how many
    /// players were refreshed.
    pub async fn refresh_watched(&self, control: &dyn ServerControl) -> Result<usize, SyncError> {
        let mut refreshed = 0_usize;
        for uuid in self.watched().await {
            match control.player_info(&uuid) {
                Ok(info) => {
                    if self.watch_player(&uuid, &info).await? {
                        refreshed = refreshed.saturating_add(1);
                    } else {
                        self.unwatch_player(&uuid).await;
                    }
                }
                Err(ControlError::PlayerNotFound { .. }) => {
                    self.unwatch_player(&uuid).await;
                }
                Err(error) => debug!(%uuid, %error, "player info unavailable"),
            }
        }
        Ok(refreshed)
    }

    // ---- scoreboard ----

    /// Create or reset an objective with no scores.
    pub async fn set_objective(&self, name: &str, display_name: &str) -> Result<(), SyncError> {
        self.sync
            .set(
                &paths::objectives().child(name),
                json!({"displayName": display_name, "pinned": "", "scores": {}}),
            )
            .await
    }

    /// Set one score. `holder` of `None` means the holder is offline.
    ///
    /// Returns `false` if the objective does not exist.
    pub async fn set_score(
        &self,
        objective: &str,
        id: i64,
        holder: Option<&str>,
        value: impl Into<Value> + Send,
    ) -> Result<bool, SyncError> {
        let objective = paths::objectives().child(objective);
        let entry = json!({
            "name": holder.unwrap_or(OFFLINE_PLAYER),
            "value": value.into(),
        });
        self.sync
            .mutate(move |tree| {
                if !tree.contains(&objective) {
                    return Ok(false);
                }
                tree.set(&objective.child("scores").child(score_key(id)), entry)?;
                Ok(true)
            })
            .await
    }

    /// Remove one score. Returns whether it existed.
    pub async fn reset_score(&self, objective: &str, id: i64) -> Result<bool, SyncError> {
        let score = paths::objectives()
            .child(objective)
            .child("scores")
            .child(score_key(id));
        self.sync.delete(&score).await
    }

    /// Mark an objective as shown in `slot`.
    ///
    /// Returns `false` if the objective does not exist.
    pub async fn pin_objective(&self, objective: &str, slot: DisplaySlot) -> Result<bool, SyncError> {
        let pinned = paths::objectives().child(objective).child("pinned");
        self.sync
            .mutate(move |tree| {
                let Some(current) = tree.get(&pinned) else {
                    return Ok(false);
                };
                let current = current.as_str().unwrap_or_default();
                if !current.contains(slot.icon()) {
                    tree.set(&pinned, format!("{current}{}", slot.icon()))?;
                }
                Ok(true)
            })
            .await
    }

    // ---- options ----

    /// Replace every option in `category`.
    pub async fn set_options(
        &self,
        category: &str,
        options: &BTreeMap<String, OptionEntry>,
    ) -> Result<(), SyncError> {
        let value = serde_json::to_value(options)?;
        self.sync
            .set(&paths::options().child(category), value)
            .await
    }

    /// Update the value of one option. Returns `false` if it is unknown.
    pub async fn set_option_value(
        &self,
        category: &str,
        name: &str,
        value: Value,
    ) -> Result<bool, SyncError> {
        let option = paths::options().child(category).child(name);
        self.sync
            .mutate(move |tree| {
                if !tree.contains(&option) {
                    return Ok(false);
                }
                tree.set(&option.child("value"), value)?;
                Ok(true)
            })
            .await
    }

    // ---- plugins and files ----

    /// Replace the list of loaded plugins.
    pub async fn set_plugins(&self, plugins: &[LoadedPlugin]) -> Result<(), SyncError> {
        let value = serde_json::to_value(plugins)?;
        self.sync.set(&path!["server", "plugins"], value).await
    }

    /// Refresh the catalogue of installable plugins.
    ///
    /// Plugins already loaded are left out. A failed fetch keeps the
    /// previous catalogue. Returns the number of plugins listed, if the
    /// fetch succeeded.
    pub async fn refresh_online_plugins(
        &self,
        control: &dyn ServerControl,
    ) -> Result<Option<usize>, SyncError> {
        let catalogue = match control.online_plugins() {
            Ok(catalogue) => catalogue,
            Err(error) => {
                warn!(%error, "failed to fetch the plugin catalogue");
                return Ok(None);
            }
        };
        let loaded: BTreeSet<String> = control.loaded_plugins().into_iter().collect();
        let available: Vec<Value> = catalogue
            .into_iter()
            .filter(|plugin| {
                plugin
                    .get("package")
                    .and_then(|p| p.get("name"))
                    .and_then(Value::as_str)
                    .is_some_and(|name| !loaded.contains(name))
            })
            .collect();
        let count = available.len();
        self.sync
            .set(&path!["server", "onlinePlugins"], Value::Array(available))
            .await?;
        Ok(Some(count))
    }

    /// Replace the permissions document.
    pub async fn set_permissions(&self, permissions: Value) -> Result<(), SyncError> {
        self.sync
            .set(&path!["server", "game", "permissions"], permissions)
            .await
    }

    /// Append one usage sample to both series, keeping at most `cap`.
    pub async fn record_usage(
        &self,
        cap: usize,
        sample: UsageSample,
        time: i64,
    ) -> Result<(), SyncError> {
        self.sync
            .mutate(move |tree| {
                append_capped(
                    tree,
                    &paths::usage("cpu"),
                    json!({"percent": sample.cpu_percent, "time": time}),
                    cap,
                )?;
                append_capped(
                    tree,
                    &paths::usage("ram"),
                    json!({"percent": sample.ram_percent, "time": time}),
                    cap,
                )
            })
            .await
    }
}
