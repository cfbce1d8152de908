//! Panel binary for the Mirador state mirror.
//!
//! Wires the dashboard model to its background refreshers and the
//! dashboard server, then runs until interrupted or stopped from the
//! dashboard.
//!
//! # Startup Sequence
//!
//! 1. Initialize structured logging (tracing), mirrored into the console log
//! 2. Load configuration from `mirador.yaml`
//! 3. Probe the host and build the dashboard tree
//! 4. Start the dashboard server
//! 5. Publish the standalone server's options and mark it online
//! 6. Spawn the resource sampler, permissions watcher, and status ticker
//! 7. Wait for Ctrl-C or a stop/restart request

mod console;
mod error;
mod standalone;
mod status;

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use mirador_core::dashboard::{OptionEntry, OptionKind, MAX_TPS};
use mirador_core::{
    Dashboard, HostInfo, LanguageTable, PanelConfig, PermissionsWatcher, ProcfsProbe,
    ResourceSampler, ServerControl, ServerInfo,
};
use mirador_observer::commands::{ALLOW_CHEATS, GAME_RULES, WORLD};
use mirador_observer::{AppState, ServerConfig};
use mirador_types::SessionId;
use serde_json::json;
use tokio::sync::{oneshot, watch};
use tokio::time::Instant;
use tracing::{info, warn};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;
use tracing_subscriber::{EnvFilter, Layer as _};

use crate::console::ConsoleLayer;
use crate::error::ServerAppError;
use crate::standalone::{Lifecycle, StandaloneControl};
use crate::status::StatusTicker;

/// Configuration file looked up in the working directory.
const CONFIG_FILE: &str = "mirador.yaml";

/// Application entry point for the panel.
///
/// # Errors
///
/// Returns an error if configuration, the dashboard tree, or the
/// dashboard server cannot be set up.
#[tokio::main]
#[allow(clippy::too_many_lines)]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Initialize structured logging.
    let (console_layer, console_rx) = ConsoleLayer::channel();
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .with(console_layer.with_filter(LevelFilter::INFO))
        .init();

    info!("mirador starting");

    // 2. Load configuration.
    let config = load_config()?;
    info!(
        host = config.listen.host,
        port = config.listen.port,
        history_len = config.sampling.history_len,
        max_log_entries = config.logs.max_entries,
        "Configuration loaded"
    );

    // 3. Build the dashboard tree.
    let host = HostInfo::probe();
    info!(os = host.os, hostname = host.hostname, ip = %host.ip, "Host probed");
    let dashboard = Arc::new(Dashboard::new(&config, &host)?.with_languages(load_languages(&config)));
    tokio::spawn(console::forward(console_rx, Arc::clone(&dashboard)));

    // 4. Start the dashboard server.
    let (control, mut lifecycle, mut commands) = StandaloneControl::channel();
    let control = Arc::new(control);
    let shared_control: Arc<dyn ServerControl> = Arc::<StandaloneControl>::clone(&control);
    let app_state = Arc::new(AppState::new(
        Arc::clone(&dashboard),
        Arc::clone(&shared_control),
        &config,
    ));
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let server_handle = mirador_observer::spawn_observer(
        &ServerConfig::from(&config.listen),
        app_state,
        async move {
            // A dropped sender also means shut down.
            let _ = shutdown_rx.await;
        },
    )
    .await?;

    let command_log = Arc::clone(&dashboard);
    let command_origin = config.chat_name.clone();
    tokio::spawn(async move {
        while let Some(command) = commands.recv().await {
            info!(%command, "command received with no game server attached");
            if let Err(error) = command_log.record_command(&command_origin, &command).await {
                warn!(%error, "failed to record command");
            }
        }
    });

    // 5. Bring the standalone server online.
    publish_options(&dashboard).await?;
    dashboard.set_plugins(&[]).await?;
    go_online(&dashboard, &config).await?;
    let (online_tx, online_since) = watch::channel(Instant::now());
    if let Some(listed) = dashboard.refresh_online_plugins(shared_control.as_ref()).await? {
        info!(listed, "Plugin catalogue refreshed");
    }

    // 6. Background refreshers.
    tokio::spawn(
        ResourceSampler::new(ProcfsProbe::new(), config.sampling.history_len).run(
            Arc::clone(&dashboard),
            Duration::from_secs(config.sampling.interval_secs.max(1)),
        ),
    );
    tokio::spawn(PermissionsWatcher::new(config.permissions_file.clone()).run(
        Arc::clone(&dashboard),
        Duration::from_millis(config.refresh.permissions_poll_ms.max(1)),
    ));
    tokio::spawn(StatusTicker::new(Arc::clone(&shared_control), online_since).run(
        Arc::clone(&dashboard),
        Duration::from_millis(config.refresh.status_interval_ms.max(1)),
    ));
    info!("Background refreshers started");

    // 7. Run until interrupted or stopped.
    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                signal.map_err(|e| ServerAppError::Signal {
                    message: format!("failed to listen for Ctrl-C: {e}"),
                })?;
                info!("Interrupt received");
                break;
            }
            changed = lifecycle.changed() => {
                if changed.is_err() {
                    break;
                }
                let request = *lifecycle.borrow_and_update();
                match request {
                    Lifecycle::Running => {}
                    Lifecycle::Stop => {
                        info!("Stop requested");
                        break;
                    }
                    Lifecycle::Restart => {
                        info!("Restart requested");
                        go_online(&dashboard, &config).await?;
                        online_tx.send_replace(Instant::now());
                        control.resume();
                    }
                }
            }
        }
    }

    let _ = shutdown_tx.send(());
    if let Err(e) = server_handle.await {
        warn!(error = %e, "dashboard server task ended abnormally");
    }
    info!("mirador shutdown complete");
    Ok(())
}

/// Load the panel configuration from `mirador.yaml`.
///
/// Looks for the config file relative to the current working directory.
/// A missing file yields the defaults.
fn load_config() -> Result<PanelConfig, ServerAppError> {
    let config_path = Path::new(CONFIG_FILE);
    if config_path.exists() {
        Ok(PanelConfig::from_file(config_path)?)
    } else {
        info!("Config file not found, using defaults");
        let mut config = PanelConfig::default();
        config.apply_env_overrides(|name| std::env::var(name).ok())?;
        Ok(config)
    }
}

/// Load the language display names, if configured.
///
/// Failures are logged and leave language codes untranslated.
fn load_languages(config: &PanelConfig) -> LanguageTable {
    let Some(path) = &config.language_names_file else {
        return LanguageTable::default();
    };
    match std::fs::read_to_string(path)
        .map_err(|e| e.to_string())
        .and_then(|json| LanguageTable::from_json(&json).map_err(|e| e.to_string()))
    {
        Ok(table) => {
            info!(languages = table.len(), "Language names loaded");
            table
        }
        Err(error) => {
            warn!(path = %path.display(), %error, "failed to load language names");
            LanguageTable::default()
        }
    }
}

/// Publish the options the standalone server exposes.
async fn publish_options(dashboard: &Dashboard) -> Result<(), ServerAppError> {
    let world = BTreeMap::from([(
        String::from(ALLOW_CHEATS),
        option("Allow Cheats", OptionKind::Bool, json!(false)),
    )]);
    dashboard.set_options(WORLD, &world).await?;

    let rules = BTreeMap::from([
        (
            String::from("dodaylightcycle"),
            option("Daylight Cycle", OptionKind::Bool, json!(true)),
        ),
        (
            String::from("keepinventory"),
            option("Keep Inventory", OptionKind::Bool, json!(false)),
        ),
        (
            String::from("showcoordinates"),
            option("Show Coordinates", OptionKind::Bool, json!(false)),
        ),
        (
            String::from("randomtickspeed"),
            option("Random Tick Speed", OptionKind::Int, json!(1)),
        ),
    ]);
    dashboard.set_options(GAME_RULES, &rules).await?;
    Ok(())
}

fn option(display_name: &str, kind: OptionKind, value: serde_json::Value) -> OptionEntry {
    OptionEntry {
        display_name: display_name.to_owned(),
        kind,
        choices: None,
        value,
    }
}

/// Mark the server online under a fresh session id.
async fn go_online(dashboard: &Dashboard, config: &PanelConfig) -> Result<(), ServerAppError> {
    let session_id = SessionId::new();
    dashboard
        .mark_online(&ServerInfo {
            session_id: session_id.to_string(),
            version: String::from(env!("CARGO_PKG_VERSION")),
            protocol: 0,
            motd: config.game.server_name.clone(),
            max_players: config.game.max_players,
        })
        .await?;
    dashboard.set_tps(MAX_TPS).await?;
    info!(session_id = %session_id, "Server online");
    Ok(())
}
