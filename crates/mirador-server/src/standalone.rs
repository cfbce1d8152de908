//! A [`ServerControl`] for running the panel with no game server attached.
//!
//! Commands are echoed to the console log, chat is accepted, and every
//! player-facing operation reports that nobody is online. Stop and restart
//! are signalled to `main` through a watch channel.

use mirador_core::control::{ControlError, GameInfo};
use mirador_core::ServerControl;
use mirador_types::PluginUpdate;
use serde_json::Value;
use tokio::sync::{mpsc, watch};
use tracing::info;

/// Lifecycle requests from the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    /// Keep running.
    Running,
    /// Shut the panel down.
    Stop,
    /// Go offline and come back with a new session.
    Restart,
}

/// Control surface of the standalone panel.
#[derive(Debug)]
pub struct StandaloneControl {
    lifecycle: watch::Sender<Lifecycle>,
    commands: mpsc::UnboundedSender<String>,
}

impl StandaloneControl {
    /// Create the control plus its lifecycle and command receivers.
    pub fn channel() -> (
        Self,
        watch::Receiver<Lifecycle>,
        mpsc::UnboundedReceiver<String>,
    ) {
        let (lifecycle, lifecycle_rx) = watch::channel(Lifecycle::Running);
        let (commands, commands_rx) = mpsc::unbounded_channel();
        (
            Self {
                lifecycle,
                commands,
            },
            lifecycle_rx,
            commands_rx,
        )
    }

    /// Reset to running after a restart has been carried out.
    pub fn resume(&self) {
        self.lifecycle.send_replace(Lifecycle::Running);
    }

    fn not_online(uuid: &str) -> ControlError {
        ControlError::PlayerNotFound {
            uuid: uuid.to_owned(),
        }
    }
}

impl ServerControl for StandaloneControl {
    fn execute_command(&self, command: &str) -> Result<(), ControlError> {
        self.commands
            .send(command.to_owned())
            .map_err(|e| ControlError::Failed(format!("command queue closed: {e}")))
    }

    fn broadcast_chat(&self, sender: &str, message: &str) -> Result<(), ControlError> {
        info!(sender, message, "chat");
        Ok(())
    }

    fn kick_player(&self, uuid: &str, _reason: Option<&str>) -> Result<String, ControlError> {
        Err(Self::not_online(uuid))
    }

    fn set_game_rule(&self, name: &str, value: &Value) -> Result<(), ControlError> {
        info!(rule = name, %value, "game rule changed");
        Ok(())
    }

    fn set_commands_enabled(&self, enabled: bool) -> Result<(), ControlError> {
        info!(enabled, "cheats toggled");
        Ok(())
    }

    fn player_info(&self, uuid: &str) -> Result<GameInfo, ControlError> {
        Err(Self::not_online(uuid))
    }

    fn install_plugin(&self, _plugin: &str, _version: Option<&str>) -> Result<(), ControlError> {
        Err(ControlError::Unsupported("plugin installation"))
    }

    fn remove_plugin(&self, _plugin: &str) -> Result<(), ControlError> {
        Err(ControlError::Unsupported("plugin removal"))
    }

    fn check_plugin_update(
        &self,
        _plugin: &str,
        _version: &str,
    ) -> Result<PluginUpdate, ControlError> {
        Ok(PluginUpdate::NotPublished)
    }

    fn online_plugins(&self) -> Result<Vec<Value>, ControlError> {
        Ok(Vec::new())
    }

    fn loaded_plugins(&self) -> Vec<String> {
        Vec::new()
    }

    fn stop(&self) -> Result<(), ControlError> {
        self.lifecycle.send_replace(Lifecycle::Stop);
        Ok(())
    }

    fn restart(&self) -> Result<(), ControlError> {
        self.lifecycle.send_replace(Lifecycle::Restart);
        Ok(())
    }
}
