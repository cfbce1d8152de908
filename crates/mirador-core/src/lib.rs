//! Synchronization core for the Mirador state mirror.
//!
//! This crate binds the observed tree to its subscribers and carries the
//! domain model the dashboard renders.
//!
//! # Modules
//!
//! - [`sync`] -- The mutation service and per-subscriber patch fan-out
//! - [`session`] -- Connection state machine and snapshot bootstrap
//! - [`dashboard`] -- Typed setters over the dashboard's tree layout
//! - [`control`] -- The game-server boundary used by client requests
//! - [`sampler`] -- Periodic CPU/RAM sampling into a sliding window
//! - [`permissions`] -- Reloads the permissions file when it changes
//! - [`host`] -- Probes of the machine and process the panel runs in
//! - [`config`] -- YAML configuration with environment overrides
//!
//! # Ordering
//!
//! All tree mutations are serialized through one lock in
//! [`SyncService`](sync::SyncService). Attaching a subscriber takes the same
//! lock, queues the full snapshot, and registers the subscriber before any
//! further mutation can run, so every subscriber sees its snapshot followed
//! by a gap-free, duplicate-free suffix of the global patch order.

pub mod config;
pub mod control;
pub mod dashboard;
pub mod host;
pub mod permissions;
pub mod sampler;
pub mod session;
pub mod sync;

pub use config::{ConfigError, PanelConfig};
pub use control::{plugin_display_name, ControlError, GameInfo, ServerControl};
pub use dashboard::{Dashboard, LanguageTable, PlayerProfile, ServerInfo};
pub use host::HostInfo;
pub use permissions::PermissionsWatcher;
pub use sampler::{ProcfsProbe, ResourceProbe, ResourceSampler};
pub use session::{Session, SessionError, SessionPhase};
pub use sync::{Fanout, Subscription, SyncError, SyncService};
