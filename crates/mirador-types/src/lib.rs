//! Shared type definitions for the Mirador state mirror.
//!
//! This crate is the single source of truth for the values that cross the
//! wire between the panel server and dashboard clients. Protocol types flow
//! downstream to `TypeScript` via `ts-rs` for the dashboard.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe UUID wrappers for sessions and subscribers
//! - [`path`] -- Keys and paths addressing nodes of the state tree
//! - [`patch`] -- The change records emitted for every tree mutation
//! - [`protocol`] -- Server events and client requests on the socket

pub mod ids;
pub mod patch;
pub mod path;
pub mod protocol;

// Re-export all public types at crate root for convenience.
pub use ids::{SessionId, SubscriberId};
pub use patch::{DeleteMarker, Patch};
pub use path::{Key, Path};
pub use protocol::{ClientRequest, PluginUpdate, ServerEvent, ToastLevel};
