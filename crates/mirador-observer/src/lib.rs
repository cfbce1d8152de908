//! Dashboard server for the Mirador state mirror.
//!
//! This crate provides an Axum HTTP server that exposes:
//!
//! - **`WebSocket` endpoint** (`/ws`) carrying the session protocol: a
//!   client logs in, receives the full state snapshot, then every patch
//!   in order, and sends requests back over the same socket
//! - **REST endpoints** for read-only inspection (`/api/state`)
//! - **Minimal HTML status page** (`GET /`)
//!
//! # Architecture
//!
//! Each socket runs one [`Session`](mirador_core::Session). Once synced,
//! the socket forwards its subscriber queue from the
//! [`SyncService`](mirador_core::SyncService); replies to the client's
//! own requests go through that same queue so they stay ordered with the
//! patches. Requests are handled in [`commands`] through the
//! [`ServerControl`](mirador_core::ServerControl) boundary and never
//! patch the tree directly.

pub mod commands;
pub mod error;
pub mod handlers;
pub mod router;
pub mod server;
pub mod startup;
pub mod state;
pub mod ws;

// Re-export primary types for convenience.
pub use router::build_router;
pub use server::{ServerConfig, ServerError};
pub use startup::spawn_observer;
pub use state::AppState;
