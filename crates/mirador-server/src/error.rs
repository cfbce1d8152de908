//! Error types for the panel binary.

/// Top-level error for the panel binary.
///
/// Each variant wraps a specific subsystem error, providing a single
/// error type that `main` can propagate with `?`.
#[derive(Debug, thiserror::Error)]
pub enum ServerAppError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: mirador_core::ConfigError,
    },

    /// The state tree could not be built or updated.
    #[error("sync error: {source}")]
    Sync {
        /// The underlying sync error.
        #[from]
        source: mirador_core::SyncError,
    },

    /// The dashboard server failed to start.
    #[error("dashboard server error: {source}")]
    Observer {
        /// The underlying server error.
        #[from]
        source: mirador_observer::ServerError,
    },

    /// Installing a signal handler failed.
    #[error("signal error: {message}")]
    Signal {
        /// Description of the failure.
        message: String,
    },
}
