//! Error types surfaced by the pool.

use thiserror::Error;

/// Result type for pool operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced to callers of [`crate::Pool`].
///
/// `CapacityExhausted` from the design is deliberately absent here: the pool
/// never surfaces it, treating capacity pressure as a wait condition instead
/// (see the acquisition algorithm's capacity-wait branches).
#[derive(Error, Debug)]
pub enum Error {
    /// The spawner failed to produce an `Instance`.
    #[error("spawn failed for '{app_root}' after {attempts} attempt(s): {source}")]
    SpawnFailure {
        /// The application root the spawn was for.
        app_root: String,
        /// How many `get` attempts had already been made when this occurred.
        attempts: u32,
        /// The underlying error raised by the spawner.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// An instance accepted a slot but `connect()` failed on every retry.
    #[error("connect failed for '{app_root}' after {attempts} attempt(s): {source}")]
    ConnectFailure {
        /// The application root being connected to.
        app_root: String,
        /// Total attempts made, capped at `MAX_ATTEMPTS`.
        attempts: u32,
        /// The underlying error raised by the last failed `connect()`.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A setter or `Pool::new` received an invalid configuration value.
    #[error("invalid configuration: {message}")]
    ConfigurationError {
        /// Human-readable description of what was invalid.
        message: String,
    },

    /// `get` was called on a pool that has been (or is being) shut down.
    #[error("pool is shutting down, cannot acquire a session for '{app_root}'")]
    ShuttingDown {
        /// The application root the caller tried to acquire.
        app_root: String,
    },
}

impl Error {
    pub(crate) fn spawn_failure(
        app_root: impl Into<String>,
        attempts: u32,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        Self::SpawnFailure {
            app_root: app_root.into(),
            attempts,
            source,
        }
    }

    pub(crate) fn connect_failure(
        app_root: impl Into<String>,
        attempts: u32,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        Self::ConnectFailure {
            app_root: app_root.into(),
            attempts,
            source,
        }
    }

    /// Construct a [`Error::ConfigurationError`].
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::ConfigurationError {
            message: message.into(),
        }
    }

    /// Whether retrying the same call might succeed without caller action.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ConnectFailure { .. })
    }

    /// The application root this error relates to, if any.
    #[must_use]
    pub fn app_root(&self) -> Option<&str> {
        match self {
            Self::SpawnFailure { app_root, .. }
            | Self::ConnectFailure { app_root, .. }
            | Self::ShuttingDown { app_root, .. } => Some(app_root),
            Self::ConfigurationError { .. } => None,
        }
    }
}
