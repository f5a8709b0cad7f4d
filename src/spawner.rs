//! Collaborator traits the pool delegates process management to.
//!
//! The pool core never knows how an `Instance` is produced, how it accepts a
//! connection, or how it is torn down; those are supplied by the embedding
//! application, mirroring the `Resource`/`Config` split the rest of the
//! ambient stack uses for pluggable backends.

use std::error::Error as StdError;

/// A boxed collaborator error; kept type-erased so `Spawner`/`Instance`
/// implementors aren't forced into this crate's `Error` type for their own
/// failure modes.
pub type CollaboratorError = Box<dyn StdError + Send + Sync>;

/// A live worker-process handle owned by exactly one Container.
pub trait Instance: Send + Sync + 'static {
    /// The session type handed back to callers of `Pool::get`.
    type Session: Send + 'static;

    /// Open a new session against this instance.
    fn connect(&self) -> Result<Self::Session, CollaboratorError>;

    /// Tear down this instance. Called at most once, after the Container
    /// wrapping it has already been unlinked from the pool, so a slow
    /// teardown never holds the pool lock. A failure here cannot be
    /// retried; the pool logs it and moves on (§4.6).
    fn dispose(&self) -> Result<(), CollaboratorError> {
        Ok(())
    }
}

/// Produces and reloads [`Instance`]s for a given application root.
pub trait Spawner: Send + Sync + 'static {
    /// The instance type this spawner produces.
    type Instance: Instance;

    /// Spawn a new instance for `app_root`. May take arbitrary time; the
    /// pool calls this with its lock released (§5).
    fn spawn(&self, app_root: &str) -> Result<Self::Instance, CollaboratorError>;

    /// Notify the spawner that a restart trigger fired for `app_root` and
    /// its Domain has been purged. Best-effort; the pool does not block on
    /// or retry this call.
    fn reload(&self, _app_root: &str) {}
}
