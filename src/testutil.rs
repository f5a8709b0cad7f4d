//! Minimal `Spawner`/`Instance` stand-in shared by the colocated unit tests
//! in `container.rs`, `domain.rs`, and `idle.rs`, none of which care about
//! real process spawning.

use crate::spawner::{CollaboratorError, Instance, Spawner};

pub(crate) struct NoopInstance;

impl Instance for NoopInstance {
    type Session = ();

    fn connect(&self) -> Result<(), CollaboratorError> {
        Ok(())
    }
}

pub(crate) struct NoopSpawner;

impl Spawner for NoopSpawner {
    type Instance = NoopInstance;

    fn spawn(&self, _app_root: &str) -> Result<NoopInstance, CollaboratorError> {
        Ok(NoopInstance)
    }
}
