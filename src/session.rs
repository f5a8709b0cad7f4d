//! The value returned by [`crate::Pool::get`].

use crate::slab::Key;
use crate::spawner::{Instance, Spawner};

/// A single client↔instance conversation, opaque to the pool apart from the
/// Container handle it carries back to `release`.
///
/// Move-only by construction: there is no way to obtain a second `Session`
/// for the same acquisition, which is what makes the common double-release
/// mistake a compile error rather than a runtime bug (§4.2).
pub struct Session<S: Spawner> {
    pub(crate) container: Key,
    inner: <S::Instance as Instance>::Session,
}

impl<S: Spawner> Session<S> {
    pub(crate) fn new(container: Key, inner: <S::Instance as Instance>::Session) -> Self {
        Self { container, inner }
    }

    /// Consume the session, handing back the collaborator-level value
    /// without releasing the Container. Using this instead of `Pool::release`
    /// leaks the Container until the sweeper or a restart purge reclaims it;
    /// prefer `Pool::release` unless you have a specific reason not to.
    #[must_use]
    pub fn into_inner(self) -> <S::Instance as Instance>::Session {
        self.inner
    }
}

impl<S: Spawner> std::ops::Deref for Session<S> {
    type Target = <S::Instance as Instance>::Session;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl<S: Spawner> std::ops::DerefMut for Session<S> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.inner
    }
}
