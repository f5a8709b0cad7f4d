//! Shared `Spawner`/`Instance` test double used across integration tests.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Once};

use apppool::{CollaboratorError, Instance};

static TRACING_INIT: Once = Once::new();

/// Install a `tracing-subscriber` fmt layer so pool log output (container
/// spawns, crash retries, restart purges) is visible with `--nocapture`.
/// Safe to call from every test; only the first call takes effect.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .init();
    });
}

pub struct CountingInstance {
    pub id: u64,
    pub always_fail_connect: bool,
    pub disposed: Arc<AtomicU64>,
}

impl Instance for CountingInstance {
    type Session = u64;

    fn connect(&self) -> Result<u64, CollaboratorError> {
        if self.always_fail_connect {
            Err("connection refused".into())
        } else {
            Ok(self.id)
        }
    }

    fn dispose(&self) -> Result<(), CollaboratorError> {
        self.disposed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// A `Spawner` that counts how many instances it has produced and lets a
/// test force the first `fail_first_n_connects` of them to always fail
/// `connect()` (simulating a crashing worker process).
pub struct CountingSpawner {
    next_id: AtomicU64,
    pub spawn_count: AtomicU64,
    pub disposed: Arc<AtomicU64>,
    pub fail_first_n_connects: usize,
}

impl CountingSpawner {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(0),
            spawn_count: AtomicU64::new(0),
            disposed: Arc::new(AtomicU64::new(0)),
            fail_first_n_connects: 0,
        }
    }

    pub fn with_connect_failures(fail_first_n_connects: usize) -> Self {
        Self {
            fail_first_n_connects,
            ..Self::new()
        }
    }
}

impl Default for CountingSpawner {
    fn default() -> Self {
        Self::new()
    }
}

impl apppool::Spawner for CountingSpawner {
    type Instance = CountingInstance;

    fn spawn(&self, _app_root: &str) -> Result<CountingInstance, CollaboratorError> {
        let spawned_so_far = self.spawn_count.fetch_add(1, Ordering::SeqCst);
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        Ok(CountingInstance {
            id,
            always_fail_connect: (spawned_so_far as usize) < self.fail_first_n_connects,
            disposed: Arc::clone(&self.disposed),
        })
    }
}
