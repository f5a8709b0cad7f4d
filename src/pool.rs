//! Pool core: the acquisition routine, the release routine, the sweeper,
//! and the single mutex + condition variable everything hangs off of.

use std::collections::HashMap;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use chrono::Utc;
use parking_lot::{Condvar, Mutex};
use tracing::{debug, trace, warn};

use crate::config::{AcquireOptions, PoolConfig, MAX_ATTEMPTS};
use crate::container::{Container, Node};
use crate::domain::Domain;
use crate::error::{Error, Result};
use crate::idle::IdleRegistry;
use crate::restart::RestartProbe;
use crate::session::Session;
use crate::slab::{Key, Slab};
use crate::spawner::{Instance, Spawner};

/// Point-in-time snapshot of the pool's counters, for observability and
/// tests. Reading it takes the lock briefly; it is not itself part of any
/// decision the pool makes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Total live Containers (`Σ domain.size`).
    pub count: usize,
    /// Containers with at least one open session.
    pub active: usize,
    /// Containers with zero open sessions (`count - active`).
    pub idle: usize,
    /// Threads currently parked in the global queueing wait.
    pub waiting_on_global_queue: usize,
    /// Total successful spawns over the pool's lifetime.
    pub spawned: u64,
    /// Total Containers permanently torn down (crash, retire, evict, sweep, restart).
    pub disposed: u64,
    /// Containers retired for hitting their Domain's `max_requests`.
    pub retired: u64,
    /// Containers evicted to make room for a different application root.
    pub evicted: u64,
    /// Containers discarded after a `connect()` failure.
    pub crashed: u64,
    /// Domains purged by a restart trigger.
    pub restarted: u64,
}

struct PoolState<S: Spawner> {
    arena: Slab<Node<S>>,
    domains: HashMap<Arc<str>, Domain>,
    idle: IdleRegistry,
    restart: RestartProbe,
    config: PoolConfig,
    count: usize,
    active: usize,
    waiting_on_global_queue: usize,
    shutting_down: bool,
    spawned: u64,
    disposed: u64,
    retired: u64,
    evicted: u64,
    crashed: u64,
    restarted: u64,
}

impl<S: Spawner> PoolState<S> {
    fn new(config: PoolConfig) -> Self {
        Self {
            arena: Slab::new(),
            domains: HashMap::new(),
            idle: IdleRegistry::default(),
            restart: RestartProbe::default(),
            config,
            count: 0,
            active: 0,
            waiting_on_global_queue: 0,
            shutting_down: false,
            spawned: 0,
            disposed: 0,
            retired: 0,
            evicted: 0,
            crashed: 0,
            restarted: 0,
        }
    }

    /// Perform the `sessions: 0 -> 1` transition exactly once, wherever the
    /// Container came from (reuse-idle, spawn). See SPEC_FULL.md §4.1a's
    /// note on `active` bookkeeping.
    fn activate(&mut self, key: Key) {
        if let Some(node) = self.arena.get_mut(key) {
            if node.container.sessions == 0 {
                self.active += 1;
            }
            node.container.sessions += 1;
            node.container.last_used = Utc::now();
        }
    }

    /// Spawn commit: insert a freshly spawned instance into its Domain
    /// (creating the Domain and seeding `max_requests` if this is the first
    /// Container for `app_root`), append to the tail, bump `count`.
    ///
    /// Always commits — see SPEC_FULL.md §5 "Re-validation at spawn commit".
    fn commit_spawned(
        &mut self,
        app_root: &Arc<str>,
        options: AcquireOptions,
        instance: S::Instance,
    ) -> Key {
        let container = Container::new(Arc::new(instance), Arc::clone(app_root));
        let key = self.arena.insert(Node::new(container));
        let domain = self
            .domains
            .entry(Arc::clone(app_root))
            .or_insert_with(|| Domain::new(Arc::clone(app_root), options.max_requests));
        domain.push_back(&mut self.arena, key);
        self.count += 1;
        self.spawned += 1;
        key
    }

    /// Detach `key` from its Domain (dropping the Domain if this empties it)
    /// and remove it from the arena. Does not touch the Idle Registry or
    /// `count`/`active` — callers that know the Container is idle must
    /// remove it from the Idle Registry themselves first.
    fn unlink_from_domain(&mut self, key: Key) -> Option<Arc<S::Instance>> {
        if let Some(app_root) = self.arena.get(key).map(|n| Arc::clone(&n.container.app_root)) {
            if let Some(domain) = self.domains.get_mut(&app_root) {
                domain.remove(&mut self.arena, key);
                if domain.is_empty() {
                    self.domains.remove(&app_root);
                    self.restart.forget(&app_root);
                }
            }
        }
        let instance = self.arena.remove(key).map(|n| n.container.instance);
        if instance.is_some() {
            self.disposed += 1;
        }
        instance
    }

    /// Tear down an entire Domain's Containers: detach each from the Idle
    /// Registry if idle, decrement `active` for each active one, remove
    /// from the arena, decrement `count`. Returns the torn-down instances
    /// for unlocked disposal.
    fn drain_domain(&mut self, app_root: &Arc<str>) -> Vec<Arc<S::Instance>> {
        let Some(domain) = self.domains.remove(app_root) else {
            return Vec::new();
        };
        self.restart.forget(app_root);

        let keys: Vec<Key> = domain.iter(&self.arena).collect();
        let mut disposed = Vec::with_capacity(keys.len());
        for key in keys {
            let is_idle = self
                .arena
                .get(key)
                .is_some_and(|n| n.container.is_idle());
            if is_idle {
                self.idle.remove(&mut self.arena, key);
            } else {
                self.active = self.active.saturating_sub(1);
            }
            if let Some(instance) = self.arena.remove(key).map(|n| n.container.instance) {
                self.disposed += 1;
                disposed.push(instance);
            }
            self.count = self.count.saturating_sub(1);
        }
        disposed
    }

    fn purge_for_restart(&mut self, app_root: &Arc<str>) -> Vec<Arc<S::Instance>> {
        let disposed = self.drain_domain(app_root);
        self.restarted += 1;
        disposed
    }

    /// Pop the global LRU idle victim and remove it entirely (§4.1a step 3).
    fn evict_victim(&mut self) -> Option<Arc<S::Instance>> {
        let key = self.idle.pop_front(&mut self.arena)?;
        let instance = self.unlink_from_domain(key);
        if instance.is_some() {
            self.count = self.count.saturating_sub(1);
            self.evicted += 1;
        }
        instance
    }

    /// Retire a Container that hit its Domain's `max_requests` (§4.2 step 3).
    fn retire(&mut self, key: Key) -> Option<Arc<S::Instance>> {
        let instance = self.unlink_from_domain(key);
        if instance.is_some() {
            self.count = self.count.saturating_sub(1);
            self.active = self.active.saturating_sub(1);
            self.retired += 1;
        }
        instance
    }

    /// Undo a failed `connect()` (§4.1 step 5): the Container never served a
    /// session, so it is discarded outright rather than returned to idle.
    fn undo_failed_connect(&mut self, key: Key) -> Option<Arc<S::Instance>> {
        let instance = self.unlink_from_domain(key);
        if instance.is_some() {
            self.count = self.count.saturating_sub(1);
            self.active = self.active.saturating_sub(1);
            self.crashed += 1;
        }
        instance
    }

    /// Sweeper pass (§4.3): retire every idle Container older than
    /// `max_idle_time`. `max_idle_time == 0` disables expiry.
    fn sweep_expired(&mut self) -> Vec<Arc<S::Instance>> {
        if self.config.max_idle_time.is_zero() {
            return Vec::new();
        }
        let Ok(max_idle) = chrono::Duration::from_std(self.config.max_idle_time) else {
            return Vec::new();
        };
        let cutoff = Utc::now() - max_idle;

        let expired: Vec<Key> = self
            .idle
            .iter(&self.arena)
            .filter(|&key| {
                self.arena
                    .get(key)
                    .is_some_and(|n| n.container.last_used < cutoff)
            })
            .collect();

        let mut disposed = Vec::with_capacity(expired.len());
        for key in expired {
            self.idle.remove(&mut self.arena, key);
            if let Some(instance) = self.unlink_from_domain(key) {
                self.count = self.count.saturating_sub(1);
                disposed.push(instance);
            }
        }
        disposed
    }
}

struct Inner<S: Spawner> {
    spawner: S,
    state: Mutex<PoolState<S>>,
    cond: Condvar,
}

/// An application-instance pool: one long-lived fleet of worker-process
/// handles per application root.
///
/// `Pool` itself cannot be cloned (it owns the sweeper thread's handle);
/// share it across threads by wrapping it in `Arc<Pool<S>>`.
pub struct Pool<S: Spawner> {
    inner: Arc<Inner<S>>,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl<S: Spawner> Pool<S> {
    /// Construct a pool, validating `config` and starting its sweeper
    /// thread.
    pub fn new(spawner: S, config: PoolConfig) -> Result<Self> {
        config.validate()?;
        let inner = Arc::new(Inner {
            spawner,
            state: Mutex::new(PoolState::new(config)),
            cond: Condvar::new(),
        });

        let sweeper_inner = Arc::clone(&inner);
        let handle = std::thread::spawn(move || sweeper_loop(&sweeper_inner));

        Ok(Self {
            inner,
            sweeper: Mutex::new(Some(handle)),
        })
    }

    /// Acquire a session for `app_root`, spawning, reusing, or waiting for
    /// capacity as the decision tree in SPEC_FULL.md §4.1a dictates.
    pub fn get(
        &self,
        app_root: &str,
        options: AcquireOptions,
    ) -> Result<Session<S>> {
        let app_root: Arc<str> = Arc::from(app_root);
        let mut attempts: u32 = 0;

        loop {
            attempts += 1;

            let (key, instance) = self.select_or_spawn(&app_root, options)?;

            match instance.connect() {
                Ok(session) => {
                    trace!(app_root = %app_root, attempts, "session acquired");
                    return Ok(Session::new(key, session));
                }
                Err(source) => {
                    self.undo_failed_connect(key);
                    if attempts >= MAX_ATTEMPTS {
                        return Err(Error::connect_failure(
                            app_root.to_string(),
                            attempts,
                            source,
                        ));
                    }
                    debug!(app_root = %app_root, attempts, "connect failed, retrying");
                }
            }
        }
    }

    /// Release a session obtained from `get` (§4.2). Consumes the session so
    /// a second `release` for the same acquisition cannot compile.
    pub fn release(&self, session: Session<S>) {
        let key = session.container;
        let disposed;

        {
            let mut state = self.inner.state.lock();

            let Some(app_root) = state
                .arena
                .get(key)
                .map(|n| Arc::clone(&n.container.app_root))
            else {
                // Purged by a restart or evicted while the session was in
                // flight: nothing left to release into (§7).
                return;
            };

            if let Some(node) = state.arena.get_mut(key) {
                node.container.processed += 1;
            }
            let processed = state.arena.get(key).map_or(0, |n| n.container.processed);
            let max_requests = state.domains.get(&app_root).map_or(0, |d| d.max_requests);

            disposed = if max_requests > 0 && processed >= max_requests {
                state.retire(key)
            } else {
                if let Some(node) = state.arena.get_mut(key) {
                    node.container.sessions = node.container.sessions.saturating_sub(1);
                    node.container.last_used = Utc::now();
                }
                let became_idle = state.arena.get(key).is_some_and(|n| n.container.is_idle());
                if became_idle {
                    if let Some(domain) = state.domains.get_mut(&app_root) {
                        domain.move_to_front(&mut state.arena, key);
                    }
                    state.idle.push_back(&mut state.arena, key);
                    state.active = state.active.saturating_sub(1);
                }
                None
            };

            self.inner.cond.notify_all();
        }

        if let Some(instance) = disposed {
            dispose_all(std::slice::from_ref(&instance));
        }
    }

    /// Signal the sweeper to stop, drain every Domain (active sessions are
    /// abandoned, not waited for), and join the sweeper thread.
    pub fn shutdown(&self) {
        let disposed = {
            let mut state = self.inner.state.lock();
            if state.shutting_down {
                return;
            }
            state.shutting_down = true;

            let roots: Vec<Arc<str>> = state.domains.keys().cloned().collect();
            let mut disposed = Vec::new();
            for root in roots {
                disposed.extend(state.drain_domain(&root));
            }
            self.inner.cond.notify_all();
            disposed
        };

        dispose_all(&disposed);

        if let Some(handle) = self.sweeper.lock().take() {
            let _ = handle.join();
        }
    }

    /// Update the global capacity cap. Effects apply on the next decision.
    pub fn set_max(&self, max: usize) -> Result<()> {
        if max == 0 {
            return Err(Error::configuration("max must be greater than zero"));
        }
        let mut state = self.inner.state.lock();
        state.config.max = max;
        self.inner.cond.notify_all();
        Ok(())
    }

    /// Update the per-Domain capacity cap (`0` disables the cap).
    pub fn set_max_per_app(&self, max_per_app: usize) {
        self.inner.state.lock().config.max_per_app = max_per_app;
        self.inner.cond.notify_all();
    }

    /// Switch between global queueing and overflow pile-on.
    pub fn set_use_global_queue(&self, use_global_queue: bool) {
        self.inner.state.lock().config.use_global_queue = use_global_queue;
    }

    /// Update the idle-eviction threshold (`Duration::ZERO` disables it).
    pub fn set_max_idle_time(&self, max_idle_time: Duration) {
        self.inner.state.lock().config.max_idle_time = max_idle_time;
    }

    /// Update the sweeper's wake interval.
    pub fn set_clean_interval(&self, clean_interval: Duration) -> Result<()> {
        if clean_interval.is_zero() {
            return Err(Error::configuration(
                "clean_interval must be greater than zero",
            ));
        }
        let mut state = self.inner.state.lock();
        state.config.clean_interval = clean_interval;
        self.inner.cond.notify_all();
        Ok(())
    }

    /// A point-in-time snapshot of the pool's counters.
    pub fn stats(&self) -> PoolStats {
        let state = self.inner.state.lock();
        PoolStats {
            count: state.count,
            active: state.active,
            idle: state.idle.len(),
            waiting_on_global_queue: state.waiting_on_global_queue,
            spawned: state.spawned,
            disposed: state.disposed,
            retired: state.retired,
            evicted: state.evicted,
            crashed: state.crashed,
            restarted: state.restarted,
        }
    }

    /// Implements §4.1a end to end: restart check, reuse-idle, overflow
    /// (queue or pile-on), spawn-into-existing-domain, or
    /// evict-then-spawn-new-domain. Always returns holding no lock, with the
    /// `sessions: 0 -> 1` transition (§4.1 step 3 / `activate`) already
    /// applied under the same lock acquisition that committed the Container,
    /// so no other thread ever observes a Container that is reachable from a
    /// Domain but missing from the Idle Registry while `sessions == 0`.
    fn select_or_spawn(
        &self,
        app_root: &Arc<str>,
        options: AcquireOptions,
    ) -> Result<(Key, Arc<S::Instance>)> {
        loop {
            let mut state = self.inner.state.lock();

            if state.shutting_down {
                return Err(Error::ShuttingDown {
                    app_root: app_root.to_string(),
                });
            }

            // Step 1: restart check.
            if state.domains.contains_key(app_root) && state.restart.needs_restart(app_root) {
                let disposed = state.purge_for_restart(app_root);
                drop(state);
                self.inner.spawner.reload(app_root);
                dispose_all(&disposed);
                continue; // proceed as if no Domain existed
            }

            if let Some(domain) = state.domains.get(app_root) {
                let head = domain.head;
                let head_idle = head.is_some_and(|k| {
                    state.arena.get(k).is_some_and(|n| n.container.is_idle())
                });

                if head_idle {
                    let key = head.expect("head_idle implies head is Some");
                    state.idle.remove(&mut state.arena, key);
                    if let Some(domain) = state.domains.get_mut(app_root) {
                        domain.move_to_back(&mut state.arena, key);
                    }
                    state.activate(key);
                    let instance = state.arena.get(key).map(|n| Arc::clone(&n.container.instance));
                    if let Some(instance) = instance {
                        return Ok((key, instance));
                    }
                    continue;
                }

                let over_global = state.count >= state.config.max;
                let over_per_app = state.config.max_per_app != 0 && domain.size >= state.config.max_per_app;

                if over_global || over_per_app {
                    if state.config.use_global_queue {
                        state.waiting_on_global_queue += 1;
                        self.inner.cond.wait(&mut state);
                        state.waiting_on_global_queue -= 1;
                        continue;
                    }

                    if let Some(key) = domain.least_loaded(&state.arena) {
                        if let Some(domain) = state.domains.get_mut(app_root) {
                            domain.move_to_back(&mut state.arena, key);
                        }
                        state.activate(key);
                        let instance =
                            state.arena.get(key).map(|n| Arc::clone(&n.container.instance));
                        if let Some(instance) = instance {
                            return Ok((key, instance));
                        }
                    }
                    continue;
                }

                drop(state);
                let instance = self
                    .inner
                    .spawner
                    .spawn(app_root)
                    .map_err(|source| Error::spawn_failure(app_root.to_string(), 1, source))?;
                let mut state = self.inner.state.lock();
                let key = state.commit_spawned(app_root, options, instance);
                state.activate(key);
                let instance = state
                    .arena
                    .get(key)
                    .map(|n| Arc::clone(&n.container.instance))
                    .expect("just inserted");
                return Ok((key, instance));
            }

            // No Domain for this root.
            if state.active >= state.config.max {
                self.inner.cond.wait(&mut state);
                continue;
            }

            let evicted = if state.count >= state.config.max {
                state.evict_victim()
            } else {
                None
            };
            drop(state);
            if let Some(victim) = evicted {
                dispose_all(std::slice::from_ref(&victim));
            }

            let instance = self
                .inner
                .spawner
                .spawn(app_root)
                .map_err(|source| Error::spawn_failure(app_root.to_string(), 1, source))?;
            let mut state = self.inner.state.lock();
            let key = state.commit_spawned(app_root, options, instance);
            state.activate(key);
            let instance = state
                .arena
                .get(key)
                .map(|n| Arc::clone(&n.container.instance))
                .expect("just inserted");
            return Ok((key, instance));
        }
    }

    fn undo_failed_connect(&self, key: Key) {
        let instance = {
            let mut state = self.inner.state.lock();
            let instance = state.undo_failed_connect(key);
            self.inner.cond.notify_all();
            instance
        };
        if let Some(instance) = instance {
            dispose_all(std::slice::from_ref(&instance));
        }
    }
}

fn sweeper_loop<S: Spawner>(inner: &Inner<S>) {
    loop {
        let disposed = {
            let mut state = inner.state.lock();
            if state.shutting_down {
                return;
            }
            let timeout = state.config.clean_interval;
            inner.cond.wait_for(&mut state, timeout);
            if state.shutting_down {
                return;
            }
            state.sweep_expired()
        };
        dispose_all(&disposed);
    }
}

fn dispose_all<I: Instance>(instances: &[Arc<I>]) {
    for instance in instances {
        if let Err(err) = instance.dispose() {
            warn!(error = %err, "instance disposal failed");
        }
    }
}
