//! Per-instance bookkeeping and the intrusive-list node it lives in.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::slab::Key;
use crate::spawner::Spawner;

/// Pool bookkeeping wrapper around a live [`crate::spawner::Instance`].
///
/// A Container is never reused across Instances: once removed from the
/// arena it is gone for good (see [`crate::slab::Slab`]).
pub(crate) struct Container<S: Spawner> {
    pub(crate) instance: Arc<S::Instance>,
    pub(crate) app_root: Arc<str>,
    pub(crate) sessions: usize,
    pub(crate) processed: u64,
    pub(crate) last_used: DateTime<Utc>,
    pub(crate) start_time: DateTime<Utc>,
}

impl<S: Spawner> Container<S> {
    pub(crate) fn new(instance: Arc<S::Instance>, app_root: Arc<str>) -> Self {
        let now = Utc::now();
        Self {
            instance,
            app_root,
            sessions: 0,
            processed: 0,
            last_used: now,
            start_time: now,
        }
    }

    pub(crate) fn is_idle(&self) -> bool {
        self.sessions == 0
    }
}

/// Arena entry: a Container plus the four cursors threading it through its
/// Domain's list and (when idle) the pool-wide Idle Registry.
///
/// Keeping both linkages on the same node, rather than in separate
/// `HashMap<Key, _>` side tables, is what gives insertion/removal their O(1)
/// cost without extra lookups (SPEC_FULL.md §9, representation (b)).
pub(crate) struct Node<S: Spawner> {
    pub(crate) container: Container<S>,
    pub(crate) dom_prev: Option<Key>,
    pub(crate) dom_next: Option<Key>,
    pub(crate) idle_prev: Option<Key>,
    pub(crate) idle_next: Option<Key>,
}

impl<S: Spawner> Node<S> {
    pub(crate) fn new(container: Container<S>) -> Self {
        Self {
            container,
            dom_prev: None,
            dom_next: None,
            idle_prev: None,
            idle_next: None,
        }
    }
}
