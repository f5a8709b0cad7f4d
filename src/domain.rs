//! Per-application-root aggregate of Containers.

use std::sync::Arc;

use crate::container::Node;
use crate::slab::{Key, Slab};
use crate::spawner::Spawner;

/// Per-application-root aggregate: an ordered list of Containers plus the
/// per-Domain request cap seeded from the first caller to create it.
///
/// List order is idle-before-active (SPEC_FULL.md §3 invariant 3, resolved
/// reading): `head` is the best idle-reuse candidate, `tail` is the most
/// recently touched overflow recipient.
pub(crate) struct Domain {
    pub(crate) app_root: Arc<str>,
    pub(crate) head: Option<Key>,
    pub(crate) tail: Option<Key>,
    pub(crate) size: usize,
    /// `0` means unlimited; seeded once from the first caller's
    /// `AcquireOptions` and frozen until this Domain is destroyed.
    pub(crate) max_requests: u64,
}

impl Domain {
    pub(crate) fn new(app_root: Arc<str>, max_requests: u64) -> Self {
        Self {
            app_root,
            head: None,
            tail: None,
            size: 0,
            max_requests,
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Splice `key` onto the tail (most-recently-touched end).
    pub(crate) fn push_back<S: Spawner>(&mut self, arena: &mut Slab<Node<S>>, key: Key) {
        let old_tail = self.tail;
        if let Some(node) = arena.get_mut(key) {
            node.dom_prev = old_tail;
            node.dom_next = None;
        }
        if let Some(tail_node) = old_tail.and_then(|k| arena.get_mut(k)) {
            tail_node.dom_next = Some(key);
        } else {
            self.head = Some(key);
        }
        self.tail = Some(key);
        self.size += 1;
    }

    /// Splice `key` onto the head (idle-reuse end).
    pub(crate) fn push_front<S: Spawner>(&mut self, arena: &mut Slab<Node<S>>, key: Key) {
        let old_head = self.head;
        if let Some(node) = arena.get_mut(key) {
            node.dom_next = old_head;
            node.dom_prev = None;
        }
        if let Some(head_node) = old_head.and_then(|k| arena.get_mut(k)) {
            head_node.dom_prev = Some(key);
        } else {
            self.tail = Some(key);
        }
        self.head = Some(key);
        self.size += 1;
    }

    /// Detach `key` from this Domain's list in O(1). No-op if `key` is not
    /// present (callers are expected to already know membership).
    pub(crate) fn remove<S: Spawner>(&mut self, arena: &mut Slab<Node<S>>, key: Key) {
        let (prev, next) = match arena.get(key) {
            Some(node) => (node.dom_prev, node.dom_next),
            None => return,
        };

        match prev {
            Some(prev_key) => {
                if let Some(prev_node) = arena.get_mut(prev_key) {
                    prev_node.dom_next = next;
                }
            }
            None => self.head = next,
        }
        match next {
            Some(next_key) => {
                if let Some(next_node) = arena.get_mut(next_key) {
                    next_node.dom_prev = prev;
                }
            }
            None => self.tail = prev,
        }

        if let Some(node) = arena.get_mut(key) {
            node.dom_prev = None;
            node.dom_next = None;
        }
        self.size = self.size.saturating_sub(1);
    }

    /// Move `key`, already a member of this Domain, to the tail.
    pub(crate) fn move_to_back<S: Spawner>(&mut self, arena: &mut Slab<Node<S>>, key: Key) {
        self.remove(arena, key);
        self.push_back(arena, key);
    }

    /// Move `key`, already a member of this Domain, to the head.
    pub(crate) fn move_to_front<S: Spawner>(&mut self, arena: &mut Slab<Node<S>>, key: Key) {
        self.remove(arena, key);
        self.push_front(arena, key);
    }

    /// Iterate this Domain's members head-to-tail.
    pub(crate) fn iter<'a, S: Spawner>(
        &self,
        arena: &'a Slab<Node<S>>,
    ) -> impl Iterator<Item = Key> + 'a {
        let mut current = self.head;
        std::iter::from_fn(move || {
            let key = current?;
            current = arena.get(key).and_then(|n| n.dom_next);
            Some(key)
        })
    }

    /// The Container in this Domain with the smallest session count,
    /// breaking ties by earliest position in the list (overflow pile-on
    /// victim selection, §4.1a step 2).
    pub(crate) fn least_loaded<S: Spawner>(&self, arena: &Slab<Node<S>>) -> Option<Key> {
        self.iter(arena)
            .min_by_key(|&key| arena.get(key).map_or(usize::MAX, |n| n.container.sessions))
    }
}
