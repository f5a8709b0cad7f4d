//! Pool-wide ordered list of Containers with zero open sessions.
//!
//! Ordered oldest-idle-first: the head is the global LRU eviction victim
//! (§4.1a step 3), the tail is where a container that just went idle is
//! inserted (§4.2 step 4).

use crate::container::Node;
use crate::slab::{Key, Slab};
use crate::spawner::Spawner;

#[derive(Default)]
pub(crate) struct IdleRegistry {
    head: Option<Key>,
    tail: Option<Key>,
    len: usize,
}

impl IdleRegistry {
    pub(crate) fn len(&self) -> usize {
        self.len
    }

    pub(crate) fn push_back<S: Spawner>(&mut self, arena: &mut Slab<Node<S>>, key: Key) {
        let old_tail = self.tail;
        if let Some(node) = arena.get_mut(key) {
            node.idle_prev = old_tail;
            node.idle_next = None;
        }
        if let Some(tail_node) = old_tail.and_then(|k| arena.get_mut(k)) {
            tail_node.idle_next = Some(key);
        } else {
            self.head = Some(key);
        }
        self.tail = Some(key);
        self.len += 1;
    }

    /// Remove `key` from the registry in O(1).
    ///
    /// Callers only ever invoke this on a Container known to be idle
    /// (`sessions == 0`, invariant 4), so membership is never ambiguous.
    pub(crate) fn remove<S: Spawner>(&mut self, arena: &mut Slab<Node<S>>, key: Key) {
        let (prev, next) = match arena.get(key) {
            Some(node) => (node.idle_prev, node.idle_next),
            None => return,
        };

        match prev {
            Some(prev_key) => {
                if let Some(prev_node) = arena.get_mut(prev_key) {
                    prev_node.idle_next = next;
                }
            }
            None => self.head = next,
        }
        match next {
            Some(next_key) => {
                if let Some(next_node) = arena.get_mut(next_key) {
                    next_node.idle_prev = prev;
                }
            }
            None => self.tail = prev,
        }

        if let Some(node) = arena.get_mut(key) {
            node.idle_prev = None;
            node.idle_next = None;
        }
        self.len = self.len.saturating_sub(1);
    }

    /// Pop the longest-idle Container (global LRU victim).
    pub(crate) fn pop_front<S: Spawner>(&mut self, arena: &mut Slab<Node<S>>) -> Option<Key> {
        let key = self.head?;
        self.remove(arena, key);
        Some(key)
    }

    pub(crate) fn iter<'a, S: Spawner>(
        &self,
        arena: &'a Slab<Node<S>>,
    ) -> impl Iterator<Item = Key> + 'a {
        let mut current = self.head;
        std::iter::from_fn(move || {
            let key = current?;
            current = arena.get(key).and_then(|n| n.idle_next);
            Some(key)
        })
    }
}
