//! Correlation ids this side generated, heartbeats and outbound requests alike.
//!
//! Kept apart from the waiter table: a waiter goes away on timeout and a
//! heartbeat slot is overwritten on the next tick, but a late echo carrying
//! either id is still a response and must never be dispatched.

use std::collections::{HashSet, VecDeque};
use std::sync::Mutex;

/// Ids remembered per session before the oldest are forgotten.
pub const ISSUED_CAPACITY: usize = 1024;

#[derive(Default)]
struct Ring {
    order: VecDeque<String>,
    ids: HashSet<String>,
}

/// Bounded FIFO set of issued ids.
pub struct IssuedIds {
    capacity: usize,
    inner: Mutex<Ring>,
}

impl Default for IssuedIds {
    fn default() -> Self {
        Self::with_capacity(ISSUED_CAPACITY)
    }
}

impl IssuedIds {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            inner: Mutex::new(Ring::default()),
        }
    }

    pub fn record(&self, id: &str) {
        let mut ring = self.lock();
        if !ring.ids.insert(id.to_string()) {
            return;
        }
        ring.order.push_back(id.to_string());
        while ring.order.len() > self.capacity {
            if let Some(oldest) = ring.order.pop_front() {
                ring.ids.remove(&oldest);
            }
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.lock().ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.lock().order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Ring> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn oldest_ids_are_forgotten_past_capacity() {
        let ids = IssuedIds::with_capacity(2);
        ids.record("a");
        ids.record("b");
        ids.record("b");
        assert_eq!(ids.len(), 2);

        ids.record("c");
        assert!(!ids.contains("a"));
        assert!(ids.contains("b"));
        assert!(ids.contains("c"));
        assert_eq!(ids.len(), 2);
    }
}
