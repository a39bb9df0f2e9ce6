//! Requests this side issued and is still waiting on.
//!
//! Each id maps to a single-resolution slot. The slot is removed on first match,
//! on timeout (by the waiter), and wholesale when the session ends. Every id
//! ever registered is also recorded in `IssuedIds`, which outlives the slot.

use dashmap::DashMap;
use tokio::sync::oneshot;

use wsrelay_core::protocol::Envelope;

use super::issued::IssuedIds;

#[derive(Default)]
pub struct PendingRequests {
    slots: DashMap<String, oneshot::Sender<Envelope>>,
    issued: IssuedIds,
}

impl PendingRequests {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, request_id: String) -> oneshot::Receiver<Envelope> {
        let (tx, rx) = oneshot::channel();
        self.issued.record(&request_id);
        self.slots.insert(request_id, tx);
        rx
    }

    /// Remember an id sent without a waiter (heartbeats).
    pub fn record_issued(&self, id: &str) {
        self.issued.record(id);
    }

    /// True for any recent id this side generated, answered or not.
    pub fn issued_here(&self, id: &str) -> bool {
        self.slots.contains_key(id) || self.issued.contains(id)
    }

    /// Hand `env` to its waiter. Gives the envelope back if nobody is waiting.
    pub fn resolve(&self, env: Envelope) -> Result<(), Envelope> {
        match self.slots.remove(&env.request_id) {
            Some((_, tx)) => tx.send(env),
            None => Err(env),
        }
    }

    pub fn cancel(&self, request_id: &str) {
        self.slots.remove(request_id);
    }

    /// Drop every slot; waiters observe the session closing.
    pub fn clear(&self) {
        self.slots.clear();
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
