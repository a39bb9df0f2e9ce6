use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use tokio::sync::mpsc::{self, error::TrySendError};

use super::HubMessage;

pub type ConnId = u64;

struct Peer {
    username: String,
    group: String,
    tx: mpsc::Sender<HubMessage>,
}

#[derive(Default)]
struct Inner {
    next_id: ConnId,
    peers: HashMap<ConnId, Peer>,
    groups: HashMap<String, HashSet<ConnId>>,
}

impl Inner {
    fn detach(&mut self, id: ConnId) -> Option<Peer> {
        let peer = self.peers.remove(&id)?;
        if let Some(members) = self.groups.get_mut(&peer.group) {
            members.remove(&id);
            if members.is_empty() {
                self.groups.remove(&peer.group);
            }
        }
        Some(peer)
    }

    fn group_size(&self, group: &str) -> usize {
        self.groups.get(group).map(HashSet::len).unwrap_or(0)
    }
}

/// What one broadcast did.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Delivery {
    pub delivered: usize,
    /// Queue full; this message was skipped for that peer.
    pub dropped: usize,
    /// Queue closed; the peer was removed.
    pub removed: usize,
}

/// Hub connections and their groups.
///
/// All mutation goes through `add`, `remove` and `broadcast`, each holding the
/// single lock for its whole duration, so counts read under that lock are
/// consistent with membership.
#[derive(Default)]
pub struct ConnectionRegistry {
    inner: Mutex<Inner>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, username: &str, group: &str, tx: mpsc::Sender<HubMessage>) -> ConnId {
        let mut inner = self.lock();
        inner.next_id += 1;
        let id = inner.next_id;
        inner.groups.entry(group.to_string()).or_default().insert(id);
        inner.peers.insert(
            id,
            Peer {
                username: username.to_string(),
                group: group.to_string(),
                tx,
            },
        );
        id
    }

    /// Unregister `id`. Returns false if it was already gone.
    pub fn remove(&self, id: ConnId) -> bool {
        self.lock().detach(id).is_some()
    }

    /// Queue `build(group_size, total)` to every member of `group`.
    ///
    /// Counts are taken after dead peers are pruned, so they describe the group
    /// the message actually reaches.
    pub fn broadcast<F>(&self, group: &str, build: F) -> Delivery
    where
        F: FnOnce(usize, usize) -> HubMessage,
    {
        let mut inner = self.lock();
        let Some(members) = inner.groups.get(group) else {
            return Delivery::default();
        };
        let members: Vec<ConnId> = members.iter().copied().collect();

        let mut out = Delivery::default();
        let closed: Vec<ConnId> = members
            .iter()
            .copied()
            .filter(|id| inner.peers.get(id).map(|p| p.tx.is_closed()).unwrap_or(true))
            .collect();
        for id in &closed {
            inner.detach(*id);
            out.removed += 1;
        }

        let msg = build(inner.group_size(group), inner.peers.len());
        for id in members.iter().filter(|id| !closed.contains(*id)) {
            let Some(peer) = inner.peers.get(id) else { continue };
            match peer.tx.try_send(msg.clone()) {
                Ok(()) => out.delivered += 1,
                Err(TrySendError::Full(_)) => out.dropped += 1,
                Err(TrySendError::Closed(_)) => {
                    inner.detach(*id);
                    out.removed += 1;
                }
            }
        }
        out
    }

    /// Message about `id` stamped with current counts, or `None` if unregistered.
    pub fn describe(&self, id: ConnId, msg_type: &str, content: &str) -> Option<HubMessage> {
        let inner = self.lock();
        let peer = inner.peers.get(&id)?;
        Some(HubMessage {
            msg_type: msg_type.to_string(),
            content: content.to_string(),
            group: peer.group.clone(),
            username: peer.username.clone(),
            group_size: inner.group_size(&peer.group),
            total_connections: inner.peers.len(),
        })
    }

    /// Current `(username, group)` of `id`.
    pub fn membership(&self, id: ConnId) -> Option<(String, String)> {
        let inner = self.lock();
        inner
            .peers
            .get(&id)
            .map(|p| (p.username.clone(), p.group.clone()))
    }

    pub fn total(&self) -> usize {
        self.lock().peers.len()
    }

    pub fn group_size(&self, group: &str) -> usize {
        self.lock().group_size(group)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // A panic while holding the lock leaves plain maps behind; keep serving them.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(size: usize, total: usize) -> HubMessage {
        HubMessage {
            msg_type: "group_update".into(),
            group_size: size,
            total_connections: total,
            ..HubMessage::default()
        }
    }

    #[test]
    fn empty_groups_are_dropped() {
        let reg = ConnectionRegistry::new();
        let (tx, _rx) = mpsc::channel(4);
        let id = reg.add("ann", "g1", tx);
        assert_eq!(reg.group_size("g1"), 1);
        assert!(reg.remove(id));
        assert!(!reg.remove(id));
        assert_eq!(reg.group_size("g1"), 0);
        assert_eq!(reg.total(), 0);
    }

    #[test]
    fn broadcast_prunes_closed_peers_before_counting() {
        let reg = ConnectionRegistry::new();
        let (tx1, mut rx1) = mpsc::channel(4);
        let (tx2, rx2) = mpsc::channel(4);
        reg.add("ann", "g1", tx1);
        reg.add("bob", "g1", tx2);
        drop(rx2);

        let d = reg.broadcast("g1", msg);
        assert_eq!(d, Delivery { delivered: 1, dropped: 0, removed: 1 });
        let got = rx1.try_recv().unwrap();
        assert_eq!(got.group_size, 1);
        assert_eq!(got.total_connections, 1);
    }
}
