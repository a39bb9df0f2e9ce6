//! Hub WebSocket handler.
//!
//! Responsibilities:
//! - Upgrade HTTP -> WS and register the peer under `username`/`group`
//! - Status heartbeat every `hub.heartbeat_interval_ms`
//! - join-group / leave-group broadcasts, echo for everything else
//! - Unregister on disconnect or process shutdown

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{ws::Message, ws::WebSocket, ws::WebSocketUpgrade, Query, State},
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, info, warn, Instrument};

use crate::app_state::AppState;
use crate::obs::RelayMetrics;
use crate::session::{heartbeat, shutdown_signalled};

use super::{
    ConnId, ConnectionRegistry, HubMessage, TYPE_CHAT, TYPE_GROUP_UPDATE, TYPE_HEARTBEAT,
    TYPE_JOIN, TYPE_LEAVE,
};

#[derive(Debug, Deserialize)]
pub struct HubQuery {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub group: String,
}

/// One connected peer's view of the registry.
///
/// `id` is `None` after the peer left its group; it stays connected and keeps
/// getting echoes, but no heartbeats or broadcasts.
pub struct HubPeer {
    registry: Arc<ConnectionRegistry>,
    metrics: Arc<RelayMetrics>,
    tx: mpsc::Sender<HubMessage>,
    username: String,
    id: Option<ConnId>,
}

impl HubPeer {
    pub fn join(
        registry: Arc<ConnectionRegistry>,
        metrics: Arc<RelayMetrics>,
        username: &str,
        group: &str,
        tx: mpsc::Sender<HubMessage>,
    ) -> Self {
        let mut peer = Self {
            registry,
            metrics,
            tx,
            username: username.to_string(),
            id: None,
        };
        peer.register(group);
        peer
    }

    pub fn id(&self) -> Option<ConnId> {
        self.id
    }

    /// Status message for the periodic heartbeat.
    pub fn heartbeat(&self) -> Option<HubMessage> {
        self.registry.describe(self.id?, TYPE_HEARTBEAT, "ping")
    }

    /// Apply one inbound message. Returns a reply meant only for this peer.
    pub fn on_message(&mut self, msg: HubMessage) -> Option<HubMessage> {
        match msg.msg_type.as_str() {
            TYPE_JOIN => {
                if !msg.username.is_empty() {
                    self.username = msg.username;
                }
                let group = match (msg.group.is_empty(), self.current_group()) {
                    (false, _) => msg.group,
                    (true, Some(current)) => current,
                    (true, None) => {
                        debug!("join-group without a group; ignored");
                        return None;
                    }
                };
                self.unregister();
                self.register(&group);
                self.announce(&group, format!("{} joined the group.", self.username));
                None
            }
            TYPE_LEAVE => {
                let group = self.current_group()?;
                self.announce(&group, format!("{} left the group.", self.username));
                self.unregister();
                None
            }
            _ => Some(self.echo(msg.content)),
        }
    }

    pub fn leave(&mut self) {
        self.unregister();
    }

    fn echo(&self, content: String) -> HubMessage {
        if let Some(status) = self.id.and_then(|id| self.registry.describe(id, TYPE_CHAT, "")) {
            return HubMessage { content, ..status };
        }
        HubMessage {
            msg_type: TYPE_CHAT.to_string(),
            content,
            username: self.username.clone(),
            total_connections: self.registry.total(),
            ..HubMessage::default()
        }
    }

    fn current_group(&self) -> Option<String> {
        self.registry.membership(self.id?).map(|(_, group)| group)
    }

    fn register(&mut self, group: &str) {
        self.id = Some(self.registry.add(&self.username, group, self.tx.clone()));
        self.metrics.hub_connections.inc(&[]);
    }

    fn unregister(&mut self) {
        if let Some(id) = self.id.take() {
            if self.registry.remove(id) {
                self.metrics.hub_connections.dec(&[]);
            }
        }
    }

    fn announce(&self, group: &str, content: String) {
        let username = self.username.clone();
        let group_name = group.to_string();
        let d = self.registry.broadcast(group, move |group_size, total_connections| HubMessage {
            msg_type: TYPE_GROUP_UPDATE.to_string(),
            content,
            group: group_name,
            username,
            group_size,
            total_connections,
        });
        if d.dropped > 0 {
            self.metrics.hub_broadcast_drops.add(&[], d.dropped as u64);
            warn!(group, dropped = d.dropped, "hub broadcast skipped full peer queues");
        }
        if d.removed > 0 {
            self.metrics.hub_connections.add(&[], -(d.removed as i64));
        }
    }
}

impl Drop for HubPeer {
    fn drop(&mut self) {
        self.unregister();
    }
}

pub async fn hub_upgrade(
    State(app): State<AppState>,
    ws: WebSocketUpgrade,
    Query(q): Query<HubQuery>,
) -> Response {
    ws.on_upgrade(move |socket| {
        let span = tracing::info_span!("hub_peer", username = %q.username, group = %q.group);
        run_peer(app, q, socket).instrument(span)
    })
}

async fn run_peer(app: AppState, q: HubQuery, socket: WebSocket) {
    if q.username.is_empty() || q.group.is_empty() {
        warn!("username or group missing; closing");
        return;
    }

    let hub = &app.cfg().hub;
    let (tx, mut out_rx) = mpsc::channel::<HubMessage>(hub.queue_capacity);
    let mut peer = HubPeer::join(app.hub(), app.metrics(), &q.username, &q.group, tx);
    let (mut ws_tx, mut ws_rx) = socket.split();
    let mut tick = heartbeat::schedule(Duration::from_millis(hub.heartbeat_interval_ms));
    let mut shutdown = app.shutdown();
    info!("hub peer connected");

    loop {
        let outgoing = tokio::select! {
            biased;

            _ = shutdown_signalled(&mut shutdown) => break,

            _ = tick.tick() => match peer.heartbeat() {
                Some(hb) => hb,
                None => continue,
            },

            Some(out) = out_rx.recv() => out,

            incoming = ws_rx.next() => {
                let Some(Ok(msg)) = incoming else { break };
                let parsed = match &msg {
                    Message::Text(text) => serde_json::from_str::<HubMessage>(text),
                    Message::Binary(bytes) => serde_json::from_slice::<HubMessage>(bytes),
                    Message::Close(_) => break,
                    // axum answers pings itself
                    Message::Ping(_) | Message::Pong(_) => continue,
                };
                match parsed {
                    Ok(m) => match peer.on_message(m) {
                        Some(reply) => reply,
                        None => continue,
                    },
                    Err(e) => {
                        warn!(error = %e, "malformed hub message skipped");
                        continue;
                    }
                }
            }
        };

        let text = match serde_json::to_string(&outgoing) {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "hub message encode failed");
                continue;
            }
        };
        if ws_tx.send(Message::Text(text)).await.is_err() {
            break;
        }
    }

    peer.leave();
    info!("hub peer disconnected");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peer(reg: &Arc<ConnectionRegistry>, user: &str, group: &str) -> (HubPeer, mpsc::Receiver<HubMessage>) {
        let (tx, rx) = mpsc::channel(8);
        let metrics = Arc::new(RelayMetrics::default());
        (HubPeer::join(Arc::clone(reg), metrics, user, group, tx), rx)
    }

    fn msg(msg_type: &str, user: &str, group: &str, content: &str) -> HubMessage {
        HubMessage {
            msg_type: msg_type.into(),
            username: user.into(),
            group: group.into(),
            content: content.into(),
            ..HubMessage::default()
        }
    }

    #[test]
    fn echo_carries_group_counts() {
        let reg = Arc::new(ConnectionRegistry::new());
        let (mut ann, _rx_a) = peer(&reg, "ann", "g1");
        let (_bob, _rx_b) = peer(&reg, "bob", "g2");

        let reply = ann.on_message(msg("hello", "", "", "hi")).unwrap();
        assert_eq!(reply.msg_type, "chat");
        assert_eq!(reply.content, "hi");
        assert_eq!(reply.username, "ann");
        assert_eq!(reply.group, "g1");
        assert_eq!(reply.group_size, 1);
        assert_eq!(reply.total_connections, 2);
    }

    #[test]
    fn join_moves_peer_and_notifies_new_group() {
        let reg = Arc::new(ConnectionRegistry::new());
        let (mut ann, mut rx_a) = peer(&reg, "ann", "g1");
        let (_bob, mut rx_b) = peer(&reg, "bob", "g2");

        assert!(ann.on_message(msg(TYPE_JOIN, "ann", "g2", "")).is_none());
        assert_eq!(reg.group_size("g1"), 0);
        assert_eq!(reg.group_size("g2"), 2);

        for rx in [&mut rx_a, &mut rx_b] {
            let update = rx.try_recv().unwrap();
            assert_eq!(update.msg_type, "group_update");
            assert_eq!(update.content, "ann joined the group.");
            assert_eq!(update.group_size, 2);
        }
    }

    #[test]
    fn leave_announces_then_unregisters() {
        let reg = Arc::new(ConnectionRegistry::new());
        let (mut ann, mut rx_a) = peer(&reg, "ann", "g1");
        let (_bob, mut rx_b) = peer(&reg, "bob", "g1");

        assert!(ann.on_message(msg(TYPE_LEAVE, "ann", "g1", "")).is_none());
        let update = rx_b.try_recv().unwrap();
        assert_eq!(update.content, "ann left the group.");
        assert_eq!(update.group_size, 2);
        assert!(rx_a.try_recv().is_ok());

        assert!(ann.id().is_none());
        assert!(ann.heartbeat().is_none());
        assert_eq!(reg.group_size("g1"), 1);

        let echo = ann.on_message(msg("chat", "", "", "still here")).unwrap();
        assert_eq!(echo.group, "");
        assert_eq!(echo.total_connections, 1);
    }

    #[test]
    fn dropping_the_peer_unregisters_it() {
        let reg = Arc::new(ConnectionRegistry::new());
        let (ann, _rx) = peer(&reg, "ann", "g1");
        assert_eq!(reg.total(), 1);
        drop(ann);
        assert_eq!(reg.total(), 0);
    }
}
