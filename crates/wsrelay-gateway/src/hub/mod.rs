//! Broadcast hub for locally connected peers.
//!
//! Peers connect on `/ws?username=..&group=..`, get a periodic status
//! heartbeat, can move between groups, and get their chat messages echoed.

pub mod registry;
pub mod ws;

use serde::{Deserialize, Serialize};

pub use registry::{ConnId, ConnectionRegistry, Delivery};

pub const TYPE_HEARTBEAT: &str = "heartbeat";
pub const TYPE_JOIN: &str = "join-group";
pub const TYPE_LEAVE: &str = "leave-group";
pub const TYPE_GROUP_UPDATE: &str = "group_update";
pub const TYPE_CHAT: &str = "chat";

/// Hub wire message, both directions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HubMessage {
    #[serde(rename = "type", default)]
    pub msg_type: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub group: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub group_size: usize,
    #[serde(default)]
    pub total_connections: usize,
}
