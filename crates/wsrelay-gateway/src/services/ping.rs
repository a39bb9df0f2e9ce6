use async_trait::async_trait;
use serde_json::json;

use wsrelay_core::error::Result;
use wsrelay_core::protocol::envelope::{Envelope, HEARTBEAT_ACTION};

use crate::dispatch::Handler;

/// Acknowledges a peer's heartbeat so peers tracking liveness see an answer.
pub struct PingHandler;

#[async_trait]
impl Handler for PingHandler {
    fn action(&self) -> &'static str {
        HEARTBEAT_ACTION
    }

    async fn handle(&self, req: &Envelope) -> Result<Envelope> {
        Ok(Envelope::reply(req, json!("pong")))
    }
}
