use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use wsrelay_core::error::{RelayError, Result};
use wsrelay_core::protocol::Envelope;

use crate::backend::{ModelBackend, CHAT};
use crate::dispatch::Handler;

/// Runs a chat completion on the backend.
pub struct ChatHandler {
    backend: Arc<dyn ModelBackend>,
}

impl ChatHandler {
    pub fn new(backend: Arc<dyn ModelBackend>) -> Self {
        Self { backend }
    }
}

// Only the shape is checked here; the backend owns the full schema.
#[derive(Debug, Deserialize)]
struct ChatReq {
    model_name: String,
    #[serde(default)]
    messages: Vec<Value>,
}

#[async_trait]
impl Handler for ChatHandler {
    fn action(&self) -> &'static str {
        "chat"
    }

    async fn handle(&self, req: &Envelope) -> Result<Envelope> {
        let params: Value = req.params_as()?;
        let shape: ChatReq = serde_json::from_value(params.clone())
            .map_err(|e| RelayError::BadRequest(format!("chat invalid params: {e}")))?;
        if shape.model_name.is_empty() {
            return Err(RelayError::BadRequest("chat requires model_name".into()));
        }
        tracing::debug!(model = %shape.model_name, turns = shape.messages.len(), "chat dispatch");

        let data = self.backend.execute(CHAT, &params).await?;
        Ok(Envelope::reply(req, data))
    }
}
