use std::sync::Arc;

use async_trait::async_trait;

use wsrelay_core::error::{RelayError, Result};
use wsrelay_core::protocol::Envelope;

use crate::backend::ModelBackend;
use crate::dispatch::Handler;

/// Reports the models the backend can serve.
pub struct ListModelHandler {
    backend: Arc<dyn ModelBackend>,
}

impl ListModelHandler {
    pub fn new(backend: Arc<dyn ModelBackend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl Handler for ListModelHandler {
    fn action(&self) -> &'static str {
        "list_model"
    }

    async fn handle(&self, req: &Envelope) -> Result<Envelope> {
        let models = self.backend.list_resources().await?;
        let data = serde_json::to_value(models)
            .map_err(|e| RelayError::Internal(format!("model list encode failed: {e}")))?;
        Ok(Envelope::reply(req, data))
    }
}
