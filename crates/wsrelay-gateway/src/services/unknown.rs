use async_trait::async_trait;

use wsrelay_core::error::{RelayError, Result};
use wsrelay_core::protocol::Envelope;

use crate::dispatch::Handler;

/// Fallback for actions nobody registered. Always fails.
pub struct UnknownActionHandler;

#[async_trait]
impl Handler for UnknownActionHandler {
    fn action(&self) -> &'static str {
        ""
    }

    async fn handle(&self, req: &Envelope) -> Result<Envelope> {
        Err(RelayError::UnknownAction(req.action.clone()))
    }
}
