//! Backend service boundary.
//!
//! Handlers reach the model service only through `ModelBackend`, so tests and
//! alternative backends can substitute it. Implementations must be safe for
//! concurrent use: every session's in-flight handlers share one instance.

pub mod cache;
pub mod ollama;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use wsrelay_core::error::Result;

/// Action name of the chat completion operation.
pub const CHAT: &str = "chat";

pub use cache::CachedBackend;
pub use ollama::OllamaBackend;

/// One model the backend can serve, as reported to the peer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceDescriptor {
    pub model_name: String,
    pub status: String,
}

#[async_trait]
pub trait ModelBackend: Send + Sync {
    /// Run one long-running operation (e.g. "chat") and return its payload.
    async fn execute(&self, action: &str, params: &Value) -> Result<Value>;

    /// Models currently available. May be served from a short-lived cache.
    async fn list_resources(&self) -> Result<Vec<ResourceDescriptor>>;
}
