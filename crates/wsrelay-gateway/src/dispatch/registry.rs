use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;

use wsrelay_core::error::Result;
use wsrelay_core::protocol::Envelope;

use crate::backend::ModelBackend;
use crate::services::{ChatHandler, ListModelHandler, PingHandler, UnknownActionHandler};

/// Turns one request envelope into its response by calling the backend.
#[async_trait]
pub trait Handler: Send + Sync {
    fn action(&self) -> &'static str;
    async fn handle(&self, req: &Envelope) -> Result<Envelope>;
}

/// Action tag -> handler. Unknown actions resolve to a handler that always fails,
/// so resolution itself never fails.
pub struct HandlerRegistry {
    handlers: DashMap<&'static str, Arc<dyn Handler>>,
    fallback: Arc<dyn Handler>,
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self {
            handlers: DashMap::new(),
            fallback: Arc::new(UnknownActionHandler),
        }
    }

    /// Registry with the built-in handlers wired to `backend`.
    pub fn with_backend(backend: Arc<dyn ModelBackend>) -> Self {
        let registry = Self::new();
        registry.register(Arc::new(ListModelHandler::new(Arc::clone(&backend))));
        registry.register(Arc::new(ChatHandler::new(backend)));
        registry.register(Arc::new(PingHandler));
        registry
    }

    pub fn register(&self, handler: Arc<dyn Handler>) {
        self.handlers.insert(handler.action(), handler);
    }

    pub fn registered_actions(&self) -> Vec<&'static str> {
        self.handlers.iter().map(|e| *e.key()).collect()
    }

    pub fn resolve(&self, action: &str) -> Arc<dyn Handler> {
        self.handlers
            .get(action)
            .map(|e| Arc::clone(e.value()))
            .unwrap_or_else(|| Arc::clone(&self.fallback))
    }
}
