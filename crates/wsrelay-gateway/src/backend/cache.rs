//! Staleness-window cache in front of a backend.
//!
//! Only `list_resources` is cached: the model list is read-mostly and peers
//! poll it. `execute` always reaches the backend.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::time::Instant;

use wsrelay_core::error::Result;

use super::{ModelBackend, ResourceDescriptor};

struct Cached {
    at: Instant,
    resources: Vec<ResourceDescriptor>,
}

pub struct CachedBackend<B> {
    inner: B,
    ttl: Duration,
    slot: Mutex<Option<Cached>>,
}

impl<B: ModelBackend> CachedBackend<B> {
    /// `ttl == 0` disables caching.
    pub fn new(inner: B, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            slot: Mutex::new(None),
        }
    }

    pub fn inner(&self) -> &B {
        &self.inner
    }

    fn fresh(&self) -> Option<Vec<ResourceDescriptor>> {
        let slot = self.slot.lock().ok()?;
        slot.as_ref()
            .filter(|c| c.at.elapsed() < self.ttl)
            .map(|c| c.resources.clone())
    }

    fn store(&self, resources: &[ResourceDescriptor]) {
        if let Ok(mut slot) = self.slot.lock() {
            *slot = Some(Cached {
                at: Instant::now(),
                resources: resources.to_vec(),
            });
        }
    }
}

#[async_trait]
impl<B: ModelBackend> ModelBackend for CachedBackend<B> {
    async fn execute(&self, action: &str, params: &Value) -> Result<Value> {
        self.inner.execute(action, params).await
    }

    async fn list_resources(&self) -> Result<Vec<ResourceDescriptor>> {
        if self.ttl.is_zero() {
            return self.inner.list_resources().await;
        }
        if let Some(hit) = self.fresh() {
            tracing::debug!(count = hit.len(), "model list served from cache");
            return Ok(hit);
        }
        // Concurrent misses may both hit the backend; the later store wins.
        let resources = self.inner.list_resources().await?;
        self.store(&resources);
        Ok(resources)
    }
}
