//! Shared application state for the hub and ops routes.

use std::sync::Arc;

use tokio::sync::watch;

use crate::config::RelayConfig;
use crate::hub::ConnectionRegistry;
use crate::obs::RelayMetrics;
use crate::session::SessionHandle;

#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    cfg: RelayConfig,
    hub: Arc<ConnectionRegistry>,
    metrics: Arc<RelayMetrics>,
    sessions: watch::Receiver<Option<SessionHandle>>,
    shutdown: watch::Receiver<bool>,
}

impl AppState {
    pub fn new(
        cfg: RelayConfig,
        metrics: Arc<RelayMetrics>,
        sessions: watch::Receiver<Option<SessionHandle>>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                cfg,
                hub: Arc::new(ConnectionRegistry::new()),
                metrics,
                sessions,
                shutdown,
            }),
        }
    }

    pub fn cfg(&self) -> &RelayConfig {
        &self.inner.cfg
    }

    pub fn hub(&self) -> Arc<ConnectionRegistry> {
        Arc::clone(&self.inner.hub)
    }

    pub fn metrics(&self) -> Arc<RelayMetrics> {
        Arc::clone(&self.inner.metrics)
    }

    pub fn shutdown(&self) -> watch::Receiver<bool> {
        self.inner.shutdown.clone()
    }

    /// The upstream session currently live, if any.
    pub fn current_session(&self) -> Option<SessionHandle> {
        self.inner.sessions.borrow().clone()
    }

    pub fn is_draining(&self) -> bool {
        self.inner.metrics.is_draining()
    }

    /// Point-in-time values rendered alongside the registered metrics.
    pub fn metrics_extra(&self) -> Vec<(&'static str, u64)> {
        let (live, outstanding) = match self.current_session() {
            Some(s) => (1, s.outstanding() as u64),
            None => (0, 0),
        };
        vec![
            ("wsrelay_session_live", live),
            ("wsrelay_session_outstanding_requests", outstanding),
            ("wsrelay_hub_peers", self.inner.hub.total() as u64),
        ]
    }
}
