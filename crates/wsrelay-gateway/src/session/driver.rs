//! Reconnect driver.
//!
//! Owns the dial -> run -> wait -> redial cycle. At most one session is live at
//! a time; it is published on a watch channel for callers that want to issue
//! requests through whichever session is current.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{info, warn};

use crate::config::RelaySection;
use crate::dispatch::HandlerRegistry;
use crate::obs::RelayMetrics;
use crate::transport::Dialer;

use super::engine::{EndReason, SessionConfig, SessionLoop};
use super::handle::SessionHandle;
use super::shutdown_signalled;

/// Delay between a failed dial and the next attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    base: Duration,
    max: Option<Duration>,
}

impl BackoffPolicy {
    /// Same delay after every failure.
    pub fn fixed(base: Duration) -> Self {
        Self { base, max: None }
    }

    /// Doubles per consecutive failure, capped at `max`.
    pub fn exponential(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max: Some(max.max(base)),
        }
    }

    /// Delay after `failures` consecutive failed dials (1-based).
    pub fn delay(&self, failures: u32) -> Duration {
        let Some(max) = self.max else {
            return self.base;
        };
        let shift = failures.saturating_sub(1).min(16);
        self.base.saturating_mul(1u32 << shift).min(max)
    }
}

impl From<&RelaySection> for BackoffPolicy {
    fn from(r: &RelaySection) -> Self {
        match r.reconnect_max_backoff() {
            Some(max) => Self::exponential(r.reconnect_backoff(), max),
            None => Self::fixed(r.reconnect_backoff()),
        }
    }
}

pub struct ReconnectDriver<D: Dialer> {
    dialer: D,
    backoff: BackoffPolicy,
    handlers: Arc<HandlerRegistry>,
    metrics: Arc<RelayMetrics>,
    session_cfg: SessionConfig,
    shutdown: watch::Receiver<bool>,
    current: watch::Sender<Option<SessionHandle>>,
}

impl<D: Dialer> ReconnectDriver<D> {
    pub fn new(
        dialer: D,
        backoff: BackoffPolicy,
        handlers: Arc<HandlerRegistry>,
        metrics: Arc<RelayMetrics>,
        session_cfg: SessionConfig,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        let (current, _) = watch::channel(None);
        Self {
            dialer,
            backoff,
            handlers,
            metrics,
            session_cfg,
            shutdown,
            current,
        }
    }

    /// The live session, or `None` between sessions.
    pub fn sessions(&self) -> watch::Receiver<Option<SessionHandle>> {
        self.current.subscribe()
    }

    /// Loop until shutdown. Dial failures are never fatal.
    pub async fn run(mut self) {
        let mut failures: u32 = 0;

        loop {
            let dialed = tokio::select! {
                biased;
                _ = shutdown_signalled(&mut self.shutdown) => break,
                dialed = self.dialer.dial() => dialed,
            };

            let conn = match dialed {
                Ok(conn) => conn,
                Err(e) => {
                    failures = failures.saturating_add(1);
                    self.metrics.dial_failures.inc(&[]);
                    let wait = self.backoff.delay(failures);
                    warn!(error = %e, failures, wait_ms = wait.as_millis() as u64, "dial failed; retrying");

                    tokio::select! {
                        biased;
                        _ = shutdown_signalled(&mut self.shutdown) => break,
                        _ = tokio::time::sleep(wait) => {}
                    }
                    continue;
                }
            };
            failures = 0;

            let session = SessionLoop::new(
                conn,
                Arc::clone(&self.handlers),
                Arc::clone(&self.metrics),
                self.session_cfg.clone(),
                self.shutdown.clone(),
            );
            self.current.send_replace(Some(session.handle()));

            let end = session.run().await;
            self.current.send_replace(None);

            match end.reason {
                EndReason::Shutdown => {
                    if *self.shutdown.borrow() || self.shutdown.has_changed().is_err() {
                        break;
                    }
                    info!(session = %end.session_id, "session closed on request; redialing");
                }
                EndReason::Fatal(e) => {
                    info!(session = %end.session_id, error = %e, "session ended; redialing");
                }
            }
        }

        self.current.send_replace(None);
        info!("reconnect driver stopped");
    }
}
