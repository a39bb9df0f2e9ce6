//! Session loop: one connection, one sequential decision procedure.
//!
//! Each iteration races, in priority order:
//! - shutdown (process-wide signal or `SessionHandle::shutdown`)
//! - heartbeat tick (polled before any read so inbound floods cannot starve it)
//! - outbound requests queued through a `SessionHandle`
//! - completed handler tasks (their responses are written here, in completion order)
//! - the next inbound frame, bounded by the armed read deadline
//!
//! Handlers run as their own tasks, at most `max_inflight` at a time. When the
//! limit is reached the loop stops reading until one completes, but keeps
//! heartbeating. Any send failure, any non-timeout read error, and a missed
//! heartbeat in strict mode end the session.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::{JoinError, JoinSet};
use tokio::time::Instant;
use tracing::{debug, info, warn, Instrument};
use uuid::Uuid;

use wsrelay_core::error::{ErrorClass, RelayError, Result};
use wsrelay_core::protocol::{classify, decode, encode, Direction, Envelope};

use crate::config::RelaySection;
use crate::dispatch::HandlerRegistry;
use crate::obs::RelayMetrics;
use crate::transport::Conn;

use super::handle::{Command, SessionHandle, SessionState};
use super::heartbeat::{self, Heartbeat};
use super::pending::PendingRequests;
use super::shutdown_signalled;

const COMMAND_QUEUE: usize = 64;

/// Timing and dispatch knobs for one session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub heartbeat_interval: Duration,
    /// Must exceed `heartbeat_interval`.
    pub read_timeout: Duration,
    pub max_inflight: usize,
    pub request_timeout: Duration,
    pub strict_liveness: bool,
    pub reply_on_handler_error: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(30),
            read_timeout: Duration::from_secs(40),
            max_inflight: 8,
            request_timeout: Duration::from_secs(30),
            strict_liveness: false,
            reply_on_handler_error: false,
        }
    }
}

impl From<&RelaySection> for SessionConfig {
    fn from(r: &RelaySection) -> Self {
        Self {
            heartbeat_interval: r.heartbeat_interval(),
            read_timeout: r.read_timeout(),
            max_inflight: r.max_inflight,
            request_timeout: r.request_timeout(),
            strict_liveness: r.strict_liveness,
            reply_on_handler_error: r.reply_on_handler_error,
        }
    }
}

/// Why a session stopped.
#[derive(Debug)]
pub enum EndReason {
    Shutdown,
    Fatal(RelayError),
}

impl EndReason {
    fn label(&self) -> &'static str {
        match self {
            EndReason::Shutdown => "shutdown",
            EndReason::Fatal(_) => "fatal",
        }
    }
}

#[derive(Debug)]
pub struct SessionEnd {
    pub session_id: String,
    pub reason: EndReason,
}

/// Metric label for requests no handler claimed.
const UNKNOWN_ACTION_LABEL: &str = "unknown";

/// Outcome of one dispatched request.
struct Completed {
    /// Registered action of the handler that ran; never the raw peer string.
    label: &'static str,
    request: Envelope,
    result: Result<Envelope>,
    elapsed: Duration,
}

pub struct SessionLoop<C: Conn> {
    id: Arc<str>,
    conn: C,
    handlers: Arc<HandlerRegistry>,
    metrics: Arc<RelayMetrics>,
    cfg: SessionConfig,
    heartbeat: Heartbeat,
    pending: Arc<PendingRequests>,
    commands: mpsc::Receiver<Command>,
    command_tx: mpsc::Sender<Command>,
    state: watch::Sender<SessionState>,
    shutdown: watch::Receiver<bool>,
}

impl<C: Conn> SessionLoop<C> {
    pub fn new(
        conn: C,
        handlers: Arc<HandlerRegistry>,
        metrics: Arc<RelayMetrics>,
        cfg: SessionConfig,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        let (command_tx, commands) = mpsc::channel(COMMAND_QUEUE);
        let (state, _) = watch::channel(SessionState::Running);
        Self {
            id: Arc::from(Uuid::new_v4().to_string()),
            conn,
            handlers,
            metrics,
            heartbeat: Heartbeat::new(cfg.strict_liveness),
            cfg,
            pending: Arc::new(PendingRequests::new()),
            commands,
            command_tx,
            state,
            shutdown,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn handle(&self) -> SessionHandle {
        SessionHandle::new(
            Arc::clone(&self.id),
            self.command_tx.clone(),
            Arc::clone(&self.pending),
            self.state.subscribe(),
            self.cfg.request_timeout,
        )
    }

    /// Run until shutdown or a fatal error, then release the connection.
    pub async fn run(self) -> SessionEnd {
        let span = tracing::info_span!("session", id = %self.id);
        self.drive().instrument(span).await
    }

    async fn drive(mut self) -> SessionEnd {
        self.metrics.sessions_started.inc(&[]);
        info!("session running");

        let reason = self.event_loop().await;

        self.state.send_replace(SessionState::Closing);
        match &reason {
            EndReason::Shutdown => info!("session shutting down"),
            EndReason::Fatal(e) => warn!(error = %e, "session failed"),
        }
        self.pending.clear();
        if let Err(e) = self.conn.close().await {
            debug!(error = %e, "close after session end");
        }
        self.state.send_replace(SessionState::Closed);
        self.metrics.sessions_ended.inc(&[("reason", reason.label())]);

        SessionEnd {
            session_id: self.id.to_string(),
            reason,
        }
    }

    async fn event_loop(&mut self) -> EndReason {
        // Only queued handles keep the command channel open from here on.
        let (closed_tx, _) = mpsc::channel(1);
        drop(std::mem::replace(&mut self.command_tx, closed_tx));

        let mut ticker = heartbeat::schedule(self.cfg.heartbeat_interval);
        let mut inflight: JoinSet<Completed> = JoinSet::new();
        let mut read_deadline: Option<Instant> = None;

        let reason = loop {
            // A deadline covers one read attempt; heartbeats do not push it out.
            if read_deadline.is_none() {
                let deadline = Instant::now() + self.cfg.read_timeout;
                if let Err(e) = self.conn.set_read_deadline(deadline) {
                    break EndReason::Fatal(e);
                }
                read_deadline = Some(deadline);
            }
            let can_read = inflight.len() < self.cfg.max_inflight;

            tokio::select! {
                biased;

                _ = shutdown_signalled(&mut self.shutdown) => break EndReason::Shutdown,

                _ = ticker.tick() => {
                    if let Err(e) = self.send_heartbeat().await {
                        break EndReason::Fatal(e);
                    }
                }

                Some(cmd) = self.commands.recv() => match cmd {
                    Command::Send(env) => {
                        if let Err(e) = self.send(&env).await {
                            break EndReason::Fatal(e);
                        }
                    }
                    Command::Shutdown => break EndReason::Shutdown,
                },

                Some(joined) = inflight.join_next(), if !inflight.is_empty() => {
                    if let Err(e) = self.complete(joined).await {
                        break EndReason::Fatal(e);
                    }
                }

                frame = self.conn.recv(), if can_read => {
                    read_deadline = None;
                    match frame {
                        Ok(bytes) => self.on_frame(&bytes, &mut inflight),
                        Err(e) if e.class() == ErrorClass::Recoverable => {
                            self.metrics.read_timeouts.inc(&[]);
                            debug!(error = %e, "read attempt ended; continuing");
                        }
                        Err(e) => break EndReason::Fatal(e),
                    }
                }
            }
        };

        // Nobody is left to write their responses to.
        inflight.abort_all();
        reason
    }

    async fn send(&mut self, env: &Envelope) -> Result<()> {
        let bytes = encode(env)?;
        self.conn.send(bytes).await
    }

    async fn send_heartbeat(&mut self) -> Result<()> {
        let hb = self.heartbeat.next_heartbeat()?;
        self.pending.record_issued(&hb.request_id);
        self.send(&hb).await?;
        self.metrics.heartbeats_sent.inc(&[]);
        debug!(request_id = %hb.request_id, "heartbeat sent");
        Ok(())
    }

    fn on_frame(&mut self, bytes: &[u8], inflight: &mut JoinSet<Completed>) {
        let env = match decode(bytes) {
            Ok(env) => env,
            Err(e) => {
                self.metrics.decode_errors.inc(&[]);
                warn!(error = %e, len = bytes.len(), "dropping malformed frame");
                return;
            }
        };

        let pending = &self.pending;
        match classify(&env, |id| pending.issued_here(id)) {
            Direction::Response => self.on_response(env),
            Direction::Request => self.dispatch(env, inflight),
        }
    }

    fn on_response(&mut self, env: Envelope) {
        if self.heartbeat.acknowledge(&env.request_id) {
            debug!(request_id = %env.request_id, "heartbeat acknowledged");
            return;
        }
        if let Err(env) = self.pending.resolve(env) {
            self.metrics.unmatched_responses.inc(&[]);
            debug!(request_id = %env.request_id, action = %env.action, "response matches nothing outstanding; dropped");
        }
    }

    fn dispatch(&self, env: Envelope, inflight: &mut JoinSet<Completed>) {
        let handler = self.handlers.resolve(&env.action);
        let label = match handler.action() {
            "" => UNKNOWN_ACTION_LABEL,
            action => action,
        };
        debug!(action = %env.action, request_id = %env.request_id, "dispatching request");

        inflight.spawn(
            async move {
                let started = Instant::now();
                let result = handler.handle(&env).await;
                Completed {
                    label,
                    request: env,
                    result,
                    elapsed: started.elapsed(),
                }
            }
            .in_current_span(),
        );
    }

    async fn complete(&mut self, joined: std::result::Result<Completed, JoinError>) -> Result<()> {
        let done = match joined {
            Ok(done) => done,
            Err(e) => {
                self.metrics.handler_errors.inc(&[("action", "panicked")]);
                warn!(error = %e, "handler task did not complete; request dropped");
                return Ok(());
            }
        };

        let req = &done.request;
        let action = req.action.as_str();
        self.metrics
            .dispatch_duration
            .observe(&[("action", done.label)], done.elapsed);

        match &done.result {
            Ok(resp) => {
                if !req.expects_reply() {
                    debug!(action, "fire-and-forget request handled");
                    return Ok(());
                }
                self.send(resp).await?;
                self.metrics.responses_sent.inc(&[("action", done.label)]);
                debug!(action, request_id = %req.request_id, "response sent");
            }
            Err(e) => {
                self.metrics.handler_errors.inc(&[("action", done.label)]);
                warn!(action, request_id = %req.request_id, error = %e, "handler failed; request dropped");
                if self.cfg.reply_on_handler_error && req.expects_reply() {
                    self.send(&Envelope::error_reply(req, e)).await?;
                }
            }
        }
        Ok(())
    }
}
