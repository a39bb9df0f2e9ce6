//! Outside access to a running session.
//!
//! A `SessionHandle` queues outbound requests and shutdown onto the loop's
//! command channel and watches its lifecycle state.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::{mpsc, watch};
use tokio::time::timeout;
use uuid::Uuid;

use wsrelay_core::error::{RelayError, Result};
use wsrelay_core::protocol::Envelope;

use super::pending::PendingRequests;

/// Session lifecycle. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Running,
    Closing,
    Closed,
}

/// Work the session loop accepts from outside.
#[derive(Debug)]
pub(crate) enum Command {
    Send(Envelope),
    Shutdown,
}

/// Cloneable access to a running session.
#[derive(Clone)]
pub struct SessionHandle {
    id: Arc<str>,
    commands: mpsc::Sender<Command>,
    pending: Arc<PendingRequests>,
    state: watch::Receiver<SessionState>,
    request_timeout: Duration,
}

impl SessionHandle {
    pub(crate) fn new(
        id: Arc<str>,
        commands: mpsc::Sender<Command>,
        pending: Arc<PendingRequests>,
        state: watch::Receiver<SessionState>,
        request_timeout: Duration,
    ) -> Self {
        Self {
            id,
            commands,
            pending,
            state,
            request_timeout,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Requests still waiting on a response.
    pub fn outstanding(&self) -> usize {
        self.pending.len()
    }

    /// Send a request to the peer and wait for the correlated response.
    pub async fn request(&self, action: &str, params: Option<Value>) -> Result<Envelope> {
        let params = params
            .map(|v| serde_json::value::to_raw_value(&v))
            .transpose()
            .map_err(|e| RelayError::BadRequest(format!("params encode failed: {e}")))?;

        let request_id = Uuid::new_v4().to_string();
        let rx = self.pending.register(request_id.clone());
        let env = Envelope::request(action, request_id.clone(), params);

        if self.commands.send(Command::Send(env)).await.is_err() {
            self.pending.cancel(&request_id);
            return Err(RelayError::Closed);
        }

        match timeout(self.request_timeout, rx).await {
            Ok(Ok(resp)) => Ok(resp),
            // slot dropped: session ended before an answer came
            Ok(Err(_)) => Err(RelayError::Closed),
            Err(_) => {
                self.pending.cancel(&request_id);
                tracing::debug!(session = %self.id, %request_id, action, "request timed out");
                Err(RelayError::Timeout)
            }
        }
    }

    /// Send an envelope without waiting for any answer.
    pub async fn notify(&self, env: Envelope) -> Result<()> {
        self.commands
            .send(Command::Send(env))
            .await
            .map_err(|_| RelayError::Closed)
    }

    /// Ask the session to close. No-op if it already ended.
    pub async fn shutdown(&self) {
        let _ = self.commands.send(Command::Shutdown).await;
    }

    /// Resolves once the session reached `Closed`.
    pub async fn closed(&self) {
        let mut state = self.state.clone();
        while *state.borrow_and_update() != SessionState::Closed {
            if state.changed().await.is_err() {
                return;
            }
        }
    }
}
