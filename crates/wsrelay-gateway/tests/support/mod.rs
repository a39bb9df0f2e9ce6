#![allow(dead_code)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{timeout, timeout_at, Instant};

use wsrelay_core::error::{RelayError, Result};
use wsrelay_core::protocol::{decode, Envelope};
use wsrelay_gateway::backend::{ModelBackend, ResourceDescriptor};
use wsrelay_gateway::dispatch::HandlerRegistry;
use wsrelay_gateway::obs::RelayMetrics;
use wsrelay_gateway::session::{SessionConfig, SessionEnd, SessionHandle, SessionLoop};
use wsrelay_gateway::transport::{Conn, Dialer};

// ---------- connection double ----------

#[derive(Default)]
struct Flags {
    fail_sends: AtomicBool,
    closed: AtomicBool,
}

/// In-memory `Conn`: frames pushed through the paired `PeerEnd` are read,
/// frames the session writes come out of the peer.
pub struct ScriptedConn {
    inbound: mpsc::UnboundedReceiver<Vec<u8>>,
    outbound: mpsc::UnboundedSender<Vec<u8>>,
    deadline: Option<Instant>,
    flags: Arc<Flags>,
}

pub struct PeerEnd {
    inbound: Option<mpsc::UnboundedSender<Vec<u8>>>,
    outbound: mpsc::UnboundedReceiver<Vec<u8>>,
    flags: Arc<Flags>,
}

pub fn scripted_conn() -> (ScriptedConn, PeerEnd) {
    let (in_tx, in_rx) = mpsc::unbounded_channel();
    let (out_tx, out_rx) = mpsc::unbounded_channel();
    let flags = Arc::new(Flags::default());
    (
        ScriptedConn {
            inbound: in_rx,
            outbound: out_tx,
            deadline: None,
            flags: Arc::clone(&flags),
        },
        PeerEnd {
            inbound: Some(in_tx),
            outbound: out_rx,
            flags,
        },
    )
}

#[async_trait]
impl Conn for ScriptedConn {
    async fn send(&mut self, payload: Vec<u8>) -> Result<()> {
        if self.flags.fail_sends.load(Ordering::SeqCst) {
            return Err(RelayError::Send("scripted send failure".into()));
        }
        self.outbound
            .send(payload)
            .map_err(|_| RelayError::Send("peer gone".into()))
    }

    async fn recv(&mut self) -> Result<Vec<u8>> {
        let next = match self.deadline {
            Some(deadline) => timeout_at(deadline, self.inbound.recv())
                .await
                .map_err(|_| RelayError::Timeout)?,
            None => self.inbound.recv().await,
        };
        next.ok_or(RelayError::Closed)
    }

    fn set_read_deadline(&mut self, deadline: Instant) -> Result<()> {
        self.deadline = Some(deadline);
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.flags.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

impl PeerEnd {
    pub fn push(&self, frame: &str) {
        self.push_bytes(frame.as_bytes().to_vec());
    }

    pub fn push_bytes(&self, frame: Vec<u8>) {
        self.inbound
            .as_ref()
            .expect("peer already hung up")
            .send(frame)
            .expect("session stopped reading");
    }

    pub fn push_json(&self, v: Value) {
        self.push(&v.to_string());
    }

    /// Peer goes away: the session's next read sees `Closed`.
    pub fn hang_up(&mut self) {
        self.inbound = None;
    }

    pub fn fail_sends(&self, on: bool) {
        self.flags.fail_sends.store(on, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.flags.closed.load(Ordering::SeqCst)
    }

    /// Next frame the session wrote, decoded.
    pub async fn next_sent(&mut self) -> Envelope {
        let bytes = self.outbound.recv().await.expect("session dropped its conn");
        decode(&bytes).expect("session wrote an undecodable frame")
    }

    /// Next frame written within `within`, if any.
    pub async fn sent_within(&mut self, within: Duration) -> Option<Envelope> {
        match timeout(within, self.outbound.recv()).await {
            Ok(Some(bytes)) => Some(decode(&bytes).expect("undecodable frame")),
            _ => None,
        }
    }
}

// ---------- dialer double ----------

/// Hands out the queued connections in order; `None` entries (and an empty
/// queue) fail the dial.
pub struct ScriptedDialer {
    script: Mutex<VecDeque<Option<ScriptedConn>>>,
    pub attempts: Arc<AtomicUsize>,
}

impl ScriptedDialer {
    pub fn new(script: Vec<Option<ScriptedConn>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            attempts: Arc::new(AtomicUsize::new(0)),
        }
    }
}

#[async_trait]
impl Dialer for ScriptedDialer {
    type Conn = ScriptedConn;

    async fn dial(&self) -> Result<ScriptedConn> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let next = self.script.lock().unwrap().pop_front().flatten();
        next.ok_or_else(|| RelayError::Transport("connection refused".into()))
    }
}

// ---------- backend double ----------

pub struct CountingBackend {
    list_calls: AtomicUsize,
    exec_calls: AtomicUsize,
    /// Calls that ran to the end instead of being dropped mid-flight.
    finished: AtomicUsize,
    delay: Duration,
    fail: bool,
}

impl CountingBackend {
    pub fn new() -> Self {
        Self::with_delay(Duration::ZERO)
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            list_calls: AtomicUsize::new(0),
            exec_calls: AtomicUsize::new(0),
            finished: AtomicUsize::new(0),
            delay,
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new()
        }
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn exec_calls(&self) -> usize {
        self.exec_calls.load(Ordering::SeqCst)
    }

    pub fn finished_calls(&self) -> usize {
        self.finished.load(Ordering::SeqCst)
    }

    pub fn models() -> Vec<ResourceDescriptor> {
        vec![
            ResourceDescriptor {
                model_name: "llama3:8b".into(),
                status: "sha256:aa".into(),
            },
            ResourceDescriptor {
                model_name: "qwen2:7b".into(),
                status: "sha256:bb".into(),
            },
        ]
    }
}

#[async_trait]
impl ModelBackend for CountingBackend {
    async fn execute(&self, action: &str, params: &Value) -> Result<Value> {
        self.exec_calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.finished.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(RelayError::Backend("model service down".into()));
        }
        let last = params["messages"]
            .as_array()
            .and_then(|m| m.last())
            .and_then(|m| m["content"].as_str())
            .unwrap_or_default();
        Ok(json!({
            "message": { "role": "assistant", "content": format!("{action}: {last}") }
        }))
    }

    async fn list_resources(&self) -> Result<Vec<ResourceDescriptor>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.finished.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(RelayError::Backend("model service down".into()));
        }
        Ok(Self::models())
    }
}

// ---------- session harness ----------

pub struct Harness {
    pub handle: SessionHandle,
    pub peer: PeerEnd,
    pub metrics: Arc<RelayMetrics>,
    pub backend: Arc<CountingBackend>,
    pub shutdown: watch::Sender<bool>,
    pub task: JoinHandle<SessionEnd>,
}

pub fn session_config() -> SessionConfig {
    SessionConfig {
        heartbeat_interval: Duration::from_secs(30),
        read_timeout: Duration::from_secs(40),
        max_inflight: 8,
        request_timeout: Duration::from_secs(30),
        strict_liveness: false,
        reply_on_handler_error: false,
    }
}

/// Spawn a session over a scripted connection. Must run inside a tokio runtime.
pub fn start(cfg: SessionConfig, backend: CountingBackend) -> Harness {
    let backend = Arc::new(backend);
    let handlers = Arc::new(HandlerRegistry::with_backend(
        Arc::clone(&backend) as Arc<dyn ModelBackend>
    ));
    let metrics = Arc::new(RelayMetrics::default());
    let (shutdown, shutdown_rx) = watch::channel(false);
    let (conn, peer) = scripted_conn();

    let session = SessionLoop::new(conn, handlers, Arc::clone(&metrics), cfg, shutdown_rx);
    let handle = session.handle();
    let task = tokio::spawn(session.run());

    Harness {
        handle,
        peer,
        metrics,
        backend,
        shutdown,
        task,
    }
}
