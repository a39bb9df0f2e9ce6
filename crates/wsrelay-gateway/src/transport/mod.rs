//! Transport layer (duplex connection boundary).
//!
//! The session engine only sees the `Conn` and `Dialer` traits. `ws` backs
//! them with a tokio-tungstenite client; tests back them with scripted doubles.

pub mod codec;
pub mod ws;

use async_trait::async_trait;
use tokio::time::Instant;

use wsrelay_core::error::Result;

pub use ws::{WsConn, WsDialer};

/// One established duplex connection carrying whole frames.
#[async_trait]
pub trait Conn: Send + 'static {
    /// Write one frame. Any error means the write direction is gone.
    async fn send(&mut self, payload: Vec<u8>) -> Result<()>;

    /// Next data frame.
    ///
    /// Returns `RelayError::Timeout` once the armed read deadline passes and
    /// `RelayError::Closed` when the peer goes away. Must be cancel-safe: the
    /// session loop races it against timers and drops it when they win.
    async fn recv(&mut self) -> Result<Vec<u8>>;

    /// Arm the deadline for the next `recv`.
    fn set_read_deadline(&mut self, deadline: Instant) -> Result<()>;

    /// Release the connection. Pending reads observe `Closed`.
    async fn close(&mut self) -> Result<()>;
}

/// Establishes connections for the reconnect driver.
#[async_trait]
pub trait Dialer: Send + Sync {
    type Conn: Conn;

    async fn dial(&self) -> Result<Self::Conn>;
}
