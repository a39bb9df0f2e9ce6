//! WebSocket client transport (tokio-tungstenite).
//!
//! Responsibilities:
//! - Dial the relay URL, optionally with a bearer token header
//! - Honor the read deadline armed by the session loop
//! - Swallow transport keepalive frames; surface Close as `RelayError::Closed`

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::time::{timeout_at, Instant};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{header::AUTHORIZATION, HeaderValue};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use wsrelay_core::error::{RelayError, Result};

use crate::transport::codec::{decode, text_frame, Inbound};
use crate::transport::{Conn, Dialer};

type Stream = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub struct WsConn {
    stream: Stream,
    deadline: Option<Instant>,
}

impl WsConn {
    pub fn new(stream: Stream) -> Self {
        Self {
            stream,
            deadline: None,
        }
    }
}

#[async_trait]
impl Conn for WsConn {
    async fn send(&mut self, payload: Vec<u8>) -> Result<()> {
        let msg = text_frame(payload)
            .map_err(|e| RelayError::Internal(format!("frame is not utf-8: {e}")))?;
        self.stream
            .send(msg)
            .await
            .map_err(|e| RelayError::Send(e.to_string()))
    }

    async fn recv(&mut self) -> Result<Vec<u8>> {
        loop {
            let next = match self.deadline {
                Some(deadline) => timeout_at(deadline, self.stream.next())
                    .await
                    .map_err(|_| RelayError::Timeout)?,
                None => self.stream.next().await,
            };
            let Some(msg) = next else {
                return Err(RelayError::Closed);
            };
            let msg = msg.map_err(|e| RelayError::Transport(e.to_string()))?;

            match decode(msg) {
                Inbound::Data(bytes) => return Ok(bytes),
                Inbound::Keepalive => continue,
                Inbound::Close => return Err(RelayError::Closed),
            }
        }
    }

    fn set_read_deadline(&mut self, deadline: Instant) -> Result<()> {
        self.deadline = Some(deadline);
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.stream
            .close(None)
            .await
            .map_err(|e| RelayError::Transport(e.to_string()))
    }
}

/// Dials the configured relay endpoint.
#[derive(Debug, Clone)]
pub struct WsDialer {
    url: String,
    auth_token: Option<String>,
}

impl WsDialer {
    pub fn new(url: impl Into<String>, auth_token: Option<String>) -> Self {
        Self {
            url: url.into(),
            auth_token,
        }
    }
}

#[async_trait]
impl Dialer for WsDialer {
    type Conn = WsConn;

    async fn dial(&self) -> Result<WsConn> {
        let mut req = self
            .url
            .as_str()
            .into_client_request()
            .map_err(|e| RelayError::Transport(format!("invalid relay url: {e}")))?;

        if let Some(token) = &self.auth_token {
            let value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|e| RelayError::Config(format!("invalid auth token: {e}")))?;
            req.headers_mut().insert(AUTHORIZATION, value);
        }

        let (stream, _resp) = tokio_tungstenite::connect_async(req)
            .await
            .map_err(|e| RelayError::Transport(format!("dial {} failed: {e}", self.url)))?;

        tracing::info!(url = %self.url, "relay connected");
        Ok(WsConn::new(stream))
    }
}
