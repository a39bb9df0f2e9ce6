//! Relay envelope (JSON text frames).
//!
//! Decoding is permissive: unknown fields are ignored, and missing or `null`
//! ones default to empty, so a peer running a newer schema does not break the session.
//! `params` stays as `RawValue` so each handler parses only what it needs.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::value::RawValue;
use serde_json::{json, Value};

use crate::error::{RelayError, Result};

/// Channel label used on every response this side writes.
pub const RESPONSE_CHANNEL: &str = "client_to_server";
/// Channel label of liveness checks.
pub const HEARTBEAT_CHANNEL: &str = "heartbeat";
/// Action carried by liveness checks.
pub const HEARTBEAT_ACTION: &str = "ping";
/// Channel label on requests this side initiates.
pub const REQUEST_CHANNEL: &str = "server_to_client";
/// Terminal status of a successful response.
pub const STATUS_DONE: &str = "done";
/// Terminal status of an explicit error reply.
pub const STATUS_ERROR: &str = "error";

/// Explicit direction discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Kind {
    Request,
    Response,
}

/// One wire message.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Envelope {
    /// Direction tag; absent on frames from peers that predate it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<Kind>,
    /// Free-form channel label (field name is `type` in JSON).
    #[serde(rename = "type", default, deserialize_with = "null_as_empty")]
    pub msg_type: String,
    /// Selects the handler. Empty on pure responses.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub action: String,
    /// Correlation token. Empty means fire-and-forget.
    #[serde(default, deserialize_with = "null_as_empty", skip_serializing_if = "String::is_empty")]
    pub request_id: String,
    /// Action-specific payload, stored as raw JSON (lazy parsing).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Box<RawValue>>,
    /// Response payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// Terminal state marker, e.g. "done".
    #[serde(default, deserialize_with = "null_as_empty", skip_serializing_if = "String::is_empty")]
    pub status: String,
}

fn null_as_empty<'de, D>(d: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(d)?.unwrap_or_default())
}

impl Envelope {
    /// Liveness check with a fresh correlation id.
    pub fn heartbeat(request_id: impl Into<String>) -> Self {
        Self {
            kind: Some(Kind::Request),
            msg_type: HEARTBEAT_CHANNEL.into(),
            action: HEARTBEAT_ACTION.into(),
            request_id: request_id.into(),
            ..Self::default()
        }
    }

    /// Request initiated by this side.
    pub fn request(
        action: impl Into<String>,
        request_id: impl Into<String>,
        params: Option<Box<RawValue>>,
    ) -> Self {
        Self {
            kind: Some(Kind::Request),
            msg_type: REQUEST_CHANNEL.into(),
            action: action.into(),
            request_id: request_id.into(),
            params,
            ..Self::default()
        }
    }

    /// Successful response to `req`: echoes action and id, normalises the channel.
    pub fn reply(req: &Envelope, data: Value) -> Self {
        Self {
            kind: Some(Kind::Response),
            msg_type: RESPONSE_CHANNEL.into(),
            action: req.action.clone(),
            request_id: req.request_id.clone(),
            params: None,
            data: Some(data),
            status: STATUS_DONE.into(),
        }
    }

    /// Explicit failure reply carrying a stable code.
    pub fn error_reply(req: &Envelope, err: &RelayError) -> Self {
        Self {
            kind: Some(Kind::Response),
            msg_type: RESPONSE_CHANNEL.into(),
            action: req.action.clone(),
            request_id: req.request_id.clone(),
            params: None,
            data: Some(json!({
                "code": err.code().as_str(),
                "message": err.to_string(),
            })),
            status: STATUS_ERROR.into(),
        }
    }

    /// True if the sender expects an answer.
    pub fn expects_reply(&self) -> bool {
        !self.request_id.is_empty()
    }

    /// Deserialize `params` into a handler-specific type.
    pub fn params_as<T: serde::de::DeserializeOwned>(&self) -> Result<T> {
        let raw = self
            .params
            .as_ref()
            .ok_or_else(|| RelayError::BadRequest(format!("{} requires params", self.action)))?;
        serde_json::from_str(raw.get())
            .map_err(|e| RelayError::BadRequest(format!("{} invalid params: {e}", self.action)))
    }
}

/// Encode an envelope into a text frame payload.
pub fn encode(env: &Envelope) -> Result<Vec<u8>> {
    serde_json::to_vec(env).map_err(|e| RelayError::Internal(format!("json encode failed: {e}")))
}

/// Decode a frame payload. Bytes that are not a JSON object yield `RelayError::Decode`.
pub fn decode(bytes: &[u8]) -> Result<Envelope> {
    // serde would also accept a positional array for a struct
    if bytes.iter().find(|b| !b.is_ascii_whitespace()) != Some(&b'{') {
        return Err(RelayError::Decode("envelope must be a json object".into()));
    }
    serde_json::from_slice(bytes)
        .map_err(|e| RelayError::Decode(format!("invalid envelope json: {e}")))
}
