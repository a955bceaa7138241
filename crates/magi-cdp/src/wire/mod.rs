//! CDP message framing.
//!
//! The gateway speaks JSON-RPC-shaped CDP frames: clients send requests,
//! the gateway answers with responses and pushes events. In flattened mode
//! a request may carry a top-level `sessionId` next to `id` and `method`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// JSON-RPC error codes used on the wire.
pub mod codes {
    /// The frame was not a valid request object.
    pub const INVALID_REQUEST: i64 = -32600;
    /// The method is not implemented by the gateway.
    pub const METHOD_NOT_FOUND: i64 = -32601;
    /// The request parameters were malformed or missing.
    pub const INVALID_PARAMS: i64 = -32602;
    /// Generic server-side failure (target not found, surface unavailable).
    pub const SERVER_ERROR: i64 = -32000;
}

/// A CDP request received from a client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CdpRequest {
    /// Message ID for matching the response.
    pub id: u64,
    /// CDP method name (e.g., "Target.createTarget").
    pub method: String,
    /// Method parameters.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    /// Session ID when the command targets a flattened session.
    #[serde(rename = "sessionId", skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

/// A CDP response emitted by the gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CdpResponse {
    /// Message ID matching the request.
    pub id: u64,
    /// Result on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Error on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<CdpResponseError>,
    /// Session ID when this response belongs to a flattened session.
    #[serde(rename = "sessionId", skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

impl CdpResponse {
    /// Build a success response.
    #[must_use]
    pub fn success(id: u64, result: Value) -> Self {
        Self {
            id,
            result: Some(result),
            error: None,
            session_id: None,
        }
    }

    /// Build an error response.
    #[must_use]
    pub fn error(id: u64, code: i64, message: impl Into<String>) -> Self {
        Self {
            id,
            result: None,
            error: Some(CdpResponseError {
                code,
                message: message.into(),
                data: None,
            }),
            session_id: None,
        }
    }

    /// Attach a session id to the response.
    #[must_use]
    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }
}

/// Error details in a CDP response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CdpResponseError {
    /// Error code.
    pub code: i64,
    /// Error message.
    pub message: String,
    /// Additional error data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
}

/// A CDP event emitted by the gateway (or by the underlying debugger).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CdpEvent {
    /// Event method name (e.g., "Target.targetCreated").
    pub method: String,
    /// Event parameters.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    /// Session ID when the event belongs to a flattened session.
    #[serde(rename = "sessionId", skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

impl CdpEvent {
    /// Build an event with parameters.
    #[must_use]
    pub fn new(method: impl Into<String>, params: Value) -> Self {
        Self {
            method: method.into(),
            params: Some(params),
            session_id: None,
        }
    }
}

/// An outbound CDP message (either response or event), as observed by a
/// client. Incoming frames on a client connection parse into this shape.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum CdpMessage {
    /// A response to a previous request.
    Response(CdpResponse),
    /// A pushed event.
    Event(CdpEvent),
}

impl CdpMessage {
    /// Check if this message is a response with the given ID.
    pub fn is_response_for(&self, id: u64) -> bool {
        matches!(self, Self::Response(resp) if resp.id == id)
    }

    /// Try to extract this as a response.
    pub fn into_response(self) -> Option<CdpResponse> {
        match self {
            Self::Response(resp) => Some(resp),
            Self::Event(_) => None,
        }
    }

    /// Try to extract this as an event.
    pub fn into_event(self) -> Option<CdpEvent> {
        match self {
            Self::Event(evt) => Some(evt),
            Self::Response(_) => None,
        }
    }
}

#[cfg(test)]
mod tests;
