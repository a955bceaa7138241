//! Protocol error type.

use thiserror::Error;

/// Errors produced while parsing or building CDP wire material.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// A frame was not valid JSON or not a valid CDP message.
    #[error("malformed CDP frame: {0}")]
    Malformed(#[from] serde_json::Error),

    /// A session id did not follow the `<pageId>-session-<seq>` form.
    #[error("invalid session id: {0}")]
    InvalidSessionId(String),
}
