//! Gateway error type.

use std::net::SocketAddr;

use thiserror::Error;

/// Errors from standing up or running the gateway.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Binding the listen socket failed.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// The address that could not be bound.
        addr: SocketAddr,
        /// The underlying error.
        source: std::io::Error,
    },

    /// Other I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests;
