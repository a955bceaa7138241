//! # Magi Gateway - CDP gateway and session multiplexer
//!
//! Speaks Chrome's debugging HTTP/WebSocket contract to external
//! automation clients (Playwright, Puppeteer, raw CDP tooling) and makes a
//! fleet of embedded Chromium surfaces appear as standards-compliant
//! Chrome-like debug targets.
//!
//! The hard part lives in two places:
//!
//! - [`mux::SessionMultiplexer`] bridges the single-attachment debugger
//!   primitive each embedded page exposes against a protocol that assumes
//!   many concurrent clients: one debugger binding per page, fanned out to
//!   N sessions, with responses correlated back to the client that sent
//!   each request.
//! - [`server::CdpGateway`] owns the transport: HTTP discovery endpoints
//!   (`/json/version`, `/json/list`, `/json/protocol`), WebSocket upgrade
//!   and routing (`/devtools/browser[/{id}]`, `/devtools/page/{id}`), the
//!   per-connection `Target.*` state machine, and flattened-session
//!   framing.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use magi_gateway::{CdpGateway, GatewayConfig};
//! # async fn example(surface: Arc<dyn magi_fleet::Surface>) -> Result<(), magi_gateway::GatewayError> {
//! let gateway = CdpGateway::bind(GatewayConfig::default(), surface).await?;
//! println!("devtools listening on {}", gateway.local_addr());
//! // ... external clients connect to ws://<addr>/devtools/browser/<id> ...
//! gateway.shutdown().await;
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Organization
//!
//! - [`config`] - gateway configuration
//! - [`mux`] - per-page debugger session multiplexing
//! - [`http`] - discovery endpoints
//! - [`ws`] - WebSocket routing and per-connection state machines
//! - [`server`] - the assembled gateway
//! - [`error`] - gateway error type

pub mod config;
pub mod error;
pub mod http;
pub mod mux;
pub mod server;
pub(crate) mod version;
pub mod ws;

pub use config::GatewayConfig;
pub use error::GatewayError;
pub use mux::{ReadinessConfig, SessionMultiplexer};
pub use server::CdpGateway;
