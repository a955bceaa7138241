//! # Magi CDP - Chrome DevTools Protocol wire types
//!
//! Server-side Chrome DevTools Protocol (CDP) message shapes for the Magi
//! gateway. Where a CDP client crate deserializes responses and serializes
//! commands, this crate faces the other direction: it parses commands sent
//! by external automation clients (Playwright, Puppeteer, raw CDP tooling)
//! and serializes the responses and events the gateway emits back.
//!
//! This crate handles:
//! - JSON-RPC-shaped CDP framing (requests, responses, events)
//! - Target and Browser domain payload types
//! - Typed session identifiers (`<pageId>-session-<seq>`)
//! - HTTP discovery payloads (`/json/version`, `/json/list`, `/json/protocol`)
//!
//! ## Framing
//!
//! ```
//! use magi_cdp::wire::{CdpRequest, CdpResponse};
//!
//! let req: CdpRequest =
//!     serde_json::from_str(r#"{"id":1,"method":"Target.getTargets"}"#).unwrap();
//! assert_eq!(req.method, "Target.getTargets");
//!
//! let resp = CdpResponse::success(req.id, serde_json::json!({}));
//! assert_eq!(serde_json::to_string(&resp).unwrap(), r#"{"id":1,"result":{}}"#);
//! ```
//!
//! ## Session identifiers
//!
//! Session ids embed the page id so the owning page is recoverable without
//! a lookup table:
//!
//! ```
//! use magi_cdp::session::SessionId;
//!
//! let sid = SessionId::new("a1b2c3", 7);
//! assert_eq!(sid.to_string(), "a1b2c3-session-7");
//! assert_eq!(sid.page_id(), "a1b2c3");
//! ```
//!
//! ## Module Organization
//!
//! - [`wire`] - JSON-RPC framing types and error codes
//! - [`target`] - Target/Browser domain parameters, results, and events
//! - [`session`] - Typed session identifiers
//! - [`discovery`] - HTTP discovery endpoint payloads
//! - [`error`] - Protocol error type

pub mod discovery;
pub mod error;
pub mod session;
pub mod target;
pub mod wire;

pub use error::ProtocolError;
pub use session::SessionId;
pub use wire::{CdpEvent, CdpMessage, CdpRequest, CdpResponse, CdpResponseError};
