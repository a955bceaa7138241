//! # Magi Fleet - browser fleet state and lifecycle
//!
//! The in-process model of a fleet of embedded Chromium surfaces: which
//! browsers exist, which pages they hold, which page is active, and how
//! lifecycle changes flow between the embedding UI and external debugger
//! clients.
//!
//! This crate provides:
//! - [`FleetStore`] - the authoritative in-memory database of browser and
//!   page records, with atomic mutations and cheap value snapshots
//! - [`EventBus`] - typed publish/subscribe connecting lifecycle changes
//!   to whoever needs to observe them (the CDP gateway, the UI)
//! - [`Surface`] - the narrow contract over the embedded browser engine
//! - [`SurfaceSupervisor`] - lifecycle orchestration: creates and destroys
//!   surfaces in an order that keeps store, engine, and observers agreeing
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use magi_fleet::{BrowserSpec, EventBus, FleetStore, SurfaceSupervisor};
//! # async fn example(surface: Arc<dyn magi_fleet::Surface>) -> Result<(), magi_fleet::FleetError> {
//! let store = FleetStore::new();
//! let bus = EventBus::new();
//! let supervisor = SurfaceSupervisor::new(surface, store.clone(), bus.clone());
//!
//! let browser = supervisor.create_browser(BrowserSpec::named("work")).await?;
//! let page = supervisor
//!     .create_page(&browser.id, Some("https://example.com"), true, None)
//!     .await?;
//! println!("created page {} in browser {}", page.id, browser.id);
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Organization
//!
//! - [`ids`] - browser and page identifier newtypes
//! - [`store`] - fleet records and the store
//! - [`events`] - fleet event bus
//! - [`surface`] - the embedded-engine contract (and a simulated engine
//!   behind the `sim` feature)
//! - [`supervisor`] - lifecycle orchestration

pub mod error;
pub mod events;
pub mod ids;
pub mod store;
pub mod supervisor;
pub mod surface;

pub use error::FleetError;
pub use events::{EventBus, FleetEvent};
pub use ids::{BrowserId, PageId};
pub use store::{
    BrowserRecord, BrowserSpec, FleetSnapshot, FleetStore, NavigationState, PageInit, PageRecord,
    Thumbnail,
};
pub use supervisor::SurfaceSupervisor;
pub use surface::{
    DebuggerEvent, DebuggerHandle, PageEvent, PageHandle, PageState, PartitionHandle, Surface,
    SurfaceError,
};
