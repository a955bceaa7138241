//! The embedded-engine contract.
//!
//! The fleet never touches the embedded browser engine directly; it drives
//! an implementation of [`Surface`]. The contract is deliberately narrow:
//! partitions, pages, view attachment, navigation, and the single debugger
//! channel per page. Implementations must deliver debugger events in
//! engine-emitted order for the lifetime of a binding.

use std::fmt;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::broadcast;

#[cfg(any(test, feature = "sim"))]
pub mod sim;

/// Opaque handle to a storage partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PartitionHandle(u64);

impl PartitionHandle {
    /// Wrap a raw engine identifier.
    #[must_use]
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw engine identifier.
    pub fn raw(self) -> u64 {
        self.0
    }
}

/// Opaque handle to an embedded page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PageHandle(u64);

impl PageHandle {
    /// Wrap a raw engine identifier.
    #[must_use]
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw engine identifier.
    pub fn raw(self) -> u64 {
        self.0
    }
}

/// Handle to the single debugger attachment of one page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DebuggerHandle {
    page: PageHandle,
    token: u64,
}

impl DebuggerHandle {
    /// Build a binding handle for a page with an attachment token.
    #[must_use]
    pub fn new(page: PageHandle, token: u64) -> Self {
        Self { page, token }
    }

    /// The page this binding belongs to.
    pub fn page(&self) -> PageHandle {
        self.page
    }

    /// The attachment token; changes on every re-attach.
    pub fn token(&self) -> u64 {
        self.token
    }
}

/// Point-in-time page state, pollable from the engine.
#[derive(Debug, Clone, Default)]
pub struct PageState {
    /// Current URL.
    pub url: String,
    /// Current title.
    pub title: String,
    /// Favicon URL, when known.
    pub favicon: Option<String>,
    /// Whether a load is in flight.
    pub loading: bool,
    /// Whether history back is possible.
    pub can_go_back: bool,
    /// Whether history forward is possible.
    pub can_go_forward: bool,
}

/// A navigation/lifecycle event streamed from one page.
#[derive(Debug, Clone)]
pub enum PageEvent {
    /// The page committed a navigation (or failed one).
    Navigated {
        /// Resulting URL.
        url: String,
        /// History-back availability after the navigation.
        can_go_back: bool,
        /// History-forward availability after the navigation.
        can_go_forward: bool,
        /// Failure message when the navigation failed.
        error: Option<String>,
    },
    /// The title changed.
    TitleChanged(String),
    /// The favicon changed.
    FaviconChanged(Option<String>),
    /// A load started.
    LoadStarted,
    /// A load finished.
    LoadFinished,
    /// A load failed.
    LoadFailed {
        /// Engine failure message.
        error: String,
    },
    /// The page asked to open a popup (window.open and friends).
    PopupRequested {
        /// Requested URL.
        url: String,
    },
    /// The page went away on the engine side.
    Closed,
}

/// An event streamed from a debugger binding.
#[derive(Debug, Clone)]
pub struct DebuggerEvent {
    /// CDP method name.
    pub method: String,
    /// Event parameters.
    pub params: Value,
}

/// Errors from the embedded engine.
#[derive(Debug, Clone, Error)]
pub enum SurfaceError {
    /// The page's debugger channel is already held.
    #[error("debugger already attached")]
    AlreadyAttached,

    /// The page no longer exists on the engine side.
    #[error("page no longer exists")]
    PageGone,

    /// The referenced partition does not exist.
    #[error("unknown partition")]
    UnknownPartition,

    /// The engine failed the operation.
    #[error("surface unavailable: {0}")]
    Unavailable(String),
}

/// Options for creating an embedded page.
#[derive(Debug, Clone, Default)]
pub struct PageOptions {
    /// User agent override for this page.
    pub user_agent: Option<String>,
}

/// The embedded browser engine, as the fleet sees it.
///
/// Between a successful [`attach_debugger`](Surface::attach_debugger) and
/// the matching detach, events on the binding arrive in engine-emitted
/// order.
#[async_trait]
pub trait Surface: fmt::Debug + Send + Sync {
    /// Create an isolated storage partition.
    async fn new_partition(&self, key: &str) -> Result<PartitionHandle, SurfaceError>;

    /// Create an embedded page bound to a partition.
    async fn new_page(
        &self,
        partition: PartitionHandle,
        opts: &PageOptions,
    ) -> Result<PageHandle, SurfaceError>;

    /// Attach the page's view to the host window (display only).
    async fn attach_view(&self, page: PageHandle) -> Result<(), SurfaceError>;

    /// Detach the page's view from the host window.
    async fn detach_view(&self, page: PageHandle) -> Result<(), SurfaceError>;

    /// Start a navigation.
    async fn navigate(&self, page: PageHandle, url: &str) -> Result<(), SurfaceError>;

    /// Reload the current document.
    async fn reload(&self, page: PageHandle) -> Result<(), SurfaceError>;

    /// Navigate back in history.
    async fn go_back(&self, page: PageHandle) -> Result<(), SurfaceError>;

    /// Navigate forward in history.
    async fn go_forward(&self, page: PageHandle) -> Result<(), SurfaceError>;

    /// Tear the page down.
    async fn close_page(&self, page: PageHandle) -> Result<(), SurfaceError>;

    /// Acquire the page's single debugger channel.
    ///
    /// Fails with [`SurfaceError::AlreadyAttached`] while another binding
    /// holds the channel.
    async fn attach_debugger(&self, page: PageHandle) -> Result<DebuggerHandle, SurfaceError>;

    /// Release a debugger channel.
    async fn detach_debugger(&self, binding: DebuggerHandle) -> Result<(), SurfaceError>;

    /// Send a debugger command and await its result.
    async fn send_debugger_command(
        &self,
        binding: DebuggerHandle,
        method: &str,
        params: Value,
    ) -> Result<Value, SurfaceError>;

    /// Subscribe to debugger events on a binding.
    fn debugger_events(
        &self,
        binding: DebuggerHandle,
    ) -> Result<broadcast::Receiver<DebuggerEvent>, SurfaceError>;

    /// Poll the page's current state.
    async fn page_state(&self, page: PageHandle) -> Result<PageState, SurfaceError>;

    /// Subscribe to navigation/lifecycle events on a page.
    fn page_events(
        &self,
        page: PageHandle,
    ) -> Result<broadcast::Receiver<PageEvent>, SurfaceError>;
}
