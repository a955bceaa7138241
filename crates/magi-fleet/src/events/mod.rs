//! The fleet event bus.
//!
//! Lifecycle changes flow through here: the supervisor publishes, the CDP
//! gateway and the UI subscribe. Dispatch is synchronous (a broadcast send)
//! and subscribers see events in publish order; a subscriber that needs to
//! do I/O hands the event to its own writer task.

use tokio::sync::broadcast;
use tracing::trace;

use crate::ids::{BrowserId, PageId};

/// Buffer size for the fleet broadcast channel.
const EVENT_CHANNEL_SIZE: usize = 256;

/// A fleet lifecycle event.
#[derive(Debug, Clone)]
pub enum FleetEvent {
    /// A browser was created.
    BrowserCreated {
        /// The new browser.
        browser_id: BrowserId,
    },
    /// A browser was destroyed (after all of its pages).
    BrowserDestroyed {
        /// The destroyed browser.
        browser_id: BrowserId,
    },
    /// A page was created and is discoverable.
    PageCreated {
        /// Owning browser.
        browser_id: BrowserId,
        /// The new page.
        page_id: PageId,
        /// The page it was inserted after, for popups.
        after: Option<PageId>,
    },
    /// A page was destroyed.
    PageDestroyed {
        /// Owning browser.
        browser_id: BrowserId,
        /// The destroyed page.
        page_id: PageId,
    },
    /// The browser's active page changed.
    PageActivated {
        /// Owning browser.
        browser_id: BrowserId,
        /// The newly active page, or none when the last page closed.
        page_id: Option<PageId>,
    },
    /// A page finished (or failed) a navigation.
    PageNavigated {
        /// Owning browser.
        browser_id: BrowserId,
        /// The page.
        page_id: PageId,
        /// The resulting URL.
        url: String,
        /// Failure message when the navigation failed.
        error: Option<String>,
    },
    /// A page's title changed.
    PageTitleChanged {
        /// Owning browser.
        browser_id: BrowserId,
        /// The page.
        page_id: PageId,
        /// The new title.
        title: String,
    },
    /// A page's favicon changed.
    PageFaviconChanged {
        /// Owning browser.
        browser_id: BrowserId,
        /// The page.
        page_id: PageId,
        /// The new favicon URL.
        favicon: Option<String>,
    },
}

impl FleetEvent {
    /// The browser this event concerns.
    pub fn browser_id(&self) -> &BrowserId {
        match self {
            Self::BrowserCreated { browser_id }
            | Self::BrowserDestroyed { browser_id }
            | Self::PageCreated { browser_id, .. }
            | Self::PageDestroyed { browser_id, .. }
            | Self::PageActivated { browser_id, .. }
            | Self::PageNavigated { browser_id, .. }
            | Self::PageTitleChanged { browser_id, .. }
            | Self::PageFaviconChanged { browser_id, .. } => browser_id,
        }
    }
}

/// Shared handle to the fleet event channel.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<FleetEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    /// Create a bus with the default buffer.
    #[must_use]
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CHANNEL_SIZE);
        Self { tx }
    }

    /// Publish an event to all subscribers. Publishing never blocks; it is
    /// fine for no subscriber to exist.
    pub fn publish(&self, event: FleetEvent) {
        trace!(?event, "fleet event");
        let _ = self.tx.send(event);
    }

    /// Subscribe to fleet events from this point on.
    pub fn subscribe(&self) -> broadcast::Receiver<FleetEvent> {
        self.tx.subscribe()
    }
}
