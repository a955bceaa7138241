//! The fleet store: authoritative in-memory model of browsers and pages.
//!
//! A single-writer, many-reader database. Every mutation runs under one
//! write lock and leaves the invariants intact: page lists and page records
//! agree, the active page is always a member of its browser's page list,
//! and page order is the insertion/reorder history. Critical sections are
//! short and synchronous, so the lock is a plain `parking_lot::RwLock`
//! rather than an async one.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

use crate::error::FleetError;
use crate::ids::{BrowserId, PageId};

/// Per-page navigation state mirrored from the surface.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigationState {
    /// Whether history navigation backwards is possible.
    pub can_go_back: bool,
    /// Whether history navigation forwards is possible.
    pub can_go_forward: bool,
    /// Whether a load is in flight.
    pub is_loading: bool,
}

/// A captured page thumbnail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Thumbnail {
    /// Base64 data URL of the capture.
    pub data_url: String,
    /// When the capture was taken.
    pub last_updated_at: DateTime<Utc>,
}

/// A browser in the fleet.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrowserRecord {
    /// Stable opaque id.
    pub id: BrowserId,
    /// Human-readable name.
    pub name: String,
    /// Storage isolation namespace.
    pub partition_key: String,
    /// Override user agent, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Ordered pages; the order is what target lists expose.
    pub pages: Vec<PageId>,
    /// The active (foreground) page.
    pub active_page: Option<PageId>,
}

/// A page in the fleet.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageRecord {
    /// Stable opaque id.
    pub id: PageId,
    /// Owning browser.
    pub browser_id: BrowserId,
    /// Page title mirrored from the surface.
    pub title: String,
    /// Current URL mirrored from the surface.
    pub url: String,
    /// Favicon URL, when the page reported one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub favicon: Option<String>,
    /// Whether this is the browser's active page.
    pub is_active: bool,
    /// Navigation state mirror.
    pub navigation: NavigationState,
    /// Latest thumbnail capture, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<Thumbnail>,
}

/// Parameters for creating a browser.
#[derive(Debug, Clone, Default)]
pub struct BrowserSpec {
    /// Human-readable name; defaults to "default".
    pub name: Option<String>,
    /// Storage partition key; a fresh one is generated when absent.
    pub partition_key: Option<String>,
    /// User agent override.
    pub user_agent: Option<String>,
    /// URL for the initial page; the new-tab home when absent.
    pub initial_url: Option<String>,
}

impl BrowserSpec {
    /// A spec with just a name.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    /// Set the storage partition key.
    #[must_use]
    pub fn partition_key(mut self, key: impl Into<String>) -> Self {
        self.partition_key = Some(key.into());
        self
    }

    /// Set the user agent override.
    #[must_use]
    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.user_agent = Some(ua.into());
        self
    }

    /// Set the initial page URL.
    #[must_use]
    pub fn initial_url(mut self, url: impl Into<String>) -> Self {
        self.initial_url = Some(url.into());
        self
    }
}

/// Initial field values for a new page record.
#[derive(Debug, Clone)]
pub struct PageInit {
    /// Initial URL.
    pub url: String,
    /// Initial title.
    pub title: String,
}

impl Default for PageInit {
    fn default() -> Self {
        Self {
            url: "about:blank".to_string(),
            title: String::new(),
        }
    }
}

impl PageInit {
    /// A page init with a URL.
    #[must_use]
    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }
}

/// Outcome of removing a page.
#[derive(Debug, Clone)]
pub struct PageRemoval {
    /// The removed record.
    pub record: PageRecord,
    /// The active page after removal.
    pub new_active: Option<PageId>,
    /// Whether the removal changed the active page.
    pub active_changed: bool,
}

/// A deep value copy of the whole fleet, safe to retain without locking.
#[derive(Debug, Clone, Serialize)]
pub struct FleetSnapshot {
    /// Browsers in creation order, each with its pages in list order.
    pub browsers: Vec<BrowserSnapshot>,
}

/// One browser and its pages in a snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct BrowserSnapshot {
    /// The browser record.
    #[serde(flatten)]
    pub browser: BrowserRecord,
    /// Page records in list order.
    pub page_records: Vec<PageRecord>,
}

#[derive(Debug, Default)]
struct FleetState {
    /// Browser creation order; the first entry is the default browser.
    order: Vec<BrowserId>,
    browsers: HashMap<BrowserId, BrowserRecord>,
    pages: HashMap<PageId, PageRecord>,
}

/// Shared handle to the fleet database.
#[derive(Debug, Clone, Default)]
pub struct FleetStore {
    inner: Arc<RwLock<FleetState>>,
}

impl FleetStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new empty browser and return its record.
    pub fn create_browser(&self, spec: &BrowserSpec) -> BrowserRecord {
        let record = BrowserRecord {
            id: BrowserId::generate(),
            name: spec.name.clone().unwrap_or_else(|| "default".to_string()),
            partition_key: spec
                .partition_key
                .clone()
                .unwrap_or_else(|| format!("magi-{}", Uuid::new_v4().simple())),
            user_agent: spec.user_agent.clone(),
            created_at: Utc::now(),
            pages: Vec::new(),
            active_page: None,
        };
        let mut state = self.inner.write();
        state.order.push(record.id.clone());
        state.browsers.insert(record.id.clone(), record.clone());
        record
    }

    /// Remove a browser and all of its pages. Returns the removed record
    /// and the removed page records in list order; `None` when the browser
    /// does not exist.
    pub fn delete_browser(&self, browser_id: &BrowserId) -> Option<(BrowserRecord, Vec<PageRecord>)> {
        let mut state = self.inner.write();
        let record = state.browsers.remove(browser_id)?;
        state.order.retain(|id| id != browser_id);
        let removed = record
            .pages
            .iter()
            .filter_map(|page_id| state.pages.remove(page_id))
            .collect();
        Some((record, removed))
    }

    /// Insert a page into a browser, appending or placing it immediately
    /// after `after`. An `after` id that is not in the browser falls back
    /// to append.
    pub fn insert_page(
        &self,
        browser_id: &BrowserId,
        init: PageInit,
        after: Option<&PageId>,
    ) -> Result<PageRecord, FleetError> {
        let mut state = self.inner.write();
        let browser = state
            .browsers
            .get_mut(browser_id)
            .ok_or_else(|| FleetError::BrowserNotFound(browser_id.clone()))?;

        let record = PageRecord {
            id: PageId::generate(),
            browser_id: browser_id.clone(),
            title: init.title,
            url: init.url,
            favicon: None,
            is_active: false,
            navigation: NavigationState::default(),
            thumbnail: None,
        };

        let position = match after {
            Some(after_id) => match browser.pages.iter().position(|id| id == after_id) {
                Some(idx) => idx + 1,
                None => {
                    warn!(%browser_id, after = %after_id, "insert anchor not in browser, appending");
                    browser.pages.len()
                }
            },
            None => browser.pages.len(),
        };
        browser.pages.insert(position, record.id.clone());
        state.pages.insert(record.id.clone(), record.clone());
        Ok(record)
    }

    /// Remove a page. When the removed page was active, the page to its
    /// right becomes active, else the page to its left, else none.
    pub fn remove_page(
        &self,
        browser_id: &BrowserId,
        page_id: &PageId,
    ) -> Result<PageRemoval, FleetError> {
        let mut state = self.inner.write();
        let browser = state
            .browsers
            .get_mut(browser_id)
            .ok_or_else(|| FleetError::BrowserNotFound(browser_id.clone()))?;
        let position = browser
            .pages
            .iter()
            .position(|id| id == page_id)
            .ok_or_else(|| FleetError::PageNotInBrowser {
                page: page_id.clone(),
                browser: browser_id.clone(),
            })?;

        browser.pages.remove(position);
        let was_active = browser.active_page.as_ref() == Some(page_id);
        if was_active {
            let successor = browser
                .pages
                .get(position)
                .or_else(|| browser.pages.get(position.wrapping_sub(1)))
                .cloned();
            browser.active_page = successor;
        }
        let new_active = browser.active_page.clone();

        if was_active {
            if let Some(active) = &new_active {
                if let Some(page) = state.pages.get_mut(active) {
                    page.is_active = true;
                }
            }
        }
        let record = state
            .pages
            .remove(page_id)
            .ok_or_else(|| FleetError::PageNotFound(page_id.clone()))?;

        Ok(PageRemoval {
            record,
            new_active,
            active_changed: was_active,
        })
    }

    /// Point the browser's active page somewhere else. Idempotent; returns
    /// whether anything changed.
    pub fn set_active_page(
        &self,
        browser_id: &BrowserId,
        page_id: Option<&PageId>,
    ) -> Result<bool, FleetError> {
        let mut state = self.inner.write();
        let browser = state
            .browsers
            .get_mut(browser_id)
            .ok_or_else(|| FleetError::BrowserNotFound(browser_id.clone()))?;

        if let Some(id) = page_id {
            if !browser.pages.contains(id) {
                return Err(FleetError::PageNotInBrowser {
                    page: id.clone(),
                    browser: browser_id.clone(),
                });
            }
        }
        if browser.active_page.as_ref() == page_id {
            return Ok(false);
        }

        let previous = browser.active_page.clone();
        browser.active_page = page_id.cloned();
        let next = browser.active_page.clone();

        if let Some(prev) = previous {
            if let Some(page) = state.pages.get_mut(&prev) {
                page.is_active = false;
            }
        }
        if let Some(next) = next {
            if let Some(page) = state.pages.get_mut(&next) {
                page.is_active = true;
            }
        }
        Ok(true)
    }

    /// Apply a transform to a page record. No-op when the page is absent;
    /// returns whether the page was found.
    pub fn mutate_page(&self, page_id: &PageId, f: impl FnOnce(&mut PageRecord)) -> bool {
        let mut state = self.inner.write();
        match state.pages.get_mut(page_id) {
            Some(page) => {
                f(page);
                true
            }
            None => false,
        }
    }

    /// Look up a browser record.
    pub fn get_browser(&self, browser_id: &BrowserId) -> Option<BrowserRecord> {
        self.inner.read().browsers.get(browser_id).cloned()
    }

    /// Look up a page record.
    pub fn get_page(&self, page_id: &PageId) -> Option<PageRecord> {
        self.inner.read().pages.get(page_id).cloned()
    }

    /// The earliest-created live browser, used as the default debug target.
    pub fn first_browser_id(&self) -> Option<BrowserId> {
        self.inner.read().order.first().cloned()
    }

    /// All browser ids in creation order.
    pub fn browser_ids(&self) -> Vec<BrowserId> {
        self.inner.read().order.clone()
    }

    /// Page records of one browser, in list order.
    pub fn pages_of(&self, browser_id: &BrowserId) -> Vec<PageRecord> {
        let state = self.inner.read();
        let Some(browser) = state.browsers.get(browser_id) else {
            return Vec::new();
        };
        browser
            .pages
            .iter()
            .filter_map(|id| state.pages.get(id).cloned())
            .collect()
    }

    /// A deep value copy of the whole fleet.
    pub fn snapshot(&self) -> FleetSnapshot {
        let state = self.inner.read();
        let browsers = state
            .order
            .iter()
            .filter_map(|id| state.browsers.get(id))
            .map(|browser| BrowserSnapshot {
                browser: browser.clone(),
                page_records: browser
                    .pages
                    .iter()
                    .filter_map(|id| state.pages.get(id).cloned())
                    .collect(),
            })
            .collect();
        FleetSnapshot { browsers }
    }
}

#[cfg(test)]
mod tests;
