//! The surface supervisor.
//!
//! Owns the concrete engine objects behind every browser and page, and
//! turns lifecycle requests into surface operations plus store mutations
//! in a fixed order, so every observer (UI, CDP clients) sees consistent
//! state:
//!
//! - a page record is inserted (and its id known) before the engine page
//!   exists, and both exist before `PageCreated` is published;
//! - a freshly created page is attached to the host view before its first
//!   navigation starts, so early debugger events are not missed;
//! - failures roll the tentative record back before the error returns.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, instrument, warn};

use crate::error::FleetError;
use crate::events::{EventBus, FleetEvent};
use crate::ids::{BrowserId, PageId};
use crate::store::{BrowserRecord, BrowserSpec, FleetStore, PageInit, PageRecord};
use crate::surface::{PageHandle, PageOptions, PartitionHandle, Surface};

mod mirror;
use mirror::mirror_loop;

/// URL of the "new tab" home used when no initial URL is given.
const NEW_TAB_URL: &str = "about:blank";

#[derive(Debug)]
struct PageRuntime {
    handle: PageHandle,
    mirror: JoinHandle<()>,
}

#[derive(Debug)]
struct Inner {
    surface: Arc<dyn Surface>,
    store: FleetStore,
    bus: EventBus,
    partitions: Mutex<HashMap<BrowserId, PartitionHandle>>,
    pages: Mutex<HashMap<PageId, PageRuntime>>,
}

/// Shared handle to the supervisor.
#[derive(Debug, Clone)]
pub struct SurfaceSupervisor {
    inner: Arc<Inner>,
}

impl SurfaceSupervisor {
    /// Build a supervisor over a surface, store, and event bus.
    #[must_use]
    pub fn new(surface: Arc<dyn Surface>, store: FleetStore, bus: EventBus) -> Self {
        Self {
            inner: Arc::new(Inner {
                surface,
                store,
                bus,
                partitions: Mutex::new(HashMap::new()),
                pages: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// The store this supervisor mutates.
    pub fn store(&self) -> &FleetStore {
        &self.inner.store
    }

    /// The engine handle of a live page, if any.
    pub fn page_handle(&self, page_id: &PageId) -> Option<PageHandle> {
        self.inner.pages.lock().get(page_id).map(|rt| rt.handle)
    }

    /// Create a browser with an isolated partition and one initial page.
    #[instrument(level = "debug", skip(self, spec))]
    pub async fn create_browser(&self, spec: BrowserSpec) -> Result<BrowserRecord, FleetError> {
        let initial_url = spec.initial_url.clone();
        let record = self.inner.store.create_browser(&spec);
        let browser_id = record.id.clone();

        let partition = match self.inner.surface.new_partition(&record.partition_key).await {
            Ok(partition) => partition,
            Err(err) => {
                self.inner.store.delete_browser(&browser_id);
                return Err(err.into());
            }
        };
        self.inner
            .partitions
            .lock()
            .insert(browser_id.clone(), partition);
        self.inner.bus.publish(FleetEvent::BrowserCreated {
            browser_id: browser_id.clone(),
        });
        debug!(%browser_id, "browser created");

        // The initial page follows the normal page-create path.
        if let Err(err) = self
            .create_page(&browser_id, initial_url.as_deref(), true, None)
            .await
        {
            self.inner.partitions.lock().remove(&browser_id);
            self.inner.store.delete_browser(&browser_id);
            self.inner.bus.publish(FleetEvent::BrowserDestroyed {
                browser_id: browser_id.clone(),
            });
            return Err(err);
        }

        self.inner
            .store
            .get_browser(&browser_id)
            .ok_or(FleetError::BrowserNotFound(browser_id))
    }

    /// Destroy a browser and cascade over all of its pages.
    #[instrument(level = "debug", skip(self))]
    pub async fn destroy_browser(&self, browser_id: &BrowserId) -> Result<(), FleetError> {
        let record = self
            .inner
            .store
            .get_browser(browser_id)
            .ok_or_else(|| FleetError::BrowserNotFound(browser_id.clone()))?;

        if let Some(active) = &record.active_page {
            if let Some(handle) = self.page_handle(active) {
                let _ = self.inner.surface.detach_view(handle).await;
            }
        }

        for page_id in &record.pages {
            let runtime = self.inner.pages.lock().remove(page_id);
            if let Some(runtime) = runtime {
                runtime.mirror.abort();
                let _ = self.inner.surface.close_page(runtime.handle).await;
            }
            if self.inner.store.remove_page(browser_id, page_id).is_ok() {
                self.inner.bus.publish(FleetEvent::PageDestroyed {
                    browser_id: browser_id.clone(),
                    page_id: page_id.clone(),
                });
            }
        }

        self.inner.store.delete_browser(browser_id);
        self.inner.partitions.lock().remove(browser_id);
        self.inner.bus.publish(FleetEvent::BrowserDestroyed {
            browser_id: browser_id.clone(),
        });
        debug!(%browser_id, "browser destroyed");
        Ok(())
    }

    /// Create a page in a browser.
    ///
    /// The record is inserted first so the page id is known and
    /// discoverable; the engine page is created and bound next; the
    /// `PageCreated` event is published only once both exist; navigation
    /// starts last, after the view is attached.
    #[instrument(level = "debug", skip(self, url))]
    pub async fn create_page(
        &self,
        browser_id: &BrowserId,
        url: Option<&str>,
        activate: bool,
        after: Option<&PageId>,
    ) -> Result<PageRecord, FleetError> {
        let browser = self
            .inner
            .store
            .get_browser(browser_id)
            .ok_or_else(|| FleetError::BrowserNotFound(browser_id.clone()))?;
        let partition = *self
            .inner
            .partitions
            .lock()
            .get(browser_id)
            .ok_or_else(|| FleetError::BrowserNotFound(browser_id.clone()))?;

        let url = url.unwrap_or(NEW_TAB_URL);
        let record = self
            .inner
            .store
            .insert_page(browser_id, PageInit::with_url(url), after)?;
        let page_id = record.id.clone();

        let opts = PageOptions {
            user_agent: browser.user_agent.clone(),
        };
        let handle = match self.inner.surface.new_page(partition, &opts).await {
            Ok(handle) => handle,
            Err(err) => {
                let _ = self.inner.store.remove_page(browser_id, &page_id);
                return Err(err.into());
            }
        };

        // Subscribe before anything can happen on the page.
        let events = match self.inner.surface.page_events(handle) {
            Ok(events) => events,
            Err(err) => {
                let _ = self.inner.surface.close_page(handle).await;
                let _ = self.inner.store.remove_page(browser_id, &page_id);
                return Err(err.into());
            }
        };
        let mirror = tokio::spawn(mirror_loop(
            Arc::downgrade(&self.inner),
            browser_id.clone(),
            page_id.clone(),
            events,
        ));
        self.inner
            .pages
            .lock()
            .insert(page_id.clone(), PageRuntime { handle, mirror });

        if let Err(err) = self.inner.surface.attach_view(handle).await {
            warn!(%page_id, error = %err, "view attach failed");
        }

        self.inner.bus.publish(FleetEvent::PageCreated {
            browser_id: browser_id.clone(),
            page_id: page_id.clone(),
            after: after.cloned(),
        });
        debug!(%browser_id, %page_id, url, "page created");

        if activate {
            if self
                .inner
                .store
                .set_active_page(browser_id, Some(&page_id))
                .unwrap_or(false)
            {
                self.inner.bus.publish(FleetEvent::PageActivated {
                    browser_id: browser_id.clone(),
                    page_id: Some(page_id.clone()),
                });
            }
        }

        // Attach before navigate: only now start loading.
        if url != NEW_TAB_URL {
            if let Err(err) = self.inner.surface.navigate(handle, url).await {
                warn!(%page_id, url, error = %err, "initial navigation failed");
                self.inner.bus.publish(FleetEvent::PageNavigated {
                    browser_id: browser_id.clone(),
                    page_id: page_id.clone(),
                    url: url.to_string(),
                    error: Some(err.to_string()),
                });
            }
        }

        self.inner
            .store
            .get_page(&page_id)
            .ok_or(FleetError::PageNotFound(page_id))
    }

    /// Close a page, selecting the successor when it was active.
    #[instrument(level = "debug", skip(self))]
    pub async fn close_page(
        &self,
        browser_id: &BrowserId,
        page_id: &PageId,
    ) -> Result<(), FleetError> {
        let page = self
            .inner
            .store
            .get_page(page_id)
            .ok_or_else(|| FleetError::PageNotFound(page_id.clone()))?;
        if &page.browser_id != browser_id {
            return Err(FleetError::PageNotInBrowser {
                page: page_id.clone(),
                browser: browser_id.clone(),
            });
        }

        // Stop the mirror before the engine emits Closed, so removal runs
        // exactly once, here.
        let runtime = self.inner.pages.lock().remove(page_id);
        if let Some(runtime) = runtime {
            runtime.mirror.abort();
            let _ = self.inner.surface.close_page(runtime.handle).await;
        }

        let removal = self.inner.store.remove_page(browser_id, page_id)?;
        self.inner.bus.publish(FleetEvent::PageDestroyed {
            browser_id: browser_id.clone(),
            page_id: page_id.clone(),
        });
        if removal.active_changed {
            if let Some(next) = &removal.new_active {
                if let Some(handle) = self.page_handle(next) {
                    let _ = self.inner.surface.attach_view(handle).await;
                }
            }
            self.inner.bus.publish(FleetEvent::PageActivated {
                browser_id: browser_id.clone(),
                page_id: removal.new_active,
            });
        }
        debug!(%browser_id, %page_id, "page closed");
        Ok(())
    }

    /// Navigate a page. Failures are reported through `PageNavigated` with
    /// an error flag; they do not tear the page down.
    pub async fn navigate_page(&self, page_id: &PageId, url: &str) -> Result<(), FleetError> {
        let (browser_id, handle) = self.page_context(page_id)?;
        if let Err(err) = self.inner.surface.navigate(handle, url).await {
            warn!(%page_id, url, error = %err, "navigation failed");
            self.inner.bus.publish(FleetEvent::PageNavigated {
                browser_id,
                page_id: page_id.clone(),
                url: url.to_string(),
                error: Some(err.to_string()),
            });
        }
        Ok(())
    }

    /// Reload a page.
    pub async fn reload_page(&self, page_id: &PageId) -> Result<(), FleetError> {
        let (_, handle) = self.page_context(page_id)?;
        Ok(self.inner.surface.reload(handle).await?)
    }

    /// Navigate a page back in history.
    pub async fn go_back(&self, page_id: &PageId) -> Result<(), FleetError> {
        let (_, handle) = self.page_context(page_id)?;
        Ok(self.inner.surface.go_back(handle).await?)
    }

    /// Navigate a page forward in history.
    pub async fn go_forward(&self, page_id: &PageId) -> Result<(), FleetError> {
        let (_, handle) = self.page_context(page_id)?;
        Ok(self.inner.surface.go_forward(handle).await?)
    }

    /// Make a page the browser's active page and attach its view.
    pub async fn select_page(
        &self,
        browser_id: &BrowserId,
        page_id: &PageId,
    ) -> Result<(), FleetError> {
        let changed = self
            .inner
            .store
            .set_active_page(browser_id, Some(page_id))?;
        if changed {
            if let Some(handle) = self.page_handle(page_id) {
                let _ = self.inner.surface.attach_view(handle).await;
            }
            self.inner.bus.publish(FleetEvent::PageActivated {
                browser_id: browser_id.clone(),
                page_id: Some(page_id.clone()),
            });
        }
        Ok(())
    }

    fn page_context(&self, page_id: &PageId) -> Result<(BrowserId, PageHandle), FleetError> {
        let page = self
            .inner
            .store
            .get_page(page_id)
            .ok_or_else(|| FleetError::PageNotFound(page_id.clone()))?;
        let handle = self
            .page_handle(page_id)
            .ok_or_else(|| FleetError::PageNotFound(page_id.clone()))?;
        Ok((page.browser_id, handle))
    }
}
