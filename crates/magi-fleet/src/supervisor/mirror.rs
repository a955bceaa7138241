//! Per-page task mirroring engine events into the store and onto the bus.
//!
//! Lives in its own submodule so the compiler can resolve the `Send`
//! auto-trait for the mutually-spawning `create_page`/`mirror_loop` pair
//! without a recursive-opaque-type cycle (see the module boundary note on
//! `mirror_loop` below).

use std::future::Future;
use std::pin::Pin;
use std::sync::Weak;

use tokio::sync::broadcast::error::RecvError;
use tracing::warn;

use super::{Inner, SurfaceSupervisor};
use crate::events::FleetEvent;
use crate::ids::{BrowserId, PageId};
use crate::surface::PageEvent;

/// Per-page task mirroring engine events into the store and onto the bus.
///
/// Declared with an explicit boxed return type (rather than `async fn`)
/// so its `Send`-ness is asserted at the signature rather than inferred
/// from an opaque return type — `create_page` spawns this future, and
/// this future in turn spawns a future that awaits `create_page`, and
/// rustc cannot resolve that mutual-opaque-type cycle otherwise.
pub(super) fn mirror_loop(
    weak: Weak<Inner>,
    browser_id: BrowserId,
    page_id: PageId,
    mut events: tokio::sync::broadcast::Receiver<PageEvent>,
) -> Pin<Box<dyn Future<Output = ()> + Send>> {
    Box::pin(async move {
    loop {
        let event = match events.recv().await {
            Ok(event) => event,
            Err(RecvError::Lagged(missed)) => {
                warn!(%page_id, missed, "page event stream lagged");
                continue;
            }
            Err(RecvError::Closed) => break,
        };
        let Some(inner) = weak.upgrade() else { break };

        match event {
            PageEvent::Navigated {
                url,
                can_go_back,
                can_go_forward,
                error,
            } => {
                inner.store.mutate_page(&page_id, |page| {
                    if error.is_none() {
                        page.url.clone_from(&url);
                    }
                    page.navigation.can_go_back = can_go_back;
                    page.navigation.can_go_forward = can_go_forward;
                });
                inner.bus.publish(FleetEvent::PageNavigated {
                    browser_id: browser_id.clone(),
                    page_id: page_id.clone(),
                    url,
                    error,
                });
            }
            PageEvent::TitleChanged(title) => {
                inner
                    .store
                    .mutate_page(&page_id, |page| page.title.clone_from(&title));
                inner.bus.publish(FleetEvent::PageTitleChanged {
                    browser_id: browser_id.clone(),
                    page_id: page_id.clone(),
                    title,
                });
            }
            PageEvent::FaviconChanged(favicon) => {
                inner
                    .store
                    .mutate_page(&page_id, |page| page.favicon.clone_from(&favicon));
                inner.bus.publish(FleetEvent::PageFaviconChanged {
                    browser_id: browser_id.clone(),
                    page_id: page_id.clone(),
                    favicon,
                });
            }
            PageEvent::LoadStarted => {
                inner
                    .store
                    .mutate_page(&page_id, |page| page.navigation.is_loading = true);
            }
            PageEvent::LoadFinished | PageEvent::LoadFailed { .. } => {
                inner
                    .store
                    .mutate_page(&page_id, |page| page.navigation.is_loading = false);
            }
            PageEvent::PopupRequested { url } => {
                // Popups land immediately after their parent and take focus.
                let supervisor = SurfaceSupervisor {
                    inner: inner.clone(),
                };
                let browser_id = browser_id.clone();
                let parent = page_id.clone();
                tokio::spawn(async move {
                    if let Err(err) = supervisor
                        .create_page(&browser_id, Some(&url), true, Some(&parent))
                        .await
                    {
                        warn!(%browser_id, parent = %parent, error = %err, "popup creation failed");
                    }
                });
            }
            PageEvent::Closed => {
                // The engine closed the page underneath us.
                inner.pages.lock().remove(&page_id);
                if let Ok(removal) = inner.store.remove_page(&browser_id, &page_id) {
                    inner.bus.publish(FleetEvent::PageDestroyed {
                        browser_id: browser_id.clone(),
                        page_id: page_id.clone(),
                    });
                    if removal.active_changed {
                        inner.bus.publish(FleetEvent::PageActivated {
                            browser_id: browser_id.clone(),
                            page_id: removal.new_active,
                        });
                    }
                }
                break;
            }
        }
    }
    })
}
