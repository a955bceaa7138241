//! A deterministic in-memory surface.
//!
//! Stands in for the embedded engine in tests and in non-production
//! builds: navigations complete instantly and emit the same event
//! sequence a real engine would, debugger commands are echoed with empty
//! results (or canned ones), and failures can be injected to exercise
//! rollback paths.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::sync::broadcast;
use tracing::debug;

use super::{
    DebuggerEvent, DebuggerHandle, PageEvent, PageHandle, PageOptions, PageState, PartitionHandle,
    Surface, SurfaceError,
};

const PAGE_EVENT_CAPACITY: usize = 64;
const DEBUGGER_EVENT_CAPACITY: usize = 256;

#[derive(Debug)]
struct SimPage {
    partition: PartitionHandle,
    state: PageState,
    history: Vec<String>,
    history_index: usize,
    view_attached: bool,
    debugger_token: Option<u64>,
    page_tx: broadcast::Sender<PageEvent>,
    debugger_tx: broadcast::Sender<DebuggerEvent>,
}

impl SimPage {
    fn emit(&self, event: PageEvent) {
        let _ = self.page_tx.send(event);
    }

    fn emit_debugger(&self, method: &str, params: Value) {
        let _ = self.debugger_tx.send(DebuggerEvent {
            method: method.to_string(),
            params,
        });
    }

    fn refresh_nav_flags(&mut self) {
        self.state.can_go_back = self.history_index > 0;
        self.state.can_go_forward = self.history_index + 1 < self.history.len();
    }

    fn complete_load(&mut self, url: String) {
        self.state.url.clone_from(&url);
        self.state.loading = true;
        self.refresh_nav_flags();
        self.emit(PageEvent::LoadStarted);
        self.emit(PageEvent::Navigated {
            url: url.clone(),
            can_go_back: self.state.can_go_back,
            can_go_forward: self.state.can_go_forward,
            error: None,
        });
        self.emit_debugger("Page.frameStartedLoading", json!({ "frameId": "main" }));

        self.state.loading = false;
        let title = derive_title(&url);
        if self.state.title != title {
            self.state.title.clone_from(&title);
            self.emit(PageEvent::TitleChanged(title));
        }
        self.emit(PageEvent::LoadFinished);
        self.emit_debugger("Page.loadEventFired", json!({ "timestamp": 0.0 }));
    }
}

fn derive_title(url: &str) -> String {
    if url == "about:blank" {
        String::new()
    } else {
        url.trim_start_matches("https://")
            .trim_start_matches("http://")
            .split('/')
            .next()
            .unwrap_or_default()
            .to_string()
    }
}

#[derive(Debug, Default)]
struct SimState {
    partitions: HashMap<u64, String>,
    pages: HashMap<u64, SimPage>,
    fail_next_page_create: Option<String>,
    fail_next_navigation: Option<String>,
    canned_results: HashMap<String, Value>,
    command_log: VecDeque<(PageHandle, String)>,
}

/// The simulated engine.
#[derive(Debug, Default)]
pub struct SimSurface {
    inner: Mutex<SimState>,
    counter: AtomicU64,
}

impl SimSurface {
    /// Create an empty simulated engine.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(&self) -> u64 {
        self.counter.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Make the next `new_page` call fail with the given message.
    pub fn fail_next_page_create(&self, message: impl Into<String>) {
        self.inner.lock().fail_next_page_create = Some(message.into());
    }

    /// Make the next `navigate` call report a failed navigation.
    pub fn fail_next_navigation(&self, message: impl Into<String>) {
        self.inner.lock().fail_next_navigation = Some(message.into());
    }

    /// Serve a canned result for a debugger method instead of `{}`.
    pub fn set_command_result(&self, method: impl Into<String>, result: Value) {
        self.inner.lock().canned_results.insert(method.into(), result);
    }

    /// Debugger commands observed so far, in arrival order.
    pub fn command_log(&self) -> Vec<(PageHandle, String)> {
        self.inner.lock().command_log.iter().cloned().collect()
    }

    /// Simulate an in-page popup request (window.open).
    pub fn trigger_popup(&self, page: PageHandle, url: &str) -> Result<(), SurfaceError> {
        let state = self.inner.lock();
        let sim = state.pages.get(&page.raw()).ok_or(SurfaceError::PageGone)?;
        sim.emit(PageEvent::PopupRequested {
            url: url.to_string(),
        });
        Ok(())
    }

    /// Put a page into a loading state without completing it, to exercise
    /// debugger-readiness waits. Complete with [`Self::finish_manual_load`].
    pub fn begin_manual_load(&self, page: PageHandle) -> Result<(), SurfaceError> {
        let mut state = self.inner.lock();
        let sim = state
            .pages
            .get_mut(&page.raw())
            .ok_or(SurfaceError::PageGone)?;
        sim.state.loading = true;
        sim.emit(PageEvent::LoadStarted);
        Ok(())
    }

    /// Complete a load started with [`Self::begin_manual_load`].
    pub fn finish_manual_load(&self, page: PageHandle) -> Result<(), SurfaceError> {
        let mut state = self.inner.lock();
        let sim = state
            .pages
            .get_mut(&page.raw())
            .ok_or(SurfaceError::PageGone)?;
        sim.state.loading = false;
        sim.emit(PageEvent::LoadFinished);
        Ok(())
    }

    /// Simulate the engine-side death of a page.
    pub fn kill_page(&self, page: PageHandle) -> Result<(), SurfaceError> {
        let mut state = self.inner.lock();
        let sim = state
            .pages
            .remove(&page.raw())
            .ok_or(SurfaceError::PageGone)?;
        sim.emit(PageEvent::Closed);
        Ok(())
    }

    /// Simulate a title change coming from the page itself.
    pub fn set_page_title(&self, page: PageHandle, title: &str) -> Result<(), SurfaceError> {
        let mut state = self.inner.lock();
        let sim = state
            .pages
            .get_mut(&page.raw())
            .ok_or(SurfaceError::PageGone)?;
        sim.state.title = title.to_string();
        sim.emit(PageEvent::TitleChanged(title.to_string()));
        Ok(())
    }

    /// Simulate a favicon change coming from the page itself.
    pub fn set_page_favicon(&self, page: PageHandle, favicon: Option<&str>) -> Result<(), SurfaceError> {
        let mut state = self.inner.lock();
        let sim = state
            .pages
            .get_mut(&page.raw())
            .ok_or(SurfaceError::PageGone)?;
        sim.state.favicon = favicon.map(ToString::to_string);
        sim.emit(PageEvent::FaviconChanged(sim.state.favicon.clone()));
        Ok(())
    }

    /// The partition a page was created in.
    pub fn page_partition(&self, page: PageHandle) -> Option<PartitionHandle> {
        self.inner.lock().pages.get(&page.raw()).map(|p| p.partition)
    }

    /// Whether the page's view is attached to the host window.
    pub fn view_attached(&self, page: PageHandle) -> bool {
        self.inner
            .lock()
            .pages
            .get(&page.raw())
            .is_some_and(|p| p.view_attached)
    }

    /// Whether a debugger binding currently holds the page's channel.
    pub fn debugger_attached(&self, page: PageHandle) -> bool {
        self.inner
            .lock()
            .pages
            .get(&page.raw())
            .is_some_and(|p| p.debugger_token.is_some())
    }
}

#[async_trait]
impl Surface for SimSurface {
    async fn new_partition(&self, key: &str) -> Result<PartitionHandle, SurfaceError> {
        let id = self.next_id();
        self.inner.lock().partitions.insert(id, key.to_string());
        debug!(partition = id, key, "sim partition created");
        Ok(PartitionHandle::from_raw(id))
    }

    async fn new_page(
        &self,
        partition: PartitionHandle,
        _opts: &PageOptions,
    ) -> Result<PageHandle, SurfaceError> {
        let id = self.next_id();
        let mut state = self.inner.lock();
        if let Some(message) = state.fail_next_page_create.take() {
            return Err(SurfaceError::Unavailable(message));
        }
        if !state.partitions.contains_key(&partition.raw()) {
            return Err(SurfaceError::UnknownPartition);
        }
        let (page_tx, _) = broadcast::channel(PAGE_EVENT_CAPACITY);
        let (debugger_tx, _) = broadcast::channel(DEBUGGER_EVENT_CAPACITY);
        state.pages.insert(
            id,
            SimPage {
                partition,
                state: PageState {
                    url: "about:blank".to_string(),
                    ..PageState::default()
                },
                history: vec!["about:blank".to_string()],
                history_index: 0,
                view_attached: false,
                debugger_token: None,
                page_tx,
                debugger_tx,
            },
        );
        debug!(page = id, "sim page created");
        Ok(PageHandle::from_raw(id))
    }

    async fn attach_view(&self, page: PageHandle) -> Result<(), SurfaceError> {
        let mut state = self.inner.lock();
        let sim = state
            .pages
            .get_mut(&page.raw())
            .ok_or(SurfaceError::PageGone)?;
        sim.view_attached = true;
        Ok(())
    }

    async fn detach_view(&self, page: PageHandle) -> Result<(), SurfaceError> {
        let mut state = self.inner.lock();
        let sim = state
            .pages
            .get_mut(&page.raw())
            .ok_or(SurfaceError::PageGone)?;
        sim.view_attached = false;
        Ok(())
    }

    async fn navigate(&self, page: PageHandle, url: &str) -> Result<(), SurfaceError> {
        let mut state = self.inner.lock();
        if let Some(message) = state.fail_next_navigation.take() {
            let sim = state.pages.get(&page.raw()).ok_or(SurfaceError::PageGone)?;
            sim.emit(PageEvent::Navigated {
                url: url.to_string(),
                can_go_back: sim.state.can_go_back,
                can_go_forward: sim.state.can_go_forward,
                error: Some(message.clone()),
            });
            sim.emit(PageEvent::LoadFailed { error: message });
            return Ok(());
        }
        let sim = state
            .pages
            .get_mut(&page.raw())
            .ok_or(SurfaceError::PageGone)?;
        // Committing a navigation truncates forward history.
        sim.history.truncate(sim.history_index + 1);
        sim.history.push(url.to_string());
        sim.history_index = sim.history.len() - 1;
        sim.complete_load(url.to_string());
        Ok(())
    }

    async fn reload(&self, page: PageHandle) -> Result<(), SurfaceError> {
        let mut state = self.inner.lock();
        let sim = state
            .pages
            .get_mut(&page.raw())
            .ok_or(SurfaceError::PageGone)?;
        let url = sim.state.url.clone();
        sim.complete_load(url);
        Ok(())
    }

    async fn go_back(&self, page: PageHandle) -> Result<(), SurfaceError> {
        let mut state = self.inner.lock();
        let sim = state
            .pages
            .get_mut(&page.raw())
            .ok_or(SurfaceError::PageGone)?;
        if sim.history_index == 0 {
            return Ok(());
        }
        sim.history_index -= 1;
        let url = sim.history[sim.history_index].clone();
        sim.complete_load(url);
        Ok(())
    }

    async fn go_forward(&self, page: PageHandle) -> Result<(), SurfaceError> {
        let mut state = self.inner.lock();
        let sim = state
            .pages
            .get_mut(&page.raw())
            .ok_or(SurfaceError::PageGone)?;
        if sim.history_index + 1 >= sim.history.len() {
            return Ok(());
        }
        sim.history_index += 1;
        let url = sim.history[sim.history_index].clone();
        sim.complete_load(url);
        Ok(())
    }

    async fn close_page(&self, page: PageHandle) -> Result<(), SurfaceError> {
        let mut state = self.inner.lock();
        let sim = state
            .pages
            .remove(&page.raw())
            .ok_or(SurfaceError::PageGone)?;
        sim.emit(PageEvent::Closed);
        debug!(page = page.raw(), "sim page closed");
        Ok(())
    }

    async fn attach_debugger(&self, page: PageHandle) -> Result<DebuggerHandle, SurfaceError> {
        let token = self.next_id();
        let mut state = self.inner.lock();
        let sim = state
            .pages
            .get_mut(&page.raw())
            .ok_or(SurfaceError::PageGone)?;
        if sim.debugger_token.is_some() {
            return Err(SurfaceError::AlreadyAttached);
        }
        sim.debugger_token = Some(token);
        Ok(DebuggerHandle::new(page, token))
    }

    async fn detach_debugger(&self, binding: DebuggerHandle) -> Result<(), SurfaceError> {
        let mut state = self.inner.lock();
        // Detaching after the page died is not an error.
        if let Some(sim) = state.pages.get_mut(&binding.page().raw()) {
            if sim.debugger_token == Some(binding.token()) {
                sim.debugger_token = None;
            }
        }
        Ok(())
    }

    async fn send_debugger_command(
        &self,
        binding: DebuggerHandle,
        method: &str,
        _params: Value,
    ) -> Result<Value, SurfaceError> {
        let mut state = self.inner.lock();
        let valid = state
            .pages
            .get(&binding.page().raw())
            .is_some_and(|p| p.debugger_token == Some(binding.token()));
        if !valid {
            return Err(SurfaceError::PageGone);
        }
        state
            .command_log
            .push_back((binding.page(), method.to_string()));

        // Navigation-family commands drive the simulated page like the
        // surface-level operations do.
        if method == "Page.reload" {
            if let Some(sim) = state.pages.get_mut(&binding.page().raw()) {
                let url = sim.state.url.clone();
                sim.complete_load(url);
            }
        }

        let result = state
            .canned_results
            .get(method)
            .cloned()
            .unwrap_or_else(|| json!({}));
        Ok(result)
    }

    fn debugger_events(
        &self,
        binding: DebuggerHandle,
    ) -> Result<broadcast::Receiver<DebuggerEvent>, SurfaceError> {
        let state = self.inner.lock();
        let sim = state
            .pages
            .get(&binding.page().raw())
            .ok_or(SurfaceError::PageGone)?;
        if sim.debugger_token != Some(binding.token()) {
            return Err(SurfaceError::PageGone);
        }
        Ok(sim.debugger_tx.subscribe())
    }

    async fn page_state(&self, page: PageHandle) -> Result<PageState, SurfaceError> {
        let state = self.inner.lock();
        let sim = state.pages.get(&page.raw()).ok_or(SurfaceError::PageGone)?;
        Ok(sim.state.clone())
    }

    fn page_events(
        &self,
        page: PageHandle,
    ) -> Result<broadcast::Receiver<PageEvent>, SurfaceError> {
        let state = self.inner.lock();
        let sim = state.pages.get(&page.raw()).ok_or(SurfaceError::PageGone)?;
        Ok(sim.page_tx.subscribe())
    }
}

#[cfg(test)]
mod tests;
