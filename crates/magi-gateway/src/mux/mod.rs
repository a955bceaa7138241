//! The session multiplexer.
//!
//! Each embedded page exposes a single debugger attachment; CDP assumes
//! any number of concurrent clients. The multiplexer owns the one binding
//! per page, hands out sessions on top of it, correlates every response to
//! the session that sent the request, and fans debugger events out to all
//! sessions on the page.
//!
//! A binding exists iff at least one session references it; the last
//! detach releases the debugger attachment. Fresh sessions start gated:
//! outbound frames buffer until the gateway has written the attach
//! response and `Target.attachedToTarget`, so no session traffic can
//! overtake them.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use magi_cdp::wire::{CdpEvent, CdpRequest, CdpResponse, codes};
use magi_cdp::{SessionId, target::ReceivedMessageFromTargetEvent};
use magi_fleet::{DebuggerEvent, DebuggerHandle, FleetStore, PageId, Surface, SurfaceSupervisor};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use tokio::sync::Mutex as AsyncMutex;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, instrument, trace, warn};

mod readiness;
pub use readiness::ReadinessConfig;


/// Per-connection writer handle frames are delivered through.
pub type SessionSink = mpsc::UnboundedSender<String>;

/// Errors from multiplexer operations.
#[derive(Debug, Error)]
pub enum MuxError {
    /// The page does not exist (or has no live surface).
    #[error("Target not found: {0}")]
    TargetNotFound(String),

    /// The session does not exist (detached, or never attached).
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// The underlying engine refused the operation.
    #[error("{0}")]
    Surface(#[from] magi_fleet::SurfaceError),
}

/// Gate state of a session: frames buffer until the gateway opens it.
#[derive(Debug)]
enum Gate {
    Buffering(Vec<String>),
    Open,
}

#[derive(Debug)]
struct SessionEntry {
    id: SessionId,
    sink: SessionSink,
    flatten: bool,
    gate: Gate,
    pending: HashSet<u64>,
}

impl SessionEntry {
    /// Frame an inner message for this session's delivery mode.
    fn frame(&self, page_id: &PageId, inner: &str) -> Option<String> {
        if self.flatten {
            let wrapper = CdpEvent::new(
                "Target.receivedMessageFromTarget",
                serde_json::to_value(ReceivedMessageFromTargetEvent {
                    session_id: self.id.to_string(),
                    message: inner.to_string(),
                    target_id: page_id.to_string(),
                })
                .ok()?,
            );
            to_text(&wrapper)
        } else {
            Some(inner.to_string())
        }
    }

    fn deliver(&mut self, frame: String) {
        match &mut self.gate {
            Gate::Buffering(buffer) => buffer.push(frame),
            Gate::Open => {
                let _ = self.sink.send(frame);
            }
        }
    }
}

/// The single debugger attachment of one page, shared by its sessions.
#[derive(Debug)]
struct PageBinding {
    page_id: PageId,
    handle: DebuggerHandle,
    command_seq: AtomicU64,
    sessions: Mutex<HashMap<String, SessionEntry>>,
}

#[derive(Debug)]
struct BindingState {
    binding: Arc<PageBinding>,
    pump: JoinHandle<()>,
}

/// Lifecycle slot for one page's binding; the async mutex serializes
/// binding acquisition so only the first session pays the readiness wait.
#[derive(Debug, Default)]
struct BindingSlot {
    state: Option<BindingState>,
}

#[derive(Debug)]
struct MuxInner {
    surface: Arc<dyn Surface>,
    supervisor: SurfaceSupervisor,
    store: FleetStore,
    readiness: ReadinessConfig,
    seq: AtomicU64,
    /// Binding lifecycle, serialized per page.
    slots: Mutex<HashMap<PageId, Arc<AsyncMutex<BindingSlot>>>>,
    /// Hot-path lookup for routing and fan-out.
    bindings: Mutex<HashMap<PageId, Arc<PageBinding>>>,
}

/// Shared handle to the multiplexer.
#[derive(Debug, Clone)]
pub struct SessionMultiplexer {
    inner: Arc<MuxInner>,
}

impl SessionMultiplexer {
    /// Build a multiplexer over a surface, supervisor, and store.
    #[must_use]
    pub fn new(
        surface: Arc<dyn Surface>,
        supervisor: SurfaceSupervisor,
        store: FleetStore,
        readiness: ReadinessConfig,
    ) -> Self {
        Self {
            inner: Arc::new(MuxInner {
                surface,
                supervisor,
                store,
                readiness,
                seq: AtomicU64::new(0),
                slots: Mutex::new(HashMap::new()),
                bindings: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Attach a client to a page, lazily acquiring the debugger binding.
    ///
    /// The first session on a page waits for the surface to be ready for
    /// debugger commands (bounded). The returned session starts gated;
    /// call [`release_gate`](Self::release_gate) once the attach response
    /// and event have been written.
    #[instrument(level = "debug", skip(self, sink))]
    pub async fn attach_client(
        &self,
        page_id: &PageId,
        flatten: bool,
        sink: SessionSink,
    ) -> Result<SessionId, MuxError> {
        if self.inner.store.get_page(page_id).is_none() {
            return Err(MuxError::TargetNotFound(page_id.to_string()));
        }
        let handle = self
            .inner
            .supervisor
            .page_handle(page_id)
            .ok_or_else(|| MuxError::TargetNotFound(page_id.to_string()))?;

        let slot = {
            let mut slots = self.inner.slots.lock();
            slots.entry(page_id.clone()).or_default().clone()
        };
        let mut guard = slot.lock().await;
        if guard.state.is_none() {
            readiness::await_page_ready(self.inner.surface.as_ref(), handle, &self.inner.readiness)
                .await;
            let debugger = self.inner.surface.attach_debugger(handle).await?;
            let events = match self.inner.surface.debugger_events(debugger) {
                Ok(events) => events,
                Err(err) => {
                    let _ = self.inner.surface.detach_debugger(debugger).await;
                    return Err(err.into());
                }
            };
            let binding = Arc::new(PageBinding {
                page_id: page_id.clone(),
                handle: debugger,
                command_seq: AtomicU64::new(0),
                sessions: Mutex::new(HashMap::new()),
            });
            let pump = tokio::spawn(event_pump(Arc::downgrade(&binding), events));
            self.inner
                .bindings
                .lock()
                .insert(page_id.clone(), binding.clone());
            guard.state = Some(BindingState { binding, pump });
            debug!(%page_id, "debugger binding acquired");
        }
        let binding = guard
            .state
            .as_ref()
            .map(|state| state.binding.clone())
            .ok_or_else(|| MuxError::TargetNotFound(page_id.to_string()))?;

        let seq = self.inner.seq.fetch_add(1, Ordering::Relaxed) + 1;
        let session_id = SessionId::new(page_id.as_str(), seq);
        binding.sessions.lock().insert(
            session_id.to_string(),
            SessionEntry {
                id: session_id.clone(),
                sink,
                flatten,
                gate: Gate::Buffering(Vec::new()),
                pending: HashSet::new(),
            },
        );
        debug!(%page_id, session = %session_id, flatten, "session attached");
        Ok(session_id)
    }

    /// Open a session's gate and flush buffered frames in order.
    pub fn release_gate(&self, session_id: &SessionId) {
        let Some(binding) = self.binding_for(session_id.page_id()) else {
            return;
        };
        let mut sessions = binding.sessions.lock();
        let Some(entry) = sessions.get_mut(&session_id.to_string()) else {
            return;
        };
        if let Gate::Buffering(buffer) = std::mem::replace(&mut entry.gate, Gate::Open) {
            for frame in buffer {
                let _ = entry.sink.send(frame);
            }
        }
    }

    /// Detach a session; the last session on a binding releases the
    /// debugger attachment.
    #[instrument(level = "debug", skip(self))]
    pub async fn detach_session(&self, session_id: &SessionId) -> Result<(), MuxError> {
        let page_id = PageId::from(session_id.page_id());
        let slot = self
            .inner
            .slots
            .lock()
            .get(&page_id)
            .cloned()
            .ok_or_else(|| MuxError::SessionNotFound(session_id.to_string()))?;
        let mut guard = slot.lock().await;
        let Some(state) = guard.state.as_ref() else {
            return Err(MuxError::SessionNotFound(session_id.to_string()));
        };
        if state
            .binding
            .sessions
            .lock()
            .remove(&session_id.to_string())
            .is_none()
        {
            return Err(MuxError::SessionNotFound(session_id.to_string()));
        }
        let empty = state.binding.sessions.lock().is_empty();
        if empty {
            if let Some(state) = guard.state.take() {
                state.pump.abort();
                self.inner.bindings.lock().remove(&page_id);
                let _ = self.inner.surface.detach_debugger(state.binding.handle).await;
                debug!(%page_id, "debugger binding released");
            }
        }
        Ok(())
    }

    /// Forward a client request through a session. The response is framed
    /// per the session's delivery mode and written to the owning client
    /// only, in completion order.
    pub fn route_request(
        &self,
        session_id: &SessionId,
        request: CdpRequest,
    ) -> Result<(), MuxError> {
        let binding = self
            .binding_for(session_id.page_id())
            .ok_or_else(|| MuxError::SessionNotFound(session_id.to_string()))?;
        let key = session_id.to_string();
        {
            let mut sessions = binding.sessions.lock();
            let entry = sessions
                .get_mut(&key)
                .ok_or_else(|| MuxError::SessionNotFound(session_id.to_string()))?;
            entry.pending.insert(request.id);
        }

        // Commands get a fresh internal id so overlapping client id spaces
        // on the same page cannot collide at the engine.
        let internal_id = binding.command_seq.fetch_add(1, Ordering::Relaxed) + 1;
        trace!(
            session = %key,
            client_id = request.id,
            internal_id,
            method = %request.method,
            "forwarding debugger command"
        );

        let surface = self.inner.surface.clone();
        tokio::spawn(async move {
            let params = request.params.clone().unwrap_or_else(|| json!({}));
            let result = surface
                .send_debugger_command(binding.handle, &request.method, params)
                .await;
            let response = match result {
                Ok(value) => CdpResponse::success(request.id, value),
                Err(err) => CdpResponse::error(request.id, codes::SERVER_ERROR, err.to_string()),
            };
            let Some(text) = to_text(&response) else {
                return;
            };
            let mut sessions = binding.sessions.lock();
            if let Some(entry) = sessions.get_mut(&key) {
                if entry.pending.remove(&response.id) {
                    if let Some(frame) = entry.frame(&binding.page_id, &text) {
                        entry.deliver(frame);
                    }
                }
            }
        });
        Ok(())
    }

    /// Tear down everything attached to a page (page destruction).
    pub async fn teardown_page(&self, page_id: &PageId) {
        let slot = self.inner.slots.lock().remove(page_id);
        self.inner.bindings.lock().remove(page_id);
        if let Some(slot) = slot {
            let mut guard = slot.lock().await;
            if let Some(state) = guard.state.take() {
                state.pump.abort();
                let session_count = state.binding.sessions.lock().len();
                let _ = self.inner.surface.detach_debugger(state.binding.handle).await;
                debug!(%page_id, session_count, "page torn down, binding dropped");
            }
        }
    }

    /// Whether any session is attached to the page.
    pub fn is_attached(&self, page_id: &PageId) -> bool {
        self.binding_for(page_id.as_str())
            .is_some_and(|binding| !binding.sessions.lock().is_empty())
    }

    /// Number of sessions currently attached to the page.
    pub fn session_count(&self, page_id: &PageId) -> usize {
        self.binding_for(page_id.as_str())
            .map_or(0, |binding| binding.sessions.lock().len())
    }

    fn binding_for(&self, page_id: &str) -> Option<Arc<PageBinding>> {
        self.inner
            .bindings
            .lock()
            .get(&PageId::from(page_id))
            .cloned()
    }
}

/// One task per binding: consumes debugger events and fans each one out to
/// every session on the page, in engine-emitted order.
async fn event_pump(weak: Weak<PageBinding>, mut events: broadcast::Receiver<DebuggerEvent>) {
    loop {
        match events.recv().await {
            Ok(event) => {
                let Some(binding) = weak.upgrade() else { break };
                let message = CdpEvent::new(event.method, event.params);
                let Some(text) = to_text(&message) else {
                    continue;
                };
                let mut sessions = binding.sessions.lock();
                for entry in sessions.values_mut() {
                    if let Some(frame) = entry.frame(&binding.page_id, &text) {
                        entry.deliver(frame);
                    }
                }
            }
            Err(RecvError::Lagged(missed)) => {
                warn!(missed, "debugger event stream lagged");
            }
            Err(RecvError::Closed) => break,
        }
    }
}

fn to_text<T: Serialize>(value: &T) -> Option<String> {
    match serde_json::to_string(value) {
        Ok(text) => Some(text),
        Err(err) => {
            error!(error = %err, "failed to serialize outbound frame");
            None
        }
    }
}
