//! Browser-scope connections: the `Target.*`/`Browser.*` state machine.
//!
//! Each connection is one task owning all of its state (discovery flag,
//! auto-attach mode, owned sessions); fleet events arrive through a bus
//! subscription and client frames through the socket, so no state is
//! shared and no lock is held across either.
//!
//! This task is also the single emission site for `Target.targetCreated`
//! and `Target.targetDestroyed`: both derive exclusively from fleet store
//! mutations observed on the bus, never from command handlers.

use std::collections::{HashMap, HashSet};
use std::ops::ControlFlow;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures_util::StreamExt;
use magi_cdp::target::{
    AttachToTargetParams, AttachToTargetResult, AttachedToTargetEvent, BrowserVersionResult,
    CloseTargetParams, CloseTargetResult, CreateBrowserContextResult, CreateTargetParams,
    CreateTargetResult, DetachFromTargetParams, DetachedFromTargetEvent,
    GetBrowserContextsResult, GetTargetInfoParams, GetTargetInfoResult, GetTargetsResult,
    SendMessageToTargetParams, SetAutoAttachParams, SetDiscoverTargetsParams, TargetCreatedEvent,
    TargetDestroyedEvent, TargetInfo,
};
use magi_cdp::wire::{CdpEvent, CdpRequest, CdpResponse, codes};
use magi_cdp::SessionId;
use magi_fleet::{BrowserId, FleetEvent, PageId, PageRecord};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc;
use tracing::{debug, instrument, trace, warn};

use crate::mux::SessionSink;
use crate::server::GatewayCtx;
use crate::version;
use crate::ws::{next_connection_id, writer_loop};

#[derive(Debug, Clone, Copy)]
struct AutoAttach {
    wait_for_debugger: bool,
    flatten: bool,
}

struct BrowserConn {
    ctx: Arc<GatewayCtx>,
    conn_id: u64,
    browser_id: BrowserId,
    out: SessionSink,
    discover: bool,
    auto_attach: Option<AutoAttach>,
    /// Sessions owned by this connection, keyed by wire session id.
    sessions: HashMap<String, PageId>,
    /// Targets this client has been told about while discovery is on.
    /// Guards against a replay and an already-queued bus event announcing
    /// the same page twice.
    announced: HashSet<PageId>,
}

/// Drive one browser-scope connection to completion.
#[instrument(level = "debug", skip(ctx, socket), fields(conn_id))]
pub(crate) async fn run(ctx: Arc<GatewayCtx>, socket: WebSocket, browser_id: BrowserId) {
    let conn_id = next_connection_id();
    tracing::Span::current().record("conn_id", conn_id);
    ctx.connections.add(&browser_id);

    let (sink, mut stream) = socket.split();
    let (out, out_rx) = mpsc::unbounded_channel();
    let writer = tokio::spawn(writer_loop(sink, out_rx));
    let mut fleet_rx = ctx.bus.subscribe();

    let mut conn = BrowserConn {
        ctx: ctx.clone(),
        conn_id,
        browser_id: browser_id.clone(),
        out,
        discover: false,
        auto_attach: None,
        sessions: HashMap::new(),
        announced: HashSet::new(),
    };
    debug!(%browser_id, "browser-scope connection opened");

    loop {
        tokio::select! {
            frame = stream.next() => match frame {
                Some(Ok(Message::Text(text))) => conn.handle_frame(text.as_str()).await,
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(err)) => {
                    debug!(error = %err, "browser connection socket error");
                    break;
                }
            },
            event = fleet_rx.recv() => match event {
                Ok(event) => {
                    if conn.handle_fleet_event(event).await.is_break() {
                        break;
                    }
                }
                Err(RecvError::Lagged(missed)) => {
                    warn!(missed, "fleet event stream lagged on browser connection");
                }
                Err(RecvError::Closed) => break,
            },
        }
    }

    conn.shutdown().await;
    ctx.connections.remove(&browser_id);
    drop(conn);
    let _ = writer.await;
    debug!(%browser_id, "browser-scope connection closed");
}

impl BrowserConn {
    // ---- outbound helpers ------------------------------------------------

    fn send_text(&self, text: String) {
        let _ = self.out.send(text);
    }

    fn send_response(&self, response: &CdpResponse) {
        match serde_json::to_string(response) {
            Ok(text) => self.send_text(text),
            Err(err) => warn!(error = %err, "failed to serialize response"),
        }
    }

    fn respond_result<T: Serialize>(&self, id: u64, result: &T) {
        match serde_json::to_value(result) {
            Ok(value) => self.send_response(&CdpResponse::success(id, value)),
            Err(err) => warn!(error = %err, "failed to serialize result"),
        }
    }

    fn respond_empty(&self, id: u64) {
        self.send_response(&CdpResponse::success(id, json!({})));
    }

    fn respond_error(&self, id: u64, code: i64, message: impl Into<String>) {
        self.send_response(&CdpResponse::error(id, code, message));
    }

    fn emit_event<T: Serialize>(&self, method: &str, params: &T) {
        match serde_json::to_value(params) {
            Ok(value) => match serde_json::to_string(&CdpEvent::new(method, value)) {
                Ok(text) => self.send_text(text),
                Err(err) => warn!(error = %err, "failed to serialize event"),
            },
            Err(err) => warn!(error = %err, "failed to serialize event params"),
        }
    }

    /// Decode params or answer `-32602` and bail.
    fn parse_params<T: DeserializeOwned>(&self, request: &CdpRequest) -> Option<T> {
        let params = request.params.clone().unwrap_or_else(|| json!({}));
        match serde_json::from_value(params) {
            Ok(params) => Some(params),
            Err(err) => {
                self.respond_error(request.id, codes::INVALID_PARAMS, err.to_string());
                None
            }
        }
    }

    // ---- target info -----------------------------------------------------

    fn browser_target_info(&self) -> TargetInfo {
        let name = self
            .ctx
            .store
            .get_browser(&self.browser_id)
            .map(|b| b.name)
            .unwrap_or_default();
        TargetInfo {
            target_id: self.browser_id.to_string(),
            target_type: "browser".to_string(),
            title: name,
            url: String::new(),
            attached: true,
            browser_context_id: None,
            opener_id: None,
        }
    }

    fn page_target_info(&self, page: &PageRecord) -> TargetInfo {
        TargetInfo {
            target_id: page.id.to_string(),
            target_type: "page".to_string(),
            title: page.title.clone(),
            url: page.url.clone(),
            attached: self.ctx.mux.is_attached(&page.id),
            browser_context_id: Some(self.browser_id.to_string()),
            opener_id: None,
        }
    }

    // ---- inbound dispatch ------------------------------------------------

    async fn handle_frame(&mut self, text: &str) {
        let request: CdpRequest = match serde_json::from_str(text) {
            Ok(request) => request,
            Err(err) => {
                warn!(conn = self.conn_id, error = %err, "unparseable frame dropped");
                return;
            }
        };
        trace!(conn = self.conn_id, id = request.id, method = %request.method, "browser command");

        match request.method.as_str() {
            "Browser.getVersion" => self.on_get_version(&request),
            "Browser.setDownloadBehavior" => self.respond_empty(request.id),
            "Target.getBrowserContexts" => self.respond_result(
                request.id,
                &GetBrowserContextsResult {
                    browser_context_ids: vec![],
                },
            ),
            "Target.createBrowserContext" => self.respond_result(
                request.id,
                &CreateBrowserContextResult {
                    browser_context_id: self.browser_id.to_string(),
                },
            ),
            "Target.disposeBrowserContext" => self.respond_empty(request.id),
            "Target.setDiscoverTargets" => self.on_set_discover_targets(&request),
            "Target.createTarget" => self.on_create_target(&request).await,
            "Target.closeTarget" => self.on_close_target(&request).await,
            "Target.getTargets" => self.on_get_targets(&request),
            "Target.getTargetInfo" => self.on_get_target_info(&request),
            "Target.attachToTarget" => self.on_attach_to_target(&request).await,
            "Target.detachFromTarget" => self.on_detach_from_target(&request).await,
            "Target.sendMessageToTarget" => self.on_send_message_to_target(&request),
            "Target.setAutoAttach" => self.on_set_auto_attach(&request).await,
            _ => {
                if let Some(session_id) = request.session_id.clone() {
                    // Flattened page-level command; the response comes back
                    // wrapped through the session, never at the top level.
                    self.route_flattened(&session_id, request);
                } else {
                    self.respond_error(
                        request.id,
                        codes::METHOD_NOT_FOUND,
                        format!("Method not found: {}", request.method),
                    );
                }
            }
        }
    }

    fn on_get_version(&self, request: &CdpRequest) {
        let user_agent = self
            .ctx
            .store
            .get_browser(&self.browser_id)
            .and_then(|b| b.user_agent)
            .unwrap_or_else(|| self.ctx.config.user_agent.clone());
        self.respond_result(
            request.id,
            &BrowserVersionResult {
                protocol_version: version::PROTOCOL_VERSION.to_string(),
                product: version::PRODUCT.to_string(),
                revision: version::REVISION.to_string(),
                user_agent,
                js_version: version::V8_VERSION.to_string(),
            },
        );
    }

    fn on_set_discover_targets(&mut self, request: &CdpRequest) {
        let Some(params) = self.parse_params::<SetDiscoverTargetsParams>(request) else {
            return;
        };
        let turning_on = params.discover && !self.discover;
        self.discover = params.discover;
        if !params.discover {
            // Turning discovery back on later replays everything afresh.
            self.announced.clear();
        }
        self.respond_empty(request.id);

        if turning_on {
            // Replay every existing page so the client starts complete.
            for page in self.ctx.store.pages_of(&self.browser_id) {
                if self.announced.insert(page.id.clone()) {
                    self.emit_event(
                        "Target.targetCreated",
                        &TargetCreatedEvent {
                            target_info: self.page_target_info(&page),
                        },
                    );
                }
            }
        }
    }

    async fn on_create_target(&mut self, request: &CdpRequest) {
        let Some(params) = self.parse_params::<CreateTargetParams>(request) else {
            return;
        };
        let activate = !params.background.unwrap_or(false);
        match self
            .ctx
            .supervisor
            .create_page(&self.browser_id, Some(&params.url), activate, None)
            .await
        {
            Ok(record) => {
                // No targetCreated here: the lifecycle event propagated
                // through the bus is the sole source of that broadcast.
                self.respond_result(
                    request.id,
                    &CreateTargetResult {
                        target_id: record.id.to_string(),
                    },
                );
            }
            Err(err) => self.respond_error(request.id, codes::SERVER_ERROR, err.to_string()),
        }
    }

    async fn on_close_target(&mut self, request: &CdpRequest) {
        let Some(params) = self.parse_params::<CloseTargetParams>(request) else {
            return;
        };
        let page_id = PageId::from(params.target_id.as_str());
        let known = self
            .ctx
            .store
            .get_page(&page_id)
            .is_some_and(|page| page.browser_id == self.browser_id);
        if !known {
            self.respond_error(
                request.id,
                codes::SERVER_ERROR,
                format!("Target not found: {}", params.target_id),
            );
            return;
        }
        match self.ctx.supervisor.close_page(&self.browser_id, &page_id).await {
            Ok(()) => self.respond_result(request.id, &CloseTargetResult { success: true }),
            Err(err) => self.respond_error(request.id, codes::SERVER_ERROR, err.to_string()),
        }
    }

    fn on_get_targets(&self, request: &CdpRequest) {
        let target_infos = self
            .ctx
            .store
            .pages_of(&self.browser_id)
            .iter()
            .map(|page| self.page_target_info(page))
            .collect();
        self.respond_result(request.id, &GetTargetsResult { target_infos });
    }

    fn on_get_target_info(&self, request: &CdpRequest) {
        let Some(params) = self.parse_params::<GetTargetInfoParams>(request) else {
            return;
        };
        let target_info = match params.target_id {
            // Without a targetId the question is about the browser itself.
            None => Some(self.browser_target_info()),
            Some(target_id) if target_id == self.browser_id.as_str() => {
                Some(self.browser_target_info())
            }
            Some(target_id) => self
                .ctx
                .store
                .get_page(&PageId::from(target_id.as_str()))
                .filter(|page| page.browser_id == self.browser_id)
                .map(|page| self.page_target_info(&page)),
        };
        match target_info {
            Some(target_info) => {
                self.respond_result(request.id, &GetTargetInfoResult { target_info });
            }
            None => self.respond_error(
                request.id,
                codes::SERVER_ERROR,
                "Target not found".to_string(),
            ),
        }
    }

    async fn on_attach_to_target(&mut self, request: &CdpRequest) {
        let Some(params) = self.parse_params::<AttachToTargetParams>(request) else {
            return;
        };
        let page_id = PageId::from(params.target_id.as_str());
        let known = self
            .ctx
            .store
            .get_page(&page_id)
            .is_some_and(|page| page.browser_id == self.browser_id);
        if !known {
            self.respond_error(
                request.id,
                codes::SERVER_ERROR,
                format!("Target not found: {}", params.target_id),
            );
            return;
        }

        let flatten = params.flatten.unwrap_or(false);
        match self
            .ctx
            .mux
            .attach_client(&page_id, flatten, self.out.clone())
            .await
        {
            Ok(session_id) => {
                self.sessions.insert(session_id.to_string(), page_id.clone());
                // Response first, then the attached event, then session
                // traffic: the session stays gated until both are queued.
                self.respond_result(
                    request.id,
                    &AttachToTargetResult {
                        session_id: session_id.to_string(),
                    },
                );
                self.emit_attached(&session_id, &page_id, false);
                self.ctx.mux.release_gate(&session_id);
            }
            // Attach failed: the error response is the only reply.
            Err(err) => self.respond_error(request.id, codes::SERVER_ERROR, err.to_string()),
        }
    }

    async fn on_detach_from_target(&mut self, request: &CdpRequest) {
        let Some(params) = self.parse_params::<DetachFromTargetParams>(request) else {
            return;
        };
        let Some(session_str) = params.session_id else {
            self.respond_error(request.id, codes::INVALID_PARAMS, "sessionId is required");
            return;
        };
        let Ok(session_id) = session_str.parse::<SessionId>() else {
            self.respond_error(
                request.id,
                codes::SERVER_ERROR,
                format!("Session not found: {session_str}"),
            );
            return;
        };
        self.sessions.remove(&session_str);
        match self.ctx.mux.detach_session(&session_id).await {
            Ok(()) => {
                self.respond_empty(request.id);
                if self.discover {
                    self.emit_event(
                        "Target.detachedFromTarget",
                        &DetachedFromTargetEvent {
                            session_id: session_str,
                            target_id: Some(session_id.page_id().to_string()),
                        },
                    );
                }
            }
            Err(err) => self.respond_error(request.id, codes::SERVER_ERROR, err.to_string()),
        }
    }

    fn on_send_message_to_target(&mut self, request: &CdpRequest) {
        let Some(params) = self.parse_params::<SendMessageToTargetParams>(request) else {
            return;
        };
        let Some(session_str) = params.session_id else {
            self.respond_error(request.id, codes::INVALID_PARAMS, "sessionId is required");
            return;
        };
        // Acknowledge immediately; the wrapped response arrives later
        // through the session's writer.
        self.respond_empty(request.id);
        self.route_raw(&session_str, &params.message);
    }

    async fn on_set_auto_attach(&mut self, request: &CdpRequest) {
        let Some(params) = self.parse_params::<SetAutoAttachParams>(request) else {
            return;
        };
        if params.auto_attach {
            let was_on = self.auto_attach.is_some();
            let state = AutoAttach {
                wait_for_debugger: params.wait_for_debugger_on_start,
                flatten: params.flatten.unwrap_or(false),
            };
            self.auto_attach = Some(state);
            if !was_on {
                // Attach to every page not already attached by us.
                for page in self.ctx.store.pages_of(&self.browser_id) {
                    if self.sessions.values().any(|owned| *owned == page.id) {
                        continue;
                    }
                    self.auto_attach_page(&page.id, state).await;
                }
            }
        } else {
            self.auto_attach = None;
        }
        self.respond_empty(request.id);
    }

    /// Attach a page for auto-attach mode and emit `attachedToTarget`.
    /// The session binding is fully established before the event goes out.
    async fn auto_attach_page(&mut self, page_id: &PageId, state: AutoAttach) {
        match self
            .ctx
            .mux
            .attach_client(page_id, state.flatten, self.out.clone())
            .await
        {
            Ok(session_id) => {
                self.sessions.insert(session_id.to_string(), page_id.clone());
                self.emit_attached(&session_id, page_id, state.wait_for_debugger);
                self.ctx.mux.release_gate(&session_id);
            }
            Err(err) => {
                warn!(%page_id, error = %err, "auto-attach failed");
            }
        }
    }

    fn emit_attached(&self, session_id: &SessionId, page_id: &PageId, waiting: bool) {
        let Some(page) = self.ctx.store.get_page(page_id) else {
            return;
        };
        self.emit_event(
            "Target.attachedToTarget",
            &AttachedToTargetEvent {
                session_id: session_id.to_string(),
                target_info: self.page_target_info(&page),
                waiting_for_debugger: waiting,
            },
        );
    }

    // ---- session routing -------------------------------------------------

    fn route_flattened(&self, session_str: &str, request: CdpRequest) {
        let Ok(session_id) = session_str.parse::<SessionId>() else {
            warn!(conn = self.conn_id, session = session_str, "malformed session id dropped");
            return;
        };
        let request = CdpRequest {
            session_id: None,
            ..request
        };
        if let Err(err) = self.ctx.mux.route_request(&session_id, request) {
            // Flattened mode carries no top-level reply channel for this
            // frame; the miss is logged, not answered.
            warn!(conn = self.conn_id, session = session_str, error = %err, "flattened route failed");
        }
    }

    fn route_raw(&self, session_str: &str, message: &str) {
        let request: CdpRequest = match serde_json::from_str(message) {
            Ok(request) => request,
            Err(err) => {
                warn!(conn = self.conn_id, error = %err, "unparseable inner message dropped");
                return;
            }
        };
        self.route_flattened(session_str, request);
    }

    // ---- fleet events ----------------------------------------------------

    async fn handle_fleet_event(&mut self, event: FleetEvent) -> ControlFlow<()> {
        if event.browser_id() != &self.browser_id {
            return ControlFlow::Continue(());
        }
        match event {
            FleetEvent::PageCreated { page_id, .. } => {
                if self.discover {
                    if let Some(page) = self.ctx.store.get_page(&page_id) {
                        if self.announced.insert(page_id.clone()) {
                            self.emit_event(
                                "Target.targetCreated",
                                &TargetCreatedEvent {
                                    target_info: self.page_target_info(&page),
                                },
                            );
                        }
                    }
                }
                if let Some(state) = self.auto_attach {
                    if !self.sessions.values().any(|owned| *owned == page_id) {
                        self.auto_attach_page(&page_id, state).await;
                    }
                }
            }
            FleetEvent::PageDestroyed { page_id, .. } => {
                let owned: Vec<String> = self
                    .sessions
                    .iter()
                    .filter(|(_, page)| **page == page_id)
                    .map(|(session, _)| session.clone())
                    .collect();
                for session in owned {
                    self.sessions.remove(&session);
                    if self.discover {
                        self.emit_event(
                            "Target.detachedFromTarget",
                            &DetachedFromTargetEvent {
                                session_id: session,
                                target_id: Some(page_id.to_string()),
                            },
                        );
                    }
                }
                if self.discover && self.announced.remove(&page_id) {
                    self.emit_event(
                        "Target.targetDestroyed",
                        &TargetDestroyedEvent {
                            target_id: page_id.to_string(),
                        },
                    );
                }
            }
            FleetEvent::BrowserDestroyed { .. } => return ControlFlow::Break(()),
            _ => {}
        }
        ControlFlow::Continue(())
    }

    async fn shutdown(&mut self) {
        let sessions: Vec<String> = self.sessions.keys().cloned().collect();
        for session_str in sessions {
            if let Ok(session_id) = session_str.parse::<SessionId>() {
                let _ = self.ctx.mux.detach_session(&session_id).await;
            }
        }
        self.sessions.clear();
    }
}
