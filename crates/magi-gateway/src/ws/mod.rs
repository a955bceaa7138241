//! WebSocket routing and per-connection plumbing.
//!
//! Upgrades land on `/devtools/browser[/{id}]` (browser scope) or
//! `/devtools/page/{id}` (page scope); anything else never upgrades.
//! Every accepted connection gets one read task (the connection's own
//! state machine) and one serialized writer task, so outbound frames are
//! emitted in enqueue order and never interleave.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use futures_util::SinkExt;
use futures_util::stream::SplitSink;
use magi_fleet::{BrowserId, PageId};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::server::GatewayCtx;

pub(crate) mod browser_scope;
pub(crate) mod page_scope;

/// Allocate a process-unique connection id.
pub(crate) fn next_connection_id() -> u64 {
    static COUNTER: AtomicU64 = AtomicU64::new(1);
    COUNTER.fetch_add(1, Ordering::Relaxed)
}

/// `GET /devtools/browser` - first-browser alias used by tools that
/// discover via `/json/version`.
pub(crate) async fn upgrade_browser_default(
    State(ctx): State<Arc<GatewayCtx>>,
    ws: WebSocketUpgrade,
) -> Response {
    match ctx.store.first_browser_id() {
        Some(browser_id) => {
            ws.on_upgrade(move |socket| browser_scope::run(ctx, socket, browser_id))
        }
        None => {
            warn!("browser upgrade rejected: no live browsers");
            StatusCode::NOT_FOUND.into_response()
        }
    }
}

/// `GET /devtools/browser/{id}`.
pub(crate) async fn upgrade_browser(
    State(ctx): State<Arc<GatewayCtx>>,
    Path(browser_id): Path<String>,
    ws: WebSocketUpgrade,
) -> Response {
    let browser_id = BrowserId::from(browser_id.as_str());
    if ctx.store.get_browser(&browser_id).is_none() {
        warn!(%browser_id, "browser upgrade rejected: unknown browser");
        return StatusCode::NOT_FOUND.into_response();
    }
    ws.on_upgrade(move |socket| browser_scope::run(ctx, socket, browser_id))
}

/// `GET /devtools/page/{id}`.
pub(crate) async fn upgrade_page(
    State(ctx): State<Arc<GatewayCtx>>,
    Path(page_id): Path<String>,
    ws: WebSocketUpgrade,
) -> Response {
    let page_id = PageId::from(page_id.as_str());
    if ctx.store.get_page(&page_id).is_none() {
        warn!(%page_id, "page upgrade rejected: unknown page");
        return StatusCode::NOT_FOUND.into_response();
    }
    ws.on_upgrade(move |socket| page_scope::run(ctx, socket, page_id))
}

/// Serialized per-connection writer: frames go out in enqueue order on a
/// single task, giving each client a total order over what it observes.
pub(crate) async fn writer_loop(
    mut sink: SplitSink<WebSocket, Message>,
    mut frames: mpsc::UnboundedReceiver<String>,
) {
    while let Some(frame) = frames.recv().await {
        if sink.send(Message::Text(frame.into())).await.is_err() {
            debug!("writer sink closed");
            break;
        }
    }
    let _ = sink.close().await;
}
