//! Page-scope connections: one implicit session per connection.
//!
//! A `/devtools/page/{id}` client speaks plain CDP with no Target
//! wrapping. The connection attaches its session immediately; frames that
//! arrive while the attach (and the page's debugger-readiness wait) is in
//! flight are buffered and drained in arrival order once the session
//! routes.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures_util::StreamExt;
use magi_cdp::SessionId;
use magi_cdp::wire::CdpRequest;
use magi_fleet::{FleetEvent, PageId};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc;
use tracing::{debug, instrument, warn};

use crate::server::GatewayCtx;
use crate::ws::{next_connection_id, writer_loop};

/// Drive one page-scope connection to completion.
#[instrument(level = "debug", skip(ctx, socket), fields(conn_id))]
pub(crate) async fn run(ctx: Arc<GatewayCtx>, socket: WebSocket, page_id: PageId) {
    let conn_id = next_connection_id();
    tracing::Span::current().record("conn_id", conn_id);

    let (sink, mut stream) = socket.split();
    let (out, out_rx) = mpsc::unbounded_channel();
    let writer = tokio::spawn(writer_loop(sink, out_rx));
    let mut fleet_rx = ctx.bus.subscribe();
    debug!(%page_id, "page-scope connection opened");

    // Attach starts now; inbound frames buffer until it lands. The block
    // scopes the attach future so its writer handle is gone before the
    // writer task is joined below.
    let session = {
        let attach = ctx.mux.attach_client(&page_id, false, out.clone());
        tokio::pin!(attach);
        let mut attach_done = false;
        let mut session: Option<SessionId> = None;
        let mut buffer: Vec<String> = Vec::new();

        loop {
            tokio::select! {
                result = &mut attach, if !attach_done => {
                    attach_done = true;
                    match result {
                        Ok(session_id) => {
                            // Direct mode has no attach handshake to order
                            // against; open the gate and drain the backlog.
                            ctx.mux.release_gate(&session_id);
                            for frame in buffer.drain(..) {
                                route_frame(&ctx, conn_id, &session_id, &frame);
                            }
                            session = Some(session_id);
                        }
                        Err(err) => {
                            warn!(%page_id, error = %err, "page session attach failed");
                            break;
                        }
                    }
                }
                frame = stream.next() => match frame {
                    Some(Ok(Message::Text(text))) => {
                        if let Some(session_id) = &session {
                            route_frame(&ctx, conn_id, session_id, text.as_str());
                        } else {
                            buffer.push(text.as_str().to_string());
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(err)) => {
                        debug!(error = %err, "page connection socket error");
                        break;
                    }
                },
                event = fleet_rx.recv() => match event {
                    Ok(FleetEvent::PageDestroyed { page_id: destroyed, .. })
                        if destroyed == page_id =>
                    {
                        debug!(%page_id, "page destroyed, closing page connection");
                        break;
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(missed)) => {
                        warn!(missed, "fleet event stream lagged on page connection");
                    }
                    Err(RecvError::Closed) => break,
                },
            }
        }
        session
    };

    if let Some(session_id) = session {
        let _ = ctx.mux.detach_session(&session_id).await;
    }
    drop(out);
    let _ = writer.await;
    debug!(%page_id, "page-scope connection closed");
}

fn route_frame(ctx: &GatewayCtx, conn_id: u64, session_id: &SessionId, text: &str) {
    let request: CdpRequest = match serde_json::from_str(text) {
        Ok(request) => request,
        Err(err) => {
            warn!(conn = conn_id, error = %err, "unparseable frame dropped");
            return;
        }
    };
    if let Err(err) = ctx.mux.route_request(session_id, request) {
        warn!(conn = conn_id, error = %err, "page route failed");
    }
}
