//! The assembled gateway.
//!
//! Wires the fleet store, supervisor, event bus, and session multiplexer
//! behind one listening socket, and owns the background task that bridges
//! page destruction into multiplexer teardown.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};

use magi_fleet::{
    BrowserId, EventBus, FleetEvent, FleetStore, PageId, Surface, SurfaceSupervisor,
};
use parking_lot::Mutex;
use tokio::net::TcpListener;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::config::GatewayConfig;
use crate::error::GatewayError;
use crate::http;
use crate::mux::SessionMultiplexer;

/// Count of open browser-scope connections per browser; backs the
/// `attached` flag on browser entries in `/json/list`.
#[derive(Debug, Default)]
pub(crate) struct ConnectionRegistry {
    counts: Mutex<HashMap<BrowserId, usize>>,
}

impl ConnectionRegistry {
    pub(crate) fn add(&self, browser_id: &BrowserId) {
        *self.counts.lock().entry(browser_id.clone()).or_insert(0) += 1;
    }

    pub(crate) fn remove(&self, browser_id: &BrowserId) {
        let mut counts = self.counts.lock();
        if let Some(count) = counts.get_mut(browser_id) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                counts.remove(browser_id);
            }
        }
    }

    pub(crate) fn is_connected(&self, browser_id: &BrowserId) -> bool {
        self.counts.lock().contains_key(browser_id)
    }
}

/// Shared state behind every route and connection.
#[derive(Debug)]
pub(crate) struct GatewayCtx {
    pub(crate) config: GatewayConfig,
    pub(crate) store: FleetStore,
    pub(crate) bus: EventBus,
    pub(crate) supervisor: SurfaceSupervisor,
    pub(crate) mux: SessionMultiplexer,
    pub(crate) local_addr: OnceLock<SocketAddr>,
    pub(crate) connections: ConnectionRegistry,
}

impl GatewayCtx {
    /// The authority advertised in WebSocket URLs.
    pub(crate) fn authority(&self) -> String {
        self.config.advertised_host.clone().unwrap_or_else(|| {
            self.local_addr
                .get()
                .map_or_else(|| self.config.bind_addr.to_string(), ToString::to_string)
        })
    }

    /// Browser-level WebSocket endpoint for a browser id.
    pub(crate) fn browser_ws_url(&self, browser_id: &BrowserId) -> String {
        format!("ws://{}/devtools/browser/{browser_id}", self.authority())
    }

    /// Page-level WebSocket endpoint for a page id.
    pub(crate) fn page_ws_url(&self, page_id: &PageId) -> String {
        format!("ws://{}/devtools/page/{page_id}", self.authority())
    }
}

/// The gateway: one listening socket speaking Chrome's debugging contract.
#[derive(Debug)]
pub struct CdpGateway {
    ctx: Arc<GatewayCtx>,
    local_addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    serve_task: JoinHandle<()>,
    bridge_task: JoinHandle<()>,
}

impl CdpGateway {
    /// Bind the configured address and start serving.
    pub async fn bind(
        config: GatewayConfig,
        surface: Arc<dyn Surface>,
    ) -> Result<Self, GatewayError> {
        let store = FleetStore::new();
        let bus = EventBus::new();
        let supervisor = SurfaceSupervisor::new(surface.clone(), store.clone(), bus.clone());
        let mux = SessionMultiplexer::new(
            surface,
            supervisor.clone(),
            store.clone(),
            config.readiness.clone(),
        );

        let bind_addr = config.bind_addr;
        let listener = TcpListener::bind(bind_addr)
            .await
            .map_err(|source| GatewayError::Bind {
                addr: bind_addr,
                source,
            })?;
        let local_addr = listener.local_addr()?;

        let ctx = Arc::new(GatewayCtx {
            config,
            store,
            bus: bus.clone(),
            supervisor,
            mux: mux.clone(),
            local_addr: OnceLock::new(),
            connections: ConnectionRegistry::default(),
        });
        let _ = ctx.local_addr.set(local_addr);

        let bridge_task = tokio::spawn(teardown_bridge(bus.subscribe(), mux));

        let app = http::router(ctx.clone());
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let serve_task = tokio::spawn(async move {
            let serve = axum::serve(listener, app).with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            });
            if let Err(err) = serve.await {
                error!(error = %err, "gateway serve loop failed");
            }
        });

        info!(%local_addr, "CDP gateway listening");
        Ok(Self {
            ctx,
            local_addr,
            shutdown: Some(shutdown_tx),
            serve_task,
            bridge_task,
        })
    }

    /// The bound address.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Base HTTP URL of the gateway, for discovery requests.
    pub fn http_base(&self) -> String {
        format!("http://{}", self.local_addr)
    }

    /// The lifecycle supervisor, for embedding UIs sharing this process.
    pub fn supervisor(&self) -> &SurfaceSupervisor {
        &self.ctx.supervisor
    }

    /// The fleet store.
    pub fn store(&self) -> &FleetStore {
        &self.ctx.store
    }

    /// The fleet event bus.
    pub fn event_bus(&self) -> &EventBus {
        &self.ctx.bus
    }

    /// Stop accepting connections and shut down.
    pub async fn shutdown(mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        self.bridge_task.abort();
        let _ = self.serve_task.await;
        info!("CDP gateway stopped");
    }
}

/// Bridges page destruction into multiplexer teardown, so sessions on a
/// destroyed page are cancelled and its binding closed.
async fn teardown_bridge(
    mut events: tokio::sync::broadcast::Receiver<FleetEvent>,
    mux: SessionMultiplexer,
) {
    loop {
        match events.recv().await {
            Ok(FleetEvent::PageDestroyed { page_id, .. }) => {
                mux.teardown_page(&page_id).await;
            }
            Ok(_) => {}
            Err(RecvError::Lagged(_)) => {}
            Err(RecvError::Closed) => break,
        }
    }
}
