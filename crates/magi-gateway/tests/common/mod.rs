//! Shared harness for gateway integration tests: a bound gateway over a
//! simulated surface, plus a small WebSocket client.
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use magi_fleet::surface::sim::SimSurface;
use magi_fleet::{BrowserId, BrowserRecord, BrowserSpec, PageId};
use magi_gateway::{CdpGateway, GatewayConfig, ReadinessConfig};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

pub const WAIT: Duration = Duration::from_secs(5);
pub const QUIET: Duration = Duration::from_millis(150);

pub struct Harness {
    pub gateway: CdpGateway,
    pub surface: Arc<SimSurface>,
}

pub async fn start() -> Harness {
    start_with(|config| config).await
}

pub async fn start_with(tune: impl FnOnce(GatewayConfig) -> GatewayConfig) -> Harness {
    let surface = Arc::new(SimSurface::new());
    let config = GatewayConfig::new()
        .bind_addr("127.0.0.1:0".parse().unwrap())
        .test_endpoints(false)
        .readiness(ReadinessConfig::fast());
    let gateway = CdpGateway::bind(tune(config), surface.clone())
        .await
        .expect("gateway bind");
    Harness { gateway, surface }
}

impl Harness {
    pub async fn create_browser(&self, name: &str) -> BrowserRecord {
        self.gateway
            .supervisor()
            .create_browser(BrowserSpec::named(name))
            .await
            .expect("create browser")
    }

    pub async fn create_page(&self, browser_id: &BrowserId) -> PageId {
        self.gateway
            .supervisor()
            .create_page(browser_id, None, false, None)
            .await
            .expect("create page")
            .id
    }

    pub fn browser_ws(&self, browser_id: &BrowserId) -> String {
        format!(
            "ws://{}/devtools/browser/{browser_id}",
            self.gateway.local_addr()
        )
    }

    pub fn page_ws(&self, page_id: &PageId) -> String {
        format!("ws://{}/devtools/page/{page_id}", self.gateway.local_addr())
    }

    pub fn http(&self, path: &str) -> String {
        format!("{}{path}", self.gateway.http_base())
    }
}

pub struct WsClient {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl WsClient {
    pub async fn connect(url: &str) -> Self {
        let (stream, _) = connect_async(url).await.expect("websocket connect");
        Self { stream }
    }

    pub async fn send(&mut self, value: Value) {
        self.stream
            .send(Message::Text(value.to_string().into()))
            .await
            .expect("websocket send");
    }

    /// Next text frame as JSON; panics if the connection closes first.
    pub async fn next_json(&mut self) -> Value {
        timeout(WAIT, async {
            loop {
                match self.stream.next().await {
                    Some(Ok(Message::Text(text))) => {
                        return serde_json::from_str(text.as_str()).expect("frame is JSON");
                    }
                    Some(Ok(_)) => {}
                    Some(Err(err)) => panic!("websocket error: {err}"),
                    None => panic!("websocket closed"),
                }
            }
        })
        .await
        .expect("no frame in time")
    }

    /// Next frame matching the predicate, skipping others.
    pub async fn next_matching(&mut self, mut pred: impl FnMut(&Value) -> bool) -> Value {
        timeout(WAIT, async {
            loop {
                let frame = self.next_json().await;
                if pred(&frame) {
                    return frame;
                }
            }
        })
        .await
        .expect("expected frame not observed in time")
    }

    /// The response frame for a request id, skipping events.
    pub async fn expect_response(&mut self, id: u64) -> Value {
        self.next_matching(|frame| frame.get("id").and_then(Value::as_u64) == Some(id))
            .await
    }

    /// The next event frame with the given method, skipping others.
    pub async fn expect_event(&mut self, method: &str) -> Value {
        self.next_matching(|frame| {
            frame.get("method").and_then(Value::as_str) == Some(method)
        })
        .await
    }

    /// A frame if one arrives within the quiet window.
    pub async fn try_next(&mut self) -> Option<Value> {
        match timeout(QUIET, async {
            loop {
                match self.stream.next().await {
                    Some(Ok(Message::Text(text))) => {
                        return Some(serde_json::from_str(text.as_str()).expect("frame is JSON"));
                    }
                    Some(Ok(_)) => {}
                    _ => return None,
                }
            }
        })
        .await
        {
            Ok(frame) => frame,
            Err(_) => None,
        }
    }
}

/// Unwrap a `Target.receivedMessageFromTarget` frame into its inner CDP
/// message, asserting the session and target ids.
pub fn unwrap_flattened(frame: &Value, session_id: &str, target_id: &str) -> Value {
    assert_eq!(
        frame["method"], "Target.receivedMessageFromTarget",
        "expected flattened wrapper, got: {frame}"
    );
    assert_eq!(frame["params"]["sessionId"], session_id);
    assert_eq!(frame["params"]["targetId"], target_id);
    serde_json::from_str(frame["params"]["message"].as_str().expect("inner message"))
        .expect("inner message is JSON")
}
