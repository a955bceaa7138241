//! HTTP discovery surface.
//!
//! Chrome's debugging HTTP contract: `/json/version`, `/json/list`, and
//! `/json/protocol`, plus per-browser variants under
//! `/devtools/browser/{id}/`. Non-production builds may additionally
//! mount `/test/browser/*` for black-box test orchestration.

use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use magi_cdp::discovery::{ProtocolDescriptor, TargetKind, TargetListEntry, VersionPayload};
use magi_fleet::{BrowserId, BrowserRecord, BrowserSpec, FleetError, PageRecord};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, instrument};

use crate::server::GatewayCtx;
use crate::version;
use crate::ws;

/// Build the gateway router.
pub(crate) fn router(ctx: Arc<GatewayCtx>) -> axum::Router {
    let mut router = axum::Router::new()
        .route("/json/version", get(version_endpoint))
        .route("/json/list", get(list_endpoint))
        .route("/json/protocol", get(protocol_endpoint))
        .route(
            "/devtools/browser/{browser_id}/json/version",
            get(browser_version_endpoint),
        )
        .route(
            "/devtools/browser/{browser_id}/json/list",
            get(browser_list_endpoint),
        )
        .route("/devtools/browser", get(ws::upgrade_browser_default))
        .route("/devtools/browser/{browser_id}", get(ws::upgrade_browser))
        .route("/devtools/page/{page_id}", get(ws::upgrade_page));

    if ctx.config.enable_test_endpoints {
        debug!("test endpoints enabled");
        router = router
            .route("/test/browser/create", post(test_create_browser))
            .route("/test/browser/{browser_id}", delete(test_delete_browser));
    }

    router.with_state(ctx)
}

/// Build the version payload for one browser.
fn version_payload(ctx: &GatewayCtx, browser: &BrowserRecord) -> VersionPayload {
    VersionPayload {
        browser: version::PRODUCT.to_string(),
        protocol_version: version::PROTOCOL_VERSION.to_string(),
        user_agent: browser
            .user_agent
            .clone()
            .unwrap_or_else(|| ctx.config.user_agent.clone()),
        v8_version: version::V8_VERSION.to_string(),
        webkit_version: version::WEBKIT_VERSION.to_string(),
        web_socket_debugger_url: ctx.browser_ws_url(&browser.id),
    }
}

fn browser_list_entry(ctx: &GatewayCtx, browser: &BrowserRecord) -> TargetListEntry {
    TargetListEntry {
        id: browser.id.to_string(),
        kind: TargetKind::Browser,
        title: browser.name.clone(),
        url: None,
        attached: ctx.connections.is_connected(&browser.id),
        web_socket_debugger_url: ctx.browser_ws_url(&browser.id),
        favicon_url: None,
    }
}

fn page_list_entry(ctx: &GatewayCtx, page: &PageRecord) -> TargetListEntry {
    TargetListEntry {
        id: page.id.to_string(),
        kind: TargetKind::Page,
        title: page.title.clone(),
        url: Some(page.url.clone()),
        // Reported from the real debugger attachment state, not activity.
        attached: ctx.mux.is_attached(&page.id),
        web_socket_debugger_url: ctx.page_ws_url(&page.id),
        favicon_url: page.favicon.clone(),
    }
}

/// `GET /json/version` - version block for the first browser; 503 when
/// the fleet is empty rather than advertising an endpoint that routes
/// nowhere.
#[instrument(level = "debug", skip_all)]
async fn version_endpoint(State(ctx): State<Arc<GatewayCtx>>) -> Response {
    let browser = ctx
        .store
        .first_browser_id()
        .and_then(|id| ctx.store.get_browser(&id));
    match browser {
        Some(browser) => Json(version_payload(&ctx, &browser)).into_response(),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "error": "no browsers available" })),
        )
            .into_response(),
    }
}

/// `GET /json/list` - every browser and every page, flat.
#[instrument(level = "debug", skip_all)]
async fn list_endpoint(State(ctx): State<Arc<GatewayCtx>>) -> Json<Vec<TargetListEntry>> {
    let snapshot = ctx.store.snapshot();
    let mut entries = Vec::new();
    for browser in &snapshot.browsers {
        entries.push(browser_list_entry(&ctx, &browser.browser));
        for page in &browser.page_records {
            entries.push(page_list_entry(&ctx, page));
        }
    }
    Json(entries)
}

/// `GET /json/protocol` - minimal descriptor of the implemented domains.
async fn protocol_endpoint() -> Json<ProtocolDescriptor> {
    Json(ProtocolDescriptor::magi())
}

/// `GET /devtools/browser/{id}/json/version`.
async fn browser_version_endpoint(
    State(ctx): State<Arc<GatewayCtx>>,
    Path(browser_id): Path<String>,
) -> Response {
    let browser_id = BrowserId::from(browser_id.as_str());
    match ctx.store.get_browser(&browser_id) {
        Some(browser) => Json(version_payload(&ctx, &browser)).into_response(),
        None => not_found(&browser_id),
    }
}

/// `GET /devtools/browser/{id}/json/list` - one browser and its pages.
async fn browser_list_endpoint(
    State(ctx): State<Arc<GatewayCtx>>,
    Path(browser_id): Path<String>,
) -> Response {
    let browser_id = BrowserId::from(browser_id.as_str());
    let Some(browser) = ctx.store.get_browser(&browser_id) else {
        return not_found(&browser_id);
    };
    let mut entries = vec![browser_list_entry(&ctx, &browser)];
    for page in ctx.store.pages_of(&browser_id) {
        entries.push(page_list_entry(&ctx, &page));
    }
    Json(entries).into_response()
}

fn not_found(browser_id: &BrowserId) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": format!("browser not found: {browser_id}") })),
    )
        .into_response()
}

/// Request body for `POST /test/browser/create`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct TestCreateBrowserBody {
    name: Option<String>,
    partition_key: Option<String>,
    user_agent: Option<String>,
    initial_url: Option<String>,
}

/// `POST /test/browser/create` (non-production only).
async fn test_create_browser(State(ctx): State<Arc<GatewayCtx>>, body: Bytes) -> Response {
    let body: TestCreateBrowserBody = if body.is_empty() {
        TestCreateBrowserBody::default()
    } else {
        match serde_json::from_slice(&body) {
            Ok(body) => body,
            Err(err) => {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(json!({ "error": err.to_string() })),
                )
                    .into_response();
            }
        }
    };

    let spec = BrowserSpec {
        name: body.name,
        partition_key: body.partition_key,
        user_agent: body.user_agent,
        initial_url: body.initial_url,
    };
    match ctx.supervisor.create_browser(spec).await {
        Ok(record) => {
            let page_id = record.pages.first();
            Json(json!({
                "browserId": record.id,
                "browserWSEndpoint": ctx.browser_ws_url(&record.id),
                "pageId": page_id,
                "pageWSEndpoint": page_id.map(|id| ctx.page_ws_url(id)),
            }))
            .into_response()
        }
        Err(err) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": err.to_string() })),
        )
            .into_response(),
    }
}

/// `DELETE /test/browser/{id}` (non-production only).
async fn test_delete_browser(
    State(ctx): State<Arc<GatewayCtx>>,
    Path(browser_id): Path<String>,
) -> Response {
    let browser_id = BrowserId::from(browser_id.as_str());
    match ctx.supervisor.destroy_browser(&browser_id).await {
        Ok(()) => Json(json!({})).into_response(),
        Err(FleetError::BrowserNotFound(_)) => not_found(&browser_id),
        Err(err) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": err.to_string() })),
        )
            .into_response(),
    }
}
