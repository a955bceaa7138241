use super::*;

async fn page_on(surface: &SimSurface) -> PageHandle {
    let partition = surface.new_partition("persist:test").await.unwrap();
    surface
        .new_page(partition, &PageOptions::default())
        .await
        .unwrap()
}

#[tokio::test]
async fn test_new_page_starts_blank() {
    let surface = SimSurface::new();
    let page = page_on(&surface).await;
    let state = surface.page_state(page).await.unwrap();
    assert_eq!(state.url, "about:blank");
    assert!(!state.loading);
    assert!(!state.can_go_back);
    assert!(!state.can_go_forward);
}

#[tokio::test]
async fn test_new_page_requires_partition() {
    let surface = SimSurface::new();
    let result = surface
        .new_page(PartitionHandle::from_raw(999), &PageOptions::default())
        .await;
    assert!(matches!(result, Err(SurfaceError::UnknownPartition)));
}

#[tokio::test]
async fn test_page_remembers_its_partition() {
    let surface = SimSurface::new();
    let partition = surface.new_partition("persist:a").await.unwrap();
    let page = surface
        .new_page(partition, &PageOptions::default())
        .await
        .unwrap();
    assert_eq!(surface.page_partition(page), Some(partition));
}

#[tokio::test]
async fn test_navigate_emits_lifecycle_events_in_order() {
    let surface = SimSurface::new();
    let page = page_on(&surface).await;
    let mut events = surface.page_events(page).unwrap();

    surface.navigate(page, "https://example.com").await.unwrap();

    assert!(matches!(events.recv().await.unwrap(), PageEvent::LoadStarted));
    match events.recv().await.unwrap() {
        PageEvent::Navigated { url, can_go_back, error, .. } => {
            assert_eq!(url, "https://example.com");
            assert!(can_go_back);
            assert!(error.is_none());
        }
        other => panic!("unexpected event: {other:?}"),
    }
    assert!(matches!(
        events.recv().await.unwrap(),
        PageEvent::TitleChanged(t) if t == "example.com"
    ));
    assert!(matches!(events.recv().await.unwrap(), PageEvent::LoadFinished));
}

#[tokio::test]
async fn test_navigation_failure_is_reported_not_fatal() {
    let surface = SimSurface::new();
    let page = page_on(&surface).await;
    let mut events = surface.page_events(page).unwrap();

    surface.fail_next_navigation("net::ERR_CONNECTION_REFUSED");
    surface.navigate(page, "https://down.example").await.unwrap();

    match events.recv().await.unwrap() {
        PageEvent::Navigated { error, .. } => {
            assert_eq!(error.as_deref(), Some("net::ERR_CONNECTION_REFUSED"));
        }
        other => panic!("unexpected event: {other:?}"),
    }
    assert!(matches!(events.recv().await.unwrap(), PageEvent::LoadFailed { .. }));
    // The page survives and keeps its old URL.
    assert_eq!(surface.page_state(page).await.unwrap().url, "about:blank");
}

#[tokio::test]
async fn test_history_navigation() {
    let surface = SimSurface::new();
    let page = page_on(&surface).await;
    surface.navigate(page, "https://one.example").await.unwrap();
    surface.navigate(page, "https://two.example").await.unwrap();

    surface.go_back(page).await.unwrap();
    let state = surface.page_state(page).await.unwrap();
    assert_eq!(state.url, "https://one.example");
    assert!(state.can_go_back);
    assert!(state.can_go_forward);

    surface.go_forward(page).await.unwrap();
    assert_eq!(surface.page_state(page).await.unwrap().url, "https://two.example");
}

#[tokio::test]
async fn test_go_back_at_history_start_is_noop() {
    let surface = SimSurface::new();
    let page = page_on(&surface).await;
    surface.go_back(page).await.unwrap();
    assert_eq!(surface.page_state(page).await.unwrap().url, "about:blank");
}

#[tokio::test]
async fn test_debugger_single_attachment() {
    let surface = SimSurface::new();
    let page = page_on(&surface).await;

    let binding = surface.attach_debugger(page).await.unwrap();
    assert!(surface.debugger_attached(page));
    assert!(matches!(
        surface.attach_debugger(page).await,
        Err(SurfaceError::AlreadyAttached)
    ));

    surface.detach_debugger(binding).await.unwrap();
    assert!(!surface.debugger_attached(page));
    surface.attach_debugger(page).await.unwrap();
}

#[tokio::test]
async fn test_debugger_command_echoes_empty_result() {
    let surface = SimSurface::new();
    let page = page_on(&surface).await;
    let binding = surface.attach_debugger(page).await.unwrap();

    let result = surface
        .send_debugger_command(binding, "Page.enable", serde_json::json!({}))
        .await
        .unwrap();
    assert_eq!(result, serde_json::json!({}));
    assert_eq!(surface.command_log(), vec![(page, "Page.enable".to_string())]);
}

#[tokio::test]
async fn test_debugger_command_canned_result() {
    let surface = SimSurface::new();
    let page = page_on(&surface).await;
    let binding = surface.attach_debugger(page).await.unwrap();

    surface.set_command_result("Runtime.evaluate", serde_json::json!({"result": {"value": 2}}));
    let result = surface
        .send_debugger_command(binding, "Runtime.evaluate", serde_json::json!({}))
        .await
        .unwrap();
    assert_eq!(result["result"]["value"], 2);
}

#[tokio::test]
async fn test_stale_binding_is_rejected() {
    let surface = SimSurface::new();
    let page = page_on(&surface).await;
    let binding = surface.attach_debugger(page).await.unwrap();
    surface.detach_debugger(binding).await.unwrap();

    let result = surface
        .send_debugger_command(binding, "Page.enable", serde_json::json!({}))
        .await;
    assert!(matches!(result, Err(SurfaceError::PageGone)));
}

#[tokio::test]
async fn test_reload_command_fires_load_events_on_debugger_stream() {
    let surface = SimSurface::new();
    let page = page_on(&surface).await;
    let binding = surface.attach_debugger(page).await.unwrap();
    let mut events = surface.debugger_events(binding).unwrap();

    surface
        .send_debugger_command(binding, "Page.reload", serde_json::json!({}))
        .await
        .unwrap();

    assert_eq!(events.recv().await.unwrap().method, "Page.frameStartedLoading");
    assert_eq!(events.recv().await.unwrap().method, "Page.loadEventFired");
}

#[tokio::test]
async fn test_close_page_emits_closed() {
    let surface = SimSurface::new();
    let page = page_on(&surface).await;
    let mut events = surface.page_events(page).unwrap();

    surface.close_page(page).await.unwrap();
    assert!(matches!(events.recv().await.unwrap(), PageEvent::Closed));
    assert!(matches!(
        surface.page_state(page).await,
        Err(SurfaceError::PageGone)
    ));
}

#[tokio::test]
async fn test_fail_next_page_create_is_one_shot() {
    let surface = SimSurface::new();
    let partition = surface.new_partition("persist:test").await.unwrap();
    surface.fail_next_page_create("boom");

    assert!(matches!(
        surface.new_page(partition, &PageOptions::default()).await,
        Err(SurfaceError::Unavailable(_))
    ));
    assert!(surface.new_page(partition, &PageOptions::default()).await.is_ok());
}

#[tokio::test]
async fn test_manual_load_controls_loading_flag() {
    let surface = SimSurface::new();
    let page = page_on(&surface).await;

    surface.begin_manual_load(page).unwrap();
    assert!(surface.page_state(page).await.unwrap().loading);

    surface.finish_manual_load(page).unwrap();
    assert!(!surface.page_state(page).await.unwrap().loading);
}

#[tokio::test]
async fn test_view_attach_detach() {
    let surface = SimSurface::new();
    let page = page_on(&surface).await;
    assert!(!surface.view_attached(page));
    surface.attach_view(page).await.unwrap();
    assert!(surface.view_attached(page));
    surface.detach_view(page).await.unwrap();
    assert!(!surface.view_attached(page));
}
