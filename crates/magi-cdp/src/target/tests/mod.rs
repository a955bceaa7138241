use super::*;

#[test]
fn test_target_info_serializes_camel_case() {
    let info = TargetInfo {
        target_id: "P1".to_string(),
        target_type: "page".to_string(),
        title: "Example".to_string(),
        url: "https://example.com".to_string(),
        attached: true,
        browser_context_id: Some("B1".to_string()),
        opener_id: None,
    };
    let json = serde_json::to_string(&info).unwrap();
    assert!(json.contains(r#""targetId":"P1""#));
    assert!(json.contains(r#""type":"page""#));
    assert!(json.contains(r#""browserContextId":"B1""#));
    assert!(!json.contains("openerId"));
}

#[test]
fn test_set_discover_targets_params_parse() {
    let params: SetDiscoverTargetsParams =
        serde_json::from_str(r#"{"discover":true}"#).unwrap();
    assert!(params.discover);
}

#[test]
fn test_create_target_params_parse_minimal() {
    let params: CreateTargetParams = serde_json::from_str(r#"{"url":"about:blank"}"#).unwrap();
    assert_eq!(params.url, "about:blank");
    assert!(params.browser_context_id.is_none());
    assert!(params.background.is_none());
}

#[test]
fn test_create_target_params_ignores_unknown_fields() {
    // Chrome clients send width/height/newWindow; the gateway ignores them.
    let params: CreateTargetParams = serde_json::from_str(
        r#"{"url":"about:blank","width":800,"height":600,"newWindow":false}"#,
    )
    .unwrap();
    assert_eq!(params.url, "about:blank");
}

#[test]
fn test_attach_to_target_params_parse() {
    let params: AttachToTargetParams =
        serde_json::from_str(r#"{"targetId":"P1","flatten":true}"#).unwrap();
    assert_eq!(params.target_id, "P1");
    assert_eq!(params.flatten, Some(true));
}

#[test]
fn test_attach_to_target_result_shape() {
    let result = AttachToTargetResult {
        session_id: "P1-session-1".to_string(),
    };
    assert_eq!(
        serde_json::to_string(&result).unwrap(),
        r#"{"sessionId":"P1-session-1"}"#
    );
}

#[test]
fn test_set_auto_attach_params_defaults() {
    let params: SetAutoAttachParams =
        serde_json::from_str(r#"{"autoAttach":true}"#).unwrap();
    assert!(params.auto_attach);
    assert!(!params.wait_for_debugger_on_start);
    assert!(params.flatten.is_none());
}

#[test]
fn test_send_message_to_target_params_parse() {
    let params: SendMessageToTargetParams = serde_json::from_str(
        r#"{"sessionId":"P1-session-2","message":"{\"id\":1,\"method\":\"Page.enable\"}"}"#,
    )
    .unwrap();
    assert_eq!(params.session_id.as_deref(), Some("P1-session-2"));
    let inner: serde_json::Value = serde_json::from_str(&params.message).unwrap();
    assert_eq!(inner["method"], "Page.enable");
}

#[test]
fn test_received_message_from_target_event_shape() {
    let event = ReceivedMessageFromTargetEvent {
        session_id: "P1-session-1".to_string(),
        message: r#"{"id":11,"result":{}}"#.to_string(),
        target_id: "P1".to_string(),
    };
    let json = serde_json::to_string(&event).unwrap();
    assert_eq!(
        json,
        r#"{"sessionId":"P1-session-1","message":"{\"id\":11,\"result\":{}}","targetId":"P1"}"#
    );
}

#[test]
fn test_attached_to_target_event_shape() {
    let event = AttachedToTargetEvent {
        session_id: "P1-session-1".to_string(),
        target_info: TargetInfo {
            target_id: "P1".to_string(),
            target_type: "page".to_string(),
            title: String::new(),
            url: "about:blank".to_string(),
            attached: true,
            browser_context_id: None,
            opener_id: None,
        },
        waiting_for_debugger: false,
    };
    let json = serde_json::to_string(&event).unwrap();
    assert!(json.contains(r#""sessionId":"P1-session-1""#));
    assert!(json.contains(r#""waitingForDebugger":false"#));
}

#[test]
fn test_get_targets_result_shape() {
    let result = GetTargetsResult { target_infos: vec![] };
    assert_eq!(serde_json::to_string(&result).unwrap(), r#"{"targetInfos":[]}"#);
}

#[test]
fn test_get_browser_contexts_result_shape() {
    let result = GetBrowserContextsResult {
        browser_context_ids: vec![],
    };
    assert_eq!(
        serde_json::to_string(&result).unwrap(),
        r#"{"browserContextIds":[]}"#
    );
}

#[test]
fn test_detach_from_target_params_without_session() {
    let params: DetachFromTargetParams = serde_json::from_str("{}").unwrap();
    assert!(params.session_id.is_none());
}

#[test]
fn test_browser_version_result_shape() {
    let result = BrowserVersionResult {
        protocol_version: "1.3".to_string(),
        product: "Magi/1.0.0 Chrome/128.0.0.0".to_string(),
        revision: "@8e1e4b4".to_string(),
        user_agent: "Magi/1.0.0".to_string(),
        js_version: "12.8.21".to_string(),
    };
    let json = serde_json::to_string(&result).unwrap();
    assert!(json.contains(r#""protocolVersion":"1.3""#));
    assert!(json.contains(r#""jsVersion":"12.8.21""#));
}
