use super::*;

// CdpRequest tests
#[test]
fn test_request_parses_minimal() {
    let req: CdpRequest = serde_json::from_str(r#"{"id":1,"method":"Target.getTargets"}"#).unwrap();
    assert_eq!(req.id, 1);
    assert_eq!(req.method, "Target.getTargets");
    assert!(req.params.is_none());
    assert!(req.session_id.is_none());
}

#[test]
fn test_request_parses_with_params() {
    let req: CdpRequest = serde_json::from_str(
        r#"{"id":2,"method":"Target.createTarget","params":{"url":"about:blank"}}"#,
    )
    .unwrap();
    assert_eq!(req.params.unwrap()["url"], "about:blank");
}

#[test]
fn test_request_parses_top_level_session_id() {
    // Flattened mode: Playwright sends bare commands with a sessionId field.
    let req: CdpRequest = serde_json::from_str(
        r#"{"id":11,"sessionId":"P1-session-3","method":"Page.enable","params":{}}"#,
    )
    .unwrap();
    assert_eq!(req.session_id.as_deref(), Some("P1-session-3"));
    assert_eq!(req.method, "Page.enable");
}

#[test]
fn test_request_missing_id_is_rejected() {
    let result: Result<CdpRequest, _> = serde_json::from_str(r#"{"method":"Page.enable"}"#);
    assert!(result.is_err());
}

#[test]
fn test_request_round_trips_without_optional_fields() {
    let req = CdpRequest {
        id: 5,
        method: "Browser.getVersion".to_string(),
        params: None,
        session_id: None,
    };
    let json = serde_json::to_string(&req).unwrap();
    assert_eq!(json, r#"{"id":5,"method":"Browser.getVersion"}"#);
}

// CdpResponse tests
#[test]
fn test_success_response_serialization() {
    let resp = CdpResponse::success(1, serde_json::json!({}));
    assert_eq!(serde_json::to_string(&resp).unwrap(), r#"{"id":1,"result":{}}"#);
}

#[test]
fn test_error_response_serialization() {
    let resp = CdpResponse::error(3, codes::METHOD_NOT_FOUND, "Method not found");
    let json = serde_json::to_string(&resp).unwrap();
    assert_eq!(
        json,
        r#"{"id":3,"error":{"code":-32601,"message":"Method not found"}}"#
    );
}

#[test]
fn test_response_with_session_id() {
    let resp = CdpResponse::success(7, serde_json::json!({})).with_session("P1-session-1");
    let json = serde_json::to_string(&resp).unwrap();
    assert!(json.contains(r#""sessionId":"P1-session-1""#));
}

#[test]
fn test_error_code_constants() {
    assert_eq!(codes::INVALID_REQUEST, -32600);
    assert_eq!(codes::METHOD_NOT_FOUND, -32601);
    assert_eq!(codes::INVALID_PARAMS, -32602);
    assert_eq!(codes::SERVER_ERROR, -32000);
}

// CdpEvent tests
#[test]
fn test_event_serialization() {
    let evt = CdpEvent::new("Target.targetDestroyed", serde_json::json!({"targetId": "P1"}));
    let json = serde_json::to_string(&evt).unwrap();
    assert_eq!(
        json,
        r#"{"method":"Target.targetDestroyed","params":{"targetId":"P1"}}"#
    );
}

#[test]
fn test_event_parses_with_session() {
    let evt: CdpEvent = serde_json::from_str(
        r#"{"method":"Page.loadEventFired","params":{},"sessionId":"sess"}"#,
    )
    .unwrap();
    assert_eq!(evt.session_id.as_deref(), Some("sess"));
}

// CdpMessage tests
#[test]
fn test_message_parses_as_response() {
    let msg: CdpMessage = serde_json::from_str(r#"{"id":1,"result":{"success":true}}"#).unwrap();
    assert!(matches!(msg, CdpMessage::Response(_)));
    assert!(msg.is_response_for(1));
    assert!(!msg.is_response_for(2));
}

#[test]
fn test_message_parses_as_event() {
    let msg: CdpMessage =
        serde_json::from_str(r#"{"method":"Target.targetCreated","params":{}}"#).unwrap();
    assert!(matches!(msg, CdpMessage::Event(_)));
}

#[test]
fn test_message_into_response() {
    let msg: CdpMessage = serde_json::from_str(r#"{"id":10,"result":{}}"#).unwrap();
    let resp = msg.into_response().unwrap();
    assert_eq!(resp.id, 10);
}

#[test]
fn test_message_into_event_from_response_is_none() {
    let msg: CdpMessage = serde_json::from_str(r#"{"id":5,"result":{}}"#).unwrap();
    assert!(msg.into_event().is_none());
}

#[test]
fn test_error_response_parses_back() {
    let resp = CdpResponse::error(9, codes::SERVER_ERROR, "Target not found: P9");
    let json = serde_json::to_string(&resp).unwrap();
    let parsed: CdpResponse = serde_json::from_str(&json).unwrap();
    let err = parsed.error.unwrap();
    assert_eq!(err.code, -32000);
    assert_eq!(err.message, "Target not found: P9");
    assert!(err.data.is_none());
}
