use super::*;

#[test]
fn test_session_id_wire_form() {
    let sid = SessionId::new("a1b2c3d4", 7);
    assert_eq!(sid.to_string(), "a1b2c3d4-session-7");
}

#[test]
fn test_session_id_parse_round_trip() {
    let sid: SessionId = "a1b2c3d4-session-42".parse().unwrap();
    assert_eq!(sid.page_id(), "a1b2c3d4");
    assert_eq!(sid.seq(), 42);
    assert_eq!(sid.to_string(), "a1b2c3d4-session-42");
}

#[test]
fn test_session_id_page_id_with_dashes() {
    // Page ids may contain dashes; the last marker wins.
    let sid: SessionId = "page-one-session-3".parse().unwrap();
    assert_eq!(sid.page_id(), "page-one");
    assert_eq!(sid.seq(), 3);
}

#[test]
fn test_session_id_rejects_missing_marker() {
    assert!("plainstring".parse::<SessionId>().is_err());
}

#[test]
fn test_session_id_rejects_non_numeric_seq() {
    assert!("p1-session-abc".parse::<SessionId>().is_err());
}

#[test]
fn test_session_id_rejects_empty_page_id() {
    assert!("-session-1".parse::<SessionId>().is_err());
}

#[test]
fn test_session_id_serde_as_string() {
    let sid = SessionId::new("p1", 1);
    let json = serde_json::to_string(&sid).unwrap();
    assert_eq!(json, r#""p1-session-1""#);
    let back: SessionId = serde_json::from_str(&json).unwrap();
    assert_eq!(back, sid);
}

#[test]
fn test_session_id_equality_and_hash() {
    use std::collections::HashSet;
    let a = SessionId::new("p1", 1);
    let b: SessionId = "p1-session-1".parse().unwrap();
    let mut set = HashSet::new();
    set.insert(a);
    assert!(set.contains(&b));
}
