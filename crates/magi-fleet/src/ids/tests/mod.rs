use super::*;

#[test]
fn test_generated_ids_are_unique() {
    let a = PageId::generate();
    let b = PageId::generate();
    assert_ne!(a, b);
}

#[test]
fn test_generated_id_is_simple_uuid() {
    let id = BrowserId::generate();
    assert_eq!(id.as_str().len(), 32);
    assert!(id.as_str().chars().all(|c| c.is_ascii_hexdigit()));
}

#[test]
fn test_id_display_matches_as_str() {
    let id = PageId::from("p1");
    assert_eq!(id.to_string(), "p1");
    assert_eq!(id.as_str(), "p1");
}

#[test]
fn test_id_serde_transparent() {
    let id = BrowserId::from("b1");
    assert_eq!(serde_json::to_string(&id).unwrap(), r#""b1""#);
    let back: BrowserId = serde_json::from_str(r#""b1""#).unwrap();
    assert_eq!(back, id);
}
