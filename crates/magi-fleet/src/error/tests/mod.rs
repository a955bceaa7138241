use super::*;

#[test]
fn test_browser_not_found_display() {
    let err = FleetError::BrowserNotFound(BrowserId::from("b1"));
    assert_eq!(err.to_string(), "browser not found: b1");
}

#[test]
fn test_page_not_in_browser_display() {
    let err = FleetError::PageNotInBrowser {
        page: PageId::from("p1"),
        browser: BrowserId::from("b2"),
    };
    assert_eq!(err.to_string(), "page p1 does not belong to browser b2");
}

#[test]
fn test_surface_error_passes_through() {
    let err: FleetError = SurfaceError::AlreadyAttached.into();
    assert_eq!(err.to_string(), "debugger already attached");
}

#[test]
fn test_error_is_send_sync() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<FleetError>();
}
