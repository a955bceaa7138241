use super::*;

fn store_with_browser() -> (FleetStore, BrowserId) {
    let store = FleetStore::new();
    let browser = store.create_browser(&BrowserSpec::named("test"));
    (store, browser.id)
}

fn add_page(store: &FleetStore, browser: &BrowserId) -> PageId {
    store
        .insert_page(browser, PageInit::default(), None)
        .unwrap()
        .id
}

#[test]
fn test_create_browser_defaults() {
    let store = FleetStore::new();
    let browser = store.create_browser(&BrowserSpec::default());
    assert_eq!(browser.name, "default");
    assert!(browser.partition_key.starts_with("magi-"));
    assert!(browser.pages.is_empty());
    assert!(browser.active_page.is_none());
}

#[test]
fn test_create_browser_with_spec() {
    let store = FleetStore::new();
    let spec = BrowserSpec::named("work")
        .partition_key("persist:work")
        .user_agent("UA/1.0");
    let browser = store.create_browser(&spec);
    assert_eq!(browser.name, "work");
    assert_eq!(browser.partition_key, "persist:work");
    assert_eq!(browser.user_agent.as_deref(), Some("UA/1.0"));
}

#[test]
fn test_first_browser_is_creation_order() {
    let store = FleetStore::new();
    let b1 = store.create_browser(&BrowserSpec::named("one"));
    let _b2 = store.create_browser(&BrowserSpec::named("two"));
    assert_eq!(store.first_browser_id(), Some(b1.id));
}

#[test]
fn test_insert_page_appends_in_order() {
    let (store, browser) = store_with_browser();
    let p1 = add_page(&store, &browser);
    let p2 = add_page(&store, &browser);
    let record = store.get_browser(&browser).unwrap();
    assert_eq!(record.pages, vec![p1, p2]);
}

#[test]
fn test_insert_page_after_anchor() {
    let (store, browser) = store_with_browser();
    let p1 = add_page(&store, &browser);
    let p2 = add_page(&store, &browser);
    let p3 = store
        .insert_page(&browser, PageInit::default(), Some(&p1))
        .unwrap()
        .id;
    let record = store.get_browser(&browser).unwrap();
    assert_eq!(record.pages, vec![p1, p3, p2]);
}

#[test]
fn test_insert_page_unknown_anchor_falls_back_to_append() {
    let (store, browser) = store_with_browser();
    let p1 = add_page(&store, &browser);
    let ghost = PageId::from("ghost");
    let p2 = store
        .insert_page(&browser, PageInit::default(), Some(&ghost))
        .unwrap()
        .id;
    let record = store.get_browser(&browser).unwrap();
    assert_eq!(record.pages, vec![p1, p2]);
}

#[test]
fn test_insert_page_unknown_browser_errors() {
    let store = FleetStore::new();
    let result = store.insert_page(&BrowserId::from("nope"), PageInit::default(), None);
    assert!(matches!(result, Err(FleetError::BrowserNotFound(_))));
}

#[test]
fn test_page_record_invariants_on_insert() {
    let (store, browser) = store_with_browser();
    let page = store
        .insert_page(&browser, PageInit::with_url("https://example.com"), None)
        .unwrap();
    assert_eq!(page.url, "https://example.com");
    assert_eq!(page.browser_id, browser);
    assert!(!page.is_active);
    // Invariant 1: every listed page has a live record.
    let record = store.get_browser(&browser).unwrap();
    for id in &record.pages {
        assert!(store.get_page(id).is_some());
    }
}

#[test]
fn test_set_active_page_updates_flags() {
    let (store, browser) = store_with_browser();
    let p1 = add_page(&store, &browser);
    let p2 = add_page(&store, &browser);

    assert!(store.set_active_page(&browser, Some(&p1)).unwrap());
    assert!(store.get_page(&p1).unwrap().is_active);

    assert!(store.set_active_page(&browser, Some(&p2)).unwrap());
    assert!(!store.get_page(&p1).unwrap().is_active);
    assert!(store.get_page(&p2).unwrap().is_active);
}

#[test]
fn test_set_active_page_is_idempotent() {
    let (store, browser) = store_with_browser();
    let p1 = add_page(&store, &browser);
    assert!(store.set_active_page(&browser, Some(&p1)).unwrap());
    assert!(!store.set_active_page(&browser, Some(&p1)).unwrap());
}

#[test]
fn test_set_active_page_rejects_foreign_page() {
    let (store, browser) = store_with_browser();
    let other = store.create_browser(&BrowserSpec::named("other"));
    let foreign = add_page(&store, &other.id);
    let result = store.set_active_page(&browser, Some(&foreign));
    assert!(matches!(result, Err(FleetError::PageNotInBrowser { .. })));
}

// Close-active successor rule: right neighbour, else left, else none.
#[test]
fn test_remove_active_page_activates_right_neighbour() {
    let (store, browser) = store_with_browser();
    let p1 = add_page(&store, &browser);
    let p2 = add_page(&store, &browser);
    let p3 = add_page(&store, &browser);
    store.set_active_page(&browser, Some(&p2)).unwrap();

    let removal = store.remove_page(&browser, &p2).unwrap();
    assert!(removal.active_changed);
    assert_eq!(removal.new_active, Some(p3.clone()));
    assert_eq!(store.get_browser(&browser).unwrap().pages, vec![p1, p3.clone()]);
    assert!(store.get_page(&p3).unwrap().is_active);
}

#[test]
fn test_remove_active_page_falls_back_to_left_neighbour() {
    let (store, browser) = store_with_browser();
    let p1 = add_page(&store, &browser);
    let p2 = add_page(&store, &browser);
    store.set_active_page(&browser, Some(&p2)).unwrap();

    let removal = store.remove_page(&browser, &p2).unwrap();
    assert_eq!(removal.new_active, Some(p1.clone()));
    assert!(store.get_page(&p1).unwrap().is_active);
}

#[test]
fn test_remove_last_page_clears_active() {
    let (store, browser) = store_with_browser();
    let p1 = add_page(&store, &browser);
    store.set_active_page(&browser, Some(&p1)).unwrap();

    let removal = store.remove_page(&browser, &p1).unwrap();
    assert!(removal.active_changed);
    assert_eq!(removal.new_active, None);
    assert_eq!(store.get_browser(&browser).unwrap().active_page, None);
}

#[test]
fn test_remove_inactive_page_keeps_active() {
    let (store, browser) = store_with_browser();
    let p1 = add_page(&store, &browser);
    let p2 = add_page(&store, &browser);
    store.set_active_page(&browser, Some(&p1)).unwrap();

    let removal = store.remove_page(&browser, &p2).unwrap();
    assert!(!removal.active_changed);
    assert_eq!(removal.new_active, Some(p1));
}

#[test]
fn test_delete_browser_cascades_pages_in_order() {
    let (store, browser) = store_with_browser();
    let p1 = add_page(&store, &browser);
    let p2 = add_page(&store, &browser);
    let p3 = add_page(&store, &browser);

    let (_, removed) = store.delete_browser(&browser).unwrap();
    let ids: Vec<PageId> = removed.into_iter().map(|p| p.id).collect();
    assert_eq!(ids, vec![p1.clone(), p2, p3]);
    assert!(store.get_browser(&browser).is_none());
    assert!(store.get_page(&p1).is_none());
    assert!(store.first_browser_id().is_none());
}

#[test]
fn test_delete_unknown_browser_is_noop() {
    let store = FleetStore::new();
    assert!(store.delete_browser(&BrowserId::from("nope")).is_none());
}

#[test]
fn test_mutate_page_applies_transform() {
    let (store, browser) = store_with_browser();
    let p1 = add_page(&store, &browser);
    assert!(store.mutate_page(&p1, |page| {
        page.title = "Example".to_string();
        page.navigation.is_loading = true;
    }));
    let page = store.get_page(&p1).unwrap();
    assert_eq!(page.title, "Example");
    assert!(page.navigation.is_loading);
}

#[test]
fn test_mutate_absent_page_is_noop() {
    let store = FleetStore::new();
    assert!(!store.mutate_page(&PageId::from("nope"), |_| {}));
}

#[test]
fn test_snapshot_is_detached_copy() {
    let (store, browser) = store_with_browser();
    let p1 = add_page(&store, &browser);
    let snapshot = store.snapshot();

    // Mutate after snapshotting; the snapshot must not move.
    store.mutate_page(&p1, |page| page.title = "changed".to_string());
    assert_eq!(snapshot.browsers.len(), 1);
    assert_eq!(snapshot.browsers[0].page_records[0].title, "");
}

#[test]
fn test_snapshot_preserves_order_invariants() {
    let store = FleetStore::new();
    let b1 = store.create_browser(&BrowserSpec::named("one"));
    let b2 = store.create_browser(&BrowserSpec::named("two"));
    add_page(&store, &b2.id);

    let snapshot = store.snapshot();
    assert_eq!(snapshot.browsers[0].browser.id, b1.id);
    assert_eq!(snapshot.browsers[1].browser.id, b2.id);
    // Invariant 2: active page, when set, is a member of pages.
    for browser in &snapshot.browsers {
        if let Some(active) = &browser.browser.active_page {
            assert!(browser.browser.pages.contains(active));
        }
    }
}

#[test]
fn test_pages_of_returns_records_in_order() {
    let (store, browser) = store_with_browser();
    let p1 = add_page(&store, &browser);
    let p2 = add_page(&store, &browser);
    let pages = store.pages_of(&browser);
    assert_eq!(pages.len(), 2);
    assert_eq!(pages[0].id, p1);
    assert_eq!(pages[1].id, p2);
}
