//! Event Channel Tests
//!
//! Per-module outbound events and their forwarding onto the host bus.

mod common;

use std::time::Duration;

use common::*;
use cooker_core::{App, AppInfo};
use serde_json::json;

fn app_info() -> AppInfo {
    AppInfo::new("acme", "kitchen", "oven", "cookerd")
}

#[tokio::test]
async fn test_events_emitted_during_init_are_buffered() {
    let dir = tempfile::tempdir().unwrap();
    let opener = FakeOpener::new();
    opener.install(dir.path(), "libchatty", "chatty", init_chatty);
    let manager = manager(&opener, &[dir.path()]);
    manager.load_modules(&["chatty"]);

    let module = manager.get_module("chatty").unwrap();
    let mut rx = module.take_event_receiver().unwrap();

    let event = rx.recv().await.unwrap();
    assert_eq!(event.event, "booting");
    assert!(module.take_event_receiver().is_none());
}

#[tokio::test]
async fn test_emit_after_receiver_dropped_is_discarded() {
    let dir = tempfile::tempdir().unwrap();
    let opener = FakeOpener::new();
    opener.install(dir.path(), "libauth", "auth", init_probe);
    let manager = manager(&opener, &[dir.path()]);
    manager.load_modules(&["auth"]);

    let module = manager.get_module("auth").unwrap();
    drop(module.take_event_receiver());

    let result = module
        .capability()
        .unwrap()
        .execute("emit", &json!({"event": "lost"}));
    assert!(result.is_ok());
}

#[tokio::test]
async fn test_app_forwards_module_events() {
    let dir = tempfile::tempdir().unwrap();
    let opener = FakeOpener::new();
    opener.install(dir.path(), "libchatty", "chatty", init_chatty);
    opener.install(dir.path(), "libauth", "auth", init_probe);
    let app = App::with_manager(app_info(), manager(&opener, &[dir.path()]));
    app.manager().load_modules(&["chatty", "auth"]);

    let mut events = app.subscribe_events();
    assert_eq!(app.forward_events(), 2);

    let booting = tokio::time::timeout(Duration::from_secs(5), events.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(booting.source, "chatty");
    assert_eq!(booting.event.event, "booting");

    app.manager()
        .get_module("auth")
        .unwrap()
        .capability()
        .unwrap()
        .execute("emit", &json!({"event": "login", "payload": {"user": "chef"}}))
        .unwrap();

    let login = tokio::time::timeout(Duration::from_secs(5), events.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(login.source, "auth");
    assert_eq!(login.event.payload["user"], "chef");

    // Receivers were taken by the first call.
    assert_eq!(app.forward_events(), 0);
}

#[tokio::test]
async fn test_after_ready_hook_emits_through_app() {
    let dir = tempfile::tempdir().unwrap();
    let opener = FakeOpener::new();
    opener.install(dir.path(), "libchatty", "chatty", init_chatty);
    let app = App::with_manager(app_info(), manager(&opener, &[dir.path()]));
    app.manager().load_modules(&["chatty"]);

    let mut events = app.subscribe_events();
    app.forward_events();
    for handle in app.start_after_ready() {
        handle.join().unwrap();
    }

    let mut names = Vec::new();
    for _ in 0..2 {
        let event = tokio::time::timeout(Duration::from_secs(5), events.recv())
            .await
            .unwrap()
            .unwrap();
        names.push(event.event.event);
    }
    assert_eq!(names, vec!["booting", "ready"]);
}
