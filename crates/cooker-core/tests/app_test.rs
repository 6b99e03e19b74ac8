//! App Tests
//!
//! Settings-driven bootstrap and the run/stop cycle.

mod common;

use std::time::Duration;

use common::*;
use cooker_core::{App, AppInfo, ModuleState, Settings};

fn app_info() -> AppInfo {
    AppInfo::new("acme", "kitchen", "oven", "cookerd")
}

#[test]
fn test_init_with_settings_loads_listed_modules() {
    let builtin = tempfile::tempdir().unwrap();
    let extra = tempfile::tempdir().unwrap();
    let opener = FakeOpener::new();
    opener.install(builtin.path(), "libauth", "auth", init_probe);
    opener.install(extra.path(), "libstorage", "storage", init_needs_auth);
    let app = App::with_manager(app_info(), manager(&opener, &[builtin.path()]));

    let settings = Settings::from_toml_str(&format!(
        "[general]\nmodules = [\"auth\", \"storage\", \"billing\"]\n\n[modules]\npaths = [{:?}]\n",
        extra.path().display().to_string()
    ))
    .unwrap();

    let report = app.init_with(&settings);

    assert_eq!(report.loaded, vec!["auth".to_string(), "storage".to_string()]);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(app.manager().search_paths().len(), 2);
}

#[test]
fn test_settings_discovered_in_search_dirs() {
    let configs = tempfile::tempdir().unwrap();
    std::fs::write(
        configs.path().join("cookerd.toml"),
        "[general]\nmodules = [\"auth\"]\n",
    )
    .unwrap();

    let found = Settings::discover_in(
        &[configs.path().join("missing"), configs.path().to_path_buf()],
        &app_info().config_file_name(),
    )
    .unwrap()
    .unwrap();

    assert_eq!(found.0, configs.path().join("cookerd.toml"));
    assert_eq!(found.1.general.modules, vec!["auth".to_string()]);
    assert!(found.1.modules.paths.is_empty());
}

#[tokio::test]
async fn test_run_until_stopped_then_shutdown() {
    let dir = tempfile::tempdir().unwrap();
    let opener = FakeOpener::new();
    opener.install(dir.path(), "libauth", "auth", init_probe);
    opener.install(dir.path(), "libchatty", "app-chatty", init_chatty);
    let app = App::with_manager(app_info(), manager(&opener, &[dir.path()]));
    app.manager().load_modules(&["auth", "app-chatty"]);

    let stop = app.stop_handle();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        stop.stop();
    });

    tokio::time::timeout(Duration::from_secs(5), app.run())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(app.manager().count(), 0);
    assert_eq!(app.manager().state("auth"), Some(ModuleState::Unregistered));
    assert!(app.manager().funcs_after_ready().is_empty());
}
