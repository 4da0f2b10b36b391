use super::{apply_env, apply_file, Settings};

use std::{collections::HashMap, path::PathBuf, time::Duration};

fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let vars: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key: &str| vars.get(key).cloned()
}

#[test]
fn defaults_match_the_stock_controller_setup() {
    let settings = Settings::default();
    assert_eq!(settings.bind_addr, "0.0.0.0:5000");
    assert_eq!(settings.bundle_id, "com.figure53.QLab.4");
    assert_eq!(settings.poll_interval(), Duration::from_millis(100));
    assert_eq!(settings.bridge_config().max_group_depth, 2);
    assert!(settings.socket_addr().is_ok());
}

#[test]
fn settings_file_overrides_defaults() {
    let mut settings = Settings::default();
    let mut warnings = Vec::new();
    apply_file(
        &mut settings,
        r#"
bind_addr = "127.0.0.1:7000"
bundle_id = "com.figure53.QLab.5"
poll_interval_ms = 250
max_group_depth = "3"
"#,
        &mut warnings,
    );
    assert!(warnings.is_empty(), "{warnings:?}");
    assert_eq!(settings.bind_addr, "127.0.0.1:7000");
    assert_eq!(settings.bundle_id, "com.figure53.QLab.5");
    assert_eq!(settings.poll_interval_ms, 250);
    assert_eq!(settings.max_group_depth, 3);
    assert_eq!(settings.log_filter, "info");
}

#[test]
fn unreadable_settings_file_is_ignored() {
    let mut settings = Settings::default();
    let mut warnings = Vec::new();
    apply_file(&mut settings, "this is = = not toml", &mut warnings);
    assert_eq!(settings, Settings::default());
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].starts_with("ignoring unreadable cue-bridge.toml"));
}

#[test]
fn env_overrides_file_and_prefers_app_prefix() {
    let mut settings = Settings::default();
    let mut warnings = Vec::new();
    apply_file(&mut settings, "bind_addr = \"127.0.0.1:7000\"", &mut warnings);
    apply_env(
        &mut settings,
        env(&[
            ("CUE_BRIDGE_BIND", "127.0.0.1:8000"),
            ("APP__BIND_ADDR", "127.0.0.1:9000"),
            ("APP__OSASCRIPT", "/usr/local/bin/osascript"),
            ("APP__LOG_FILTER", "bridge=debug"),
        ]),
        &mut warnings,
    );
    assert!(warnings.is_empty());
    assert_eq!(settings.bind_addr, "127.0.0.1:9000");
    assert_eq!(settings.osascript, PathBuf::from("/usr/local/bin/osascript"));
    assert_eq!(settings.log_filter, "bridge=debug");
}

#[test]
fn invalid_numbers_keep_previous_value_and_warn() {
    let mut settings = Settings::default();
    let mut warnings = Vec::new();
    apply_env(
        &mut settings,
        env(&[
            ("APP__POLL_INTERVAL_MS", "fast"),
            ("APP__MAX_GROUP_DEPTH", " 4 "),
        ]),
        &mut warnings,
    );
    assert_eq!(settings.poll_interval_ms, 100);
    assert_eq!(settings.max_group_depth, 4);
    assert_eq!(
        warnings,
        vec!["ignoring invalid number for APP__POLL_INTERVAL_MS: \"fast\"".to_string()]
    );
}

#[test]
fn bad_bind_address_is_reported() {
    let settings = Settings {
        bind_addr: "localhost".into(),
        ..Settings::default()
    };
    let err = settings.socket_addr().expect_err("not a socket address");
    assert!(err.to_string().contains("localhost"));
}
