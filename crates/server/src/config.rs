use std::{collections::HashMap, fs, net::SocketAddr, path::PathBuf, time::Duration};

use anyhow::Context;
use bridge::{BridgeConfig, DEFAULT_MAX_GROUP_DEPTH, DEFAULT_POLL_INTERVAL};
use controller::DEFAULT_BUNDLE_ID;

pub const SETTINGS_FILE: &str = "cue-bridge.toml";

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub bind_addr: String,
    pub bundle_id: String,
    pub osascript: PathBuf,
    pub poll_interval_ms: u64,
    pub max_group_depth: usize,
    pub log_filter: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:5000".into(),
            bundle_id: DEFAULT_BUNDLE_ID.into(),
            osascript: PathBuf::from("osascript"),
            poll_interval_ms: DEFAULT_POLL_INTERVAL.as_millis() as u64,
            max_group_depth: DEFAULT_MAX_GROUP_DEPTH,
            log_filter: "info".into(),
        }
    }
}

impl Settings {
    pub fn socket_addr(&self) -> anyhow::Result<SocketAddr> {
        self.bind_addr
            .parse()
            .with_context(|| format!("invalid bind address '{}'", self.bind_addr))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn bridge_config(&self) -> BridgeConfig {
        BridgeConfig {
            max_group_depth: self.max_group_depth,
        }
    }
}

/// Defaults, then `cue-bridge.toml` in the working directory, then env vars.
///
/// Values that could not be applied are returned as warnings so the caller
/// can log them once logging is configured.
pub fn load_settings() -> (Settings, Vec<String>) {
    let mut settings = Settings::default();
    let mut warnings = Vec::new();
    if let Ok(raw) = fs::read_to_string(SETTINGS_FILE) {
        apply_file(&mut settings, &raw, &mut warnings);
    }
    apply_env(&mut settings, |key| std::env::var(key).ok(), &mut warnings);
    (settings, warnings)
}

pub fn apply_file(settings: &mut Settings, raw: &str, warnings: &mut Vec<String>) {
    let file_cfg = match toml::from_str::<HashMap<String, toml::Value>>(raw) {
        Ok(file_cfg) => file_cfg,
        Err(error) => {
            warnings.push(format!("ignoring unreadable {SETTINGS_FILE}: {error}"));
            return;
        }
    };
    let get = |key: &str| {
        file_cfg.get(key).map(|value| match value {
            toml::Value::String(text) => text.clone(),
            other => other.to_string(),
        })
    };

    if let Some(v) = get("bind_addr") {
        settings.bind_addr = v;
    }
    if let Some(v) = get("bundle_id") {
        settings.bundle_id = v;
    }
    if let Some(v) = get("osascript") {
        settings.osascript = PathBuf::from(v);
    }
    if let Some(v) = get("poll_interval_ms") {
        set_number(&mut settings.poll_interval_ms, "poll_interval_ms", &v, warnings);
    }
    if let Some(v) = get("max_group_depth") {
        set_number(&mut settings.max_group_depth, "max_group_depth", &v, warnings);
    }
    if let Some(v) = get("log_filter") {
        settings.log_filter = v;
    }
}

/// Later keys win, so `APP__BIND_ADDR` overrides `CUE_BRIDGE_BIND`.
pub fn apply_env(
    settings: &mut Settings,
    var: impl Fn(&str) -> Option<String>,
    warnings: &mut Vec<String>,
) {
    if let Some(v) = var("CUE_BRIDGE_BIND") {
        settings.bind_addr = v;
    }
    if let Some(v) = var("APP__BIND_ADDR") {
        settings.bind_addr = v;
    }
    if let Some(v) = var("APP__BUNDLE_ID") {
        settings.bundle_id = v;
    }
    if let Some(v) = var("APP__OSASCRIPT") {
        settings.osascript = PathBuf::from(v);
    }
    if let Some(v) = var("APP__POLL_INTERVAL_MS") {
        set_number(&mut settings.poll_interval_ms, "APP__POLL_INTERVAL_MS", &v, warnings);
    }
    if let Some(v) = var("APP__MAX_GROUP_DEPTH") {
        set_number(&mut settings.max_group_depth, "APP__MAX_GROUP_DEPTH", &v, warnings);
    }
    if let Some(v) = var("APP__LOG_FILTER") {
        settings.log_filter = v;
    }
}

fn set_number<T: std::str::FromStr>(
    slot: &mut T,
    key: &str,
    raw: &str,
    warnings: &mut Vec<String>,
) {
    match raw.trim().parse::<T>() {
        Ok(parsed) => *slot = parsed,
        Err(_) => warnings.push(format!("ignoring invalid number for {key}: {raw:?}")),
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
