//! Settings loading with deep merge and environment variable overrides.
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::Result;
use crate::types::SancharSettings;

/// Resolve the Sanchar home directory (`~/.sanchar`).
pub fn sanchar_home() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".sanchar")
}

/// Resolve the path to the settings file (`~/.sanchar/settings.json`).
pub fn settings_path() -> PathBuf {
    sanchar_home().join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<SancharSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// A missing file yields defaults; a file with invalid JSON is an error.
pub fn load_settings_from_path(path: &Path) -> Result<SancharSettings> {
    let defaults = serde_json::to_value(SancharSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    let mut settings: SancharSettings = serde_json::from_value(merged)?;
    apply_env_overrides(&mut settings);
    Ok(settings)
}

/// Recursive deep merge of two JSON values.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = if let Some(target_val) = target_map.remove(&key) {
                    deep_merge(target_val, source_val)
                } else {
                    source_val
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply `SANCHAR_*` environment variable overrides.
pub fn apply_env_overrides(settings: &mut SancharSettings) {
    apply_overrides(settings, |name| std::env::var(name).ok());
}

/// Apply overrides read through `lookup`.
///
/// Invalid values are ignored with a warning and the file/default value wins.
pub fn apply_overrides(settings: &mut SancharSettings, lookup: impl Fn(&str) -> Option<String>) {
    let string = |name: &str| lookup(name).filter(|v| !v.is_empty());

    // ── Server ──────────────────────────────────────────────────────
    if let Some(v) = string("SANCHAR_HOST") {
        settings.server.host = v;
    }
    if let Some(v) = read_parsed(&lookup, "SANCHAR_PORT", |s| s.parse::<u16>().ok()) {
        settings.server.port = v;
    }
    if let Some(v) = read_parsed(&lookup, "SANCHAR_MAX_CONNECTIONS", |s| {
        parse_usize_range(s, 1, 1_000_000)
    }) {
        settings.server.max_connections = v;
    }

    // ── Storage / logging ───────────────────────────────────────────
    if let Some(v) = string("SANCHAR_DB_PATH") {
        settings.storage.db_path = Some(v);
    }
    if let Some(v) = string("SANCHAR_LOG_LEVEL") {
        settings.logging.level = v;
    }

    // ── Push ────────────────────────────────────────────────────────
    if let Some(v) = read_parsed(&lookup, "SANCHAR_PUSH_ENABLED", parse_bool) {
        settings.push.enabled = v;
    }
    if let Some(v) = string("SANCHAR_PUSH_ENDPOINT") {
        settings.push.endpoint = v;
    }
    if let Some(v) = string("SANCHAR_PUSH_ACCESS_TOKEN") {
        settings.push.access_token = Some(v);
    }
    if let Some(v) = read_parsed(&lookup, "SANCHAR_PUSH_ONLY_WHEN_OFFLINE", parse_bool) {
        settings.relay.push_only_when_offline = v;
    }
}

fn read_parsed<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    parse: impl Fn(&str) -> Option<T>,
) -> Option<T> {
    let val = lookup(name).filter(|v| !v.is_empty())?;
    let result = parse(&val);
    if result.is_none() {
        warn!(key = name, value = %val, "invalid env override, ignoring");
    }
    result
}

/// Parse a string as a boolean.
///
/// Accepts (case-insensitive): `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`.
pub fn parse_bool(val: &str) -> Option<bool> {
    match val.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse a string as a `usize` within a range.
pub fn parse_usize_range(val: &str, min: usize, max: usize) -> Option<usize> {
    let n: usize = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::SettingsError;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn merge_nested_override() {
        let target = serde_json::json!({"server": {"port": 5000, "host": "0.0.0.0"}});
        let source = serde_json::json!({"server": {"port": 9090}});
        let merged = deep_merge(target, source);
        assert_eq!(merged["server"]["port"], 9090);
        assert_eq!(merged["server"]["host"], "0.0.0.0");
    }

    #[test]
    fn merge_null_preserves_target() {
        let merged = deep_merge(serde_json::json!({"a": 1}), serde_json::json!({"a": null}));
        assert_eq!(merged["a"], 1);
    }

    #[test]
    fn merge_array_replace() {
        let merged = deep_merge(
            serde_json::json!({"items": [1, 2, 3]}),
            serde_json::json!({"items": [4]}),
        );
        assert_eq!(merged["items"], serde_json::json!([4]));
    }

    #[test]
    fn missing_file_returns_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = load_settings_from_path(&dir.path().join("nope.json")).unwrap();
        assert_eq!(settings.server.max_connections, 1000);
    }

    #[test]
    fn file_values_are_merged() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{"relay": {"pushOnlyWhenOffline": false}, "push": {"timeoutSecs": 3}}"#,
        )
        .unwrap();
        let settings = load_settings_from_path(&path).unwrap();
        assert!(!settings.relay.push_only_when_offline);
        assert_eq!(settings.push.timeout_secs, 3);
        assert!(settings.push.enabled);
    }

    #[test]
    fn invalid_json_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{not json").unwrap();
        let err = load_settings_from_path(&path).unwrap_err();
        assert!(matches!(err, SettingsError::Json(_)));
    }

    #[test]
    fn overrides_apply() {
        let mut settings = SancharSettings::default();
        apply_overrides(
            &mut settings,
            lookup(&[
                ("SANCHAR_PORT", "7000"),
                ("SANCHAR_HOST", "127.0.0.1"),
                ("SANCHAR_PUSH_ENABLED", "off"),
                ("SANCHAR_DB_PATH", "/var/lib/sanchar.db"),
                ("SANCHAR_PUSH_ONLY_WHEN_OFFLINE", "false"),
            ]),
        );
        assert_eq!(settings.server.port, 7000);
        assert_eq!(settings.server.host, "127.0.0.1");
        assert!(!settings.push.enabled);
        assert_eq!(settings.storage.db_path.as_deref(), Some("/var/lib/sanchar.db"));
        assert!(!settings.relay.push_only_when_offline);
    }

    #[test]
    fn invalid_overrides_are_ignored() {
        let mut settings = SancharSettings::default();
        apply_overrides(
            &mut settings,
            lookup(&[
                ("SANCHAR_PORT", "99999"),
                ("SANCHAR_MAX_CONNECTIONS", "0"),
                ("SANCHAR_PUSH_ENABLED", "maybe"),
            ]),
        );
        assert_eq!(settings.server.port, 5000);
        assert_eq!(settings.server.max_connections, 1000);
        assert!(settings.push.enabled);
    }

    #[test]
    fn empty_override_is_ignored() {
        let mut settings = SancharSettings::default();
        apply_overrides(&mut settings, lookup(&[("SANCHAR_HOST", "")]));
        assert_eq!(settings.server.host, "0.0.0.0");
    }

    #[test]
    fn parse_bool_variants() {
        assert_eq!(parse_bool("YES"), Some(true));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool("2"), None);
    }
}
