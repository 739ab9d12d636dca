//! Settings loading with deep merge and environment variable overrides.
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::errors::{Result, SettingsError};
use crate::types::MendSettings;

/// Resolve the path to the settings file (`~/.mend/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".mend").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<MendSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// A missing file yields defaults; invalid JSON is an error.
pub fn load_settings_from_path(path: &Path) -> Result<MendSettings> {
    load_with_env(path, &|name| std::env::var(name).ok())
}

pub(crate) fn load_with_env(
    path: &Path,
    env: &dyn Fn(&str) -> Option<String>,
) -> Result<MendSettings> {
    let defaults = serde_json::to_value(MendSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    let mut settings: MendSettings = serde_json::from_value(merged)?;
    apply_env_overrides(&mut settings, env);
    validate(&settings)?;
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

/// Apply environment overrides. Invalid values are logged and ignored.
pub fn apply_env_overrides(settings: &mut MendSettings, env: &dyn Fn(&str) -> Option<String>) {
    let string = |name: &str| env(name).filter(|v| !v.trim().is_empty());

    // ── Server ──────────────────────────────────────────────────────
    if let Some(v) = string("MEND_HOST") {
        settings.server.host = v;
    }
    if let Some(v) = checked(name_value("MEND_PORT", env), |v| parse_u16_range(v, 0, 65535)) {
        settings.server.port = v;
    }
    if let Some(v) = checked(name_value("MEND_MAX_UPLOAD_BYTES", env), |v| {
        parse_usize_range(v, 1024, 1_073_741_824)
    }) {
        settings.server.max_upload_bytes = v;
    }

    // ── API ─────────────────────────────────────────────────────────
    if let Some(v) = string("MEND_API_BASE_URL") {
        settings.api.base_url = v;
    }
    if let Some(v) = string("MEND_MODEL") {
        settings.api.model = v;
    }
    if let Some(v) = checked(name_value("MEND_REQUEST_TIMEOUT_SECS", env), |v| {
        parse_u64_range(v, 1, 3600)
    }) {
        settings.api.request_timeout_secs = v;
    }
    if let Some(v) = string("OPENAI_API_KEY") {
        settings.api.api_key = Some(v);
    }

    // ── Staging / search / logging ──────────────────────────────────
    if let Some(v) = string("MEND_STAGING_DIR") {
        settings.staging.dir = Some(PathBuf::from(v));
    }
    if let Some(v) = checked(name_value("MEND_WEB_SEARCH", env), parse_bool) {
        settings.search.enabled = v;
    }
    if let Some(v) = string("MEND_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(v) = checked(name_value("MEND_LOG_JSON", env), parse_bool) {
        settings.logging.json = v;
    }
}

fn validate(settings: &MendSettings) -> Result<()> {
    if settings.api.model.trim().is_empty() {
        return Err(SettingsError::InvalidValue("api.model must not be empty".into()));
    }
    if settings.api.request_timeout_secs == 0 {
        return Err(SettingsError::InvalidValue(
            "api.requestTimeoutSecs must be positive".into(),
        ));
    }
    if settings.server.max_upload_bytes == 0 {
        return Err(SettingsError::InvalidValue(
            "server.maxUploadBytes must be positive".into(),
        ));
    }
    Ok(())
}

// ── Pure parsing functions (testable without env vars) ──────────────────────

/// Accepts (case-insensitive): `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`.
pub fn parse_bool(val: &str) -> Option<bool> {
    match val.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

pub fn parse_u16_range(val: &str, min: u16, max: u16) -> Option<u16> {
    let n: u16 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

pub fn parse_usize_range(val: &str, min: usize, max: usize) -> Option<usize> {
    let n: usize = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

fn name_value<'a>(
    name: &'a str,
    env: &dyn Fn(&str) -> Option<String>,
) -> Option<(&'a str, String)> {
    env(name).map(|v| (name, v))
}

fn checked<T>(entry: Option<(&str, String)>, parse: impl Fn(&str) -> Option<T>) -> Option<T> {
    let (name, val) = entry?;
    let result = parse(val.trim());
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid env var, ignoring");
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    // ── deep_merge ──────────────────────────────────────────────────

    #[test]
    fn merge_nested_override() {
        let target = serde_json::json!({"server": {"port": 8080, "host": "localhost"}});
        let source = serde_json::json!({"server": {"port": 9090}});
        let merged = deep_merge(target, source);
        assert_eq!(merged["server"]["port"], 9090);
        assert_eq!(merged["server"]["host"], "localhost");
    }

    #[test]
    fn merge_null_preserves_target() {
        let target = serde_json::json!({"a": 1, "b": 2});
        let source = serde_json::json!({"a": null});
        let merged = deep_merge(target, source);
        assert_eq!(merged["a"], 1);
        assert_eq!(merged["b"], 2);
    }

    #[test]
    fn merge_array_replace() {
        let target = serde_json::json!({"items": [1, 2, 3]});
        let source = serde_json::json!({"items": [4]});
        assert_eq!(deep_merge(target, source)["items"], serde_json::json!([4]));
    }

    // ── file loading ────────────────────────────────────────────────

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let settings = load_with_env(&path, &env_from(&[])).unwrap();
        assert_eq!(settings.server.port, 8501);
        assert!(settings.api.api_key.is_none());
    }

    #[test]
    fn file_values_merge_over_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"api": {"model": "gpt-4o"}, "search": {"enabled": false}}"#)
            .unwrap();
        let settings = load_with_env(&path, &env_from(&[])).unwrap();
        assert_eq!(settings.api.model, "gpt-4o");
        assert!(!settings.search.enabled);
        assert_eq!(settings.api.request_timeout_secs, 120);
    }

    #[test]
    fn invalid_json_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{not json").unwrap();
        let err = load_with_env(&path, &env_from(&[])).unwrap_err();
        assert!(matches!(err, SettingsError::Json(_)));
    }

    #[test]
    fn empty_model_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"api": {"model": "  "}}"#).unwrap();
        let err = load_with_env(&path, &env_from(&[])).unwrap_err();
        assert!(matches!(err, SettingsError::InvalidValue(_)));
    }

    // ── env overrides ───────────────────────────────────────────────

    #[test]
    fn env_overrides_win_over_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"server": {"port": 9000}}"#).unwrap();
        let env = env_from(&[
            ("MEND_PORT", "7000"),
            ("MEND_MODEL", "gpt-4o"),
            ("MEND_WEB_SEARCH", "off"),
            ("MEND_STAGING_DIR", "/var/tmp/mend"),
            ("OPENAI_API_KEY", "sk-env"),
        ]);
        let settings = load_with_env(&path, &env).unwrap();
        assert_eq!(settings.server.port, 7000);
        assert_eq!(settings.api.model, "gpt-4o");
        assert!(!settings.search.enabled);
        assert_eq!(settings.staging.dir, Some(PathBuf::from("/var/tmp/mend")));
        assert_eq!(settings.api.api_key.as_deref(), Some("sk-env"));
    }

    #[test]
    fn invalid_env_values_ignored() {
        let mut settings = MendSettings::default();
        let env = env_from(&[
            ("MEND_PORT", "99999"),
            ("MEND_REQUEST_TIMEOUT_SECS", "0"),
            ("MEND_LOG_JSON", "maybe"),
            ("OPENAI_API_KEY", "   "),
        ]);
        apply_env_overrides(&mut settings, &env);
        assert_eq!(settings.server.port, 8501);
        assert_eq!(settings.api.request_timeout_secs, 120);
        assert!(settings.logging.json);
        assert!(settings.api.api_key.is_none());
    }

    // ── parsing ─────────────────────────────────────────────────────

    #[test]
    fn parse_bool_variants() {
        assert_eq!(parse_bool("YES"), Some(true));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    fn parse_ranges() {
        assert_eq!(parse_u16_range("8080", 1, 65535), Some(8080));
        assert_eq!(parse_u16_range("0", 1, 65535), None);
        assert_eq!(parse_u64_range("abc", 1, 10), None);
        assert_eq!(parse_usize_range("2048", 1024, 4096), Some(2048));
    }
}
