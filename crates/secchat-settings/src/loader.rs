//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`ClientSettings::default()`]
//! 2. If `~/.secchat/settings.json` exists, deep-merge user values over defaults
//! 3. Apply environment variable overrides (highest priority)
//! 4. Normalize sentinels (`maxAttempts: 0` means unbounded, as in the env)
//! 5. Reject inconsistent combinations
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::errors::{Result, SettingsError};
use crate::types::ClientSettings;

/// Resolve the path to the settings file (`~/.secchat/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".secchat").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<ClientSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// If the file does not exist, returns defaults. Invalid JSON or
/// inconsistent values are errors.
pub fn load_settings_from_path(path: &Path) -> Result<ClientSettings> {
    let defaults = serde_json::to_value(ClientSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    let mut settings: ClientSettings = serde_json::from_value(merged)?;
    apply_env_overrides(&mut settings);
    normalize(&mut settings);
    validate(&settings)?;
    Ok(settings)
}

/// Map sentinel values onto their canonical form.
///
/// A retry limit of zero removes the bound, whether it came from the file
/// or from `SECCHAT_RECONNECT_MAX_ATTEMPTS`.
pub fn normalize(settings: &mut ClientSettings) {
    if settings.reconnect.max_attempts == Some(0) {
        settings.reconnect.max_attempts = None;
    }
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

/// Apply `SECCHAT_*` environment variable overrides.
///
/// Integers must parse and fall within the listed range; anything else is
/// logged and ignored. `SECCHAT_RECONNECT_MAX_ATTEMPTS=0` removes the bound.
pub fn apply_env_overrides(settings: &mut ClientSettings) {
    // ── Server ──────────────────────────────────────────────────────
    if let Some(v) = read_env_string("SECCHAT_SERVER_URL") {
        settings.server.url = v;
    }
    if let Some(v) = read_env_u64("SECCHAT_CONNECT_TIMEOUT_MS", 100, 600_000) {
        settings.server.connect_timeout_ms = v;
    }

    // ── Heartbeat ───────────────────────────────────────────────────
    if let Some(v) = read_env_u64("SECCHAT_HEARTBEAT_INTERVAL_MS", 100, 600_000) {
        settings.heartbeat.interval_ms = v;
    }
    if let Some(v) = read_env_u64("SECCHAT_HEARTBEAT_TIMEOUT_MS", 100, 3_600_000) {
        settings.heartbeat.timeout_ms = v;
    }

    // ── Reconnect ───────────────────────────────────────────────────
    if let Some(v) = read_env_u64("SECCHAT_RECONNECT_BASE_MS", 1, 600_000) {
        settings.reconnect.base_delay_ms = v;
    }
    if let Some(v) = read_env_u64("SECCHAT_RECONNECT_MAX_MS", 1, 3_600_000) {
        settings.reconnect.max_delay_ms = v;
    }
    if let Some(v) = read_env_u32("SECCHAT_RECONNECT_MAX_ATTEMPTS", 0, 1_000_000) {
        settings.reconnect.max_attempts = (v > 0).then_some(v);
    }

    // ── Delivery / logging ──────────────────────────────────────────
    if let Some(v) = read_env_u64("SECCHAT_DELIVERY_TIMEOUT_MS", 100, 600_000) {
        settings.delivery.timeout_ms = v;
    }
    if let Some(v) = read_env_string("SECCHAT_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(v) = read_env_string("SECCHAT_LOG_FORMAT") {
        settings.logging.format = v;
    }
}

/// Reject combinations the session cannot run with.
pub fn validate(settings: &ClientSettings) -> Result<()> {
    let checks = [
        (settings.server.url.is_empty(), "server.url must not be empty"),
        (settings.server.connect_timeout_ms == 0, "server.connectTimeoutMs must be positive"),
        (settings.heartbeat.interval_ms == 0, "heartbeat.intervalMs must be positive"),
        (
            settings.heartbeat.timeout_ms <= settings.heartbeat.interval_ms,
            "heartbeat.timeoutMs must exceed heartbeat.intervalMs",
        ),
        (settings.reconnect.base_delay_ms == 0, "reconnect.baseDelayMs must be positive"),
        (
            settings.reconnect.max_delay_ms < settings.reconnect.base_delay_ms,
            "reconnect.maxDelayMs must not be below reconnect.baseDelayMs",
        ),
        (settings.delivery.timeout_ms == 0, "delivery.timeoutMs must be positive"),
        (
            !matches!(settings.logging.format.as_str(), "compact" | "json"),
            "logging.format must be \"compact\" or \"json\"",
        ),
    ];
    match checks.iter().find(|(failed, _)| *failed) {
        Some((_, message)) => Err(SettingsError::InvalidValue((*message).to_string())),
        None => Ok(()),
    }
}

// ── Pure parsing functions (testable without env vars) ──────────────────────

/// Parse a string as a `u32` within a range.
pub fn parse_u32_range(val: &str, min: u32, max: u32) -> Option<u32> {
    let n: u32 = val.trim().parse().ok()?;
    (min..=max).contains(&n).then_some(n)
}

/// Parse a string as a `u64` within a range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.trim().parse().ok()?;
    (min..=max).contains(&n).then_some(n)
}

// ── Env var readers (thin wrappers) ─────────────────────────────────────────

fn read_env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn read_env_u32(name: &str, min: u32, max: u32) -> Option<u32> {
    let val = std::env::var(name).ok()?;
    let result = parse_u32_range(&val, min, max);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid u32 env var, ignoring");
    }
    result
}

fn read_env_u64(name: &str, min: u64, max: u64) -> Option<u64> {
    let val = std::env::var(name).ok()?;
    let result = parse_u64_range(&val, min, max);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid u64 env var, ignoring");
    }
    result
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
