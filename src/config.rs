//! Kernel configuration loading.
//!
//! TOML is the sole config source. Every field has a sensible default, so
//! an empty document is a valid (if minimal) configuration — unlike the
//! connection target, which callers supply separately when constructing a
//! [`crate::session::Session`].

use std::path::Path;

use serde::Deserialize;

use crate::error::ConfigError;

#[derive(Debug, Clone)]
pub struct KernelConfig {
    /// Default per-request reply timeout, seconds. Overridable per call.
    pub request_timeout_s: f64,
    pub keepalive: KeepaliveConfig,
}

#[derive(Debug, Clone)]
pub struct KeepaliveConfig {
    pub enabled: bool,
    pub interval_s: f64,
    pub timeout_s: f64,
    pub max_missed: u32,
}

impl Default for KernelConfig {
    fn default() -> Self {
        KernelConfig {
            request_timeout_s: 10.0,
            keepalive: KeepaliveConfig { enabled: true, interval_s: 30.0, timeout_s: 10.0, max_missed: 3 },
        }
    }
}

#[derive(Debug, Deserialize, Default)]
struct RawConfig {
    request_timeout_s: Option<f64>,
    keepalive: Option<RawKeepaliveConfig>,
}

#[derive(Debug, Deserialize, Default)]
struct RawKeepaliveConfig {
    enabled: Option<bool>,
    interval_s: Option<f64>,
    timeout_s: Option<f64>,
    max_missed: Option<u32>,
}

pub fn load_from_path(path: &Path) -> Result<KernelConfig, ConfigError> {
    let toml_str = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::Io(format!("reading config file '{}': {e}", path.display())))?;
    load_from_str(&toml_str)
}

pub fn load_from_str(toml_str: &str) -> Result<KernelConfig, ConfigError> {
    let raw: RawConfig = toml::from_str(toml_str).map_err(|e| ConfigError::Parse(e.to_string()))?;
    let defaults = KernelConfig::default();

    let request_timeout_s = raw.request_timeout_s.unwrap_or(defaults.request_timeout_s);
    if request_timeout_s <= 0.0 {
        return Err(ConfigError::InvalidValue(format!("request_timeout_s must be positive, got {request_timeout_s}")));
    }

    let keepalive = match raw.keepalive {
        Some(k) => {
            let interval_s = k.interval_s.unwrap_or(defaults.keepalive.interval_s);
            let timeout_s = k.timeout_s.unwrap_or(defaults.keepalive.timeout_s);
            let max_missed = k.max_missed.unwrap_or(defaults.keepalive.max_missed);
            if interval_s <= 0.0 {
                return Err(ConfigError::InvalidValue(format!("keepalive.interval_s must be positive, got {interval_s}")));
            }
            if max_missed == 0 {
                return Err(ConfigError::InvalidValue("keepalive.max_missed must be at least 1".to_string()));
            }
            KeepaliveConfig { enabled: k.enabled.unwrap_or(defaults.keepalive.enabled), interval_s, timeout_s, max_missed }
        }
        None => defaults.keepalive,
    };

    Ok(KernelConfig { request_timeout_s, keepalive })
}
