//! Load sim config from file and environment.

use serde::Deserialize;
use std::path::PathBuf;

/// Demo driver configuration. File: ./aus1-sim.toml.
/// Env overrides: AUS1_PAYLOAD_SIZE, AUS1_TIMEOUT_MS.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Payload size served by the demo peripheral, in bytes (default 1000).
    /// Must fit the stream header's 16-bit size field.
    #[serde(default = "default_payload_size")]
    pub payload_size: u16,
    /// Controller timeout period in milliseconds (default 250).
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_payload_size() -> u16 {
    1000
}
fn default_timeout_ms() -> u64 {
    250
}

impl Default for Config {
    fn default() -> Self {
        Self {
            payload_size: default_payload_size(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

/// Load config: default, then config file (if present), then env vars.
pub fn load() -> Config {
    let mut c = load_file().unwrap_or_default();
    if let Ok(s) = std::env::var("AUS1_PAYLOAD_SIZE") {
        if let Ok(n) = s.parse::<u16>() {
            c.payload_size = n;
        }
    }
    if let Ok(s) = std::env::var("AUS1_TIMEOUT_MS") {
        if let Ok(n) = s.parse::<u64>() {
            c.timeout_ms = n;
        }
    }
    c
}

fn load_file() -> Option<Config> {
    let path = PathBuf::from("aus1-sim.toml");
    if !path.exists() {
        return None;
    }
    let s = std::fs::read_to_string(&path).ok()?;
    toml::from_str::<Config>(&s).ok()
}
