//! Minimal runtime configuration helpers.
//! Credentials come from the environment; nothing is read from disk.

use std::time::Duration;

pub const DEFAULT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 60;

#[derive(Debug, Clone)]
pub struct Config {
    /// API key issued for the Mill open API account.
    pub access_key: String,
    pub secret_token: String,
    pub username: String,
    pub password: String,
    /// Per-request network timeout.
    pub request_timeout: Duration,
    /// Heater polling cadence of the binary's read loop.
    pub poll_interval: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        let access_key = require("MILL_ACCESS_KEY")?;
        let secret_token = require("MILL_SECRET_TOKEN")?;
        let username = require("MILL_USERNAME")?;
        let password = require("MILL_PASSWORD")?;

        let request_timeout = secs_var("MILL_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS);
        let poll_interval = secs_var("MILL_POLL_INTERVAL_SECS", DEFAULT_POLL_INTERVAL_SECS);

        Ok(Config {
            access_key,
            secret_token,
            username,
            password,
            request_timeout,
            poll_interval,
        })
    }
}

fn require(name: &str) -> Result<String, String> {
    match std::env::var(name) {
        Ok(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(format!("Missing required environment variable {}", name)),
    }
}

fn secs_var(name: &str, default: u64) -> Duration {
    let secs = std::env::var(name)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(default);
    Duration::from_secs(secs)
}
