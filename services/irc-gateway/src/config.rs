//! Environment-driven startup configuration.

use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub ping_interval_secs: u64,
    pub timeout_secs: u64,
}

impl Config {
    pub fn from_env() -> Self {
        let port = env::var("IRC_PORT").unwrap_or_else(|_| "6667".to_owned());
        let ping_interval_secs = env::var("PING_INTERVAL")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(10);
        let timeout_secs = env::var("TIMEOUT").ok().and_then(|v| v.parse().ok()).unwrap_or(45);
        Self {
            bind_addr: format!("0.0.0.0:{port}"),
            ping_interval_secs,
            timeout_secs,
        }
    }
}
