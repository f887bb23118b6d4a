//! Environment-driven startup configuration.

use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub tcp_ports: Vec<u16>,
    pub http_bind: String,
    pub menuicon_image: String,
    pub menuicon_url: String,
    pub debug: bool,
    pub ping_interval: Duration,
    pub timeout: Duration,
}

impl Config {
    pub fn from_env() -> Self {
        let tcp_ports = env::var("PORTS")
            .unwrap_or_else(|_| "13381".to_owned())
            .split(',')
            .filter_map(|part| part.trim().parse::<u16>().ok())
            .collect::<Vec<_>>();
        let tcp_ports = if tcp_ports.is_empty() {
            vec![13381]
        } else {
            tcp_ports
        };

        let ping_interval = env::var("PING_INTERVAL")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(10);
        let timeout = env::var("TIMEOUT")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(45);

        Self {
            tcp_ports,
            http_bind: env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_owned()),
            menuicon_image: env::var("MENUICON_IMAGE").unwrap_or_default(),
            menuicon_url: env::var("MENUICON_URL").unwrap_or_default(),
            debug: env::var("DEBUG").map(|v| v == "1" || v.eq_ignore_ascii_case("true")).unwrap_or(false),
            ping_interval: Duration::from_secs(ping_interval),
            timeout: Duration::from_secs(timeout),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_comma_separated_port_list() {
        std::env::set_var("PORTS", "13381,13382, 13383");
        let config = Config::from_env();
        assert_eq!(config.tcp_ports, vec![13381, 13382, 13383]);
        std::env::remove_var("PORTS");
    }

    #[test]
    fn falls_back_to_the_default_port_when_unset() {
        std::env::remove_var("PORTS");
        let config = Config::from_env();
        assert_eq!(config.tcp_ports, vec![13381]);
    }
}
