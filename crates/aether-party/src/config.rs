//! Environment-driven server configuration (§6.2), grounded on
//! `original_source/server/config.py`'s `ServerConfig` dataclass.

use std::time::Duration;

/// Typed configuration surface, loaded once at startup via
/// [`ServerConfig::from_env`]. Every field has a default matching the
/// original's dataclass so an empty environment still boots.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,

    pub heartbeat_interval: Duration,
    pub heartbeat_timeout: Duration,

    pub jwt_secret: String,
    pub jwt_expire_hours: u64,

    pub max_connections: usize,
    pub max_rooms: usize,
    pub room_idle_timeout: Duration,

    pub match_timeout: Duration,
    pub match_check_interval: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8765,
            heartbeat_interval: Duration::from_secs(20),
            heartbeat_timeout: Duration::from_secs(60),
            jwt_secret: "change-me-in-production".to_string(),
            jwt_expire_hours: 24,
            max_connections: 10_000,
            max_rooms: 1_000,
            room_idle_timeout: Duration::from_secs(300),
            match_timeout: Duration::from_secs(60),
            match_check_interval: Duration::from_secs(1),
        }
    }
}

impl ServerConfig {
    /// Reads every recognized environment variable, falling back to the
    /// default for anything unset or unparsable (§6.2).
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: env_string("AETHER_HOST", defaults.host),
            port: env_parse("AETHER_PORT", defaults.port),
            heartbeat_interval: env_secs("AETHER_HEARTBEAT_INTERVAL", defaults.heartbeat_interval),
            heartbeat_timeout: env_secs("AETHER_HEARTBEAT_TIMEOUT", defaults.heartbeat_timeout),
            jwt_secret: env_string("AETHER_JWT_SECRET", defaults.jwt_secret),
            jwt_expire_hours: env_parse("AETHER_JWT_EXPIRE_HOURS", defaults.jwt_expire_hours),
            max_connections: env_parse("AETHER_MAX_CONNECTIONS", defaults.max_connections),
            max_rooms: env_parse("AETHER_MAX_ROOMS", defaults.max_rooms),
            room_idle_timeout: env_secs("AETHER_ROOM_IDLE_TIMEOUT", defaults.room_idle_timeout),
            match_timeout: env_secs("AETHER_MATCH_TIMEOUT", defaults.match_timeout),
            match_check_interval: env_secs(
                "AETHER_MATCH_CHECK_INTERVAL",
                defaults.match_check_interval,
            ),
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn env_string(key: &str, default: String) -> String {
    std::env::var(key).unwrap_or(default)
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_secs(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_spec_port_and_timeouts() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.port, 8765);
        assert_eq!(cfg.match_check_interval, Duration::from_secs(1));
    }

    #[test]
    fn test_bind_addr_formats_host_and_port() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.bind_addr(), "0.0.0.0:8765");
    }
}
