// Server configuration loaded from environment variables.
// Decision: Plain environment variables (optionally from .env), no config files
// Decision: Defaults run a local server with no setup at all

use anyhow::{bail, Context, Result};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use agenda_core::reminders::DEFAULT_SCAN_INTERVAL;

pub const DEFAULT_EVENTS_FILE: &str = "events.json";
pub const DEFAULT_HTTP_ADDR: &str = "0.0.0.0:5000";

/// Complete server configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    /// Where the event store is persisted
    pub events_file: PathBuf,
    /// HTTP listen address
    pub http_addr: SocketAddr,
    /// Time between reminder scans
    pub reminder_interval: Duration,
    /// Abort startup on a corrupt store file instead of quarantining it
    pub strict_load: bool,
    /// Prefix for the event routes (e.g. "/api"); empty for none
    pub api_prefix: String,
    /// Allowed CORS origins; CORS is disabled when empty
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            events_file: PathBuf::from(DEFAULT_EVENTS_FILE),
            http_addr: DEFAULT_HTTP_ADDR
                .parse()
                .unwrap_or_else(|_| SocketAddr::from(([0, 0, 0, 0], 5000))),
            reminder_interval: DEFAULT_SCAN_INTERVAL,
            strict_load: false,
            api_prefix: String::new(),
            cors_origins: Vec::new(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from the process environment.
    ///
    /// Environment variables:
    /// - `EVENTS_FILE`: store path (default: "events.json")
    /// - `HTTP_ADDR`: listen address (default: "0.0.0.0:5000")
    /// - `REMINDER_INTERVAL_SECS`: seconds between reminder scans (default: 60)
    /// - `EVENTS_STRICT_LOAD`: "true" to refuse starting on a corrupt store
    /// - `API_PREFIX`: route prefix, e.g. "/api"
    /// - `CORS_ALLOWED_ORIGINS`: comma-separated origins
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let events_file = get("EVENTS_FILE")
            .map(PathBuf::from)
            .unwrap_or(defaults.events_file);

        let http_addr = match get("HTTP_ADDR") {
            Some(addr) => addr
                .trim()
                .parse()
                .with_context(|| format!("HTTP_ADDR is not a socket address: {addr}"))?,
            None => defaults.http_addr,
        };

        let reminder_interval = match get("REMINDER_INTERVAL_SECS") {
            Some(secs) => {
                let secs: u64 = secs
                    .trim()
                    .parse()
                    .with_context(|| format!("REMINDER_INTERVAL_SECS is not a number: {secs}"))?;
                if secs == 0 {
                    bail!("REMINDER_INTERVAL_SECS must be greater than zero");
                }
                Duration::from_secs(secs)
            }
            None => defaults.reminder_interval,
        };

        let strict_load = get("EVENTS_STRICT_LOAD")
            .map(|v| matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(defaults.strict_load);

        let api_prefix = get("API_PREFIX")
            .map(|p| normalize_prefix(&p))
            .unwrap_or(defaults.api_prefix);

        let cors_origins = get("CORS_ALLOWED_ORIGINS")
            .map(|s| {
                s.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or(defaults.cors_origins);

        Ok(Self {
            events_file,
            http_addr,
            reminder_interval,
            strict_load,
            api_prefix,
            cors_origins,
        })
    }
}

/// "/api/" and "api" both become "/api"; "/" becomes empty.
fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{trimmed}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> Result<ServerConfig> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServerConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config, ServerConfig::default());
        assert_eq!(config.events_file, PathBuf::from("events.json"));
        assert_eq!(config.http_addr.port(), 5000);
        assert_eq!(config.reminder_interval, Duration::from_secs(60));
        assert!(!config.strict_load);
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("EVENTS_FILE", "/var/lib/agenda/events.json"),
            ("HTTP_ADDR", "127.0.0.1:8080"),
            ("REMINDER_INTERVAL_SECS", "15"),
            ("EVENTS_STRICT_LOAD", "TRUE"),
            ("API_PREFIX", "api/"),
            ("CORS_ALLOWED_ORIGINS", "https://a.example, https://b.example,"),
        ])
        .unwrap();

        assert_eq!(config.events_file, PathBuf::from("/var/lib/agenda/events.json"));
        assert_eq!(config.http_addr, "127.0.0.1:8080".parse().unwrap());
        assert_eq!(config.reminder_interval, Duration::from_secs(15));
        assert!(config.strict_load);
        assert_eq!(config.api_prefix, "/api");
        assert_eq!(
            config.cors_origins,
            vec!["https://a.example".to_string(), "https://b.example".to_string()]
        );
    }

    #[test]
    fn test_blank_values_use_defaults() {
        let config = config_from(&[("EVENTS_FILE", "  "), ("API_PREFIX", "")]).unwrap();
        assert_eq!(config.events_file, PathBuf::from("events.json"));
        assert_eq!(config.api_prefix, "");
    }

    #[test]
    fn test_invalid_values_are_errors() {
        assert!(config_from(&[("HTTP_ADDR", "localhost")]).is_err());
        assert!(config_from(&[("REMINDER_INTERVAL_SECS", "soon")]).is_err());
        assert!(config_from(&[("REMINDER_INTERVAL_SECS", "0")]).is_err());
    }

    #[test]
    fn test_normalize_prefix() {
        assert_eq!(normalize_prefix("/api"), "/api");
        assert_eq!(normalize_prefix("/api/"), "/api");
        assert_eq!(normalize_prefix("/"), "");
    }
}
