//! Configuration for the Graphline server.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{GraphlineError, GraphlineResult};

/// Top-level server configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    /// Enables debug-level logging.
    pub debug: bool,
    pub session: SessionConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".into(),
            port: 12345,
            debug: false,
            session: SessionConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from a TOML file, with environment variable overrides.
    ///
    /// Environment variables use the `GRAPHLINE_` prefix, e.g.
    /// `GRAPHLINE_PORT=12346`.
    pub fn load(path: Option<&Path>) -> GraphlineResult<Self> {
        let mut config = match path {
            Some(path) => {
                let contents = std::fs::read_to_string(path).map_err(|e| {
                    GraphlineError::InvalidConfig(format!(
                        "failed to read config file '{}': {e}",
                        path.display()
                    ))
                })?;
                Self::from_toml(&contents)?
            }
            None => ServerConfig::default(),
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(contents: &str) -> GraphlineResult<Self> {
        toml::from_str::<ServerConfig>(contents)
            .map_err(|e| GraphlineError::InvalidConfig(format!("failed to parse config: {e}")))
    }

    /// The `host:port` string to listen on.
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("GRAPHLINE_BIND_ADDRESS") {
            self.bind_address = v;
        }
        if let Ok(v) = std::env::var("GRAPHLINE_PORT") {
            if let Ok(port) = v.parse() {
                self.port = port;
            }
        }
        if let Ok(v) = std::env::var("GRAPHLINE_DEBUG") {
            if let Ok(b) = v.parse() {
                self.debug = b;
            }
        }
        if let Ok(v) = std::env::var("GRAPHLINE_IDLE_TIMEOUT_MS") {
            if let Ok(ms) = v.parse() {
                self.session.idle_timeout_ms = ms;
            }
        }
    }

    pub fn validate(&self) -> GraphlineResult<()> {
        if self.port == 0 {
            return Err(GraphlineError::InvalidConfig("port must be > 0".into()));
        }
        self.session.validate()
    }
}

/// Per-connection limits.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Silence after which the watchdog closes the connection.
    pub idle_timeout_ms: u64,
    /// How often the watchdog checks for idleness.
    pub watchdog_interval_ms: u64,
    /// Longest accepted line, in bytes.
    pub max_line_length: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_timeout_ms: 30_000,
            watchdog_interval_ms: 1_000,
            max_line_length: 8 * 1024,
        }
    }
}

impl SessionConfig {
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }

    pub fn watchdog_interval(&self) -> Duration {
        Duration::from_millis(self.watchdog_interval_ms)
    }

    pub fn validate(&self) -> GraphlineResult<()> {
        if self.idle_timeout_ms == 0 {
            return Err(GraphlineError::InvalidConfig(
                "session.idle_timeout_ms must be > 0".into(),
            ));
        }
        if self.watchdog_interval_ms == 0 || self.watchdog_interval_ms > self.idle_timeout_ms {
            return Err(GraphlineError::InvalidConfig(
                "session.watchdog_interval_ms must be > 0 and <= idle_timeout_ms".into(),
            ));
        }
        if self.max_line_length == 0 {
            return Err(GraphlineError::InvalidConfig(
                "session.max_line_length must be > 0".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.port, 12345);
        assert!(!config.debug);
        assert_eq!(config.session.idle_timeout(), Duration::from_secs(30));
        assert_eq!(config.session.watchdog_interval(), Duration::from_secs(1));
        assert_eq!(config.listen_addr(), "0.0.0.0:12345");
        config.validate().unwrap();
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = ServerConfig::from_toml(
            r#"
            port = 4000
            debug = true

            [session]
            idle_timeout_ms = 5000
            "#,
        )
        .unwrap();
        assert_eq!(config.port, 4000);
        assert!(config.debug);
        assert_eq!(config.bind_address, "0.0.0.0");
        assert_eq!(config.session.idle_timeout_ms, 5000);
        assert_eq!(config.session.watchdog_interval_ms, 1000);
    }

    #[test]
    fn test_invalid_toml() {
        let err = ServerConfig::from_toml("port = \"many\"").unwrap_err();
        assert!(matches!(err, GraphlineError::InvalidConfig(_)));
    }

    #[test]
    fn test_validation() {
        let mut config = ServerConfig::default();
        config.port = 0;
        assert!(config.validate().is_err());

        let mut config = ServerConfig::default();
        config.session.watchdog_interval_ms = 60_000;
        assert!(config.validate().is_err());

        let mut config = ServerConfig::default();
        config.session.idle_timeout_ms = 0;
        assert!(config.validate().is_err());

        let mut config = ServerConfig::default();
        config.session.max_line_length = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_file() {
        let err = ServerConfig::load(Some(Path::new("/nonexistent/graphline.toml"))).unwrap_err();
        assert!(err.to_string().contains("failed to read config file"));
    }
}
