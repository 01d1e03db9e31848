use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub shutdown: ShutdownSettings,
    #[serde(default)]
    pub otel: OtelConfig,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Allowed CORS origins; empty allows any origin
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Capacity of each member's outbound queue
    #[serde(default = "default_outbox_capacity")]
    pub outbox_capacity: usize,
    /// Close a session after this many seconds without an inbound frame (0 = never)
    #[serde(default)]
    pub idle_timeout: u64,
}

impl SessionConfig {
    pub fn idle_timeout(&self) -> Option<Duration> {
        (self.idle_timeout > 0).then(|| Duration::from_secs(self.idle_timeout))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ShutdownSettings {
    /// Seconds to wait for sessions to deregister
    #[serde(default = "default_drain_timeout")]
    pub drain_timeout: u64,
    /// System message broadcast to every room before closing
    #[serde(default = "default_shutdown_reason")]
    pub reason: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OtelConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_otel_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_service_name")]
    pub service_name: String,
    #[serde(default = "default_sampling_ratio")]
    pub sampling_ratio: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    /// `pretty` or `json`
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl LogConfig {
    pub fn is_json(&self) -> bool {
        self.format.eq_ignore_ascii_case("json")
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8765
}

fn default_outbox_capacity() -> usize {
    256
}

fn default_drain_timeout() -> u64 {
    10
}

fn default_shutdown_reason() -> String {
    "Server is shutting down".to_string()
}

fn default_otel_endpoint() -> String {
    "http://localhost:4317".to_string()
}

fn default_service_name() -> String {
    "room-relay".to_string()
}

fn default_sampling_ratio() -> f64 {
    1.0
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        // Load .env file if exists
        let _ = dotenvy::dotenv();

        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let builder = Config::builder()
            .set_default("server.host", default_host())?
            .set_default("server.port", default_port() as i64)?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // SERVER__PORT, SESSION__IDLE_TIMEOUT, OTEL__ENABLED, LOG__FORMAT, ...
            .add_source(
                Environment::default()
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("server.cors_origins"),
            );

        builder.build()?.try_deserialize()
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: vec![],
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            outbox_capacity: default_outbox_capacity(),
            idle_timeout: 0,
        }
    }
}

impl Default for ShutdownSettings {
    fn default() -> Self {
        Self {
            drain_timeout: default_drain_timeout(),
            reason: default_shutdown_reason(),
        }
    }
}

impl Default for OtelConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: default_otel_endpoint(),
            service_name: default_service_name(),
            sampling_ratio: default_sampling_ratio(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            format: default_log_format(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let settings = Settings::default();
        assert_eq!(settings.server.host, "0.0.0.0");
        assert_eq!(settings.server.port, 8765);
        assert_eq!(settings.server_addr(), "0.0.0.0:8765");
        assert_eq!(settings.session.outbox_capacity, 256);
        assert_eq!(settings.shutdown.drain_timeout, 10);
        assert!(!settings.otel.enabled);
        assert!(!settings.log.is_json());
    }

    #[test]
    fn test_idle_timeout_disabled_by_zero() {
        let mut session = SessionConfig::default();
        assert_eq!(session.idle_timeout(), None);

        session.idle_timeout = 30;
        assert_eq!(session.idle_timeout(), Some(Duration::from_secs(30)));
    }
}
