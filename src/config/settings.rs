use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub queue: QueueSettings,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QueueSettings {
    /// Minimum message age before delivery, in milliseconds
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,
    /// How often the background sweep purges expired transients
    #[serde(default = "default_purge_interval_ms")]
    pub purge_interval_ms: u64,
    /// Window used by the stats endpoint when none is given
    #[serde(default = "default_peak_window_ms")]
    pub default_peak_window_ms: u64,
    /// Upper bound on live channels; publishing to a new channel past it fails
    #[serde(default = "default_max_channels")]
    pub max_channels: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct TelemetryConfig {
    #[serde(default)]
    pub log_format: LogFormat,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8090
}

fn default_delay_ms() -> u64 {
    1000 // 1 second
}

fn default_purge_interval_ms() -> u64 {
    1000
}

fn default_peak_window_ms() -> u64 {
    1000
}

fn default_max_channels() -> usize {
    10_000
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        // Load .env file if exists
        let _ = dotenvy::dotenv();

        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let builder = Config::builder()
            .set_default("server.host", default_host())?
            .set_default("server.port", default_port() as i64)?
            .set_default("queue.delay_ms", default_delay_ms() as i64)?
            .set_default("queue.purge_interval_ms", default_purge_interval_ms() as i64)?
            .set_default("queue.default_peak_window_ms", default_peak_window_ms() as i64)?
            .set_default("queue.max_channels", default_max_channels() as i64)?
            .set_default("telemetry.log_format", "pretty")?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // SERVER__PORT, QUEUE__DELAY_MS, TELEMETRY__LOG_FORMAT, etc.
            .add_source(
                Environment::default()
                    .separator("__")
                    .try_parsing(true),
            );

        let settings: Settings = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reject values that would make background tasks spin
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.queue.purge_interval_ms == 0 {
            return Err(ConfigError::Message(
                "queue.purge_interval_ms must be greater than zero".to_string(),
            ));
        }
        if self.queue.max_channels == 0 {
            return Err(ConfigError::Message(
                "queue.max_channels must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl QueueSettings {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    pub fn purge_interval(&self) -> Duration {
        Duration::from_millis(self.purge_interval_ms)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            delay_ms: default_delay_ms(),
            purge_interval_ms: default_purge_interval_ms(),
            default_peak_window_ms: default_peak_window_ms(),
            max_channels: default_max_channels(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let server = ServerConfig::default();
        assert_eq!(server.host, "0.0.0.0");
        assert_eq!(server.port, 8090);

        let queue = QueueSettings::default();
        assert_eq!(queue.delay(), Duration::from_secs(1));
        assert_eq!(queue.purge_interval(), Duration::from_secs(1));
        assert_eq!(queue.default_peak_window_ms, 1000);
        assert_eq!(queue.max_channels, 10_000);
    }

    #[test]
    fn test_deserialize_partial_config() {
        let settings: Settings = Config::builder()
            .set_override("queue.delay_ms", 40)
            .unwrap()
            .set_override("telemetry.log_format", "json")
            .unwrap()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(settings.queue.delay_ms, 40);
        assert_eq!(settings.queue.purge_interval_ms, 1000);
        assert_eq!(settings.telemetry.log_format, LogFormat::Json);
        assert_eq!(settings.server_addr(), "0.0.0.0:8090");
    }

    #[test]
    fn test_zero_purge_interval_rejected() {
        let settings = Settings {
            server: ServerConfig::default(),
            queue: QueueSettings {
                purge_interval_ms: 0,
                ..Default::default()
            },
            telemetry: TelemetryConfig::default(),
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_zero_max_channels_rejected() {
        let settings = Settings {
            server: ServerConfig::default(),
            queue: QueueSettings {
                max_channels: 0,
                ..Default::default()
            },
            telemetry: TelemetryConfig::default(),
        };
        assert!(settings.validate().is_err());
    }
}
