mod settings;

pub use settings::{LogFormat, QueueSettings, ServerConfig, Settings, TelemetryConfig};
