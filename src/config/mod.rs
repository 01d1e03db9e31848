mod settings;

pub use settings::{LogConfig, OtelConfig, ServerConfig, SessionConfig, Settings, ShutdownSettings};
