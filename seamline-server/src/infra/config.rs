pub use seamline_config::{
    Config, ConfigLoad, ConfigLoadError, ConfigLoader, ConfigMetadata, ConfigWarning,
    ConfigWarnings, CorsConfig, DatabaseConfig, IngestConfig, ServerConfig,
};
