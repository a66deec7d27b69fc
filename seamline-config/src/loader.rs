use thiserror::Error;

use crate::models::{
    Config, ConfigMetadata, CorsConfig, DatabaseConfig, IngestConfig, ServerConfig,
    DEFAULT_IDLE_TIMEOUT_SECS, DEFAULT_SERVER_HOST, DEFAULT_SERVER_PORT,
};

#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}

#[derive(Debug, Clone)]
pub struct ConfigWarning {
    pub message: String,
    pub hint: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ConfigWarnings {
    pub items: Vec<ConfigWarning>,
}

impl ConfigWarnings {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn push(&mut self, message: impl Into<String>, hint: Option<&str>) {
        self.items.push(ConfigWarning {
            message: message.into(),
            hint: hint.map(str::to_string),
        });
    }
}

#[derive(Debug)]
pub struct ConfigLoad {
    pub config: Config,
    pub warnings: ConfigWarnings,
}

/// Environment-first configuration loader. Unparseable numeric values
/// fall back to their defaults with a warning rather than failing
/// startup; only a structurally unusable environment is an error.
#[derive(Debug, Default)]
pub struct ConfigLoader;

impl ConfigLoader {
    pub fn new() -> Self {
        Self
    }

    pub fn load(&self) -> Result<ConfigLoad, ConfigLoadError> {
        let env_file_loaded = dotenvy::dotenv().is_ok();
        let mut load = self.load_from(|key| std::env::var(key).ok())?;
        load.config.metadata.env_file_loaded = env_file_loaded;
        Ok(load)
    }

    /// Loader core over an arbitrary variable source, so tests can pass a
    /// closure instead of mutating the process environment.
    pub fn load_from<F>(&self, get: F) -> Result<ConfigLoad, ConfigLoadError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut warnings = ConfigWarnings::default();

        let host = get("SERVER_HOST")
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_SERVER_HOST.to_string());

        let port = match get("SERVER_PORT") {
            Some(raw) => match raw.trim().parse::<u16>() {
                Ok(port) => port,
                Err(_) => {
                    warnings.push(
                        format!("SERVER_PORT {raw:?} is not a valid port, using {DEFAULT_SERVER_PORT}"),
                        Some("ports are integers in 1..=65535"),
                    );
                    DEFAULT_SERVER_PORT
                }
            },
            None => DEFAULT_SERVER_PORT,
        };

        let database_url = get("DATABASE_URL").filter(|value| !value.trim().is_empty());
        if database_url.is_none() {
            warnings.push(
                "DATABASE_URL is not set",
                Some("the server requires a PostgreSQL connection URL to start"),
            );
        }

        let idle_timeout_secs = match get("INGEST_IDLE_TIMEOUT_SECS") {
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(secs) => secs,
                Err(_) => {
                    warnings.push(
                        format!(
                            "INGEST_IDLE_TIMEOUT_SECS {raw:?} is not a number, using {DEFAULT_IDLE_TIMEOUT_SECS}"
                        ),
                        None,
                    );
                    DEFAULT_IDLE_TIMEOUT_SECS
                }
            },
            None => DEFAULT_IDLE_TIMEOUT_SECS,
        };
        if idle_timeout_secs == 0 {
            warnings.push(
                "device idle timeout disabled; stalled connections will only be cleaned up on transport errors",
                Some("set INGEST_IDLE_TIMEOUT_SECS to a positive value to re-enable"),
            );
        }

        let allowed_origins = match get("CORS_ALLOWED_ORIGINS") {
            Some(raw) if !raw.trim().is_empty() => raw
                .split(',')
                .map(|origin| origin.trim().to_string())
                .filter(|origin| !origin.is_empty())
                .collect(),
            _ => vec!["*".to_string()],
        };

        Ok(ConfigLoad {
            config: Config {
                server: ServerConfig { host, port },
                database: DatabaseConfig { url: database_url },
                ingest: IngestConfig { idle_timeout_secs },
                cors: CorsConfig { allowed_origins },
                metadata: ConfigMetadata::default(),
            },
            warnings,
        })
    }
}
