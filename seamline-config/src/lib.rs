//! Shared configuration library for Seamline.
//!
//! Centralizes config loading and validation so the server binary and the
//! test suites share a single source of truth for defaults and warning
//! rules. Configuration is environment-first: a `.env` file is honored
//! when present, and every knob has a working default except the database
//! URL, which the server requires at startup.

pub mod loader;
pub mod models;

pub use loader::{ConfigLoad, ConfigLoadError, ConfigLoader, ConfigWarning, ConfigWarnings};
pub use models::{
    Config, ConfigMetadata, CorsConfig, DatabaseConfig, IngestConfig, ServerConfig,
};
