//! Environment-driven settings for the dashboard sync service.

pub mod config;

pub use config::{AppConfig, ConfigError, Environment, SyncSettings};

/// Reads `.env` into the process environment. A missing file is not an error.
pub fn load_env_file() {
    let _ = dotenvy::dotenv();
}

#[cfg(test)]
pub(crate) static ENV_GUARD: std::sync::LazyLock<std::sync::Mutex<()>> =
    std::sync::LazyLock::new(|| std::sync::Mutex::new(()));
