use std::{env, fmt, net::SocketAddr, time::Duration};

use talent_sync_core::ShortlistBasis;
use url::Url;

pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8080";
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000/";
pub const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 30;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

/// Application runtime environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
    Test,
}

impl Environment {
    fn from_str(value: &str) -> Result<Self, ConfigError> {
        match value {
            "development" | "dev" => Ok(Self::Development),
            "production" | "prod" => Ok(Self::Production),
            "test" => Ok(Self::Test),
            other => Err(ConfigError::InvalidEnvironment(other.to_string())),
        }
    }

    /// Returns `true` when the current environment should behave as development.
    pub fn is_development(self) -> bool {
        matches!(self, Self::Development)
    }

    /// Returns the canonical name used for logging/metrics labels.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Test => "test",
        }
    }
}

/// Knobs of the synchronization core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSettings {
    pub refresh_interval: Duration,
    pub request_timeout: Duration,
    pub shortlist_basis: ShortlistBasis,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            refresh_interval: Duration::from_secs(DEFAULT_REFRESH_INTERVAL_SECS),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            shortlist_basis: ShortlistBasis::default(),
        }
    }
}

/// Runtime configuration resolved from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub environment: Environment,
    pub api_base_url: Url,
    pub sync: SyncSettings,
}

impl AppConfig {
    /// Constructs the configuration by reading and validating environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let env_value = env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());
        let environment = Environment::from_str(&env_value)?;
        let bind_addr = bind_addr()?;
        let api_base_url = api_base_url()?;

        let refresh_secs = positive_secs("SYNC_REFRESH_INTERVAL_SECS", DEFAULT_REFRESH_INTERVAL_SECS)?;
        let timeout_secs = positive_secs("SYNC_REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS)?;
        let shortlist_basis = match env::var("SYNC_SHORTLIST_BASIS") {
            Ok(raw) => raw
                .trim()
                .parse::<ShortlistBasis>()
                .map_err(ConfigError::InvalidShortlistBasis)?,
            Err(_) => ShortlistBasis::default(),
        };

        Ok(Self {
            bind_addr,
            environment,
            api_base_url,
            sync: SyncSettings {
                refresh_interval: Duration::from_secs(refresh_secs),
                request_timeout: Duration::from_secs(timeout_secs),
                shortlist_basis,
            },
        })
    }
}

fn bind_addr() -> Result<SocketAddr, ConfigError> {
    env::var("APP_BIND_ADDR")
        .unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string())
        .parse()
        .map_err(ConfigError::BindAddress)
}

fn api_base_url() -> Result<Url, ConfigError> {
    let mut raw = env::var("RECRUIT_API_BASE_URL").unwrap_or_else(|_| DEFAULT_API_BASE_URL.to_string());
    // Relative joins drop the last path segment unless the base ends with a slash.
    if !raw.ends_with('/') {
        raw.push('/');
    }
    let url = Url::parse(&raw).map_err(|err| ConfigError::ApiBaseUrl(err.to_string()))?;
    if url.cannot_be_a_base() {
        return Err(ConfigError::ApiBaseUrl(format!("{raw} cannot be a base url")));
    }
    Ok(url)
}

fn positive_secs(name: &'static str, default: u64) -> Result<u64, ConfigError> {
    let Ok(raw) = env::var(name) else {
        return Ok(default);
    };
    match raw.trim().parse::<u64>() {
        Ok(0) | Err(_) => Err(ConfigError::InvalidDuration { name, value: raw }),
        Ok(secs) => Ok(secs),
    }
}

/// Errors that can occur during configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    InvalidEnvironment(String),
    BindAddress(std::net::AddrParseError),
    ApiBaseUrl(String),
    InvalidDuration { name: &'static str, value: String },
    InvalidShortlistBasis(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidEnvironment(value) => write!(
                f,
                "APP_ENV must be one of 'development', 'production', or 'test' (got {value})"
            ),
            Self::BindAddress(err) => write!(f, "invalid APP_BIND_ADDR value: {err}"),
            Self::ApiBaseUrl(err) => write!(f, "invalid RECRUIT_API_BASE_URL value: {err}"),
            Self::InvalidDuration { name, value } => {
                write!(f, "{name} must be a positive number of seconds (got {value})")
            }
            Self::InvalidShortlistBasis(value) => write!(
                f,
                "SYNC_SHORTLIST_BASIS must be 'match_rows' or 'people' (got {value})"
            ),
        }
    }
}

impl std::error::Error for ConfigError {}
