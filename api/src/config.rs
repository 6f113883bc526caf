use std::time::Duration;

pub const DEFAULT_GENAI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_GENAI_MODEL: &str = "gemini-1.5-flash";
const DEFAULT_GENAI_TIMEOUT_SECS: u64 = 30;
const DEFAULT_STORE_TIMEOUT_SECS: u64 = 10;
const DEFAULT_SESSION_TTL_SECS: u64 = 3600;
const DEFAULT_POLL_INTERVAL_SECS: u64 = 10;
const DEFAULT_PORT: u16 = 3000;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("DATABASE_URL must be set when PORTAL_STORE=postgres")]
    MissingDatabaseUrl,
    #[error("unknown PORTAL_STORE '{0}', expected 'postgres' or 'memory'")]
    UnknownStore(String),
    #[error("{name} must be a positive integer, got '{value}'")]
    InvalidNumber { name: &'static str, value: String },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres { database_url: String },
    Memory,
}

/// Runtime settings, read once at startup from the environment.
#[derive(Clone, Debug)]
pub struct Settings {
    pub port: u16,
    pub store: StoreBackend,
    pub genai_api_key: Option<String>,
    pub genai_model: String,
    pub genai_base_url: String,
    pub genai_timeout: Duration,
    pub store_timeout: Duration,
    pub session_ttl: Duration,
    /// How often readers are told to re-poll `/v1/solutions`. A newly
    /// registered solution can stay invisible to other sessions this long.
    pub poll_interval: Duration,
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build settings from any variable source (the process environment in
    /// production, a map in tests).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let non_empty = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let seconds = |name: &'static str, default: u64| -> Result<Duration, ConfigError> {
            match non_empty(name) {
                None => Ok(Duration::from_secs(default)),
                Some(raw) => raw
                    .parse::<u64>()
                    .ok()
                    .filter(|v| *v > 0)
                    .map(Duration::from_secs)
                    .ok_or(ConfigError::InvalidNumber { name, value: raw }),
            }
        };

        let port = match non_empty("PORT") {
            None => DEFAULT_PORT,
            Some(raw) => raw.parse().map_err(|_| ConfigError::InvalidNumber {
                name: "PORT",
                value: raw,
            })?,
        };

        let store = match non_empty("PORTAL_STORE")
            .unwrap_or_else(|| "postgres".to_string())
            .to_lowercase()
            .as_str()
        {
            "postgres" => StoreBackend::Postgres {
                database_url: non_empty("DATABASE_URL").ok_or(ConfigError::MissingDatabaseUrl)?,
            },
            "memory" => StoreBackend::Memory,
            other => return Err(ConfigError::UnknownStore(other.to_string())),
        };

        Ok(Self {
            port,
            store,
            genai_api_key: non_empty("PORTAL_GENAI_API_KEY"),
            genai_model: non_empty("PORTAL_GENAI_MODEL")
                .unwrap_or_else(|| DEFAULT_GENAI_MODEL.to_string()),
            genai_base_url: non_empty("PORTAL_GENAI_BASE_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_GENAI_BASE_URL.to_string()),
            genai_timeout: seconds("PORTAL_GENAI_TIMEOUT_SECS", DEFAULT_GENAI_TIMEOUT_SECS)?,
            store_timeout: seconds("PORTAL_STORE_TIMEOUT_SECS", DEFAULT_STORE_TIMEOUT_SECS)?,
            session_ttl: seconds("PORTAL_SESSION_TTL_SECS", DEFAULT_SESSION_TTL_SECS)?,
            poll_interval: seconds("PORTAL_POLL_INTERVAL_SECS", DEFAULT_POLL_INTERVAL_SECS)?,
        })
    }

    /// Settings for tests: in-memory store, no generative API key.
    #[cfg(test)]
    pub fn for_tests() -> Self {
        Self {
            port: DEFAULT_PORT,
            store: StoreBackend::Memory,
            genai_api_key: None,
            genai_model: DEFAULT_GENAI_MODEL.to_string(),
            genai_base_url: DEFAULT_GENAI_BASE_URL.to_string(),
            genai_timeout: Duration::from_secs(DEFAULT_GENAI_TIMEOUT_SECS),
            store_timeout: Duration::from_secs(DEFAULT_STORE_TIMEOUT_SECS),
            session_ttl: Duration::from_secs(DEFAULT_SESSION_TTL_SECS),
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
        }
    }
}
