//! Bot configuration structs
//!
//! Loads configuration from environment variables (and a `.env` file when present).

use serde::Deserialize;
use std::env;
use std::str::FromStr;

/// Main bot configuration
#[derive(Debug, Clone, Deserialize)]
pub struct BotConfig {
    pub app: AppSettings,
    pub discord: DiscordConfig,
    pub shard: ShardConfig,
    pub cache: CacheConfig,
    pub gateway: GatewayTuning,
}

/// General application settings
#[derive(Debug, Clone, Deserialize)]
pub struct AppSettings {
    #[serde(default = "default_app_name")]
    pub name: String,
    #[serde(default)]
    pub env: Environment,
}

/// Environment type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl Environment {
    #[must_use]
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    #[must_use]
    pub fn is_development(&self) -> bool {
        matches!(self, Self::Development)
    }
}

/// Credentials and endpoints
#[derive(Clone, Deserialize)]
pub struct DiscordConfig {
    pub token: String,
    #[serde(default = "default_intents")]
    pub intents: u64,
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    /// Fixed gateway url; when unset the url is fetched over REST
    #[serde(default)]
    pub gateway_url: Option<String>,
}

impl std::fmt::Debug for DiscordConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscordConfig")
            .field("token", &"<redacted>")
            .field("intents", &self.intents)
            .field("api_base_url", &self.api_base_url)
            .field("gateway_url", &self.gateway_url)
            .finish()
    }
}

/// Shard identity sent in IDENTIFY
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct ShardConfig {
    #[serde(default)]
    pub id: u32,
    #[serde(default = "default_shard_count")]
    pub count: u32,
}

/// When the cache is written relative to listener invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CacheExecutionPolicy {
    /// Write before listeners start; listeners observe the new state
    #[default]
    First,
    /// Start listeners first; they observe the previous state
    Last,
}

/// Who performs cache writes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CachingDelegation {
    /// Built-in in-memory store, written automatically
    #[default]
    Default,
    /// Updates are handed to an external adapter
    External,
    /// No automatic writes; transformers may write themselves
    Transformers,
}

impl FromStr for CacheExecutionPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "first" => Ok(Self::First),
            "last" => Ok(Self::Last),
            other => Err(ConfigError::InvalidValue("CACHE_POLICY", other.to_string())),
        }
    }
}

impl FromStr for CachingDelegation {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "default" => Ok(Self::Default),
            "external" => Ok(Self::External),
            "transformers" => Ok(Self::Transformers),
            other => Err(ConfigError::InvalidValue("CACHE_DELEGATION", other.to_string())),
        }
    }
}

/// Cache configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
pub struct CacheConfig {
    #[serde(default)]
    pub policy: CacheExecutionPolicy,
    #[serde(default)]
    pub delegation: CachingDelegation,
}

/// Reconnect and backoff tuning
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayTuning {
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,
    #[serde(default = "default_max_reconnect_delay_ms")]
    pub max_reconnect_delay_ms: u64,
    #[serde(default = "default_invalid_session_min_ms")]
    pub invalid_session_min_ms: u64,
    #[serde(default = "default_invalid_session_max_ms")]
    pub invalid_session_max_ms: u64,
    /// Fetch a fresh gateway url before every non-resumable reconnect
    #[serde(default)]
    pub refetch_gateway_url: bool,
}

impl Default for GatewayTuning {
    fn default() -> Self {
        Self {
            reconnect_delay_ms: default_reconnect_delay_ms(),
            max_reconnect_delay_ms: default_max_reconnect_delay_ms(),
            invalid_session_min_ms: default_invalid_session_min_ms(),
            invalid_session_max_ms: default_invalid_session_max_ms(),
            refetch_gateway_url: false,
        }
    }
}

// Default value functions
fn default_app_name() -> String {
    "concord".to_string()
}

fn default_intents() -> u64 {
    513 // GUILDS | GUILD_MESSAGES
}

fn default_api_base_url() -> String {
    "https://discord.com/api/v10".to_string()
}

fn default_shard_count() -> u32 {
    1
}

fn default_reconnect_delay_ms() -> u64 {
    1_000
}

fn default_max_reconnect_delay_ms() -> u64 {
    60_000
}

fn default_invalid_session_min_ms() -> u64 {
    1_000
}

fn default_invalid_session_max_ms() -> u64 {
    5_000
}

impl BotConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    /// Returns an error if required environment variables are missing or malformed
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let parsed = |key: &'static str| -> Result<Option<u64>, ConfigError> {
            lookup(key)
                .map(|s| {
                    s.trim()
                        .parse()
                        .map_err(|_| ConfigError::InvalidValue(key, s.clone()))
                })
                .transpose()
        };

        let shard_id = parsed("SHARD_ID")?.unwrap_or(0);
        let shard_count = parsed("SHARD_COUNT")?.unwrap_or(u64::from(default_shard_count()));

        let shard = ShardConfig {
            id: u32::try_from(shard_id)
                .map_err(|_| ConfigError::InvalidValue("SHARD_ID", shard_id.to_string()))?,
            count: u32::try_from(shard_count)
                .map_err(|_| ConfigError::InvalidValue("SHARD_COUNT", shard_count.to_string()))?,
        };

        if shard.count == 0 || shard.id >= shard.count {
            return Err(ConfigError::InvalidValue(
                "SHARD_ID",
                format!("{} of {}", shard.id, shard.count),
            ));
        }

        Ok(Self {
            app: AppSettings {
                name: lookup("APP_NAME").unwrap_or_else(default_app_name),
                env: lookup("APP_ENV")
                    .and_then(|s| match s.to_lowercase().as_str() {
                        "production" => Some(Environment::Production),
                        "staging" => Some(Environment::Staging),
                        "development" => Some(Environment::Development),
                        _ => None,
                    })
                    .unwrap_or_default(),
            },
            discord: DiscordConfig {
                token: lookup("DISCORD_TOKEN")
                    .filter(|t| !t.trim().is_empty())
                    .ok_or(ConfigError::MissingVar("DISCORD_TOKEN"))?,
                intents: parsed("DISCORD_INTENTS")?.unwrap_or_else(default_intents),
                api_base_url: lookup("DISCORD_API_BASE_URL").unwrap_or_else(default_api_base_url),
                gateway_url: lookup("DISCORD_GATEWAY_URL"),
            },
            shard,
            cache: CacheConfig {
                policy: lookup("CACHE_POLICY")
                    .map(|s| s.parse::<CacheExecutionPolicy>())
                    .transpose()?
                    .unwrap_or_default(),
                delegation: lookup("CACHE_DELEGATION")
                    .map(|s| s.parse::<CachingDelegation>())
                    .transpose()?
                    .unwrap_or_default(),
            },
            gateway: GatewayTuning {
                reconnect_delay_ms: parsed("GATEWAY_RECONNECT_DELAY_MS")?
                    .unwrap_or_else(default_reconnect_delay_ms),
                max_reconnect_delay_ms: parsed("GATEWAY_MAX_RECONNECT_DELAY_MS")?
                    .unwrap_or_else(default_max_reconnect_delay_ms),
                invalid_session_min_ms: parsed("GATEWAY_INVALID_SESSION_MIN_MS")?
                    .unwrap_or_else(default_invalid_session_min_ms),
                invalid_session_max_ms: parsed("GATEWAY_INVALID_SESSION_MAX_MS")?
                    .unwrap_or_else(default_invalid_session_max_ms),
                refetch_gateway_url: lookup("GATEWAY_REFETCH_URL")
                    .is_some_and(|s| matches!(s.to_lowercase().as_str(), "1" | "true" | "yes")),
            },
        })
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(&'static str),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(&'static str, String),
}
