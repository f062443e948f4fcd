//! Gateway client configuration

use std::time::Duration;

use concord_common::{BotConfig, CacheConfig};

use crate::protocol::{IdentifyProperties, Intents};

/// Runtime configuration of the gateway client
#[derive(Clone)]
pub struct GatewayConfig {
    pub token: String,
    pub intents: Intents,
    pub properties: IdentifyProperties,
    /// Shard used by `Client::run`
    pub shard_id: u32,
    pub shard_count: u32,
    pub api_base_url: String,
    /// Fixed gateway url; fetched over REST when unset
    pub gateway_url: Option<String>,
    /// Base delay of the connect backoff
    pub reconnect_delay: Duration,
    /// Cap of the connect backoff
    pub max_reconnect_delay: Duration,
    /// Window the INVALID_SESSION backoff is drawn from
    pub invalid_session_delay: (Duration, Duration),
    /// Fetch a fresh gateway url before non-resumable reconnects
    pub refetch_gateway_url: bool,
    pub cache: CacheConfig,
}

impl GatewayConfig {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            intents: Intents::default(),
            properties: IdentifyProperties::default(),
            shard_id: 0,
            shard_count: 1,
            api_base_url: "https://discord.com/api/v10".to_string(),
            gateway_url: None,
            reconnect_delay: Duration::from_secs(1),
            max_reconnect_delay: Duration::from_secs(60),
            invalid_session_delay: (Duration::from_secs(1), Duration::from_secs(5)),
            refetch_gateway_url: false,
            cache: CacheConfig::default(),
        }
    }

    pub fn with_intents(mut self, intents: Intents) -> Self {
        self.intents = intents;
        self
    }

    pub fn with_shard(mut self, shard_id: u32, shard_count: u32) -> Self {
        self.shard_id = shard_id;
        self.shard_count = shard_count;
        self
    }

    pub fn with_gateway_url(mut self, url: impl Into<String>) -> Self {
        self.gateway_url = Some(url.into());
        self
    }

    pub fn with_cache(mut self, cache: CacheConfig) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_reconnect_delay(mut self, base: Duration, max: Duration) -> Self {
        self.reconnect_delay = base;
        self.max_reconnect_delay = max.max(base);
        self
    }

    pub fn with_invalid_session_delay(mut self, min: Duration, max: Duration) -> Self {
        self.invalid_session_delay = (min, max.max(min));
        self
    }

    /// Delay before the `attempt`-th reconnect (0 means no delay)
    pub fn backoff(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1).min(16));
        self.reconnect_delay
            .saturating_mul(factor)
            .min(self.max_reconnect_delay)
    }

    /// Random delay within the INVALID_SESSION window
    pub fn invalid_session_backoff(&self) -> Duration {
        let (min, max) = self.invalid_session_delay;
        if max <= min {
            return min;
        }
        min + (max - min).mul_f64(rand::random::<f64>())
    }
}

impl From<&BotConfig> for GatewayConfig {
    fn from(config: &BotConfig) -> Self {
        let tuning = &config.gateway;
        Self {
            token: config.discord.token.clone(),
            intents: Intents::from(config.discord.intents),
            properties: IdentifyProperties::new(std::env::consts::OS, config.app.name.clone()),
            shard_id: config.shard.id,
            shard_count: config.shard.count,
            api_base_url: config.discord.api_base_url.clone(),
            gateway_url: config.discord.gateway_url.clone(),
            reconnect_delay: Duration::from_millis(tuning.reconnect_delay_ms),
            max_reconnect_delay: Duration::from_millis(
                tuning.max_reconnect_delay_ms.max(tuning.reconnect_delay_ms),
            ),
            invalid_session_delay: (
                Duration::from_millis(tuning.invalid_session_min_ms),
                Duration::from_millis(tuning.invalid_session_max_ms.max(tuning.invalid_session_min_ms)),
            ),
            refetch_gateway_url: tuning.refetch_gateway_url,
            cache: config.cache,
        }
    }
}

impl std::fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("token", &"<redacted>")
            .field("intents", &self.intents)
            .field("shard_id", &self.shard_id)
            .field("shard_count", &self.shard_count)
            .field("gateway_url", &self.gateway_url)
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}
