//! Configuration structs

mod bot_config;

pub use bot_config::{
    AppSettings, BotConfig, CacheConfig, CacheExecutionPolicy, CachingDelegation, ConfigError,
    DiscordConfig, Environment, GatewayTuning, ShardConfig,
};
