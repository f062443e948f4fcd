//! Gateway url lookup
//!
//! The only REST call the gateway needs: `GET /gateway/bot`, returning the socket url and the
//! recommended shard count.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;

/// Timeout for the gateway url request
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Response of `GET /gateway/bot`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GatewayInfo {
    pub url: String,
    /// Recommended shard count
    #[serde(default = "default_shards")]
    pub shards: u32,
}

fn default_shards() -> u32 {
    1
}

/// REST errors
#[derive(Debug, thiserror::Error)]
pub enum RestError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The token was rejected; retrying cannot help
    #[error("Unauthorized: invalid bot token")]
    Unauthorized,

    #[error("Unexpected status {0}")]
    Status(u16),
}

impl RestError {
    /// Check if retrying the request may succeed
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Unauthorized)
    }
}

/// Source of the gateway url
#[async_trait]
pub trait GatewayUrlProvider: Send + Sync {
    async fn fetch_gateway_url(&self) -> Result<GatewayInfo, RestError>;
}

/// Fetches the gateway url over HTTP
#[derive(Clone)]
pub struct HttpGatewayUrlProvider {
    client: Client,
    api_base_url: String,
    token: String,
}

impl HttpGatewayUrlProvider {
    pub fn new(api_base_url: impl Into<String>, token: impl Into<String>) -> Result<Self, RestError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("concord (", env!("CARGO_PKG_VERSION"), ")"))
            .build()?;

        Ok(Self {
            client,
            api_base_url: api_base_url.into(),
            token: token.into(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/gateway/bot", self.api_base_url.trim_end_matches('/'))
    }
}

impl std::fmt::Debug for HttpGatewayUrlProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpGatewayUrlProvider")
            .field("api_base_url", &self.api_base_url)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl GatewayUrlProvider for HttpGatewayUrlProvider {
    #[tracing::instrument(skip(self))]
    async fn fetch_gateway_url(&self) -> Result<GatewayInfo, RestError> {
        let response = self
            .client
            .get(self.endpoint())
            .header("Authorization", format!("Bot {}", self.token))
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => {
                let info: GatewayInfo = response.json().await?;
                tracing::debug!(url = %info.url, shards = info.shards, "Fetched gateway url");
                Ok(info)
            }
            StatusCode::UNAUTHORIZED => Err(RestError::Unauthorized),
            status => Err(RestError::Status(status.as_u16())),
        }
    }
}

/// Always returns the same url
#[derive(Debug, Clone)]
pub struct StaticGatewayUrl {
    info: GatewayInfo,
}

impl StaticGatewayUrl {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            info: GatewayInfo {
                url: url.into(),
                shards: default_shards(),
            },
        }
    }
}

#[async_trait]
impl GatewayUrlProvider for StaticGatewayUrl {
    async fn fetch_gateway_url(&self) -> Result<GatewayInfo, RestError> {
        Ok(self.info.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gateway_info_deserialize() {
        let info: GatewayInfo = serde_json::from_value(serde_json::json!({
            "url": "wss://gateway.discord.gg",
            "shards": 9,
            "session_start_limit": {"total": 1000, "remaining": 999}
        }))
        .unwrap();
        assert_eq!(info.url, "wss://gateway.discord.gg");
        assert_eq!(info.shards, 9);
    }

    #[test]
    fn test_endpoint() {
        let provider = HttpGatewayUrlProvider::new("https://discord.com/api/v10/", "t").unwrap();
        assert_eq!(provider.endpoint(), "https://discord.com/api/v10/gateway/bot");
        assert!(!format!("{provider:?}").contains("\"t\""));
    }

    #[tokio::test]
    async fn test_static_provider() {
        let provider = StaticGatewayUrl::new("ws://127.0.0.1:9000");
        let info = provider.fetch_gateway_url().await.unwrap();
        assert_eq!(info.url, "ws://127.0.0.1:9000");
        assert_eq!(info.shards, 1);
    }

    #[test]
    fn test_retryable() {
        assert!(!RestError::Unauthorized.is_retryable());
        assert!(RestError::Status(502).is_retryable());
    }
}
