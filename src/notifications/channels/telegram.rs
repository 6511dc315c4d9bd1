//! Telegram Bot API channel
//!
//! Sends Markdown messages with `sendMessage`. The bot token is part of the
//! request path, so URLs built here are never logged.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{Channel, ChannelError, ChannelResult, DeliveryStatus, Message};
use crate::utils::retry::{with_retry_if, RetryConfig};
use crate::utils::{join_url, parse_http_url, truncate_text};

/// Public Bot API host
pub const DEFAULT_API_BASE: &str = "https://api.telegram.org";

/// Telegram channel configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    /// Bot token issued by BotFather
    pub bot_token: String,
    /// API host, overridable for tests and self-hosted gateways
    #[serde(default = "default_api_base")]
    pub api_base: String,
    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_api_base() -> String {
    DEFAULT_API_BASE.to_string()
}

fn default_timeout() -> u64 {
    10
}

impl TelegramConfig {
    /// Create a configuration for the public API
    pub fn new(bot_token: impl Into<String>) -> Self {
        Self {
            bot_token: bot_token.into(),
            api_base: default_api_base(),
            timeout_secs: default_timeout(),
        }
    }

    /// Point the channel at another API host
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.bot_token.trim().is_empty() {
            return Err("Telegram bot token cannot be empty".to_string());
        }
        parse_http_url(&self.api_base).map_err(|e| e.to_string())?;
        if self.timeout_secs == 0 {
            return Err("Timeout must be greater than 0".to_string());
        }
        Ok(())
    }
}

/// Telegram notification channel
pub struct TelegramChannel {
    config: TelegramConfig,
    client: Client,
    retry: RetryConfig,
}

impl TelegramChannel {
    /// Create a new Telegram channel
    pub fn new(config: TelegramConfig) -> ChannelResult<Self> {
        config.validate().map_err(ChannelError::InvalidConfig)?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ChannelError::InvalidConfig(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            config,
            client,
            retry: RetryConfig::default(),
        })
    }

    /// Override the resend policy
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    fn endpoint(&self) -> String {
        join_url(
            &self.config.api_base,
            &format!("bot{}/sendMessage", self.config.bot_token),
        )
    }

    fn build_payload(message: &Message) -> serde_json::Value {
        serde_json::json!({
            "chat_id": message.chat_target,
            "text": message.text,
            "parse_mode": "Markdown",
        })
    }

    async fn send_once(&self, payload: &serde_json::Value) -> ChannelResult<()> {
        let response = self.client.post(self.endpoint()).json(payload).send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unable to read response body".to_string());
        let detail = format!("HTTP {status}: {}", truncate_text(&body, 200));

        if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            Err(ChannelError::Unavailable(detail))
        } else {
            Err(ChannelError::Rejected(detail))
        }
    }
}

#[async_trait]
impl Channel for TelegramChannel {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn send(&self, message: &Message) -> ChannelResult<DeliveryStatus> {
        let payload = Self::build_payload(message);

        let sent = with_retry_if(
            &self.retry,
            "telegram send",
            || self.send_once(&payload),
            ChannelError::is_retryable,
        )
        .await;

        match sent {
            Ok(()) => {
                tracing::info!(chat = %message.chat_target, "Telegram message delivered");
                Ok(DeliveryStatus::delivered(self.name(), message))
            }
            Err(e) => {
                tracing::error!(chat = %message.chat_target, error = %e, "Failed to deliver Telegram message");
                Ok(DeliveryStatus::undelivered(self.name(), message, e.to_string()))
            }
        }
    }
}
