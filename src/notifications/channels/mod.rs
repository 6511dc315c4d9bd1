//! Notification channels for delivering reports
//!
//! A channel takes a rendered [`Message`] and pushes it to one chat target.

pub mod telegram;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use serde::Serialize;
use std::fmt;

use crate::scheduler::shard::business_now;

pub type ChannelResult<T> = Result<T, ChannelError>;

#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("invalid channel configuration: {0}")]
    InvalidConfig(String),

    /// Rate limited or server-side failure
    #[error("channel unavailable: {0}")]
    Unavailable(String),

    /// The API refused the message (bad chat id, bad markup, revoked token)
    #[error("message rejected: {0}")]
    Rejected(String),

    #[error("payload encoding failed: {0}")]
    Encode(#[from] serde_json::Error),
}

impl ChannelError {
    /// Whether resending could succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Unavailable(_))
    }
}

/// A rendered message addressed to one chat
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    pub chat_target: String,
    pub text: String,
}

impl Message {
    pub fn new(chat_target: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            chat_target: chat_target.into(),
            text: text.into(),
        }
    }
}

/// What happened to one message
#[derive(Debug, Clone, Serialize)]
pub struct DeliveryStatus {
    pub delivered: bool,
    pub channel: String,
    pub chat_target: String,
    /// Failure detail, empty on success
    pub detail: Option<String>,
    /// Business-clock time of the final attempt
    pub attempted_at: DateTime<FixedOffset>,
}

impl DeliveryStatus {
    pub fn delivered(channel: impl Into<String>, message: &Message) -> Self {
        Self {
            delivered: true,
            channel: channel.into(),
            chat_target: message.chat_target.clone(),
            detail: None,
            attempted_at: business_now(),
        }
    }

    pub fn undelivered(channel: impl Into<String>, message: &Message, detail: impl Into<String>) -> Self {
        Self {
            delivered: false,
            channel: channel.into(),
            chat_target: message.chat_target.clone(),
            detail: Some(detail.into()),
            attempted_at: business_now(),
        }
    }
}

impl fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verb = if self.delivered { "delivered" } else { "not delivered" };
        write!(f, "{} to {} via {}", verb, self.chat_target, self.channel)?;
        if let Some(detail) = &self.detail {
            write!(f, " ({detail})")?;
        }
        Ok(())
    }
}

/// A destination for rendered reports
#[async_trait]
pub trait Channel: Send + Sync {
    fn name(&self) -> &str;

    /// Deliver one message
    ///
    /// Delivery failures are reported through [`DeliveryStatus`]; `Err` is
    /// reserved for problems that make sending impossible.
    async fn send(&self, message: &Message) -> ChannelResult<DeliveryStatus>;
}
