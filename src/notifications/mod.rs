//! Best-effort report delivery
//!
//! The [`Notifier`] wraps one channel and one chat target. Nothing it does
//! can fail a run: a missing credential disables it, and delivery errors are
//! only logged.
//!
//! # Example
//!
//! ```rust,no_run
//! use vidscan::config::NotifierConfig;
//! use vidscan::notifications::Notifier;
//!
//! # async fn demo() {
//! let notifier = Notifier::from_config(&NotifierConfig::default());
//! notifier.send("*report*").await;
//! # }
//! ```

pub mod channels;

use tracing::{info, warn};

use crate::config::NotifierConfig;
use crate::utils::retry::RetryConfig;

pub use channels::telegram::{TelegramChannel, TelegramConfig};
pub use channels::{Channel, ChannelError, DeliveryStatus, Message};

/// Sends rendered reports to a single chat
pub struct Notifier {
    channel: Option<Box<dyn Channel>>,
    chat_target: String,
}

impl Notifier {
    /// Wrap an existing channel
    pub fn new(channel: Box<dyn Channel>, chat_target: impl Into<String>) -> Self {
        Self {
            channel: Some(channel),
            chat_target: chat_target.into(),
        }
    }

    /// A notifier that drops every message
    pub fn disabled() -> Self {
        Self {
            channel: None,
            chat_target: String::new(),
        }
    }

    /// Build a Telegram notifier, or a disabled one when credentials are missing
    pub fn from_config(config: &NotifierConfig) -> Self {
        let token = config.bot_token.as_deref().filter(|t| !t.trim().is_empty());
        let chat = config.chat_id.as_deref().filter(|c| !c.trim().is_empty());

        let (Some(token), Some(chat)) = (token, chat) else {
            warn!(
                has_token = token.is_some(),
                has_chat_id = chat.is_some(),
                "Telegram bot token or chat id missing, notifications disabled"
            );
            return Self::disabled();
        };

        let telegram = TelegramConfig {
            bot_token: token.to_string(),
            api_base: config.api_base.clone(),
            timeout_secs: config.timeout_secs,
        };

        match TelegramChannel::new(telegram) {
            Ok(channel) => {
                let channel = channel.with_retry(RetryConfig::new(config.max_retries));
                Self::new(Box::new(channel), chat)
            }
            Err(e) => {
                warn!(error = %e, "Telegram channel unavailable, notifications disabled");
                Self::disabled()
            }
        }
    }

    /// Whether messages will actually be sent
    pub fn is_enabled(&self) -> bool {
        self.channel.is_some()
    }

    /// Send a message, logging instead of failing
    pub async fn send(&self, text: &str) -> Option<DeliveryStatus> {
        let Some(channel) = &self.channel else {
            info!("Notifier disabled, message not sent");
            return None;
        };

        let message = Message::new(self.chat_target.clone(), text);
        match channel.send(&message).await {
            Ok(status) => {
                if !status.delivered {
                    warn!(status = %status, "Notification not delivered");
                }
                Some(status)
            }
            Err(e) => {
                warn!(channel = channel.name(), error = %e, "Notification failed");
                None
            }
        }
    }
}
