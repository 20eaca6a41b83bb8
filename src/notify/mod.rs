//! Outbound alert delivery

pub mod discord;

use crate::error::Result;
use async_trait::async_trait;
use tracing::info;

pub use discord::DiscordWebhook;

/// Destination for formatted alert messages.
#[async_trait]
pub trait AlertSink: Send + Sync {
    /// Sink name for logs (e.g., "discord")
    fn name(&self) -> &'static str;

    /// Deliver one message; an error means it was not delivered
    async fn deliver(&self, message: &str) -> Result<()>;
}

/// Sink used when alerts are disabled: the message only goes to the log.
pub struct LogSink;

#[async_trait]
impl AlertSink for LogSink {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn deliver(&self, message: &str) -> Result<()> {
        info!("[alert] {}", message.replace('\n', " | "));
        Ok(())
    }
}
