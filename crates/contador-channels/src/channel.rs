//! Outbound channel abstraction

use anyhow::Result;
use async_trait::async_trait;
use contador_core::types::{ChannelType, OutgoingMessage};

/// Trait that all outbound channel adapters implement
///
/// Inbound traffic arrives through the webhook, so adapters only push.
#[async_trait]
pub trait MessageChannel: Send + Sync {
    /// Send a message through this channel
    async fn send(&self, msg: OutgoingMessage) -> Result<()>;

    /// Which channel type this adapter handles
    fn channel_type(&self) -> ChannelType;
}
