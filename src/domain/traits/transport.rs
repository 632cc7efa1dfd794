use async_trait::async_trait;

use crate::application::errors::BotError;
use crate::domain::entities::{Address, InboundMessage};

/// Outbound send primitive used by the router's caller and by stage handlers
pub trait Outbox: Send + Sync {
    /// Send a chat-type message body to an address
    fn send_chat(&self, to: &Address, body: &str) -> Result<(), BotError>;
}

/// Transport trait - abstraction for the messaging connection
#[async_trait]
pub trait Transport: Outbox {
    /// Establish the session (presence, roster)
    async fn start(&self) -> Result<(), BotError>;

    /// Next inbound message, `None` once the connection is closed
    async fn recv(&self) -> Option<InboundMessage>;

    /// Get bot info
    fn bot_info(&self) -> BotInfo;
}

/// Bot information
#[derive(Debug, Clone)]
pub struct BotInfo {
    pub name: String,
    pub address: Address,
}
