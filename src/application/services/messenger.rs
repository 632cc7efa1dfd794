use std::sync::Arc;

use crate::application::errors::{BotError, StoreError};
use crate::domain::entities::Address;
use crate::domain::traits::{ConversationStore, Directory, EdgeStore, Outbox};

/// Sends messages on the bot's own initiative, outside of a reply
pub struct Messenger {
    bot_name: String,
    leaves_domain: String,
    control_address: Address,
    directory: Arc<dyn Directory>,
    outbox: Arc<dyn Outbox>,
}

impl Messenger {
    pub fn new(
        bot_name: impl Into<String>,
        leaves_domain: impl Into<String>,
        control_address: Address,
        directory: Arc<dyn Directory>,
        outbox: Arc<dyn Outbox>,
    ) -> Self {
        Self {
            bot_name: bot_name.into(),
            leaves_domain: leaves_domain.into(),
            control_address,
            directory,
            outbox,
        }
    }

    /// Message `recipient` through the vinebot backing the bot's edge to them.
    ///
    /// A missing edge is logged and skipped.
    pub fn send_to_user(&self, recipient: &str, body: &str) -> Result<(), BotError> {
        let edge = match self.directory.edge(&self.bot_name, recipient) {
            Ok(edge) => edge,
            Err(StoreError::EdgeNotFound { .. }) => {
                tracing::warn!(
                    "No edge found from {} to intended message recipient {}!",
                    self.bot_name,
                    recipient
                );
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        let conversation = self.directory.lock_conversation_by_id(edge.conversation_id)?;
        let to = Address::new(conversation.address.clone(), self.leaves_domain.clone());
        self.outbox.send_chat(&to, body)
    }

    /// Send `/<command> <args>` to the control process
    pub fn send_command(&self, command: &str, args: &str) -> Result<(), BotError> {
        tracing::debug!("Sending /{} {} to {}", command, args, self.control_address);
        self.outbox
            .send_chat(&self.control_address, &format!("/{} {}", command, args))
    }
}
