//! Message router - Classifies inbound messages and hands them to the
//! dialogue engine or the command registry

use std::sync::Arc;

use super::parser::{BodyKind, MessageParser};
use crate::application::errors::{BotError, StoreError};
use crate::application::services::{CommandService, StageGraph};
use crate::domain::entities::{Address, CommandContext, Conversation, InboundMessage, Reply};
use crate::domain::traits::{ConversationStore, Directory, UserStore};

pub const IDLE_ACTION: &str = "sits quietly";

/// Fixed identities and strings the router needs
#[derive(Debug, Clone)]
pub struct RouterSettings {
    pub bot_name: String,
    pub echo_user: String,
    /// Domain the vinebots (and the control process) live on
    pub leaves_domain: String,
    /// Where control messages come from; replies there are not vinebot traffic
    pub control_address: Address,
    pub final_message: String,
    pub apology: String,
}

pub struct MessageRouter {
    settings: RouterSettings,
    parser: MessageParser,
    dialogue: StageGraph,
    commands: CommandService,
    directory: Arc<dyn Directory>,
}

impl MessageRouter {
    pub fn new(
        settings: RouterSettings,
        parser: MessageParser,
        dialogue: StageGraph,
        commands: CommandService,
        directory: Arc<dyn Directory>,
    ) -> Self {
        Self {
            settings,
            parser,
            dialogue,
            commands,
            directory,
        }
    }

    pub fn settings(&self) -> &RouterSettings {
        &self.settings
    }

    /// Route one inbound message and return the reply to send, if any.
    ///
    /// Errors are faults from stage handlers, command actions or the record
    /// stores. Every lock taken while routing is released before returning.
    pub fn route(&self, msg: &InboundMessage) -> Result<Option<Reply>, BotError> {
        if !msg.kind.is_routable() {
            tracing::debug!("Ignoring {} message from {}", msg.kind.as_str(), msg.from);
            return Ok(None);
        }

        match self.parser.classify(&msg.body) {
            BodyKind::Control { acting_on: Some(name) } => self.act_on_user(msg, name),
            BodyKind::Control { acting_on: None } => Ok(None),
            BodyKind::Conversation => self.route_conversation(msg),
        }
    }

    /// Record a reply that was sent into a vinebot, the way the leaves log
    /// what the bot says.
    ///
    /// `/me` actions are stored as `<bot> <action>`; other slash replies and
    /// anything not addressed to a vinebot are skipped.
    pub fn log_broadcast(&self, reply: &Reply) -> Result<(), BotError> {
        let settings = &self.settings;
        if reply.to.domain != settings.leaves_domain || reply.to == settings.control_address {
            return Ok(());
        }
        let body = match reply.body.strip_prefix("/me ") {
            Some(action) => format!("{} {}", settings.bot_name, action),
            None if reply.body.starts_with('/') => return Ok(()),
            None => reply.body.clone(),
        };

        let conversation = self.directory.lock_conversation(&reply.to.user)?;
        self.directory
            .record_message(conversation.id, &settings.bot_name, &body)?;
        Ok(())
    }

    fn act_on_user(&self, msg: &InboundMessage, name: &str) -> Result<Option<Reply>, BotError> {
        let mut user = match self.directory.lock_user(name) {
            Ok(user) => user,
            Err(StoreError::UserNotFound(_)) => {
                tracing::warn!("User not found for {}", name);
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        // Duplicate status messages would otherwise skip ahead in the flow
        if !user.needs_onboarding() {
            tracing::debug!("{} is already onboarding, ignoring status message", user.name);
            return Ok(None);
        }

        let reply = self.dialogue.get_reply(&mut user, None, self.directory.as_ref())?;
        Ok(Some(msg.reply(reply)))
    }

    fn route_conversation(&self, msg: &InboundMessage) -> Result<Option<Reply>, BotError> {
        let conversation = match self.directory.lock_conversation(&msg.from.user) {
            Ok(conversation) => conversation,
            Err(StoreError::ConversationNotFound(address)) => {
                // Error bounces from the leaves would loop forever
                if msg.from.domain == self.settings.leaves_domain {
                    tracing::debug!("No vinebot for {}, not replying to the leaves", address);
                    return Ok(None);
                }
                tracing::warn!("No vinebot for {}", address);
                return Ok(Some(msg.reply(self.settings.apology.clone())));
            }
            Err(e) => return Err(e.into()),
        };

        if !conversation.has_participant(&self.settings.bot_name) {
            tracing::debug!("Not a participant of {}, dropping message", conversation.address);
            return Ok(None);
        }

        if conversation.participants.len() <= 2 {
            self.reply_one_to_one(msg, &conversation)
        } else {
            self.reply_group(msg, &conversation)
        }
    }

    fn reply_one_to_one(
        &self,
        msg: &InboundMessage,
        conversation: &Conversation,
    ) -> Result<Option<Reply>, BotError> {
        let Some(partner) = conversation.partner_of(&self.settings.bot_name) else {
            tracing::warn!("Could not find who {} is talking to", conversation.address);
            return Ok(None);
        };

        let mut sender = match self.directory.lock_user(partner) {
            Ok(user) => user,
            Err(StoreError::UserNotFound(_)) => {
                tracing::warn!("User not found for {}", partner);
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        let body = MessageParser::strip_sender_tag(&msg.body, &sender.name);
        let reply = if self.commands.is_command(&body) {
            let ctx = CommandContext {
                bot_name: &self.settings.bot_name,
                conversation: Some(conversation),
            };
            self.commands.handle_command(&sender, &body, &ctx)?
        } else {
            self.dialogue
                .get_reply(&mut sender, Some(&body), self.directory.as_ref())?
        };
        Ok(Some(msg.reply(reply)))
    }

    fn reply_group(
        &self,
        msg: &InboundMessage,
        conversation: &Conversation,
    ) -> Result<Option<Reply>, BotError> {
        let Some(annotation) = MessageParser::parse_annotation(&msg.body) else {
            tracing::debug!("Unannotated message in {}, ignoring", conversation.address);
            return Ok(None);
        };

        if annotation.whispering {
            return Ok(Some(msg.reply(format!(
                "/whisper {} {}",
                annotation.sender, self.settings.final_message
            ))));
        }

        if annotation.sender == self.settings.echo_user {
            return Ok(None);
        }

        let last = self
            .directory
            .last_message_from(conversation.id, &self.settings.bot_name)?;
        let idle_body = format!("{} {}", self.settings.bot_name, IDLE_ACTION);
        let already_idle = last.is_some_and(|broadcast| {
            broadcast.recipients == conversation.participants && broadcast.body == idle_body
        });

        if already_idle {
            tracing::debug!("Already idle in {}", conversation.address);
            Ok(None)
        } else {
            Ok(Some(msg.reply(format!("/me {}", IDLE_ACTION))))
        }
    }
}
