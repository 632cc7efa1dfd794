//! Domain entities - Core business objects with no external dependencies

pub mod user;
pub mod message;
pub mod conversation;
pub mod command;

pub use user::{User, WELCOME_STAGE};
pub use message::{Address, Broadcast, InboundMessage, MessageKind, Reply};
pub use conversation::{Conversation, Edge, Invite};
pub use command::{CommandContext, CommandOutcome, CommandRegistry, SlashCommand};
