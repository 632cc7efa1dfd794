//! Domain traits - Abstractions for infrastructure implementations

pub mod directory;
pub mod transport;

pub use directory::{
    ConversationStore, Directory, EdgeStore, InviteStore, LockOwner, Locked, UserStore,
};
pub use transport::{BotInfo, Outbox, Transport};
