//! Record store seams: users, vinebots, edges and invites

use std::ops::{Deref, DerefMut};

use crate::application::errors::StoreError;
use crate::domain::entities::{Broadcast, Conversation, Edge, Invite, User};

/// Something that hands out exclusive record locks
pub trait LockOwner: Send + Sync {
    fn release_lock(&self, key: &str);
}

/// A record held under an exclusive lock.
///
/// The lock is released exactly once, when the guard is dropped.
pub struct Locked<'a, T> {
    record: T,
    key: String,
    owner: &'a dyn LockOwner,
}

impl<'a, T> Locked<'a, T> {
    pub fn new(record: T, key: impl Into<String>, owner: &'a dyn LockOwner) -> Self {
        Self {
            record,
            key: key.into(),
            owner,
        }
    }
}

impl<T> Deref for Locked<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.record
    }
}

impl<T> DerefMut for Locked<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.record
    }
}

impl<T> Drop for Locked<'_, T> {
    fn drop(&mut self) {
        tracing::debug!("Releasing lock {}", self.key);
        self.owner.release_lock(&self.key);
    }
}

pub trait UserStore: Send + Sync {
    fn fetch_user(&self, name: &str) -> Result<User, StoreError>;

    /// Fetch a user for writing
    fn lock_user(&self, name: &str) -> Result<Locked<'_, User>, StoreError>;

    fn set_stage(&self, user_id: i64, stage: Option<&str>) -> Result<(), StoreError>;
}

pub trait ConversationStore: Send + Sync {
    /// Fetch and lock the vinebot behind a transport address
    fn lock_conversation(&self, address: &str) -> Result<Locked<'_, Conversation>, StoreError>;

    fn lock_conversation_by_id(&self, id: i64) -> Result<Locked<'_, Conversation>, StoreError>;

    /// Most recent message `sender` broadcast into the conversation
    fn last_message_from(&self, conversation_id: i64, sender: &str) -> Result<Option<Broadcast>, StoreError>;

    /// Record a broadcast, addressed to the conversation's current participants
    fn record_message(&self, conversation_id: i64, sender: &str, body: &str) -> Result<(), StoreError>;
}

pub trait EdgeStore: Send + Sync {
    fn edge(&self, from: &str, to: &str) -> Result<Edge, StoreError>;
}

pub trait InviteStore: Send + Sync {
    /// The invite a user signed up with
    fn invite_for(&self, invitee: &str) -> Result<Invite, StoreError>;

    fn invites_sent_by(&self, sender: &str) -> Result<Vec<Invite>, StoreError>;
}

/// Every record store the bot talks to
pub trait Directory: UserStore + ConversationStore + EdgeStore + InviteStore {}

impl<T> Directory for T where T: UserStore + ConversationStore + EdgeStore + InviteStore {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct CountingOwner {
        released: Mutex<Vec<String>>,
    }

    impl LockOwner for CountingOwner {
        fn release_lock(&self, key: &str) {
            self.released.lock().unwrap().push(key.to_string());
        }
    }

    #[test]
    fn test_release_on_scope_exit() {
        let owner = CountingOwner::default();
        {
            let mut user = Locked::new(User::new(1, "alice"), "user:alice", &owner);
            user.stage = Some("welcome".to_string());
        }
        assert_eq!(*owner.released.lock().unwrap(), vec!["user:alice".to_string()]);
    }

    #[test]
    fn test_early_drop_releases_once() {
        let owner = CountingOwner::default();
        let convo = Locked::new(Conversation::new(7, "abc"), "vinebot:7", &owner);
        drop(convo);
        assert_eq!(owner.released.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_release_during_unwind() {
        let owner = CountingOwner::default();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _convo = Locked::new(Conversation::new(7, "abc"), "vinebot:7", &owner);
            panic!("handler fault");
        }));
        assert!(result.is_err());
        assert_eq!(owner.released.lock().unwrap().len(), 1);
    }
}
