use std::collections::BTreeSet;

/// A vinebot: the logical conversation a message is addressed to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversation {
    pub id: i64,
    /// Local part of the vinebot's transport address
    pub address: String,
    /// Names of the users currently active in the conversation
    pub participants: BTreeSet<String>,
    /// Names of the users joined by the edge(s) this vinebot backs
    pub edge_users: BTreeSet<String>,
}

impl Conversation {
    pub fn new(id: i64, address: impl Into<String>) -> Self {
        Self {
            id,
            address: address.into(),
            participants: BTreeSet::new(),
            edge_users: BTreeSet::new(),
        }
    }

    pub fn with_participants<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.participants = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_edge_users<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.edge_users = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn has_participant(&self, name: &str) -> bool {
        self.participants.contains(name)
    }

    /// The user on the other side of a one-to-one conversation with `me`.
    ///
    /// With two active participants this is the other participant. With only
    /// `me` active, the edge pairing decides who the conversation is with.
    pub fn partner_of(&self, me: &str) -> Option<&str> {
        let pool = if self.participants.len() == 2 {
            &self.participants
        } else {
            &self.edge_users
        };
        pool.iter().map(String::as_str).find(|name| *name != me)
    }
}

/// A directed relation between two users, backed by a conversation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edge {
    pub from: String,
    pub to: String,
    pub conversation_id: i64,
}

/// An invite code handed out by `sender`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invite {
    pub code: String,
    pub sender: String,
    pub invitee: Option<String>,
}

impl Invite {
    pub fn is_used(&self) -> bool {
        self.invitee.is_some()
    }
}
