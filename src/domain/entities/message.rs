use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use std::fmt;

/// Type of an inbound protocol message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageKind {
    Chat,
    Normal,
    Groupchat,
    Headline,
    Error,
    Other(String),
}

impl MessageKind {
    pub fn as_str(&self) -> &str {
        match self {
            MessageKind::Chat => "chat",
            MessageKind::Normal => "normal",
            MessageKind::Groupchat => "groupchat",
            MessageKind::Headline => "headline",
            MessageKind::Error => "error",
            MessageKind::Other(s) => s,
        }
    }

    /// Only one-to-one message types are routed; everything else is ignored
    pub fn is_routable(&self) -> bool {
        matches!(self, MessageKind::Chat | MessageKind::Normal)
    }
}

/// A `user@domain` transport address
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Address {
    pub user: String,
    pub domain: String,
}

impl Address {
    pub fn new(user: impl Into<String>, domain: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            domain: domain.into(),
        }
    }

    /// Parse `user@domain`, ignoring any trailing `/resource`
    pub fn parse(raw: &str) -> Option<Self> {
        let bare = raw.split('/').next()?.trim();
        let (user, domain) = bare.split_once('@')?;
        if user.is_empty() || domain.is_empty() {
            return None;
        }
        Some(Self::new(user, domain))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.user, self.domain)
    }
}

/// A message handed to the router by the transport
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub kind: MessageKind,
    pub from: Address,
    pub body: String,
}

impl InboundMessage {
    pub fn new(kind: MessageKind, from: Address, body: impl Into<String>) -> Self {
        Self {
            kind,
            from,
            body: body.into(),
        }
    }

    pub fn chat(from: Address, body: impl Into<String>) -> Self {
        Self::new(MessageKind::Chat, from, body)
    }

    /// Build the reply addressed back to whoever sent this message
    pub fn reply(&self, body: impl Into<String>) -> Reply {
        Reply {
            to: self.from.clone(),
            body: body.into(),
        }
    }
}

/// Outbound chat message produced by the router
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub to: Address,
    pub body: String,
}

/// A message previously broadcast into a conversation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Broadcast {
    pub sender: String,
    pub body: String,
    pub sent_on: DateTime<Utc>,
    pub recipients: BTreeSet<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_parse() {
        let addr = Address::parse("abc123@vine.example.com/resource").unwrap();
        assert_eq!(addr.user, "abc123");
        assert_eq!(addr.domain, "vine.example.com");
        assert_eq!(addr.to_string(), "abc123@vine.example.com");

        assert!(Address::parse("no-domain").is_none());
        assert!(Address::parse("@example.com").is_none());
    }

    #[test]
    fn test_routable_kinds() {
        assert!(MessageKind::Chat.is_routable());
        assert!(MessageKind::Normal.is_routable());
        assert!(!MessageKind::Groupchat.is_routable());
        assert!(!MessageKind::Error.is_routable());
        assert_eq!(MessageKind::Other("weird".to_string()).as_str(), "weird");
    }
}
