//! Message parser - Classifies inbound bodies and reads sender annotations

use once_cell::sync::Lazy;
use regex_lite::Regex;

/// Leading `[name] ` or `[name, whispering] ` that vinebots prepend in group conversations
static ANNOTATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\[([^\]]+)\] ").expect("annotation pattern is valid"));

const WHISPERING: &str = "whispering";

/// Shape of an inbound message body
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BodyKind<'a> {
    /// Status line from the infrastructure, possibly naming a user to act on
    Control { acting_on: Option<&'a str> },
    /// Anything said in a conversation
    Conversation,
}

/// Who a group message came from, and whether it was whispered
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Annotation {
    pub sender: String,
    pub whispering: bool,
}

/// Parses inbound message bodies
#[derive(Debug, Clone)]
pub struct MessageParser {
    control_prefixes: Vec<String>,
    act_on_user_marker: String,
}

impl MessageParser {
    pub fn new(control_prefixes: Vec<String>, act_on_user_marker: impl Into<String>) -> Self {
        Self {
            control_prefixes,
            act_on_user_marker: act_on_user_marker.into(),
        }
    }

    pub fn classify<'a>(&self, body: &'a str) -> BodyKind<'a> {
        if !self.control_prefixes.iter().any(|prefix| body.starts_with(prefix.as_str())) {
            return BodyKind::Conversation;
        }

        let acting_on = body
            .split_once(self.act_on_user_marker.as_str())
            .map(|(_, name)| name.trim())
            .filter(|name| !name.is_empty());
        BodyKind::Control { acting_on }
    }

    /// Drop the `[name]` tag a vinebot adds in one-to-one conversations
    pub fn strip_sender_tag(body: &str, sender: &str) -> String {
        body.replace(&format!("[{}]", sender), "").trim().to_string()
    }

    pub fn parse_annotation(body: &str) -> Option<Annotation> {
        let inner = ANNOTATION.captures(body)?.get(1)?.as_str();
        let inner = inner.trim_matches('[');
        let parts: Vec<&str> = inner.split(", ").collect();
        let sender = parts.first()?.trim();
        if sender.is_empty() {
            return None;
        }

        Some(Annotation {
            sender: sender.to_string(),
            whispering: parts.len() == 2 && parts[1].trim() == WHISPERING,
        })
    }
}
