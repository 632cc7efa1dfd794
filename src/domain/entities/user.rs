use std::fmt;

/// Stage assigned to freshly signed-up users who have not started onboarding yet
pub const WELCOME_STAGE: &str = "welcome";

/// Represents a user record as fetched from the directory
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct User {
    pub id: i64,
    pub name: String,
    /// Current position in the dialogue flow, `None` when no flow is active
    pub stage: Option<String>,
    pub online: bool,
}

impl User {
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            stage: None,
            online: false,
        }
    }

    pub fn with_stage(mut self, stage: impl Into<String>) -> Self {
        self.stage = Some(stage.into());
        self
    }

    pub fn with_online(mut self, online: bool) -> Self {
        self.online = online;
        self
    }

    pub fn is_online(&self) -> bool {
        self.online
    }

    pub fn needs_onboarding(&self) -> bool {
        self.stage.as_deref() == Some(WELCOME_STAGE)
    }
}

impl fmt::Display for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}
