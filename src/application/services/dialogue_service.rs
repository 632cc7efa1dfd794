use std::collections::HashMap;

use crate::application::errors::BotError;
use crate::domain::entities::User;
use crate::domain::traits::UserStore;

const AFFIRMATIVE: &[&str] = &["y", "yes", "yep", "yea", "yeah", "ok"];
const NEGATIVE: &[&str] = &["n", "no", "nope", "nah"];

pub const CLARIFICATION_REPLY: &str =
    "Sorry, I didn't understand that response. Please answer with either 'yes' or 'no'.";

/// Where a stage handler sends the user next, and what it says
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub stage: String,
    pub reply: String,
}

impl Transition {
    pub fn new(stage: impl Into<String>, reply: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
            reply: reply.into(),
        }
    }
}

/// Stage handler function type. The body is `None` when the flow is advanced
/// by a control message rather than by something the user typed.
pub type StageHandler = Box<dyn Fn(&User, Option<&str>) -> Result<Transition, BotError> + Send + Sync>;

/// Scripted dialogue: one handler per stage name
pub struct StageGraph {
    stages: HashMap<String, StageHandler>,
    no_stage_reply: String,
}

impl StageGraph {
    pub fn new(no_stage_reply: impl Into<String>) -> Self {
        Self {
            stages: HashMap::new(),
            no_stage_reply: no_stage_reply.into(),
        }
    }

    /// Register the handler for `stage`, replacing any earlier one
    pub fn add_stage<F>(&mut self, stage: impl Into<String>, handler: F)
    where
        F: Fn(&User, Option<&str>) -> Result<Transition, BotError> + Send + Sync + 'static,
    {
        self.stages.insert(stage.into(), Box::new(handler));
    }

    /// Advance `user` by one turn and return the reply.
    ///
    /// Users without a handled stage get the fallback reply and keep their
    /// stage. Otherwise the handler's next stage is always written back, even
    /// when it equals the current one.
    pub fn get_reply<S>(&self, user: &mut User, body: Option<&str>, users: &S) -> Result<String, BotError>
    where
        S: UserStore + ?Sized,
    {
        let Some(handler) = user.stage.as_deref().and_then(|stage| self.stages.get(stage)) else {
            tracing::debug!("No stage handler for {} at {:?}", user.name, user.stage);
            return Ok(self.no_stage_reply.clone());
        };

        let transition = handler(user, body)?;
        tracing::debug!(
            "Moving {} from {:?} to {}",
            user.name,
            user.stage,
            transition.stage
        );
        users.set_stage(user.id, Some(&transition.stage))?;
        user.stage = Some(transition.stage);
        Ok(transition.reply)
    }

    /// Shared yes/no branch for stage handlers.
    ///
    /// An answer only takes a branch when that branch has both a stage and a
    /// reply; otherwise the user stays on `stage` and is asked again.
    pub fn process_yes_no(
        stage: &str,
        body: &str,
        yes_stage: &str,
        yes_reply: &str,
        no_stage: &str,
        no_reply: &str,
    ) -> Transition {
        let body = body.trim();
        if AFFIRMATIVE.contains(&body) && !yes_stage.is_empty() && !yes_reply.is_empty() {
            Transition::new(yes_stage, yes_reply)
        } else if NEGATIVE.contains(&body) && !no_stage.is_empty() && !no_reply.is_empty() {
            Transition::new(no_stage, no_reply)
        } else {
            Transition::new(stage, CLARIFICATION_REPLY)
        }
    }
}
