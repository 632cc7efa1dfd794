//! Onboarding dialogue for newly signed-up users

use std::sync::Arc;

use crate::application::services::{Messenger, StageGraph, Transition};
use crate::domain::entities::WELCOME_STAGE;
use crate::domain::traits::{Directory, InviteStore, UserStore};

pub const ROSTER_GROUPS_STAGE: &str = "roster_groups";
pub const CONVERSATION_STARTED_STAGE: &str = "conver_started";
pub const INVITES_GIVEN_STAGE: &str = "invites_given";

/// Invite codes handed to every new user
const WELCOME_INVITES: usize = 2;

/// Product wording used in the scripted replies
#[derive(Debug, Clone)]
pub struct OnboardingSettings {
    pub product_name: String,
    pub domain: String,
    pub support_contact: String,
    pub echo_user: String,
}

impl OnboardingSettings {
    /// Reply for users with nothing left to do
    pub fn final_message(&self) -> String {
        format!(
            "Sorry, there's nothing else I can do for you right now. Type /help for a list of commands, or ping @{} with questions!",
            self.support_contact
        )
    }

    pub fn apology(&self) -> String {
        format!(
            "Sorry, something seems to be wrong. Ping @{} with questions!",
            self.support_contact
        )
    }
}

pub fn onboarding_flow(
    settings: OnboardingSettings,
    directory: Arc<dyn Directory>,
    messenger: Arc<Messenger>,
) -> StageGraph {
    let settings = Arc::new(settings);
    let mut graph = StageGraph::new(settings.final_message());

    let (s, m) = (settings.clone(), messenger.clone());
    graph.add_stage(WELCOME_STAGE, move |user, _| {
        for _ in 0..WELCOME_INVITES {
            m.send_command("new_invite", &user.name)?;
        }
        Ok(Transition::new(
            ROSTER_GROUPS_STAGE,
            format!(
                "Hi {}, welcome to {}! I'm here to help you get started. First, look for two new groups in your buddy list. Do you see them?",
                user.name, s.product_name
            ),
        ))
    });

    let (s, m) = (settings.clone(), messenger);
    graph.add_stage(ROSTER_GROUPS_STAGE, move |user, body| {
        let invite = directory.invite_for(&user.name)?;
        let inviter = directory.fetch_user(&invite.sender)?;
        let next_steps = format!(
            "\n\nLook for the contact for our conversation in your buddy list under '{} Conversations', and send a message to it. (It may take a moment to appear.)",
            s.product_name
        );

        let (yes_reply, recipient, other_body) = if inviter.is_online() {
            (
                format!("Great, I'll send {} a message!{}", inviter.name, next_steps),
                inviter.name.clone(),
                format!(
                    "Hi! Your friend {} just signed up for {}, so I thought I'd send you a message to show them how the buddy list works.",
                    user.name, s.product_name
                ),
            )
        } else {
            (
                format!(
                    "Your friend {} isn't online right now, so I'll start a conversation with another bot, {}.{}",
                    inviter.name, s.echo_user, next_steps
                ),
                s.echo_user.clone(),
                // Any body works as long as nobody else will send it next
                uuid::Uuid::new_v4().to_string(),
            )
        };

        let transition = StageGraph::process_yes_no(
            ROSTER_GROUPS_STAGE,
            body.unwrap_or_default(),
            CONVERSATION_STARTED_STAGE,
            &yes_reply,
            ROSTER_GROUPS_STAGE,
            &format!(
                "Sorry, then something might be broken. Maybe check again, or ping {} for help?",
                s.support_contact
            ),
        );
        if transition.stage == CONVERSATION_STARTED_STAGE {
            m.send_to_user(&recipient, &other_body)?;
        }
        Ok(transition)
    });

    let s = settings;
    graph.add_stage(CONVERSATION_STARTED_STAGE, move |_, _| {
        Ok(Transition::new(
            INVITES_GIVEN_STAGE,
            format!(
                "One last thing - I've given you a couple of {} invite codes that your friends can use to sign up. You can type /invites to see them here, or sign in to http://{}.\n\nAsk @{} if you need more, and thanks for using {}!",
                s.product_name, s.domain, s.support_contact, s.product_name
            ),
        ))
    });

    graph
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::errors::BotError;
    use crate::domain::entities::{Address, User};
    use crate::domain::traits::Outbox;
    use crate::infrastructure::database::Database;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingOutbox {
        sent: Mutex<Vec<(String, String)>>,
    }

    impl Outbox for RecordingOutbox {
        fn send_chat(&self, to: &Address, body: &str) -> Result<(), BotError> {
            self.sent.lock().unwrap().push((to.to_string(), body.to_string()));
            Ok(())
        }
    }

    fn settings() -> OnboardingSettings {
        OnboardingSettings {
            product_name: "Dashdash".to_string(),
            domain: "dashdash.example".to_string(),
            support_contact: "lehrblogger".to_string(),
            echo_user: "echo_user".to_string(),
        }
    }

    fn setup() -> (Arc<Database>, Arc<RecordingOutbox>, StageGraph) {
        let db = Arc::new(Database::open_in_memory().unwrap());
        db.add_user("helpbot", None).unwrap();
        db.add_user("alice", Some(WELCOME_STAGE)).unwrap();
        db.add_user("bob", None).unwrap();
        db.add_user("echo_user", None).unwrap();
        db.add_invite("code1", "bob", Some("alice")).unwrap();
        let to_bob = db.add_conversation("tobob", &["helpbot", "bob"]).unwrap();
        db.add_edge("helpbot", "bob", to_bob).unwrap();
        let to_echo = db.add_conversation("toecho", &["helpbot", "echo_user"]).unwrap();
        db.add_edge("helpbot", "echo_user", to_echo).unwrap();

        let outbox = Arc::new(RecordingOutbox::default());
        let messenger = Arc::new(Messenger::new(
            "helpbot",
            "vine.dashdash.example",
            Address::new("leaves", "vine.dashdash.example"),
            db.clone(),
            outbox.clone(),
        ));
        let graph = onboarding_flow(settings(), db.clone(), messenger);
        (db, outbox, graph)
    }

    #[test]
    fn test_welcome_requests_invites() {
        let (db, outbox, graph) = setup();
        let mut alice = db.fetch_user("alice").unwrap();

        let reply = graph.get_reply(&mut alice, None, db.as_ref()).unwrap();

        assert!(reply.starts_with("Hi alice, welcome to Dashdash!"));
        assert_eq!(alice.stage.as_deref(), Some(ROSTER_GROUPS_STAGE));
        let sent = outbox.sent.lock().unwrap();
        assert_eq!(sent.len(), 2);
        assert!(sent
            .iter()
            .all(|(to, body)| to == "leaves@vine.dashdash.example" && body == "/new_invite alice"));
    }

    #[test]
    fn test_yes_with_online_inviter_messages_inviter() {
        let (db, outbox, graph) = setup();
        db.set_online("bob", true).unwrap();
        db.set_stage(db.fetch_user("alice").unwrap().id, Some(ROSTER_GROUPS_STAGE))
            .unwrap();
        let mut alice = db.fetch_user("alice").unwrap();

        let reply = graph.get_reply(&mut alice, Some(" yeah "), db.as_ref()).unwrap();

        assert!(reply.starts_with("Great, I'll send bob a message!"));
        assert_eq!(alice.stage.as_deref(), Some(CONVERSATION_STARTED_STAGE));
        let sent = outbox.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "tobob@vine.dashdash.example");
        assert!(sent[0].1.contains("Your friend alice just signed up"));
        assert_eq!(db.held_locks(), 0);
    }

    #[test]
    fn test_yes_with_offline_inviter_messages_echo() {
        let (db, outbox, graph) = setup();
        let mut alice = db.fetch_user("alice").unwrap();
        alice.stage = Some(ROSTER_GROUPS_STAGE.to_string());

        let reply = graph.get_reply(&mut alice, Some("yes"), db.as_ref()).unwrap();

        assert!(reply.starts_with("Your friend bob isn't online right now"));
        let sent = outbox.sent.lock().unwrap();
        assert_eq!(sent[0].0, "toecho@vine.dashdash.example");
        assert!(uuid::Uuid::parse_str(&sent[0].1).is_ok());
    }

    #[test]
    fn test_no_stays_put_without_sending() {
        let (db, outbox, graph) = setup();
        let mut alice = db.fetch_user("alice").unwrap();
        alice.stage = Some(ROSTER_GROUPS_STAGE.to_string());

        let reply = graph.get_reply(&mut alice, Some("no"), db.as_ref()).unwrap();

        assert!(reply.contains("something might be broken"));
        assert_eq!(alice.stage.as_deref(), Some(ROSTER_GROUPS_STAGE));
        assert!(outbox.sent.lock().unwrap().is_empty());
    }

    #[test]
    fn test_flow_ends_at_fallback() {
        let (db, _outbox, graph) = setup();
        let mut alice = User::new(db.fetch_user("alice").unwrap().id, "alice")
            .with_stage(CONVERSATION_STARTED_STAGE);

        let reply = graph.get_reply(&mut alice, Some("thanks"), db.as_ref()).unwrap();
        assert!(reply.contains("/invites"));
        assert_eq!(alice.stage.as_deref(), Some(INVITES_GIVEN_STAGE));

        let reply = graph.get_reply(&mut alice, Some("anything else?"), db.as_ref()).unwrap();
        assert_eq!(reply, settings().final_message());
    }
}
