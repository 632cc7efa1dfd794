//! Slash commands the bot answers in one-to-one conversations

use std::sync::Arc;

use crate::application::errors::{CommandError, StoreError};
use crate::application::services::CommandService;
use crate::domain::entities::SlashCommand;
use crate::domain::traits::{Directory, InviteStore, UserStore};

/// Stage argument that clears a user's stage
const NO_STAGE: &str = "none";

pub fn register_default_commands(
    commands: &mut CommandService,
    directory: Arc<dyn Directory>,
    admins: Vec<String>,
) {
    let invites = directory.clone();
    commands.add(
        SlashCommand::new("invites")
            .with_description("List the invite codes you can share with friends")
            .with_args(|sender, _, _, tokens| Ok(tokens.is_empty().then(|| vec![sender.name.clone()])))
            .with_action(move |args| {
                let unused: Vec<String> = invites
                    .invites_sent_by(&args[0])?
                    .into_iter()
                    .filter(|invite| !invite.is_used())
                    .map(|invite| invite.code)
                    .collect();
                if unused.is_empty() {
                    return Err(CommandError::ExecutionFailed(
                        "you don't have any unused invite codes right now.".to_string(),
                    ));
                }

                let mut reply = "Your unused invite codes are:\n".to_string();
                for code in unused {
                    reply.push_str(&format!("\t{}\n", code));
                }
                Ok(Some(reply))
            }),
    );

    let stages = directory;
    commands.add(
        SlashCommand::new("stage")
            .with_arg_format("<user> <stage>")
            .with_description(format!(
                "Move a user to another onboarding stage ('{}' clears it)",
                NO_STAGE
            ))
            .with_sender_check(move |sender, _| Ok(admins.contains(&sender.name)))
            .with_args(|_, _, _, tokens| Ok((tokens.len() == 2).then(|| tokens.to_vec())))
            .with_action(move |args| {
                let user = match stages.fetch_user(&args[0]) {
                    Ok(user) => user,
                    Err(StoreError::UserNotFound(name)) => {
                        return Err(CommandError::ExecutionFailed(format!(
                            "{} isn't a registered user.",
                            name
                        )));
                    }
                    Err(e) => return Err(e.into()),
                };
                let stage = Some(args[1].as_str()).filter(|stage| *stage != NO_STAGE);
                stages.set_stage(user.id, stage)?;
                tracing::info!("Moved {} to stage {:?}", user.name, stage);
                Ok(None)
            }),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::CommandContext;
    use crate::infrastructure::database::Database;

    fn setup() -> (Arc<Database>, CommandService) {
        let db = Arc::new(Database::open_in_memory().unwrap());
        db.add_user("admin", None).unwrap();
        db.add_user("alice", Some("welcome")).unwrap();
        db.add_invite("zzz", "alice", None).unwrap();
        db.add_invite("aaa", "alice", None).unwrap();
        db.add_invite("used", "alice", Some("bob")).unwrap();

        let mut commands = CommandService::new();
        register_default_commands(&mut commands, db.clone(), vec!["admin".to_string()]);
        (db, commands)
    }

    fn ctx() -> CommandContext<'static> {
        CommandContext {
            bot_name: "helpbot",
            conversation: None,
        }
    }

    #[test]
    fn test_invites_lists_unused_codes() {
        let (db, commands) = setup();
        let alice = db.fetch_user("alice").unwrap();

        assert_eq!(
            commands.handle_command(&alice, "/invites", &ctx()).unwrap(),
            "Your unused invite codes are:\n\taaa\n\tzzz\n"
        );
    }

    #[test]
    fn test_invites_without_codes() {
        let (db, commands) = setup();
        let admin = db.fetch_user("admin").unwrap();

        assert_eq!(
            commands.handle_command(&admin, "/invites", &ctx()).unwrap(),
            "Sorry, you don't have any unused invite codes right now."
        );
    }

    #[test]
    fn test_stage_is_admin_only() {
        let (db, commands) = setup();
        let alice = db.fetch_user("alice").unwrap();

        let help = commands.handle_command(&alice, "/help", &ctx()).unwrap();
        assert!(help.contains("/invites"));
        assert!(!help.contains("/stage"));

        assert_eq!(
            commands.handle_command(&alice, "/stage alice none", &ctx()).unwrap(),
            "Sorry, you don't have permission to use this command."
        );
    }

    #[test]
    fn test_stage_moves_user() {
        let (db, commands) = setup();
        let admin = db.fetch_user("admin").unwrap();

        assert_eq!(
            commands.handle_command(&admin, "/stage Alice Roster_Groups", &ctx()).unwrap(),
            "Your /stage command was successful."
        );
        assert_eq!(db.fetch_user("alice").unwrap().stage.as_deref(), Some("roster_groups"));

        commands.handle_command(&admin, "/stage alice none", &ctx()).unwrap();
        assert_eq!(db.fetch_user("alice").unwrap().stage, None);
    }

    #[test]
    fn test_stage_unknown_user_and_bad_args() {
        let (db, commands) = setup();
        let admin = db.fetch_user("admin").unwrap();

        assert_eq!(
            commands.handle_command(&admin, "/stage carol welcome", &ctx()).unwrap(),
            "Sorry, carol isn't a registered user."
        );
        assert!(commands
            .handle_command(&admin, "/stage carol", &ctx())
            .unwrap()
            .starts_with("Sorry, that format wasn't quite right."));
    }
}
