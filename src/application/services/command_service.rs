use crate::application::errors::CommandError;
use crate::domain::entities::command::HELP_COMMAND;
use crate::domain::entities::{CommandContext, CommandOutcome, CommandRegistry, SlashCommand, User};

pub const PERMISSION_DENIED_REPLY: &str = "Sorry, you don't have permission to use this command.";
pub const NO_PERMITTED_COMMANDS_REPLY: &str =
    "You do not have permission to send any commands to this vinebot.";

/// Service for parsing and executing slash commands
#[derive(Default)]
pub struct CommandService {
    registry: CommandRegistry,
}

impl CommandService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, command: SlashCommand) -> bool {
        self.registry.add(command)
    }

    pub fn remove(&mut self, name: &str) -> bool {
        self.registry.remove(name)
    }

    pub fn registry(&self) -> &CommandRegistry {
        &self.registry
    }

    /// A slash followed by something other than more slashes
    pub fn is_command(&self, message: &str) -> bool {
        message
            .trim_start()
            .strip_prefix('/')
            .is_some_and(|rest| !rest.trim_start_matches('/').is_empty())
    }

    /// Parse and run a command, returning the reply text.
    ///
    /// Classified outcomes become replies; unclassified errors from sender
    /// checks, argument transforms or actions are returned to the caller.
    pub fn handle_command(
        &self,
        sender: &User,
        message: &str,
        ctx: &CommandContext<'_>,
    ) -> Result<String, CommandError> {
        let message = message.trim().trim_start_matches('/');
        let (name, arg_string) = message.split_once(' ').unwrap_or((message, ""));
        let name = name.to_lowercase();

        if let Some(command) = self.registry.get(&name) {
            tracing::debug!("{} ran /{}", sender.name, command.name());
            let reply = match command.execute(sender, arg_string, ctx)? {
                CommandOutcome::Reply(text) => text,
                CommandOutcome::Succeeded => format!("Your /{} command was successful.", command.name()),
                CommandOutcome::ExecutionFailure(reason) => format!("Sorry, {}", reason),
                CommandOutcome::PermissionDenied => PERMISSION_DENIED_REPLY.to_string(),
                CommandOutcome::ArgFormatInvalid => format!(
                    "Sorry, that format wasn't quite right. Try:\n\t/{} {}",
                    command.name(),
                    command.arg_format()
                ),
            };
            Ok(reply)
        } else if name == HELP_COMMAND {
            self.help(sender, ctx)
        } else {
            Ok(format!(
                "Sorry, /{} isn't a registered command. Type /help to see a full list.",
                name
            ))
        }
    }

    fn help(&self, sender: &User, ctx: &CommandContext<'_>) -> Result<String, CommandError> {
        let visible = self.registry.visible_to(sender, ctx)?;
        if visible.is_empty() {
            return Ok(NO_PERMITTED_COMMANDS_REPLY.to_string());
        }

        let mut help = "The available commands are:\n".to_string();
        for command in visible {
            if command.arg_format().is_empty() {
                help.push_str(&format!("\t/{}: {}\n", command.name(), command.description()));
            } else {
                help.push_str(&format!(
                    "\t/{} {}: {}\n",
                    command.name(),
                    command.arg_format(),
                    command.description()
                ));
            }
        }
        Ok(help)
    }
}
