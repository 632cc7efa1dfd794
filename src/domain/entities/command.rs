use std::collections::HashMap;

use super::{Conversation, User};
use crate::application::errors::CommandError;

/// Name of the built-in listing command; never stored in a registry
pub const HELP_COMMAND: &str = "help";

/// What a command can see about where it was sent
#[derive(Debug, Clone, Copy)]
pub struct CommandContext<'a> {
    pub bot_name: &'a str,
    pub conversation: Option<&'a Conversation>,
}

/// Permission predicate: may `sender` use this command here?
pub type SenderCheck =
    Box<dyn Fn(&User, &CommandContext<'_>) -> Result<bool, CommandError> + Send + Sync>;

/// Turns `(sender, context, raw argument string, lowercased tokens)` into the
/// action's argument list. `Ok(None)` means the arguments are malformed; an
/// empty list is a valid argument list.
pub type ArgTransform = Box<
    dyn Fn(&User, &CommandContext<'_>, &str, &[String]) -> Result<Option<Vec<String>>, CommandError>
        + Send
        + Sync,
>;

/// Command body. `Ok(None)` means it succeeded with nothing to say.
pub type CommandAction = Box<dyn Fn(&[String]) -> Result<Option<String>, CommandError> + Send + Sync>;

/// Classified result of running a slash command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    Reply(String),
    Succeeded,
    PermissionDenied,
    ArgFormatInvalid,
    ExecutionFailure(String),
}

/// Represents a registered slash command
pub struct SlashCommand {
    name: String,
    arg_format: String,
    description: String,
    validate_sender: SenderCheck,
    transform_args: ArgTransform,
    action: CommandAction,
}

impl SlashCommand {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into().to_lowercase(),
            arg_format: String::new(),
            description: String::new(),
            validate_sender: Box::new(|_, _| Ok(true)),
            transform_args: Box::new(|_, _, _, tokens| Ok(Some(tokens.to_vec()))),
            action: Box::new(|_| Ok(None)),
        }
    }

    pub fn with_arg_format(mut self, arg_format: impl Into<String>) -> Self {
        self.arg_format = arg_format.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_sender_check<F>(mut self, check: F) -> Self
    where
        F: Fn(&User, &CommandContext<'_>) -> Result<bool, CommandError> + Send + Sync + 'static,
    {
        self.validate_sender = Box::new(check);
        self
    }

    pub fn with_args<F>(mut self, transform: F) -> Self
    where
        F: Fn(&User, &CommandContext<'_>, &str, &[String]) -> Result<Option<Vec<String>>, CommandError>
            + Send
            + Sync
            + 'static,
    {
        self.transform_args = Box::new(transform);
        self
    }

    pub fn with_action<F>(mut self, action: F) -> Self
    where
        F: Fn(&[String]) -> Result<Option<String>, CommandError> + Send + Sync + 'static,
    {
        self.action = Box::new(action);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn arg_format(&self) -> &str {
        &self.arg_format
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn allows(&self, sender: &User, ctx: &CommandContext<'_>) -> Result<bool, CommandError> {
        (self.validate_sender)(sender, ctx)
    }

    /// Run the permission check, argument transform and action in order.
    ///
    /// Only `CommandError::ExecutionFailed` from the action is folded into the
    /// outcome; any other error from any of the three is returned to the caller.
    pub fn execute(
        &self,
        sender: &User,
        arg_string: &str,
        ctx: &CommandContext<'_>,
    ) -> Result<CommandOutcome, CommandError> {
        if !self.allows(sender, ctx)? {
            return Ok(CommandOutcome::PermissionDenied);
        }

        let tokens: Vec<String> = arg_string
            .split(' ')
            .filter(|token| !token.is_empty())
            .map(str::to_lowercase)
            .collect();

        let Some(args) = (self.transform_args)(sender, ctx, arg_string, &tokens)? else {
            return Ok(CommandOutcome::ArgFormatInvalid);
        };

        match (self.action)(&args) {
            Ok(Some(text)) => Ok(CommandOutcome::Reply(text)),
            Ok(None) => Ok(CommandOutcome::Succeeded),
            Err(CommandError::ExecutionFailed(reason)) => Ok(CommandOutcome::ExecutionFailure(reason)),
            Err(other) => Err(other),
        }
    }
}

impl std::fmt::Debug for SlashCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlashCommand")
            .field("name", &self.name)
            .field("arg_format", &self.arg_format)
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

/// Command registry keyed by lowercase command name
#[derive(Default)]
pub struct CommandRegistry {
    commands: HashMap<String, SlashCommand>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a command. Duplicates and `help` are refused with an error log.
    pub fn add(&mut self, command: SlashCommand) -> bool {
        if self.commands.contains_key(command.name()) {
            tracing::error!("/{} is already a registered command.", command.name());
            false
        } else if command.name() == HELP_COMMAND {
            tracing::error!("The /{} command is built in and can not be added.", HELP_COMMAND);
            false
        } else {
            self.commands.insert(command.name().to_string(), command);
            true
        }
    }

    pub fn remove(&mut self, name: &str) -> bool {
        let name = name.to_lowercase();
        if self.commands.remove(&name).is_some() {
            true
        } else if name == HELP_COMMAND {
            tracing::error!("The /{} command is built in and can not be removed.", HELP_COMMAND);
            false
        } else {
            tracing::error!("/{} is not a registered command.", name);
            false
        }
    }

    pub fn get(&self, name: &str) -> Option<&SlashCommand> {
        self.commands.get(&name.to_lowercase())
    }

    /// Commands `sender` may use here, ordered by name
    pub fn visible_to(
        &self,
        sender: &User,
        ctx: &CommandContext<'_>,
    ) -> Result<Vec<&SlashCommand>, CommandError> {
        let mut visible = Vec::new();
        for command in self.commands.values() {
            if command.allows(sender, ctx)? {
                visible.push(command);
            }
        }
        visible.sort_by(|a, b| a.name().cmp(b.name()));
        Ok(visible)
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}
