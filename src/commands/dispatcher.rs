use super::{
    COMMAND_MARKER,
    handler::{
        ClearCommand, ExportCommand, HelpCommand, ModelCommand, QuitCommand, RetryCommand,
        RunCommand, SetCommand, SettingsCommand, SystemCommand, TempCommand, TestCommand,
        TokensCommand,
    },
    registry::CommandRegistry,
};
use crate::context::ChatContext;
use std::sync::Arc;
use tracing::debug;

/// What happened to a line of user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    /// Plain chat text; the caller should send it.
    NotCommand,
    Handled,
    /// Marker-prefixed but not a known command. A notice was emitted and the
    /// text must not be sent as chat.
    Unknown(String),
}

/// Splits `/name   rest of line` into `("name", "rest of line")`.
pub fn parse_command(input: &str) -> Option<(String, &str)> {
    let body = input.trim_start().strip_prefix(COMMAND_MARKER)?;
    let (name, args) = match body.find(char::is_whitespace) {
        Some(idx) => (&body[..idx], body[idx..].trim_start()),
        None => (body, ""),
    };
    Some((name.to_lowercase(), args.trim_end()))
}

#[derive(Clone)]
pub struct CommandDispatcher {
    registry: Arc<CommandRegistry>,
}

impl CommandDispatcher {
    pub fn new(registry: Arc<CommandRegistry>) -> Self {
        Self { registry }
    }

    pub async fn dispatch(&self, input: &str, ctx: &mut ChatContext) -> CommandOutcome {
        let Some((name, args)) = parse_command(input) else {
            return CommandOutcome::NotCommand;
        };

        let Some(handler) = self.registry.get(&name) else {
            debug!(command = %name, "unknown command");
            ctx.notice(format!(
                "Unknown command: {}{}. Type /help for available commands.",
                COMMAND_MARKER, name
            ));
            return CommandOutcome::Unknown(name);
        };

        debug!(command = %name, "dispatching command");
        match handler.execute(ctx, args).await {
            Ok(Some(output)) => ctx.notice(output),
            Ok(None) => {}
            Err(e) => ctx.notice(e.to_string()),
        }
        CommandOutcome::Handled
    }

    pub fn get_command_names(&self) -> Vec<String> {
        self.registry.get_command_names()
    }
}

pub fn create_command_registry() -> CommandDispatcher {
    let mut registry = CommandRegistry::new();

    registry.register("settings", SettingsCommand);
    registry.register("clear", ClearCommand);
    registry.register("model", ModelCommand);
    registry.register("system", SystemCommand);
    registry.register("temp", TempCommand);
    registry.register("tokens", TokensCommand);
    registry.register("retry", RetryCommand);
    registry.register("export", ExportCommand);
    registry.register("set", SetCommand);
    registry.register("test", TestCommand);
    registry.register("run", RunCommand);

    let quit: Arc<dyn super::handler::CommandHandler> = Arc::new(QuitCommand);
    registry.register_shared("quit", quit.clone());
    registry.register_shared("exit", quit);

    let mut lines = vec![HelpCommand::USAGE];
    lines.extend(registry.help_lines());
    registry.register("help", HelpCommand::new(lines));

    CommandDispatcher::new(Arc::new(registry))
}
