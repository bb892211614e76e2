pub mod dispatcher;
pub mod handler;
pub mod registry;

pub use dispatcher::{CommandDispatcher, CommandOutcome, create_command_registry, parse_command};

/// Leading character that marks a line as a command.
pub const COMMAND_MARKER: char = '/';
