use crate::commands::{COMMAND_MARKER, CommandDispatcher};
use crate::config::ConfigStore;
use crate::core::error::ChatError;

use console::style;
use rustyline::completion::{Completer, Pair};
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::{Hinter, HistoryHinter};
use rustyline::history::FileHistory;
use rustyline::validate::Validator;
use rustyline::{CompletionType, Config, Context, EditMode, Editor, Helper};
use std::borrow::Cow;
use std::path::PathBuf;
use tracing::debug;

/// Completes command names and hints from history.
pub struct ChatHelper {
    commands: Vec<String>,
    history_hinter: HistoryHinter,
}

impl ChatHelper {
    pub fn new(dispatcher: &CommandDispatcher) -> Self {
        Self {
            commands: dispatcher.get_command_names(),
            history_hinter: HistoryHinter {},
        }
    }
}

/// Command names matching the partial `/name` before `pos`. Returns the
/// replacement start and the candidates, or `None` when `line` is not a
/// command name being typed.
pub fn complete_command(commands: &[String], line: &str, pos: usize) -> Option<(usize, Vec<Pair>)> {
    let typed = line.get(..pos)?.strip_prefix(COMMAND_MARKER)?;
    if typed.contains(char::is_whitespace) {
        return None;
    }
    let matches: Vec<Pair> = commands
        .iter()
        .filter(|name| name.starts_with(typed))
        .map(|name| Pair {
            display: name.clone(),
            replacement: name.clone(),
        })
        .collect();
    Some((COMMAND_MARKER.len_utf8(), matches))
}

impl Completer for ChatHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        Ok(complete_command(&self.commands, line, pos).unwrap_or((pos, Vec::new())))
    }
}

impl Hinter for ChatHelper {
    type Hint = String;

    fn hint(&self, line: &str, pos: usize, ctx: &Context<'_>) -> Option<String> {
        self.history_hinter.hint(line, pos, ctx)
    }
}

impl Highlighter for ChatHelper {
    fn highlight_hint<'h>(&self, hint: &'h str) -> Cow<'h, str> {
        Cow::Owned(style(hint).dim().to_string())
    }
}

impl Validator for ChatHelper {}

impl Helper for ChatHelper {}

pub type ChatEditor = Editor<ChatHelper, FileHistory>;

pub fn history_path() -> PathBuf {
    ConfigStore::config_dir().join("input_history.txt")
}

/// Creates a configured rustyline editor with history loaded.
pub fn create_editor(dispatcher: &CommandDispatcher) -> Result<ChatEditor, ChatError> {
    let config = Config::builder()
        .history_ignore_space(true)
        .history_ignore_dups(true)
        .map_err(|e| ChatError::Input(format!("Failed to configure line editor: {}", e)))?
        .completion_type(CompletionType::List)
        .edit_mode(EditMode::Emacs)
        .build();

    let mut editor = Editor::with_config(config)
        .map_err(|e| ChatError::Input(format!("Failed to create line editor: {}", e)))?;
    editor.set_helper(Some(ChatHelper::new(dispatcher)));

    if let Err(e) = editor.load_history(&history_path()) {
        debug!(error = %e, "no input history loaded");
    }

    Ok(editor)
}

/// Reads one line. `None` means the user asked to leave.
pub fn read_input(editor: &mut ChatEditor) -> Result<Option<String>, ChatError> {
    let prompt = if cfg!(windows) && std::env::var("PSModulePath").is_ok() {
        "> ".to_string()
    } else {
        style("> ").bold().cyan().to_string()
    };
    match editor.readline(&prompt) {
        Ok(line) => {
            if !line.trim().is_empty() {
                editor
                    .add_history_entry(line.as_str())
                    .map_err(|e| ChatError::Input(format!("Failed to add history entry: {}", e)))?;
            }
            Ok(Some(line))
        }
        Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => Ok(None),
        Err(err) => Err(ChatError::Input(err.to_string())),
    }
}

pub fn save_history(editor: &mut ChatEditor) -> Result<(), ChatError> {
    let path = history_path();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    editor
        .save_history(&path)
        .map_err(|e| ChatError::Input(format!("Failed to save history: {}", e)))
}
