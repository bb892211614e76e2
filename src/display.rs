use crate::events::{ChatEvent, EventSink, Panel};
use crate::exporter::ExportDocument;
use crate::providers::{Message, Role};
use crate::status::Status;
use crate::utils::text::{display_width, wrap_text};
use console::{Term, style};
use std::fs;
use std::path::PathBuf;
use termimad::MadSkin;
use tracing::warn;

const MIN_BOX_WIDTH: usize = 40;
const MAX_BOX_WIDTH: usize = 120;

/// Renders core events on the terminal.
pub struct TerminalPresenter {
    term: Term,
    skin: MadSkin,
    export_dir: PathBuf,
    status: Status,
    thinking_shown: bool,
}

impl TerminalPresenter {
    pub fn new(export_dir: impl Into<PathBuf>) -> Self {
        Self {
            term: Term::stdout(),
            skin: MadSkin::default(),
            export_dir: export_dir.into(),
            status: Status::default(),
            thinking_shown: false,
        }
    }

    fn box_width(&self) -> usize {
        let terminal_width = self.term.size().1 as usize;
        terminal_width
            .saturating_sub(4)
            .clamp(MIN_BOX_WIDTH, MAX_BOX_WIDTH)
    }

    fn clear_thinking(&mut self) {
        if self.thinking_shown {
            self.thinking_shown = false;
            if self.term.is_term() {
                if let Err(e) = self.term.clear_last_lines(1) {
                    warn!(error = %e, "could not clear the thinking line");
                }
            }
        }
    }

    fn line(&mut self, text: impl AsRef<str>) {
        self.clear_thinking();
        if let Err(e) = self.term.write_line(text.as_ref()) {
            warn!(error = %e, "terminal write failed");
        }
    }

    fn show_message(&mut self, message: &Message) {
        match message.role {
            // The user already sees what they typed.
            Role::User | Role::System => {}
            Role::Note => {
                for line in message.content.lines() {
                    self.line(style(line).yellow().to_string());
                }
            }
            Role::Assistant if message.is_error => {
                self.line(style(&message.content).bold().red().to_string());
            }
            Role::Assistant => {
                if looks_like_markdown(&message.content) {
                    let rendered = self.skin.term_text(&message.content).to_string();
                    self.line(rendered);
                } else {
                    let width = self.box_width();
                    self.line("");
                    self.line(style("🤖 ASSISTANT").bold().blue().to_string());
                    for (i, line) in box_lines(&message.content, width).into_iter().enumerate() {
                        let styled = if i == 0 || line.starts_with('└') {
                            style(line).dim().blue().to_string()
                        } else {
                            line
                        };
                        self.line(styled);
                    }
                }
            }
        }
    }

    /// Only failures and recoveries are worth a line of their own.
    fn show_status(&mut self, status: Status) {
        let previous = std::mem::replace(&mut self.status, status);
        if status == previous || (status != Status::Error && previous != Status::Error) {
            return;
        }
        let marker = match status {
            Status::Idle => style("●").dim(),
            Status::Connected => style("●").green(),
            Status::Error => style("●").red(),
        };
        self.line(format!("{} {}", marker, style(status).dim()));
    }

    fn save_export(&mut self, document: &ExportDocument) {
        let path = self.export_dir.join(&document.filename);
        match fs::write(&path, &document.contents) {
            Ok(()) => self.line(format!(
                "{} {}",
                style("Transcript saved to").green(),
                path.display()
            )),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "export failed");
                self.line(style(format!("Could not write {}: {}", path.display(), e)).red().to_string());
            }
        }
    }
}

impl EventSink for TerminalPresenter {
    fn emit(&mut self, event: ChatEvent) {
        match event {
            ChatEvent::MessageAppended(message) => self.show_message(&message),
            ChatEvent::MessageRemoved(_) => {}
            ChatEvent::TranscriptCleared => {
                if self.term.is_term() {
                    if let Err(e) = self.term.clear_screen() {
                        warn!(error = %e, "could not clear the screen");
                    }
                }
            }
            ChatEvent::Status(status) => self.show_status(status),
            ChatEvent::Busy(true) => {
                self.line(style("thinking…").dim().italic().to_string());
                self.thinking_shown = true;
            }
            ChatEvent::Busy(false) => self.clear_thinking(),
            ChatEvent::Notice(text) => {
                for line in text.lines() {
                    self.line(style(line).cyan().to_string());
                }
            }
            ChatEvent::Panel { panel, open: false } => {
                let name = match panel {
                    Panel::Help => "help",
                    Panel::Settings => "settings",
                };
                self.line(style(format!("({} closed)", name)).dim().to_string());
            }
            ChatEvent::Panel { open: true, .. } => {}
            ChatEvent::Export(document) => self.save_export(&document),
        }
    }
}

/// Whether a reply is better rendered as markdown than as plain boxed text.
pub fn looks_like_markdown(text: &str) -> bool {
    text.contains("```")
        || text.contains('`')
        || text.contains("**")
        || text
            .lines()
            .map(str::trim_start)
            .any(|line| line.starts_with("# ") || line.starts_with("## ") || line.starts_with("- "))
}

/// Lays `text` out in a box at most `max_width` columns wide.
pub fn box_lines(text: &str, max_width: usize) -> Vec<String> {
    let inner = max_width.saturating_sub(4).max(1);
    let mut wrapped = Vec::new();
    for line in text.lines() {
        if line.is_empty() {
            wrapped.push(String::new());
        } else {
            wrapped.extend(wrap_text(line, inner));
        }
    }

    let content_width = wrapped.iter().map(|l| display_width(l)).max().unwrap_or(0);
    let box_width = (content_width + 4).min(max_width.max(4));

    let mut lines = Vec::with_capacity(wrapped.len() + 2);
    lines.push(format!("┌{}┐", "─".repeat(box_width - 2)));
    for line in wrapped {
        let padding = box_width.saturating_sub(display_width(&line) + 3);
        lines.push(format!("│ {}{}│", line, " ".repeat(padding)));
    }
    lines.push(format!("└{}┘", "─".repeat(box_width - 2)));
    lines
}
