use crate::providers::Message;
use chrono::{DateTime, Local};

pub const EXPORT_SEPARATOR: &str = "\n\n----------------------------------------\n\n";

#[derive(Debug, Clone, PartialEq)]
pub struct ExportDocument {
    pub filename: String,
    pub contents: String,
}

/// Serializes a transcript into a plain UTF-8 text document.
pub struct TranscriptExporter;

impl TranscriptExporter {
    /// Returns `None` when there is nothing to export.
    pub fn export(messages: &[Message]) -> Option<ExportDocument> {
        Self::export_at(messages, Local::now())
    }

    pub fn export_at(messages: &[Message], at: DateTime<Local>) -> Option<ExportDocument> {
        if messages.is_empty() {
            return None;
        }

        let contents = messages
            .iter()
            .map(|m| format!("[{}]\n{}", m.role.label().to_uppercase(), m.content))
            .collect::<Vec<_>>()
            .join(EXPORT_SEPARATOR);

        Some(ExportDocument {
            filename: format!("xchat-transcript-{}.txt", at.format("%Y%m%d-%H%M%S")),
            contents,
        })
    }
}
