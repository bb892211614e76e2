use crate::exporter::ExportDocument;
use crate::providers::Message;
use crate::status::Status;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Panel {
    Help,
    Settings,
}

/// State changes the core announces to whatever is presenting it.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatEvent {
    MessageAppended(Message),
    MessageRemoved(Message),
    TranscriptCleared,
    Status(Status),
    /// True while a backend call is in flight.
    Busy(bool),
    /// Ephemeral feedback; never stored in the transcript.
    Notice(String),
    Panel { panel: Panel, open: bool },
    Export(ExportDocument),
}

pub trait EventSink: Send + Sync {
    fn emit(&mut self, event: ChatEvent);
}

/// At most one panel is open at a time.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PanelState {
    open: Option<Panel>,
}

impl PanelState {
    pub fn is_open(&self, panel: Panel) -> bool {
        self.open == Some(panel)
    }

    /// Flips `panel` and returns the events describing the change, closing
    /// the other panel first when needed.
    pub fn toggle(&mut self, panel: Panel) -> Vec<ChatEvent> {
        let mut events = Vec::new();
        match self.open {
            Some(current) if current == panel => {
                self.open = None;
                events.push(ChatEvent::Panel { panel, open: false });
            }
            Some(other) => {
                events.push(ChatEvent::Panel {
                    panel: other,
                    open: false,
                });
                self.open = Some(panel);
                events.push(ChatEvent::Panel { panel, open: true });
            }
            None => {
                self.open = Some(panel);
                events.push(ChatEvent::Panel { panel, open: true });
            }
        }
        events
    }
}
