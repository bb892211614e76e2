use crate::providers::{Message, Role};

/// The in-memory conversation: ordered transcript, in-flight flag and the
/// last thing the user said.
#[derive(Debug, Default)]
pub struct SessionState {
    messages: Vec<Message>,
    busy: bool,
    last_user_message: Option<String>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    pub fn last_user_message(&self) -> Option<&str> {
        self.last_user_message.as_deref()
    }

    /// Records a user turn. Blank input is ignored and yields `None`.
    pub fn append_user(&mut self, text: &str) -> Option<Message> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        let message = Message::user(text);
        self.messages.push(message.clone());
        self.last_user_message = Some(text.to_string());
        Some(message)
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Marks a request as in flight. Returns false if one already is.
    pub fn try_begin(&mut self) -> bool {
        if self.busy {
            return false;
        }
        self.busy = true;
        true
    }

    pub fn finish(&mut self) {
        self.busy = false;
    }

    /// Removes the most recent assistant entry, but only when it reports a
    /// failure.
    pub fn take_trailing_error(&mut self) -> Option<Message> {
        let idx = self.messages.iter().rposition(|m| m.role == Role::Assistant)?;
        if self.messages[idx].is_error {
            Some(self.messages.remove(idx))
        } else {
            None
        }
    }

    pub fn clear(&mut self) {
        self.messages.clear();
        self.last_user_message = None;
    }
}
