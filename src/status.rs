use crate::events::{ChatEvent, EventSink};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Status {
    #[default]
    Idle,
    Connected,
    Error,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Status::Idle => "idle",
            Status::Connected => "connected",
            Status::Error => "error",
        })
    }
}

/// Tracks the connection indicator and announces every transition.
#[derive(Debug, Default)]
pub struct StatusReporter {
    current: Status,
}

impl StatusReporter {
    pub fn current(&self) -> Status {
        self.current
    }

    pub fn report(&mut self, status: Status, sink: &mut dyn EventSink) {
        self.current = status;
        sink.emit(ChatEvent::Status(status));
    }
}
