//! Test doubles shared by the unit tests.

use crate::config::{Config, ConfigStore};
use crate::context::ChatContext;
use crate::core::error::ChatError;
use crate::events::{ChatEvent, EventSink};
use crate::providers::{HttpResponse, Router, Transport};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub payload: Value,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Replays scripted responses in order and records every request it sees.
#[derive(Default)]
pub struct RecordingTransport {
    responses: Mutex<VecDeque<Result<HttpResponse, ChatError>>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(self, status: u16, body: &str) -> Self {
        self.responses
            .lock()
            .expect("responses lock")
            .push_back(Ok(HttpResponse {
                status,
                body: body.to_string(),
            }));
        self
    }

    pub fn respond_json(self, status: u16, body: Value) -> Self {
        self.respond(status, &body.to_string())
    }

    pub fn fail(self, error: ChatError) -> Self {
        self.responses
            .lock()
            .expect("responses lock")
            .push_back(Err(error));
        self
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().expect("requests lock").clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().expect("requests lock").len()
    }

    pub fn single_request(&self) -> RecordedRequest {
        let requests = self.requests();
        assert_eq!(requests.len(), 1, "expected exactly one request");
        requests.into_iter().next().expect("one request")
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn post_json(
        &self,
        url: &str,
        headers: &[(String, String)],
        payload: &Value,
    ) -> Result<HttpResponse, ChatError> {
        self.requests
            .lock()
            .expect("requests lock")
            .push(RecordedRequest {
                url: url.to_string(),
                headers: headers.to_vec(),
                payload: payload.clone(),
            });

        self.responses
            .lock()
            .expect("responses lock")
            .pop_front()
            .unwrap_or_else(|| {
                Ok(HttpResponse {
                    status: 500,
                    body: "no scripted response".to_string(),
                })
            })
    }
}

/// Collects every event the core emits.
#[derive(Clone, Default)]
pub struct RecordingSink {
    events: Arc<Mutex<Vec<ChatEvent>>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<ChatEvent> {
        self.events.lock().expect("events lock").clone()
    }

    pub fn notices(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                ChatEvent::Notice(text) => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn last_notice(&self) -> Option<String> {
        self.notices().pop()
    }

    pub fn clear(&self) {
        self.events.lock().expect("events lock").clear();
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: ChatEvent) {
        self.events.lock().expect("events lock").push(event);
    }
}

/// A context wired to in-memory doubles and a throwaway config file.
pub struct Harness {
    pub ctx: ChatContext,
    pub transport: Arc<RecordingTransport>,
    pub sink: RecordingSink,
    pub store: ConfigStore,
    _dir: TempDir,
}

pub fn harness(config: Config, transport: RecordingTransport) -> Harness {
    let dir = TempDir::new().expect("temp dir");
    let store = ConfigStore::new(dir.path().join("config.yaml"));
    let transport = Arc::new(transport);
    let sink = RecordingSink::default();
    let ctx = ChatContext::new(
        store.clone(),
        config,
        Router::new(transport.clone()),
        Box::new(sink.clone()),
    );
    Harness {
        ctx,
        transport,
        sink,
        store,
        _dir: dir,
    }
}
