use crate::config::{Config, ConfigOverrides, ConfigStore};
use crate::core::error::ChatError;
use crate::events::{ChatEvent, EventSink, Panel, PanelState};
use crate::executor;
use crate::exporter::TranscriptExporter;
use crate::providers::{Message, Router};
use crate::session::SessionState;
use crate::status::{Status, StatusReporter};
use std::path::Path;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Token budget for the connection test.
pub const CONNECTION_TEST_MAX_TOKENS: u32 = 16;

/// Everything one chat session works on. Components receive this instead of
/// reaching for shared globals.
pub struct ChatContext {
    store: ConfigStore,
    /// What is on disk. Differs from `config` only by session overrides.
    saved: Config,
    config: Config,
    session: SessionState,
    status: StatusReporter,
    panels: PanelState,
    router: Router,
    sink: Box<dyn EventSink>,
    cancel: CancellationToken,
    should_continue: bool,
}

impl ChatContext {
    pub fn new(
        store: ConfigStore,
        config: Config,
        router: Router,
        sink: Box<dyn EventSink>,
    ) -> Self {
        Self {
            store,
            saved: config.clone(),
            config,
            session: SessionState::new(),
            status: StatusReporter::default(),
            panels: PanelState::default(),
            router,
            sink,
            cancel: CancellationToken::new(),
            should_continue: true,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn config_path(&self) -> &Path {
        self.store.path()
    }

    /// Adjusts the in-memory configuration for this session only.
    pub fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
        overrides.apply(&mut self.config);
    }

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut SessionState {
        &mut self.session
    }

    pub fn status(&self) -> Status {
        self.status.current()
    }

    pub fn panels(&self) -> PanelState {
        self.panels
    }

    pub fn should_continue(&self) -> bool {
        self.should_continue
    }

    pub fn request_quit(&mut self) {
        self.should_continue = false;
    }

    /// Handle that aborts the request currently in flight.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn shutdown(&mut self) {
        self.cancel.cancel();
        self.should_continue = false;
    }

    pub fn emit(&mut self, event: ChatEvent) {
        self.sink.emit(event);
    }

    pub fn notice(&mut self, text: impl Into<String>) {
        self.emit(ChatEvent::Notice(text.into()));
    }

    fn push_message(&mut self, message: Message) {
        self.session.push(message.clone());
        self.emit(ChatEvent::MessageAppended(message));
    }

    fn report(&mut self, status: Status) {
        self.status.report(status, self.sink.as_mut());
    }

    /// Applies `change` to the stored configuration and persists it. The
    /// in-memory copy only changes once the save succeeded.
    pub fn update_config<F>(&mut self, change: F) -> Result<(), ChatError>
    where
        F: Fn(&mut Config),
    {
        let mut updated = self.saved.clone();
        change(&mut updated);
        self.store.save(&updated)?;
        self.saved = updated;
        change(&mut self.config);
        Ok(())
    }

    pub fn toggle_panel(&mut self, panel: Panel) -> bool {
        for event in self.panels.toggle(panel) {
            self.emit(event);
        }
        self.panels.is_open(panel)
    }

    /// Records a user turn; blank text is ignored. Does not start inference.
    pub fn append_user(&mut self, text: &str) -> bool {
        match self.session.append_user(text) {
            Some(message) => {
                self.emit(ChatEvent::MessageAppended(message));
                true
            }
            None => false,
        }
    }

    fn begin_request(&mut self) -> bool {
        if !self.session.try_begin() {
            debug!("request already in flight, ignoring");
            return false;
        }
        self.emit(ChatEvent::Busy(true));
        self.report(Status::Connected);
        true
    }

    fn end_request(&mut self) {
        self.session.finish();
        self.reset_cancellation();
        self.emit(ChatEvent::Busy(false));
    }

    /// Replaces a spent cancellation token so the next request can run.
    /// Does nothing once the session is shutting down.
    pub fn reset_cancellation(&mut self) {
        if self.cancel.is_cancelled() && self.should_continue {
            self.cancel = CancellationToken::new();
        }
    }

    async fn call_backend(
        &self,
        transcript: &[Message],
        config: &Config,
        max_tokens_override: Option<u32>,
    ) -> Result<String, ChatError> {
        let token = self.cancel.clone();
        tokio::select! {
            biased;
            _ = token.cancelled() => Err(ChatError::Cancelled),
            reply = self.router.route(transcript, config, max_tokens_override) => reply,
        }
    }

    /// Sends the transcript to the configured backend and records the reply,
    /// or a visible error entry. A call while another is in flight does
    /// nothing.
    pub async fn run_inference(&mut self) {
        if !self.begin_request() {
            return;
        }

        let config = self.config.clone();
        let transcript = self.session.messages().to_vec();
        let result = self.call_backend(&transcript, &config, None).await;

        match result {
            Ok(reply) => {
                self.push_message(Message::assistant(reply));
                self.report(Status::Connected);
            }
            Err(e) => {
                if e.is_backend_failure() {
                    warn!(error = %e, backend = %config.backend, "chat request failed");
                } else {
                    debug!(error = %e, "chat request did not complete");
                }
                self.report(Status::Error);
                self.push_message(Message::error(format!("Error: {}", e)));
            }
        }

        self.end_request();
    }

    /// Re-runs the last exchange, discarding a failed reply first.
    pub async fn retry_last(&mut self) {
        if self.session.last_user_message().is_none() {
            self.notice("Nothing to retry.");
            return;
        }
        if self.session.is_busy() {
            self.notice("A request is already in progress.");
            return;
        }
        if let Some(removed) = self.session.take_trailing_error() {
            self.emit(ChatEvent::MessageRemoved(removed));
        }
        self.run_inference().await;
    }

    pub fn clear(&mut self) {
        self.session.clear();
        self.emit(ChatEvent::TranscriptCleared);
    }

    pub fn export(&mut self) {
        match TranscriptExporter::export(self.session.messages()) {
            Some(document) => self.emit(ChatEvent::Export(document)),
            None => self.notice("Nothing to export yet."),
        }
    }

    /// Persists the current configuration, then checks the backend with a
    /// tiny request. The save happens whatever the outcome.
    pub async fn test_connection(&mut self) {
        if let Err(e) = self.store.save(&self.saved) {
            warn!(error = %e, "could not save configuration before connection test");
            self.notice(format!("Could not save settings: {}", e));
        }
        if !self.begin_request() {
            self.notice("A request is already in progress.");
            return;
        }

        let config = self.config.clone();
        let ping = [Message::user("ping")];
        let result = self
            .call_backend(&ping, &config, Some(CONNECTION_TEST_MAX_TOKENS))
            .await;

        match result {
            Ok(_) => {
                self.report(Status::Connected);
                self.push_message(Message::note(format!(
                    "Connection OK: {} ({})",
                    config.backend,
                    config.effective_model()
                )));
            }
            Err(e) => {
                self.report(Status::Error);
                self.push_message(Message::note(format!("Connection test failed: {}", e)));
            }
        }

        self.end_request();
    }

    /// Sends `code` to the external execution service and records its output.
    pub async fn run_code(&mut self, code: &str) -> Result<(), ChatError> {
        if code.trim().is_empty() {
            return Err(ChatError::Input("Usage: /run <code>".to_string()));
        }
        if !self.session.try_begin() {
            return Err(ChatError::Input(
                "A request is already in progress.".to_string(),
            ));
        }
        self.emit(ChatEvent::Busy(true));

        let endpoint = self.config.effective_executor_endpoint();
        let token = self.cancel.clone();
        let result = tokio::select! {
            biased;
            _ = token.cancelled() => Err(ChatError::Cancelled),
            outcome = executor::run_code(self.router.transport(), &endpoint, code) => outcome,
        };

        match result {
            Ok(outcome) => {
                let label = if outcome.success() {
                    "Code execution"
                } else {
                    "Code execution (failed)"
                };
                self.push_message(Message::note(format!("{}:\n{}", label, outcome.summary())));
            }
            Err(e) => self.push_message(Message::note(format!("Code execution failed: {}", e))),
        }

        self.end_request();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Backend;
    use crate::providers::Role;
    use crate::testing::{RecordingTransport, harness};
    use serde_json::json;

    fn openai_reply(text: &str) -> serde_json::Value {
        json!({"choices": [{"message": {"content": text}}]})
    }

    #[tokio::test]
    async fn successful_inference_appends_reply() {
        let mut h = harness(
            Config::default(),
            RecordingTransport::new().respond_json(200, openai_reply("hello")),
        );
        assert!(h.ctx.append_user("hi"));
        h.ctx.run_inference().await;

        let messages = h.ctx.session().messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1], Message::assistant("hello"));
        assert!(!h.ctx.session().is_busy());
        assert_eq!(h.ctx.status(), Status::Connected);

        let events = h.sink.events();
        assert_eq!(events.first(), Some(&ChatEvent::MessageAppended(Message::user("hi"))));
        assert!(events.contains(&ChatEvent::Busy(true)));
        assert_eq!(events.last(), Some(&ChatEvent::Busy(false)));
    }

    #[tokio::test]
    async fn failure_is_recorded_visibly_and_session_recovers() {
        let mut h = harness(
            Config::default(),
            RecordingTransport::new().respond(500, "boom"),
        );
        h.ctx.append_user("hi");
        h.ctx.run_inference().await;

        let last = h.ctx.session().messages().last().cloned().expect("entry");
        assert!(last.is_error);
        assert_eq!(last.content, "Error: HTTP 500: boom");
        assert_eq!(h.ctx.status(), Status::Error);
        assert!(!h.ctx.session().is_busy());
        assert_eq!(h.ctx.session().last_user_message(), Some("hi"));
    }

    #[tokio::test]
    async fn transport_failure_is_recorded_and_retry_recovers() {
        let mut h = harness(
            Config::default(),
            RecordingTransport::new()
                .fail(ChatError::Network("Connection failed: refused".to_string()))
                .respond_json(200, openai_reply("back")),
        );
        h.ctx.append_user("hi");
        h.ctx.run_inference().await;

        let last = h.ctx.session().messages().last().cloned().expect("entry");
        assert_eq!(
            last,
            Message::error("Error: Network error: Connection failed: refused")
        );
        assert_eq!(h.ctx.status(), Status::Error);
        assert!(!h.ctx.session().is_busy());

        h.ctx.retry_last().await;
        assert_eq!(h.transport.call_count(), 2);
        assert_eq!(
            h.ctx.session().messages().last(),
            Some(&Message::assistant("back"))
        );
        assert_eq!(h.ctx.status(), Status::Connected);
    }

    #[tokio::test]
    async fn inference_while_busy_makes_no_call() {
        let mut h = harness(
            Config::default(),
            RecordingTransport::new().respond_json(200, openai_reply("hello")),
        );
        h.ctx.append_user("hi");
        assert!(h.ctx.session_mut().try_begin());

        h.ctx.run_inference().await;

        assert_eq!(h.transport.call_count(), 0);
        assert_eq!(h.ctx.session().messages().len(), 1);
        assert!(h.ctx.session().is_busy());
    }

    #[tokio::test]
    async fn retry_with_empty_transcript_only_notifies() {
        let mut h = harness(Config::default(), RecordingTransport::new());
        h.ctx.retry_last().await;

        assert_eq!(h.transport.call_count(), 0);
        assert_eq!(h.sink.last_notice().as_deref(), Some("Nothing to retry."));
    }

    #[tokio::test]
    async fn retry_replaces_failed_reply_without_duplicating_user_turn() {
        let mut h = harness(
            Config::default(),
            RecordingTransport::new()
                .respond(503, "loading")
                .respond_json(200, openai_reply("recovered")),
        );
        h.ctx.append_user("hi");
        h.ctx.run_inference().await;
        h.ctx.retry_last().await;

        let contents: Vec<(Role, String)> = h
            .ctx
            .session()
            .messages()
            .iter()
            .map(|m| (m.role, m.content.clone()))
            .collect();
        assert_eq!(
            contents,
            vec![
                (Role::User, "hi".to_string()),
                (Role::Assistant, "recovered".to_string()),
            ]
        );

        let second = &h.transport.requests()[1];
        let sent = second.payload["messages"].as_array().expect("messages").clone();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[1], json!({"role": "user", "content": "hi"}));
    }

    #[tokio::test]
    async fn error_entries_and_notes_never_reach_the_backend() {
        let mut h = harness(
            Config::default(),
            RecordingTransport::new()
                .respond(500, "down")
                .respond_json(200, openai_reply("ok")),
        );
        h.ctx.append_user("first");
        h.ctx.run_inference().await;
        h.ctx.append_user("second");
        h.ctx.run_inference().await;

        let sent = h.transport.requests()[1].payload["messages"].clone();
        let roles: Vec<&str> = sent
            .as_array()
            .expect("messages")
            .iter()
            .filter_map(|m| m["role"].as_str())
            .collect();
        assert_eq!(roles, vec!["system", "user", "user"]);
    }

    #[tokio::test]
    async fn cancelled_request_clears_busy_and_rearms() {
        let mut h = harness(
            Config::default(),
            RecordingTransport::new().respond_json(200, openai_reply("late")),
        );
        h.ctx.append_user("hi");
        h.ctx.cancellation_token().cancel();
        h.ctx.run_inference().await;

        let last = h.ctx.session().messages().last().cloned().expect("entry");
        assert_eq!(last, Message::error("Error: Request cancelled"));
        assert!(!h.ctx.session().is_busy());
        assert!(!h.ctx.cancellation_token().is_cancelled());
    }

    #[tokio::test]
    async fn connection_test_persists_config_even_when_it_fails() {
        let config = Config {
            backend: Backend::Anthropic,
            model: Some("claude-test".to_string()),
            ..Default::default()
        };
        let mut h = harness(config.clone(), RecordingTransport::new());

        h.ctx.test_connection().await;

        assert_eq!(h.store.load(), config);
        assert_eq!(h.transport.call_count(), 0);
        assert_eq!(h.ctx.status(), Status::Error);
        let note = h.ctx.session().messages().last().cloned().expect("note");
        assert_eq!(note.role, Role::Note);
        assert!(note.content.starts_with("Connection test failed"));
    }

    #[tokio::test]
    async fn connection_test_uses_small_token_budget() {
        let mut h = harness(
            Config::default(),
            RecordingTransport::new().respond_json(200, openai_reply("pong")),
        );
        h.ctx.test_connection().await;

        let sent = h.transport.single_request();
        assert_eq!(sent.payload["max_tokens"], json!(CONNECTION_TEST_MAX_TOKENS));
        assert_eq!(h.ctx.status(), Status::Connected);
        assert!(h.ctx.session().last_user_message().is_none());
    }

    #[tokio::test]
    async fn code_runs_through_the_executor() {
        let mut h = harness(
            Config::default(),
            RecordingTransport::new()
                .respond_json(200, json!({"stdout": "hi", "stderr": "", "exit_code": 0})),
        );
        h.ctx.run_code("print('hi')").await.expect("dispatched");

        assert_eq!(
            h.transport.single_request().url,
            crate::config::DEFAULT_EXECUTOR_ENDPOINT
        );
        let note = h.ctx.session().messages().last().cloned().expect("note");
        assert_eq!(note, Message::note("Code execution:\nhi\n[exit 0]"));
    }

    #[test]
    fn export_of_empty_transcript_only_notifies() {
        let mut h = harness(Config::default(), RecordingTransport::new());
        h.ctx.export();
        assert_eq!(h.sink.last_notice().as_deref(), Some("Nothing to export yet."));
    }

    #[test]
    fn session_overrides_are_not_persisted() {
        let mut h = harness(Config::default(), RecordingTransport::new());
        h.ctx.apply_overrides(&ConfigOverrides {
            model: Some("scratch-model".to_string()),
            ..Default::default()
        });
        h.ctx
            .update_config(|config| config.max_tokens = 64)
            .expect("saved");

        assert_eq!(h.ctx.config().effective_model(), "scratch-model");
        assert_eq!(h.ctx.config().max_tokens, 64);
        let stored = h.store.load();
        assert_eq!(stored.model, None);
        assert_eq!(stored.max_tokens, 64);
    }

    #[test]
    fn clear_keeps_configuration() {
        let config = Config {
            temperature: 1.1,
            ..Default::default()
        };
        let mut h = harness(config.clone(), RecordingTransport::new());
        h.ctx.append_user("hi");
        h.ctx.clear();

        assert!(h.ctx.session().messages().is_empty());
        assert_eq!(h.ctx.config(), &config);
    }
}
