use crate::config::{Backend, Config};
use crate::core::error::ChatError;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};

pub mod anthropic;
pub mod base_client;
pub mod factory;
pub mod openai_compatible;

pub use base_client::{HttpClient, HttpResponse, Transport};
pub use factory::ProviderFactory;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Synthesized system prompt; never stored in a transcript.
    System,
    User,
    Assistant,
    /// Local annotation shown to the user, never sent to a backend.
    Note,
}

impl Role {
    pub fn label(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Note => "system-note",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub role: Role,
    pub content: String,
    /// Set on assistant entries that report a failed request.
    pub is_error: bool,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            is_error: false,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn note(content: impl Into<String>) -> Self {
        Self::new(Role::Note, content)
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            is_error: true,
        }
    }

    /// Whether this entry is part of the conversation replayed to a backend.
    pub fn is_outbound(&self) -> bool {
        matches!(self.role, Role::User | Role::Assistant) && !self.is_error
    }
}

/// Everything an adapter needs for one round trip, captured when the call
/// starts so later configuration changes cannot affect it.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    pub model: String,
    pub endpoint: String,
    pub credential: Option<String>,
    /// System prompt first, then the outbound transcript in order.
    pub messages: Vec<Message>,
    /// Temperature as configured; adapters apply protocol ceilings.
    pub temperature: f64,
    pub max_tokens: u32,
}

impl ChatRequest {
    pub fn from_config(
        transcript: &[Message],
        config: &Config,
        max_tokens_override: Option<u32>,
    ) -> Self {
        let mut messages = Vec::with_capacity(transcript.len() + 1);
        let system_prompt = config.system_prompt.trim();
        if !system_prompt.is_empty() {
            messages.push(Message::new(Role::System, system_prompt));
        }
        messages.extend(transcript.iter().filter(|m| m.is_outbound()).cloned());

        Self {
            model: config.effective_model(),
            endpoint: config.effective_endpoint(),
            credential: config.effective_credential().map(str::to_string),
            messages,
            temperature: config.temperature,
            max_tokens: max_tokens_override.unwrap_or(config.max_tokens),
        }
    }

    pub fn system_prompt(&self) -> Option<String> {
        let parts: Vec<&str> = self
            .messages
            .iter()
            .filter(|m| m.role == Role::System)
            .map(|m| m.content.as_str())
            .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join("\n\n"))
        }
    }
}

#[async_trait]
pub trait LLMProvider: Send + Sync {
    fn backend(&self) -> Backend;

    async fn get_response(
        &self,
        transport: &dyn Transport,
        request: &ChatRequest,
    ) -> Result<String, ChatError>;
}

/// Picks the adapter for the configured backend and performs one call.
#[derive(Clone)]
pub struct Router {
    factory: Arc<ProviderFactory>,
    transport: Arc<dyn Transport>,
}

impl Router {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            factory: Arc::new(ProviderFactory::new()),
            transport,
        }
    }

    pub fn transport(&self) -> &dyn Transport {
        self.transport.as_ref()
    }

    pub async fn route(
        &self,
        transcript: &[Message],
        config: &Config,
        max_tokens_override: Option<u32>,
    ) -> Result<String, ChatError> {
        let provider = self.factory.create(&config.backend)?;
        let request = ChatRequest::from_config(transcript, config, max_tokens_override);
        info!(
            backend = %config.backend,
            model = %request.model,
            messages = request.messages.len(),
            "sending chat request"
        );

        let reply = provider.get_response(self.transport.as_ref(), &request).await;
        match &reply {
            Ok(text) => debug!(chars = text.len(), "received reply"),
            Err(e) => debug!(error = %e, "request failed"),
        }
        reply
    }
}
