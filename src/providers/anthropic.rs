use crate::config::Backend;
use crate::core::error::ChatError;
use crate::providers::{ChatRequest, LLMProvider, Role, Transport};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Serialize)]
struct AnthropicRequest {
    model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<AnthropicMessage>,
    max_tokens: u32,
    temperature: f64,
}

#[derive(Serialize)]
struct AnthropicMessage {
    role: &'static str,
    content: String,
}

#[derive(Deserialize)]
struct AnthropicResponse {
    #[serde(default)]
    content: Option<Vec<ContentBlock>>,
}

#[derive(Deserialize)]
struct ContentBlock {
    text: Option<String>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: Option<ErrorDetail>,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: Option<String>,
}

/// Hosted Anthropic messages endpoint.
#[derive(Clone, Copy, Debug, Default)]
pub struct AnthropicProvider;

impl AnthropicProvider {
    fn build_payload(request: &ChatRequest) -> AnthropicRequest {
        // The messages API wants strictly alternating user/assistant turns;
        // adjacent turns from the same side are folded together.
        let mut messages: Vec<AnthropicMessage> = Vec::new();
        for m in &request.messages {
            let role = match m.role {
                Role::User => "user",
                Role::Assistant => "assistant",
                Role::System | Role::Note => continue,
            };
            match messages.last_mut() {
                Some(last) if last.role == role => {
                    last.content.push_str("\n\n");
                    last.content.push_str(&m.content);
                }
                _ => messages.push(AnthropicMessage {
                    role,
                    content: m.content.clone(),
                }),
            }
        }

        let temperature = Backend::Anthropic.clamp_temperature(request.temperature);
        if temperature < request.temperature {
            debug!(
                configured = request.temperature,
                sent = temperature,
                "clamping temperature"
            );
        }

        AnthropicRequest {
            model: request.model.clone(),
            system: request.system_prompt(),
            messages,
            max_tokens: request.max_tokens,
            temperature,
        }
    }

    fn error_from_response(status: u16, body: &str) -> ChatError {
        let message = serde_json::from_str::<ErrorResponse>(body)
            .ok()
            .and_then(|e| e.error)
            .and_then(|e| e.message)
            .filter(|m| !m.trim().is_empty());

        match message {
            Some(message) => ChatError::http(status, &message),
            None => ChatError::Http {
                status,
                detail: String::new(),
            },
        }
    }
}

#[async_trait]
impl LLMProvider for AnthropicProvider {
    fn backend(&self) -> Backend {
        Backend::Anthropic
    }

    async fn get_response(
        &self,
        transport: &dyn Transport,
        request: &ChatRequest,
    ) -> Result<String, ChatError> {
        let api_key = request.credential.as_deref().ok_or_else(|| {
            ChatError::Config("an API key is required for the anthropic backend".to_string())
        })?;

        let headers = vec![
            ("x-api-key".to_string(), api_key.to_string()),
            (
                "anthropic-version".to_string(),
                ANTHROPIC_VERSION.to_string(),
            ),
        ];
        let payload = serde_json::to_value(Self::build_payload(request))?;
        let response = transport
            .post_json(&request.endpoint, &headers, &payload)
            .await?;

        if !response.is_success() {
            return Err(Self::error_from_response(response.status, &response.body));
        }

        let parsed: AnthropicResponse = serde_json::from_str(&response.body)?;
        match parsed
            .content
            .into_iter()
            .flatten()
            .next()
            .and_then(|block| block.text)
        {
            Some(text) if !text.trim().is_empty() => Ok(text.trim().to_string()),
            _ => Err(ChatError::EmptyResponse),
        }
    }
}
