use crate::config::Backend;
use crate::core::error::ChatError;
use crate::providers::{ChatRequest, LLMProvider, Role, Transport};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatCompletionMessage>,
    temperature: f64,
    max_tokens: u32,
    stream: bool,
}

#[derive(Serialize)]
struct ChatCompletionMessage {
    role: &'static str,
    content: String,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Option<Vec<Choice>>,
}

#[derive(Deserialize)]
struct Choice {
    message: Option<MessageContent>,
}

#[derive(Deserialize)]
struct MessageContent {
    content: Option<String>,
}

/// Locally hosted `/v1/chat/completions` servers.
#[derive(Clone, Copy, Debug, Default)]
pub struct OpenAICompatibleProvider;

impl OpenAICompatibleProvider {
    fn build_payload(request: &ChatRequest) -> ChatCompletionRequest {
        let messages = request
            .messages
            .iter()
            .filter(|m| m.role != Role::Note)
            .map(|m| ChatCompletionMessage {
                role: m.role.label(),
                content: m.content.clone(),
            })
            .collect();

        ChatCompletionRequest {
            model: request.model.clone(),
            messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            stream: false,
        }
    }

    fn headers(request: &ChatRequest) -> Vec<(String, String)> {
        request
            .credential
            .iter()
            .map(|key| ("Authorization".to_string(), format!("Bearer {}", key)))
            .collect()
    }
}

#[async_trait]
impl LLMProvider for OpenAICompatibleProvider {
    fn backend(&self) -> Backend {
        Backend::OpenAICompatible
    }

    async fn get_response(
        &self,
        transport: &dyn Transport,
        request: &ChatRequest,
    ) -> Result<String, ChatError> {
        let payload = serde_json::to_value(Self::build_payload(request))?;
        let response = transport
            .post_json(&request.endpoint, &Self::headers(request), &payload)
            .await?;

        if !response.is_success() {
            return Err(ChatError::http(response.status, &response.body));
        }

        let parsed: ChatCompletionResponse = serde_json::from_str(&response.body)?;
        let content = parsed
            .choices
            .into_iter()
            .flatten()
            .next()
            .and_then(|choice| choice.message)
            .and_then(|message| message.content)
            .map(|content| content.trim().to_string())
            .unwrap_or_default();

        if content.is_empty() {
            return Err(ChatError::EmptyResponse);
        }
        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::Message;
    use crate::testing::RecordingTransport;
    use serde_json::json;

    fn request() -> ChatRequest {
        ChatRequest {
            model: "local-model".to_string(),
            endpoint: "http://localhost:8080/v1/chat/completions".to_string(),
            credential: None,
            messages: vec![
                Message::new(Role::System, "Be brief."),
                Message::user("hi"),
                Message::assistant("hello"),
                Message::user("how are you?"),
            ],
            temperature: 1.6,
            max_tokens: 128,
        }
    }

    #[tokio::test]
    async fn sends_full_message_list_with_sampling_settings() {
        let transport = RecordingTransport::new()
            .respond_json(200, json!({"choices": [{"message": {"content": "  fine  "}}]}));

        let reply = OpenAICompatibleProvider
            .get_response(&transport, &request())
            .await
            .expect("reply");
        assert_eq!(reply, "fine");

        let sent = transport.single_request();
        assert_eq!(sent.url, "http://localhost:8080/v1/chat/completions");
        assert_eq!(
            sent.payload,
            json!({
                "model": "local-model",
                "messages": [
                    {"role": "system", "content": "Be brief."},
                    {"role": "user", "content": "hi"},
                    {"role": "assistant", "content": "hello"},
                    {"role": "user", "content": "how are you?"}
                ],
                "temperature": 1.6,
                "max_tokens": 128,
                "stream": false
            })
        );
        assert!(sent.header("Authorization").is_none());
    }

    #[tokio::test]
    async fn credential_is_sent_as_bearer_token() {
        let transport = RecordingTransport::new()
            .respond_json(200, json!({"choices": [{"message": {"content": "ok"}}]}));
        let mut request = request();
        request.credential = Some("secret".to_string());

        OpenAICompatibleProvider
            .get_response(&transport, &request)
            .await
            .expect("reply");
        assert_eq!(
            transport.single_request().header("Authorization"),
            Some("Bearer secret")
        );
    }

    #[tokio::test]
    async fn empty_choices_is_an_empty_response() {
        let transport = RecordingTransport::new().respond_json(200, json!({"choices": []}));

        let err = OpenAICompatibleProvider
            .get_response(&transport, &request())
            .await
            .expect_err("should fail");
        assert!(matches!(err, ChatError::EmptyResponse));
    }

    #[tokio::test]
    async fn null_or_blank_content_is_an_empty_response() {
        for body in [
            json!({"choices": [{"message": {"content": null}}]}),
            json!({"choices": [{"message": {"content": "   "}}]}),
            json!({"choices": [{"finish_reason": "length"}]}),
            json!({"choices": null}),
            json!({}),
        ] {
            let transport = RecordingTransport::new().respond_json(200, body.clone());
            let err = OpenAICompatibleProvider
                .get_response(&transport, &request())
                .await
                .expect_err("should fail");
            assert!(matches!(err, ChatError::EmptyResponse), "body: {body}");
        }
    }

    #[tokio::test]
    async fn http_failure_carries_status_and_truncated_body() {
        let body = format!("model not loaded {}", "x".repeat(500));
        let transport = RecordingTransport::new().respond(503, &body);

        let err = OpenAICompatibleProvider
            .get_response(&transport, &request())
            .await
            .expect_err("should fail");
        match err {
            ChatError::Http { status, detail } => {
                assert_eq!(status, 503);
                assert!(detail.starts_with("model not loaded"));
                assert!(detail.len() < body.len());
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
