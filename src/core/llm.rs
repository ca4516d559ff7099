//! Chat completion responder
//!
//! Information Hiding:
//! - Wire format of the completion API hidden behind `ChatResponder`
//! - Model failover order internalized in the client
//! - Timeout handling hidden from callers

use crate::config::Settings;
use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::time::{timeout, Duration};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

/// Answer text plus the model that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub text: String,
    pub model: String,
}

/// External text-generation boundary. The session layer only ever sees this
/// trait, so tests can substitute a scripted responder.
#[async_trait]
pub trait ChatResponder: Send + Sync {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<Completion>;
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChatMessage,
}

/// HTTP client for the completion API. Candidate models are tried in
/// configuration order; the first one that returns a non-empty answer wins.
pub struct LlmClient {
    client: Client,
    api_key: String,
    base_url: String,
    models: Vec<String>,
    max_tokens: u32,
    temperature: f32,
    timeout_secs: u64,
}

impl LlmClient {
    pub fn new(api_key: String, settings: &Settings) -> Self {
        Self {
            client: Client::new(),
            api_key,
            base_url: settings.llm.base_url.clone(),
            models: settings.llm.models.clone(),
            max_tokens: settings.llm.max_tokens,
            temperature: settings.llm.temperature,
            timeout_secs: settings.llm.timeout_secs,
        }
    }

    async fn try_model(&self, model: &str, messages: &[ChatMessage]) -> Result<String> {
        let request = ChatRequest {
            model,
            messages,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };

        let request_future = async {
            let response = self
                .client
                .post(&self.base_url)
                .header("Authorization", format!("Bearer {}", self.api_key))
                .header("Content-Type", "application/json")
                .json(&request)
                .send()
                .await?;

            let status = response.status();
            if !status.is_success() {
                let error_text = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "Unknown error".to_string());
                return Err(anyhow::anyhow!("API error {}: {}", status, error_text));
            }

            let chat_response = response.json::<ChatResponse>().await?;
            Ok::<_, anyhow::Error>(
                chat_response
                    .choices
                    .first()
                    .map(|c| c.message.content.clone())
                    .unwrap_or_default(),
            )
        };

        match timeout(Duration::from_secs(self.timeout_secs), request_future).await {
            Ok(Ok(text)) => Ok(text),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(anyhow::anyhow!(
                "Request timed out after {} seconds",
                self.timeout_secs
            )),
        }
    }
}

#[async_trait]
impl ChatResponder for LlmClient {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<Completion> {
        let mut last_error = None;

        for model in &self.models {
            match self.try_model(model, messages).await {
                Ok(text) if !text.trim().is_empty() => {
                    tracing::debug!("[LlmClient] Model '{}' answered", model);
                    return Ok(Completion {
                        text,
                        model: model.clone(),
                    });
                }
                Ok(_) => {
                    tracing::warn!("[LlmClient] Model '{}' returned an empty answer", model);
                    last_error = Some(anyhow::anyhow!("Model '{}' returned empty answer", model));
                }
                Err(e) => {
                    tracing::warn!("[LlmClient] Model '{}' failed: {}", model, e);
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| anyhow::anyhow!("No candidate models configured")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer, models: Vec<&str>) -> LlmClient {
        let mut settings = Settings::default();
        settings.llm.base_url = format!("{}/v1/chat/completions", server.uri());
        settings.llm.models = models.into_iter().map(String::from).collect();
        settings.llm.timeout_secs = 5;
        LlmClient::new("test-key".to_string(), &settings)
    }

    fn answer_body(content: &str) -> serde_json::Value {
        serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": content}}]
        })
    }

    #[tokio::test]
    async fn first_model_wins() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(answer_body("rotate crops")))
            .mount(&server)
            .await;

        let client = client_for(&server, vec!["model-a", "model-b"]);
        let completion = client
            .complete(&[ChatMessage::user("soil advice?")])
            .await
            .unwrap();

        assert_eq!(completion.text, "rotate crops");
        assert_eq!(completion.model, "model-a");
    }

    #[tokio::test]
    async fn falls_over_to_next_model_on_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(body_string_contains("model-a"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(body_string_contains("model-b"))
            .respond_with(ResponseTemplate::new(200).set_body_json(answer_body("use drip lines")))
            .mount(&server)
            .await;

        let client = client_for(&server, vec!["model-a", "model-b"]);
        let completion = client
            .complete(&[ChatMessage::user("irrigation?")])
            .await
            .unwrap();

        assert_eq!(completion.text, "use drip lines");
        assert_eq!(completion.model, "model-b");
    }

    #[tokio::test]
    async fn errors_when_every_model_fails() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let client = client_for(&server, vec!["model-a", "model-b"]);
        let result = client.complete(&[ChatMessage::user("hello")]).await;

        assert!(result.is_err());
    }
}
