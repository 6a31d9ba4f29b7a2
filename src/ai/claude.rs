use super::{error_for_status, CompletionRequest, LanguageModel, ModelError};
use crate::chat::ChatRole;
use crate::provider::Provider;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Serialize)]
struct ClaudeMessage {
    role: String,
    content: String,
}

#[derive(Serialize)]
struct ClaudeRequest {
    model: String,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<ClaudeMessage>,
}

#[derive(Deserialize)]
struct ClaudeContent {
    text: Option<String>,
}

#[derive(Deserialize)]
struct ClaudeResponse {
    content: Vec<ClaudeContent>,
}

fn build_request(request: &CompletionRequest) -> ClaudeRequest {
    // No JSON mode on this API; the system prompt already demands a bare object.
    ClaudeRequest {
        model: request.model.clone(),
        max_tokens: 8192,
        system: request.system.clone(),
        messages: request
            .messages
            .iter()
            .map(|m| ClaudeMessage {
                role: match m.role {
                    ChatRole::User => "user",
                    ChatRole::Model => "assistant",
                }
                .to_string(),
                content: m.content.clone(),
            })
            .collect(),
    }
}

#[derive(Clone)]
pub struct ClaudeClient {
    client: Client,
    api_key: String,
}

impl ClaudeClient {
    pub fn new(api_key: &str) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.to_string(),
        }
    }

    pub fn list_models() -> Vec<String> {
        vec![
            "claude-sonnet-4-20250514".to_string(),
            "claude-3-5-sonnet-20241022".to_string(),
            "claude-3-5-haiku-20241022".to_string(),
        ]
    }
}

#[async_trait]
impl LanguageModel for ClaudeClient {
    fn provider(&self) -> Provider {
        Provider::Claude
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, ModelError> {
        debug!(model = %request.model, "claude messages");

        let response = self
            .client
            .post("https://api.anthropic.com/v1/messages")
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&build_request(request))
            .send()
            .await?;
        let response = error_for_status("Claude", response).await?;

        let claude_response: ClaudeResponse = response.json().await?;
        let text: String = claude_response
            .content
            .into_iter()
            .filter_map(|c| c.text)
            .collect();
        if text.is_empty() {
            return Err(ModelError::MissingContent("Claude"));
        }
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::ChatMessage;

    #[test]
    fn system_prompt_is_top_level() {
        let request = CompletionRequest {
            model: "claude-3-5-haiku-20241022".to_string(),
            system: Some("seed".to_string()),
            messages: vec![ChatMessage::user("q"), ChatMessage::model("a")],
            json: true,
        };
        let value = serde_json::to_value(build_request(&request)).unwrap();
        assert_eq!(value["system"], "seed");
        assert_eq!(value["messages"].as_array().unwrap().len(), 2);
        assert_eq!(value["messages"][1]["role"], "assistant");
    }
}
