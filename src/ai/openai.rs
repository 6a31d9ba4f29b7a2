use super::{error_for_status, CompletionRequest, LanguageModel, ModelError};
use crate::chat::ChatRole;
use crate::provider::Provider;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Serialize)]
struct OpenAIMessage {
    role: String,
    content: String,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Serialize)]
struct OpenAIRequest {
    model: String,
    messages: Vec<OpenAIMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Deserialize)]
struct OpenAIChoice {
    message: OpenAIResponseMessage,
}

#[derive(Deserialize)]
struct OpenAIResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
}

fn build_request(request: &CompletionRequest) -> OpenAIRequest {
    let system = request.system.iter().map(|s| OpenAIMessage {
        role: "system".to_string(),
        content: s.clone(),
    });
    let turns = request.messages.iter().map(|m| OpenAIMessage {
        role: match m.role {
            ChatRole::User => "user",
            ChatRole::Model => "assistant",
        }
        .to_string(),
        content: m.content.clone(),
    });

    OpenAIRequest {
        model: request.model.clone(),
        messages: system.chain(turns).collect(),
        response_format: request.json.then(|| ResponseFormat {
            kind: "json_object".to_string(),
        }),
    }
}

#[derive(Clone)]
pub struct OpenAIClient {
    client: Client,
    api_key: String,
}

impl OpenAIClient {
    pub fn new(api_key: &str) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.to_string(),
        }
    }

    pub fn list_models() -> Vec<String> {
        vec![
            "gpt-4o".to_string(),
            "gpt-4o-mini".to_string(),
            "gpt-4-turbo".to_string(),
        ]
    }
}

#[async_trait]
impl LanguageModel for OpenAIClient {
    fn provider(&self) -> Provider {
        Provider::OpenAI
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, ModelError> {
        debug!(model = %request.model, json = request.json, "openai chat completion");

        let response = self
            .client
            .post("https://api.openai.com/v1/chat/completions")
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&build_request(request))
            .send()
            .await?;
        let response = error_for_status("OpenAI", response).await?;

        let openai_response: OpenAIResponse = response.json().await?;
        openai_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.is_empty())
            .ok_or(ModelError::MissingContent("OpenAI"))
    }
}
