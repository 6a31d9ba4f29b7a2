use super::{error_for_status, CompletionRequest, LanguageModel, LineBuffer, ModelError, PartialSink};
use crate::chat::ChatRole;
use crate::provider::Provider;
use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

const BASE_URL: &str = "https://generativelanguage.googleapis.com";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Serialize)]
struct GeminiContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    parts: Vec<GeminiPart>,
}

#[derive(Serialize)]
struct GeminiPart {
    text: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: String,
}

#[derive(Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiCandidateContent>,
}

#[derive(Deserialize)]
struct GeminiCandidateContent {
    #[serde(default)]
    parts: Vec<GeminiResponsePart>,
}

#[derive(Deserialize)]
struct GeminiResponsePart {
    text: Option<String>,
}

impl GeminiResponse {
    fn text(&self) -> String {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|c| {
                c.parts
                    .iter()
                    .filter_map(|p| p.text.as_deref())
                    .collect::<String>()
            })
            .unwrap_or_default()
    }
}

fn build_request(request: &CompletionRequest) -> GeminiRequest {
    let text_content = |role: Option<&str>, text: &str| GeminiContent {
        role: role.map(str::to_string),
        parts: vec![GeminiPart {
            text: text.to_string(),
        }],
    };

    GeminiRequest {
        system_instruction: request.system.as_deref().map(|s| text_content(None, s)),
        contents: request
            .messages
            .iter()
            .map(|m| {
                let role = match m.role {
                    ChatRole::User => "user",
                    ChatRole::Model => "model",
                };
                text_content(Some(role), &m.content)
            })
            .collect(),
        generation_config: request.json.then(|| GenerationConfig {
            response_mime_type: "application/json".to_string(),
        }),
    }
}

/// Text delta carried by one server-sent-events line, if any.
fn parse_sse_line(line: &str) -> Result<Option<String>, ModelError> {
    let Some(data) = line.strip_prefix("data:") else {
        return Ok(None);
    };
    let data = data.trim();
    if data.is_empty() {
        return Ok(None);
    }
    let chunk: GeminiResponse =
        serde_json::from_str(data).map_err(|e| ModelError::Stream(e.to_string()))?;
    let text = chunk.text();
    Ok((!text.is_empty()).then_some(text))
}

#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl GeminiClient {
    pub fn new(api_key: &str) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.to_string(),
            base_url: BASE_URL.to_string(),
        }
    }

    pub fn list_models() -> Vec<String> {
        vec![
            "gemini-2.5-flash".to_string(),
            "gemini-2.5-pro".to_string(),
            "gemini-2.0-flash".to_string(),
        ]
    }

    fn url(&self, model: &str, method: &str) -> String {
        format!("{}/v1beta/models/{}:{}", self.base_url, model, method)
    }
}

#[async_trait]
impl LanguageModel for GeminiClient {
    fn provider(&self) -> Provider {
        Provider::Gemini
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, ModelError> {
        let body = build_request(request);
        debug!(model = %request.model, json = request.json, "gemini generateContent");

        let response = self
            .client
            .post(self.url(&request.model, "generateContent"))
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;
        let response = error_for_status("Gemini", response).await?;

        let gemini_response: GeminiResponse = response.json().await?;
        let text = gemini_response.text();
        if text.is_empty() {
            return Err(ModelError::MissingContent("Gemini"));
        }
        Ok(text)
    }

    async fn complete_streaming(
        &self,
        request: &CompletionRequest,
        sink: &PartialSink,
    ) -> Result<String, ModelError> {
        let body = build_request(request);
        debug!(model = %request.model, "gemini streamGenerateContent");

        let response = self
            .client
            .post(format!("{}?alt=sse", self.url(&request.model, "streamGenerateContent")))
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;
        let response = error_for_status("Gemini", response).await?;

        let mut stream = response.bytes_stream();
        let mut lines = LineBuffer::default();
        let mut reply = String::new();

        while let Some(chunk) = stream.next().await {
            for line in lines.push(&chunk?) {
                if let Some(delta) = parse_sse_line(&line)? {
                    reply.push_str(&delta);
                    let _ = sink.send(reply.clone());
                }
            }
        }
        if let Some(line) = lines.finish() {
            if let Some(delta) = parse_sse_line(&line)? {
                reply.push_str(&delta);
                let _ = sink.send(reply.clone());
            }
        }

        if reply.is_empty() {
            return Err(ModelError::MissingContent("Gemini"));
        }
        Ok(reply)
    }
}
