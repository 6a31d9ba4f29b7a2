use super::{error_for_status, CompletionRequest, LanguageModel, LineBuffer, ModelError, PartialSink};
use crate::chat::ChatRole;
use crate::provider::Provider;
use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Serialize)]
struct OllamaMessage {
    role: String,
    content: String,
}

#[derive(Serialize)]
struct OllamaRequest {
    model: String,
    messages: Vec<OllamaMessage>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OllamaResponseMessage {
    #[serde(default)]
    content: String,
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    message: Option<OllamaResponseMessage>,
    #[serde(default)]
    done: bool,
    error: Option<String>,
}

#[derive(Deserialize)]
struct OllamaModel {
    name: String,
}

#[derive(Deserialize)]
struct OllamaModelsResponse {
    models: Vec<OllamaModel>,
}

fn build_request(request: &CompletionRequest, stream: bool) -> OllamaRequest {
    let mut messages = Vec::with_capacity(request.messages.len() + 1);
    if let Some(system) = &request.system {
        messages.push(OllamaMessage {
            role: "system".to_string(),
            content: system.clone(),
        });
    }
    messages.extend(request.messages.iter().map(|m| OllamaMessage {
        role: match m.role {
            ChatRole::User => "user",
            ChatRole::Model => "assistant",
        }
        .to_string(),
        content: m.content.clone(),
    }));

    OllamaRequest {
        model: request.model.clone(),
        messages,
        stream,
        format: request.json.then(|| "json".to_string()),
    }
}

/// Decode one NDJSON line of a streamed chat response.
fn parse_stream_line(line: &str) -> Result<OllamaResponse, ModelError> {
    let chunk: OllamaResponse =
        serde_json::from_str(line).map_err(|e| ModelError::Stream(e.to_string()))?;
    if let Some(error) = chunk.error {
        return Err(ModelError::Stream(error));
    }
    Ok(chunk)
}

#[derive(Clone)]
pub struct OllamaClient {
    client: Client,
    base_url: String,
}

impl OllamaClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub async fn list_models(&self) -> Result<Vec<String>, ModelError> {
        let url = format!("{}/api/tags", self.base_url);

        let response = self.client.get(&url).send().await?;
        let response = error_for_status("Ollama", response).await?;

        let models_response: OllamaModelsResponse = response.json().await?;
        let model_names: Vec<String> = models_response
            .models
            .into_iter()
            .map(|model| model.name)
            .collect();

        Ok(model_names)
    }
}

#[async_trait]
impl LanguageModel for OllamaClient {
    fn provider(&self) -> Provider {
        Provider::Ollama
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, ModelError> {
        let url = format!("{}/api/chat", self.base_url);
        debug!(model = %request.model, json = request.json, "ollama chat");

        let response = self
            .client
            .post(&url)
            .json(&build_request(request, false))
            .send()
            .await?;
        let response = error_for_status("Ollama", response).await?;

        let ollama_response: OllamaResponse = response.json().await?;
        if let Some(error) = ollama_response.error {
            return Err(ModelError::Stream(error));
        }
        ollama_response
            .message
            .map(|m| m.content)
            .filter(|c| !c.is_empty())
            .ok_or(ModelError::MissingContent("Ollama"))
    }

    async fn complete_streaming(
        &self,
        request: &CompletionRequest,
        sink: &PartialSink,
    ) -> Result<String, ModelError> {
        let url = format!("{}/api/chat", self.base_url);
        debug!(model = %request.model, "ollama chat (stream)");

        let response = self
            .client
            .post(&url)
            .json(&build_request(request, true))
            .send()
            .await?;
        let response = error_for_status("Ollama", response).await?;

        let mut stream = response.bytes_stream();
        let mut lines = LineBuffer::default();
        let mut reply = String::new();

        'read: while let Some(chunk) = stream.next().await {
            for line in lines.push(&chunk?) {
                let parsed = parse_stream_line(&line)?;
                if let Some(message) = parsed.message.filter(|m| !m.content.is_empty()) {
                    reply.push_str(&message.content);
                    let _ = sink.send(reply.clone());
                }
                if parsed.done {
                    break 'read;
                }
            }
        }

        if reply.is_empty() {
            return Err(ModelError::MissingContent("Ollama"));
        }
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::ChatMessage;

    #[test]
    fn system_prompt_leads_and_model_maps_to_assistant() {
        let request = CompletionRequest {
            model: "llama3.2".to_string(),
            system: Some("seed".to_string()),
            messages: vec![ChatMessage::user("q"), ChatMessage::model("a")],
            json: true,
        };
        let value = serde_json::to_value(build_request(&request, false)).unwrap();
        assert_eq!(value["messages"][0]["role"], "system");
        assert_eq!(value["messages"][2]["role"], "assistant");
        assert_eq!(value["format"], "json");
        assert_eq!(value["stream"], false);
    }

    #[test]
    fn stream_lines_carry_deltas_and_errors() {
        let chunk = parse_stream_line(r#"{"message":{"role":"assistant","content":"Hi"},"done":false}"#)
            .unwrap();
        assert_eq!(chunk.message.unwrap().content, "Hi");
        assert!(!chunk.done);

        let last = parse_stream_line(r#"{"message":{"role":"assistant","content":""},"done":true}"#)
            .unwrap();
        assert!(last.done);

        let err = parse_stream_line(r#"{"error":"model not found"}"#).unwrap_err();
        assert!(err.to_string().contains("model not found"));
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let client = OllamaClient::new("http://localhost:11434/");
        assert_eq!(client.base_url, "http://localhost:11434");
    }
}
