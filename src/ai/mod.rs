pub mod claude;
pub mod gemini;
pub mod ollama;
pub mod openai;

pub use claude::ClaudeClient;
pub use gemini::GeminiClient;
pub use ollama::OllamaClient;
pub use openai::OpenAIClient;

use crate::chat::ChatMessage;
use crate::config::Config;
use crate::provider::Provider;
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;

/// Receives growing prefixes of a streamed reply.
pub type PartialSink = mpsc::UnboundedSender<String>;

#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub model: String,
    pub system: Option<String>,
    pub messages: Vec<ChatMessage>,
    /// Ask the provider to constrain output to a JSON object.
    pub json: bool,
}

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{provider} API error {status}: {body}")]
    Status {
        provider: &'static str,
        status: u16,
        body: String,
    },
    #[error("{0} response contained no text")]
    MissingContent(&'static str),
    #[error("request timed out after {0}s")]
    Timeout(u64),
    #[error("malformed stream chunk: {0}")]
    Stream(String),
    #[error("{0} API key not configured")]
    MissingKey(&'static str),
    #[error("request interrupted: {0}")]
    Interrupted(String),
}

/// A hosted chat-completion endpoint.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    fn provider(&self) -> Provider;

    async fn complete(&self, request: &CompletionRequest) -> Result<String, ModelError>;

    /// Deliver the reply incrementally. Providers without streaming support
    /// send the whole reply as a single partial.
    async fn complete_streaming(
        &self,
        request: &CompletionRequest,
        sink: &PartialSink,
    ) -> Result<String, ModelError> {
        let reply = self.complete(request).await?;
        let _ = sink.send(reply.clone());
        Ok(reply)
    }
}

/// Build the client for `provider`, taking keys and endpoints from `config`.
pub fn connect(provider: Provider, config: &Config) -> Result<Arc<dyn LanguageModel>, ModelError> {
    let key = |name: &'static str| {
        config
            .api_key_for(provider)
            .ok_or(ModelError::MissingKey(name))
    };

    let model: Arc<dyn LanguageModel> = match provider {
        Provider::Gemini => Arc::new(GeminiClient::new(&key("Gemini")?)),
        Provider::Ollama => Arc::new(OllamaClient::new(config.ollama_url())),
        Provider::Claude => Arc::new(ClaudeClient::new(&key("Claude")?)),
        Provider::OpenAI => Arc::new(OpenAIClient::new(&key("OpenAI")?)),
    };
    Ok(model)
}

pub async fn with_timeout<T, F>(limit: Option<Duration>, fut: F) -> Result<T, ModelError>
where
    F: Future<Output = Result<T, ModelError>>,
{
    match limit {
        Some(limit) => tokio::time::timeout(limit, fut)
            .await
            .map_err(|_| ModelError::Timeout(limit.as_secs()))?,
        None => fut.await,
    }
}

pub(crate) async fn error_for_status(
    provider: &'static str,
    response: reqwest::Response,
) -> Result<reqwest::Response, ModelError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ModelError::Status {
        provider,
        status: status.as_u16(),
        body,
    })
}

/// Splits a byte stream into complete lines. Bytes after the last newline
/// are held until more data (or [`LineBuffer::finish`]) arrives, so a
/// multi-byte character split across chunks is never cut.
#[derive(Debug, Default)]
pub(crate) struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);
        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            let text = String::from_utf8_lossy(&line);
            let text = text.trim_end_matches(['\r', '\n']);
            if !text.is_empty() {
                lines.push(text.to_string());
            }
        }
        lines
    }

    pub fn finish(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.pending);
        let text = String::from_utf8_lossy(&rest).trim().to_string();
        (!text.is_empty()).then_some(text)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Scripted model for tests: replies are returned in order.
    pub struct StubModel {
        replies: Mutex<VecDeque<Result<String, String>>>,
        partials: Vec<String>,
        requests: Mutex<Vec<CompletionRequest>>,
    }

    impl StubModel {
        pub fn replying(replies: &[&str]) -> Self {
            Self {
                replies: Mutex::new(replies.iter().map(|r| Ok(r.to_string())).collect()),
                partials: Vec::new(),
                requests: Mutex::new(Vec::new()),
            }
        }

        pub fn failing(message: &str) -> Self {
            Self {
                replies: Mutex::new(VecDeque::from([Err(message.to_string())])),
                partials: Vec::new(),
                requests: Mutex::new(Vec::new()),
            }
        }

        pub fn streaming(partials: &[&str]) -> Self {
            let last = partials.last().map(|p| p.to_string()).unwrap_or_default();
            Self {
                replies: Mutex::new(VecDeque::from([Ok(last)])),
                partials: partials.iter().map(|p| p.to_string()).collect(),
                requests: Mutex::new(Vec::new()),
            }
        }

        /// Partials sent before every streamed reply.
        pub fn with_partials(mut self, partials: &[&str]) -> Self {
            self.partials = partials.iter().map(|p| p.to_string()).collect();
            self
        }

        /// Queue a failing reply after the scripted ones.
        pub fn then_failing(mut self, message: &str) -> Self {
            self.replies
                .get_mut()
                .unwrap()
                .push_back(Err(message.to_string()));
            self
        }

        pub fn requests(&self) -> Vec<CompletionRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl LanguageModel for StubModel {
        fn provider(&self) -> Provider {
            Provider::Gemini
        }

        async fn complete(&self, request: &CompletionRequest) -> Result<String, ModelError> {
            self.requests.lock().unwrap().push(request.clone());
            match self.replies.lock().unwrap().pop_front() {
                Some(Ok(reply)) => Ok(reply),
                Some(Err(body)) => Err(ModelError::Status {
                    provider: "stub",
                    status: 500,
                    body,
                }),
                None => Err(ModelError::MissingContent("stub")),
            }
        }

        async fn complete_streaming(
            &self,
            request: &CompletionRequest,
            sink: &PartialSink,
        ) -> Result<String, ModelError> {
            if self.partials.is_empty() {
                let reply = self.complete(request).await?;
                let _ = sink.send(reply.clone());
                return Ok(reply);
            }
            for partial in &self.partials {
                let _ = sink.send(partial.clone());
            }
            self.complete(request).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_buffer_holds_partial_lines() {
        let mut buf = LineBuffer::default();
        assert!(buf.push(b"data: {\"a\"").is_empty());
        assert_eq!(buf.push(b":1}\r\n\r\ndata: x\n"), vec!["data: {\"a\":1}", "data: x"]);
        assert_eq!(buf.push(b"tail"), Vec::<String>::new());
        assert_eq!(buf.finish().as_deref(), Some("tail"));
        assert_eq!(buf.finish(), None);
    }

    #[test]
    fn line_buffer_keeps_split_utf8_intact() {
        let mut buf = LineBuffer::default();
        let text = "héllo\n".as_bytes();
        assert!(buf.push(&text[..2]).is_empty());
        assert_eq!(buf.push(&text[2..]), vec!["héllo"]);
    }

    #[tokio::test]
    async fn timeout_maps_to_model_error() {
        let slow = async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok::<_, ModelError>("late".to_string())
        };
        let err = with_timeout(Some(Duration::from_millis(5)), slow)
            .await
            .unwrap_err();
        assert!(matches!(err, ModelError::Timeout(_)));

        let fast = async { Ok::<_, ModelError>(1) };
        assert_eq!(with_timeout(None, fast).await.unwrap(), 1);
    }

    #[test]
    fn connect_requires_key_for_hosted_providers() {
        let config = Config::new();
        if std::env::var("ANTHROPIC_API_KEY").is_err() {
            assert!(matches!(
                connect(Provider::Claude, &config),
                Err(ModelError::MissingKey("Claude"))
            ));
        }
        assert!(connect(Provider::Ollama, &config).is_ok());
    }
}
