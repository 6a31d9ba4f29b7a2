use crate::ai::{self, CompletionRequest, LanguageModel, ModelError};
use crate::analysis::{self, AnalysisResult, AnalysisType, DecodeError};
use crate::chat::{ChatMessage, ChatSession};
use crate::language::SupportedLanguage;
use crate::prompt;
use crate::provider::Provider;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error(transparent)]
    Decode(#[from] DecodeError),
}

/// Runs analysis tasks against a model and opens chat sessions on it.
#[derive(Clone)]
pub struct AnalysisClient {
    model: Arc<dyn LanguageModel>,
    model_name: String,
    timeout: Option<Duration>,
}

impl AnalysisClient {
    pub fn new(model: Arc<dyn LanguageModel>, model_name: &str) -> Self {
        Self {
            model,
            model_name: model_name.to_string(),
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn provider(&self) -> Provider {
        self.model.provider()
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    /// Ask the model for a `kind` analysis of `code`.
    ///
    /// On success the result's variant always matches `kind`.
    pub async fn analyze(
        &self,
        kind: AnalysisType,
        code: &str,
        language: SupportedLanguage,
    ) -> Result<AnalysisResult, AnalysisError> {
        let request = CompletionRequest {
            model: self.model_name.clone(),
            system: Some(prompt::system_instruction(kind, language)),
            messages: vec![ChatMessage::user(prompt::analysis_prompt(kind, code, language))],
            json: true,
        };

        info!(%kind, %language, bytes = code.len(), model = %self.model_name, "analysis requested");
        let raw = ai::with_timeout(self.timeout, self.model.complete(&request))
            .await
            .inspect_err(|e| warn!(%kind, error = %e, "analysis call failed"))?;

        let result = analysis::decode(kind, &raw)
            .inspect_err(|e| warn!(%kind, error = %e, "analysis response rejected"))?;
        info!(%kind, "analysis complete");
        Ok(result)
    }

    pub fn create_session(&self, code: &str, language: SupportedLanguage) -> ChatSession {
        ChatSession::new(
            Arc::clone(&self.model),
            &self.model_name,
            code,
            language,
            self.timeout,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::testing::StubModel;

    fn canned(kind: AnalysisType) -> &'static str {
        match kind {
            AnalysisType::Review => r#"{"summary":"r","details":[]}"#,
            AnalysisType::Optimize => r#"{"summary":"o","optimizedCode":"x"}"#,
            AnalysisType::Secure => r#"{"summary":"s","vulnerabilities":[]}"#,
            AnalysisType::Explain => r#"{"summary":"e","lineByLine":[]}"#,
        }
    }

    #[tokio::test]
    async fn every_kind_returns_matching_variant() {
        for kind in AnalysisType::all() {
            let stub = Arc::new(StubModel::replying(&[canned(kind)]));
            let client = AnalysisClient::new(stub.clone(), "stub-model");

            let result = client
                .analyze(kind, "let x = 1;", SupportedLanguage::Javascript)
                .await
                .unwrap();
            assert_eq!(result.kind(), kind);

            let request = &stub.requests()[0];
            assert!(request.json);
            assert_eq!(request.model, "stub-model");
            assert!(request.messages[0].content.contains("let x = 1;"));
        }
    }

    #[tokio::test]
    async fn remote_failure_is_model_error() {
        let stub = Arc::new(StubModel::failing("quota exceeded"));
        let client = AnalysisClient::new(stub, "stub-model");
        let err = client
            .analyze(AnalysisType::Review, "x", SupportedLanguage::Python)
            .await
            .unwrap_err();
        assert!(matches!(err, AnalysisError::Model(_)));
        assert!(err.to_string().contains("quota exceeded"));
    }

    #[tokio::test]
    async fn mismatched_shape_is_decode_error() {
        let stub = Arc::new(StubModel::replying(&[canned(AnalysisType::Optimize)]));
        let client = AnalysisClient::new(stub, "stub-model");
        let err = client
            .analyze(AnalysisType::Explain, "x", SupportedLanguage::Python)
            .await
            .unwrap_err();
        assert!(matches!(err, AnalysisError::Decode(_)));
    }

    #[tokio::test]
    async fn sessions_are_independent() {
        let stub = Arc::new(StubModel::replying(&["a", "b"]));
        let client = AnalysisClient::new(stub, "stub-model");

        let mut first = client.create_session("one", SupportedLanguage::Go);
        let second = client.create_session("two", SupportedLanguage::Go);
        first.send("hi").await.unwrap();

        assert_eq!(first.turns().len(), 2);
        assert!(second.turns().is_empty());
        assert!(second.request_for("q").system.unwrap().contains("two"));
    }
}
