use crate::ai::{ClaudeClient, GeminiClient, OpenAIClient};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Provider {
    #[default]
    Gemini,
    Ollama,
    Claude,
    OpenAI,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Gemini => "gemini",
            Provider::Ollama => "ollama",
            Provider::Claude => "claude",
            Provider::OpenAI => "openai",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "gemini" | "google" => Some(Provider::Gemini),
            "ollama" => Some(Provider::Ollama),
            "claude" | "anthropic" => Some(Provider::Claude),
            "openai" => Some(Provider::OpenAI),
            _ => None,
        }
    }

    pub fn all() -> Vec<Provider> {
        vec![Provider::Gemini, Provider::Ollama, Provider::Claude, Provider::OpenAI]
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Provider::Gemini => "Gemini (Google)",
            Provider::Ollama => "Ollama (Local)",
            Provider::Claude => "Claude (Anthropic)",
            Provider::OpenAI => "ChatGPT (OpenAI)",
        }
    }

    /// Environment variables checked for an API key, in priority order.
    pub fn key_env_vars(&self) -> &'static [&'static str] {
        match self {
            Provider::Gemini => &["GEMINI_API_KEY", "API_KEY"],
            Provider::Ollama => &[],
            Provider::Claude => &["ANTHROPIC_API_KEY"],
            Provider::OpenAI => &["OPENAI_API_KEY"],
        }
    }

    pub fn default_model(&self) -> String {
        match self {
            Provider::Gemini => GeminiClient::list_models().remove(0),
            Provider::Ollama => "llama3.2:latest".to_string(),
            Provider::Claude => ClaudeClient::list_models().remove(0),
            Provider::OpenAI => OpenAIClient::list_models().remove(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip() {
        for provider in Provider::all() {
            assert_eq!(Provider::from_str(provider.as_str()), Some(provider));
        }
        assert_eq!(Provider::from_str("Anthropic"), Some(Provider::Claude));
        assert_eq!(Provider::from_str("bard"), None);
    }

    #[test]
    fn gemini_is_default_with_flash_model() {
        assert_eq!(Provider::default(), Provider::Gemini);
        assert_eq!(Provider::Gemini.default_model(), "gemini-2.5-flash");
        assert!(Provider::Ollama.key_env_vars().is_empty());
    }
}
