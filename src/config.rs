use crate::app::Theme;
use crate::language::SupportedLanguage;
use crate::provider::Provider;
use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub provider: Option<String>,
    pub default_model: Option<String>,
    pub theme: Option<Theme>,
    pub language: Option<SupportedLanguage>,
    pub gemini_api_key: Option<String>,
    pub claude_api_key: Option<String>,
    pub openai_api_key: Option<String>,
    pub ollama_url: Option<String>,
    pub request_timeout_secs: Option<u64>,
}

impl Config {
    pub fn new() -> Self {
        Self {
            provider: Some(Provider::default().as_str().to_string()),
            request_timeout_secs: Some(120),
            ..Self::default()
        }
    }

    pub fn load() -> Result<Self> {
        Self::load_from(&Self::get_config_path()?)
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            return Ok(Self::new());
        }

        let config_content = fs::read_to_string(config_path)?;
        let config: Config = serde_json::from_str(&config_content)?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::get_config_path()?)
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        // Create config directory if it doesn't exist
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let config_content = serde_json::to_string_pretty(self)?;
        fs::write(config_path, config_content)?;
        Ok(())
    }

    /// Persist display preferences changed from inside the TUI.
    pub fn save_preferences(theme: Theme, language: SupportedLanguage) -> Result<()> {
        let mut config = Self::load().unwrap_or_else(|_| Self::new());
        config.theme = Some(theme);
        config.language = Some(language);
        config.save()
    }

    pub fn provider(&self) -> Provider {
        self.provider
            .as_deref()
            .and_then(Provider::from_str)
            .unwrap_or_default()
    }

    pub fn model_for(&self, provider: Provider) -> String {
        // A saved model only applies to the provider it was saved with.
        match &self.default_model {
            Some(model) if self.provider() == provider => model.clone(),
            _ => provider.default_model(),
        }
    }

    /// API key for `provider`: environment variables first, then this file.
    pub fn api_key_for(&self, provider: Provider) -> Option<String> {
        provider
            .key_env_vars()
            .iter()
            .find_map(|var| std::env::var(var).ok().filter(|v| !v.is_empty()))
            .or_else(|| self.stored_key(provider).map(str::to_string))
    }

    /// Where the key for `provider` comes from: "env", "config", "local" or None.
    pub fn key_source(&self, provider: Provider) -> Option<&'static str> {
        if provider == Provider::Ollama {
            return Some("local");
        }
        if provider
            .key_env_vars()
            .iter()
            .any(|var| std::env::var(var).is_ok_and(|v| !v.is_empty()))
        {
            Some("env")
        } else if self.stored_key(provider).is_some() {
            Some("config")
        } else {
            None
        }
    }

    fn stored_key(&self, provider: Provider) -> Option<&str> {
        match provider {
            Provider::Gemini => self.gemini_api_key.as_deref(),
            Provider::Claude => self.claude_api_key.as_deref(),
            Provider::OpenAI => self.openai_api_key.as_deref(),
            Provider::Ollama => None,
        }
        .filter(|k| !k.is_empty())
    }

    pub fn ollama_url(&self) -> &str {
        self.ollama_url.as_deref().unwrap_or(DEFAULT_OLLAMA_URL)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }

    pub fn config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("codelens"))
    }

    pub fn log_dir() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("logs"))
    }

    fn get_config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.json"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("absent.json")).unwrap();
        assert_eq!(config.provider(), Provider::Gemini);
        assert_eq!(config.request_timeout(), Some(Duration::from_secs(120)));
        assert_eq!(config.ollama_url(), DEFAULT_OLLAMA_URL);
    }

    #[test]
    fn save_and_reload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let mut config = Config::new();
        config.provider = Some("ollama".to_string());
        config.default_model = Some("qwen2.5-coder".to_string());
        config.theme = Some(Theme::Light);
        config.language = Some(SupportedLanguage::Rust);
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.provider(), Provider::Ollama);
        assert_eq!(loaded.model_for(Provider::Ollama), "qwen2.5-coder");
        assert_eq!(loaded.model_for(Provider::Gemini), "gemini-2.5-flash");
        assert_eq!(loaded.theme, Some(Theme::Light));
        assert_eq!(loaded.language, Some(SupportedLanguage::Rust));
    }

    #[test]
    fn partial_file_fills_gaps_with_none() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"theme":"dark","request_timeout_secs":0}"#).unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.theme, Some(Theme::Dark));
        assert_eq!(config.request_timeout(), None);
        assert_eq!(config.provider(), Provider::Gemini);
    }

    #[test]
    fn ollama_needs_no_key() {
        let config = Config::new();
        assert_eq!(config.key_source(Provider::Ollama), Some("local"));
        assert_eq!(config.api_key_for(Provider::Ollama), None);
    }

    #[test]
    fn stored_key_is_used_when_env_is_unset() {
        if std::env::var("OPENAI_API_KEY").is_ok() {
            return;
        }
        let mut config = Config::new();
        assert_eq!(config.key_source(Provider::OpenAI), None);
        config.openai_api_key = Some("sk-test".to_string());
        assert_eq!(config.api_key_for(Provider::OpenAI).as_deref(), Some("sk-test"));
        assert_eq!(config.key_source(Provider::OpenAI), Some("config"));
    }
}
