//! Application configuration.
//!
//! Loaded once at startup from a TOML file and injected into components at
//! construction; nothing re-reads configuration at request time. API keys can
//! be supplied (or overridden) through environment variables so they never
//! have to live in the config file.

use std::env;
use std::fs;
use std::path::PathBuf;

use anyhow::Context;
use serde::Deserialize;

/// Instructions handed to the model when the config does not provide any.
/// They request the structured `{results: [...]}` shape the reconciler
/// understands; the reconciler copes when the model ignores this.
pub const DEFAULT_INSTRUCTIONS: &str = "You are an assistant that answers questions using the retrieved document excerpts provided under 'Additional Context'. Respond with a JSON object of the form {\"results\": [{\"answer\": \"...\", \"citationTitle\": \"...\", \"citationContent\": \"...\"}]} where citationTitle names the source document an answer sentence is grounded in and citationContent quotes the supporting passage. Omit citationTitle for sentences that are not grounded in a document. If no context is provided, answer from general knowledge.";

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    pub search: SearchConfig,
    pub embedding: EmbeddingConfig,
    pub model: ModelConfig,
    #[serde(default)]
    pub assistant: AssistantConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
        }
    }
}

/// Connection settings for the document search index.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchConfig {
    /// Base URL of the search service.
    pub endpoint: String,
    /// Name of the index holding the ingested documents.
    pub index: String,
    #[serde(default)]
    pub api_key: String,
    /// Combined hit count requested per retrieval. Deliberately narrow:
    /// one best passage over recall.
    #[serde(default = "default_top")]
    pub top: usize,
}

/// Connection settings for the embedding service (OpenAI-compatible API).
#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingConfig {
    pub endpoint: String,
    /// Model or deployment identifier sent with each embedding request.
    pub deployment: String,
    #[serde(default)]
    pub api_key: String,
}

/// Connection settings for the generative model (OpenAI-compatible API).
#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    pub endpoint: String,
    pub deployment: String,
    #[serde(default)]
    pub api_key: String,
    pub temperature: Option<f64>,
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssistantConfig {
    /// Base system instructions. Immutable for the process lifetime.
    #[serde(default = "default_instructions")]
    pub instructions: String,
    /// Upper bound on prior turns handed to the model per request.
    /// Stored history is unbounded; only the prompt window is capped.
    #[serde(default = "default_max_history_messages")]
    pub max_history_messages: usize,
    /// Upper bound on the rendered context block, in characters.
    #[serde(default = "default_max_context_chars")]
    pub max_context_chars: usize,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            instructions: default_instructions(),
            max_history_messages: default_max_history_messages(),
            max_context_chars: default_max_context_chars(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            log_dir: default_log_dir(),
        }
    }
}

fn default_port() -> u16 {
    3978
}

fn default_top() -> usize {
    1
}

fn default_instructions() -> String {
    DEFAULT_INSTRUCTIONS.to_string()
}

fn default_max_history_messages() -> usize {
    20
}

fn default_max_context_chars() -> usize {
    8000
}

fn default_db_path() -> PathBuf {
    PathBuf::from("data/history.db")
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

impl AppConfig {
    /// Loads configuration from `CITELINE_CONFIG_PATH` or `./config.toml`,
    /// then applies environment overrides for secrets.
    pub fn load() -> anyhow::Result<Self> {
        let path = env::var("CITELINE_CONFIG_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config.toml"));

        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let mut config: AppConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(key) = env::var("CITELINE_SEARCH_API_KEY") {
            self.search.api_key = key;
        }
        if let Ok(key) = env::var("CITELINE_EMBEDDING_API_KEY") {
            self.embedding.api_key = key;
        }
        if let Ok(key) = env::var("CITELINE_MODEL_API_KEY") {
            self.model.api_key = key;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_config_with_defaults() {
        let raw = r#"
            [search]
            endpoint = "https://search.example.net"
            index = "documents"

            [embedding]
            endpoint = "https://models.example.net"
            deployment = "text-embedding-3-large"

            [model]
            endpoint = "https://models.example.net"
            deployment = "gpt-4o"
        "#;

        let config: AppConfig = toml::from_str(raw).unwrap();
        assert_eq!(config.search.top, 1);
        assert_eq!(config.server.port, 3978);
        assert_eq!(config.assistant.max_history_messages, 20);
        assert_eq!(config.assistant.max_context_chars, 8000);
        assert!(config.assistant.instructions.contains("results"));
        assert_eq!(config.storage.db_path, PathBuf::from("data/history.db"));
    }

    #[test]
    fn explicit_values_win_over_defaults() {
        let raw = r#"
            [server]
            port = 8080

            [search]
            endpoint = "https://search.example.net"
            index = "documents"
            top = 3

            [embedding]
            endpoint = "https://models.example.net"
            deployment = "embed"

            [model]
            endpoint = "https://models.example.net"
            deployment = "chat"
            temperature = 0.2
            max_tokens = 512

            [assistant]
            instructions = "Answer tersely."
            max_history_messages = 6
        "#;

        let config: AppConfig = toml::from_str(raw).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.search.top, 3);
        assert_eq!(config.model.temperature, Some(0.2));
        assert_eq!(config.model.max_tokens, Some(512));
        assert_eq!(config.assistant.instructions, "Answer tersely.");
        assert_eq!(config.assistant.max_history_messages, 6);
    }
}
