//! Generative model client (OpenAI-compatible chat completions).

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::core::config::ModelConfig;
use crate::core::errors::PipelineError;

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

#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Runs one completion and returns the raw text content. The content may
    /// or may not be well-formed JSON; interpreting it is the reconciler's
    /// job, not the client's.
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, PipelineError>;
}

#[derive(Clone)]
pub struct HttpChatModel {
    base_url: String,
    deployment: String,
    api_key: String,
    temperature: Option<f64>,
    max_tokens: Option<u32>,
    client: Client,
}

impl HttpChatModel {
    pub fn new(config: &ModelConfig) -> Self {
        Self {
            base_url: config.endpoint.trim_end_matches('/').to_string(),
            deployment: config.deployment.clone(),
            api_key: config.api_key.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            client: Client::new(),
        }
    }
}

#[async_trait]
impl ChatModel for HttpChatModel {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, PipelineError> {
        let url = format!("{}/v1/chat/completions", self.base_url);

        let mut body = json!({
            "model": self.deployment,
            "messages": messages,
            "stream": false,
        });

        if let Some(obj) = body.as_object_mut() {
            if let Some(t) = self.temperature {
                obj.insert("temperature".to_string(), json!(t));
            }
            if let Some(t) = self.max_tokens {
                obj.insert("max_tokens".to_string(), json!(t));
            }
        }

        let res = self
            .client
            .post(&url)
            .header("api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(PipelineError::model)?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(PipelineError::ModelInvocation(format!(
                "chat request returned {}: {}",
                status, text
            )));
        }

        let payload: Value = res.json().await.map_err(PipelineError::model)?;

        let content = payload["choices"][0]["message"]["content"]
            .as_str()
            .unwrap_or_default()
            .to_string();

        if content.is_empty() {
            return Err(PipelineError::ModelInvocation(
                "model returned no content".to_string(),
            ));
        }

        Ok(content)
    }
}
