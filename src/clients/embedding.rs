//! Embedding service client.
//!
//! Turns query text into a fixed-length vector via an OpenAI-compatible
//! `/v1/embeddings` endpoint. One outbound call per invocation; no caching
//! and no retries — transient failures propagate to the retriever.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use crate::core::config::EmbeddingConfig;
use crate::core::errors::PipelineError;

#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embeds one piece of text. Guaranteed to return a non-empty vector;
    /// a service response without vectors is an `Embedding` error.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, PipelineError>;
}

#[derive(Clone)]
pub struct HttpEmbedder {
    base_url: String,
    deployment: String,
    api_key: String,
    client: Client,
}

impl HttpEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Self {
        Self {
            base_url: config.endpoint.trim_end_matches('/').to_string(),
            deployment: config.deployment.clone(),
            api_key: config.api_key.clone(),
            client: Client::new(),
        }
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, PipelineError> {
        let url = format!("{}/v1/embeddings", self.base_url);

        let body = json!({
            "model": self.deployment,
            "input": [text],
        });

        let res = self
            .client
            .post(&url)
            .header("api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(PipelineError::embedding)?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(PipelineError::Embedding(format!(
                "embedding request returned {}: {}",
                status, text
            )));
        }

        let payload: Value = res.json().await.map_err(PipelineError::embedding)?;

        first_embedding(&payload).ok_or_else(|| {
            PipelineError::Embedding("response contained no embedding vectors".to_string())
        })
    }
}

/// Extracts the first embedding vector from a response payload.
/// Returns `None` when the data list is missing, empty, or the vector
/// itself has zero dimensions.
fn first_embedding(payload: &Value) -> Option<Vec<f32>> {
    let vals = payload
        .get("data")
        .and_then(|d| d.as_array())
        .and_then(|items| items.first())
        .and_then(|item| item.get("embedding"))
        .and_then(|e| e.as_array())?;

    let vector: Vec<f32> = vals
        .iter()
        .filter_map(|v| v.as_f64().map(|f| f as f32))
        .collect();

    if vector.is_empty() {
        None
    } else {
        Some(vector)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_first_vector() {
        let payload = json!({
            "data": [
                {"embedding": [0.1, 0.2, 0.3]},
                {"embedding": [9.0, 9.0, 9.0]}
            ]
        });
        let vector = first_embedding(&payload).unwrap();
        assert_eq!(vector.len(), 3);
        assert!((vector[0] - 0.1).abs() < 1e-6);
    }

    #[test]
    fn empty_data_yields_none() {
        assert!(first_embedding(&json!({"data": []})).is_none());
        assert!(first_embedding(&json!({})).is_none());
    }

    #[test]
    fn zero_dimension_vector_yields_none() {
        let payload = json!({"data": [{"embedding": []}]});
        assert!(first_embedding(&payload).is_none());
    }
}
