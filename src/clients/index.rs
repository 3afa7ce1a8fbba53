//! Search index client.
//!
//! Issues one hybrid request per retrieval: a lexical match restricted to the
//! content field combined with a vector nearest-neighbor match on the
//! embedding field, with a fixed field projection. Ranking is entirely the
//! service's business; hit order is preserved as returned.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::{json, Value};

use crate::core::config::SearchConfig;
use crate::core::errors::PipelineError;

const SEARCH_API_VERSION: &str = "2023-11-01";

/// One retrieved document fragment. Identity is positional within a single
/// retrieval; there is no cross-turn identity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub content: String,
    pub source_file: String,
    pub source_page: Option<String>,
    pub category: Option<String>,
}

#[async_trait]
pub trait SearchIndex: Send + Sync {
    async fn search(
        &self,
        query: &str,
        vector: &[f32],
        top: usize,
    ) -> Result<Vec<SearchHit>, PipelineError>;
}

#[derive(Clone)]
pub struct HttpSearchIndex {
    endpoint: String,
    index: String,
    api_key: String,
    client: Client,
}

impl HttpSearchIndex {
    pub fn new(config: &SearchConfig) -> Self {
        Self {
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            index: config.index.clone(),
            api_key: config.api_key.clone(),
            client: Client::new(),
        }
    }
}

#[async_trait]
impl SearchIndex for HttpSearchIndex {
    async fn search(
        &self,
        query: &str,
        vector: &[f32],
        top: usize,
    ) -> Result<Vec<SearchHit>, PipelineError> {
        let url = format!(
            "{}/indexes/{}/docs/search?api-version={}",
            self.endpoint, self.index, SEARCH_API_VERSION
        );

        let body = hybrid_search_body(query, vector, top);

        let res = self
            .client
            .post(&url)
            .header("api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(PipelineError::retrieval)?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(PipelineError::Retrieval(format!(
                "search request returned {}: {}",
                status, text
            )));
        }

        let payload: Value = res.json().await.map_err(PipelineError::retrieval)?;

        let items = payload
            .get("value")
            .and_then(|v| v.as_array())
            .cloned()
            .unwrap_or_default();

        Ok(items.iter().filter_map(hit_from_value).collect())
    }
}

/// Request body for one hybrid search: lexical match on `content` plus a
/// vector clause on `embedding`, both capped at `top` combined results.
pub fn hybrid_search_body(query: &str, vector: &[f32], top: usize) -> Value {
    json!({
        "search": query,
        "searchFields": "content",
        "select": "id,content,sourcefile,sourcepage,category",
        "top": top,
        "vectorQueries": [{
            "kind": "vector",
            "vector": vector,
            "fields": "embedding",
            "k": top,
        }],
    })
}

/// Reads one hit out of the projected response record. Hits without content
/// are skipped; the page field tolerates both string and numeric values.
fn hit_from_value(item: &Value) -> Option<SearchHit> {
    let content = item.get("content").and_then(|v| v.as_str())?;

    let source_file = item
        .get("sourcefile")
        .and_then(|v| v.as_str())
        .unwrap_or("unknown")
        .to_string();

    let source_page = item.get("sourcepage").and_then(|v| match v {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    });

    let category = item
        .get("category")
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string());

    Some(SearchHit {
        content: content.to_string(),
        source_file,
        source_page,
        category,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_carries_lexical_and_vector_clauses() {
        let body = hybrid_search_body("expense policy", &[0.5, 0.25], 1);

        assert_eq!(body["search"], "expense policy");
        assert_eq!(body["searchFields"], "content");
        assert_eq!(body["top"], 1);
        assert_eq!(body["vectorQueries"][0]["fields"], "embedding");
        assert_eq!(body["vectorQueries"][0]["k"], 1);
        assert_eq!(
            body["vectorQueries"][0]["vector"].as_array().unwrap().len(),
            2
        );
        // Fixed projection: unrequested fields are never read.
        assert_eq!(body["select"], "id,content,sourcefile,sourcepage,category");
    }

    #[test]
    fn parses_hit_with_all_fields() {
        let item = json!({
            "id": "1",
            "content": "Employees may expense travel.",
            "sourcefile": "handbook.pdf",
            "sourcepage": "12",
            "category": "hr"
        });

        let hit = hit_from_value(&item).unwrap();
        assert_eq!(hit.source_file, "handbook.pdf");
        assert_eq!(hit.source_page.as_deref(), Some("12"));
        assert_eq!(hit.category.as_deref(), Some("hr"));
    }

    #[test]
    fn numeric_page_is_rendered_as_string() {
        let item = json!({"content": "x", "sourcefile": "a.pdf", "sourcepage": 7});
        let hit = hit_from_value(&item).unwrap();
        assert_eq!(hit.source_page.as_deref(), Some("7"));
    }

    #[test]
    fn hit_without_content_is_skipped() {
        assert!(hit_from_value(&json!({"sourcefile": "a.pdf"})).is_none());
    }

    #[test]
    fn missing_optional_fields_default_cleanly() {
        let hit = hit_from_value(&json!({"content": "x"})).unwrap();
        assert_eq!(hit.source_file, "unknown");
        assert!(hit.source_page.is_none());
        assert!(hit.category.is_none());
    }
}
