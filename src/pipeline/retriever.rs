//! Context Retriever.
//!
//! Converts a user query into one hybrid search against the document index
//! and renders the returned hits into a single delimited context block:
//!
//! `<context source="LABEL">CONTENT</context>`
//!
//! where LABEL is the source file with optional page and category suffixes.
//! The block is created fresh per turn and never cached.

use std::sync::Arc;

use crate::clients::{Embedder, SearchHit, SearchIndex};
use crate::core::errors::PipelineError;

#[derive(Debug, Clone)]
pub struct RetrieverConfig {
    /// Combined hit count requested from the index.
    pub top: usize,
    /// Cap on the rendered block, in characters. Segments that would
    /// overflow are dropped whole, in retrieval order.
    pub max_context_chars: usize,
}

impl Default for RetrieverConfig {
    fn default() -> Self {
        Self {
            top: 1,
            max_context_chars: 8000,
        }
    }
}

pub struct ContextRetriever {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn SearchIndex>,
    config: RetrieverConfig,
}

impl ContextRetriever {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn SearchIndex>,
        config: RetrieverConfig,
    ) -> Self {
        Self {
            embedder,
            index,
            config,
        }
    }

    /// Retrieves grounding for `query`.
    ///
    /// An empty query returns an empty block without touching the embedding
    /// service or the index. A search failure propagates: silently dropping
    /// grounding would let the model answer unguided without signaling it.
    pub async fn retrieve(&self, query: &str) -> Result<String, PipelineError> {
        if query.trim().is_empty() {
            return Ok(String::new());
        }

        let vector = self.embedder.embed(query).await?;
        let hits = self.index.search(query, &vector, self.config.top).await?;

        if hits.is_empty() {
            tracing::debug!("retrieval returned no hits");
        } else {
            tracing::debug!(hits = hits.len(), "retrieval complete");
        }

        Ok(render_context_block(&hits, self.config.max_context_chars))
    }
}

/// Source label for one hit: `sourceFile [ " (Page N)" ] [ " [category]" ]`.
pub fn citation_label(hit: &SearchHit) -> String {
    let mut label = hit.source_file.clone();
    if let Some(page) = &hit.source_page {
        label.push_str(&format!(" (Page {})", page));
    }
    if let Some(category) = &hit.category {
        label.push_str(&format!(" [{}]", category));
    }
    label
}

fn render_context_block(hits: &[SearchHit], max_chars: usize) -> String {
    let mut block = String::new();

    for hit in hits {
        let segment = format!(
            "<context source=\"{}\">{}</context>",
            citation_label(hit),
            hit.content
        );
        if block.chars().count() + segment.chars().count() > max_chars {
            tracing::warn!(
                source = %hit.source_file,
                "context segment dropped: block would exceed {} chars",
                max_chars
            );
            continue;
        }
        block.push_str(&segment);
    }

    block
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;

    struct MockEmbedder {
        calls: AtomicUsize,
        fail: bool,
    }

    impl MockEmbedder {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail: false,
            }
        }
    }

    #[async_trait]
    impl Embedder for MockEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>, PipelineError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(PipelineError::Embedding("no vectors".to_string()));
            }
            Ok(vec![0.1, 0.2, 0.3])
        }
    }

    struct MockIndex {
        calls: AtomicUsize,
        hits: Vec<SearchHit>,
        fail: bool,
    }

    impl MockIndex {
        fn with_hits(hits: Vec<SearchHit>) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                hits,
                fail: false,
            }
        }
    }

    #[async_trait]
    impl SearchIndex for MockIndex {
        async fn search(
            &self,
            _query: &str,
            _vector: &[f32],
            _top: usize,
        ) -> Result<Vec<SearchHit>, PipelineError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(PipelineError::Retrieval("boom".to_string()));
            }
            Ok(self.hits.clone())
        }
    }

    fn hit(content: &str, file: &str) -> SearchHit {
        SearchHit {
            content: content.to_string(),
            source_file: file.to_string(),
            source_page: None,
            category: None,
        }
    }

    fn retriever(
        embedder: Arc<MockEmbedder>,
        index: Arc<MockIndex>,
        config: RetrieverConfig,
    ) -> ContextRetriever {
        ContextRetriever::new(embedder, index, config)
    }

    #[tokio::test]
    async fn empty_query_makes_no_calls() {
        let embedder = Arc::new(MockEmbedder::new());
        let index = Arc::new(MockIndex::with_hits(vec![hit("x", "a.pdf")]));
        let r = retriever(embedder.clone(), index.clone(), RetrieverConfig::default());

        let block = r.retrieve("").await.unwrap();
        assert_eq!(block, "");
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
        assert_eq!(index.calls.load(Ordering::SeqCst), 0);

        let block = r.retrieve("   ").await.unwrap();
        assert_eq!(block, "");
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn one_embed_and_one_search_per_retrieval() {
        let embedder = Arc::new(MockEmbedder::new());
        let index = Arc::new(MockIndex::with_hits(vec![hit("hello", "doc1.pdf")]));
        let r = retriever(embedder.clone(), index.clone(), RetrieverConfig::default());

        let block = r.retrieve("greeting").await.unwrap();
        assert_eq!(block, "<context source=\"doc1.pdf\">hello</context>");
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 1);
        assert_eq!(index.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn zero_hits_yield_empty_block() {
        let embedder = Arc::new(MockEmbedder::new());
        let index = Arc::new(MockIndex::with_hits(vec![]));
        let r = retriever(embedder, index, RetrieverConfig::default());

        assert_eq!(r.retrieve("anything").await.unwrap(), "");
    }

    #[tokio::test]
    async fn embedding_failure_propagates_before_search() {
        let embedder = Arc::new(MockEmbedder {
            calls: AtomicUsize::new(0),
            fail: true,
        });
        let index = Arc::new(MockIndex::with_hits(vec![hit("x", "a.pdf")]));
        let r = retriever(embedder, index.clone(), RetrieverConfig::default());

        let err = r.retrieve("q").await.unwrap_err();
        assert!(matches!(err, PipelineError::Embedding(_)));
        assert_eq!(index.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn search_failure_propagates() {
        let embedder = Arc::new(MockEmbedder::new());
        let index = Arc::new(MockIndex {
            calls: AtomicUsize::new(0),
            hits: vec![],
            fail: true,
        });
        let r = retriever(embedder, index, RetrieverConfig::default());

        let err = r.retrieve("q").await.unwrap_err();
        assert!(matches!(err, PipelineError::Retrieval(_)));
    }

    #[test]
    fn label_carries_page_and_category_suffixes() {
        let mut h = hit("x", "handbook.pdf");
        assert_eq!(citation_label(&h), "handbook.pdf");

        h.source_page = Some("12".to_string());
        assert_eq!(citation_label(&h), "handbook.pdf (Page 12)");

        h.category = Some("hr".to_string());
        assert_eq!(citation_label(&h), "handbook.pdf (Page 12) [hr]");
    }

    #[test]
    fn segments_concatenate_in_retrieval_order() {
        let hits = vec![hit("first", "a.pdf"), hit("second", "b.pdf")];
        let block = render_context_block(&hits, 8000);
        assert_eq!(
            block,
            "<context source=\"a.pdf\">first</context><context source=\"b.pdf\">second</context>"
        );
    }

    #[test]
    fn oversize_segment_is_dropped_whole() {
        let hits = vec![hit(&"x".repeat(300), "big.pdf"), hit("small", "tiny.pdf")];
        let block = render_context_block(&hits, 100);
        assert!(!block.contains("big.pdf"));
        assert!(block.contains("tiny.pdf"));
    }
}
