//! Response Reconciler.
//!
//! Takes whatever text the model produced and turns it into a final answer
//! plus an ordered citation list. The model's output is untrusted: it may be
//! the structured `{results: [...]}` shape, valid JSON without usable
//! results, or free text. All three are handled; this function never fails.

use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;
use serde_json::Value;

/// Longest abstract kept when citations are rebuilt from the context block.
const MAX_ABSTRACT_CHARS: usize = 200;

/// A structured reference tracing part of an answer to a retrieved source.
/// Citations are 1-indexed in presentation order; that index is their only
/// stable identity within a turn.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Citation {
    pub name: String,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
}

/// The unit handed to the messaging host for display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FinalAnswer {
    pub content: String,
    pub citations: Vec<Citation>,
}

/// One entry of the structured model output.
#[derive(Debug, Clone)]
struct ResultEntry {
    answer: String,
    /// `Some` when the key was present and non-null; an empty string is a
    /// falsy title and still counts as cited.
    citation_title: Option<String>,
    citation_content: Option<String>,
}

/// The three shapes model output can take.
enum ModelReply {
    Structured(Vec<ResultEntry>),
    StructuredEmpty,
    PlainText(String),
}

fn classify(raw_output: &str) -> ModelReply {
    let parsed: Value = match serde_json::from_str(raw_output) {
        Ok(value) => value,
        Err(_) => return ModelReply::PlainText(raw_output.to_string()),
    };

    let results = parsed.get("results").and_then(|v| v.as_array());
    match results {
        Some(items) if !items.is_empty() => {
            ModelReply::Structured(items.iter().map(entry_from_value).collect())
        }
        _ => ModelReply::StructuredEmpty,
    }
}

fn entry_from_value(item: &Value) -> ResultEntry {
    let answer = item
        .get("answer")
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string();

    let citation_title = item
        .get("citationTitle")
        .filter(|v| !v.is_null())
        .map(|v| v.as_str().unwrap_or("").to_string());

    let citation_content = item
        .get("citationContent")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string());

    ResultEntry {
        answer,
        citation_title,
        citation_content,
    }
}

/// Reconciles raw model output against the context block that grounded it.
///
/// Pure function: identical inputs always yield the identical answer.
pub fn reconcile(raw_output: &str, context_block: &str) -> FinalAnswer {
    match classify(raw_output) {
        ModelReply::PlainText(text) => {
            // A plain conversational answer with no grounding still beats
            // failing the turn.
            FinalAnswer {
                content: text,
                citations: Vec::new(),
            }
        }
        ModelReply::Structured(entries) => reconcile_structured(entries),
        ModelReply::StructuredEmpty => {
            // The model was grounded but returned no usable results, so the
            // citations are rebuilt from what was fed in, not what came back.
            let citations = if context_block.is_empty() {
                Vec::new()
            } else {
                citations_from_context(context_block)
            };
            FinalAnswer {
                content: raw_output.to_string(),
                citations,
            }
        }
    }
}

fn reconcile_structured(entries: Vec<ResultEntry>) -> FinalAnswer {
    let mut parts: Vec<String> = Vec::new();
    let mut citations: Vec<Citation> = Vec::new();

    for entry in entries {
        match entry.citation_title {
            Some(title) => {
                // Positions are contiguous across cited entries only.
                let position = citations.len() + 1;
                parts.push(format!("{}[{}]", entry.answer, position));

                let name = if title.is_empty() {
                    format!("Document #{}", position)
                } else {
                    title.clone()
                };
                let abstract_text = entry
                    .citation_content
                    .unwrap_or_else(|| format!("Full document content from {}", title));

                citations.push(Citation {
                    name,
                    abstract_text,
                });
            }
            None => {
                // Uncited commentary interleaved with cited passages.
                parts.push(entry.answer);
            }
        }
    }

    FinalAnswer {
        content: parts.join("\n"),
        citations,
    }
}

fn context_segment_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // (?s) so segment content may span lines.
    RE.get_or_init(|| {
        Regex::new(r#"(?s)<context source="([^"]*)">(.*?)</context>"#)
            .unwrap_or_else(|e| panic!("invalid context segment regex: {}", e))
    })
}

fn citations_from_context(context_block: &str) -> Vec<Citation> {
    context_segment_regex()
        .captures_iter(context_block)
        .map(|caps| Citation {
            name: caps[1].to_string(),
            abstract_text: truncate_abstract(&caps[2]),
        })
        .collect()
}

fn truncate_abstract(text: &str) -> String {
    if text.chars().count() > MAX_ABSTRACT_CHARS {
        let cut: String = text.chars().take(MAX_ABSTRACT_CHARS).collect();
        format!("{}...", cut)
    } else {
        text.to_string()
    }
}
