//! Turn Orchestrator.
//!
//! Per-message control flow: load history, retrieve grounding, assemble the
//! prompt, invoke the model, reconcile the output, persist the turn, emit the
//! reply. Calls are strictly sequential within a turn; turns for different
//! conversation keys run concurrently, while turns for the same key are
//! serialized through a per-key mutex so the history read-modify-write
//! cannot race.
//!
//! Failures are caught once, here: logged in full for operators and replaced
//! with one fixed, non-diagnostic message for the end user. A turn either
//! fully succeeds (with or without citations) or fully fails — no partial
//! responses, no retries.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tokio::sync::Mutex;
use uuid::Uuid;

use crate::clients::{ChatMessage, ChatModel};
use crate::core::errors::PipelineError;
use crate::history::{HistoryStore, TurnRecord};
use crate::host::{IncomingMessage, OutgoingMessage};
use crate::pipeline::prompt::PromptAssembler;
use crate::pipeline::reconcile::{reconcile, FinalAnswer};
use crate::pipeline::retriever::ContextRetriever;

/// The only text an end user ever sees when a turn fails.
pub const GENERIC_FAILURE_MESSAGE: &str =
    "Sorry, I ran into a problem while answering that. Please try again.";

/// Where a turn was when it failed. Operator-facing only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnPhase {
    Retrieving,
    Prompting,
    Reconciling,
    Persisting,
}

impl fmt::Display for TurnPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TurnPhase::Retrieving => "retrieving",
            TurnPhase::Prompting => "prompting",
            TurnPhase::Reconciling => "reconciling",
            TurnPhase::Persisting => "persisting",
        };
        f.write_str(name)
    }
}

pub struct TurnOrchestrator {
    retriever: ContextRetriever,
    prompt: PromptAssembler,
    model: Arc<dyn ChatModel>,
    history: Arc<dyn HistoryStore>,
    /// Prompt window: at most this many prior turns are handed to the model.
    max_history_messages: usize,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl TurnOrchestrator {
    pub fn new(
        retriever: ContextRetriever,
        prompt: PromptAssembler,
        model: Arc<dyn ChatModel>,
        history: Arc<dyn HistoryStore>,
        max_history_messages: usize,
    ) -> Self {
        Self {
            retriever,
            prompt,
            model,
            history,
            max_history_messages,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Processes one inbound message and returns the reply for the host to
    /// display. Never fails: any pipeline error becomes the fixed generic
    /// message.
    pub async fn handle_message(&self, message: &IncomingMessage) -> OutgoingMessage {
        let key = message.conversation_key();
        let turn_id = Uuid::new_v4();

        let lock = self.lock_for(&key).await;
        let _guard = lock.lock().await;

        match self.run_turn(&key, &message.text).await {
            Ok(answer) => {
                tracing::info!(%turn_id, key = %key, citations = answer.citations.len(), "turn complete");
                OutgoingMessage {
                    content: answer.content,
                    citations: answer.citations,
                    ai_generated: true,
                }
            }
            Err((phase, err)) => {
                tracing::error!(%turn_id, key = %key, phase = %phase, error = %err, "turn failed");
                OutgoingMessage {
                    content: GENERIC_FAILURE_MESSAGE.to_string(),
                    citations: Vec::new(),
                    ai_generated: false,
                }
            }
        }
    }

    async fn run_turn(
        &self,
        key: &str,
        text: &str,
    ) -> Result<FinalAnswer, (TurnPhase, PipelineError)> {
        // Retrieving: prior history plus fresh grounding for this query.
        let history = self
            .history
            .get(key)
            .await
            .map_err(|e| (TurnPhase::Retrieving, e))?;
        let context_block = self
            .retriever
            .retrieve(text)
            .await
            .map_err(|e| (TurnPhase::Retrieving, e))?;

        // Prompting: instructions + bounded history window + the new query.
        let instructions = self.prompt.assemble(&context_block);
        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(ChatMessage::system(instructions));
        for turn in recent_window(&history, self.max_history_messages) {
            messages.push(ChatMessage {
                role: turn.role.clone(),
                content: turn.content.clone(),
            });
        }
        messages.push(ChatMessage::user(text));

        let raw_output = self
            .model
            .complete(&messages)
            .await
            .map_err(|e| (TurnPhase::Prompting, e))?;

        // Reconciling never fails, whatever the model produced.
        let answer = reconcile(&raw_output, &context_block);

        // Persisting: both sides of the exchange are appended, user first.
        let mut updated = history;
        updated.push(TurnRecord::now("user", text));
        updated.push(TurnRecord::now("assistant", answer.content.clone()));
        self.history
            .set(key, &updated)
            .await
            .map_err(|e| (TurnPhase::Persisting, e))?;

        Ok(answer)
    }

    async fn lock_for(&self, key: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

fn recent_window(history: &[TurnRecord], max: usize) -> &[TurnRecord] {
    let start = history.len().saturating_sub(max);
    &history[start..]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(role: &str, content: &str) -> TurnRecord {
        TurnRecord::now(role, content)
    }

    #[test]
    fn window_keeps_most_recent_turns() {
        let history: Vec<TurnRecord> = (0..10)
            .map(|i| record("user", &format!("m{}", i)))
            .collect();

        let window = recent_window(&history, 4);
        assert_eq!(window.len(), 4);
        assert_eq!(window[0].content, "m6");
        assert_eq!(window[3].content, "m9");
    }

    #[test]
    fn window_shorter_than_max_is_untouched() {
        let history = vec![record("user", "a"), record("assistant", "b")];
        assert_eq!(recent_window(&history, 20).len(), 2);
    }

    #[test]
    fn phases_render_for_operator_logs() {
        assert_eq!(TurnPhase::Retrieving.to_string(), "retrieving");
        assert_eq!(TurnPhase::Persisting.to_string(), "persisting");
    }
}
