//! The retrieval-and-grounding pipeline.
//!
//! One turn flows retriever → prompt assembler → model → reconciler, with
//! the orchestrator owning control flow, failure policy, and history.

pub mod prompt;
pub mod reconcile;
pub mod retriever;
pub mod turn;

pub use prompt::PromptAssembler;
pub use reconcile::{reconcile, Citation, FinalAnswer};
pub use retriever::{ContextRetriever, RetrieverConfig};
pub use turn::{TurnOrchestrator, GENERIC_FAILURE_MESSAGE};
