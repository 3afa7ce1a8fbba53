//! Citeline backend: a conversational assistant that grounds language-model
//! answers in evidence retrieved from a hybrid (lexical + vector) document
//! index and reconciles the model's output into citation-annotated replies.

pub mod clients;
pub mod core;
pub mod history;
pub mod host;
pub mod logging;
pub mod pipeline;
pub mod server;
pub mod state;
