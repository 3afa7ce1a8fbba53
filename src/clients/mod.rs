//! HTTP clients for the external collaborators: embedding service, search
//! index, and generative model. Each sits behind a trait so the pipeline can
//! be exercised without the network.

pub mod chat;
pub mod embedding;
pub mod index;

pub use chat::{ChatMessage, ChatModel, HttpChatModel};
pub use embedding::{Embedder, HttpEmbedder};
pub use index::{HttpSearchIndex, SearchHit, SearchIndex};
