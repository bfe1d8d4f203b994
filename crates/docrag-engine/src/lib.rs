//! Retrieval, answer caching, ingestion and question answering on top of the
//! core types and the shared vector index.

pub mod assistant;
pub mod cache;
mod embedding;
pub mod llm;
pub mod pipeline;
pub mod prompt;
pub mod retrieval;
pub mod retry;

pub use assistant::Assistant;
pub use cache::{AnswerCache, CachedAnswer};
pub use llm::OllamaGenerator;
pub use pipeline::IngestionPipeline;
pub use retrieval::{RetrievalEngine, RetrievedChunk};
pub use retry::Backoff;
