//! Generator backends.

mod ollama;

pub use ollama::{OllamaGenerator, DEFAULT_MODEL, DEFAULT_OLLAMA_URL};
