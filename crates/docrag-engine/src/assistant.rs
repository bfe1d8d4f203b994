use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use docrag_core::config::Settings;
use docrag_core::traits::{GenerationRequest, Generator, MetadataStore};
use docrag_core::types::{Answer, QueryLog};
use docrag_core::{Error, Result};

use crate::cache::AnswerCache;
use crate::prompt::{build_prompt, degraded_answer, dedup_sources, source_label, NO_RESULTS_ANSWER};
use crate::retrieval::{RetrievalEngine, RetrievedChunk};

/// Answers owner-scoped questions from indexed documents.
pub struct Assistant {
    retrieval: RetrievalEngine,
    generator: Arc<dyn Generator>,
    store: Arc<dyn MetadataStore>,
    cache: AnswerCache,
    deadline: Duration,
    temperature: f32,
    max_tokens: usize,
    history_limit: usize,
}

struct Reply {
    answer: String,
    sources: Vec<String>,
    cached: bool,
}

impl Assistant {
    pub fn new(
        retrieval: RetrievalEngine,
        generator: Arc<dyn Generator>,
        store: Arc<dyn MetadataStore>,
        settings: &Settings,
    ) -> Self {
        Self {
            retrieval,
            generator,
            store,
            cache: AnswerCache::new(settings.cache.ttl()),
            deadline: settings.answer.deadline(),
            temperature: settings.generation.temperature,
            max_tokens: settings.generation.max_tokens,
            history_limit: settings.answer.history_limit,
        }
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn cache(&self) -> &AnswerCache {
        &self.cache
    }

    /// Answer `question` from `owner_id`'s documents and log the exchange.
    ///
    /// The deadline covers retrieval and generation; when it passes the call
    /// fails with [`Error::Timeout`] and nothing is cached or logged.
    pub async fn answer(&self, question: &str, owner_id: &str) -> Result<Answer> {
        let start = Instant::now();
        let reply = tokio::time::timeout(self.deadline, self.reply(question, owner_id))
            .await
            .map_err(|_| {
                warn!(owner_id, deadline_ms = self.deadline.as_millis() as u64, "answer timed out");
                Error::Timeout(self.deadline)
            })??;

        let answer = Answer {
            answer: reply.answer,
            sources: reply.sources,
            response_time: start.elapsed().as_secs_f64(),
            cached: reply.cached,
        };
        if let Err(e) = self.store.log_query(QueryLog::new(owner_id, question, &answer)) {
            warn!(owner_id, error = %e, "could not record query");
        }
        info!(owner_id, cached = answer.cached, sources = answer.sources.len(), secs = answer.response_time, "answered");
        Ok(answer)
    }

    async fn reply(&self, question: &str, owner_id: &str) -> Result<Reply> {
        let chunks = self.retrieval.retrieve(question, owner_id, self.retrieval.default_top_k()).await?;
        if chunks.is_empty() {
            return Ok(Reply { answer: NO_RESULTS_ANSWER.to_string(), sources: Vec::new(), cached: false });
        }

        let chunk_ids: Vec<String> = chunks.iter().map(|c| c.chunk.id.clone()).collect();
        if let Some(hit) = self.cache.get(question, &chunk_ids) {
            debug!(owner_id, "answer cache hit");
            return Ok(Reply { answer: hit.answer, sources: hit.sources, cached: true });
        }

        let request = GenerationRequest {
            prompt: build_prompt(question, &chunks),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };
        match self.generator.generate(&request).await {
            Ok(text) => {
                let text = text.trim().to_string();
                let sources = self.sources(&chunks)?;
                self.cache.put(question, &chunk_ids, &text, &sources);
                Ok(Reply { answer: text, sources, cached: false })
            }
            Err(e) => {
                warn!(owner_id, error = %e, "generation failed, returning degraded answer");
                Ok(Reply { answer: degraded_answer(&e), sources: Vec::new(), cached: false })
            }
        }
    }

    fn sources(&self, chunks: &[RetrievedChunk]) -> Result<Vec<String>> {
        let mut labels = Vec::with_capacity(chunks.len());
        for c in chunks {
            match self.store.document(&c.chunk.document_id)? {
                Some(doc) => labels.push(source_label(&doc.title, c.chunk.page)),
                None => debug!(document_id = %c.chunk.document_id, "chunk without document, no citation"),
            }
        }
        Ok(dedup_sources(labels))
    }

    /// The owner's most recent questions, newest first. `None` uses the
    /// configured history limit.
    pub fn history(&self, owner_id: &str, limit: Option<usize>) -> Result<Vec<QueryLog>> {
        self.store.recent_queries(owner_id, limit.unwrap_or(self.history_limit))
    }
}
