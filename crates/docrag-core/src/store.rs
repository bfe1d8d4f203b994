//! In-process [`MetadataStore`] with an optional JSON snapshot file.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;

use crate::error::{Error, Result};
use crate::traits::MetadataStore;
use crate::types::{Chunk, ChunkId, Document, DocumentId, DocumentStatus, QueryLog};

#[derive(Debug, Default, Serialize, Deserialize)]
struct State {
    documents: HashMap<DocumentId, Document>,
    chunks: HashMap<ChunkId, Chunk>,
    queries: Vec<QueryLog>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<State>,
    snapshot: Option<PathBuf>,
}

impl MemoryStore {
    /// A store that lives only as long as the process.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load `path` if it exists and write every change back to it.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let state = if path.exists() {
            let bytes = fs::read(&path).map_err(|e| Error::Store(format!("read {}: {e}", path.display())))?;
            serde_json::from_slice(&bytes)
                .map_err(|e| Error::Store(format!("parse {}: {e}", path.display())))?
        } else {
            State::default()
        };
        debug!(
            path = %path.display(),
            documents = state.documents.len(),
            chunks = state.chunks.len(),
            "opened metadata store"
        );
        Ok(Self { state: RwLock::new(state), snapshot: Some(path) })
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, State>> {
        self.state.read().map_err(|_| Error::Store("state lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, State>> {
        self.state.write().map_err(|_| Error::Store("state lock poisoned".to_string()))
    }

    /// Write the snapshot while the caller still holds the write guard, so
    /// snapshots land in mutation order.
    fn flush(&self, state: &State) -> Result<()> {
        let Some(path) = &self.snapshot else {
            return Ok(());
        };
        write_atomic(path, state).map_err(|e| Error::Store(format!("write {}: {e}", path.display())))
    }
}

fn write_atomic(path: &Path, state: &State) -> std::io::Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    serde_json::to_writer(&mut tmp, state)?;
    tmp.flush()?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

impl MetadataStore for MemoryStore {
    fn put_document(&self, document: Document) -> Result<()> {
        let mut state = self.write()?;
        state.documents.insert(document.id.clone(), document);
        self.flush(&state)
    }

    fn document(&self, id: &str) -> Result<Option<Document>> {
        Ok(self.read()?.documents.get(id).cloned())
    }

    fn documents_for_owner(&self, owner_id: &str) -> Result<Vec<Document>> {
        let state = self.read()?;
        let mut docs: Vec<Document> =
            state.documents.values().filter(|d| d.owner_id == owner_id).cloned().collect();
        docs.sort_by(|a, b| b.uploaded_at.cmp(&a.uploaded_at));
        Ok(docs)
    }

    fn set_status(&self, id: &str, status: DocumentStatus, total_chunks: usize) -> Result<()> {
        let mut state = self.write()?;
        let doc = state.documents.get_mut(id).ok_or_else(|| Error::NotFound(format!("document {id}")))?;
        doc.status = status;
        doc.total_chunks = total_chunks;
        self.flush(&state)
    }

    fn insert_chunks(&self, chunks: Vec<Chunk>) -> Result<()> {
        let mut state = self.write()?;
        let mut taken: HashSet<(DocumentId, usize)> =
            state.chunks.values().map(|c| (c.document_id.clone(), c.index)).collect();
        for chunk in &chunks {
            if !state.documents.contains_key(&chunk.document_id) {
                return Err(Error::NotFound(format!("document {}", chunk.document_id)));
            }
            if !taken.insert((chunk.document_id.clone(), chunk.index)) {
                return Err(Error::Store(format!(
                    "duplicate chunk index {} for document {}",
                    chunk.index, chunk.document_id
                )));
            }
        }
        for chunk in chunks {
            state.chunks.insert(chunk.id.clone(), chunk);
        }
        self.flush(&state)
    }

    fn chunk(&self, id: &str) -> Result<Option<Chunk>> {
        Ok(self.read()?.chunks.get(id).cloned())
    }

    fn chunks_for_document(&self, document_id: &str) -> Result<Vec<Chunk>> {
        let state = self.read()?;
        let mut chunks: Vec<Chunk> =
            state.chunks.values().filter(|c| c.document_id == document_id).cloned().collect();
        chunks.sort_by_key(|c| c.index);
        Ok(chunks)
    }

    fn set_embedding_stored(&self, ids: &[ChunkId], stored: bool) -> Result<()> {
        let mut state = self.write()?;
        if let Some(missing) = ids.iter().find(|id| !state.chunks.contains_key(*id)) {
            return Err(Error::NotFound(format!("chunk {missing}")));
        }
        for id in ids {
            if let Some(chunk) = state.chunks.get_mut(id) {
                chunk.embedding_stored = stored;
            }
        }
        self.flush(&state)
    }

    fn delete_chunks(&self, document_id: &str) -> Result<usize> {
        let mut state = self.write()?;
        let before = state.chunks.len();
        state.chunks.retain(|_, c| c.document_id != document_id);
        let removed = before - state.chunks.len();
        self.flush(&state)?;
        Ok(removed)
    }

    fn log_query(&self, entry: QueryLog) -> Result<()> {
        let mut state = self.write()?;
        state.queries.push(entry);
        self.flush(&state)
    }

    fn recent_queries(&self, owner_id: &str, limit: usize) -> Result<Vec<QueryLog>> {
        let state = self.read()?;
        // Appended in time order, so walking backwards is newest first.
        Ok(state.queries.iter().rev().filter(|q| q.owner_id == owner_id).take(limit).cloned().collect())
    }
}
