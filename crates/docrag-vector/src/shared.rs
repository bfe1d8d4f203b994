use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use tokio::sync::Mutex;
use tracing::{info, warn};

use docrag_core::{Error, Result};

use crate::flat::FlatIndex;

/// Process-wide handle around the persisted index.
///
/// Readers take an `Arc` snapshot and never observe a half-built index.
/// Rebuilds are serialized: each one starts from the latest published
/// snapshot, so concurrent writers cannot drop each other's entries.
pub struct SharedIndex {
    path: PathBuf,
    current: RwLock<Arc<FlatIndex>>,
    rebuild_lock: Mutex<()>,
}

fn join_error(e: tokio::task::JoinError) -> Error {
    Error::IndexIo(std::io::Error::new(std::io::ErrorKind::Other, e))
}

async fn persist_blocking(index: FlatIndex, path: PathBuf) -> Result<FlatIndex> {
    tokio::task::spawn_blocking(move || index.persist(&path).map(|_| index)).await.map_err(join_error)?
}

impl SharedIndex {
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let load_path = path.clone();
        let index = tokio::task::spawn_blocking(move || FlatIndex::load(&load_path)).await.map_err(join_error)??;
        info!(path = %path.display(), entries = index.len(), "opened vector index");
        Ok(Self { path, current: RwLock::new(Arc::new(index)), rebuild_lock: Mutex::new(()) })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn snapshot(&self) -> Arc<FlatIndex> {
        match self.current.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    fn publish(&self, index: FlatIndex) {
        let next = Arc::new(index);
        match self.current.write() {
            Ok(mut guard) => *guard = next,
            Err(poisoned) => *poisoned.into_inner() = next,
        }
    }

    /// Clone the current index, let `build` edit the clone, persist it and
    /// publish it.
    pub async fn rebuild<F, R>(&self, build: F) -> Result<R>
    where
        F: FnOnce(&mut FlatIndex) -> Result<R>,
    {
        self.rebuild_then(build, |_| Ok(())).await
    }

    /// Like [`SharedIndex::rebuild`], with `commit` run after the new file is
    /// durable but before it is published. If `commit` fails the previous
    /// index is written back and stays published.
    pub async fn rebuild_then<F, C, R>(&self, build: F, commit: C) -> Result<R>
    where
        F: FnOnce(&mut FlatIndex) -> Result<R>,
        C: FnOnce(&R) -> Result<()>,
    {
        let _guard = self.rebuild_lock.lock().await;
        let previous = self.snapshot();
        let mut next = (*previous).clone();
        let out = build(&mut next)?;

        let next = persist_blocking(next, self.path.clone()).await?;
        if let Err(e) = commit(&out) {
            warn!(error = %e, "index commit failed, restoring previous index file");
            persist_blocking((*previous).clone(), self.path.clone()).await?;
            return Err(e);
        }
        self.publish(next);
        Ok(out)
    }
}
