//! Versioned single-file blob: magic, version, dimension tag, flat vectors
//! and parallel id arrays, written through a temp file and an atomic rename.

use bincode::Options;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::{debug, error};

use docrag_core::types::{ChunkId, OwnerId};
use docrag_core::{Error, Result};

use crate::flat::FlatIndex;

pub const INDEX_MAGIC: [u8; 4] = *b"DRIX";
pub const INDEX_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct IndexBlob {
    magic: [u8; 4],
    version: u32,
    /// 0 while no vector has ever been added.
    dim: u64,
    vectors: Vec<f32>,
    chunk_ids: Vec<ChunkId>,
    owner_ids: Vec<OwnerId>,
}

fn codec() -> impl Options {
    bincode::options().with_fixint_encoding().with_little_endian()
}

fn bincode_error(e: bincode::Error) -> Error {
    match *e {
        bincode::ErrorKind::Io(io) => Error::IndexIo(io),
        other => Error::IndexFormat(other.to_string()),
    }
}

impl FlatIndex {
    /// Write the index to `path` atomically: readers of `path` see either the
    /// old file or the complete new one.
    pub fn persist(&self, path: &Path) -> Result<()> {
        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir).map_err(Error::IndexIo)?;

        let blob = IndexBlob {
            magic: INDEX_MAGIC,
            version: INDEX_VERSION,
            dim: self.dim.unwrap_or(0) as u64,
            vectors: self.vectors.clone(),
            chunk_ids: self.chunk_ids.clone(),
            owner_ids: self.owner_ids.clone(),
        };

        let tmp = tempfile::NamedTempFile::new_in(dir).map_err(Error::IndexIo)?;
        {
            let mut writer = BufWriter::new(tmp.as_file());
            codec().serialize_into(&mut writer, &blob).map_err(bincode_error)?;
            writer.flush().map_err(Error::IndexIo)?;
        }
        tmp.as_file().sync_all().map_err(Error::IndexIo)?;
        tmp.persist(path).map_err(|e| {
            error!(path = %path.display(), error = %e.error, "failed to replace index file");
            Error::IndexIo(e.error)
        })?;
        if let Ok(d) = fs::File::open(dir) {
            // Makes the rename itself durable on filesystems that need it.
            let _ = d.sync_all();
        }
        debug!(path = %path.display(), entries = self.len(), "persisted index");
        Ok(())
    }

    /// Read an index written by [`FlatIndex::persist`]. A missing file is an
    /// empty index.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "no index file yet, starting empty");
            return Ok(Self::new());
        }
        let bytes = fs::read(path).map_err(Error::IndexIo)?;
        let blob: IndexBlob = codec()
            .with_limit(bytes.len() as u64)
            .deserialize(&bytes)
            .map_err(|e| Error::IndexFormat(format!("{}: {e}", path.display())))?;

        if blob.magic != INDEX_MAGIC {
            return Err(Error::IndexFormat(format!("{}: not an index file", path.display())));
        }
        if blob.version != INDEX_VERSION {
            return Err(Error::IndexFormat(format!(
                "{}: unsupported index version {} (expected {INDEX_VERSION})",
                path.display(),
                blob.version
            )));
        }
        let dim = blob.dim as usize;
        let rows = blob.chunk_ids.len();
        if blob.owner_ids.len() != rows || blob.vectors.len() != rows * dim || (dim == 0 && rows > 0) {
            return Err(Error::IndexFormat(format!(
                "{}: inconsistent arrays (dim {dim}, {rows} chunk ids, {} owner ids, {} floats)",
                path.display(),
                blob.owner_ids.len(),
                blob.vectors.len()
            )));
        }

        debug!(path = %path.display(), entries = rows, dim, "loaded index");
        Ok(Self {
            dim: (dim > 0).then_some(dim),
            vectors: blob.vectors,
            chunk_ids: blob.chunk_ids,
            owner_ids: blob.owner_ids,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docrag_core::types::IndexEntry;

    fn sample() -> FlatIndex {
        let mut index = FlatIndex::new();
        index
            .add(vec![
                IndexEntry { vector: vec![1.0, 2.0, 3.0], chunk_id: "c1".into(), owner_id: "alice".into() },
                IndexEntry { vector: vec![0.0, 1.0, 0.0], chunk_id: "c2".into(), owner_id: "bob".into() },
            ])
            .unwrap();
        index
    }

    #[test]
    fn missing_file_is_empty_index() {
        let dir = tempfile::tempdir().unwrap();
        let index = FlatIndex::load(&dir.path().join("absent.bin")).unwrap();
        assert!(index.is_empty());
    }

    #[test]
    fn round_trip_preserves_everything() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/index.bin");
        let index = sample();
        index.persist(&path).unwrap();
        assert_eq!(FlatIndex::load(&path).unwrap(), index);
    }

    #[test]
    fn bad_magic_is_format_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.bin");
        sample().persist(&path).unwrap();
        let mut bytes = fs::read(&path).unwrap();
        bytes[0] = b'X';
        fs::write(&path, &bytes).unwrap();
        assert!(matches!(FlatIndex::load(&path), Err(Error::IndexFormat(_))));
    }

    #[test]
    fn unknown_version_is_format_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.bin");
        sample().persist(&path).unwrap();
        let mut bytes = fs::read(&path).unwrap();
        // Version follows the 4 magic bytes, little-endian u32.
        bytes[4..8].copy_from_slice(&7u32.to_le_bytes());
        fs::write(&path, &bytes).unwrap();
        let err = FlatIndex::load(&path).unwrap_err();
        assert!(matches!(err, Error::IndexFormat(ref m) if m.contains("version 7")));
    }

    #[test]
    fn truncated_file_is_format_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.bin");
        sample().persist(&path).unwrap();
        let bytes = fs::read(&path).unwrap();
        fs::write(&path, &bytes[..bytes.len() / 2]).unwrap();
        assert!(matches!(FlatIndex::load(&path), Err(Error::IndexFormat(_))));
    }

    #[test]
    fn inconsistent_arrays_are_format_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.bin");
        let blob = IndexBlob {
            magic: INDEX_MAGIC,
            version: INDEX_VERSION,
            dim: 2,
            vectors: vec![1.0, 0.0, 0.0],
            chunk_ids: vec!["a".into()],
            owner_ids: vec!["u".into()],
        };
        fs::write(&path, codec().serialize(&blob).unwrap()).unwrap();
        assert!(matches!(FlatIndex::load(&path), Err(Error::IndexFormat(_))));
    }
}
