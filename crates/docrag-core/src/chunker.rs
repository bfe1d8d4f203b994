//! Fixed-window chunking with overlap that snaps to sentence ends.
//!
//! Windows and overlaps are measured in characters. The cut moves to just
//! after the last `.`, `!` or `?` between the window's midpoint and its end
//! position inclusive, so a terminator sitting exactly at the end position
//! makes the chunk one character longer than the window. Without a
//! terminator the raw window boundary is used.

use crate::config::ChunkingSettings;
use crate::error::{Error, Result};
use crate::types::{PageChunk, PageText};

pub const DEFAULT_CHUNK_SIZE: usize = 1000;
pub const DEFAULT_CHUNK_OVERLAP: usize = 200;

const SENTENCE_TERMINATORS: &[char] = &['.', '!', '?'];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunker {
    size: usize,
    overlap: usize,
}

impl Default for Chunker {
    fn default() -> Self {
        Self { size: DEFAULT_CHUNK_SIZE, overlap: DEFAULT_CHUNK_OVERLAP }
    }
}

impl Chunker {
    pub fn new(size: usize, overlap: usize) -> Result<Self> {
        if size == 0 {
            return Err(Error::InvalidConfig("chunk size must be positive".to_string()));
        }
        if overlap >= size {
            return Err(Error::InvalidConfig(format!(
                "chunk overlap ({overlap}) must be smaller than chunk size ({size})"
            )));
        }
        Ok(Self { size, overlap })
    }

    pub fn from_settings(settings: &ChunkingSettings) -> Result<Self> {
        Self::new(settings.size, settings.overlap)
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Lazily split `text` into trimmed, non-empty spans.
    ///
    /// Each call starts over, so the same input always yields the same spans.
    pub fn chunks<'a>(&self, text: &'a str) -> Chunks<'a> {
        Chunks {
            text,
            offsets: text.char_indices().map(|(i, _)| i).collect(),
            size: self.size,
            overlap: self.overlap,
            start: 0,
            done: false,
        }
    }

    /// Chunk every page independently and concatenate in page order.
    pub fn chunk_pages(&self, pages: &[PageText]) -> Vec<PageChunk> {
        pages
            .iter()
            .flat_map(|page| {
                self.chunks(&page.text)
                    .map(move |content| PageChunk { content: content.to_string(), page: page.page })
            })
            .collect()
    }
}

/// Iterator returned by [`Chunker::chunks`].
#[derive(Debug, Clone)]
pub struct Chunks<'a> {
    text: &'a str,
    /// Byte offset of every char, so positions can be counted in chars.
    offsets: Vec<usize>,
    size: usize,
    overlap: usize,
    start: usize,
    done: bool,
}

impl Chunks<'_> {
    fn byte_offset(&self, pos: usize) -> usize {
        self.offsets.get(pos).copied().unwrap_or(self.text.len())
    }

    fn is_terminator(&self, pos: usize) -> bool {
        self.text[self.byte_offset(pos)..].starts_with(SENTENCE_TERMINATORS)
    }
}

impl<'a> Iterator for Chunks<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        let len = self.offsets.len();
        while !self.done && self.start < len {
            let start = self.start;
            let mut end = start + self.size;
            if end < len {
                let floor = start + self.size / 2;
                if let Some(i) = (floor + 1..=end).rev().find(|&i| self.is_terminator(i)) {
                    end = i + 1;
                }
            }

            let text = self.text;
            let span = text[self.byte_offset(start)..self.byte_offset(end.min(len))].trim();

            if end >= len {
                self.done = true;
            } else {
                self.start = end.saturating_sub(self.overlap).max(start + 1);
            }
            if !span.is_empty() {
                return Some(span);
            }
        }
        None
    }
}
