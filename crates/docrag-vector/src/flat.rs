use docrag_core::types::{ChunkId, IndexEntry, OwnerId, SearchHit};
use docrag_core::{Error, Result};

/// Brute-force inner-product index. Vectors are stored L2-normalised in one
/// flat row-major buffer, so scores are cosine similarities.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlatIndex {
    pub(crate) dim: Option<usize>,
    pub(crate) vectors: Vec<f32>,
    pub(crate) chunk_ids: Vec<ChunkId>,
    pub(crate) owner_ids: Vec<OwnerId>,
}

/// Borrowed view of one stored row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EntryView<'a> {
    pub chunk_id: &'a str,
    pub owner_id: &'a str,
    pub vector: &'a [f32],
}

pub(crate) fn normalize(vector: &[f32]) -> Result<Vec<f32>> {
    if vector.iter().any(|x| !x.is_finite()) {
        return Err(Error::InvalidVector("vector contains NaN or infinite values".to_string()));
    }
    let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm == 0.0 || !norm.is_finite() {
        return Err(Error::InvalidVector("cannot normalise a zero vector".to_string()));
    }
    Ok(vector.iter().map(|x| x / norm).collect())
}

impl FlatIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Dimension fixed by the first insert, `None` while never written.
    pub fn dim(&self) -> Option<usize> {
        self.dim
    }

    pub fn len(&self) -> usize {
        self.chunk_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunk_ids.is_empty()
    }

    /// Insert a batch. Either every entry goes in or none does.
    pub fn add(&mut self, entries: Vec<IndexEntry>) -> Result<()> {
        let Some(first) = entries.first() else {
            return Ok(());
        };
        let dim = self.dim.unwrap_or(first.vector.len());
        if dim == 0 {
            return Err(Error::InvalidVector("vectors must have at least one component".to_string()));
        }
        let mut rows = Vec::with_capacity(entries.len());
        for entry in &entries {
            if entry.vector.len() != dim {
                return Err(Error::DimensionMismatch { expected: dim, got: entry.vector.len() });
            }
            rows.push(normalize(&entry.vector)?);
        }

        self.dim = Some(dim);
        self.vectors.reserve(dim * entries.len());
        for (row, entry) in rows.into_iter().zip(entries) {
            self.vectors.extend(row);
            self.chunk_ids.push(entry.chunk_id);
            self.owner_ids.push(entry.owner_id);
        }
        Ok(())
    }

    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        self.search_where(query, k, |_, _| true)
    }

    /// Rank only the rows `predicate(chunk_id, owner_id)` accepts.
    ///
    /// Descending score, ties in insertion order; at most `k` hits.
    pub fn search_where<P>(&self, query: &[f32], k: usize, predicate: P) -> Result<Vec<SearchHit>>
    where
        P: Fn(&str, &str) -> bool,
    {
        let Some(dim) = self.dim else {
            return Ok(Vec::new());
        };
        if self.is_empty() || k == 0 {
            return Ok(Vec::new());
        }
        if query.len() != dim {
            return Err(Error::DimensionMismatch { expected: dim, got: query.len() });
        }
        let query = normalize(query)?;

        let mut scored: Vec<(usize, f32)> = self
            .vectors
            .chunks_exact(dim)
            .enumerate()
            .filter(|(i, _)| predicate(&self.chunk_ids[*i], &self.owner_ids[*i]))
            .map(|(i, row)| {
                let dot: f32 = row.iter().zip(&query).map(|(a, b)| a * b).sum();
                (i, dot.clamp(-1.0, 1.0))
            })
            .collect();
        // Stable sort keeps insertion order among equal scores.
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(i, score)| SearchHit {
                chunk_id: self.chunk_ids[i].clone(),
                owner_id: self.owner_ids[i].clone(),
                score,
            })
            .collect())
    }

    /// Keep rows for which `keep(chunk_id, owner_id)` holds; returns how many
    /// were dropped.
    pub fn retain<P>(&mut self, keep: P) -> usize
    where
        P: Fn(&str, &str) -> bool,
    {
        let Some(dim) = self.dim else {
            return 0;
        };
        let before = self.len();
        let mut vectors = Vec::with_capacity(self.vectors.len());
        let mut chunk_ids = Vec::with_capacity(before);
        let mut owner_ids = Vec::with_capacity(before);
        let rows = self.vectors.chunks_exact(dim);
        for ((row, chunk_id), owner_id) in rows.zip(self.chunk_ids.drain(..)).zip(self.owner_ids.drain(..)) {
            if keep(&chunk_id, &owner_id) {
                vectors.extend_from_slice(row);
                chunk_ids.push(chunk_id);
                owner_ids.push(owner_id);
            }
        }
        self.vectors = vectors;
        self.chunk_ids = chunk_ids;
        self.owner_ids = owner_ids;
        before - self.len()
    }

    pub fn entries(&self) -> impl Iterator<Item = EntryView<'_>> {
        let dim = self.dim.unwrap_or(1).max(1);
        self.vectors
            .chunks_exact(dim)
            .zip(self.chunk_ids.iter().zip(&self.owner_ids))
            .map(|(vector, (chunk_id, owner_id))| EntryView { chunk_id, owner_id, vector })
    }

    pub fn contains(&self, chunk_id: &str) -> bool {
        self.chunk_ids.iter().any(|c| c == chunk_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(v: &[f32], chunk: &str, owner: &str) -> IndexEntry {
        IndexEntry { vector: v.to_vec(), chunk_id: chunk.to_string(), owner_id: owner.to_string() }
    }

    #[test]
    fn empty_index_returns_nothing() {
        let index = FlatIndex::new();
        assert!(index.search(&[1.0, 0.0], 5).unwrap().is_empty());
        assert_eq!(index.dim(), None);
    }

    #[test]
    fn first_insert_fixes_dimension() {
        let mut index = FlatIndex::new();
        index.add(vec![entry(&[1.0, 0.0, 0.0], "a", "u")]).unwrap();
        assert_eq!(index.dim(), Some(3));

        let err = index.add(vec![entry(&[0.0, 1.0, 0.0], "b", "u"), entry(&[1.0, 0.0], "c", "u")]).unwrap_err();
        assert!(matches!(err, Error::DimensionMismatch { expected: 3, got: 2 }));
        assert_eq!(index.len(), 1, "a failed batch inserts nothing");
    }

    #[test]
    fn zero_and_nan_vectors_are_rejected() {
        let mut index = FlatIndex::new();
        assert!(matches!(index.add(vec![entry(&[0.0, 0.0], "a", "u")]), Err(Error::InvalidVector(_))));
        assert!(matches!(index.add(vec![entry(&[f32::NAN, 1.0], "a", "u")]), Err(Error::InvalidVector(_))));
        assert!(index.is_empty());
        assert_eq!(index.dim(), None);
    }

    #[test]
    fn vectors_are_stored_normalised() {
        let mut index = FlatIndex::new();
        index.add(vec![entry(&[3.0, 4.0], "a", "u")]).unwrap();
        let row = index.entries().next().unwrap();
        assert!((row.vector[0] - 0.6).abs() < 1e-6);
        assert!((row.vector[1] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn ranks_by_cosine_and_breaks_ties_by_insertion() {
        let mut index = FlatIndex::new();
        index
            .add(vec![
                entry(&[0.0, 1.0], "orthogonal", "u"),
                entry(&[2.0, 0.0], "same-1", "u"),
                entry(&[1.0, 1.0], "diagonal", "u"),
                entry(&[5.0, 0.0], "same-2", "u"),
                entry(&[-1.0, 0.0], "opposite", "u"),
            ])
            .unwrap();
        let hits = index.search(&[1.0, 0.0], 10).unwrap();
        let order: Vec<_> = hits.iter().map(|h| h.chunk_id.as_str()).collect();
        assert_eq!(order, vec!["same-1", "same-2", "diagonal", "orthogonal", "opposite"]);
        assert!((hits[0].score - 1.0).abs() < 1e-6);
        assert!((hits[4].score + 1.0).abs() < 1e-6);
    }

    #[test]
    fn k_is_clamped_and_zero_k_is_empty() {
        let mut index = FlatIndex::new();
        index.add(vec![entry(&[1.0, 0.0], "a", "u"), entry(&[0.0, 1.0], "b", "u")]).unwrap();
        assert_eq!(index.search(&[1.0, 1.0], 50).unwrap().len(), 2);
        assert!(index.search(&[1.0, 1.0], 0).unwrap().is_empty());
    }

    #[test]
    fn query_dimension_must_match() {
        let mut index = FlatIndex::new();
        index.add(vec![entry(&[1.0, 0.0], "a", "u")]).unwrap();
        assert!(matches!(index.search(&[1.0, 0.0, 0.0], 1), Err(Error::DimensionMismatch { expected: 2, got: 3 })));
    }

    #[test]
    fn predicate_filters_before_ranking() {
        let mut index = FlatIndex::new();
        index
            .add(vec![entry(&[1.0, 0.0], "bob-best", "bob"), entry(&[0.5, 0.5], "alice-weak", "alice")])
            .unwrap();
        let hits = index.search_where(&[1.0, 0.0], 1, |_, owner| owner == "alice").unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].chunk_id, "alice-weak");
    }

    #[test]
    fn retain_drops_rows_and_keeps_alignment() {
        let mut index = FlatIndex::new();
        index
            .add(vec![entry(&[1.0, 0.0], "a", "u"), entry(&[0.0, 1.0], "b", "v"), entry(&[1.0, 1.0], "c", "u")])
            .unwrap();
        assert_eq!(index.retain(|_, owner| owner == "u"), 1);
        assert!(!index.contains("b"));
        let hits = index.search(&[0.0, 1.0], 1).unwrap();
        assert_eq!(hits[0].chunk_id, "c");
        assert_eq!(index.dim(), Some(2));
    }
}
