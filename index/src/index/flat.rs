//! Brute-force exact vector index.
//!
//! Scans every stored vector on each query. Slower than [`super::HnswIndex`]
//! at scale but exact, and useful for small corpora or as a correctness
//! baseline to compare the approximate index against.

use std::collections::HashMap;

use ordered_float::OrderedFloat;
use parking_lot::RwLock;

use crate::error::{IndexError, Result};
use crate::types::{Chunk, IndexEntry, SearchResult};

use super::VectorIndex;
use super::hnsw::cosine_similarity;

struct FlatState {
    entries: Vec<IndexEntry>,
    id_to_index: HashMap<String, usize>,
    content_hashes: HashMap<u64, String>,
}

impl FlatState {
    fn new() -> Self {
        Self {
            entries: Vec::new(),
            id_to_index: HashMap::new(),
            content_hashes: HashMap::new(),
        }
    }
}

/// Exact nearest-neighbor search by brute-force cosine scan.
pub struct FlatIndex {
    dimension: usize,
    state: RwLock<FlatState>,
}

impl std::fmt::Debug for FlatIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read();
        f.debug_struct("FlatIndex")
            .field("dimension", &self.dimension)
            .field("len", &state.entries.len())
            .finish()
    }
}

impl FlatIndex {
    /// Creates a new flat index with the specified embedding dimension.
    #[must_use]
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            state: RwLock::new(FlatState::new()),
        }
    }
}

impl VectorIndex for FlatIndex {
    fn insert(&self, chunk: Chunk, embedding: Vec<f32>) -> Result<()> {
        if embedding.len() != self.dimension {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimension,
                actual: embedding.len(),
            });
        }

        let mut state = self.state.write();

        if let Some(&idx) = state.id_to_index.get(&chunk.id) {
            let old_hash = state.entries[idx].chunk.content_hash;
            state.content_hashes.remove(&old_hash);
            state
                .content_hashes
                .insert(chunk.content_hash, chunk.id.clone());
            let mut chunk = chunk;
            chunk.vector_id = idx;
            state.entries[idx] = IndexEntry::new(chunk, embedding);
        } else {
            let idx = state.entries.len();
            state.id_to_index.insert(chunk.id.clone(), idx);
            state
                .content_hashes
                .insert(chunk.content_hash, chunk.id.clone());
            let mut chunk = chunk;
            chunk.vector_id = idx;
            state.entries.push(IndexEntry::new(chunk, embedding));
        }

        Ok(())
    }

    fn remove(&self, chunk_id: &str) -> bool {
        let mut state = self.state.write();

        let Some(&idx) = state.id_to_index.get(chunk_id) else {
            return false;
        };

        let hash = state.entries[idx].chunk.content_hash;
        state.content_hashes.remove(&hash);

        let removed = state.entries.swap_remove(idx);
        state.id_to_index.remove(&removed.chunk.id);

        if idx < state.entries.len() {
            let swapped_id = state.entries[idx].chunk.id.clone();
            state.id_to_index.insert(swapped_id, idx);
            state.entries[idx].chunk.vector_id = idx;
        }

        true
    }

    fn search(&self, query: &[f32], top_k: usize, threshold: f32) -> Result<Vec<SearchResult>> {
        if query.len() != self.dimension {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimension,
                actual: query.len(),
            });
        }

        let state = self.state.read();
        if top_k == 0 {
            return Ok(Vec::new());
        }

        let mut scored: Vec<SearchResult> = state
            .entries
            .iter()
            .map(|entry| SearchResult {
                chunk: entry.chunk.clone(),
                score: cosine_similarity(query, &entry.embedding),
            })
            .filter(|result| result.score >= threshold)
            .collect();

        scored.sort_by_key(|r| std::cmp::Reverse(OrderedFloat(r.score)));
        scored.truncate(top_k);

        Ok(scored)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn len(&self) -> usize {
        self.state.read().entries.len()
    }

    fn clear(&self) {
        let mut state = self.state.write();
        state.entries.clear();
        state.id_to_index.clear();
        state.content_hashes.clear();
    }

    fn entries(&self) -> Vec<IndexEntry> {
        self.state.read().entries.clone()
    }

    fn load(&self, entries: Vec<IndexEntry>) -> Result<()> {
        let mut state = self.state.write();

        state.entries.clear();
        state.id_to_index.clear();
        state.content_hashes.clear();

        for (idx, mut entry) in entries.into_iter().enumerate() {
            if entry.embedding.len() != self.dimension {
                return Err(IndexError::DimensionMismatch {
                    expected: self.dimension,
                    actual: entry.embedding.len(),
                });
            }
            entry.chunk.vector_id = idx;
            state.id_to_index.insert(entry.chunk.id.clone(), idx);
            state
                .content_hashes
                .insert(entry.chunk.content_hash, entry.chunk.id.clone());
            state.entries.push(entry);
        }

        Ok(())
    }

    fn contains_hash(&self, hash: u64) -> bool {
        self.state.read().content_hashes.contains_key(&hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_chunk(id: &str, text: &str) -> Chunk {
        Chunk::new(id, text, "doc1", 0, crate::dedup::content_hash(text))
    }

    #[test]
    fn vector_id_tracks_array_position() {
        let index = FlatIndex::new(4);
        index.insert(make_chunk("c1", "hello"), vec![1.0, 0.0, 0.0, 0.0]).unwrap();
        index.insert(make_chunk("c2", "world"), vec![0.0, 1.0, 0.0, 0.0]).unwrap();
        index.insert(make_chunk("c3", "third"), vec![0.0, 0.0, 1.0, 0.0]).unwrap();

        index.remove("c1");

        let entries = index.entries();
        for (idx, entry) in entries.iter().enumerate() {
            assert_eq!(entry.chunk.vector_id, idx);
        }
    }

    #[test]
    fn exact_search_ranks_by_cosine_similarity() {
        let index = FlatIndex::new(4);

        index
            .insert(make_chunk("c1", "hello"), vec![1.0, 0.0, 0.0, 0.0])
            .unwrap();
        index
            .insert(make_chunk("c2", "world"), vec![0.0, 1.0, 0.0, 0.0])
            .unwrap();

        let results = index.search(&[1.0, 0.0, 0.0, 0.0], 1, 0.0).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].chunk.id, "c1");
    }

    #[test]
    fn dimension_mismatch_is_rejected() {
        let index = FlatIndex::new(4);
        let result = index.insert(make_chunk("c1", "hello"), vec![1.0, 0.0]);
        assert!(matches!(result, Err(IndexError::DimensionMismatch { .. })));
    }

    #[test]
    fn remove_and_reinsert() {
        let index = FlatIndex::new(4);
        index
            .insert(make_chunk("c1", "hello"), vec![1.0, 0.0, 0.0, 0.0])
            .unwrap();
        assert!(index.remove("c1"));
        assert_eq!(index.len(), 0);
    }
}
