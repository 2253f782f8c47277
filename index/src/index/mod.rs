//! Vector index implementations for RAG.
//!
//! This module provides the [`VectorIndex`] trait plus three backends: the
//! approximate [`HnswIndex`] for large corpora, the exact [`FlatIndex`]
//! brute-force scan for small ones or as a correctness baseline, and
//! [`IvfIndex`], a clustered approximate backend for corpora large enough
//! that HNSW's graph build cost is unwelcome but brute force is too slow.

mod flat;
mod hnsw;
mod ivf;

pub use flat::FlatIndex;
pub use hnsw::HnswIndex;
pub use ivf::IvfIndex;

use crate::error::Result;
use crate::types::{Chunk, IndexEntry, SearchResult};

/// Which [`VectorIndex`] backend to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexKind {
    /// Exact brute-force cosine scan. Appropriate for small corpora.
    Flat,
    /// Approximate nearest-neighbor search over an HNSW graph.
    #[default]
    Hnsw,
    /// Inverted-file index: vectors are partitioned into `nlist` k-means
    /// clusters, and a query scans only the `nprobe` nearest clusters.
    Ivf,
}

/// Builds a [`VectorIndex`] of the given kind and embedding dimension.
#[must_use]
pub fn build(kind: IndexKind, dimension: usize) -> Box<dyn VectorIndex> {
    match kind {
        IndexKind::Flat => Box::new(FlatIndex::new(dimension)),
        IndexKind::Hnsw => Box::new(HnswIndex::new(dimension)),
        IndexKind::Ivf => Box::new(IvfIndex::new(dimension)),
    }
}

/// Trait for vector index implementations.
///
/// A vector index stores chunks with their embedding vectors and supports
/// efficient similarity search.
pub trait VectorIndex: Send + Sync {
    /// Inserts or updates a chunk with its embedding vector.
    ///
    /// If a chunk with the same ID already exists, it will be replaced.
    fn insert(&self, chunk: Chunk, embedding: Vec<f32>) -> Result<()>;

    /// Removes a chunk by its ID.
    ///
    /// Returns `true` if a chunk was removed, `false` if not found.
    fn remove(&self, chunk_id: &str) -> bool;

    /// Searches for the most similar chunks to the query vector.
    ///
    /// # Arguments
    /// * `query` - The query embedding vector
    /// * `top_k` - Maximum number of results to return
    /// * `threshold` - Minimum similarity score (0.0 to 1.0 for cosine)
    fn search(&self, query: &[f32], top_k: usize, threshold: f32) -> Result<Vec<SearchResult>>;

    /// Returns the embedding dimension.
    fn dimension(&self) -> usize;

    /// Returns the number of indexed chunks.
    fn len(&self) -> usize;

    /// Returns `true` if the index is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Clears all entries from the index.
    fn clear(&self);

    /// Returns an iterator over all index entries.
    fn entries(&self) -> Vec<IndexEntry>;

    /// Loads entries into the index, replacing existing content.
    fn load(&self, entries: Vec<IndexEntry>) -> Result<()>;

    /// Checks if a content hash already exists in the index.
    fn contains_hash(&self, hash: u64) -> bool;

    /// Returns `(nlist, nprobe)` for backends with cluster-tuning parameters
    /// worth recording in the manifest. `None` for backends without them
    /// (`Flat`, `Hnsw`).
    fn ivf_params(&self) -> Option<(usize, usize)> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_selects_requested_backend() {
        assert_eq!(build(IndexKind::Flat, 8).dimension(), 8);
        assert_eq!(build(IndexKind::Hnsw, 8).dimension(), 8);
        assert_eq!(build(IndexKind::Ivf, 8).dimension(), 8);
    }

    #[test]
    fn default_kind_is_hnsw() {
        assert_eq!(IndexKind::default(), IndexKind::Hnsw);
    }
}
