//! Inverted-file (IVF) vector index.
//!
//! Vectors are partitioned into `nlist` k-means clusters; a query probes only
//! the `nprobe` clusters whose centroids are nearest to it instead of
//! scanning every entry. Cheaper to build than an HNSW graph and faster to
//! query than [`super::FlatIndex`] once a corpus is large enough that
//! `nlist` clusters actually narrow the scan.
//!
//! `nlist` and `nprobe` follow the same sizing rule as the document's
//! original vector-store builder: `nlist = min(4096, 8 * round(n / 10))`,
//! `nprobe = 64` (clamped to `nlist` for small corpora).

use std::collections::HashMap;

use ordered_float::OrderedFloat;
use parking_lot::RwLock;
use rayon::prelude::*;

use crate::error::{IndexError, Result};
use crate::types::{Chunk, IndexEntry, SearchResult};

use super::VectorIndex;
use super::hnsw::cosine_similarity;

/// Fixed iteration count for Lloyd's algorithm. The corpus sizes this index
/// targets (tens of thousands of chunks) converge well before this many
/// passes; a fixed cap keeps rebuild time bounded regardless of input.
const KMEANS_ITERATIONS: usize = 12;

/// Default clusters probed per query, before clamping to `nlist`.
const DEFAULT_NPROBE: usize = 64;

/// Ceiling on cluster count regardless of corpus size.
const MAX_NLIST: usize = 4096;

/// Computes `nlist` for a corpus of `n` vectors: `min(4096, 8 * round(n / 10))`,
/// floored at 1 so a non-empty index always has somewhere to put vectors.
fn nlist_for(n: usize) -> usize {
    if n == 0 {
        return 1;
    }
    let rounded = (n as f64 / 10.0).round() as usize;
    (8 * rounded).clamp(1, MAX_NLIST)
}

struct IvfState {
    entries: Vec<IndexEntry>,
    id_to_index: HashMap<String, usize>,
    content_hashes: HashMap<u64, String>,
    /// Cluster centroids, one per cluster, populated on rebuild.
    centroids: Vec<Vec<f32>>,
    /// `assignments[i]` is the cluster id for `entries[i]`.
    assignments: Vec<usize>,
    dirty: bool,
}

impl IvfState {
    fn new() -> Self {
        Self {
            entries: Vec::new(),
            id_to_index: HashMap::new(),
            content_hashes: HashMap::new(),
            centroids: Vec::new(),
            assignments: Vec::new(),
            dirty: false,
        }
    }

    /// Re-clusters all entries with Lloyd's algorithm, deterministic in the
    /// choice of seed centroids (evenly spaced through the entry list) so
    /// repeated rebuilds of the same data produce the same partition.
    fn rebuild(&mut self, nlist: usize) {
        if self.entries.is_empty() {
            self.centroids.clear();
            self.assignments.clear();
            self.dirty = false;
            return;
        }

        let k = nlist.min(self.entries.len()).max(1);
        let stride = self.entries.len() / k;
        let mut centroids: Vec<Vec<f32>> = (0..k)
            .map(|i| self.entries[i * stride].embedding.clone())
            .collect();

        let mut assignments = vec![0usize; self.entries.len()];

        for _ in 0..KMEANS_ITERATIONS {
            assignments = self
                .entries
                .par_iter()
                .map(|entry| {
                    centroids
                        .iter()
                        .enumerate()
                        .map(|(ci, c)| (ci, cosine_similarity(&entry.embedding, c)))
                        .fold((0usize, f32::MIN), |best, cur| if cur.1 > best.1 { cur } else { best })
                        .0
                })
                .collect();

            let dim = centroids[0].len();
            let mut sums = vec![vec![0.0f32; dim]; k];
            let mut counts = vec![0usize; k];
            for (entry, &cluster) in self.entries.iter().zip(assignments.iter()) {
                counts[cluster] += 1;
                for (s, v) in sums[cluster].iter_mut().zip(entry.embedding.iter()) {
                    *s += v;
                }
            }

            for (ci, (sum, count)) in sums.into_iter().zip(counts).enumerate() {
                if count > 0 {
                    centroids[ci] = sum.into_iter().map(|s| s / count as f32).collect();
                }
            }
        }

        self.centroids = centroids;
        self.assignments = assignments;
        self.dirty = false;
    }
}

/// Clustered approximate-nearest-neighbor index.
pub struct IvfIndex {
    dimension: usize,
    nprobe: usize,
    state: RwLock<IvfState>,
}

impl std::fmt::Debug for IvfIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read();
        f.debug_struct("IvfIndex")
            .field("dimension", &self.dimension)
            .field("nlist", &state.centroids.len())
            .field("nprobe", &self.nprobe)
            .field("len", &state.entries.len())
            .finish()
    }
}

impl IvfIndex {
    /// Creates a new IVF index with the specified embedding dimension and the
    /// default `nprobe` of 64.
    #[must_use]
    pub fn new(dimension: usize) -> Self {
        Self::with_nprobe(dimension, DEFAULT_NPROBE)
    }

    /// Creates an IVF index with an explicit `nprobe` override.
    #[must_use]
    pub fn with_nprobe(dimension: usize, nprobe: usize) -> Self {
        Self {
            dimension,
            nprobe: nprobe.max(1),
            state: RwLock::new(IvfState::new()),
        }
    }
}

impl VectorIndex for IvfIndex {
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

        state.dirty = true;
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

        state.dirty = true;
        true
    }

    fn search(&self, query: &[f32], top_k: usize, threshold: f32) -> Result<Vec<SearchResult>> {
        if query.len() != self.dimension {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimension,
                actual: query.len(),
            });
        }

        if top_k == 0 {
            return Ok(Vec::new());
        }

        let nlist = {
            let state = self.state.read();
            nlist_for(state.entries.len())
        };

        {
            let mut state = self.state.write();
            if state.dirty || (state.centroids.is_empty() && !state.entries.is_empty()) {
                state.rebuild(nlist);
            }
        }

        let state = self.state.read();
        if state.entries.is_empty() {
            return Ok(Vec::new());
        }

        let nprobe = self.nprobe.min(state.centroids.len()).max(1);

        let mut cluster_ranking: Vec<(usize, f32)> = state
            .centroids
            .iter()
            .enumerate()
            .map(|(ci, c)| (ci, cosine_similarity(query, c)))
            .collect();
        cluster_ranking.sort_by_key(|&(_, score)| std::cmp::Reverse(OrderedFloat(score)));
        let probed: std::collections::HashSet<usize> =
            cluster_ranking.into_iter().take(nprobe).map(|(ci, _)| ci).collect();

        let mut scored: Vec<SearchResult> = state
            .entries
            .iter()
            .zip(state.assignments.iter())
            .filter(|(_, &cluster)| probed.contains(&cluster))
            .map(|(entry, _)| SearchResult {
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
        state.centroids.clear();
        state.assignments.clear();
        state.dirty = false;
    }

    fn entries(&self) -> Vec<IndexEntry> {
        self.state.read().entries.clone()
    }

    fn load(&self, entries: Vec<IndexEntry>) -> Result<()> {
        let mut state = self.state.write();

        state.entries.clear();
        state.id_to_index.clear();
        state.content_hashes.clear();
        state.centroids.clear();
        state.assignments.clear();

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

        state.dirty = true;
        Ok(())
    }

    fn contains_hash(&self, hash: u64) -> bool {
        self.state.read().content_hashes.contains_key(&hash)
    }

    fn ivf_params(&self) -> Option<(usize, usize)> {
        let state = self.state.read();
        let nlist = nlist_for(state.entries.len());
        Some((nlist, self.nprobe.min(nlist).max(1)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_chunk(id: &str, text: &str) -> Chunk {
        Chunk::new(id, text, "doc1", 0, crate::dedup::content_hash(text))
    }

    #[test]
    fn nlist_formula_matches_sizing_rule() {
        assert_eq!(nlist_for(0), 1);
        assert_eq!(nlist_for(10), 8);
        assert_eq!(nlist_for(100), 80);
        assert_eq!(nlist_for(100_000), MAX_NLIST);
    }

    #[test]
    fn insert_and_search_round_trip() {
        let index = IvfIndex::new(4);
        index.insert(make_chunk("c1", "hello"), vec![1.0, 0.0, 0.0, 0.0]).unwrap();
        index.insert(make_chunk("c2", "world"), vec![0.0, 1.0, 0.0, 0.0]).unwrap();
        index.insert(make_chunk("c3", "third"), vec![0.9, 0.1, 0.0, 0.0]).unwrap();

        let results = index.search(&[1.0, 0.0, 0.0, 0.0], 2, 0.0).unwrap();
        assert!(!results.is_empty());
        assert_eq!(results[0].chunk.id, "c1");
    }

    #[test]
    fn vector_id_tracks_array_position() {
        let index = IvfIndex::new(4);
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
    fn dimension_mismatch_is_rejected() {
        let index = IvfIndex::new(4);
        let result = index.insert(make_chunk("c1", "hello"), vec![1.0, 0.0]);
        assert!(matches!(result, Err(IndexError::DimensionMismatch { .. })));
    }

    #[test]
    fn ivf_params_reports_nlist_and_nprobe() {
        let index = IvfIndex::new(4);
        for i in 0..20 {
            index
                .insert(make_chunk(&format!("c{i}"), "text"), vec![1.0, 0.0, 0.0, 0.0])
                .unwrap();
        }
        let (nlist, nprobe) = index.ivf_params().unwrap();
        assert_eq!(nlist, nlist_for(20));
        assert!(nprobe <= nlist);
    }

    #[test]
    fn empty_index_search_returns_empty() {
        let index = IvfIndex::new(4);
        let results = index.search(&[1.0, 0.0, 0.0, 0.0], 5, 0.0).unwrap();
        assert!(results.is_empty());
    }
}
