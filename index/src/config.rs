//! Configuration for the indexing and retrieval pipeline.

use std::path::PathBuf;

use crate::index::IndexKind;

/// Configuration for a [`crate::rag::Rag`] instance.
///
/// `chunk_size`, `chunk_overlap`, and `max_chunks_per_doc` are configuration
/// values rather than hard-coded constants so a caller can tune chunking per
/// corpus without recompiling.
#[derive(Debug, Clone)]
pub struct RagConfig {
    /// Path to the persistence file.
    pub index_path: PathBuf,
    /// Minimum similarity score for search results, in `[-1, 1]` (cosine).
    pub similarity_threshold: f32,
    /// Default number of results to return.
    pub default_top_k: usize,
    /// Whether to enable content deduplication.
    pub deduplication: bool,
    /// Whether to automatically save after indexing operations.
    pub auto_save: bool,
    /// Which [`VectorIndex`](crate::index::VectorIndex) backend to build.
    pub index_kind: IndexKind,
    /// Name of the embedding model, recorded in the index manifest and
    /// checked against the caller's model at open time.
    pub model_name: String,
    /// Maximum characters per chunk before a paragraph is split by sentence.
    pub chunk_size: usize,
    /// Characters of trailing context carried into the next chunk.
    pub chunk_overlap: usize,
    /// Consolidation ceiling: chunks beyond this count per document are
    /// greedily merged.
    pub max_chunks_per_doc: usize,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            index_path: PathBuf::from("./rag_index.redb"),
            similarity_threshold: 0.0,
            default_top_k: 5,
            deduplication: true,
            auto_save: true,
            index_kind: IndexKind::Hnsw,
            model_name: String::new(),
            chunk_size: 2000,
            chunk_overlap: 200,
            max_chunks_per_doc: 100,
        }
    }
}

impl RagConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a builder for custom configuration.
    #[must_use]
    pub fn builder() -> RagConfigBuilder {
        RagConfigBuilder::new()
    }
}

/// Builder for RAG configuration.
#[derive(Debug, Default)]
pub struct RagConfigBuilder {
    config: RagConfig,
}

impl RagConfigBuilder {
    /// Creates a new configuration builder with default values.
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: RagConfig::default(),
        }
    }

    /// Sets the index persistence path.
    #[must_use]
    pub fn index_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.index_path = path.into();
        self
    }

    /// Sets the minimum similarity threshold for search results.
    #[must_use]
    pub const fn similarity_threshold(mut self, threshold: f32) -> Self {
        self.config.similarity_threshold = threshold;
        self
    }

    /// Sets the default number of results to return.
    #[must_use]
    pub const fn default_top_k(mut self, k: usize) -> Self {
        self.config.default_top_k = k;
        self
    }

    /// Enables or disables content deduplication.
    #[must_use]
    pub const fn deduplication(mut self, enabled: bool) -> Self {
        self.config.deduplication = enabled;
        self
    }

    /// Enables or disables automatic saving after indexing.
    #[must_use]
    pub const fn auto_save(mut self, enabled: bool) -> Self {
        self.config.auto_save = enabled;
        self
    }

    /// Selects the vector index backend.
    #[must_use]
    pub const fn index_kind(mut self, kind: IndexKind) -> Self {
        self.config.index_kind = kind;
        self
    }

    /// Sets the embedding model name recorded in the manifest.
    #[must_use]
    pub fn model_name(mut self, name: impl Into<String>) -> Self {
        self.config.model_name = name.into();
        self
    }

    /// Sets the maximum characters per chunk.
    #[must_use]
    pub const fn chunk_size(mut self, size: usize) -> Self {
        self.config.chunk_size = size;
        self
    }

    /// Sets the trailing-overlap length carried between chunks.
    #[must_use]
    pub const fn chunk_overlap(mut self, overlap: usize) -> Self {
        self.config.chunk_overlap = overlap;
        self
    }

    /// Sets the consolidation ceiling for chunks per document.
    #[must_use]
    pub const fn max_chunks_per_doc(mut self, max: usize) -> Self {
        self.config.max_chunks_per_doc = max;
        self
    }

    /// Builds the configuration.
    #[must_use]
    pub fn build(self) -> RagConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = RagConfig::default();
        assert_eq!(config.index_path, PathBuf::from("./rag_index.redb"));
        assert_eq!(config.similarity_threshold, 0.0);
        assert_eq!(config.default_top_k, 5);
        assert!(config.deduplication);
        assert!(config.auto_save);
        assert_eq!(config.index_kind, IndexKind::Hnsw);
        assert_eq!(config.chunk_size, 2000);
        assert_eq!(config.chunk_overlap, 200);
        assert_eq!(config.max_chunks_per_doc, 100);
    }

    #[test]
    fn builder_config() {
        let config = RagConfig::builder()
            .index_path("/custom/path.redb")
            .similarity_threshold(0.5)
            .default_top_k(10)
            .deduplication(false)
            .auto_save(false)
            .index_kind(IndexKind::Flat)
            .model_name("bge-small-en-v1.5")
            .chunk_size(1000)
            .chunk_overlap(100)
            .max_chunks_per_doc(50)
            .build();

        assert_eq!(config.index_path, PathBuf::from("/custom/path.redb"));
        assert_eq!(config.similarity_threshold, 0.5);
        assert_eq!(config.default_top_k, 10);
        assert!(!config.deduplication);
        assert!(!config.auto_save);
        assert_eq!(config.index_kind, IndexKind::Flat);
        assert_eq!(config.model_name, "bge-small-en-v1.5");
        assert_eq!(config.chunk_size, 1000);
        assert_eq!(config.chunk_overlap, 100);
        assert_eq!(config.max_chunks_per_doc, 50);
    }
}
