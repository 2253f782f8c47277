//! Indexing and retrieval crate for the offline RAG pipeline.
//!
//! This crate provides:
//! - **Vector indexing** with a choice of exact (flat) or approximate (HNSW)
//!   backends
//! - **Text chunking** strategies, paragraph-aware by default with a
//!   fixed-size alternative
//! - **Persistence** backends (rkyv binary and redb embedded database)
//! - **Deduplication** using content hashing
//! - **Manifest/shard** formats for the on-disk index layout
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use quarry_index::{Rag, Document};
//! use quarry_core::EmbeddingModel;
//!
//! async fn example<E: EmbeddingModel + Send + Sync + 'static>(embedder: E) {
//!     let rag = Rag::new(embedder);
//!
//!     let count = rag.index_directory("./docs").await.unwrap();
//!     println!("indexed {count} files");
//!
//!     let results = rag.search("query").await.unwrap();
//!     for result in results {
//!         println!("{}: {:.2}", result.chunk.id, result.score);
//!     }
//! }
//! ```
//!
//! # Custom Configuration
//!
//! ```rust,no_run
//! use quarry_index::Rag;
//! use quarry_index::index::IndexKind;
//! use quarry_core::EmbeddingModel;
//!
//! async fn example<E: EmbeddingModel + Send + Sync + 'static>(embedder: E) {
//!     let rag = Rag::builder(embedder)
//!         .index_path("./custom-index")
//!         .index_kind(IndexKind::Flat)
//!         .similarity_threshold(0.7)
//!         .top_k(10)
//!         .deduplication(true)
//!         .build_with_default_chunker()
//!         .unwrap();
//! }
//! ```
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`chunking`] - Text chunking strategies
//! - [`index`] - Vector index implementations
//! - [`persistence`] - Storage backends
//! - [`manifest`] - Index provenance and build-completion status
//! - [`shard`] - Per-document on-disk chunk shards
//! - [`config`] - Configuration types
//!
//! The main entry points are:
//!
//! - [`Rag`] - High-level orchestrator with directory indexing and persistence
//! - [`RagStore`] - Lower-level store for manual control

pub mod chunking;
pub mod cleaning;
pub mod config;
mod dedup;
pub mod error;
pub mod index;
pub mod indexing;
pub mod manifest;
pub mod persistence;
mod rag;
pub mod shard;
mod store;
pub mod types;

// Re-exports for convenience
pub use chunking::{Chunker, FixedSizeChunker, ParagraphChunker};
pub use cleaning::{BasicCleaner, Cleaner};
pub use config::{RagConfig, RagConfigBuilder};
pub use error::{IndexError, Result};
pub use index::{FlatIndex, HnswIndex, IndexKind, IvfIndex, VectorIndex};
pub use indexing::{IndexProgress, IndexStage, IndexingJob};
pub use manifest::Manifest;
pub use persistence::{Persistence, RedbPersistence, RkyvPersistence};
pub use rag::{Rag, RagBuilder};
pub use shard::{DocumentShard, ShardChunk, ShardMetadata};
pub use store::RagStore;
pub use types::{Chunk, Document, IndexEntry, Metadata, SearchResult};
