//! # quarry-core
//!
//! Capability-interface traits shared across the Quarry retrieval engine:
//! [`EmbeddingModel`] for the Embedder and [`LanguageModel`] for the Generator
//! Driver. Every other crate in the workspace depends on these traits rather
//! than on each other's concrete types, so the embedding backend and the
//! generation backend can be swapped independently of the indexing and
//! retrieval logic that drives them.
//!
//! ```text
//! ┌──────────────┐   ┌────────────────┐   ┌──────────────────┐
//! │ quarry-index │──▶│  quarry-core   │◀──│   quarry-llama    │
//! │ (embeds &    │   │ (this crate)   │   │ (implements       │
//! │  retrieves)  │   │                │   │  LanguageModel)   │
//! └──────────────┘   └────────────────┘   └──────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`embedding`] — turn text into dense vectors.
//! - [`llm`] — request builders, messages, and the generation provider trait.

#![no_std]
extern crate alloc;

/// Text embeddings.
pub mod embedding;
/// Language model requests, messages, and streaming events.
pub mod llm;

use alloc::string::String;

#[doc(inline)]
pub use embedding::EmbeddingModel;
#[doc(inline)]
pub use llm::LanguageModel;

/// Result type used throughout the crate.
///
/// Type alias for [`anyhow::Result<T>`](anyhow::Result) with [`String`] as default success type.
pub type Result<T = String> = anyhow::Result<T>;

pub use anyhow::Error;
