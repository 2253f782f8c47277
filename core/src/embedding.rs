//! # Embedding Module
//!
//! This module provides types and traits for working with text embeddings.
//!
//! ## What are Embeddings?
//!
//! Embeddings are dense vector representations of text that capture semantic meaning.
//! They transform human-readable text into numerical vectors so that semantically
//! similar passages end up close together in vector space. This is the foundation
//! the Index Builder and Retriever build on: chunks and queries are embedded with
//! the same model so cosine similarity between their vectors approximates semantic
//! relatedness.
//!
//! ## Usage
//!
//! This module provides the [`EmbeddingModel`] trait that abstracts over different
//! embedding implementations, allowing you to switch between providers while
//! maintaining the same interface.
//!
//! ```rust
//! use quarry_core::EmbeddingModel;
//!
//! async fn example<T: EmbeddingModel>(model: &T) -> quarry_core::Result<()> {
//!     let dim = model.dim();
//!     let embedding = model.embed("Hello, world!").await?;
//!     assert_eq!(embedding.len(), dim);
//!     Ok(())
//! }
//! ```

use alloc::vec::Vec;
use core::future::Future;

/// A type alias for an embedding vector of 32-bit floats.
///
/// Embeddings are dense vector representations where each dimension captures
/// different semantic features of the input text. The vector length is determined
/// by the embedding model's architecture.
pub type Embedding = Vec<f32>;

/// Converts text to vector representations.
///
/// This trait provides a unified interface for different embedding model implementations
/// so that the indexing and retrieval paths don't need to know which model produced
/// a vector, only its dimension.
///
/// # Implementation Requirements
///
/// - The [`embed`](EmbeddingModel::embed) method must return vectors with length equal to [`dim`](EmbeddingModel::dim)
/// - Vectors are expected to be comparable by cosine similarity; implementations whose
///   underlying model is not already normalized should normalize in `embed`.
pub trait EmbeddingModel: Send + Sized + Send + Sync {
    /// Returns the embedding vector dimension.
    fn dim(&self) -> usize;

    /// Converts text to an embedding vector.
    ///
    /// # Arguments
    ///
    /// * `text` - The input text to embed. Can be a word, sentence, paragraph, or chunk.
    ///
    /// # Returns
    ///
    /// A [`Vec<f32>`] with length equal to [`Self::dim`](EmbeddingModel::dim).
    fn embed(&self, text: &str) -> impl Future<Output = crate::Result<Vec<f32>>> + Send;

    /// Converts multiple texts to embedding vectors in one call.
    ///
    /// The default implementation embeds each text in turn. Providers that support
    /// native batching (most do, since one forward pass over several inputs is
    /// cheaper than one pass per input) should override this.
    fn embed_batch(
        &self,
        texts: &[&str],
    ) -> impl Future<Output = crate::Result<Vec<Vec<f32>>>> + Send
    where
        Self: Sync,
    {
        async move {
            let mut embeddings = Vec::with_capacity(texts.len());
            for text in texts {
                embeddings.push(self.embed(text).await?);
            }
            Ok(embeddings)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    struct MockEmbeddingModel {
        dimension: usize,
    }

    impl EmbeddingModel for MockEmbeddingModel {
        fn dim(&self) -> usize {
            self.dimension
        }

        #[allow(clippy::cast_precision_loss)]
        async fn embed(&self, text: &str) -> crate::Result<Vec<f32>> {
            let mut embedding = vec![0.0; self.dimension];
            let text_len = text.len();

            for (i, value) in embedding.iter_mut().enumerate() {
                *value = (text_len + i) as f32 * 0.01;
            }

            Ok(embedding)
        }
    }

    #[tokio::test]
    async fn embedding_model_dimension() {
        let model = MockEmbeddingModel { dimension: 768 };
        assert_eq!(model.dim(), 768);
    }

    #[tokio::test]
    async fn embedding_generation() {
        let model = MockEmbeddingModel { dimension: 4 };
        let embedding = model.embed("test").await.unwrap();

        assert_eq!(embedding.len(), 4);
        assert!((embedding[0] - 0.04).abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn embed_batch_matches_sequential_embed() {
        let model = MockEmbeddingModel { dimension: 3 };
        let batch = model.embed_batch(&["a", "bb"]).await.unwrap();
        let single_a = model.embed("a").await.unwrap();
        let single_bb = model.embed("bb").await.unwrap();

        assert_eq!(batch, vec![single_a, single_bb]);
    }

    #[tokio::test]
    async fn embed_batch_preserves_order_and_count() {
        let model = MockEmbeddingModel { dimension: 2 };
        let texts = ["one", "two", "three"];
        let batch = model.embed_batch(&texts).await.unwrap();
        assert_eq!(batch.len(), texts.len());
    }
}
