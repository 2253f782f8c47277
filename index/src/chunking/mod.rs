//! Text chunking strategies.
//!
//! This module provides the [`Chunker`] trait and implementations for
//! splitting extracted document text into smaller, indexable chunks.

mod fixed;
mod paragraph;

pub use fixed::FixedSizeChunker;
pub use paragraph::ParagraphChunker;

use crate::error::Result;
use crate::types::{Chunk, Document};

/// Finds the page number covering byte offset `start` in a document's text,
/// given that document's `page_offsets` (ascending, as produced by
/// `quarry_pdf::ExtractedDocument::page_offsets`): the last page whose
/// offset is `<= start`, or `None` if `page_offsets` is empty.
#[must_use]
pub fn page_num_for_offset(page_offsets: &[(usize, u32)], start: usize) -> Option<u32> {
    page_offsets
        .iter()
        .rev()
        .find(|(offset, _)| *offset <= start)
        .map(|(_, page)| *page)
        .or_else(|| page_offsets.first().map(|(_, page)| *page))
}

/// Trait for text chunking strategies.
///
/// Chunkers split documents into smaller pieces that can be individually
/// embedded and searched.
///
/// - [`FixedSizeChunker`]: character-window chunking with overlap
/// - [`ParagraphChunker`]: paragraph-aware chunking with overlap and a
///   consolidation pass, used by default for PDF-extracted text
pub trait Chunker: Send + Sync {
    /// Splits a document into chunks.
    ///
    /// # Errors
    /// Returns an error if the configured chunking strategy cannot process
    /// the document.
    fn chunk(&self, doc: &Document) -> Result<Vec<Chunk>>;

    /// Returns the name of this chunking strategy.
    fn name(&self) -> &'static str;
}

/// Merges chunks into larger ones when a document produced more than
/// `max_chunks`, so that an unusually long document doesn't flood the index
/// with thousands of tiny entries.
///
/// Chunks are combined greedily in order: the running chunk accumulates
/// following chunks as long as the combined length stays under
/// `chunk_size * 2`, after which it is flushed and a new one starts.
#[must_use]
pub fn consolidate(chunks: Vec<Chunk>, max_chunks: usize, chunk_size: usize) -> Vec<Chunk> {
    if chunks.len() <= max_chunks {
        return chunks;
    }

    let limit = chunk_size.saturating_mul(2);
    let source_id = chunks
        .first()
        .map_or_else(String::new, |c| c.source_id.clone());
    let metadata = chunks
        .first()
        .map_or_else(Default::default, |c| c.metadata.clone());

    let mut consolidated = Vec::new();
    let mut current = String::new();
    let mut current_page_num = None;

    for chunk in chunks {
        if current.is_empty() {
            current = chunk.text;
            current_page_num = chunk.page_num;
        } else if current.len() + chunk.text.len() < limit {
            current.push_str("\n\n");
            current.push_str(&chunk.text);
        } else {
            consolidated.push(mk_consolidated(
                &source_id,
                consolidated.len(),
                std::mem::take(&mut current),
                metadata.clone(),
                current_page_num.take(),
            ));
            current = chunk.text;
            current_page_num = chunk.page_num;
        }
    }

    if !current.is_empty() {
        consolidated.push(mk_consolidated(
            &source_id,
            consolidated.len(),
            current,
            metadata,
            current_page_num,
        ));
    }

    consolidated
}

fn mk_consolidated(
    source_id: &str,
    index: usize,
    text: String,
    metadata: crate::types::Metadata,
    page_num: Option<u32>,
) -> Chunk {
    let hash = crate::dedup::content_hash(&text);
    Chunk::with_metadata(
        format!("{source_id}#chunk_{index}"),
        text,
        source_id,
        index,
        hash,
        metadata,
    )
    .with_page_num(page_num)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dedup::content_hash;

    fn chunk(n: usize, text: &str) -> Chunk {
        Chunk::new("doc", text, "doc", n, content_hash(text))
    }

    #[test]
    fn consolidate_is_noop_under_the_limit() {
        let chunks = vec![chunk(0, "a"), chunk(1, "b")];
        let result = consolidate(chunks.clone(), 100, 512);
        assert_eq!(result.len(), chunks.len());
    }

    #[test]
    fn consolidate_merges_when_over_the_limit() {
        let chunks: Vec<_> = (0..10).map(|i| chunk(i, "x")).collect();
        let result = consolidate(chunks, 5, 4);
        assert!(result.len() <= 5);
        assert!(result.iter().all(|c| !c.text.is_empty()));
    }
}
