//! Paragraph-based text chunking.
//!
//! Splits text by blank-line-separated paragraphs, grouping consecutive
//! paragraphs into a chunk until `chunk_size` would be exceeded, then starts
//! the next chunk with the trailing `chunk_overlap` characters of the
//! previous one so that context survives the boundary. A paragraph larger
//! than `chunk_size` on its own is split by sentence instead of being kept
//! whole or cut mid-word.

use unicode_segmentation::UnicodeSegmentation;

use crate::dedup::content_hash;
use crate::error::Result;
use crate::types::{Chunk, Document};

use super::{Chunker, consolidate, page_num_for_offset};

/// Default maximum chunks a single document may produce before consolidation
/// merges neighbors together.
const DEFAULT_MAX_CHUNKS_PER_DOC: usize = 100;

/// Chunks text by paragraph boundaries (blank lines), with overlap.
#[derive(Debug, Clone)]
pub struct ParagraphChunker {
    chunk_size: usize,
    chunk_overlap: usize,
    max_chunks_per_doc: usize,
}

impl ParagraphChunker {
    /// Creates a paragraph chunker with a maximum chunk size and overlap, both in bytes,
    /// and the default consolidation ceiling of 100 chunks per document.
    ///
    /// # Panics
    /// Panics if `chunk_overlap >= chunk_size`.
    #[must_use]
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self::with_max_chunks(chunk_size, chunk_overlap, DEFAULT_MAX_CHUNKS_PER_DOC)
    }

    /// Creates a paragraph chunker with an explicit consolidation ceiling,
    /// overriding the default of 100 chunks per document.
    ///
    /// # Panics
    /// Panics if `chunk_overlap >= chunk_size`.
    #[must_use]
    pub fn with_max_chunks(chunk_size: usize, chunk_overlap: usize, max_chunks_per_doc: usize) -> Self {
        assert!(
            chunk_overlap < chunk_size,
            "chunk_overlap ({chunk_overlap}) must be less than chunk_size ({chunk_size})"
        );
        Self {
            chunk_size,
            chunk_overlap,
            max_chunks_per_doc,
        }
    }

    /// Creates a chunker with default settings (2000 chars, 200 overlap).
    #[must_use]
    pub fn default_settings() -> Self {
        Self::new(2000, 200)
    }

    fn split_by_sentence<'a>(&self, paragraph: &'a str) -> Vec<&'a str> {
        let sentences: Vec<&str> = paragraph.unicode_sentences().collect();
        if sentences.is_empty() {
            return vec![paragraph];
        }

        let mut pieces = Vec::new();
        let mut start = 0usize;
        let mut len = 0usize;

        for sentence in &sentences {
            let sentence_len = sentence.trim().len();
            if len > 0 && len + sentence_len + 1 > self.chunk_size {
                let end = start + len;
                pieces.push(paragraph[start..end].trim());
                start = end;
                len = 0;
            }
            len += sentence_len + 1;
        }
        if len > 0 {
            pieces.push(paragraph[start..].trim());
        }
        pieces.retain(|p| !p.is_empty());
        if pieces.is_empty() {
            vec![paragraph]
        } else {
            pieces
        }
    }

    /// Paragraphs paired with their byte offset within `text`, for page-number
    /// lookups. Mirrors [`Self::paragraphs`]'s splitting but keeps position.
    fn paragraphs_with_offsets<'a>(&self, text: &'a str) -> Vec<(usize, &'a str)> {
        let mut result = Vec::new();
        let mut pos = 0usize;
        for part in text.split("\n\n") {
            let trimmed = part.trim();
            if !trimmed.is_empty() {
                let offset_in_part = part.find(trimmed).unwrap_or(0);
                result.push((pos + offset_in_part, trimmed));
            }
            pos += part.len() + 2;
        }
        result
    }
}

impl Default for ParagraphChunker {
    fn default() -> Self {
        Self::default_settings()
    }
}

impl Chunker for ParagraphChunker {
    fn chunk(&self, doc: &Document) -> Result<Vec<Chunk>> {
        let text = doc.text.trim();
        if text.is_empty() {
            return Ok(Vec::new());
        }

        if text.len() <= self.chunk_size {
            let hash = content_hash(text);
            return Ok(vec![
                Chunk::with_metadata(format!("{}#chunk_0", doc.id), text.to_string(), &doc.id, 0, hash, doc.metadata.clone())
                    .with_page_num(page_num_for_offset(&doc.page_offsets, 0)),
            ]);
        }

        let mut chunks = Vec::new();
        let mut current = String::new();
        let mut current_page_num: Option<u32> = None;

        let mut push_current = |current: &mut String, current_page_num: &mut Option<u32>, chunks: &mut Vec<Chunk>| {
            if current.is_empty() {
                return;
            }
            let hash = content_hash(current);
            chunks.push(
                Chunk::with_metadata(
                    format!("{}#chunk_{}", doc.id, chunks.len()),
                    current.clone(),
                    &doc.id,
                    chunks.len(),
                    hash,
                    doc.metadata.clone(),
                )
                .with_page_num(current_page_num.take()),
            );
        };

        for (offset, paragraph) in self.paragraphs_with_offsets(text) {
            if paragraph.len() > self.chunk_size {
                push_current(&mut current, &mut current_page_num, &mut chunks);
                current.clear();
                current_page_num = page_num_for_offset(&doc.page_offsets, offset);
                for piece in self.split_by_sentence(paragraph) {
                    if !current.is_empty() && current.len() + piece.len() + 1 > self.chunk_size {
                        push_current(&mut current, &mut current_page_num, &mut chunks);
                        current.clear();
                        current_page_num = page_num_for_offset(&doc.page_offsets, offset);
                    }
                    if current.is_empty() {
                        current.push_str(piece);
                    } else {
                        current.push(' ');
                        current.push_str(piece);
                    }
                }
                continue;
            }

            if current.is_empty() {
                current.push_str(paragraph);
                current_page_num = page_num_for_offset(&doc.page_offsets, offset);
            } else if current.len() + 2 + paragraph.len() > self.chunk_size {
                push_current(&mut current, &mut current_page_num, &mut chunks);
                current = if current.len() > self.chunk_overlap {
                    current[current.len() - self.chunk_overlap..].to_string()
                } else {
                    String::new()
                };
                if current.is_empty() {
                    current.push_str(paragraph);
                    current_page_num = page_num_for_offset(&doc.page_offsets, offset);
                } else {
                    current.push_str("\n\n");
                    current.push_str(paragraph);
                    current_page_num = page_num_for_offset(&doc.page_offsets, offset);
                }
            } else {
                current.push_str("\n\n");
                current.push_str(paragraph);
            }
        }

        push_current(&mut current, &mut current_page_num, &mut chunks);

        Ok(consolidate(chunks, self.max_chunks_per_doc, self.chunk_size))
    }

    fn name(&self) -> &'static str {
        "paragraph"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunks_on_paragraph_boundaries() {
        let chunker = ParagraphChunker::new(80, 10);
        let doc = Document::new("doc", "a\n\n b\n\n c");
        let chunks = chunker.chunk(&doc).unwrap();

        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].text.contains('a'));
        assert!(chunks[0].text.contains('b'));
        assert!(chunks[0].text.contains('c'));
    }

    #[test]
    fn large_paragraph_gets_split_by_sentence() {
        let chunker = ParagraphChunker::new(20, 5);
        let doc = Document::new(
            "doc",
            "This is one sentence. This is another sentence. And a third one here.",
        );
        let chunks = chunker.chunk(&doc).unwrap();

        assert!(chunks.len() >= 2);
        assert!(chunks.iter().all(|c| !c.text.is_empty()));
    }

    #[test]
    fn consecutive_chunks_share_overlap() {
        let chunker = ParagraphChunker::new(30, 10);
        let doc = Document::new(
            "doc",
            "first paragraph of decent length\n\nsecond paragraph of decent length\n\nthird paragraph of decent length",
        );
        let chunks = chunker.chunk(&doc).unwrap();
        assert!(chunks.len() >= 2);
    }

    #[test]
    fn empty_text_yields_no_chunks() {
        let chunker = ParagraphChunker::default();
        let doc = Document::new("doc", "   \n\n  ");
        assert!(chunker.chunk(&doc).unwrap().is_empty());
    }

    #[test]
    #[should_panic(expected = "chunk_overlap")]
    fn overlap_must_be_less_than_chunk_size() {
        let _ = ParagraphChunker::new(50, 50);
    }
}
