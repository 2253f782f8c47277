//! Per-document shard files emitted by the indexing stage and consumed by
//! the Index Builder.
//!
//! Each source PDF produces one shard JSON file holding its extracted,
//! chunked text plus the metadata every chunk needs for citation display.
//! Shards let indexing resume after a crash without re-extracting already
//! processed documents.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::types::{Chunk, Document, Metadata};

/// Metadata shared by every chunk of one shard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShardMetadata {
    pub file_name: String,
    pub file_path: PathBuf,
    pub relative_path: PathBuf,
    pub category: String,
    pub file_size_mb: f64,
    pub page_count: usize,
    pub ocr_used: bool,
    /// Unix timestamp (seconds) at which the document was processed.
    pub processed_date: u64,
}

/// A single chunk within a shard, carrying a copy of the shard's metadata
/// plus its own `chunk_id` and `page_num`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShardChunk {
    pub chunk_id: usize,
    pub text: String,
    pub page_num: Option<usize>,
    pub metadata: ShardMetadata,
}

/// The on-disk shard: one document's metadata plus its chunks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentShard {
    pub metadata: ShardMetadata,
    pub chunks: Vec<ShardChunk>,
}

impl DocumentShard {
    /// Deterministic shard filename stem: `<sanitized_stem>_<hash8>`, where
    /// the hash is derived from the relative path so that two documents with
    /// the same file name in different directories never collide. Callers
    /// append their own extension (typically `.json`).
    #[must_use]
    pub fn file_name(relative_path: &std::path::Path) -> String {
        let stem = relative_path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        let sanitized: String = stem
            .chars()
            .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        let hash = crate::dedup::content_hash(&relative_path.to_string_lossy());
        format!("{sanitized}_{:08x}", (hash as u32))
    }

    /// Converts this shard into a [`Document`] (for the cleaning/chunking
    /// pipeline when re-chunking is desired) by joining chunk text with
    /// blank lines and flattening shard metadata into [`Metadata`].
    #[must_use]
    pub fn into_document(self, doc_id: impl Into<String>) -> Document {
        let text = self
            .chunks
            .iter()
            .map(|c| c.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");
        Document::with_metadata(doc_id, text, self.metadata.into_map())
    }

    /// Converts this shard directly into pre-chunked [`Chunk`] values,
    /// skipping the chunking stage entirely (the shard was already chunked
    /// when it was written).
    #[must_use]
    pub fn into_chunks(self, source_id: &str) -> Vec<Chunk> {
        self.chunks
            .into_iter()
            .map(|c| {
                let mut metadata = c.metadata.clone().into_map();
                metadata.insert("chunk_id".into(), c.chunk_id.to_string());
                let hash = crate::dedup::content_hash(&c.text);
                Chunk::with_metadata(
                    format!("{source_id}#chunk_{}", c.chunk_id),
                    c.text,
                    source_id,
                    c.chunk_id,
                    hash,
                    metadata,
                )
                .with_page_num(c.page_num.map(|p| p as u32))
            })
            .collect()
    }
}

impl ShardMetadata {
    fn into_map(self) -> Metadata {
        let mut map = Metadata::new();
        map.insert("file_name".into(), self.file_name);
        map.insert("file_path".into(), self.file_path.display().to_string());
        map.insert("relative_path".into(), self.relative_path.display().to_string());
        map.insert("category".into(), self.category);
        map.insert("file_size_mb".into(), self.file_size_mb.to_string());
        map.insert("page_count".into(), self.page_count.to_string());
        map.insert("ocr_used".into(), self.ocr_used.to_string());
        map.insert("processed_date".into(), self.processed_date.to_string());
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn sample_metadata() -> ShardMetadata {
        ShardMetadata {
            file_name: "report.pdf".into(),
            file_path: PathBuf::from("/library/finance/report.pdf"),
            relative_path: PathBuf::from("finance/report.pdf"),
            category: "finance".into(),
            file_size_mb: 1.25,
            page_count: 12,
            ocr_used: false,
            processed_date: 1_700_000_000,
        }
    }

    #[test]
    fn shard_file_name_is_stable_and_sanitized() {
        let a = DocumentShard::file_name(Path::new("finance/report 2024.pdf"));
        let b = DocumentShard::file_name(Path::new("finance/report 2024.pdf"));
        assert_eq!(a, b);
        assert!(a.starts_with("report_2024_"));
    }

    #[test]
    fn shard_file_name_disambiguates_same_stem_in_different_dirs() {
        let a = DocumentShard::file_name(Path::new("finance/report.pdf"));
        let b = DocumentShard::file_name(Path::new("legal/report.pdf"));
        assert_ne!(a, b);
    }

    #[test]
    fn into_chunks_preserves_text_and_page_numbers() {
        let shard = DocumentShard {
            metadata: sample_metadata(),
            chunks: vec![ShardChunk {
                chunk_id: 0,
                text: "first chunk".into(),
                page_num: Some(1),
                metadata: sample_metadata(),
            }],
        };

        let chunks = shard.into_chunks("doc1");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "first chunk");
        assert_eq!(chunks[0].page_num, Some(1));
        assert_eq!(chunks[0].metadata.get("category"), Some(&"finance".to_string()));
    }

    #[test]
    fn into_document_joins_chunk_text() {
        let shard = DocumentShard {
            metadata: sample_metadata(),
            chunks: vec![
                ShardChunk {
                    chunk_id: 0,
                    text: "alpha".into(),
                    page_num: Some(1),
                    metadata: sample_metadata(),
                },
                ShardChunk {
                    chunk_id: 1,
                    text: "beta".into(),
                    page_num: Some(2),
                    metadata: sample_metadata(),
                },
            ],
        };

        let doc = shard.into_document("doc1");
        assert!(doc.text.contains("alpha"));
        assert!(doc.text.contains("beta"));
        assert_eq!(doc.metadata.get("category"), Some(&"finance".to_string()));
    }
}
