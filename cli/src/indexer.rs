//! Walks a document root, extracts text (falling back to OCR for image-only
//! PDFs), chunks each document into a per-document shard file, and inserts
//! the shard's chunks into a [`Rag`].
//!
//! Grounded on `original_source/indexer/pdf_indexer.py`'s per-document shard
//! metadata (`file_name`, `file_path`, `relative_path`, `category`,
//! `file_size_mb`, `page_count`, `ocr_used`, `processed_date`): each document
//! is written as a [`DocumentShard`] JSON file before its chunks are
//! embedded, so a crash between shard-write and embedding lets a re-run skip
//! straight to `insert_chunks` instead of re-extracting and re-chunking.

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use quarry_core::EmbeddingModel;
use quarry_index::{Chunker, Cleaner, Document, DocumentShard, Rag, ShardChunk, ShardMetadata};
use quarry_pdf::{ExtractOptions, OcrOptions};

use crate::config::IndexingConfig;

/// One step of indexing progress, reported to the CLI's progress callback.
#[derive(Debug, Clone)]
pub enum IndexEvent {
    /// A file is about to be processed.
    Started { path: PathBuf, index: usize, total: usize },
    /// A file's shard was found on disk and is being resumed without
    /// re-extraction.
    Resumed { path: PathBuf },
    /// A file finished indexing successfully.
    Indexed { path: PathBuf, chunks: usize },
    /// A file was skipped.
    Skipped { path: PathBuf, reason: String },
    /// All files processed; the index was saved.
    Done { indexed: usize, total: usize },
}

const INDEXABLE_EXTENSIONS: &[&str] = &["pdf", "txt", "md"];

/// Walks `root` and indexes every supported file found under it, writing a
/// shard file per document under `shards_dir` before embedding its chunks.
///
/// # Errors
/// Returns an error if the directory can't be walked or the underlying
/// [`Rag::save`] fails.
pub async fn index_database<M, C, L>(
    rag: &Rag<M, C, L>,
    root: impl AsRef<Path>,
    shards_dir: impl AsRef<Path>,
    config: &IndexingConfig,
    mut on_event: impl FnMut(IndexEvent),
) -> quarry_index::Result<usize>
where
    M: EmbeddingModel + Send + Sync + 'static,
    C: Chunker,
    L: Cleaner,
{
    let root = root.as_ref();
    let shards_dir = shards_dir.as_ref();
    std::fs::create_dir_all(shards_dir).map_err(quarry_index::IndexError::Io)?;

    let files = collect_indexable_files(root);
    let total = files.len();
    let mut indexed = 0;

    for (index, path) in files.into_iter().enumerate() {
        on_event(IndexEvent::Started { path: path.clone(), index, total });

        let relative_path = path.strip_prefix(root).unwrap_or(&path).to_path_buf();
        let shard_path = shards_dir.join(format!("{}.json", DocumentShard::file_name(&relative_path)));

        let shard = if shard_path.exists() {
            on_event(IndexEvent::Resumed { path: path.clone() });
            match load_shard(&shard_path) {
                Ok(shard) => Some(shard),
                Err(reason) => {
                    on_event(IndexEvent::Skipped { path, reason });
                    continue;
                }
            }
        } else {
            match build_shard(rag, root, &path, &relative_path, config) {
                Ok(Some(shard)) => {
                    if let Err(reason) = write_shard(&shard_path, &shard) {
                        on_event(IndexEvent::Skipped { path, reason });
                        continue;
                    }
                    Some(shard)
                }
                Ok(None) => None,
                Err(reason) => {
                    on_event(IndexEvent::Skipped { path, reason });
                    continue;
                }
            }
        };

        let Some(shard) = shard else {
            on_event(IndexEvent::Skipped { path, reason: "no extractable text".to_string() });
            continue;
        };

        let source_id = relative_path.display().to_string();
        match rag.insert_chunks(shard.into_chunks(&source_id)).await {
            Ok(chunks) => {
                indexed += 1;
                on_event(IndexEvent::Indexed { path, chunks });
            }
            Err(err) => on_event(IndexEvent::Skipped { path, reason: err.to_string() }),
        }
    }

    if rag.config().auto_save {
        rag.save()?;
    }

    on_event(IndexEvent::Done { indexed, total });
    Ok(indexed)
}

fn collect_indexable_files(root: &Path) -> Vec<PathBuf> {
    let mut stack = vec![root.to_path_buf()];
    let mut files = Vec::new();

    while let Some(dir) = stack.pop() {
        let Ok(entries) = std::fs::read_dir(&dir) else { continue };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                stack.push(path);
            } else if path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| INDEXABLE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
            {
                files.push(path);
            }
        }
    }

    files.sort();
    files
}

fn category_for(relative_path: &Path) -> String {
    relative_path
        .components()
        .next()
        .map(|component| component.as_os_str().to_string_lossy().to_string())
        .filter(|_| relative_path.parent().is_some_and(|p| p != Path::new("")))
        .unwrap_or_else(|| "root".to_string())
}

/// Extracts, cleans, and chunks one document, returning a shard ready to be
/// written to disk. Chunking uses `rag`'s configured cleaner/chunker so the
/// shard's chunks match what a direct `rag.insert` would have produced.
fn build_shard<M, C, L>(
    rag: &Rag<M, C, L>,
    root: &Path,
    path: &Path,
    relative_path: &Path,
    config: &IndexingConfig,
) -> Result<Option<DocumentShard>, String>
where
    M: EmbeddingModel + Send + Sync + 'static,
    C: Chunker,
    L: Cleaner,
{
    let _ = root;
    let category = category_for(relative_path);
    let file_name = path.file_name().map_or_else(|| "unknown".to_string(), |n| n.to_string_lossy().to_string());

    let file_size_bytes = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);
    let is_pdf = path.extension().and_then(|ext| ext.to_str()).is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));

    let (text, page_count, ocr_used, page_offsets) = if is_pdf {
        let options = ExtractOptions {
            max_pages: config.max_pages,
            min_chars_per_page: config.min_chars_per_page as f64,
            ocr: OcrOptions { dpi: config.ocr_dpi as u16, batch_pages: config.ocr_batch_pages, ..OcrOptions::default() },
        };
        let extracted = quarry_pdf::extract_from_path(path, &options).map_err(|err| err.to_string())?;
        let page_offsets = extracted.page_offsets();
        (extracted.joined_text(), extracted.total_pages, extracted.ocr_used, page_offsets)
    } else {
        let text = std::fs::read_to_string(path).map_err(|err| err.to_string())?;
        (text, 1, false, Vec::new())
    };

    if text.trim().is_empty() {
        return Ok(None);
    }

    let metadata = ShardMetadata {
        file_name,
        file_path: path.to_path_buf(),
        relative_path: relative_path.to_path_buf(),
        category,
        file_size_mb: file_size_bytes as f64 / (1024.0 * 1024.0),
        page_count,
        ocr_used,
        processed_date: unix_timestamp(),
    };

    let document = Document::new(relative_path.display().to_string(), text).with_page_offsets(page_offsets);
    let chunks = rag.prepare_chunks(document).map_err(|err| err.to_string())?;

    let shard_chunks = chunks
        .into_iter()
        .enumerate()
        .map(|(chunk_id, chunk)| ShardChunk {
            chunk_id,
            text: chunk.text,
            page_num: chunk.page_num.map(|p| p as usize),
            metadata: metadata.clone(),
        })
        .collect();

    Ok(Some(DocumentShard { metadata, chunks: shard_chunks }))
}

fn write_shard(path: &Path, shard: &DocumentShard) -> Result<(), String> {
    let bytes = serde_json::to_vec_pretty(shard).map_err(|err| err.to_string())?;
    std::fs::write(path, bytes).map_err(|err| err.to_string())
}

fn load_shard(path: &Path) -> Result<DocumentShard, String> {
    let bytes = std::fs::read(path).map_err(|err| err.to_string())?;
    serde_json::from_slice(&bytes).map_err(|err| err.to_string())
}

fn unix_timestamp() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::category_for;
    use std::path::Path;

    #[test]
    fn category_is_top_level_directory() {
        assert_eq!(category_for(Path::new("finance/report.pdf")), "finance");
    }

    #[test]
    fn category_falls_back_to_root_for_top_level_files() {
        assert_eq!(category_for(Path::new("report.pdf")), "root");
    }
}
