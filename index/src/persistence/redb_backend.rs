//! redb-based embedded database persistence.
//!
//! Stores three sidecar tables keyed by `vector_id` (the row index assigned
//! by the [`VectorIndex`](crate::index::VectorIndex) backend) rather than one
//! table keyed by chunk ID: `ann_index` (embedding vectors), `chunks` (chunk
//! text and identity fields), `metadata` (the chunk's key/value metadata).
//! Keying by `vector_id` instead of the chunk's string ID makes iteration
//! order match insertion order, and splitting the three lets [`Self::load`]
//! detect a corrupted or partially-written directory by comparing row counts
//! instead of silently returning fewer chunks than vectors.

use redb::{Database, ReadableTable, TableDefinition};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{IndexError, Result};
use crate::types::{Chunk, IndexEntry, Metadata};

use super::Persistence;

const ANN_TABLE: TableDefinition<u64, &[u8]> = TableDefinition::new("ann_index");
const CHUNKS_TABLE: TableDefinition<u64, &[u8]> = TableDefinition::new("chunks");
const METADATA_TABLE: TableDefinition<u64, &[u8]> = TableDefinition::new("metadata");

/// Chunk fields stored in the `chunks` table; metadata lives in its own
/// table so a caller can repair or inspect metadata without touching text.
#[derive(Serialize, Deserialize)]
struct ChunkCore {
    id: String,
    text: String,
    source_id: String,
    index: usize,
    content_hash: u64,
    page_num: Option<u32>,
    vector_id: usize,
}

impl From<&Chunk> for ChunkCore {
    fn from(chunk: &Chunk) -> Self {
        Self {
            id: chunk.id.clone(),
            text: chunk.text.clone(),
            source_id: chunk.source_id.clone(),
            index: chunk.index,
            content_hash: chunk.content_hash,
            page_num: chunk.page_num,
            vector_id: chunk.vector_id,
        }
    }
}

impl ChunkCore {
    fn into_chunk(self, metadata: Metadata) -> Chunk {
        Chunk::with_metadata(self.id, self.text, self.source_id, self.index, self.content_hash, metadata)
            .with_page_num(self.page_num)
    }
}

fn db_err(e: impl std::fmt::Display) -> IndexError {
    IndexError::Database(e.to_string())
}

/// Embedded database persistence using redb.
///
/// This backend provides durable storage using redb, a pure-Rust embedded
/// key-value database. It supports incremental updates and crash recovery.
///
/// # Example
///
/// ```rust,no_run
/// use quarry_index::persistence::{Persistence, RedbPersistence};
///
/// let persistence = RedbPersistence::new("./index.redb").unwrap();
/// // persistence.save(&entries)?;
/// // let loaded = persistence.load()?;
/// ```
pub struct RedbPersistence {
    path: PathBuf,
    db: Database,
}

impl std::fmt::Debug for RedbPersistence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbPersistence")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl RedbPersistence {
    /// Creates or opens a redb persistence backend.
    ///
    /// # Arguments
    /// * `path` - Path to the database file
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or created.
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let db = Database::create(&path).map_err(db_err)?;

        Ok(Self { path, db })
    }
}

impl Persistence for RedbPersistence {
    fn save(&self, entries: &[IndexEntry]) -> Result<()> {
        let write_txn = self.db.begin_write().map_err(db_err)?;

        {
            let mut ann = write_txn.open_table(ANN_TABLE).map_err(db_err)?;
            let mut chunks = write_txn.open_table(CHUNKS_TABLE).map_err(db_err)?;
            let mut metadata = write_txn.open_table(METADATA_TABLE).map_err(db_err)?;

            let len = entries.len() as u64;
            ann.retain(|k, _| k < len).map_err(db_err)?;
            chunks.retain(|k, _| k < len).map_err(db_err)?;
            metadata.retain(|k, _| k < len).map_err(db_err)?;

            for entry in entries {
                let vector_id = entry.chunk.vector_id as u64;

                let embedding_bytes = serde_json::to_vec(&entry.embedding)
                    .map_err(|e| IndexError::Serialization(e.to_string()))?;
                ann.insert(vector_id, embedding_bytes.as_slice()).map_err(db_err)?;

                let chunk_bytes = serde_json::to_vec(&ChunkCore::from(&entry.chunk))
                    .map_err(|e| IndexError::Serialization(e.to_string()))?;
                chunks.insert(vector_id, chunk_bytes.as_slice()).map_err(db_err)?;

                let metadata_bytes = serde_json::to_vec(&entry.chunk.metadata)
                    .map_err(|e| IndexError::Serialization(e.to_string()))?;
                metadata
                    .insert(vector_id, metadata_bytes.as_slice())
                    .map_err(db_err)?;
            }
        }

        write_txn.commit().map_err(db_err)?;

        Ok(())
    }

    fn load(&self) -> Result<Vec<IndexEntry>> {
        let read_txn = self.db.begin_read().map_err(db_err)?;

        let ann = match read_txn.open_table(ANN_TABLE) {
            Ok(t) => t,
            Err(redb::TableError::TableDoesNotExist(_)) => return Ok(Vec::new()),
            Err(e) => return Err(db_err(e)),
        };
        let chunks = match read_txn.open_table(CHUNKS_TABLE) {
            Ok(t) => t,
            Err(redb::TableError::TableDoesNotExist(_)) => {
                return Err(IndexError::LengthMismatch(
                    "ann_index table present but chunks table is missing".into(),
                ));
            }
            Err(e) => return Err(db_err(e)),
        };
        let metadata = match read_txn.open_table(METADATA_TABLE) {
            Ok(t) => t,
            Err(redb::TableError::TableDoesNotExist(_)) => {
                return Err(IndexError::LengthMismatch(
                    "ann_index table present but metadata table is missing".into(),
                ));
            }
            Err(e) => return Err(db_err(e)),
        };

        let ann_len = ann.len().map_err(db_err)?;
        let chunks_len = chunks.len().map_err(db_err)?;
        let metadata_len = metadata.len().map_err(db_err)?;

        if ann_len != chunks_len || chunks_len != metadata_len {
            return Err(IndexError::LengthMismatch(format!(
                "ann_index has {ann_len} rows, chunks has {chunks_len}, metadata has {metadata_len}"
            )));
        }

        let mut entries = Vec::with_capacity(ann_len as usize);

        for result in ann.iter().map_err(db_err)? {
            let (key, value) = result.map_err(db_err)?;
            let vector_id = key.value();

            let embedding: Vec<f32> =
                serde_json::from_slice(value.value()).map_err(|e| IndexError::Serialization(e.to_string()))?;

            let chunk_bytes = chunks
                .get(vector_id)
                .map_err(db_err)?
                .ok_or_else(|| IndexError::LengthMismatch(format!("no chunk row for vector_id {vector_id}")))?;
            let chunk_core: ChunkCore = serde_json::from_slice(chunk_bytes.value())
                .map_err(|e| IndexError::Serialization(e.to_string()))?;

            let metadata_bytes = metadata
                .get(vector_id)
                .map_err(db_err)?
                .ok_or_else(|| IndexError::LengthMismatch(format!("no metadata row for vector_id {vector_id}")))?;
            let chunk_metadata: Metadata = serde_json::from_slice(metadata_bytes.value())
                .map_err(|e| IndexError::Serialization(e.to_string()))?;

            entries.push(IndexEntry::new(chunk_core.into_chunk(chunk_metadata), embedding));
        }

        entries.sort_by_key(|e| e.chunk.vector_id);

        Ok(entries)
    }

    fn extension(&self) -> &'static str {
        "redb"
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Chunk;
    use tempfile::tempdir;

    fn make_entry(id: &str, text: &str, vector_id: usize) -> IndexEntry {
        let mut chunk = Chunk::new(id, text, "doc1", 0, crate::dedup::content_hash(text));
        chunk.vector_id = vector_id;
        IndexEntry::new(chunk, vec![1.0, 2.0, 3.0, 4.0])
    }

    #[test]
    fn save_and_load_preserves_vector_id_order() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.redb");
        let persistence = RedbPersistence::new(&path).unwrap();

        let entries = vec![make_entry("c1", "hello", 0), make_entry("c2", "world", 1)];

        persistence.save(&entries).unwrap();

        let loaded = persistence.load().unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].chunk.id, "c1");
        assert_eq!(loaded[1].chunk.id, "c2");
    }

    #[test]
    fn load_empty_db() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty.redb");
        let persistence = RedbPersistence::new(&path).unwrap();

        let loaded = persistence.load().unwrap();
        assert!(loaded.is_empty());
    }

    #[test]
    fn save_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty.redb");
        let persistence = RedbPersistence::new(&path).unwrap();

        persistence.save(&[]).unwrap();
        let loaded = persistence.load().unwrap();
        assert!(loaded.is_empty());
    }

    #[test]
    fn overwrite_entries() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.redb");
        let persistence = RedbPersistence::new(&path).unwrap();

        let entries1 = vec![make_entry("c1", "hello", 0)];
        persistence.save(&entries1).unwrap();

        let entries2 = vec![make_entry("c1", "world", 0)];
        persistence.save(&entries2).unwrap();

        let loaded = persistence.load().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].chunk.text, "world");
    }

    #[test]
    fn shrinking_entry_count_drops_stale_rows() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.redb");
        let persistence = RedbPersistence::new(&path).unwrap();

        let entries1 = vec![make_entry("c1", "hello", 0), make_entry("c2", "world", 1)];
        persistence.save(&entries1).unwrap();

        let entries2 = vec![make_entry("c1", "hello", 0)];
        persistence.save(&entries2).unwrap();

        let loaded = persistence.load().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].chunk.id, "c1");
    }

    #[test]
    fn missing_chunks_table_is_a_length_mismatch() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.redb");
        {
            let persistence = RedbPersistence::new(&path).unwrap();
            let write_txn = persistence.db.begin_write().unwrap();
            {
                let mut ann = write_txn.open_table(ANN_TABLE).unwrap();
                ann.insert(0u64, serde_json::to_vec(&vec![1.0f32]).unwrap().as_slice())
                    .unwrap();
            }
            write_txn.commit().unwrap();
        }

        let persistence = RedbPersistence::new(&path).unwrap();
        let result = persistence.load();
        assert!(matches!(result, Err(IndexError::LengthMismatch(_))));
    }
}
