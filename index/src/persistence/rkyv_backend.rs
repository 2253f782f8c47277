//! rkyv-based binary persistence.
//!
//! Serializes three parallel, position-aligned sidecars rather than one
//! combined `Vec<EntryData>`: embeddings, chunk text/identity, and chunk
//! metadata. A backend's `entries()` always returns chunks ordered by
//! `vector_id`, so each sidecar's position already is that chunk's
//! `vector_id`; [`Persistence::load`] checks the three sidecars agree in
//! length before zipping them back into [`IndexEntry`] values, instead of
//! trusting a single combined structure never got corrupted mid-write.

use rkyv::rancor::Error as RkyvError;
use rkyv::{from_bytes, to_bytes};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{IndexError, Result};
use crate::types::IndexEntry;

use super::Persistence;

/// The three sidecars, serialized together but validated independently.
#[derive(rkyv::Archive, rkyv::Serialize, rkyv::Deserialize)]
#[rkyv(derive(Debug))]
struct PersistedIndex {
    ann_index: Vec<Vec<f32>>,
    chunks: Vec<ChunkData>,
    metadata: Vec<Vec<(String, String)>>,
}

/// Chunk identity/text fields, stored apart from metadata.
#[derive(Clone, rkyv::Archive, rkyv::Serialize, rkyv::Deserialize)]
#[rkyv(derive(Debug))]
struct ChunkData {
    id: String,
    text: String,
    source_id: String,
    index: u32,
    content_hash: u64,
    page_num: Option<u32>,
    vector_id: u32,
}

impl From<&IndexEntry> for ChunkData {
    fn from(entry: &IndexEntry) -> Self {
        Self {
            id: entry.chunk.id.clone(),
            text: entry.chunk.text.clone(),
            source_id: entry.chunk.source_id.clone(),
            index: entry.chunk.index as u32,
            content_hash: entry.chunk.content_hash,
            page_num: entry.chunk.page_num,
            vector_id: entry.chunk.vector_id as u32,
        }
    }
}

fn assemble(chunk: ChunkData, metadata: Vec<(String, String)>, embedding: Vec<f32>) -> IndexEntry {
    use crate::types::{Chunk, Metadata};

    let metadata: Metadata = metadata.into_iter().collect();
    let mut built = Chunk::with_metadata(
        chunk.id,
        chunk.text,
        chunk.source_id,
        chunk.index as usize,
        chunk.content_hash,
        metadata,
    )
    .with_page_num(chunk.page_num);
    built.vector_id = chunk.vector_id as usize;
    IndexEntry::new(built, embedding)
}

/// Binary persistence using rkyv for fast serialization.
///
/// This backend provides fast serialization and deserialization using
/// the rkyv library.
///
/// # Example
///
/// ```rust,no_run
/// use quarry_index::persistence::{Persistence, RkyvPersistence};
///
/// let persistence = RkyvPersistence::new("./index.rkyv");
/// // persistence.save(&entries)?;
/// // let loaded = persistence.load()?;
/// ```
#[derive(Debug)]
pub struct RkyvPersistence {
    path: PathBuf,
}

impl RkyvPersistence {
    /// Creates a new rkyv persistence backend.
    ///
    /// # Arguments
    /// * `path` - Path to the persistence file
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Persistence for RkyvPersistence {
    fn save(&self, entries: &[IndexEntry]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let persisted = PersistedIndex {
            ann_index: entries.iter().map(|e| e.embedding.clone()).collect(),
            chunks: entries.iter().map(ChunkData::from).collect(),
            metadata: entries
                .iter()
                .map(|e| e.chunk.metadata.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
                .collect(),
        };

        let bytes = to_bytes::<RkyvError>(&persisted).map_err(|e| IndexError::Serialization(e.to_string()))?;

        fs::write(&self.path, &bytes).map_err(|e| IndexError::Persistence {
            path: self.path.clone(),
            source: e,
        })?;

        Ok(())
    }

    fn load(&self) -> Result<Vec<IndexEntry>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let bytes = fs::read(&self.path).map_err(|e| IndexError::Persistence {
            path: self.path.clone(),
            source: e,
        })?;

        if bytes.is_empty() {
            return Ok(Vec::new());
        }

        let persisted = from_bytes::<PersistedIndex, RkyvError>(&bytes)
            .map_err(|e| IndexError::Serialization(e.to_string()))?;

        let (ann_len, chunks_len, metadata_len) = (
            persisted.ann_index.len(),
            persisted.chunks.len(),
            persisted.metadata.len(),
        );
        if ann_len != chunks_len || chunks_len != metadata_len {
            return Err(IndexError::LengthMismatch(format!(
                "ann_index has {ann_len} rows, chunks has {chunks_len}, metadata has {metadata_len}"
            )));
        }

        let entries = persisted
            .chunks
            .into_iter()
            .zip(persisted.metadata)
            .zip(persisted.ann_index)
            .map(|((chunk, metadata), embedding)| assemble(chunk, metadata, embedding))
            .collect();

        Ok(entries)
    }

    fn extension(&self) -> &'static str {
        "rkyv"
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
    fn save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.rkyv");
        let persistence = RkyvPersistence::new(&path);

        let entries = vec![make_entry("c1", "hello", 0), make_entry("c2", "world", 1)];

        persistence.save(&entries).unwrap();
        assert!(path.exists());

        let loaded = persistence.load().unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].chunk.id, "c1");
        assert_eq!(loaded[1].chunk.id, "c2");
        assert_eq!(loaded[0].chunk.vector_id, 0);
        assert_eq!(loaded[1].chunk.vector_id, 1);
    }

    #[test]
    fn load_nonexistent() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nonexistent.rkyv");
        let persistence = RkyvPersistence::new(&path);

        let loaded = persistence.load().unwrap();
        assert!(loaded.is_empty());
    }

    #[test]
    fn save_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty.rkyv");
        let persistence = RkyvPersistence::new(&path);

        persistence.save(&[]).unwrap();
        let loaded = persistence.load().unwrap();
        assert!(loaded.is_empty());
    }

    #[test]
    fn preserves_page_num() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.rkyv");
        let persistence = RkyvPersistence::new(&path);

        let mut entry = make_entry("c1", "hello", 0);
        entry.chunk.page_num = Some(7);
        persistence.save(&[entry]).unwrap();

        let loaded = persistence.load().unwrap();
        assert_eq!(loaded[0].chunk.page_num, Some(7));
    }
}
