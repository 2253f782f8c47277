//! Index manifest and status-file persistence.
//!
//! A built index directory carries two small JSON sidecars alongside the ANN
//! index and the chunk/metadata arrays: `manifest.json` describes what was
//! built, and `status.json` is written last so that loaders can distinguish a
//! complete build from one interrupted midway.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::error::{IndexError, Result};
use crate::index::IndexKind;

/// Provenance summary for a built index, written once at build completion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    /// Unix timestamp (seconds) at which the build completed.
    pub creation_date: u64,
    /// Name of the embedding model used to build this index.
    pub model_name: String,
    /// Dimension of every stored vector.
    pub embedding_dim: usize,
    /// Total number of chunks in the index.
    pub num_chunks: usize,
    /// Total number of source documents the chunks were derived from.
    pub num_documents: usize,
    /// Which [`VectorIndex`](crate::index::VectorIndex) backend built this index.
    pub index_type: IndexKind,
    /// Cluster count used by the IVF backend, if that's what built this index.
    #[serde(default)]
    pub nlist: Option<usize>,
    /// Clusters probed per query by the IVF backend, if that's what built this index.
    #[serde(default)]
    pub nprobe: Option<usize>,
}

impl Manifest {
    /// Seconds since the Unix epoch, used for `creation_date`.
    #[must_use]
    pub fn now() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }

    #[must_use]
    pub fn manifest_path(dir: &Path) -> PathBuf {
        dir.join("manifest.json")
    }

    #[must_use]
    pub fn status_path(dir: &Path) -> PathBuf {
        dir.join("status.json")
    }

    /// Writes `manifest.json` then `status.json`, in that order. A reader
    /// that finds `status.json` can trust `manifest.json` is present and
    /// well-formed; a build aborted before this point leaves neither file
    /// (or only `manifest.json`), and [`Manifest::load`] rejects both cases.
    ///
    /// # Errors
    /// Returns an error if the directory cannot be created or either file
    /// cannot be written.
    pub fn write(&self, dir: &Path) -> Result<()> {
        fs::create_dir_all(dir)?;

        let manifest_bytes =
            serde_json::to_vec_pretty(self).map_err(|e| IndexError::Serialization(e.to_string()))?;
        fs::write(Self::manifest_path(dir), manifest_bytes).map_err(|e| IndexError::Persistence {
            path: Self::manifest_path(dir),
            source: e,
        })?;

        let status = Status {
            status: BuildStatus::Complete,
            date: self.creation_date,
            info: self.clone(),
        };
        let status_bytes =
            serde_json::to_vec_pretty(&status).map_err(|e| IndexError::Serialization(e.to_string()))?;
        fs::write(Self::status_path(dir), status_bytes).map_err(|e| IndexError::Persistence {
            path: Self::status_path(dir),
            source: e,
        })?;

        Ok(())
    }

    /// Loads and validates a manifest. Fails with
    /// [`IndexError::MissingArtifact`] if `status.json` or `manifest.json`
    /// is absent, which is exactly the state a build leaves behind when it
    /// is interrupted before completion.
    ///
    /// # Errors
    /// Returns an error if either sidecar is missing or malformed.
    pub fn load(dir: &Path) -> Result<Self> {
        let status_path = Self::status_path(dir);
        if !status_path.exists() {
            return Err(IndexError::MissingArtifact("status.json".into()));
        }

        let manifest_path = Self::manifest_path(dir);
        if !manifest_path.exists() {
            return Err(IndexError::MissingArtifact("manifest.json".into()));
        }

        let bytes = fs::read(&manifest_path).map_err(|e| IndexError::Persistence {
            path: manifest_path,
            source: e,
        })?;
        serde_json::from_slice(&bytes).map_err(|e| IndexError::Serialization(e.to_string()))
    }

    /// Validates that a caller-supplied model name and dimension match this
    /// manifest, per the Vector Store's `open` contract.
    ///
    /// # Errors
    /// Returns [`IndexError::ModelMismatch`] if the model name differs, or
    /// [`IndexError::DimensionMismatch`] if the dimension differs.
    pub fn validate(&self, model_name: &str, dimension: usize) -> Result<()> {
        if self.model_name != model_name {
            return Err(IndexError::ModelMismatch {
                expected: self.model_name.clone(),
                actual: model_name.to_string(),
            });
        }
        if self.embedding_dim != dimension {
            return Err(IndexError::DimensionMismatch {
                expected: self.embedding_dim,
                actual: dimension,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
enum BuildStatus {
    Complete,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Status {
    status: BuildStatus,
    date: u64,
    info: Manifest,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample() -> Manifest {
        Manifest {
            creation_date: 1_700_000_000,
            model_name: "bge-small-en-v1.5".into(),
            embedding_dim: 384,
            num_chunks: 42,
            num_documents: 7,
            index_type: IndexKind::Hnsw,
            nlist: None,
            nprobe: None,
        }
    }

    #[test]
    fn round_trips_through_disk() {
        let dir = tempdir().unwrap();
        sample().write(dir.path()).unwrap();

        let loaded = Manifest::load(dir.path()).unwrap();
        assert_eq!(loaded, sample());
    }

    #[test]
    fn missing_status_is_rejected() {
        let dir = tempdir().unwrap();
        fs::write(
            Manifest::manifest_path(dir.path()),
            serde_json::to_vec(&sample()).unwrap(),
        )
        .unwrap();

        let result = Manifest::load(dir.path());
        assert!(matches!(result, Err(IndexError::MissingArtifact(_))));
    }

    #[test]
    fn missing_directory_is_rejected() {
        let dir = tempdir().unwrap();
        let result = Manifest::load(dir.path());
        assert!(matches!(result, Err(IndexError::MissingArtifact(_))));
    }

    #[test]
    fn validate_catches_model_mismatch() {
        let manifest = sample();
        let result = manifest.validate("other-model", 384);
        assert!(matches!(result, Err(IndexError::ModelMismatch { .. })));
    }

    #[test]
    fn validate_catches_dimension_mismatch() {
        let manifest = sample();
        let result = manifest.validate("bge-small-en-v1.5", 768);
        assert!(matches!(result, Err(IndexError::DimensionMismatch { .. })));
    }

    #[test]
    fn validate_accepts_matching_model() {
        let manifest = sample();
        assert!(manifest.validate("bge-small-en-v1.5", 384).is_ok());
    }
}
