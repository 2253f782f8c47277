//! Process-wide configuration, loaded once and threaded through the shell.
//!
//! Grounded on `original_source/loki_config.py`'s `LokiConfig`: a JSON file
//! under a well-known directory, recursively merged with defaults on load
//! and rewritten on every save. Reimplemented as a typed [`CoreConfig`]
//! rather than a dotted-key `Any` map, since every key and its type are
//! known at compile time here; "recursive merge" falls out of `#[serde(default)]`
//! on each nested section, so a config file missing a whole section (or a
//! single key within one) still loads with the rest defaulted.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while loading or saving [`CoreContext`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file or its parent directory could not be read/written.
    #[error("config I/O error at {path}: {source}")]
    Io {
        /// Path that failed.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The config file exists but is not valid JSON.
    #[error("malformed config at {path}: {source}")]
    Malformed {
        /// Path that failed to parse.
        path: PathBuf,
        /// Underlying parse error.
        #[source]
        source: serde_json::Error,
    },
}

/// Filesystem locations the engine reads and writes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Directory holding the on-disk vector index (§6 "On-disk index directory").
    pub vector_db_dir: PathBuf,
    /// Root directory of source documents, searched by the Source Resolver.
    pub database_dir: PathBuf,
    /// Directory scanned for `.gguf` model files.
    pub models_dir: PathBuf,
    /// Directory for log files, when file logging is enabled.
    pub logs_dir: PathBuf,
    /// Directory holding per-document shard JSON files, written during
    /// indexing so a crash can resume without re-extracting already
    /// processed documents.
    pub shards_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            vector_db_dir: PathBuf::from("./quarry/vector_db"),
            database_dir: PathBuf::from("./quarry/database"),
            models_dir: PathBuf::from("./quarry/models"),
            logs_dir: PathBuf::from("./quarry/logs"),
            shards_dir: PathBuf::from("./quarry/shards"),
        }
    }
}

/// Generator Driver defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Context window size, in tokens.
    pub context_size: u32,
    /// Sampling temperature.
    pub temperature: f32,
    /// Maximum tokens generated per answer.
    pub max_tokens: usize,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self { context_size: 8192, temperature: 0.7, max_tokens: 2048 }
    }
}

/// Retriever defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Default number of results returned by `retrieve`.
    pub max_results: usize,
    /// Minimum cosine similarity a result must clear.
    pub min_similarity: f32,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self { max_results: 5, min_similarity: 0.0 }
    }
}

/// Emergency-stop configuration, consumed by `quarry-supervisor`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmergencyConfig {
    /// Case-sensitive word that cancels the active handle.
    pub stop_command_word: String,
}

impl Default for EmergencyConfig {
    fn default() -> Self {
        Self { stop_command_word: quarry_supervisor::EMERGENCY_STOP_WORD.to_string() }
    }
}

/// Indexing-stage defaults, consumed by `quarry-pdf` and `quarry-index`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexingConfig {
    /// Maximum characters per chunk.
    pub chunk_size: usize,
    /// Trailing-overlap length carried between chunks.
    pub chunk_overlap: usize,
    /// Pages with fewer extracted characters than this fall back to OCR.
    pub min_chars_per_page: usize,
    /// Hard cap on pages processed per document.
    pub max_pages: usize,
    /// DPI used when rasterising a page for OCR.
    pub ocr_dpi: u32,
    /// Number of pages rasterised per OCR batch.
    pub ocr_batch_pages: usize,
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 2000,
            chunk_overlap: 200,
            min_chars_per_page: 50,
            max_pages: 2000,
            ocr_dpi: 200,
            ocr_batch_pages: 20,
        }
    }
}

/// Full process-wide configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// See [`PathsConfig`].
    pub paths: PathsConfig,
    /// See [`LlmConfig`].
    pub llm: LlmConfig,
    /// See [`SearchConfig`].
    pub search: SearchConfig,
    /// See [`EmergencyConfig`].
    pub emergency: EmergencyConfig,
    /// See [`IndexingConfig`].
    pub indexing: IndexingConfig,
}

impl CoreConfig {
    /// Creates a builder seeded with default values.
    #[must_use]
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }
}

/// Fluent builder for [`CoreConfig`], mirroring
/// `quarry_index::RagConfigBuilder`'s style.
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config: CoreConfig,
}

impl ConfigBuilder {
    /// Creates a new builder with default values.
    #[must_use]
    pub fn new() -> Self {
        Self { config: CoreConfig::default() }
    }

    /// Sets the vector index directory.
    #[must_use]
    pub fn vector_db_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.paths.vector_db_dir = dir.into();
        self
    }

    /// Sets the source document root.
    #[must_use]
    pub fn database_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.paths.database_dir = dir.into();
        self
    }

    /// Sets the models directory.
    #[must_use]
    pub fn models_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.paths.models_dir = dir.into();
        self
    }

    /// Sets the generation temperature.
    #[must_use]
    pub const fn temperature(mut self, temperature: f32) -> Self {
        self.config.llm.temperature = temperature;
        self
    }

    /// Sets the maximum number of generated tokens per answer.
    #[must_use]
    pub const fn max_tokens(mut self, max_tokens: usize) -> Self {
        self.config.llm.max_tokens = max_tokens;
        self
    }

    /// Sets the default number of retrieved results.
    #[must_use]
    pub const fn max_results(mut self, max_results: usize) -> Self {
        self.config.search.max_results = max_results;
        self
    }

    /// Sets the minimum similarity threshold for retrieval.
    #[must_use]
    pub const fn min_similarity(mut self, min_similarity: f32) -> Self {
        self.config.search.min_similarity = min_similarity;
        self
    }

    /// Builds the configuration without loading or saving anything.
    #[must_use]
    pub fn build(self) -> CoreConfig {
        self.config
    }
}

/// Loaded, file-backed configuration, owned by the CLI shell and handed to
/// workers by value or shared reference — not a module-level singleton
/// (the prototype's `_config_instance`/`get_config()`).
#[derive(Debug, Clone)]
pub struct CoreContext {
    config: CoreConfig,
    path: PathBuf,
}

impl CoreContext {
    /// Loads configuration from `path`, merging it over [`CoreConfig::default`].
    /// Creates the file with default values if it doesn't exist yet.
    ///
    /// # Errors
    /// Returns [`ConfigError`] if the file exists but can't be read/parsed,
    /// or if creating the default file fails.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        Self::load_with_defaults(path, CoreConfig::default())
    }

    /// Like [`CoreContext::load`], but merges the on-disk file over a
    /// caller-supplied default instead of [`CoreConfig::default`].
    ///
    /// # Errors
    /// Returns [`ConfigError`] if the file exists but can't be read/parsed,
    /// or if creating the default file fails.
    pub fn load_with_defaults(
        path: impl Into<PathBuf>,
        defaults: CoreConfig,
    ) -> Result<Self, ConfigError> {
        let path = path.into();

        if !path.exists() {
            let ctx = Self { config: defaults, path };
            ctx.save()?;
            return Ok(ctx);
        }

        let text = fs::read_to_string(&path)
            .map_err(|source| ConfigError::Io { path: path.clone(), source })?;
        let config: CoreConfig = serde_json::from_str(&text)
            .map_err(|source| ConfigError::Malformed { path: path.clone(), source })?;

        Ok(Self { config, path })
    }

    /// Returns the loaded configuration.
    #[must_use]
    pub const fn config(&self) -> &CoreConfig {
        &self.config
    }

    /// Returns a mutable reference to the configuration, for programmatic
    /// updates that should be persisted with a subsequent [`CoreContext::save`].
    pub fn config_mut(&mut self) -> &mut CoreConfig {
        &mut self.config
    }

    /// Path to the backing config file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rewrites the config file as pretty-printed JSON.
    ///
    /// # Errors
    /// Returns [`ConfigError`] if the parent directory can't be created or
    /// the file can't be written.
    pub fn save(&self) -> Result<(), ConfigError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .map_err(|source| ConfigError::Io { path: parent.to_path_buf(), source })?;
        }

        let file = fs::File::create(&self.path)
            .map_err(|source| ConfigError::Io { path: self.path.clone(), source })?;
        serde_json::to_writer_pretty(file, &self.config)
            .map_err(|source| ConfigError::Malformed { path: self.path.clone(), source })?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn load_creates_default_file_on_first_run() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");

        let ctx = CoreContext::load(&path).unwrap();
        assert!(path.is_file());
        assert_eq!(ctx.config().llm.temperature, 0.7);
        assert_eq!(ctx.config().emergency.stop_command_word, "STOP");
    }

    #[test]
    fn missing_keys_fall_back_to_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"llm": {"temperature": 0.2}}"#).unwrap();

        let ctx = CoreContext::load(&path).unwrap();
        assert_eq!(ctx.config().llm.temperature, 0.2);
        assert_eq!(ctx.config().llm.max_tokens, 2048);
        assert_eq!(ctx.config().search.max_results, 5);
    }

    #[test]
    fn save_round_trips_programmatic_changes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");

        let mut ctx = CoreContext::load(&path).unwrap();
        ctx.config_mut().search.max_results = 10;
        ctx.save().unwrap();

        let reloaded = CoreContext::load(&path).unwrap();
        assert_eq!(reloaded.config().search.max_results, 10);
    }

    #[test]
    fn builder_overrides_selected_fields() {
        let config = CoreConfig::builder().temperature(0.1).max_results(3).build();
        assert_eq!(config.llm.temperature, 0.1);
        assert_eq!(config.search.max_results, 3);
        assert_eq!(config.llm.max_tokens, 2048);
    }

    #[test]
    fn malformed_file_is_reported() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "not json").unwrap();

        let err = CoreContext::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Malformed { .. }));
    }
}
