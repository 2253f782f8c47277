use crate::error::GeneratorError;
use std::path::{Path, PathBuf};

/// One GGUF model file discovered under a models directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelEntry {
    /// File name, including the `.gguf` extension.
    pub name: String,
    /// Absolute path to the model file.
    pub path: PathBuf,
}

/// Lists the `.gguf` files directly under `models_dir`.
///
/// Grounded on the teacher's model-provider `list_models()` directory scan:
/// `read_dir` plus an extension filter, generalized here into a free
/// function since the Generator Driver has no provider-registry trait to
/// implement — callers resolve a model name to a path and pass it to
/// [`crate::Llama::from_file`] directly.
///
/// # Errors
/// Returns [`GeneratorError::ModelDirectory`] if `models_dir` cannot be read.
pub fn list_models(models_dir: impl AsRef<Path>) -> Result<Vec<ModelEntry>, GeneratorError> {
    let models_dir = models_dir.as_ref();
    let entries = std::fs::read_dir(models_dir)
        .map_err(|err| GeneratorError::ModelDirectory(err.to_string()))?;

    let mut models = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|err| GeneratorError::ModelDirectory(err.to_string()))?;
        let path = entry.path();
        if path.extension().and_then(|s| s.to_str()) != Some("gguf") {
            continue;
        }
        let Some(name) = path.file_name().and_then(|s| s.to_str()) else {
            continue;
        };
        models.push(ModelEntry {
            name: name.to_string(),
            path: path.clone(),
        });
    }

    models.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(models)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn lists_only_gguf_files() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("model-a.gguf"), b"").unwrap();
        std::fs::write(dir.path().join("model-b.gguf"), b"").unwrap();
        std::fs::write(dir.path().join("readme.txt"), b"").unwrap();

        let models = list_models(dir.path()).unwrap();
        assert_eq!(models.len(), 2);
        assert_eq!(models[0].name, "model-a.gguf");
        assert_eq!(models[1].name, "model-b.gguf");
    }

    #[test]
    fn missing_directory_is_an_error() {
        let result = list_models("/nonexistent/path/for/models");
        assert!(result.is_err());
    }
}
