//! Source Resolver: turns a `(category, filename)` citation emitted by the
//! generator back into an absolute path under a document root.

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Prefix the resolver strips/adds when probing the second resolution step,
/// confirmed by the prototype's category display code
/// (`category.replace("library-", "")`).
const LIBRARY_PREFIX: &str = "library-";

/// Errors raised while resolving a citation to a path.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// None of the three resolution steps found a matching file.
    #[error("no source file found for category {category:?}, filename {filename:?} under {root}")]
    NotFound {
        /// Document root that was searched.
        root: PathBuf,
        /// Category requested.
        category: String,
        /// Filename requested.
        filename: String,
    },
    /// Opening the resolved path with the OS default handler failed.
    #[cfg(feature = "open-in-os")]
    #[error("failed to open {path} with the OS default handler: {source}")]
    Open {
        /// Path that failed to open.
        path: PathBuf,
        /// Underlying error from the `open` crate.
        #[source]
        source: std::io::Error,
    },
}

/// Resolves `(category, filename)` citations to absolute paths under `root`.
#[derive(Debug, Clone)]
pub struct SourceResolver {
    root: PathBuf,
}

impl SourceResolver {
    /// Creates a resolver rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolves a citation to an absolute path.
    ///
    /// Resolution order: `root/category/filename`, then
    /// `root/"library-"+category/filename`, then a recursive descent of
    /// `root` looking for a file named `filename`.
    ///
    /// # Errors
    /// Returns [`ResolveError::NotFound`] if all three steps miss.
    pub fn resolve(&self, category: &str, filename: &str) -> Result<PathBuf, ResolveError> {
        let direct = self.root.join(category).join(filename);
        if direct.is_file() {
            return Ok(direct);
        }

        let prefixed = self.root.join(format!("{LIBRARY_PREFIX}{category}")).join(filename);
        if prefixed.is_file() {
            return Ok(prefixed);
        }

        if let Some(found) = find_by_name(&self.root, filename) {
            return Ok(found);
        }

        Err(ResolveError::NotFound {
            root: self.root.clone(),
            category: category.to_string(),
            filename: filename.to_string(),
        })
    }

    /// Resolves a citation, then opens it with the OS default handler.
    ///
    /// # Errors
    /// Returns [`ResolveError::NotFound`] if resolution fails, or
    /// [`ResolveError::Open`] if the OS could not open the resolved path.
    #[cfg(feature = "open-in-os")]
    pub fn resolve_and_open(&self, category: &str, filename: &str) -> Result<PathBuf, ResolveError> {
        let path = self.resolve(category, filename)?;
        open::that(&path).map_err(|source| ResolveError::Open { path: path.clone(), source })?;
        Ok(path)
    }
}

/// Strips a leading `library-` prefix from a category for display, mirroring
/// the prototype's `category.replace("library-", "")`.
#[must_use]
pub fn display_category(category: &str) -> &str {
    category.strip_prefix(LIBRARY_PREFIX).unwrap_or(category)
}

fn find_by_name(root: &Path, filename: &str) -> Option<PathBuf> {
    let mut stack = vec![root.to_path_buf()];

    while let Some(dir) = stack.pop() {
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(_) => continue,
        };

        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                stack.push(path);
            } else if path.file_name().and_then(|name| name.to_str()) == Some(filename) {
                return Some(path);
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn resolves_direct_category_path() {
        let dir = tempdir().unwrap();
        std::fs::create_dir(dir.path().join("manuals")).unwrap();
        std::fs::write(dir.path().join("manuals/guide.pdf"), b"pdf").unwrap();

        let resolver = SourceResolver::new(dir.path());
        let resolved = resolver.resolve("manuals", "guide.pdf").unwrap();
        assert_eq!(resolved, dir.path().join("manuals/guide.pdf"));
    }

    #[test]
    fn resolves_library_prefixed_category() {
        let dir = tempdir().unwrap();
        std::fs::create_dir(dir.path().join("library-manuals")).unwrap();
        std::fs::write(dir.path().join("library-manuals/guide.pdf"), b"pdf").unwrap();

        let resolver = SourceResolver::new(dir.path());
        let resolved = resolver.resolve("manuals", "guide.pdf").unwrap();
        assert_eq!(resolved, dir.path().join("library-manuals/guide.pdf"));
    }

    #[test]
    fn falls_back_to_recursive_descent() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("misc/nested");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(nested.join("guide.pdf"), b"pdf").unwrap();

        let resolver = SourceResolver::new(dir.path());
        let resolved = resolver.resolve("manuals", "guide.pdf").unwrap();
        assert_eq!(resolved, nested.join("guide.pdf"));
    }

    #[test]
    fn reports_not_found_when_all_steps_miss() {
        let dir = tempdir().unwrap();
        let resolver = SourceResolver::new(dir.path());
        let err = resolver.resolve("manuals", "missing.pdf").unwrap_err();
        assert!(matches!(err, ResolveError::NotFound { .. }));
    }

    #[test]
    fn display_category_strips_library_prefix() {
        assert_eq!(display_category("library-manuals"), "manuals");
        assert_eq!(display_category("manuals"), "manuals");
    }
}
