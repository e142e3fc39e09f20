//! Asynchronous file loading.
//!
//! File ids are paths relative to the project root, the same strings the
//! folder tree hands out. Loading never blocks the caller's task.

use crate::error::{LoadError, Result};
use std::path::{Component, Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct FileLoader {
    root: PathBuf,
}

impl FileLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Maps a file id to a path under the root.
    pub fn resolve(&self, file_id: &str) -> Result<PathBuf> {
        let relative = Path::new(file_id);
        let escapes = relative.components().any(|component| {
            matches!(
                component,
                Component::ParentDir | Component::RootDir | Component::Prefix(_)
            )
        });
        if escapes {
            return Err(LoadError::OutsideRoot(file_id.to_string()));
        }
        Ok(self.root.join(relative))
    }

    /// Reads a file's text.
    pub async fn load(&self, file_id: &str) -> Result<String> {
        let path = self.resolve(file_id)?;
        let text = tokio::fs::read_to_string(&path)
            .await
            .map_err(|source| LoadError::Io {
                path: path.clone(),
                source,
            })?;
        debug!(file = file_id, bytes = text.len(), "loaded file");
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_load_relative_file() {
        let dir = tempdir().unwrap();
        std::fs::create_dir(dir.path().join("src")).unwrap();
        std::fs::write(dir.path().join("src/a.js"), "export const a = 1;\n").unwrap();

        let loader = FileLoader::new(dir.path());
        let text = loader.load("src/a.js").await.unwrap();
        assert_eq!(text, "export const a = 1;\n");
    }

    #[tokio::test]
    async fn test_missing_file_is_io_error() {
        let dir = tempdir().unwrap();
        let loader = FileLoader::new(dir.path());

        let result = loader.load("nope.js").await;
        assert!(matches!(result, Err(LoadError::Io { .. })));
    }

    #[test]
    fn test_rejects_escaping_ids() {
        let loader = FileLoader::new("/project");
        assert!(matches!(
            loader.resolve("../secret.js"),
            Err(LoadError::OutsideRoot(_))
        ));
        assert!(matches!(
            loader.resolve("/etc/passwd"),
            Err(LoadError::OutsideRoot(_))
        ));
        assert_eq!(
            loader.resolve("lib/b.ts").unwrap(),
            PathBuf::from("/project/lib/b.ts")
        );
    }
}
