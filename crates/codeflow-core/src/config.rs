//! Project configuration.
//!
//! Looked up in `.codeflow/config.json` under the project root, then in the
//! user's config directory, and otherwise defaulted.

use crate::error::{CoreError, Result};
use crate::node::Position;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Directory holding project-local state.
pub const PROJECT_DIR: &str = ".codeflow";

const CONFIG_FILE: &str = "config.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub version: String,
    /// Editor line height in canvas units, used to turn a drop point into
    /// a line number.
    pub line_height: f64,
    /// Where nodes for freshly loaded files are placed.
    pub load_position: Position,
    /// File extensions shown in the folder tree.
    pub extensions: Vec<String>,
    /// Directory names skipped while scanning.
    pub ignore: Vec<String>,
    /// Buffered snapshots per session subscriber.
    pub snapshot_channel_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: "1.0".into(),
            line_height: 16.0,
            load_position: Position::new(500.0, 500.0),
            extensions: vec![
                "js".into(),
                "jsx".into(),
                "ts".into(),
                "tsx".into(),
                "mjs".into(),
                "cjs".into(),
            ],
            ignore: vec![
                "node_modules".into(),
                "dist".into(),
                "build".into(),
                "target".into(),
            ],
            snapshot_channel_capacity: 256,
        }
    }
}

impl Config {
    /// Path of the project-local config file.
    pub fn project_path(root: &Path) -> PathBuf {
        root.join(PROJECT_DIR).join(CONFIG_FILE)
    }

    /// Path of the per-user config file, if the platform has one.
    pub fn user_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("codeflow").join(CONFIG_FILE))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).map_err(|e| CoreError::io(path, e))?;
        serde_json::from_str(&raw).map_err(|source| CoreError::Config {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Finds the effective config for a project.
    pub fn discover(root: &Path) -> Result<Self> {
        let candidates = std::iter::once(Self::project_path(root)).chain(Self::user_path());
        for path in candidates {
            if path.is_file() {
                debug!("Using config {}", path.display());
                return Self::load(&path);
            }
        }
        Ok(Self::default())
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| CoreError::io(parent, e))?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|source| CoreError::Config {
            path: path.to_path_buf(),
            source,
        })?;
        fs::write(path, json).map_err(|e| CoreError::io(path, e))
    }

    pub fn matches_extension(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| self.extensions.iter().any(|known| known == ext))
            .unwrap_or(false)
    }

    pub fn is_ignored(&self, name: &str) -> bool {
        self.ignore.iter().any(|ignored| ignored == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let path = Config::project_path(dir.path());

        let mut config = Config::default();
        config.line_height = 18.0;
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "line_height": 20.0 }"#).unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.line_height, 20.0);
        assert_eq!(config.extensions, Config::default().extensions);
    }

    #[test]
    fn test_discover_prefers_project_file() {
        let dir = tempdir().unwrap();
        let mut config = Config::default();
        config.snapshot_channel_capacity = 8;
        config.save(&Config::project_path(dir.path())).unwrap();

        let found = Config::discover(dir.path()).unwrap();
        assert_eq!(found.snapshot_channel_capacity, 8);
    }

    #[test]
    fn test_invalid_json_is_reported() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();

        assert!(matches!(Config::load(&path), Err(CoreError::Config { .. })));
    }

    #[test]
    fn test_extension_filter() {
        let config = Config::default();
        assert!(config.matches_extension(Path::new("src/app.tsx")));
        assert!(!config.matches_extension(Path::new("README.md")));
        assert!(!config.matches_extension(Path::new("Makefile")));
    }
}
