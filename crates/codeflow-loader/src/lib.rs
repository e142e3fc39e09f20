//! Codeflow Loader - files in, text out
//!
//! Scans a project folder into the flat index the tree widget renders and
//! loads file text asynchronously for editor nodes.

mod error;
mod folder;
mod loader;

pub use error::{LoadError, Result};
pub use folder::{FolderTree, TreeItem, ROOT_KEY};
pub use loader::FileLoader;
