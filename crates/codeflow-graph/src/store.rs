//! Persistent storage for graph documents.
//!
//! The document is serialized with bincode into an embedded sled tree.
//! Handles are not stored; they come back from the text on load.

use crate::snapshot::GraphDocument;
use sled::Db;
use std::path::Path;
use thiserror::Error;

const DOCUMENT_KEY: &str = "document";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Sled(#[from] sled::Error),
    #[error("Serialization error: {0}")]
    Bincode(#[from] bincode::Error),
}

pub struct DocumentStore {
    db: Db,
}

impl DocumentStore {
    /// Opens or creates a document store at the specified path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let db = sled::open(path)?;
        Ok(Self { db })
    }

    /// Saves the document, replacing any previous one.
    pub fn save_document(&self, document: &GraphDocument) -> Result<(), StoreError> {
        let bytes = bincode::serialize(document)?;
        self.db.insert(DOCUMENT_KEY, bytes)?;
        self.db.flush()?;
        Ok(())
    }

    /// Loads the saved document, if there is one.
    pub fn load_document(&self) -> Result<Option<GraphDocument>, StoreError> {
        match self.db.get(DOCUMENT_KEY)? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Clears the stored document.
    pub fn clear(&self) -> Result<(), StoreError> {
        self.db.remove(DOCUMENT_KEY)?;
        self.db.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::CodeGraph;
    use crate::snapshot::Viewport;
    use codeflow_core::{Node, Position};
    use tempfile::tempdir;

    #[test]
    fn test_save_load_document() {
        let dir = tempdir().unwrap();
        let store = DocumentStore::open(dir.path()).unwrap();
        assert!(store.load_document().unwrap().is_none());

        let mut graph = CodeGraph::new().unwrap();
        graph
            .add_node(Node::group("g", "lib").at(Position::new(1.0, 2.0)))
            .unwrap();
        graph
            .add_node(Node::editor("1", "./a.js", "export const a = 1;\n").with_parent("g"))
            .unwrap();
        let document = graph.to_document(Viewport::default());

        store.save_document(&document).unwrap();
        let loaded = store.load_document().unwrap().unwrap();
        assert_eq!(loaded, document);

        let restored = CodeGraph::from_document(loaded).unwrap();
        assert_eq!(restored.get("1").unwrap().handles().len(), 1);
    }

    #[test]
    fn test_clear() {
        let dir = tempdir().unwrap();
        let store = DocumentStore::open(dir.path()).unwrap();
        let graph = CodeGraph::new().unwrap();

        store
            .save_document(&graph.to_document(Viewport::default()))
            .unwrap();
        store.clear().unwrap();
        assert!(store.load_document().unwrap().is_none());
    }
}
