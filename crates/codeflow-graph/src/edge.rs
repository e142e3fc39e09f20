//! Edges between handles.
//!
//! An edge always joins one handle on one node to one handle on another
//! (or the same) node. The graph guarantees both handles exist for as long
//! as the edge does.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub id: String,
    /// Node owning the source handle.
    pub source: String,
    pub source_handle: String,
    /// Node owning the target handle.
    pub target: String,
    pub target_handle: String,
}

impl Edge {
    /// Creates an edge with an explicit id.
    pub fn new(
        id: impl Into<String>,
        source: impl Into<String>,
        source_handle: impl Into<String>,
        target: impl Into<String>,
        target_handle: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            source_handle: source_handle.into(),
            target: target.into(),
            target_handle: target_handle.into(),
        }
    }

    /// Creates an edge with a fresh random id.
    pub fn connect(
        source: impl Into<String>,
        source_handle: impl Into<String>,
        target: impl Into<String>,
        target_handle: impl Into<String>,
    ) -> Self {
        Self::new(
            Uuid::new_v4().to_string(),
            source,
            source_handle,
            target,
            target_handle,
        )
    }

    /// Whether either end sits on `node_id`.
    pub fn touches(&self, node_id: &str) -> bool {
        self.source == node_id || self.target == node_id
    }

    /// Whether either end is the given handle.
    pub fn references(&self, node_id: &str, handle_id: &str) -> bool {
        (self.source == node_id && self.source_handle == handle_id)
            || (self.target == node_id && self.target_handle == handle_id)
    }

    /// Whether both edges join the same pair of handles.
    pub fn same_endpoints(&self, other: &Edge) -> bool {
        self.source == other.source
            && self.source_handle == other.source_handle
            && self.target == other.target
            && self.target_handle == other.target_handle
    }
}
