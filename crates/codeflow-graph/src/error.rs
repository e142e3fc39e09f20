//! Error types for graph operations.
//!
//! Every variant describes an operation that was refused before anything
//! was mutated. `DanglingEdge`, `ParentCycle` and `ParentOutOfOrder` are
//! invariant violations and only come out of `check_invariants` or a
//! corrupt document.

use codeflow_core::{CoreError, HandleType, SurgeryError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GraphError {
    #[error("node not found: {0}")]
    NodeNotFound(String),

    #[error("node already exists: {0}")]
    DuplicateNode(String),

    #[error("node {0} is not an editor")]
    NotAnEditor(String),

    #[error("node {0} is not a group")]
    NotAGroup(String),

    #[error("node {0} is not a preview")]
    NotAPreview(String),

    #[error("handle {handle} not found on node {node}")]
    HandleNotFound { node: String, handle: String },

    #[error("handle {handle} of type {handle_type} cannot be used here")]
    UnsupportedHandle {
        handle: String,
        handle_type: HandleType,
    },

    #[error("handle {handle} appears twice on node {node}")]
    DuplicateHandle { node: String, handle: String },

    #[error("edge not found: {0}")]
    EdgeNotFound(String),

    #[error("duplicate edge: {0}")]
    DuplicateEdge(String),

    #[error("edge {edge} references missing handle {handle}")]
    DanglingEdge { edge: String, handle: String },

    #[error("parent chain of {0} forms a cycle")]
    ParentCycle(String),

    #[error("node {0} is ordered before its parent")]
    ParentOutOfOrder(String),

    #[error("handles of node {0} are stale until its text parses again")]
    StaleHandles(String),

    #[error("source and target are the same node: {0}")]
    SameNode(String),

    #[error("invalid line range: {0}")]
    Range(#[from] SurgeryError),

    #[error(transparent)]
    Core(#[from] CoreError),
}

pub type Result<T> = std::result::Result<T, GraphError>;
