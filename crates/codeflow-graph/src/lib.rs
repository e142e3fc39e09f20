//! Codeflow Graph - the live node/edge graph
//!
//! This crate owns the graph of editor, group, settings and preview nodes
//! and the edges between their handles. It keeps edges consistent as text
//! changes and turns canvas gestures into text surgery.
//!
//! # Architecture
//!
//! The graph uses petgraph internally with additional indexes for:
//! - Node id lookups
//! - Edge id lookups
//! - Parent-before-child ordering
//!
//! # Example
//!
//! ```no_run
//! use codeflow_core::Node;
//! use codeflow_graph::CodeGraph;
//!
//! let mut graph = CodeGraph::new().unwrap();
//! graph.add_node(Node::editor("1", "./a.js", "export function foo() {}\n")).unwrap();
//! graph.add_node(Node::editor("2", "./b.js", "import { foo } from './a.js';\n")).unwrap();
//! graph.connect("1", "1:function:foo", "2", "2:plain_import:foo").unwrap();
//!
//! // Renaming the function drops the edge.
//! graph.update_node_text("1", "export function bar() {}\n").unwrap();
//! assert_eq!(graph.edge_count(), 0);
//! ```

mod edge;
mod error;
mod gestures;
mod graph;
mod membership;
mod reconcile;
mod snapshot;
mod store;

pub use edge::Edge;
pub use error::{GraphError, Result};
pub use gestures::{DropOutcome, DropTarget};
pub use graph::{CodeGraph, GraphStats};
pub use membership::{resolve_membership, GroupFrame, Membership};
pub use reconcile::{reconcile_edges, reconcile_edges_after, LineEdit};
pub use snapshot::{
    EdgeView, GraphDocument, NodeView, NodeViewData, Snapshot, Viewport, DOCUMENT_VERSION,
};
pub use store::{DocumentStore, StoreError};
