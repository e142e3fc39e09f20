//! Read-only views of the graph and the persisted document format.
//!
//! A [`Snapshot`] is what the renderer consumes after every mutation. A
//! [`GraphDocument`] is what gets saved: nodes and edges without handles,
//! which are re-derived from the text on load.

use crate::edge::Edge;
use crate::error::{GraphError, Result};
use crate::graph::CodeGraph;
use codeflow_core::{gutter_markers, GutterMarker, Handle, Node, NodeData, NodeKind, Position};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{info, warn};

/// Document format version written by this build.
pub const DOCUMENT_VERSION: &str = "1.0";

/// Kind-specific part of a [`NodeView`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum NodeViewData {
    Editor {
        #[serde(rename = "fileName")]
        file_name: String,
        value: String,
        handles: Vec<Handle>,
        markers: Vec<GutterMarker>,
        #[serde(rename = "staleHandles")]
        stale_handles: bool,
    },
    Group {
        label: String,
    },
    Settings {
        settings: BTreeMap<String, String>,
    },
    Preview {
        text: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeView {
    pub id: String,
    pub kind: NodeKind,
    pub position: Position,
    pub parent_id: Option<String>,
    pub hidden: bool,
    pub data: NodeViewData,
}

impl From<&Node> for NodeView {
    fn from(node: &Node) -> Self {
        let data = match &node.data {
            NodeData::Editor(editor) => NodeViewData::Editor {
                file_name: editor.file_name.clone(),
                value: editor.source_text.clone(),
                handles: editor.handles.clone(),
                markers: gutter_markers(&editor.handles),
                stale_handles: editor.stale_handles,
            },
            NodeData::Group(group) => NodeViewData::Group {
                label: group.label.clone(),
            },
            NodeData::Settings(settings) => NodeViewData::Settings {
                settings: settings.values.clone(),
            },
            NodeData::Preview(preview) => NodeViewData::Preview {
                text: preview.text.clone(),
            },
        };

        Self {
            id: node.id.clone(),
            kind: node.kind(),
            position: node.position,
            parent_id: node.parent_id.clone(),
            hidden: node.hidden,
            data,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeView {
    pub id: String,
    pub source: String,
    pub source_handle: String,
    pub target: String,
    pub target_handle: String,
    /// Set when either endpoint node is hidden.
    pub hidden: bool,
}

/// The full graph state after one revision.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    pub revision: u64,
    pub nodes: Vec<NodeView>,
    pub edges: Vec<EdgeView>,
}

/// Canvas pan and zoom, persisted with the document.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub x: f64,
    pub y: f64,
    pub zoom: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            zoom: 1.5,
        }
    }
}

/// The saved form of a graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphDocument {
    pub version: String,
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    pub viewport: Viewport,
}

impl GraphDocument {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

/// A copy of `node` holding only what gets saved.
fn persisted(node: &Node) -> Node {
    let mut node = node.clone();
    if let Some(editor) = node.as_editor_mut() {
        editor.handles.clear();
        editor.stale_handles = false;
    }
    node
}

/// Explains why none of `deferred` could be placed: walks up from the
/// first one until a parent is missing or an id repeats.
fn unresolved_parent(deferred: &[Node]) -> GraphError {
    let parents: HashMap<&str, Option<&str>> = deferred
        .iter()
        .map(|node| (node.id.as_str(), node.parent_id.as_deref()))
        .collect();

    let mut seen = HashSet::new();
    let mut current = deferred.first().map(|node| node.id.as_str());
    while let Some(id) = current {
        if !seen.insert(id) {
            return GraphError::ParentCycle(id.to_string());
        }
        match parents.get(id) {
            Some(Some(parent)) => current = Some(*parent),
            Some(None) => break,
            None => return GraphError::NodeNotFound(id.to_string()),
        }
    }
    GraphError::NodeNotFound(String::new())
}

impl CodeGraph {
    /// Captures the current state for rendering.
    pub fn snapshot(&self) -> Snapshot {
        let hidden: HashSet<&str> = self
            .nodes()
            .filter(|node| node.hidden)
            .map(|node| node.id.as_str())
            .collect();

        Snapshot {
            revision: self.revision(),
            nodes: self.nodes().map(NodeView::from).collect(),
            edges: self
                .edges()
                .map(|edge| EdgeView {
                    id: edge.id.clone(),
                    source: edge.source.clone(),
                    source_handle: edge.source_handle.clone(),
                    target: edge.target.clone(),
                    target_handle: edge.target_handle.clone(),
                    hidden: hidden.contains(edge.source.as_str())
                        || hidden.contains(edge.target.as_str()),
                })
                .collect(),
        }
    }

    /// Produces the saved form of the graph.
    pub fn to_document(&self, viewport: Viewport) -> GraphDocument {
        GraphDocument {
            version: DOCUMENT_VERSION.to_string(),
            nodes: self.nodes().map(persisted).collect(),
            edges: self.edges().cloned().collect(),
            viewport,
        }
    }

    /// Rebuilds a graph from a saved document.
    ///
    /// Nodes may appear in any order as long as every parent exists.
    /// Edges whose handles no longer come out of the text are dropped.
    pub fn from_document(document: GraphDocument) -> Result<Self> {
        let mut graph = CodeGraph::new()?;

        let mut pending = document.nodes;
        while !pending.is_empty() {
            let before = pending.len();
            let mut deferred = Vec::new();
            for node in pending {
                let ready = node
                    .parent_id
                    .as_deref()
                    .map_or(true, |parent| graph.contains(parent));
                if ready {
                    graph.add_node(node)?;
                } else {
                    deferred.push(node);
                }
            }

            if deferred.len() == before {
                return Err(unresolved_parent(&deferred));
            }
            pending = deferred;
        }

        let mut dropped = 0;
        for edge in document.edges {
            let id = edge.id.clone();
            if let Err(e) = graph.add_edge(edge) {
                warn!(edge = %id, "dropping saved edge: {}", e);
                dropped += 1;
            }
        }

        info!(
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            dropped,
            "loaded graph document"
        );
        Ok(graph)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> CodeGraph {
        let mut graph = CodeGraph::new().unwrap();
        graph
            .add_node(Node::group("g", "lib").at(Position::new(10.0, 10.0)))
            .unwrap();
        graph
            .add_node(Node::editor("1", "./a.js", "export function foo() {}\n").with_parent("g"))
            .unwrap();
        graph
            .add_node(Node::editor("2", "./b.js", "import { foo } from './a.js';\n"))
            .unwrap();
        graph
            .add_edge(Edge::new("e1", "1", "1:function:foo", "2", "2:plain_import:foo"))
            .unwrap();
        graph
    }

    #[test]
    fn test_snapshot_shape() {
        let mut graph = sample();
        graph.set_hidden("2", true).unwrap();
        let snapshot = graph.snapshot();

        assert_eq!(snapshot.revision, graph.revision());
        assert_eq!(snapshot.nodes.len(), 3);
        assert_eq!(snapshot.nodes[0].id, "g");
        assert!(snapshot.edges[0].hidden);

        let json = serde_json::to_value(&snapshot).unwrap();
        let editor = &json["nodes"][1];
        assert_eq!(editor["parentId"], "g");
        assert_eq!(editor["data"]["fileName"], "./a.js");
        assert_eq!(editor["data"]["handles"][0]["id"], "1:function:foo");
        assert_eq!(editor["data"]["handles"][0]["handleType"], "function");
        assert_eq!(editor["data"]["handles"][0]["sourceRange"]["startLine"], 1);
        assert_eq!(editor["data"]["markers"][0]["handleId"], "1:function:foo");
        assert_eq!(json["edges"][0]["sourceHandle"], "1:function:foo");
    }

    #[test]
    fn test_document_round_trip() {
        let graph = sample();
        let json = graph.to_document(Viewport::default()).to_json().unwrap();

        let document = GraphDocument::from_json(&json).unwrap();
        assert_eq!(document.viewport.zoom, 1.5);

        let restored = CodeGraph::from_document(document).unwrap();
        assert_eq!(restored.node_count(), 3);
        assert_eq!(restored.edge_count(), 1);
        assert_eq!(
            restored.get("1").unwrap().handles()[0].id,
            "1:function:foo"
        );
        restored.check_invariants().unwrap();
    }

    #[test]
    fn test_children_before_parents_in_document() {
        let mut document = sample().to_document(Viewport::default());
        document.nodes.reverse();

        let restored = CodeGraph::from_document(document).unwrap();
        let ids: Vec<&str> = restored.nodes().map(|n| n.id.as_str()).collect();
        assert_eq!(ids.iter().position(|&id| id == "g"), Some(1));
        restored.check_invariants().unwrap();
    }

    #[test]
    fn test_missing_parent_rejected() {
        let document = GraphDocument {
            version: DOCUMENT_VERSION.to_string(),
            nodes: vec![Node::editor("1", "./a.js", "").with_parent("ghost")],
            edges: Vec::new(),
            viewport: Viewport::default(),
        };
        let result = CodeGraph::from_document(document);
        assert!(matches!(result, Err(GraphError::NodeNotFound(id)) if id == "ghost"));
    }

    #[test]
    fn test_parent_loop_rejected() {
        let document = GraphDocument {
            version: DOCUMENT_VERSION.to_string(),
            nodes: vec![
                Node::group("a", "a").with_parent("b"),
                Node::group("b", "b").with_parent("a"),
            ],
            edges: Vec::new(),
            viewport: Viewport::default(),
        };
        let result = CodeGraph::from_document(document);
        assert!(matches!(result, Err(GraphError::ParentCycle(_))));
    }

    #[test]
    fn test_missing_ancestor_reported() {
        let document = GraphDocument {
            version: DOCUMENT_VERSION.to_string(),
            nodes: vec![
                Node::group("a", "a").with_parent("b"),
                Node::group("b", "b").with_parent("ghost"),
            ],
            edges: Vec::new(),
            viewport: Viewport::default(),
        };
        let result = CodeGraph::from_document(document);
        assert!(matches!(result, Err(GraphError::NodeNotFound(id)) if id == "ghost"));
    }

    #[test]
    fn test_stale_edges_dropped_on_load() {
        let mut document = sample().to_document(Viewport::default());
        document.edges.push(Edge::new(
            "ghost",
            "1",
            "1:function:gone",
            "2",
            "2:plain_import:foo",
        ));

        let restored = CodeGraph::from_document(document).unwrap();
        assert_eq!(restored.edge_count(), 1);
        assert!(restored.edge("ghost").is_none());
    }
}
