//! Core graph data structure.
//!
//! `CodeGraph` is the single source of truth for nodes, handles and edges.
//! It wraps a petgraph `StableDiGraph` so indexes stay valid across
//! removals, and keeps string-id indexes next to it. Every mutation either
//! completes and leaves the invariants intact, or fails before touching
//! anything.

use crate::edge::Edge;
use crate::error::{GraphError, Result};
use crate::membership::{resolve_membership, GroupFrame, Membership};
use crate::reconcile::{reconcile_edges_after, LineEdit};
use codeflow_core::{
    check_range, selection_handle, Handle, HandleType, Node, NodeData, Position, SourceRange,
    SymbolExtractor,
};
use petgraph::stable_graph::{EdgeIndex, NodeIndex, StableDiGraph};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{debug, warn};

/// The live node/edge graph.
pub struct CodeGraph {
    graph: StableDiGraph<Node, Edge>,

    /// Maps node ids to graph indexes.
    id_index: HashMap<String, NodeIndex>,

    /// Maps edge ids to graph indexes.
    edge_index: HashMap<String, EdgeIndex>,

    /// Node order. A parent always comes before its children.
    order: Vec<NodeIndex>,

    extractor: SymbolExtractor,

    /// Bumped on every successful mutation.
    revision: u64,

    next_id: u64,
}

impl std::fmt::Debug for CodeGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CodeGraph")
            .field("nodes", &self.node_count())
            .field("edges", &self.edge_count())
            .field("revision", &self.revision)
            .finish_non_exhaustive()
    }
}

impl CodeGraph {
    /// Creates an empty graph.
    pub fn new() -> Result<Self> {
        Ok(Self {
            graph: StableDiGraph::new(),
            id_index: HashMap::new(),
            edge_index: HashMap::new(),
            order: Vec::new(),
            extractor: SymbolExtractor::new()?,
            revision: 0,
            next_id: 0,
        })
    }

    fn bump(&mut self) {
        self.revision += 1;
    }

    fn index_of(&self, id: &str) -> Result<NodeIndex> {
        self.id_index
            .get(id)
            .copied()
            .ok_or_else(|| GraphError::NodeNotFound(id.to_string()))
    }

    fn require_group(&self, id: &str) -> Result<NodeIndex> {
        let index = self.index_of(id)?;
        if !self.graph[index].is_group() {
            return Err(GraphError::NotAGroup(id.to_string()));
        }
        Ok(index)
    }

    fn require_editor(&self, id: &str) -> Result<NodeIndex> {
        let index = self.index_of(id)?;
        if self.graph[index].as_editor().is_none() {
            return Err(GraphError::NotAnEditor(id.to_string()));
        }
        Ok(index)
    }

    /// Looks up a handle, failing with `HandleNotFound`.
    pub fn require_handle(&self, node_id: &str, handle_id: &str) -> Result<&Handle> {
        let index = self.index_of(node_id)?;
        self.graph[index]
            .handle(handle_id)
            .ok_or_else(|| GraphError::HandleNotFound {
                node: node_id.to_string(),
                handle: handle_id.to_string(),
            })
    }

    // ----- nodes -----

    /// Inserts a node and derives its handles.
    ///
    /// A parent, if set, must already be present and be a group.
    pub fn add_node(&mut self, mut node: Node) -> Result<()> {
        if self.id_index.contains_key(&node.id) {
            return Err(GraphError::DuplicateNode(node.id));
        }
        if let Some(parent_id) = &node.parent_id {
            self.require_group(parent_id)?;
        }

        let node_id = node.id.clone();
        if let Some(editor) = node.as_editor_mut() {
            let extraction = self.extractor.extract(&node_id, &editor.source_text);
            editor.handles = extraction.handles;
            editor.stale_handles = false;
        }

        let index = self.graph.add_node(node);
        self.id_index.insert(node_id.clone(), index);
        self.order.push(index);
        self.bump();

        debug!(node = %node_id, "added node");
        Ok(())
    }

    /// Removes a node together with every edge touching it.
    ///
    /// Children of a removed group are detached in place, keeping their
    /// absolute position.
    pub fn remove_node(&mut self, id: &str) -> Result<Node> {
        let index = self.index_of(id)?;
        let origin = self.absolute_position(id).unwrap_or_default();

        let children: Vec<NodeIndex> = self
            .order
            .iter()
            .copied()
            .filter(|&child| self.graph[child].parent_id.as_deref() == Some(id))
            .collect();
        for child in children {
            let node = &mut self.graph[child];
            node.parent_id = None;
            node.position = node.position + origin;
        }

        let removed_edges = self.take_edges_of(index).len();
        let node = self
            .graph
            .remove_node(index)
            .ok_or_else(|| GraphError::NodeNotFound(id.to_string()))?;
        self.id_index.remove(id);
        self.order.retain(|&other| other != index);
        self.bump();

        debug!(node = id, edges = removed_edges, "removed node");
        Ok(node)
    }

    /// Replaces an editor's text, re-derives its handles and reconciles
    /// its edges.
    ///
    /// Text that fails to parse and would lose known symbols is stored,
    /// but the previous handles and edges are kept and flagged stale until
    /// the text parses again.
    pub fn update_node_text(&mut self, id: &str, text: impl Into<String>) -> Result<()> {
        self.update_text_after(id, text.into(), None)
    }

    /// [`update_node_text`](Self::update_node_text) for a change whose
    /// extent is known, so same-named declarations keep their own edges.
    pub(crate) fn update_text_after(
        &mut self,
        id: &str,
        text: String,
        edit: Option<LineEdit>,
    ) -> Result<()> {
        let index = self.require_editor(id)?;
        let extraction = self.extractor.extract(id, &text);

        let old = self.graph[index].handles();
        if !extraction.complete && loses_symbols(old, &extraction.handles) {
            warn!(node = id, "text has syntax errors, keeping previous handles");
            if let Some(editor) = self.graph[index].as_editor_mut() {
                editor.source_text = text;
                editor.stale_handles = true;
            }
            self.bump();
            return Ok(());
        }

        if let Some(editor) = self.graph[index].as_editor_mut() {
            editor.source_text = text;
            editor.stale_handles = false;
        }
        self.replace_handles(index, extraction.handles, edit);
        Ok(())
    }

    /// Sets or clears the selection handle of an editor.
    ///
    /// Re-selecting the same range keeps the selection's edges; clearing
    /// it drops them.
    pub fn set_selection(&mut self, id: &str, range: Option<SourceRange>) -> Result<()> {
        let index = self.require_editor(id)?;
        let node = &self.graph[index];
        if let (Some(range), Some(text)) = (range, node.source_text()) {
            check_range(text, range.start_line, range.end_line)?;
        }

        let mut handles: Vec<Handle> = node
            .handles()
            .iter()
            .filter(|handle| handle.handle_type != HandleType::Selection)
            .cloned()
            .collect();
        if let Some(range) = range {
            handles.push(selection_handle(id, range));
        }

        self.replace_handles(index, handles, None);
        Ok(())
    }

    /// Swaps in a new handle set and rewrites the node's edges to match.
    fn replace_handles(&mut self, index: NodeIndex, handles: Vec<Handle>, edit: Option<LineEdit>) {
        let node_id = self.graph[index].id.clone();
        let old = self.graph[index].handles().to_vec();
        let touching = self.take_edges_of(index);

        let reconciled = reconcile_edges_after(&node_id, edit, &old, &handles, touching);
        if let Some(editor) = self.graph[index].as_editor_mut() {
            editor.handles = handles;
        }
        for edge in reconciled {
            self.insert_edge(edge);
        }
        self.bump();
    }

    /// Sets the parent and position of a node.
    ///
    /// The parent must be a group and must not be the node or one of its
    /// descendants.
    pub fn set_parent(&mut self, id: &str, membership: Membership) -> Result<()> {
        let index = self.index_of(id)?;
        if let Some(parent_id) = &membership.parent_id {
            self.require_group(parent_id)?;
            if parent_id == id || self.is_descendant(parent_id, id) {
                return Err(GraphError::ParentCycle(id.to_string()));
            }
        }

        let node = &mut self.graph[index];
        node.parent_id = membership.parent_id;
        node.position = membership.position;
        self.place_after_parent(index);
        self.bump();
        Ok(())
    }

    /// Finishes a drag of `id` to `position`, given in the node's current
    /// frame.
    ///
    /// `candidate_groups` are the groups that geometrically contain the
    /// node. The node itself and its descendants are ignored.
    pub fn drop_node(
        &mut self,
        id: &str,
        position: Position,
        candidate_groups: &[String],
    ) -> Result<Membership> {
        let index = self.index_of(id)?;

        let mut frames = Vec::new();
        for group_id in candidate_groups {
            self.require_group(group_id)?;
            if group_id == id || self.is_descendant(group_id, id) {
                continue;
            }
            frames.push(GroupFrame::new(group_id.clone(), self.origin_of(group_id)?));
        }

        let mut dropped = self.graph[index].clone();
        dropped.position = position;
        let prior = match &dropped.parent_id {
            Some(parent_id) => Some(GroupFrame::new(parent_id.clone(), self.origin_of(parent_id)?)),
            None => None,
        };

        let membership = resolve_membership(&dropped, &frames, prior.as_ref());
        self.set_parent(id, membership.clone())?;
        Ok(membership)
    }

    /// Moves a node within its current frame.
    pub fn move_node(&mut self, id: &str, position: Position) -> Result<()> {
        let index = self.index_of(id)?;
        self.graph[index].position = position;
        self.bump();
        Ok(())
    }

    pub fn rename_node(&mut self, id: &str, file_name: impl Into<String>) -> Result<()> {
        let index = self.require_editor(id)?;
        if let Some(editor) = self.graph[index].as_editor_mut() {
            editor.file_name = file_name.into();
        }
        self.bump();
        Ok(())
    }

    pub fn set_hidden(&mut self, id: &str, hidden: bool) -> Result<()> {
        let index = self.index_of(id)?;
        self.graph[index].hidden = hidden;
        self.bump();
        Ok(())
    }

    /// Writes `values` into every settings node. Returns how many were
    /// updated.
    pub fn update_settings(&mut self, values: &BTreeMap<String, String>) -> usize {
        let mut updated = 0;
        for &index in &self.order {
            if let NodeData::Settings(settings) = &mut self.graph[index].data {
                settings.values.extend(values.iter().map(|(k, v)| (k.clone(), v.clone())));
                updated += 1;
            }
        }
        if updated > 0 {
            self.bump();
        }
        updated
    }

    pub fn set_preview_text(&mut self, id: &str, text: impl Into<String>) -> Result<()> {
        let index = self.index_of(id)?;
        match &mut self.graph[index].data {
            NodeData::Preview(preview) => preview.text = text.into(),
            _ => return Err(GraphError::NotAPreview(id.to_string())),
        }
        self.bump();
        Ok(())
    }

    /// Returns a node id not yet used in this graph.
    pub fn next_node_id(&mut self) -> String {
        loop {
            self.next_id += 1;
            let id = self.next_id.to_string();
            if !self.id_index.contains_key(&id) {
                return id;
            }
        }
    }

    // ----- edges -----

    /// Adds an edge after checking both handles exist.
    pub fn add_edge(&mut self, edge: Edge) -> Result<()> {
        if self.edge_index.contains_key(&edge.id) {
            return Err(GraphError::DuplicateEdge(edge.id));
        }
        self.require_handle(&edge.source, &edge.source_handle)?;
        self.require_handle(&edge.target, &edge.target_handle)?;
        if self.edges().any(|other| other.same_endpoints(&edge)) {
            return Err(GraphError::DuplicateEdge(edge.id));
        }

        debug!(edge = %edge.id, source = %edge.source_handle, target = %edge.target_handle, "added edge");
        self.insert_edge(edge);
        self.bump();
        Ok(())
    }

    /// Connects two handles with a freshly named edge. Returns the edge id.
    pub fn connect(
        &mut self,
        source: &str,
        source_handle: &str,
        target: &str,
        target_handle: &str,
    ) -> Result<String> {
        let edge = Edge::connect(source, source_handle, target, target_handle);
        let id = edge.id.clone();
        self.add_edge(edge)?;
        Ok(id)
    }

    pub fn remove_edge(&mut self, id: &str) -> Result<Edge> {
        let index = self
            .edge_index
            .remove(id)
            .ok_or_else(|| GraphError::EdgeNotFound(id.to_string()))?;
        let edge = self
            .graph
            .remove_edge(index)
            .ok_or_else(|| GraphError::EdgeNotFound(id.to_string()))?;
        self.bump();
        Ok(edge)
    }

    /// Inserts an edge whose endpoints are known to exist.
    fn insert_edge(&mut self, edge: Edge) {
        let endpoints = (
            self.id_index.get(&edge.source).copied(),
            self.id_index.get(&edge.target).copied(),
        );
        match endpoints {
            (Some(source), Some(target)) => {
                let id = edge.id.clone();
                let index = self.graph.add_edge(source, target, edge);
                self.edge_index.insert(id, index);
            }
            _ => warn!(edge = %edge.id, "skipping edge with missing endpoint"),
        }
    }

    fn edge_indices_of(&self, index: NodeIndex) -> Vec<EdgeIndex> {
        let mut seen = HashSet::new();
        self.graph
            .edges_directed(index, Direction::Outgoing)
            .chain(self.graph.edges_directed(index, Direction::Incoming))
            .map(|edge| edge.id())
            .filter(|edge| seen.insert(*edge))
            .collect()
    }

    /// Detaches and returns every edge touching `index`.
    fn take_edges_of(&mut self, index: NodeIndex) -> Vec<Edge> {
        let mut taken = Vec::new();
        for edge_index in self.edge_indices_of(index) {
            if let Some(edge) = self.graph.remove_edge(edge_index) {
                self.edge_index.remove(&edge.id);
                taken.push(edge);
            }
        }
        taken
    }

    // ----- hierarchy -----

    /// Whether `candidate` sits somewhere below `ancestor`.
    fn is_descendant(&self, candidate: &str, ancestor: &str) -> bool {
        let mut current = self.get(candidate).and_then(|n| n.parent_id.as_deref());
        for _ in 0..self.node_count() {
            match current {
                Some(parent) if parent == ancestor => return true,
                Some(parent) => current = self.get(parent).and_then(|n| n.parent_id.as_deref()),
                None => return false,
            }
        }
        false
    }

    fn has_parent_cycle(&self, id: &str) -> bool {
        let mut current = self.get(id).and_then(|n| n.parent_id.as_deref());
        for _ in 0..self.node_count() {
            match current {
                Some(parent) if parent == id => return true,
                Some(parent) => current = self.get(parent).and_then(|n| n.parent_id.as_deref()),
                None => return false,
            }
        }
        current.is_some()
    }

    /// Moves `index` and its subtree right behind its parent in `order`.
    fn place_after_parent(&mut self, index: NodeIndex) {
        let Some(parent_id) = self.graph[index].parent_id.clone() else {
            return;
        };
        let Some(&parent) = self.id_index.get(&parent_id) else {
            return;
        };
        let position_of = |order: &[NodeIndex], target: NodeIndex| {
            order.iter().position(|&other| other == target)
        };
        let (Some(own), Some(parent_at)) = (
            position_of(&self.order, index),
            position_of(&self.order, parent),
        ) else {
            return;
        };
        if parent_at < own {
            return;
        }

        let subtree = self.subtree(index);
        let moved: Vec<NodeIndex> = self
            .order
            .iter()
            .copied()
            .filter(|other| subtree.contains(other))
            .collect();
        self.order.retain(|other| !subtree.contains(other));
        let insert_at = position_of(&self.order, parent).map_or(self.order.len(), |p| p + 1);
        for (offset, moved_index) in moved.into_iter().enumerate() {
            self.order.insert(insert_at + offset, moved_index);
        }
    }

    /// The node and everything nested under it.
    fn subtree(&self, root: NodeIndex) -> HashSet<NodeIndex> {
        let mut members = HashSet::from([root]);
        let mut changed = true;
        while changed {
            changed = false;
            for &index in &self.order {
                if members.contains(&index) {
                    continue;
                }
                let parent = self.graph[index]
                    .parent_id
                    .as_deref()
                    .and_then(|parent| self.id_index.get(parent));
                if parent.is_some_and(|parent| members.contains(parent)) {
                    members.insert(index);
                    changed = true;
                }
            }
        }
        members
    }

    fn origin_of(&self, id: &str) -> Result<Position> {
        self.absolute_position(id)
            .ok_or_else(|| GraphError::NodeNotFound(id.to_string()))
    }

    // ----- queries -----

    /// Gets a node by id.
    pub fn get(&self, id: &str) -> Option<&Node> {
        let index = self.id_index.get(id)?;
        self.graph.node_weight(*index)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.id_index.contains_key(id)
    }

    /// Iterates over nodes, parents before children.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> + '_ {
        self.order
            .iter()
            .filter_map(move |&index| self.graph.node_weight(index))
    }

    /// Iterates over all edges.
    pub fn edges(&self) -> impl Iterator<Item = &Edge> + '_ {
        self.graph
            .edge_indices()
            .filter_map(move |index| self.graph.edge_weight(index))
    }

    pub fn edge(&self, id: &str) -> Option<&Edge> {
        let index = self.edge_index.get(id)?;
        self.graph.edge_weight(*index)
    }

    /// Edges with at least one end on `node_id`.
    pub fn edges_of(&self, node_id: &str) -> Vec<&Edge> {
        let Some(&index) = self.id_index.get(node_id) else {
            return Vec::new();
        };
        self.edge_indices_of(index)
            .into_iter()
            .filter_map(|edge| self.graph.edge_weight(edge))
            .collect()
    }

    /// Edges attached to one handle.
    pub fn edges_on_handle(&self, node_id: &str, handle_id: &str) -> Vec<&Edge> {
        self.edges_of(node_id)
            .into_iter()
            .filter(|edge| edge.references(node_id, handle_id))
            .collect()
    }

    /// Direct children of a group.
    pub fn children(&self, group_id: &str) -> Vec<&Node> {
        self.nodes()
            .filter(|node| node.parent_id.as_deref() == Some(group_id))
            .collect()
    }

    /// Resolves a node's position to canvas coordinates.
    pub fn absolute_position(&self, id: &str) -> Option<Position> {
        let node = self.get(id)?;
        let mut position = node.position;
        let mut parent = node.parent_id.as_deref();
        for _ in 0..self.node_count() {
            let Some(parent_id) = parent else {
                break;
            };
            let group = self.get(parent_id)?;
            position = position + group.position;
            parent = group.parent_id.as_deref();
        }
        Some(position)
    }

    /// Returns the number of nodes.
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Returns the number of edges.
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Counter bumped on every successful mutation.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Verifies the structural invariants.
    ///
    /// Mutations keep these true on their own; this is for tests and for
    /// documents read from disk.
    pub fn check_invariants(&self) -> Result<()> {
        let rank: HashMap<NodeIndex, usize> = self
            .order
            .iter()
            .enumerate()
            .map(|(rank, &index)| (index, rank))
            .collect();

        for (own_rank, &index) in self.order.iter().enumerate() {
            let node = &self.graph[index];

            let mut ids = HashSet::new();
            for handle in node.handles() {
                if !ids.insert(handle.id.as_str()) {
                    return Err(GraphError::DuplicateHandle {
                        node: node.id.clone(),
                        handle: handle.id.clone(),
                    });
                }
            }

            if let Some(parent_id) = &node.parent_id {
                let parent = self.require_group(parent_id)?;
                if self.has_parent_cycle(&node.id) {
                    return Err(GraphError::ParentCycle(node.id.clone()));
                }
                if rank.get(&parent).map_or(true, |&parent_rank| parent_rank > own_rank) {
                    return Err(GraphError::ParentOutOfOrder(node.id.clone()));
                }
            }
        }

        for edge in self.edges() {
            for (owner, handle) in [
                (&edge.source, &edge.source_handle),
                (&edge.target, &edge.target_handle),
            ] {
                let exists = self
                    .get(owner)
                    .is_some_and(|node| node.handle(handle).is_some());
                if !exists {
                    return Err(GraphError::DanglingEdge {
                        edge: edge.id.clone(),
                        handle: handle.clone(),
                    });
                }
            }
        }

        Ok(())
    }
}

/// Whether a re-parse lost a symbol the old handles knew about.
fn loses_symbols(old: &[Handle], new: &[Handle]) -> bool {
    old.iter()
        .filter(|handle| handle.handle_type != HandleType::Selection)
        .any(|handle| !new.iter().any(|other| other.key() == handle.key()))
}

/// Graph statistics for status output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphStats {
    pub node_count: usize,
    pub edge_count: usize,
    pub handle_count: usize,
    pub group_count: usize,
    pub stale_nodes: usize,
}

impl CodeGraph {
    /// Returns graph statistics.
    pub fn stats(&self) -> GraphStats {
        GraphStats {
            node_count: self.node_count(),
            edge_count: self.edge_count(),
            handle_count: self.nodes().map(|node| node.handles().len()).sum(),
            group_count: self.nodes().filter(|node| node.is_group()).count(),
            stale_nodes: self
                .nodes()
                .filter(|node| node.as_editor().is_some_and(|e| e.stale_handles))
                .count(),
        }
    }
}
