//! Compound edits driven by canvas gestures.
//!
//! Each gesture is a short sequence of store mutations: cut a chunk out of
//! one node, put it somewhere else, and re-derive handles on both sides.
//! All inputs are validated before the first mutation so a rejected
//! gesture leaves the graph untouched.

use crate::edge::Edge;
use crate::error::{GraphError, Result};
use crate::graph::CodeGraph;
use crate::reconcile::LineEdit;
use codeflow_core::{
    extract_chunk, insert_chunk, line_count, Handle, HandleType, Node, Position, SourceRange,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Where a dragged connection was released.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DropTarget {
    /// Empty canvas, in canvas coordinates.
    Pane { position: Position },
    /// Inside a group, in canvas coordinates.
    Group { group_id: String, position: Position },
    /// Over an editor's text, in canvas coordinates.
    Editor { node_id: String, point: Position },
}

/// What a connection drop turned into.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DropOutcome {
    Extracted { node_id: String },
    Moved { target: String, at_line: u32 },
    ImportCreated { node_id: String, edge_id: String },
    Ignored,
}

impl CodeGraph {
    /// Looks up a handle that can be cut out of its node.
    fn movable_handle(&self, node_id: &str, handle_id: &str) -> Result<(Handle, String)> {
        let node = self
            .get(node_id)
            .ok_or_else(|| GraphError::NodeNotFound(node_id.to_string()))?;
        let editor = node
            .as_editor()
            .ok_or_else(|| GraphError::NotAnEditor(node_id.to_string()))?;
        if editor.stale_handles {
            return Err(GraphError::StaleHandles(node_id.to_string()));
        }

        let handle = self.require_handle(node_id, handle_id)?.clone();
        if handle.handle_type == HandleType::PlainImport {
            return Err(GraphError::UnsupportedHandle {
                handle: handle.id,
                handle_type: handle.handle_type,
            });
        }
        Ok((handle, editor.source_text.clone()))
    }

    /// Canvas origin of an optional parent group.
    fn frame_origin(&self, parent_id: Option<&str>) -> Result<Position> {
        let Some(parent_id) = parent_id else {
            return Ok(Position::default());
        };
        let group = self
            .get(parent_id)
            .ok_or_else(|| GraphError::NodeNotFound(parent_id.to_string()))?;
        if !group.is_group() {
            return Err(GraphError::NotAGroup(parent_id.to_string()));
        }
        self.absolute_position(parent_id)
            .ok_or_else(|| GraphError::NodeNotFound(parent_id.to_string()))
    }

    /// Moves edges that hung off `old` on `from` over to the handle on
    /// `to` with the same key whose start line lies in `within`.
    fn carry_edges(
        &mut self,
        edges: Vec<Edge>,
        from: &str,
        old: &Handle,
        to: &str,
        within: SourceRange,
    ) {
        let successor = self.get(to).and_then(|node| {
            node.handles()
                .iter()
                .find(|h| h.key() == old.key() && within.contains(h.source_range.start_line))
                .map(|h| h.id.clone())
        });
        let Some(successor) = successor else {
            if !edges.is_empty() {
                warn!(handle = %old.id, node = to, "no matching handle to carry edges to");
            }
            return;
        };

        for edge in edges {
            let mut carried = edge.clone();
            if carried.source == from && carried.source_handle == old.id {
                carried.source = to.to_string();
                carried.source_handle = successor.clone();
            }
            if carried.target == from && carried.target_handle == old.id {
                carried.target = to.to_string();
                carried.target_handle = successor.clone();
            }
            // The reconcile on `from` may have kept the original edge.
            if self.edge(&carried.id).is_some() {
                continue;
            }
            if let Err(e) = self.add_edge(carried) {
                warn!(edge = %edge.id, "could not carry edge: {}", e);
            }
        }
    }

    /// Cuts a function or selection out of `from` into a new editor node.
    ///
    /// `at` is in canvas coordinates; the new node is placed relative to
    /// `parent_id` when given. A function keeps its name as the file name
    /// and gains an export marker if it had none.
    pub fn extract_to_new_node(
        &mut self,
        from: &str,
        handle_id: &str,
        new_id: &str,
        at: Position,
        parent_id: Option<&str>,
    ) -> Result<()> {
        let (handle, text) = self.movable_handle(from, handle_id)?;
        if self.contains(new_id) {
            return Err(GraphError::DuplicateNode(new_id.to_string()));
        }
        let origin = self.frame_origin(parent_id)?;
        let cut = extract_chunk(&text, handle.source_range.start_line, handle.source_range.end_line)?;

        let (file_name, chunk) = match handle.handle_type {
            HandleType::Function if handle.exported => (format!("./{}.js", handle.name), cut.chunk),
            HandleType::Function => (
                format!("./{}.js", handle.name),
                format!("export {}", cut.chunk),
            ),
            _ => (format!("newFile-{}.js", new_id), cut.chunk),
        };
        let carried: Vec<Edge> = self
            .edges_on_handle(from, handle_id)
            .into_iter()
            .cloned()
            .collect();

        let mut node = Node::editor(new_id, file_name, chunk).at(at - origin);
        if let Some(parent_id) = parent_id {
            node = node.with_parent(parent_id);
        }
        let new_lines = node.source_text().map(line_count).unwrap_or(0).max(1);
        self.add_node(node)?;
        let removed = LineEdit::Removed(handle.source_range);
        if let Err(e) = self.update_text_after(from, cut.remainder, Some(removed)) {
            self.remove_node(new_id)?;
            return Err(e);
        }

        if handle.handle_type == HandleType::Function {
            self.carry_edges(carried, from, &handle, new_id, SourceRange::new(1, new_lines));
        }

        info!(from, handle = handle_id, node = new_id, "extracted to new node");
        Ok(())
    }

    /// Cuts a function or selection out of `from` and splices it into
    /// `target` before line `at_line`.
    pub fn move_chunk_to_node(
        &mut self,
        from: &str,
        handle_id: &str,
        target: &str,
        at_line: u32,
    ) -> Result<()> {
        if from == target {
            return Err(GraphError::SameNode(from.to_string()));
        }
        let (handle, text) = self.movable_handle(from, handle_id)?;
        let target_editor = self
            .get(target)
            .ok_or_else(|| GraphError::NodeNotFound(target.to_string()))?
            .as_editor()
            .ok_or_else(|| GraphError::NotAnEditor(target.to_string()))?;
        if target_editor.stale_handles {
            return Err(GraphError::StaleHandles(target.to_string()));
        }
        let target_text = target_editor.source_text.clone();

        let cut = extract_chunk(&text, handle.source_range.start_line, handle.source_range.end_line)?;
        let combined = insert_chunk(&target_text, &cut.chunk, at_line)?;

        let start = at_line.min(line_count(&target_text) + 1);
        let inserted = SourceRange::new(start, start + line_count(&cut.chunk).max(1) - 1);
        let carried: Vec<Edge> = self
            .edges_on_handle(from, handle_id)
            .into_iter()
            .cloned()
            .collect();

        self.update_text_after(target, combined, Some(LineEdit::Inserted(inserted)))?;
        self.update_text_after(from, cut.remainder, Some(LineEdit::Removed(handle.source_range)))?;

        if handle.handle_type == HandleType::Function {
            self.carry_edges(carried, from, &handle, target, inserted);
        }

        info!(from, handle = handle_id, target, at_line, "moved chunk");
        Ok(())
    }

    /// Maps a drop point over an editor to the line it lands on.
    pub fn line_at(&self, target: &str, point: Position, line_height: f64) -> Result<u32> {
        let origin = self
            .absolute_position(target)
            .ok_or_else(|| GraphError::NodeNotFound(target.to_string()))?;
        if line_height <= 0.0 {
            return Ok(1);
        }
        let line = ((point.y - origin.y) / line_height).floor() as i64 + 1;
        Ok(line.clamp(1, u32::MAX as i64) as u32)
    }

    /// Creates an editor importing the symbol behind `handle_id` and
    /// connects it to the source.
    ///
    /// The new node lands in `drop_group` when given, otherwise next to
    /// the source in the source's own group. Returns the new edge id.
    pub fn create_import_node(
        &mut self,
        from: &str,
        handle_id: &str,
        new_id: &str,
        at: Position,
        drop_group: Option<&str>,
    ) -> Result<String> {
        let source = self
            .get(from)
            .ok_or_else(|| GraphError::NodeNotFound(from.to_string()))?;
        let file_name = source
            .file_name()
            .ok_or_else(|| GraphError::NotAnEditor(from.to_string()))?
            .to_string();
        let parent_id = drop_group
            .map(str::to_string)
            .or_else(|| source.parent_id.clone());
        let name = self.require_handle(from, handle_id)?.name.clone();
        if self.contains(new_id) {
            return Err(GraphError::DuplicateNode(new_id.to_string()));
        }
        let origin = self.frame_origin(parent_id.as_deref())?;

        let text = format!("import {{ {} }} from '{}';", name, file_name);
        let mut node = Node::editor(new_id, format!("newFile-{}.js", new_id), text).at(at - origin);
        if let Some(parent_id) = parent_id {
            node = node.with_parent(parent_id);
        }
        self.add_node(node)?;

        let import_handle = codeflow_core::handle_id(new_id, HandleType::PlainImport, &name);
        match self.connect(from, handle_id, new_id, &import_handle) {
            Ok(edge_id) => {
                debug!(from, node = new_id, edge = %edge_id, "created import node");
                Ok(edge_id)
            }
            Err(e) => {
                self.remove_node(new_id)?;
                Err(e)
            }
        }
    }

    /// Resolves a released connection drag into one of the gestures.
    pub fn connection_dropped(
        &mut self,
        from: &str,
        handle_id: &str,
        target: DropTarget,
        line_height: f64,
    ) -> Result<DropOutcome> {
        let handle_type = self.require_handle(from, handle_id)?.handle_type;

        match (handle_type, target) {
            (HandleType::PlainImport, DropTarget::Editor { .. }) => Ok(DropOutcome::Ignored),
            (_, DropTarget::Editor { node_id, .. }) if node_id == from => Ok(DropOutcome::Ignored),
            (HandleType::PlainImport, DropTarget::Pane { position }) => {
                let node_id = self.next_node_id();
                let edge_id = self.create_import_node(from, handle_id, &node_id, position, None)?;
                Ok(DropOutcome::ImportCreated { node_id, edge_id })
            }
            (HandleType::PlainImport, DropTarget::Group { group_id, position }) => {
                let node_id = self.next_node_id();
                let edge_id =
                    self.create_import_node(from, handle_id, &node_id, position, Some(&group_id))?;
                Ok(DropOutcome::ImportCreated { node_id, edge_id })
            }
            (_, DropTarget::Pane { position }) => {
                let node_id = self.next_node_id();
                self.extract_to_new_node(from, handle_id, &node_id, position, None)?;
                Ok(DropOutcome::Extracted { node_id })
            }
            (_, DropTarget::Group { group_id, position }) => {
                let node_id = self.next_node_id();
                self.extract_to_new_node(from, handle_id, &node_id, position, Some(&group_id))?;
                Ok(DropOutcome::Extracted { node_id })
            }
            (_, DropTarget::Editor { node_id, point }) => {
                let at_line = self.line_at(&node_id, point, line_height)?;
                self.move_chunk_to_node(from, handle_id, &node_id, at_line)?;
                Ok(DropOutcome::Moved {
                    target: node_id,
                    at_line,
                })
            }
        }
    }
}
