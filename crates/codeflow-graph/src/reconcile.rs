//! Edge reconciliation across re-parses.
//!
//! When a node's text changes its handles are rebuilt from scratch. This
//! module carries existing edges over to the rebuilt handles: a handle is
//! the "same" handle if its `(handle_type, name)` survives, wherever it
//! moved in the text. Edges whose handle disappeared are dropped.

use crate::edge::Edge;
use codeflow_core::{Handle, HandleType, SourceRange};
use std::collections::{HashMap, HashSet, VecDeque};
use tracing::debug;

/// A line-level change whose extent is known exactly, such as a cut or a
/// splice made by a gesture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineEdit {
    /// These lines of the old text were removed.
    Removed(SourceRange),
    /// These lines of the new text were spliced in.
    Inserted(SourceRange),
}

impl LineEdit {
    /// Where an old line ends up in the new text. `None` if it was cut.
    fn shift(&self, line: u32) -> Option<u32> {
        match *self {
            LineEdit::Removed(range) if range.contains(line) => None,
            LineEdit::Removed(range) if line > range.end_line => Some(line - range.line_count()),
            LineEdit::Inserted(range) if line >= range.start_line => {
                Some(line + range.line_count())
            }
            _ => Some(line),
        }
    }

    fn inserted(&self, line: u32) -> bool {
        matches!(self, LineEdit::Inserted(range) if range.contains(line))
    }
}

/// Maps each old handle id to its successor, if any.
///
/// With a known edit, old handles are first paired with the new handle of
/// the same key at their shifted start line; handles inside a removed
/// range have no successor and handles inside an inserted range inherit
/// nothing. Whatever is left is paired up in declaration order.
fn successor_map<'a>(
    old: &'a [Handle],
    new: &'a [Handle],
    edit: Option<LineEdit>,
) -> HashMap<&'a str, Option<&'a str>> {
    let mut successors = HashMap::new();
    let mut taken: HashSet<&str> = HashSet::new();
    let mut unmatched = Vec::new();

    for handle in old {
        let Some(edit) = edit else {
            unmatched.push(handle);
            continue;
        };
        let Some(line) = edit.shift(handle.source_range.start_line) else {
            successors.insert(handle.id.as_str(), None);
            continue;
        };
        let next = new.iter().find(|candidate| {
            candidate.key() == handle.key()
                && candidate.source_range.start_line == line
                && !taken.contains(candidate.id.as_str())
        });
        match next {
            Some(next) => {
                taken.insert(next.id.as_str());
                successors.insert(handle.id.as_str(), Some(next.id.as_str()));
            }
            None => unmatched.push(handle),
        }
    }

    let mut by_key: HashMap<(HandleType, &str), VecDeque<&str>> = HashMap::new();
    for handle in new {
        let spliced = edit.map_or(false, |edit| edit.inserted(handle.source_range.start_line));
        if spliced || taken.contains(handle.id.as_str()) {
            continue;
        }
        by_key
            .entry(handle.key())
            .or_default()
            .push_back(handle.id.as_str());
    }

    for handle in unmatched {
        let next = by_key
            .get_mut(&handle.key())
            .and_then(|queue| queue.pop_front());
        successors.insert(handle.id.as_str(), next);
    }
    successors
}

/// Rewrites or drops the edges of `node_id` after its handles changed.
///
/// Edges that don't touch `node_id` come back unchanged, and the relative
/// order of surviving edges is kept.
pub fn reconcile_edges(
    node_id: &str,
    old_handles: &[Handle],
    new_handles: &[Handle],
    edges: Vec<Edge>,
) -> Vec<Edge> {
    reconcile_edges_after(node_id, None, old_handles, new_handles, edges)
}

/// Like [`reconcile_edges`], but uses a known edit to tell apart
/// declarations that share a name.
pub fn reconcile_edges_after(
    node_id: &str,
    edit: Option<LineEdit>,
    old_handles: &[Handle],
    new_handles: &[Handle],
    edges: Vec<Edge>,
) -> Vec<Edge> {
    let successors = successor_map(old_handles, new_handles, edit);

    // Resolves one endpoint. `None` means the edge must go.
    let remap = |owner: &str, handle_id: String| -> Option<String> {
        if owner != node_id {
            return Some(handle_id);
        }
        match successors.get(handle_id.as_str()) {
            Some(Some(next)) => Some((*next).to_string()),
            Some(None) => None,
            // Not one of the old handles; left for the graph's invariant check.
            None => Some(handle_id),
        }
    };

    let total = edges.len();
    let mut rewritten = 0;
    let reconciled: Vec<Edge> = edges
        .into_iter()
        .filter_map(|edge| {
            if !edge.touches(node_id) {
                return Some(edge);
            }
            let source_handle = remap(&edge.source, edge.source_handle.clone())?;
            let target_handle = remap(&edge.target, edge.target_handle.clone())?;
            if source_handle != edge.source_handle || target_handle != edge.target_handle {
                rewritten += 1;
            }
            Some(Edge {
                source_handle,
                target_handle,
                ..edge
            })
        })
        .collect();

    debug!(
        node_id,
        kept = reconciled.len(),
        dropped = total - reconciled.len(),
        rewritten,
        "reconciled edges"
    );

    reconciled
}

#[cfg(test)]
mod tests {
    use super::*;

    fn function(node: &str, name: &str, start: u32) -> Handle {
        Handle::new(node, HandleType::Function, name, SourceRange::new(start, start))
    }

    fn import(node: &str, name: &str) -> Handle {
        Handle::new(node, HandleType::PlainImport, name, SourceRange::new(1, 1))
    }

    #[test]
    fn test_carry_forward_when_symbol_moves() {
        let old = vec![function("n", "foo", 1)];
        let new = vec![function("n", "bar", 1), function("n", "foo", 5)];
        let edges = vec![Edge::new("e", "n", "n:function:foo", "m", "m:plain_import:foo")];

        let result = reconcile_edges("n", &old, &new, edges);

        assert_eq!(result.len(), 1);
        assert_eq!(result[0].id, "e");
        assert_eq!(result[0].source_handle, "n:function:foo");
    }

    #[test]
    fn test_rename_drops_edge() {
        let old = vec![function("n", "foo", 1)];
        let new = vec![function("n", "bar", 1)];
        let edges = vec![Edge::new("e", "n", "n:function:foo", "m", "m:plain_import:foo")];

        let result = reconcile_edges("n", &old, &new, edges);
        assert!(result.is_empty());
    }

    #[test]
    fn test_type_change_drops_edge() {
        let old = vec![import("n", "foo")];
        let new = vec![function("n", "foo", 1)];
        let edges = vec![Edge::new("e", "m", "m:function:foo", "n", "n:plain_import:foo")];

        assert!(reconcile_edges("n", &old, &new, edges).is_empty());
    }

    #[test]
    fn test_unrelated_edges_pass_through() {
        let old = vec![function("n", "foo", 1)];
        let new = vec![];
        let unrelated = Edge::new("x", "a", "a:function:f", "b", "b:plain_import:f");
        let edges = vec![
            unrelated.clone(),
            Edge::new("e", "n", "n:function:foo", "m", "m:plain_import:foo"),
        ];

        let result = reconcile_edges("n", &old, &new, edges);
        assert_eq!(result, vec![unrelated]);
    }

    #[test]
    fn test_new_handles_get_no_edges() {
        let new = vec![function("n", "fresh", 1)];
        let result = reconcile_edges("n", &[], &new, Vec::new());
        assert!(result.is_empty());
    }

    #[test]
    fn test_rewrites_to_recomputed_id() {
        // Second declaration of `x` disappears; the first keeps its edge.
        let old = vec![
            function("n", "x", 1),
            function("n", "x", 2).with_occurrence(2),
        ];
        let new = vec![function("n", "x", 3)];
        let edges = vec![
            Edge::new("first", "n", "n:function:x", "m", "m:plain_import:x"),
            Edge::new("second", "n", "n:function:x#2", "m", "m:plain_import:y"),
        ];

        let result = reconcile_edges("n", &old, &new, edges);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].id, "first");
    }

    #[test]
    fn test_self_loop_needs_both_ends() {
        let old = vec![function("n", "a", 1), import("n", "b")];
        let new = vec![function("n", "a", 1)];
        let edges = vec![Edge::new("loop", "n", "n:function:a", "n", "n:plain_import:b")];

        assert!(reconcile_edges("n", &old, &new, edges).is_empty());
    }

    #[test]
    fn test_cut_duplicate_keeps_survivor_edge() {
        let old = vec![
            function("n", "x", 1),
            function("n", "x", 2).with_occurrence(2),
        ];
        let new = vec![function("n", "x", 1)];
        let edges = vec![
            Edge::new("first", "n", "n:function:x", "m", "m:plain_import:x"),
            Edge::new("second", "n", "n:function:x#2", "m", "m:plain_import:y"),
        ];

        let edit = LineEdit::Removed(SourceRange::new(1, 1));
        let result = reconcile_edges_after("n", Some(edit), &old, &new, edges);

        assert_eq!(result.len(), 1);
        assert_eq!(result[0].id, "second");
        assert_eq!(result[0].source_handle, "n:function:x");
    }

    #[test]
    fn test_spliced_duplicate_inherits_nothing() {
        let old = vec![function("n", "helper", 1)];
        let new = vec![
            function("n", "helper", 1),
            function("n", "helper", 4).with_occurrence(2),
        ];
        let edges = vec![Edge::new("e", "n", "n:function:helper", "m", "m:plain_import:helper")];

        let edit = LineEdit::Inserted(SourceRange::new(1, 3));
        let result = reconcile_edges_after("n", Some(edit), &old, &new, edges);

        assert_eq!(result.len(), 1);
        assert_eq!(result[0].source_handle, "n:function:helper#2");
    }
}
