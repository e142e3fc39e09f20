//! Group membership after a node drag.
//!
//! The renderer works out which groups geometrically contain the dropped
//! node; this module only decides what that means for `parent_id` and
//! converts the position between absolute and group-relative coordinates.

use codeflow_core::{Node, Position};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// A group as seen by the resolver: its id and absolute origin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupFrame {
    pub id: String,
    pub origin: Position,
}

impl GroupFrame {
    pub fn new(id: impl Into<String>, origin: Position) -> Self {
        Self {
            id: id.into(),
            origin,
        }
    }
}

/// Where a node ends up after a drop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Membership {
    pub parent_id: Option<String>,
    /// Relative to `parent_id` when set, absolute otherwise.
    pub position: Position,
}

/// Decides the parent and position of `node` after a drag.
///
/// `node.position` is the drop position in the node's current frame, which
/// is `prior_parent` when given. Ambiguous drops (several candidates) and
/// drops inside the current parent keep the parent unchanged.
pub fn resolve_membership(
    node: &Node,
    candidate_groups: &[GroupFrame],
    prior_parent: Option<&GroupFrame>,
) -> Membership {
    let unchanged = Membership {
        parent_id: prior_parent.map(|parent| parent.id.clone()),
        position: node.position,
    };

    match candidate_groups {
        [group] => {
            if prior_parent.map(|parent| parent.id.as_str()) == Some(group.id.as_str()) {
                return unchanged;
            }
            let absolute = match prior_parent {
                Some(parent) => node.position + parent.origin,
                None => node.position,
            };
            debug!(node = %node.id, group = %group.id, "node joins group");
            Membership {
                parent_id: Some(group.id.clone()),
                position: absolute - group.origin,
            }
        }
        [] => match prior_parent {
            Some(parent) => {
                debug!(node = %node.id, group = %parent.id, "node leaves group");
                Membership {
                    parent_id: None,
                    position: node.position + parent.origin,
                }
            }
            None => unchanged,
        },
        _ => {
            debug!(
                node = %node.id,
                candidates = candidate_groups.len(),
                "ambiguous group drop, keeping parent"
            );
            unchanged
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node_at(x: f64, y: f64) -> Node {
        Node::editor("n", "a.js", "").at(Position::new(x, y))
    }

    #[test]
    fn test_drop_into_group() {
        let group = GroupFrame::new("g", Position::new(100.0, 100.0));
        let result = resolve_membership(&node_at(150.0, 130.0), &[group], None);

        assert_eq!(result.parent_id.as_deref(), Some("g"));
        assert_eq!(result.position, Position::new(50.0, 30.0));
    }

    #[test]
    fn test_drag_out_of_group() {
        let group = GroupFrame::new("g", Position::new(100.0, 100.0));
        let result = resolve_membership(&node_at(-20.0, 10.0), &[], Some(&group));

        assert_eq!(result.parent_id, None);
        assert_eq!(result.position, Position::new(80.0, 110.0));
    }

    #[test]
    fn test_move_between_groups() {
        let from = GroupFrame::new("a", Position::new(0.0, 0.0));
        let to = GroupFrame::new("b", Position::new(300.0, 0.0));
        let result = resolve_membership(&node_at(310.0, 5.0), &[to], Some(&from));

        assert_eq!(result.parent_id.as_deref(), Some("b"));
        assert_eq!(result.position, Position::new(10.0, 5.0));
    }

    #[test]
    fn test_same_group_is_unchanged() {
        let group = GroupFrame::new("g", Position::new(100.0, 100.0));
        let result = resolve_membership(&node_at(5.0, 5.0), &[group.clone()], Some(&group));

        assert_eq!(result.parent_id.as_deref(), Some("g"));
        assert_eq!(result.position, Position::new(5.0, 5.0));
    }

    #[test]
    fn test_multiple_candidates_are_unchanged() {
        let outer = GroupFrame::new("outer", Position::new(0.0, 0.0));
        let inner = GroupFrame::new("inner", Position::new(50.0, 50.0));
        let result = resolve_membership(&node_at(60.0, 60.0), &[outer, inner], None);

        assert_eq!(result.parent_id, None);
        assert_eq!(result.position, Position::new(60.0, 60.0));
    }

    #[test]
    fn test_no_candidate_no_parent() {
        let result = resolve_membership(&node_at(1.0, 2.0), &[], None);
        assert_eq!(result.parent_id, None);
        assert_eq!(result.position, Position::new(1.0, 2.0));
    }
}
