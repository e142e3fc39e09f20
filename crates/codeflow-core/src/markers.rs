//! Gutter markers for the text editor.
//!
//! The editor only needs to know which lines each handle covers and how to
//! style them; everything else about a handle stays on the graph side.

use crate::node::{Handle, HandleSide, HandleType, SourceRange};
use serde::Serialize;

/// One annotation request for the editor gutter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GutterMarker {
    pub handle_id: String,
    pub range: SourceRange,
    pub side: HandleSide,
    /// CSS class the editor applies to the marked lines.
    pub class_name: &'static str,
}

fn class_name(handle_type: HandleType) -> &'static str {
    match handle_type {
        HandleType::Function => "codeflow-gutter-function",
        HandleType::Selection => "codeflow-gutter-selection",
        HandleType::PlainImport => "codeflow-gutter-import",
    }
}

/// Builds one marker per handle, in handle order.
pub fn gutter_markers(handles: &[Handle]) -> Vec<GutterMarker> {
    handles
        .iter()
        .map(|handle| GutterMarker {
            handle_id: handle.id.clone(),
            range: handle.source_range,
            side: handle.side,
            class_name: class_name(handle.handle_type),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_markers_follow_handles() {
        let handles = vec![
            Handle::new("n", HandleType::PlainImport, "a", SourceRange::new(1, 1)),
            Handle::new("n", HandleType::Function, "foo", SourceRange::new(3, 5)),
        ];

        let markers = gutter_markers(&handles);
        assert_eq!(markers.len(), 2);
        assert_eq!(markers[0].class_name, "codeflow-gutter-import");
        assert_eq!(markers[0].side, HandleSide::Input);
        assert_eq!(markers[1].handle_id, "n:function:foo");
        assert_eq!(markers[1].range, SourceRange::new(3, 5));
    }
}
