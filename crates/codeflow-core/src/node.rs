//! Nodes and handles.
//!
//! A node is one box on the canvas. Editor nodes hold source text and the
//! handles derived from it; the other kinds carry their own small payload.
//! Handles are the typed connection points that edges attach to.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::{Add, Sub};

/// A canvas coordinate.
///
/// Absolute when the owning node has no parent, otherwise relative to the
/// parent group's origin.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl Add for Position {
    type Output = Position;

    fn add(self, rhs: Position) -> Position {
        Position::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Position {
    type Output = Position;

    fn sub(self, rhs: Position) -> Position {
        Position::new(self.x - rhs.x, self.y - rhs.y)
    }
}

/// A 1-indexed, inclusive line range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceRange {
    pub start_line: u32,
    pub end_line: u32,
}

impl SourceRange {
    pub fn new(start_line: u32, end_line: u32) -> Self {
        Self {
            start_line,
            end_line,
        }
    }

    /// Number of lines covered.
    pub fn line_count(&self) -> u32 {
        self.end_line.saturating_sub(self.start_line) + 1
    }

    pub fn contains(&self, line: u32) -> bool {
        self.start_line <= line && line <= self.end_line
    }
}

impl std::fmt::Display for SourceRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.start_line, self.end_line)
    }
}

/// What a handle was derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandleType {
    /// A top-level declaration (function, class, const, ...).
    Function,
    /// The current text selection in the editor.
    Selection,
    /// A binding brought in by an import statement.
    PlainImport,
}

impl HandleType {
    pub fn as_str(&self) -> &'static str {
        match self {
            HandleType::Function => "function",
            HandleType::Selection => "selection",
            HandleType::PlainImport => "plain_import",
        }
    }

    /// The side a handle of this type sits on.
    pub fn side(&self) -> HandleSide {
        match self {
            HandleType::Function | HandleType::Selection => HandleSide::Output,
            HandleType::PlainImport => HandleSide::Input,
        }
    }
}

impl std::fmt::Display for HandleType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Whether a handle exposes a symbol or consumes one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandleSide {
    Output,
    Input,
}

/// Builds the content-derived id for a handle.
///
/// The same logical symbol always maps to the same id, which is what lets
/// edges survive a re-parse.
pub fn handle_id(node_id: &str, handle_type: HandleType, name: &str) -> String {
    format!("{}:{}:{}", node_id, handle_type, name)
}

/// A connection point on a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Handle {
    pub id: String,
    pub node_id: String,
    pub handle_type: HandleType,
    pub name: String,
    pub source_range: SourceRange,
    pub side: HandleSide,
    /// Set when the declaration carries an export marker.
    pub exported: bool,
}

impl Handle {
    pub fn new(
        node_id: impl Into<String>,
        handle_type: HandleType,
        name: impl Into<String>,
        source_range: SourceRange,
    ) -> Self {
        let node_id = node_id.into();
        let name = name.into();
        Self {
            id: handle_id(&node_id, handle_type, &name),
            node_id,
            handle_type,
            name,
            source_range,
            side: handle_type.side(),
            exported: false,
        }
    }

    pub fn with_exported(mut self, exported: bool) -> Self {
        self.exported = exported;
        self
    }

    /// Disambiguates the n-th (n >= 2) declaration sharing a name.
    pub fn with_occurrence(mut self, occurrence: usize) -> Self {
        if occurrence > 1 {
            self.id = format!(
                "{}#{}",
                handle_id(&self.node_id, self.handle_type, &self.name),
                occurrence
            );
        }
        self
    }

    /// The identity used to match handles across re-parses.
    pub fn key(&self) -> (HandleType, &str) {
        (self.handle_type, self.name.as_str())
    }
}

/// The closed set of node kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Editor,
    Group,
    Settings,
    Preview,
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Editor => "editor",
            Self::Group => "group",
            Self::Settings => "settings",
            Self::Preview => "preview",
        };
        write!(f, "{}", s)
    }
}

/// Payload of an editor node.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EditorData {
    pub file_name: String,
    pub source_text: String,
    /// Always recomputed from `source_text`, never persisted.
    #[serde(skip)]
    pub handles: Vec<Handle>,
    /// Set while the handles describe an older revision of the text.
    #[serde(skip)]
    pub stale_handles: bool,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GroupData {
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SettingsData {
    pub values: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PreviewData {
    pub text: String,
}

/// Kind-specific node payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NodeData {
    Editor(EditorData),
    Group(GroupData),
    Settings(SettingsData),
    Preview(PreviewData),
}

/// A node on the canvas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    pub data: NodeData,
    pub position: Position,
    pub parent_id: Option<String>,
    pub hidden: bool,
}

impl Node {
    fn with_data(id: impl Into<String>, data: NodeData) -> Self {
        Self {
            id: id.into(),
            data,
            position: Position::default(),
            parent_id: None,
            hidden: false,
        }
    }

    /// Creates an editor node. Handles are filled in by the graph.
    pub fn editor(
        id: impl Into<String>,
        file_name: impl Into<String>,
        source_text: impl Into<String>,
    ) -> Self {
        Self::with_data(
            id,
            NodeData::Editor(EditorData {
                file_name: file_name.into(),
                source_text: source_text.into(),
                handles: Vec::new(),
                stale_handles: false,
            }),
        )
    }

    pub fn group(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self::with_data(
            id,
            NodeData::Group(GroupData {
                label: label.into(),
            }),
        )
    }

    pub fn settings(id: impl Into<String>, values: BTreeMap<String, String>) -> Self {
        Self::with_data(id, NodeData::Settings(SettingsData { values }))
    }

    pub fn preview(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self::with_data(id, NodeData::Preview(PreviewData { text: text.into() }))
    }

    pub fn at(mut self, position: Position) -> Self {
        self.position = position;
        self
    }

    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    pub fn kind(&self) -> NodeKind {
        match self.data {
            NodeData::Editor(_) => NodeKind::Editor,
            NodeData::Group(_) => NodeKind::Group,
            NodeData::Settings(_) => NodeKind::Settings,
            NodeData::Preview(_) => NodeKind::Preview,
        }
    }

    pub fn is_group(&self) -> bool {
        matches!(self.data, NodeData::Group(_))
    }

    pub fn as_editor(&self) -> Option<&EditorData> {
        match &self.data {
            NodeData::Editor(editor) => Some(editor),
            _ => None,
        }
    }

    pub fn as_editor_mut(&mut self) -> Option<&mut EditorData> {
        match &mut self.data {
            NodeData::Editor(editor) => Some(editor),
            _ => None,
        }
    }

    /// Handles in declaration order. Empty for non-editor nodes.
    pub fn handles(&self) -> &[Handle] {
        self.as_editor()
            .map(|editor| editor.handles.as_slice())
            .unwrap_or(&[])
    }

    pub fn handle(&self, handle_id: &str) -> Option<&Handle> {
        self.handles().iter().find(|h| h.id == handle_id)
    }

    pub fn source_text(&self) -> Option<&str> {
        self.as_editor().map(|editor| editor.source_text.as_str())
    }

    pub fn file_name(&self) -> Option<&str> {
        self.as_editor().map(|editor| editor.file_name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_id_is_content_derived() {
        let a = Handle::new("1", HandleType::Function, "foo", SourceRange::new(1, 3));
        let b = Handle::new("1", HandleType::Function, "foo", SourceRange::new(7, 9));

        assert_eq!(a.id, "1:function:foo");
        assert_eq!(a.id, b.id);
        assert_eq!(a.side, HandleSide::Output);
    }

    #[test]
    fn test_occurrence_suffix() {
        let first = Handle::new("n", HandleType::Function, "foo", SourceRange::new(1, 1))
            .with_occurrence(1);
        let second = Handle::new("n", HandleType::Function, "foo", SourceRange::new(2, 2))
            .with_occurrence(2);

        assert_eq!(first.id, "n:function:foo");
        assert_eq!(second.id, "n:function:foo#2");
    }

    #[test]
    fn test_import_handles_are_inputs() {
        let handle = Handle::new("n", HandleType::PlainImport, "x", SourceRange::new(1, 1));
        assert_eq!(handle.side, HandleSide::Input);
    }

    #[test]
    fn test_non_editor_nodes_have_no_handles() {
        let group = Node::group("g", "Group");
        assert_eq!(group.kind(), NodeKind::Group);
        assert!(group.handles().is_empty());
        assert!(group.source_text().is_none());
    }

    #[test]
    fn test_position_arithmetic() {
        let a = Position::new(10.0, 20.0);
        let b = Position::new(4.0, 5.0);
        assert_eq!(a - b, Position::new(6.0, 15.0));
        assert_eq!((a - b) + b, a);
    }
}
