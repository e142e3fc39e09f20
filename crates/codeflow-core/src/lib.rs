//! Codeflow Core - symbols and text surgery
//!
//! This crate holds the pieces of the synchronization engine that work on
//! a single node's text:
//!
//! - [`node`]: the node and handle model shared by every other crate
//! - [`surgery`]: line-indexed extraction and insertion of text chunks
//! - [`extractor`]: tree-sitter based discovery of top-level declarations
//!   and imports, turned into handles with content-derived ids
//! - [`markers`]: gutter annotations for the text editor
//!
//! # Example
//!
//! ```no_run
//! use codeflow_core::{extract_chunk, SymbolExtractor};
//!
//! let mut extractor = SymbolExtractor::new().unwrap();
//! let handles = extractor.extract_handles("1", "export function foo() {}\n");
//! assert_eq!(handles[0].name, "foo");
//!
//! let cut = extract_chunk("a\nb\nc\n", 2, 2).unwrap();
//! assert_eq!(cut.chunk, "b\n");
//! ```

pub mod config;
pub mod error;
pub mod extractor;
pub mod markers;
pub mod node;
pub mod surgery;

pub use config::{Config, PROJECT_DIR};
pub use error::{CoreError, Result};
pub use extractor::{selection_handle, Extraction, SymbolExtractor, SELECTION_NAME};
pub use markers::{gutter_markers, GutterMarker};
pub use node::{
    handle_id, EditorData, GroupData, Handle, HandleSide, HandleType, Node, NodeData, NodeKind,
    Position, PreviewData, SettingsData, SourceRange,
};
pub use surgery::{check_range, extract_chunk, insert_chunk, line_count, Extracted, SurgeryError};
