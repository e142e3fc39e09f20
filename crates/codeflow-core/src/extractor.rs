//! SymbolExtractor - turns a node's source text into handles.
//!
//! Only top-level statements are inspected. Each declaration becomes a
//! Function output handle spanning its whole statement (including any
//! `export` keyword), and each binding introduced by an import becomes a
//! PlainImport input handle.
//!
//! The extractor never fails on bad input. Tree-sitter recovers from syntax
//! errors, statements that contain error nodes are skipped, and the result
//! is flagged as incomplete so callers can decide whether to trust it.

use crate::error::{CoreError, Result};
use crate::node::{Handle, HandleType, SourceRange};
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};
use tree_sitter::{Node as SyntaxNode, Parser};

/// Name given to the single selection handle of a node.
pub const SELECTION_NAME: &str = "selection";

/// Result of extracting one node's text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    /// Handles in declaration order.
    pub handles: Vec<Handle>,
    /// False when the text contained syntax errors.
    pub complete: bool,
}

/// A top-level symbol before ids are assigned.
struct Declaration {
    handle_type: HandleType,
    name: String,
    range: SourceRange,
    exported: bool,
}

/// Tree-sitter backed extractor for JavaScript, JSX and TypeScript.
///
/// Uses the TSX grammar, which accepts all three.
pub struct SymbolExtractor {
    parser: Parser,
}

impl SymbolExtractor {
    pub fn new() -> Result<Self> {
        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_typescript::language_tsx())
            .map_err(|e| CoreError::ParserInit(format!("Failed to set language: {}", e)))?;
        Ok(Self { parser })
    }

    /// Returns the handles for `source`, best effort.
    pub fn extract_handles(&mut self, node_id: &str, source: &str) -> Vec<Handle> {
        self.extract(node_id, source).handles
    }

    /// Extracts handles and reports whether the parse was clean.
    pub fn extract(&mut self, node_id: &str, source: &str) -> Extraction {
        let tree = match self.parser.parse(source, None) {
            Some(tree) => tree,
            None => {
                warn!(node_id, "parser returned no tree");
                return Extraction {
                    handles: Vec::new(),
                    complete: false,
                };
            }
        };

        let root = tree.root_node();
        let complete = !root.has_error();

        let mut declarations = Vec::new();
        let mut exported_names = HashSet::new();
        let mut cursor = root.walk();
        for statement in root.named_children(&mut cursor) {
            if statement.has_error() {
                continue;
            }
            collect_statement(&statement, source, &mut declarations, &mut exported_names);
        }

        let handles = assign_ids(node_id, declarations, &exported_names);

        if complete {
            debug!(node_id, handles = handles.len(), "extracted handles");
        } else {
            warn!(
                node_id,
                handles = handles.len(),
                "source has syntax errors, extraction is best-effort"
            );
        }

        Extraction { handles, complete }
    }
}

/// Creates the selection handle for a highlighted line range.
pub fn selection_handle(node_id: &str, range: SourceRange) -> Handle {
    Handle::new(node_id, HandleType::Selection, SELECTION_NAME, range)
}

fn assign_ids(
    node_id: &str,
    declarations: Vec<Declaration>,
    exported_names: &HashSet<String>,
) -> Vec<Handle> {
    let mut seen: HashMap<(HandleType, String), usize> = HashMap::new();

    declarations
        .into_iter()
        .map(|decl| {
            let occurrence = seen
                .entry((decl.handle_type, decl.name.clone()))
                .and_modify(|n| *n += 1)
                .or_insert(1);
            let exported = decl.exported
                || (decl.handle_type == HandleType::Function
                    && exported_names.contains(&decl.name));

            Handle::new(node_id, decl.handle_type, decl.name, decl.range)
                .with_exported(exported)
                .with_occurrence(*occurrence)
        })
        .collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// Statement walking
// ─────────────────────────────────────────────────────────────────────────────

fn collect_statement(
    statement: &SyntaxNode,
    source: &str,
    out: &mut Vec<Declaration>,
    exported_names: &mut HashSet<String>,
) {
    let range = line_range(statement);

    match statement.kind() {
        "export_statement" => {
            if let Some(decl) = statement.child_by_field_name("declaration") {
                collect_declaration(&decl, source, range, true, out);
                return;
            }

            // Re-exports from another module expose nothing declared here.
            if statement.child_by_field_name("source").is_some() {
                return;
            }

            // export default foo;
            if let Some(value) = statement.child_by_field_name("value") {
                if value.kind() == "identifier" {
                    exported_names.insert(get_text(&value, source).to_string());
                }
                return;
            }

            // export { foo, bar as baz };
            let mut cursor = statement.walk();
            for clause in statement.named_children(&mut cursor) {
                if clause.kind() != "export_clause" {
                    continue;
                }
                let mut inner = clause.walk();
                for spec in clause.named_children(&mut inner) {
                    if spec.kind() != "export_specifier" {
                        continue;
                    }
                    if let Some(name) = spec.child_by_field_name("name") {
                        exported_names.insert(get_text(&name, source).to_string());
                    }
                }
            }
        }
        "import_statement" => collect_import(statement, source, range, out),
        _ => collect_declaration(statement, source, range, false, out),
    }
}

fn collect_declaration(
    decl: &SyntaxNode,
    source: &str,
    range: SourceRange,
    exported: bool,
    out: &mut Vec<Declaration>,
) {
    match decl.kind() {
        "function_declaration"
        | "generator_function_declaration"
        | "function_signature"
        | "class_declaration"
        | "abstract_class_declaration"
        | "interface_declaration"
        | "type_alias_declaration"
        | "enum_declaration" => {
            if let Some(name) = decl.child_by_field_name("name") {
                out.push(Declaration {
                    handle_type: HandleType::Function,
                    name: get_text(&name, source).to_string(),
                    range,
                    exported,
                });
            }
        }
        "lexical_declaration" | "variable_declaration" => {
            let mut cursor = decl.walk();
            for declarator in decl.named_children(&mut cursor) {
                if declarator.kind() != "variable_declarator" {
                    continue;
                }
                // Destructuring patterns are not tracked.
                let Some(name) = declarator.child_by_field_name("name") else {
                    continue;
                };
                if name.kind() != "identifier" {
                    continue;
                }
                out.push(Declaration {
                    handle_type: HandleType::Function,
                    name: get_text(&name, source).to_string(),
                    range,
                    exported,
                });
            }
        }
        _ => {}
    }
}

fn collect_import(
    statement: &SyntaxNode,
    source: &str,
    range: SourceRange,
    out: &mut Vec<Declaration>,
) {
    let mut push = |name: &str| {
        out.push(Declaration {
            handle_type: HandleType::PlainImport,
            name: name.to_string(),
            range,
            exported: false,
        });
    };

    let mut cursor = statement.walk();
    for clause in statement.named_children(&mut cursor) {
        if clause.kind() != "import_clause" {
            continue;
        }

        let mut clause_cursor = clause.walk();
        for child in clause.named_children(&mut clause_cursor) {
            match child.kind() {
                // import foo from '...'
                "identifier" => push(get_text(&child, source)),
                // import * as ns from '...'
                "namespace_import" => {
                    let mut inner = child.walk();
                    for ident in child.named_children(&mut inner) {
                        if ident.kind() == "identifier" {
                            push(get_text(&ident, source));
                        }
                    }
                }
                // import { a, b as c } from '...'
                "named_imports" => {
                    let mut inner = child.walk();
                    for spec in child.named_children(&mut inner) {
                        if spec.kind() != "import_specifier" {
                            continue;
                        }
                        let local = spec
                            .child_by_field_name("alias")
                            .or_else(|| spec.child_by_field_name("name"));
                        if let Some(local) = local {
                            push(get_text(&local, source));
                        }
                    }
                }
                _ => {}
            }
        }
    }
}

fn line_range(node: &SyntaxNode) -> SourceRange {
    let start = node.start_position();
    let end = node.end_position();

    // A node ending at column 0 stops at the end of the previous line.
    let end_row = if end.column == 0 && end.row > start.row {
        end.row - 1
    } else {
        end.row
    };

    SourceRange::new(start.row as u32 + 1, end_row as u32 + 1)
}

fn get_text<'a>(node: &SyntaxNode, source: &'a str) -> &'a str {
    node.utf8_text(source.as_bytes()).unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::HandleSide;

    fn extract(source: &str) -> Extraction {
        let mut extractor = SymbolExtractor::new().unwrap();
        extractor.extract("n1", source)
    }

    #[test]
    fn test_single_exported_function() {
        let handles = extract("export function foo(){}\n").handles;

        assert_eq!(handles.len(), 1);
        let foo = &handles[0];
        assert_eq!(foo.name, "foo");
        assert_eq!(foo.handle_type, HandleType::Function);
        assert_eq!(foo.source_range, SourceRange::new(1, 1));
        assert_eq!(foo.side, HandleSide::Output);
        assert!(foo.exported);
        assert_eq!(foo.id, "n1:function:foo");
    }

    #[test]
    fn test_declarations_in_source_order() {
        let source = r#"
export const myfunction = () => {
  return 'hello world';
}

function helper(x) {
  return x * 2;
}

class Widget {
  render() {}
}
"#;
        let extraction = extract(source);
        assert!(extraction.complete);

        let names: Vec<_> = extraction.handles.iter().map(|h| h.name.as_str()).collect();
        assert_eq!(names, vec!["myfunction", "helper", "Widget"]);

        assert_eq!(extraction.handles[0].source_range, SourceRange::new(2, 4));
        assert!(extraction.handles[0].exported);
        assert_eq!(extraction.handles[1].source_range, SourceRange::new(6, 8));
        assert!(!extraction.handles[1].exported);
        assert_eq!(extraction.handles[2].source_range, SourceRange::new(10, 12));
    }

    #[test]
    fn test_nested_functions_are_ignored() {
        let source = "function outer() {\n  function inner() {}\n}\n";
        let handles = extract(source).handles;

        assert_eq!(handles.len(), 1);
        assert_eq!(handles[0].name, "outer");
    }

    #[test]
    fn test_import_bindings() {
        let source = r#"import React from 'react';
import { useState, useEffect as effect } from 'react';
import * as path from 'path';
"#;
        let handles = extract(source).handles;

        let names: Vec<_> = handles.iter().map(|h| h.name.as_str()).collect();
        assert_eq!(names, vec!["React", "useState", "effect", "path"]);
        assert!(handles
            .iter()
            .all(|h| h.handle_type == HandleType::PlainImport && h.side == HandleSide::Input));
        assert_eq!(handles[1].source_range, SourceRange::new(2, 2));
        assert_eq!(handles[1].id, "n1:plain_import:useState");
    }

    #[test]
    fn test_export_clause_marks_declarations() {
        let source = "const a = 1;\nconst b = 2;\nexport { a };\n";
        let handles = extract(source).handles;

        assert_eq!(handles.len(), 2);
        assert!(handles[0].exported);
        assert!(!handles[1].exported);
    }

    #[test]
    fn test_typescript_declarations() {
        let source = "export interface User {\n  name: string;\n}\ntype Id = string;\n";
        let handles = extract(source).handles;

        let names: Vec<_> = handles.iter().map(|h| h.name.as_str()).collect();
        assert_eq!(names, vec!["User", "Id"]);
        assert_eq!(handles[0].source_range, SourceRange::new(1, 3));
    }

    #[test]
    fn test_duplicate_names_get_unique_ids() {
        let source = "var x = 1;\nvar x = 2;\n";
        let handles = extract(source).handles;

        assert_eq!(handles.len(), 2);
        assert_eq!(handles[0].id, "n1:function:x");
        assert_eq!(handles[1].id, "n1:function:x#2");
    }

    #[test]
    fn test_extraction_is_idempotent() {
        let source = "import { a } from './a';\nexport function foo() {\n  return a;\n}\n";
        let mut extractor = SymbolExtractor::new().unwrap();

        let first = extractor.extract("n1", source);
        let second = extractor.extract("n1", source);
        assert_eq!(first, second);
    }

    #[test]
    fn test_malformed_text_is_best_effort() {
        let source = "export function ok() {}\n)\n";
        let extraction = extract(source);

        assert!(!extraction.complete);
        assert!(extraction.handles.iter().any(|h| h.name == "ok"));
    }

    #[test]
    fn test_empty_text() {
        let extraction = extract("");
        assert!(extraction.complete);
        assert!(extraction.handles.is_empty());
    }

    #[test]
    fn test_selection_handle() {
        let handle = selection_handle("n1", SourceRange::new(2, 4));
        assert_eq!(handle.handle_type, HandleType::Selection);
        assert_eq!(handle.id, "n1:selection:selection");
        assert_eq!(handle.side, HandleSide::Output);
    }
}
