use crate::error::{GoError, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tree_sitter::{Language, Node, Parser, Query, QueryCursor, StreamingIterator, Tree};

pub mod extract;
pub mod types;

const GO_PACKAGE_SCM: &str = "(package_clause (package_identifier) @package)";

/// A Go source file that parsed without syntax errors.
///
/// Holds the text next to its tree so later passes (extraction, diffing,
/// synthesis) never need to touch the disk again.
#[derive(Clone, Debug)]
pub struct ParsedFile {
    pub path: PathBuf,
    /// The path as a string; this is the `File::name` observers see.
    pub name: String,
    pub package: String,
    pub source: String,
    pub tree: Tree,
}

pub struct GoParser {
    pub language: Language,
    package_query: Arc<Query>,
    package_capture: u32,
}

impl Clone for GoParser {
    fn clone(&self) -> Self {
        Self {
            language: self.language.clone(),
            package_query: Arc::clone(&self.package_query),
            package_capture: self.package_capture,
        }
    }
}

impl GoParser {
    pub fn new() -> Result<Self> {
        let language: Language = tree_sitter_go::LANGUAGE.into();
        // Rejects a grammar built for an incompatible tree-sitter ABI up front.
        Parser::new()
            .set_language(&language)
            .map_err(|e| GoError::Language(e.to_string()))?;
        let package_query =
            Query::new(&language, GO_PACKAGE_SCM).map_err(|e| GoError::Query(format!("{:?}", e)))?;
        let package_capture = package_query
            .capture_index_for_name("package")
            .ok_or_else(|| GoError::Query("Capture name 'package' not found in SCM".to_string()))?;

        Ok(Self {
            language,
            package_query: Arc::new(package_query),
            package_capture,
        })
    }

    /// Parses `source` without judging it. `None` only when tree-sitter gives up.
    pub fn parse(&self, source: &str) -> Option<Tree> {
        let mut parser = Parser::new();
        parser.set_language(&self.language).ok()?;
        parser.parse(source, None)
    }

    /// Parses a file and rejects it unless it is syntactically clean and
    /// declares a package.
    pub fn parse_file(&self, path: &Path, source: String) -> Result<ParsedFile> {
        let name = path.to_string_lossy().to_string();
        let tree = self.parse(&source).ok_or_else(|| GoError::Parse {
            path: name.clone(),
            message: "parser produced no tree".to_string(),
        })?;

        if let Some(bad) = first_error(tree.root_node()) {
            let at = bad.start_position();
            let message = if bad.is_missing() {
                format!("missing {} at {}:{}", bad.kind(), at.row + 1, at.column + 1)
            } else {
                format!("syntax error at {}:{}", at.row + 1, at.column + 1)
            };
            return Err(GoError::Parse {
                path: name,
                message,
            });
        }

        let package = self
            .package_name(&tree, &source)
            .ok_or_else(|| GoError::Parse {
                path: name.clone(),
                message: "no package clause".to_string(),
            })?;

        Ok(ParsedFile {
            path: path.to_path_buf(),
            name,
            package,
            source,
            tree,
        })
    }

    pub fn package_name(&self, tree: &Tree, source: &str) -> Option<String> {
        let mut cursor = QueryCursor::new();
        let mut matches = cursor.matches(&self.package_query, tree.root_node(), source.as_bytes());
        while let Some(mat) = matches.next() {
            if let Some(cap) = mat.captures.iter().find(|c| c.index == self.package_capture) {
                return Some(node_text(cap.node, source).to_string());
            }
        }
        None
    }
}

/// Depth-first search for the first ERROR or MISSING node.
pub fn first_error(node: Node) -> Option<Node> {
    if !node.has_error() {
        return None;
    }
    if node.is_error() || node.is_missing() {
        return Some(node);
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if let Some(bad) = first_error(child) {
            return Some(bad);
        }
    }
    Some(node)
}

pub(crate) fn node_text<'s>(node: Node, source: &'s str) -> &'s str {
    node.utf8_text(source.as_bytes()).unwrap_or_default()
}
