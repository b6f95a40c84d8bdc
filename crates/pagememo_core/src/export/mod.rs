//! Page tree export renderers.
//!
//! # Responsibility
//! - Serialize page trees as structured JSON, document markup, or a
//!   flattened path listing suited to document-ingesting tools.
//! - Parse structured exports back into trees.
//!
//! # Invariants
//! - Rendering is pure; it never touches storage.
//! - `parse_tree(export_tree(t, Structured))` yields `t` exactly.

use crate::model::node::{MemoNode, TreeValidationError};
use crate::model::page_tree::PageMemoTree;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Separator placed between per-tree exports of a non-structured bulk export.
pub const TREE_SEPARATOR: &str = "\n\n---\n\n";

/// Supported export formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExportFormat {
    /// Pretty-printed JSON of the full tree.
    Structured,
    /// Markdown document with headings and nested list items.
    DocumentMarkup,
    /// Plain text with one `[A > B > C]` path header per node.
    FlattenedPath,
}

impl ExportFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Structured => "json",
            Self::DocumentMarkup => "markdown",
            Self::FlattenedPath => "notebooklm",
        }
    }

    pub fn file_extension(self) -> &'static str {
        match self {
            Self::Structured => "json",
            Self::DocumentMarkup => "md",
            Self::FlattenedPath => "txt",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Structured => "application/json",
            Self::DocumentMarkup => "text/markdown",
            Self::FlattenedPath => "text/plain",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = ExportError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Structured),
            "markdown" | "md" => Ok(Self::DocumentMarkup),
            "notebooklm" | "text" | "txt" => Ok(Self::FlattenedPath),
            _ => Err(ExportError::UnknownFormat(value.to_string())),
        }
    }
}

impl Display for ExportFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors from export rendering and parsing.
#[derive(Debug)]
pub enum ExportError {
    /// Format name is not recognized.
    UnknownFormat(String),
    /// JSON encoding or decoding failed.
    Json(serde_json::Error),
    /// Parsed tree violates forest invariants.
    InvalidTree(TreeValidationError),
}

impl Display for ExportError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownFormat(value) => write!(f, "unknown export format: {value}"),
            Self::Json(err) => write!(f, "export json error: {err}"),
            Self::InvalidTree(err) => write!(f, "exported tree is invalid: {err}"),
        }
    }
}

impl Error for ExportError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::UnknownFormat(_) => None,
            Self::Json(err) => Some(err),
            Self::InvalidTree(err) => Some(err),
        }
    }
}

impl From<serde_json::Error> for ExportError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

impl From<TreeValidationError> for ExportError {
    fn from(value: TreeValidationError) -> Self {
        Self::InvalidTree(value)
    }
}

/// Renders one tree in `format`.
pub fn export_tree(tree: &PageMemoTree, format: ExportFormat) -> Result<String, ExportError> {
    match format {
        ExportFormat::Structured => Ok(serde_json::to_string_pretty(tree)?),
        ExportFormat::DocumentMarkup => Ok(tree_to_markup(tree)),
        ExportFormat::FlattenedPath => Ok(tree_to_flattened(tree)),
    }
}

/// Renders every tree; structured output is one JSON array.
pub fn export_all(trees: &[PageMemoTree], format: ExportFormat) -> Result<String, ExportError> {
    if format == ExportFormat::Structured {
        return Ok(serde_json::to_string_pretty(trees)?);
    }
    let rendered = trees
        .iter()
        .map(|tree| export_tree(tree, format))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rendered.join(TREE_SEPARATOR))
}

/// Parses a structured single-tree export and validates its forest.
pub fn parse_tree(text: &str) -> Result<PageMemoTree, ExportError> {
    let tree: PageMemoTree = serde_json::from_str(text)?;
    tree.validate()?;
    Ok(tree)
}

/// Parses a structured bulk export and validates every forest.
pub fn parse_trees(text: &str) -> Result<Vec<PageMemoTree>, ExportError> {
    let trees: Vec<PageMemoTree> = serde_json::from_str(text)?;
    for tree in &trees {
        tree.validate()?;
    }
    Ok(trees)
}

fn tree_to_markup(tree: &PageMemoTree) -> String {
    let mut out = format!("# {}\n\n> URL: {}\n\n---\n\n", tree.title, tree.url);
    for node in &tree.root_nodes {
        node_to_markup(node, 0, &mut out);
    }
    out
}

fn node_to_markup(node: &MemoNode, depth: usize, out: &mut String) {
    if depth == 0 {
        out.push_str(&format!("## {}\n\n", node.name));
        if !node.content.is_empty() {
            out.push_str(&format!("{}\n\n", node.content));
        }
    } else {
        let indent = "  ".repeat(depth);
        out.push_str(&format!("{indent}- **{}**\n", node.name));
        if !node.content.is_empty() {
            let continuation = format!("\n{indent}  ");
            out.push_str(&format!(
                "{indent}  {}\n\n",
                node.content.replace('\n', &continuation)
            ));
        }
    }

    for child in &node.children {
        node_to_markup(child, depth + 1, out);
    }
}

fn tree_to_flattened(tree: &PageMemoTree) -> String {
    let mut out = format!("Title: {}\nURL: {}\n\n=== Notes ===\n\n", tree.title, tree.url);
    let mut path = Vec::new();
    for node in &tree.root_nodes {
        flatten_node(node, &mut path, &mut out);
    }
    out
}

fn flatten_node<'a>(node: &'a MemoNode, path: &mut Vec<&'a str>, out: &mut String) {
    path.push(node.name.as_str());
    out.push_str(&format!("[{}]\n", path.join(" > ")));
    if !node.content.is_empty() {
        out.push_str(&node.content);
        out.push('\n');
    }
    out.push('\n');

    for child in &node.children {
        flatten_node(child, path, out);
    }
    path.pop();
}
