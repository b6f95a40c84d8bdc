//! Memo node domain model.
//!
//! # Responsibility
//! - Define the recursive note node persisted inside a page tree.
//! - Validate forest-wide id uniqueness before persistence.
//!
//! # Invariants
//! - `id` is stable and never reused for another node.
//! - `children` order is significant.
//! - A node owns its children, so a node can never be its own ancestor.

use super::now_epoch_ms;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable identifier for one memo node.
pub type NodeId = Uuid;

/// Display name given to nodes created from the tree toolbar.
pub const UNTITLED_NODE_NAME: &str = "New memo";

/// One note in a page memo tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoNode {
    pub id: NodeId,
    pub name: String,
    /// Markup body.
    pub content: String,
    /// Ordered child nodes. Older payloads may omit the field entirely.
    #[serde(default)]
    pub children: Vec<MemoNode>,
    pub created_at: i64,
    pub updated_at: i64,
    /// Presentation hint, persisted with the node.
    #[serde(default)]
    pub is_expanded: bool,
}

impl MemoNode {
    /// Creates an expanded leaf node with a generated id.
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self::with_id(Uuid::new_v4(), name, content, now_epoch_ms())
    }

    /// Creates an empty node named [`UNTITLED_NODE_NAME`].
    pub fn untitled() -> Self {
        Self::new(UNTITLED_NODE_NAME, "")
    }

    /// Creates an expanded leaf node with caller-provided id and timestamp.
    ///
    /// Used by import paths and tests where identity already exists.
    pub fn with_id(
        id: NodeId,
        name: impl Into<String>,
        content: impl Into<String>,
        created_at: i64,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            content: content.into(),
            children: Vec::new(),
            created_at,
            updated_at: created_at,
            is_expanded: true,
        }
    }

    /// Returns whether this node has no children.
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

/// Forest invariant violations detected before persistence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeValidationError {
    /// The same id appears more than once across the forest.
    DuplicateNodeId(NodeId),
}

impl Display for TreeValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DuplicateNodeId(id) => write!(f, "duplicate memo node id: {id}"),
        }
    }
}

impl Error for TreeValidationError {}

/// Checks that every node id in `forest` is unique.
///
/// Returns the first duplicate found in depth-first order.
pub fn validate_forest(forest: &[MemoNode]) -> Result<(), TreeValidationError> {
    let mut seen = HashSet::new();
    let mut stack: Vec<&MemoNode> = forest.iter().rev().collect();
    while let Some(node) = stack.pop() {
        if !seen.insert(node.id) {
            return Err(TreeValidationError::DuplicateNodeId(node.id));
        }
        stack.extend(node.children.iter().rev());
    }
    Ok(())
}
