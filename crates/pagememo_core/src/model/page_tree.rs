//! Page memo tree root container.
//!
//! # Invariants
//! - `url` is an exact-match key; it is never normalized.
//! - `root_nodes` order is significant.

use super::node::{validate_forest, MemoNode, TreeValidationError};
use super::now_epoch_ms;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable identifier for one page memo tree.
pub type TreeId = Uuid;

/// All memos attached to one browsing-context address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMemoTree {
    pub id: TreeId,
    pub url: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub favicon: Option<String>,
    #[serde(default)]
    pub root_nodes: Vec<MemoNode>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl PageMemoTree {
    /// Creates an empty tree for `url` with a generated id.
    pub fn new(url: impl Into<String>, title: impl Into<String>, favicon: Option<String>) -> Self {
        let now = now_epoch_ms();
        Self {
            id: Uuid::new_v4(),
            url: url.into(),
            title: title.into(),
            favicon,
            root_nodes: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Returns a copy carrying `root_nodes` and a refreshed `updated_at`.
    pub fn with_roots(&self, root_nodes: Vec<MemoNode>, updated_at: i64) -> Self {
        Self {
            root_nodes,
            updated_at,
            ..self.clone()
        }
    }

    /// Validates the forest invariants of this tree.
    pub fn validate(&self) -> Result<(), TreeValidationError> {
        validate_forest(&self.root_nodes)
    }
}

/// Lightweight listing projection for the "all trees" view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeSummary {
    pub id: TreeId,
    pub url: String,
    pub title: String,
    /// Number of root-level memos.
    pub root_count: usize,
    pub updated_at: i64,
}

impl From<&PageMemoTree> for TreeSummary {
    fn from(tree: &PageMemoTree) -> Self {
        Self {
            id: tree.id,
            url: tree.url.clone(),
            title: tree.title.clone(),
            root_count: tree.root_nodes.len(),
            updated_at: tree.updated_at,
        }
    }
}
