//! Tree edit commands dispatched by UI hosts.
//!
//! A `TreeEdit` is plain data so hosts can send edits across the FFI boundary
//! as JSON and the session can log and replay them.

use super::ops::{self, MoveRejection};
use crate::model::node::{MemoNode, NodeId};
use serde::{Deserialize, Serialize};

/// One structural or content edit against a memo forest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum TreeEdit {
    ToggleExpand {
        node_id: NodeId,
    },
    /// Appends `node` under `parent_id`; a fresh untitled node when omitted.
    AddChild {
        parent_id: NodeId,
        #[serde(default = "MemoNode::untitled")]
        node: MemoNode,
    },
    /// Appends `node` at root level; a fresh untitled node when omitted.
    AddRoot {
        #[serde(default = "MemoNode::untitled")]
        node: MemoNode,
    },
    Delete {
        node_id: NodeId,
    },
    Edit {
        node_id: NodeId,
        name: String,
        content: String,
    },
    Move {
        dragged_id: NodeId,
        target_id: NodeId,
    },
}

impl TreeEdit {
    /// Adds a fresh untitled child under `parent_id`.
    pub fn add_child(parent_id: NodeId) -> Self {
        Self::AddChild {
            parent_id,
            node: MemoNode::untitled(),
        }
    }

    /// Adds a fresh untitled root node.
    pub fn add_root() -> Self {
        Self::AddRoot {
            node: MemoNode::untitled(),
        }
    }

    /// Applies this edit, returning the new forest.
    ///
    /// `now` stamps `updated_at` on content edits. Rejected moves return an
    /// equal forest.
    pub fn apply(&self, forest: &[MemoNode], now: i64) -> Vec<MemoNode> {
        self.try_apply(forest, now).unwrap_or_else(|_| forest.to_vec())
    }

    /// Applies this edit, surfacing the reason a move was refused.
    ///
    /// Non-move edits never fail; their not-found cases are no-ops.
    pub fn try_apply(
        &self,
        forest: &[MemoNode],
        now: i64,
    ) -> Result<Vec<MemoNode>, MoveRejection> {
        let next = match self {
            Self::ToggleExpand { node_id } => ops::toggle_expand(forest, *node_id),
            Self::AddChild { parent_id, node } => ops::add_child(forest, *parent_id, node),
            Self::AddRoot { node } => ops::add_root(forest, node),
            Self::Delete { node_id } => ops::delete_subtree(forest, *node_id),
            Self::Edit {
                node_id,
                name,
                content,
            } => ops::rename_or_edit(forest, *node_id, name, content, now),
            Self::Move {
                dragged_id,
                target_id,
            } => ops::try_move(forest, *dragged_id, *target_id)?,
        };
        Ok(next)
    }

    /// Returns the id of the node this edit inserts, if any.
    pub fn inserted_node_id(&self) -> Option<NodeId> {
        match self {
            Self::AddChild { node, .. } | Self::AddRoot { node } => Some(node.id),
            _ => None,
        }
    }

    /// Returns whether this edit changes text rather than structure.
    pub fn is_content_edit(&self) -> bool {
        matches!(self, Self::Edit { .. })
    }

    /// Stable label used in log lines.
    pub fn label(&self) -> &'static str {
        match self {
            Self::ToggleExpand { .. } => "toggle_expand",
            Self::AddChild { .. } => "add_child",
            Self::AddRoot { .. } => "add_root",
            Self::Delete { .. } => "delete",
            Self::Edit { .. } => "edit",
            Self::Move { .. } => "move",
        }
    }
}
