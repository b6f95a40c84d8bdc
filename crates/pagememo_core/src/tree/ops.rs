//! Pure structural edits over a memo forest.
//!
//! # Responsibility
//! - Rebuild the forest for insert/delete/toggle/edit/move requests.
//! - Guard move requests against parent-child cycles.
//!
//! # Invariants
//! - Input slices are never mutated; every function returns a fresh forest.
//! - Unknown ids are no-ops that return an equal forest.
//! - Sibling order is preserved; inserts and moves append at the end.

use crate::model::node::{MemoNode, NodeId};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Reasons a move request is refused without touching the forest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveRejection {
    /// Dragged node was dropped onto itself.
    SelfTarget(NodeId),
    /// Target lies inside the dragged subtree.
    TargetInsideDragged {
        dragged_id: NodeId,
        target_id: NodeId,
    },
    /// Dragged node does not exist.
    DraggedNotFound(NodeId),
    /// Target node does not exist once the dragged subtree is detached.
    TargetNotFound(NodeId),
}

impl Display for MoveRejection {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SelfTarget(id) => write!(f, "memo node cannot be moved into itself: {id}"),
            Self::TargetInsideDragged {
                dragged_id,
                target_id,
            } => write!(
                f,
                "move would create cycle: node {dragged_id} under descendant {target_id}"
            ),
            Self::DraggedNotFound(id) => write!(f, "dragged memo node not found: {id}"),
            Self::TargetNotFound(id) => write!(f, "move target not found: {id}"),
        }
    }
}

impl Error for MoveRejection {}

/// Flips `is_expanded` on the node matching `node_id`.
pub fn toggle_expand(forest: &[MemoNode], node_id: NodeId) -> Vec<MemoNode> {
    rebuild_matching(forest, node_id, &|node| {
        let mut toggled = node.clone();
        toggled.is_expanded = !node.is_expanded;
        toggled
    })
}

/// Appends `new_node` as the last child of `parent_id` and expands the parent.
///
/// Returns an equal forest when `parent_id` is absent.
pub fn add_child(forest: &[MemoNode], parent_id: NodeId, new_node: &MemoNode) -> Vec<MemoNode> {
    if !contains_node(forest, parent_id) {
        return forest.to_vec();
    }
    rebuild_matching(forest, parent_id, &|parent| {
        let mut children = parent.children.clone();
        children.push(new_node.clone());
        let mut expanded = with_children(parent, children);
        expanded.is_expanded = true;
        expanded
    })
}

/// Appends `new_node` at root level.
pub fn add_root(forest: &[MemoNode], new_node: &MemoNode) -> Vec<MemoNode> {
    let mut roots = forest.to_vec();
    roots.push(new_node.clone());
    roots
}

/// Removes the node matching `node_id` together with its subtree.
///
/// Idempotent: deleting an absent id returns an equal forest.
pub fn delete_subtree(forest: &[MemoNode], node_id: NodeId) -> Vec<MemoNode> {
    forest
        .iter()
        .filter(|node| node.id != node_id)
        .map(|node| {
            if node.children.is_empty() {
                node.clone()
            } else {
                with_children(node, delete_subtree(&node.children, node_id))
            }
        })
        .collect()
}

/// Replaces `name` and `content` on the matching node and stamps `updated_at`.
pub fn rename_or_edit(
    forest: &[MemoNode],
    node_id: NodeId,
    name: &str,
    content: &str,
    edited_at: i64,
) -> Vec<MemoNode> {
    rebuild_matching(forest, node_id, &|node| {
        let mut edited = node.clone();
        edited.name = name.to_string();
        edited.content = content.to_string();
        edited.updated_at = edited_at;
        edited
    })
}

/// Swaps the node with the same id as `replacement` for `replacement`.
///
/// The replacement carries its own children; callers committing an edited
/// copy of a node are expected to keep them.
pub fn replace_node(forest: &[MemoNode], replacement: &MemoNode) -> Vec<MemoNode> {
    rebuild_matching(forest, replacement.id, &|_| replacement.clone())
}

/// Moves the subtree rooted at `dragged_id` to the end of `target_id`'s children.
///
/// Returns an equal forest whenever [`try_move`] rejects the request.
pub fn move_node(forest: &[MemoNode], dragged_id: NodeId, target_id: NodeId) -> Vec<MemoNode> {
    try_move(forest, dragged_id, target_id).unwrap_or_else(|_| forest.to_vec())
}

/// Moves the subtree rooted at `dragged_id` under `target_id`, reporting rejections.
///
/// # Invariants
/// - The cycle guard runs before any detachment.
/// - The detached subtree is never dropped: if the target cannot be found
///   after detachment, the request is rejected and the input stays valid.
/// - The target is expanded after a successful move.
pub fn try_move(
    forest: &[MemoNode],
    dragged_id: NodeId,
    target_id: NodeId,
) -> Result<Vec<MemoNode>, MoveRejection> {
    if dragged_id == target_id {
        return Err(MoveRejection::SelfTarget(dragged_id));
    }

    let dragged = find_by_id(forest, dragged_id).ok_or(MoveRejection::DraggedNotFound(dragged_id))?;
    if find_by_id(&dragged.children, target_id).is_some() {
        return Err(MoveRejection::TargetInsideDragged {
            dragged_id,
            target_id,
        });
    }

    let mut detached = None;
    let remaining = detach_first(forest, dragged_id, &mut detached);
    let subtree = detached.ok_or(MoveRejection::DraggedNotFound(dragged_id))?;
    if !contains_node(&remaining, target_id) {
        return Err(MoveRejection::TargetNotFound(target_id));
    }

    Ok(rebuild_matching(&remaining, target_id, &|target| {
        let mut children = target.children.clone();
        children.push(subtree.clone());
        let mut expanded = with_children(target, children);
        expanded.is_expanded = true;
        expanded
    }))
}

/// Depth-first search across the forest, returning the first match.
pub fn find_by_id(forest: &[MemoNode], node_id: NodeId) -> Option<&MemoNode> {
    for node in forest {
        if node.id == node_id {
            return Some(node);
        }
        if let Some(found) = find_by_id(&node.children, node_id) {
            return Some(found);
        }
    }
    None
}

/// Returns whether any node in the forest has `node_id`.
pub fn contains_node(forest: &[MemoNode], node_id: NodeId) -> bool {
    find_by_id(forest, node_id).is_some()
}

/// Returns whether `node_id` is a strict descendant of `ancestor_id`.
pub fn is_in_subtree(forest: &[MemoNode], ancestor_id: NodeId, node_id: NodeId) -> bool {
    find_by_id(forest, ancestor_id)
        .map(|ancestor| contains_node(&ancestor.children, node_id))
        .unwrap_or(false)
}

/// Counts every node in the forest, roots and descendants.
pub fn count_nodes(forest: &[MemoNode]) -> usize {
    forest
        .iter()
        .map(|node| 1 + count_nodes(&node.children))
        .sum()
}

fn rebuild_matching<F>(forest: &[MemoNode], node_id: NodeId, edit: &F) -> Vec<MemoNode>
where
    F: Fn(&MemoNode) -> MemoNode,
{
    forest
        .iter()
        .map(|node| {
            if node.id == node_id {
                edit(node)
            } else if node.children.is_empty() {
                node.clone()
            } else {
                with_children(node, rebuild_matching(&node.children, node_id, edit))
            }
        })
        .collect()
}

fn detach_first(
    forest: &[MemoNode],
    node_id: NodeId,
    detached: &mut Option<MemoNode>,
) -> Vec<MemoNode> {
    let mut remaining = Vec::with_capacity(forest.len());
    for node in forest {
        if detached.is_some() {
            remaining.push(node.clone());
        } else if node.id == node_id {
            *detached = Some(node.clone());
        } else if node.children.is_empty() {
            remaining.push(node.clone());
        } else {
            let children = detach_first(&node.children, node_id, detached);
            remaining.push(with_children(node, children));
        }
    }
    remaining
}

fn with_children(node: &MemoNode, children: Vec<MemoNode>) -> MemoNode {
    MemoNode {
        id: node.id,
        name: node.name.clone(),
        content: node.content.clone(),
        children,
        created_at: node.created_at,
        updated_at: node.updated_at,
        is_expanded: node.is_expanded,
    }
}

#[cfg(test)]
mod tests {
    use super::{
        add_child, add_root, count_nodes, delete_subtree, find_by_id, is_in_subtree, move_node,
        rename_or_edit, replace_node, toggle_expand, try_move, MoveRejection,
    };
    use crate::model::node::MemoNode;
    use uuid::Uuid;

    fn node(name: &str) -> MemoNode {
        MemoNode::with_id(Uuid::new_v4(), name, "", 1_000)
    }

    fn parent_of(mut parent: MemoNode, children: Vec<MemoNode>) -> MemoNode {
        parent.children = children;
        parent
    }

    #[test]
    fn toggle_expand_flips_nested_node_only() {
        let leaf = node("leaf");
        let root = parent_of(node("root"), vec![leaf.clone()]);
        let forest = vec![root.clone()];

        let toggled = toggle_expand(&forest, leaf.id);
        assert!(!find_by_id(&toggled, leaf.id).unwrap().is_expanded);
        assert!(find_by_id(&toggled, root.id).unwrap().is_expanded);
        assert!(find_by_id(&forest, leaf.id).unwrap().is_expanded);
    }

    #[test]
    fn toggle_expand_unknown_id_is_noop() {
        let forest = vec![node("a")];
        assert_eq!(toggle_expand(&forest, Uuid::new_v4()), forest);
    }

    #[test]
    fn add_child_appends_and_expands_parent() {
        let mut parent = parent_of(node("parent"), vec![node("first")]);
        parent.is_expanded = false;
        let forest = vec![parent.clone()];
        let child = node("second");

        let updated = add_child(&forest, parent.id, &child);
        let stored_parent = find_by_id(&updated, parent.id).unwrap();
        assert!(stored_parent.is_expanded);
        assert_eq!(stored_parent.children.len(), 2);
        assert_eq!(stored_parent.children[1].id, child.id);
    }

    #[test]
    fn add_child_to_missing_parent_returns_input() {
        let forest: Vec<MemoNode> = Vec::new();
        assert!(add_child(&forest, Uuid::new_v4(), &node("n")).is_empty());
    }

    #[test]
    fn add_root_appends_at_end() {
        let forest = vec![node("a")];
        let added = node("b");
        let updated = add_root(&forest, &added);
        assert_eq!(updated.len(), 2);
        assert_eq!(updated[1].id, added.id);
    }

    #[test]
    fn delete_subtree_removes_descendants_and_is_idempotent() {
        let grandchild = node("grandchild");
        let child = parent_of(node("child"), vec![grandchild.clone()]);
        let sibling = node("sibling");
        let root = parent_of(node("root"), vec![child.clone(), sibling.clone()]);
        let forest = vec![root.clone()];

        let once = delete_subtree(&forest, child.id);
        assert!(find_by_id(&once, child.id).is_none());
        assert!(find_by_id(&once, grandchild.id).is_none());
        assert!(find_by_id(&once, sibling.id).is_some());
        assert_eq!(delete_subtree(&once, child.id), once);
    }

    #[test]
    fn rename_or_edit_keeps_children() {
        let child = node("child");
        let root = parent_of(node("root"), vec![child.clone()]);
        let forest = vec![root.clone()];

        let updated = rename_or_edit(&forest, root.id, "renamed", "body", 5_000);
        let stored = find_by_id(&updated, root.id).unwrap();
        assert_eq!(stored.name, "renamed");
        assert_eq!(stored.content, "body");
        assert_eq!(stored.updated_at, 5_000);
        assert_eq!(stored.created_at, 1_000);
        assert_eq!(stored.children, vec![child]);
    }

    #[test]
    fn replace_node_swaps_by_id() {
        let leaf = node("leaf");
        let forest = vec![parent_of(node("root"), vec![leaf.clone()])];
        let mut edited = leaf.clone();
        edited.content = "edited".to_string();

        let updated = replace_node(&forest, &edited);
        assert_eq!(find_by_id(&updated, leaf.id).unwrap().content, "edited");
    }

    #[test]
    fn move_sibling_under_sibling() {
        let a = node("a");
        let b = node("b");
        let forest = vec![a.clone(), b.clone()];

        let moved = move_node(&forest, b.id, a.id);
        assert_eq!(moved.len(), 1);
        assert_eq!(moved[0].id, a.id);
        assert_eq!(moved[0].children.len(), 1);
        assert_eq!(moved[0].children[0].id, b.id);
        assert!(moved[0].is_expanded);
        assert_eq!(count_nodes(&moved), 2);
    }

    #[test]
    fn move_into_own_descendant_is_rejected() {
        let b = node("b");
        let a = parent_of(node("a"), vec![b.clone()]);
        let forest = vec![a.clone()];

        assert_eq!(move_node(&forest, a.id, b.id), forest);
        assert_eq!(
            try_move(&forest, a.id, b.id).unwrap_err(),
            MoveRejection::TargetInsideDragged {
                dragged_id: a.id,
                target_id: b.id
            }
        );
    }

    #[test]
    fn move_onto_itself_is_rejected() {
        let a = node("a");
        let forest = vec![a.clone()];
        assert_eq!(
            try_move(&forest, a.id, a.id).unwrap_err(),
            MoveRejection::SelfTarget(a.id)
        );
    }

    #[test]
    fn move_to_missing_target_keeps_dragged_subtree() {
        let child = node("child");
        let a = parent_of(node("a"), vec![child.clone()]);
        let forest = vec![a.clone()];
        let missing = Uuid::new_v4();

        assert_eq!(
            try_move(&forest, child.id, missing).unwrap_err(),
            MoveRejection::TargetNotFound(missing)
        );
        let unchanged = move_node(&forest, child.id, missing);
        assert_eq!(unchanged, forest);
        assert_eq!(count_nodes(&unchanged), 2);
    }

    #[test]
    fn move_missing_dragged_is_rejected() {
        let a = node("a");
        let forest = vec![a.clone()];
        let missing = Uuid::new_v4();
        assert_eq!(
            try_move(&forest, missing, a.id).unwrap_err(),
            MoveRejection::DraggedNotFound(missing)
        );
    }

    #[test]
    fn move_nested_node_to_other_branch_preserves_count() {
        let deep = node("deep");
        let mid = parent_of(node("mid"), vec![deep.clone()]);
        let left = parent_of(node("left"), vec![mid.clone()]);
        let right = parent_of(node("right"), vec![node("r1")]);
        let forest = vec![left.clone(), right.clone()];

        let moved = move_node(&forest, mid.id, right.id);
        assert_eq!(count_nodes(&moved), count_nodes(&forest));
        assert!(is_in_subtree(&moved, right.id, deep.id));
        assert!(!is_in_subtree(&moved, left.id, mid.id));
        let right_after = find_by_id(&moved, right.id).unwrap();
        assert_eq!(right_after.children.last().unwrap().id, mid.id);
    }

    #[test]
    fn move_child_to_its_own_parent_reappends_at_end() {
        let first = node("first");
        let second = node("second");
        let parent = parent_of(node("parent"), vec![first.clone(), second.clone()]);
        let forest = vec![parent.clone()];

        let moved = move_node(&forest, first.id, parent.id);
        let children = &find_by_id(&moved, parent.id).unwrap().children;
        assert_eq!(children[0].id, second.id);
        assert_eq!(children[1].id, first.id);
    }
}
