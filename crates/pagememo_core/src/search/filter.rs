//! Case-insensitive substring filtering over memo forests and tree lists.
//!
//! # Invariants
//! - Empty queries match everything.
//! - A node matches when it, or any descendant, contains the query in its
//!   name or content.
//! - Filtering is read-only: `is_expanded` and stored data are never touched.

use crate::model::node::MemoNode;
use crate::model::page_tree::PageMemoTree;

/// Returns whether `node` or any descendant matches `query`.
pub fn matches(node: &MemoNode, query: &str) -> bool {
    if query.is_empty() {
        return true;
    }
    matches_lowered(node, &query.to_lowercase())
}

/// Projects the forest onto the nodes that match `query`.
///
/// Ancestors of deep matches are kept so the path to each match stays
/// visible. Non-matching leaves and branches are dropped from the projection.
pub fn visible_forest(forest: &[MemoNode], query: &str) -> Vec<MemoNode> {
    if query.is_empty() {
        return forest.to_vec();
    }
    let lowered = query.to_lowercase();
    prune(forest, &lowered)
}

/// Filters the tree listing by title or url.
pub fn filter_trees<'a>(trees: &'a [PageMemoTree], query: &str) -> Vec<&'a PageMemoTree> {
    if query.is_empty() {
        return trees.iter().collect();
    }
    let lowered = query.to_lowercase();
    trees
        .iter()
        .filter(|tree| {
            tree.title.to_lowercase().contains(&lowered)
                || tree.url.to_lowercase().contains(&lowered)
        })
        .collect()
}

fn matches_lowered(node: &MemoNode, lowered: &str) -> bool {
    node.name.to_lowercase().contains(lowered)
        || node.content.to_lowercase().contains(lowered)
        || node
            .children
            .iter()
            .any(|child| matches_lowered(child, lowered))
}

fn prune(forest: &[MemoNode], lowered: &str) -> Vec<MemoNode> {
    forest
        .iter()
        .filter(|node| matches_lowered(node, lowered))
        .map(|node| {
            let mut visible = node.clone();
            visible.children = prune(&node.children, lowered);
            visible
        })
        .collect()
}
