//! Browsing-context to page-tree binding.
//!
//! # Responsibility
//! - Model the host's "active page changed" notifications.
//! - Resolve the tree for an address, creating it on first visit.
//!
//! # Invariants
//! - Addresses are opaque keys compared by exact string equality.
//! - Resolution never creates a second tree for an address that already has
//!   one, as long as callers resolve one context at a time.

use crate::model::page_tree::PageMemoTree;
use crate::repo::kv_tier::{KeyValueTier, StoreResult};
use crate::repo::memo_store::MemoStore;
use log::{debug, info};
use serde::{Deserialize, Serialize};

/// The page a UI host is currently showing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrowsingContext {
    pub url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub favicon: Option<String>,
}

impl BrowsingContext {
    pub fn new(url: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
            favicon: None,
        }
    }
}

/// Host notification that the active browsing context changed.
///
/// Wire shape: `{"type": "TAB_CHANGED", "data": {"url": ..., "title": ...}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContextEvent {
    /// The user switched to another tab.
    TabChanged(BrowsingContext),
    /// The current tab navigated or finished loading.
    TabUpdated(BrowsingContext),
}

impl ContextEvent {
    pub fn context(&self) -> &BrowsingContext {
        match self {
            Self::TabChanged(context) | Self::TabUpdated(context) => context,
        }
    }

    pub fn into_context(self) -> BrowsingContext {
        match self {
            Self::TabChanged(context) | Self::TabUpdated(context) => context,
        }
    }
}

/// Returns the tree bound to `context.url`, creating an empty one if absent.
///
/// New trees are seeded with the context title and favicon. Existing trees
/// are returned as stored; their title is not refreshed.
pub fn resolve_tree_for_context<B: KeyValueTier, S: KeyValueTier>(
    store: &MemoStore<B, S>,
    context: &BrowsingContext,
) -> StoreResult<PageMemoTree> {
    if let Some(tree) = store.find_tree_by_url(&context.url)? {
        debug!(
            "event=context_resolve module=context status=hit tree_id={}",
            tree.id
        );
        return Ok(tree);
    }

    let tree = store.create_tree(&context.url, &context.title, context.favicon.clone())?;
    info!(
        "event=context_resolve module=context status=created tree_id={}",
        tree.id
    );
    Ok(tree)
}
