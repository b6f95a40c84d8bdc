//! Single-writer editing session over one active page tree.
//!
//! # Responsibility
//! - Track the active browsing context, its tree, the selected node and the
//!   search query.
//! - Route tree edits through the pure mutation engine and persist results
//!   according to the `auto_save` setting.
//! - Hand captured page content into the selected memo.
//!
//! # Invariants
//! - All writes of the session go through one `MemoStore`; the session is the
//!   only writer while it is alive.
//! - With auto-save on, structural edits persist immediately and text edits
//!   are debounced. With auto-save off, nothing is written until `save_now`.
//! - The selection always names a node of the active tree or nothing.
//! - The active forest always passes validation; edits that would break it
//!   are refused before any state changes.
//! - A debounced snapshot is dropped only after it was written.

use super::autosave::Debouncer;
use super::context_binding::{resolve_tree_for_context, BrowsingContext, ContextEvent};
use crate::capture::{append_content, CaptureReceiver};
use crate::config::CoreConfig;
use crate::export::{self, ExportError, ExportFormat};
use crate::model::node::{validate_forest, MemoNode, NodeId};
use crate::model::page_tree::{PageMemoTree, TreeId, TreeSummary};
use crate::model::settings::{Settings, SettingsPatch};
use crate::repo::kv_tier::{KeyValueTier, StoreError};
use crate::repo::memo_store::{MemoStore, MigrationReport};
use crate::search::filter::{filter_trees, visible_forest};
use crate::tree::edit::TreeEdit;
use crate::tree::ops::{contains_node, find_by_id};
use log::{debug, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Result type for session operations.
pub type SessionResult<T> = Result<T, SessionError>;

/// Errors from session operations.
#[derive(Debug)]
pub enum SessionError {
    /// Operation needs an active tree but no context is bound.
    NoActiveTree,
    /// Persistence failure.
    Store(StoreError),
    /// Export rendering failure.
    Export(ExportError),
}

impl Display for SessionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoActiveTree => write!(f, "no page tree is active"),
            Self::Store(err) => write!(f, "{err}"),
            Self::Export(err) => write!(f, "{err}"),
        }
    }
}

impl Error for SessionError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::NoActiveTree => None,
            Self::Store(err) => Some(err),
            Self::Export(err) => Some(err),
        }
    }
}

impl From<StoreError> for SessionError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

impl From<ExportError> for SessionError {
    fn from(value: ExportError) -> Self {
        Self::Export(value)
    }
}

/// Editing session facade.
pub struct MemoSession<B: KeyValueTier, S: KeyValueTier> {
    store: MemoStore<B, S>,
    settings: Settings,
    context: Option<BrowsingContext>,
    tree: Option<PageMemoTree>,
    selected: Option<NodeId>,
    query: String,
    autosave: Debouncer<PageMemoTree>,
    dirty: bool,
}

impl<B: KeyValueTier, S: KeyValueTier> MemoSession<B, S> {
    /// Starts a session: migrates legacy trees once, then loads settings.
    ///
    /// The autosave window comes from `config`. A failed migration is logged
    /// and does not prevent the session from starting.
    pub fn start(store: MemoStore<B, S>, config: &CoreConfig) -> SessionResult<Self> {
        let migration = store.migrate_bulk_tier_once();
        if let MigrationReport::Failed(reason) = &migration {
            warn!("event=session_start module=session status=degraded reason=migration_failed error={reason}");
        }
        let settings = store.settings()?;
        info!(
            "event=session_start module=session status=ok auto_save={}",
            settings.auto_save
        );

        Ok(Self {
            store,
            settings,
            context: None,
            tree: None,
            selected: None,
            query: String::new(),
            autosave: Debouncer::new(config.autosave_delay_ms),
            dirty: false,
        })
    }

    pub fn store(&self) -> &MemoStore<B, S> {
        &self.store
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn context(&self) -> Option<&BrowsingContext> {
        self.context.as_ref()
    }

    pub fn active_tree(&self) -> Option<&PageMemoTree> {
        self.tree.as_ref()
    }

    /// Whether the active tree has edits that were not written yet.
    pub fn has_unsaved_changes(&self) -> bool {
        self.dirty
    }

    /// Deadline of the pending debounced save, if one is scheduled.
    pub fn autosave_deadline(&self) -> Option<i64> {
        self.autosave.deadline()
    }

    /// Binds the session to `context`, resolving or creating its tree.
    ///
    /// Pending edits are written first when auto-save is on; if that write
    /// fails the session stays on the current tree. Unsaved edits made with
    /// auto-save off are discarded. Selection is cleared.
    pub fn bind_context(&mut self, context: BrowsingContext) -> SessionResult<&PageMemoTree> {
        self.flush_pending()?;
        if self.dirty && self.settings.auto_save {
            self.persist_active()?;
        }
        if self.dirty {
            warn!(
                "event=context_bind module=session status=discarded_unsaved tree_id={}",
                self.tree.as_ref().map(|tree| tree.id.to_string()).unwrap_or_default()
            );
        }

        let tree = resolve_tree_for_context(&self.store, &context)?;
        self.context = Some(context);
        self.selected = None;
        self.dirty = false;
        Ok(&*self.tree.insert(tree))
    }

    /// Handles a host context notification.
    pub fn on_context_event(&mut self, event: ContextEvent) -> SessionResult<&PageMemoTree> {
        self.bind_context(event.into_context())
    }

    pub fn selected_id(&self) -> Option<NodeId> {
        self.selected
    }

    pub fn selected_node(&self) -> Option<&MemoNode> {
        let tree = self.tree.as_ref()?;
        find_by_id(&tree.root_nodes, self.selected?)
    }

    /// Selects `node_id`, or clears the selection with `None`.
    ///
    /// Returns `false` and leaves the selection unchanged when the node is
    /// not part of the active tree.
    pub fn select(&mut self, node_id: Option<NodeId>) -> bool {
        match node_id {
            None => {
                self.selected = None;
                true
            }
            Some(id) => {
                let found = self
                    .tree
                    .as_ref()
                    .is_some_and(|tree| contains_node(&tree.root_nodes, id));
                if found {
                    self.selected = Some(id);
                }
                found
            }
        }
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn set_query(&mut self, query: impl Into<String>) {
        self.query = query.into();
    }

    /// Roots of the active tree as they should be rendered for the query.
    pub fn visible_roots(&self) -> Vec<MemoNode> {
        match &self.tree {
            Some(tree) => visible_forest(&tree.root_nodes, &self.query),
            None => Vec::new(),
        }
    }

    /// Applies `edit` to the active tree. Returns whether the forest changed.
    ///
    /// Rejected moves and edits naming missing nodes leave everything
    /// unchanged and return `false`.
    ///
    /// # Errors
    /// - `Store(InvalidTree)` when the edit inserts a node id already present
    ///   in the forest; the session is left untouched.
    /// - `Store(..)` when an immediate write fails; the edit stays in memory
    ///   and is retried by the next save.
    pub fn apply_edit(&mut self, edit: TreeEdit, now: i64) -> SessionResult<bool> {
        let tree = self.tree.as_ref().ok_or(SessionError::NoActiveTree)?;
        let next_roots = match edit.try_apply(&tree.root_nodes, now) {
            Ok(roots) => roots,
            Err(rejection) => {
                warn!(
                    "event=tree_edit module=session status=rejected op={} reason={rejection}",
                    edit.label()
                );
                return Ok(false);
            }
        };
        if next_roots == tree.root_nodes {
            debug!(
                "event=tree_edit module=session status=noop op={}",
                edit.label()
            );
            return Ok(false);
        }
        if let Err(err) = validate_forest(&next_roots) {
            warn!(
                "event=tree_edit module=session status=rejected op={} reason={err}",
                edit.label()
            );
            return Err(StoreError::InvalidTree(err).into());
        }

        let next = tree.with_roots(next_roots, now);
        if let Some(inserted) = edit.inserted_node_id() {
            self.selected = Some(inserted);
        } else if self
            .selected
            .is_some_and(|id| !contains_node(&next.root_nodes, id))
        {
            self.selected = None;
        }
        self.tree = Some(next);
        self.dirty = true;

        if !self.settings.auto_save {
            return Ok(true);
        }
        if edit.is_content_edit() {
            if let Some(snapshot) = &self.tree {
                self.autosave.schedule(snapshot.clone(), now);
            }
        } else {
            self.persist_active()?;
            self.autosave.cancel();
        }
        Ok(true)
    }

    /// Persists the debounced snapshot once its deadline has passed.
    ///
    /// Returns whether a write happened.
    pub fn flush_due(&mut self, now: i64) -> SessionResult<bool> {
        let Some(snapshot) = self.autosave.due(now).cloned() else {
            return Ok(false);
        };
        self.persist_snapshot(&snapshot)?;
        self.autosave.cancel();
        Ok(true)
    }

    /// Persists the active tree immediately, dropping any pending debounce.
    pub fn save_now(&mut self) -> SessionResult<()> {
        if self.tree.is_none() {
            return Err(SessionError::NoActiveTree);
        }
        self.persist_active()?;
        self.autosave.cancel();
        Ok(())
    }

    /// Deletes a stored tree; the session unbinds if it was the active one.
    pub fn delete_tree(&mut self, tree_id: TreeId) -> SessionResult<bool> {
        if self.tree.as_ref().is_some_and(|tree| tree.id == tree_id) {
            self.autosave.cancel();
            self.tree = None;
            self.context = None;
            self.selected = None;
            self.dirty = false;
        }
        Ok(self.store.delete_tree(tree_id)?)
    }

    /// Merges `patch` into the stored settings.
    ///
    /// Turning auto-save on writes any unsaved edits right away.
    pub fn update_settings(&mut self, patch: &SettingsPatch) -> SessionResult<&Settings> {
        self.settings = self.store.update_settings(patch)?;
        if self.settings.auto_save && self.dirty {
            self.persist_active()?;
            self.autosave.cancel();
        }
        Ok(&self.settings)
    }

    /// Lists stored trees whose title or address contains `query`.
    pub fn list_trees(&self, query: &str) -> SessionResult<Vec<TreeSummary>> {
        let trees = self.store.all_trees()?;
        Ok(filter_trees(&trees, query)
            .into_iter()
            .map(TreeSummary::from)
            .collect())
    }

    /// Renders the active tree, including unsaved edits.
    pub fn export_current(&self, format: ExportFormat) -> SessionResult<String> {
        let tree = self.tree.as_ref().ok_or(SessionError::NoActiveTree)?;
        Ok(export::export_tree(tree, format)?)
    }

    /// Renders every stored tree.
    pub fn export_all(&self, format: ExportFormat) -> SessionResult<String> {
        let trees = self.store.all_trees()?;
        Ok(export::export_all(&trees, format)?)
    }

    /// Appends the latest fresh capture to `node_id`'s content.
    ///
    /// Returns `false` when there is no fresh capture or the node is missing;
    /// the capture is consumed either way.
    pub fn apply_capture(
        &mut self,
        node_id: NodeId,
        receiver: &CaptureReceiver,
        now: i64,
    ) -> SessionResult<bool> {
        let Some(capture) = receiver.take_fresh(now) else {
            return Ok(false);
        };
        let tree = self.tree.as_ref().ok_or(SessionError::NoActiveTree)?;
        let Some(node) = find_by_id(&tree.root_nodes, node_id) else {
            debug!("event=capture_apply module=session status=skipped reason=node_not_found node_id={node_id}");
            return Ok(false);
        };

        let edit = TreeEdit::Edit {
            node_id,
            name: node.name.clone(),
            content: append_content(&node.content, &capture.to_markup()),
        };
        self.apply_edit(edit, now)
    }

    fn flush_pending(&mut self) -> SessionResult<()> {
        if let Some(snapshot) = self.autosave.pending().cloned() {
            self.persist_snapshot(&snapshot)?;
            self.autosave.cancel();
        }
        Ok(())
    }

    fn persist_active(&mut self) -> SessionResult<()> {
        let Some(tree) = self.tree.clone() else {
            return Ok(());
        };
        self.persist_snapshot(&tree)
    }

    fn persist_snapshot(&mut self, snapshot: &PageMemoTree) -> SessionResult<()> {
        match self.store.update_tree(snapshot)? {
            Some(stored) => {
                if let Some(active) = self.tree.as_mut().filter(|tree| tree.id == stored.id) {
                    active.updated_at = stored.updated_at;
                    if active.root_nodes == stored.root_nodes {
                        self.dirty = false;
                    }
                }
                debug!(
                    "event=tree_save module=session status=ok tree_id={}",
                    stored.id
                );
            }
            None => {
                warn!(
                    "event=tree_save module=session status=skipped reason=not_found tree_id={}",
                    snapshot.id
                );
            }
        }
        Ok(())
    }
}
