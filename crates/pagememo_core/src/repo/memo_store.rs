//! Two-tier memo collection store.
//!
//! # Responsibility
//! - Map the page tree collection onto the bulk tier and settings onto the
//!   synced tier.
//! - Provide read-modify-write operations over the whole collection.
//! - Migrate trees left in the synced tier by older builds.
//!
//! # Invariants
//! - Tree snapshots are validated before they are written.
//! - Tree operations only write the bulk tier; settings operations only
//!   write the synced tier.
//! - A failure in one tier never prevents the write to the other tier.
//! - Read-modify-write operations are not atomic; callers serialize them.

use super::kv_tier::{read_json, write_json, KeyValueTier, StoreError, StoreResult};
use crate::model::page_tree::{PageMemoTree, TreeId};
use crate::model::settings::{Settings, SettingsPatch};
use crate::model::{now_epoch_ms, StorageData};
use log::{error, info, warn};
use std::collections::HashSet;

/// Bulk tier key holding the array of page trees.
pub const TREES_KEY: &str = "pageMemoTrees";
/// Synced tier key holding the settings record.
pub const SETTINGS_KEY: &str = "settings";

/// Outcome of [`MemoStore::migrate_bulk_tier_once`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationReport {
    /// The synced tier holds no trees.
    NothingToMigrate,
    /// Trees were merged into the bulk tier and the synced copy was cleared.
    Migrated {
        /// Trees newly added to the bulk tier.
        migrated: usize,
        /// Trees skipped because the bulk tier already had their id.
        skipped: usize,
    },
    /// Migration failed; the error was logged and nothing is retried.
    Failed(String),
}

/// Memo collection store over a bulk tier `B` and a synced tier `S`.
pub struct MemoStore<B: KeyValueTier, S: KeyValueTier> {
    bulk: B,
    synced: S,
}

impl<B: KeyValueTier, S: KeyValueTier> MemoStore<B, S> {
    /// Creates a store from its two tiers.
    pub fn new(bulk: B, synced: S) -> Self {
        Self { bulk, synced }
    }

    /// Returns the bulk tier.
    pub fn bulk_tier(&self) -> &B {
        &self.bulk
    }

    /// Returns the synced tier.
    pub fn synced_tier(&self) -> &S {
        &self.synced
    }

    /// Loads the full collection; unset tiers fall back to empty/default.
    pub fn load_all(&self) -> StoreResult<StorageData> {
        Ok(StorageData {
            page_memo_trees: self.all_trees()?,
            settings: self.settings()?,
        })
    }

    /// Writes the full collection to both tiers.
    ///
    /// Both writes are attempted even if the first fails. Trees are validated
    /// before either write happens.
    ///
    /// # Errors
    /// - `InvalidTree` when any tree violates forest invariants.
    /// - `PartialWrite` naming the tier(s) whose write failed.
    pub fn save_all(&self, data: &StorageData) -> StoreResult<()> {
        for tree in &data.page_memo_trees {
            tree.validate()?;
        }

        let bulk = write_json(&self.bulk, TREES_KEY, &data.page_memo_trees).err();
        let synced = write_json(&self.synced, SETTINGS_KEY, &data.settings).err();
        if bulk.is_none() && synced.is_none() {
            return Ok(());
        }

        error!(
            "event=store_save module=store status=error bulk_ok={} synced_ok={}",
            bulk.is_none(),
            synced.is_none()
        );
        Err(StoreError::PartialWrite {
            bulk: bulk.map(Box::new),
            synced: synced.map(Box::new),
        })
    }

    /// Returns every stored page tree in insertion order.
    pub fn all_trees(&self) -> StoreResult<Vec<PageMemoTree>> {
        Ok(read_json(&self.bulk, TREES_KEY)?.unwrap_or_default())
    }

    /// Returns stored settings, or defaults when none were saved.
    pub fn settings(&self) -> StoreResult<Settings> {
        Ok(read_json(&self.synced, SETTINGS_KEY)?.unwrap_or_default())
    }

    /// Finds the tree bound to `url` by exact string equality.
    pub fn find_tree_by_url(&self, url: &str) -> StoreResult<Option<PageMemoTree>> {
        Ok(self.all_trees()?.into_iter().find(|tree| tree.url == url))
    }

    /// Finds a tree by id.
    pub fn get_tree(&self, tree_id: TreeId) -> StoreResult<Option<PageMemoTree>> {
        Ok(self.all_trees()?.into_iter().find(|tree| tree.id == tree_id))
    }

    /// Creates and persists an empty tree for `url`.
    ///
    /// Does not check for an existing tree with the same url; use
    /// [`crate::service::context_binding::resolve_tree_for_context`] for
    /// resolve-or-create semantics.
    pub fn create_tree(
        &self,
        url: &str,
        title: &str,
        favicon: Option<String>,
    ) -> StoreResult<PageMemoTree> {
        let mut trees = self.all_trees()?;
        let tree = PageMemoTree::new(url, title, favicon);
        trees.push(tree.clone());
        self.save_trees(&trees)?;

        info!(
            "event=tree_create module=store status=ok tree_id={} tree_count={}",
            tree.id,
            trees.len()
        );
        Ok(tree)
    }

    /// Replaces the stored tree with the same id and refreshes `updated_at`.
    ///
    /// Returns the stored copy, or `None` when no tree has that id (nothing
    /// is written in that case).
    pub fn update_tree(&self, tree: &PageMemoTree) -> StoreResult<Option<PageMemoTree>> {
        tree.validate()?;

        let mut trees = self.all_trees()?;
        let Some(slot) = trees.iter_mut().find(|stored| stored.id == tree.id) else {
            warn!(
                "event=tree_update module=store status=skipped reason=not_found tree_id={}",
                tree.id
            );
            return Ok(None);
        };

        let mut stored = tree.clone();
        stored.updated_at = now_epoch_ms();
        *slot = stored.clone();
        self.save_trees(&trees)?;
        Ok(Some(stored))
    }

    /// Removes the tree with `tree_id`. Returns whether a tree was removed.
    pub fn delete_tree(&self, tree_id: TreeId) -> StoreResult<bool> {
        let mut trees = self.all_trees()?;
        let before = trees.len();
        trees.retain(|tree| tree.id != tree_id);
        if trees.len() == before {
            return Ok(false);
        }

        self.save_trees(&trees)?;
        info!(
            "event=tree_delete module=store status=ok tree_id={} tree_count={}",
            tree_id,
            trees.len()
        );
        Ok(true)
    }

    /// Merges `patch` into stored settings and persists the result.
    pub fn update_settings(&self, patch: &SettingsPatch) -> StoreResult<Settings> {
        let merged = self.settings()?.merged(patch);
        write_json(&self.synced, SETTINGS_KEY, &merged)?;
        Ok(merged)
    }

    /// Moves trees stored in the synced tier by older builds into the bulk tier.
    ///
    /// Trees already present in the bulk tier (by id) win; the synced copy is
    /// removed after the bulk write succeeds. Failures are logged and
    /// reported, never raised.
    pub fn migrate_bulk_tier_once(&self) -> MigrationReport {
        match self.try_migrate_bulk_tier() {
            Ok(report) => report,
            Err(err) => {
                error!("event=tier_migration module=store status=error error={err}");
                MigrationReport::Failed(err.to_string())
            }
        }
    }

    fn try_migrate_bulk_tier(&self) -> StoreResult<MigrationReport> {
        let legacy: Vec<PageMemoTree> = read_json(&self.synced, TREES_KEY)?.unwrap_or_default();
        if legacy.is_empty() {
            return Ok(MigrationReport::NothingToMigrate);
        }

        info!(
            "event=tier_migration module=store status=start legacy_count={}",
            legacy.len()
        );
        let mut trees = self.all_trees()?;
        let existing: HashSet<TreeId> = trees.iter().map(|tree| tree.id).collect();
        let legacy_count = legacy.len();
        let incoming: Vec<PageMemoTree> = legacy
            .into_iter()
            .filter(|tree| !existing.contains(&tree.id))
            .collect();
        let migrated = incoming.len();
        trees.extend(incoming);

        write_json(&self.bulk, TREES_KEY, &trees)?;
        self.synced.remove(TREES_KEY)?;

        info!(
            "event=tier_migration module=store status=ok migrated={} skipped={}",
            migrated,
            legacy_count - migrated
        );
        Ok(MigrationReport::Migrated {
            migrated,
            skipped: legacy_count - migrated,
        })
    }

    fn save_trees(&self, trees: &[PageMemoTree]) -> StoreResult<()> {
        write_json(&self.bulk, TREES_KEY, trees)
    }
}
