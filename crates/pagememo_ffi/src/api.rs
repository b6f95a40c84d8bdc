//! FFI use-case API for UI host calls.
//!
//! # Responsibility
//! - Expose stable, use-case-level memo functions to the host via FRB.
//! - Translate core errors into envelope messages.
//!
//! # Invariants
//! - Exported functions must not panic across FFI boundary.
//! - Each call opens both tier databases, does its work, and closes them.
//! - Store calls are serialized process-wide.
//! - Trees, edits and settings cross the boundary as camelCase JSON text.

use log::warn;
use pagememo_core::db::open_tier_databases;
use pagememo_core::markup::render_preview;
use pagememo_core::model::now_epoch_ms;
use pagememo_core::{
    core_version as core_version_inner, export_all, export_tree,
    init_logging as init_logging_inner, ping as ping_inner, resolve_tree_for_context,
    BrowsingContext, CoreConfig, ExportFormat, MemoStore, MigrationReport, PageMemoTree,
    SettingsPatch, SqliteKvTier, TierKind, TreeEdit, TreeId, TreeSummary,
};
use std::path::PathBuf;
use std::sync::{Mutex, OnceLock};
use uuid::Uuid;

const DATA_DIR_ENV: &str = "PAGEMEMO_DATA_DIR";
const DEFAULT_DATA_DIR_NAME: &str = "pagememo";
static DATA_DIR: OnceLock<PathBuf> = OnceLock::new();
// Store operations are whole-collection read-modify-write; one at a time.
static STORE_LOCK: Mutex<()> = Mutex::new(());

type FfiStore<'conn> = MemoStore<SqliteKvTier<'conn>, SqliteKvTier<'conn>>;

/// Minimal health-check API for FRB smoke integration.
///
/// # FFI contract
/// - Sync call, non-blocking.
/// - Never throws; always returns a UTF-8 string.
#[flutter_rust_bridge::frb(sync)]
pub fn ping() -> String {
    ping_inner().to_owned()
}

/// Expose core crate version through FFI.
#[flutter_rust_bridge::frb(sync)]
pub fn core_version() -> String {
    core_version_inner().to_owned()
}

/// Initializes Rust core logging once per process.
///
/// Input semantics:
/// - `level`: one of `trace|debug|info|warn|error` (case-insensitive).
/// - `log_dir`: absolute directory path where rolling logs are written.
///
/// # FFI contract
/// - Safe to call repeatedly with the same `level + log_dir` (idempotent).
/// - Never panics; returns empty string on success and error message on failure.
#[flutter_rust_bridge::frb(sync)]
pub fn init_logging(level: String, log_dir: String) -> String {
    match init_logging_inner(level.as_str(), log_dir.as_str()) {
        Ok(()) => String::new(),
        Err(err) => err,
    }
}

/// Tree envelope returned by resolve and edit calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoTreeResponse {
    /// Whether operation succeeded.
    pub ok: bool,
    /// Stable tree ID in string form.
    pub tree_id: Option<String>,
    /// Full tree as camelCase JSON.
    pub tree_json: Option<String>,
    /// Human-readable response message for diagnostics/UI.
    pub message: String,
}

impl MemoTreeResponse {
    fn success(message: impl Into<String>, tree: &PageMemoTree) -> Self {
        match serde_json::to_string(tree) {
            Ok(json) => Self {
                ok: true,
                tree_id: Some(tree.id.to_string()),
                tree_json: Some(json),
                message: message.into(),
            },
            Err(err) => Self::failure(format!("tree encoding failed: {err}")),
        }
    }

    fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            tree_id: None,
            tree_json: None,
            message: message.into(),
        }
    }
}

/// One row of the "all trees" listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoTreeListItem {
    pub tree_id: String,
    pub url: String,
    pub title: String,
    pub root_count: u32,
    pub updated_at: i64,
}

/// Listing envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoTreeListResponse {
    pub ok: bool,
    pub items: Vec<MemoTreeListItem>,
    pub message: String,
}

/// Generic action envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoActionResponse {
    pub ok: bool,
    pub message: String,
}

/// Export envelope carrying the rendered text and download hints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoExportResponse {
    pub ok: bool,
    pub content: String,
    pub file_extension: String,
    pub mime_type: String,
    pub message: String,
}

impl MemoExportResponse {
    fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            content: String::new(),
            file_extension: String::new(),
            mime_type: String::new(),
            message: message.into(),
        }
    }
}

/// Settings envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoSettingsResponse {
    pub ok: bool,
    /// Settings as camelCase JSON.
    pub settings_json: Option<String>,
    pub message: String,
}

/// Returns the tree bound to `url`, creating it on first visit.
///
/// # FFI contract
/// - Sync call, DB-backed execution.
/// - `url` is matched exactly; it is never normalized.
/// - Never panics.
#[flutter_rust_bridge::frb(sync)]
pub fn memo_resolve_tree(url: String, title: String, favicon: Option<String>) -> MemoTreeResponse {
    if url.trim().is_empty() {
        return MemoTreeResponse::failure("memo_resolve_tree failed: url must not be empty");
    }
    let context = BrowsingContext {
        url,
        title,
        favicon: favicon.filter(|value| !value.trim().is_empty()),
    };
    match with_store(|store| {
        resolve_tree_for_context(store, &context).map_err(|err| err.to_string())
    }) {
        Ok(tree) => MemoTreeResponse::success("Tree resolved.", &tree),
        Err(err) => MemoTreeResponse::failure(format!("memo_resolve_tree failed: {err}")),
    }
}

/// Applies one JSON-encoded tree edit and persists the result immediately.
///
/// `edit_json` examples: `{"op":"add_root"}`,
/// `{"op":"move","draggedId":"...","targetId":"..."}`.
///
/// # FFI contract
/// - Sync call, DB-backed execution.
/// - Rejected moves return `ok=false` with the reason; nothing is written.
/// - Edits naming missing nodes succeed without changes.
/// - Never panics.
#[flutter_rust_bridge::frb(sync)]
pub fn memo_apply_edit(tree_id: String, edit_json: String) -> MemoTreeResponse {
    let tree_id = match parse_tree_id(&tree_id) {
        Ok(id) => id,
        Err(err) => return MemoTreeResponse::failure(format!("memo_apply_edit failed: {err}")),
    };
    let edit: TreeEdit = match serde_json::from_str(&edit_json) {
        Ok(edit) => edit,
        Err(err) => {
            return MemoTreeResponse::failure(format!("memo_apply_edit failed: invalid edit: {err}"))
        }
    };

    match with_store(|store| apply_edit_in_store(store, tree_id, &edit)) {
        Ok(tree) => MemoTreeResponse::success("Edit applied.", &tree),
        Err(err) => MemoTreeResponse::failure(format!("memo_apply_edit failed: {err}")),
    }
}

/// Lists stored trees whose title or url contains `query` (case-insensitive).
#[flutter_rust_bridge::frb(sync)]
pub fn memo_list_trees(query: Option<String>) -> MemoTreeListResponse {
    let query = query.unwrap_or_default();
    let listed = with_store(|store| {
        let trees = store.all_trees().map_err(|err| err.to_string())?;
        Ok(pagememo_core::search::filter::filter_trees(&trees, query.trim())
            .into_iter()
            .map(TreeSummary::from)
            .map(to_list_item)
            .collect::<Vec<_>>())
    });

    match listed {
        Ok(items) => {
            let message = if items.is_empty() {
                "No trees.".to_string()
            } else {
                format!("Found {} tree(s).", items.len())
            };
            MemoTreeListResponse {
                ok: true,
                items,
                message,
            }
        }
        Err(err) => MemoTreeListResponse {
            ok: false,
            items: Vec::new(),
            message: format!("memo_list_trees failed: {err}"),
        },
    }
}

/// Deletes one tree by id.
#[flutter_rust_bridge::frb(sync)]
pub fn memo_delete_tree(tree_id: String) -> MemoActionResponse {
    let result = parse_tree_id(&tree_id).and_then(|id| {
        with_store(|store| store.delete_tree(id).map_err(|err| err.to_string()))
    });
    match result {
        Ok(true) => action(true, "Tree deleted."),
        Ok(false) => action(false, "memo_delete_tree failed: tree not found"),
        Err(err) => action(false, format!("memo_delete_tree failed: {err}")),
    }
}

/// Exports one tree, or every tree when `tree_id` is `None`.
///
/// `format` accepts `json|markdown|notebooklm`.
#[flutter_rust_bridge::frb(sync)]
pub fn memo_export(tree_id: Option<String>, format: String) -> MemoExportResponse {
    let format = match format.parse::<ExportFormat>() {
        Ok(format) => format,
        Err(err) => return MemoExportResponse::failure(format!("memo_export failed: {err}")),
    };
    let tree_id = match tree_id.as_deref().map(parse_tree_id).transpose() {
        Ok(id) => id,
        Err(err) => return MemoExportResponse::failure(format!("memo_export failed: {err}")),
    };

    let rendered = with_store(|store| {
        let trees = store.all_trees().map_err(|err| err.to_string())?;
        match tree_id {
            Some(id) => {
                let tree = trees
                    .iter()
                    .find(|tree| tree.id == id)
                    .ok_or_else(|| format!("tree not found: {id}"))?;
                export_tree(tree, format).map_err(|err| err.to_string())
            }
            None => export_all(&trees, format).map_err(|err| err.to_string()),
        }
    });

    match rendered {
        Ok(content) => MemoExportResponse {
            ok: true,
            content,
            file_extension: format.file_extension().to_string(),
            mime_type: format.mime_type().to_string(),
            message: "Export ready.".to_string(),
        },
        Err(err) => MemoExportResponse::failure(format!("memo_export failed: {err}")),
    }
}

/// Returns stored settings (defaults when none were saved).
#[flutter_rust_bridge::frb(sync)]
pub fn memo_get_settings() -> MemoSettingsResponse {
    settings_response(
        "memo_get_settings",
        with_store(|store| store.settings().map_err(|err| err.to_string())),
    )
}

/// Merges a JSON settings patch, e.g. `{"theme":"dark"}`, into stored settings.
#[flutter_rust_bridge::frb(sync)]
pub fn memo_update_settings(patch_json: String) -> MemoSettingsResponse {
    let patch: SettingsPatch = match serde_json::from_str(&patch_json) {
        Ok(patch) => patch,
        Err(err) => {
            return settings_response(
                "memo_update_settings",
                Err(format!("invalid settings patch: {err}")),
            )
        }
    };
    settings_response(
        "memo_update_settings",
        with_store(|store| store.update_settings(&patch).map_err(|err| err.to_string())),
    )
}

/// Moves trees left in the synced tier by older builds into the bulk tier.
///
/// Safe to call on every start; later calls report nothing to migrate.
#[flutter_rust_bridge::frb(sync)]
pub fn memo_migrate_storage() -> MemoActionResponse {
    match with_store(|store| Ok(store.migrate_bulk_tier_once())) {
        Ok(MigrationReport::NothingToMigrate) => action(true, "Nothing to migrate."),
        Ok(MigrationReport::Migrated { migrated, skipped }) => action(
            true,
            format!("Migrated {migrated} tree(s); kept {skipped} existing."),
        ),
        Ok(MigrationReport::Failed(reason)) => {
            action(false, format!("memo_migrate_storage failed: {reason}"))
        }
        Err(err) => action(false, format!("memo_migrate_storage failed: {err}")),
    }
}

/// Renders memo markup as preview HTML.
#[flutter_rust_bridge::frb(sync)]
pub fn memo_render_preview(text: String) -> String {
    render_preview(&text)
}

fn apply_edit_in_store(
    store: &FfiStore<'_>,
    tree_id: TreeId,
    edit: &TreeEdit,
) -> Result<PageMemoTree, String> {
    let tree = store
        .get_tree(tree_id)
        .map_err(|err| err.to_string())?
        .ok_or_else(|| format!("tree not found: {tree_id}"))?;

    let now = now_epoch_ms();
    let roots = edit.try_apply(&tree.root_nodes, now).map_err(|rejection| {
        warn!(
            "event=tree_edit module=ffi status=rejected op={} reason={rejection}",
            edit.label()
        );
        format!("move rejected: {rejection}")
    })?;
    if roots == tree.root_nodes {
        return Ok(tree);
    }

    store
        .update_tree(&tree.with_roots(roots, now))
        .map_err(|err| err.to_string())?
        .ok_or_else(|| format!("tree not found: {tree_id}"))
}

fn settings_response(
    operation: &str,
    result: Result<pagememo_core::Settings, String>,
) -> MemoSettingsResponse {
    match result.and_then(|settings| {
        serde_json::to_string(&settings).map_err(|err| format!("settings encoding failed: {err}"))
    }) {
        Ok(json) => MemoSettingsResponse {
            ok: true,
            settings_json: Some(json),
            message: "Settings ready.".to_string(),
        },
        Err(err) => MemoSettingsResponse {
            ok: false,
            settings_json: None,
            message: format!("{operation} failed: {err}"),
        },
    }
}

fn action(ok: bool, message: impl Into<String>) -> MemoActionResponse {
    MemoActionResponse {
        ok,
        message: message.into(),
    }
}

fn parse_tree_id(raw: &str) -> Result<TreeId, String> {
    Uuid::parse_str(raw.trim()).map_err(|err| format!("invalid tree id `{raw}`: {err}"))
}

fn to_list_item(summary: TreeSummary) -> MemoTreeListItem {
    MemoTreeListItem {
        tree_id: summary.id.to_string(),
        url: summary.url,
        title: summary.title,
        root_count: u32::try_from(summary.root_count).unwrap_or(u32::MAX),
        updated_at: summary.updated_at,
    }
}

fn resolve_data_dir() -> PathBuf {
    DATA_DIR
        .get_or_init(|| {
            if let Ok(raw) = std::env::var(DATA_DIR_ENV) {
                let trimmed = raw.trim();
                if !trimmed.is_empty() {
                    return PathBuf::from(trimmed);
                }
            }
            std::env::temp_dir().join(DEFAULT_DATA_DIR_NAME)
        })
        .clone()
}

fn with_store<T>(f: impl FnOnce(&FfiStore<'_>) -> Result<T, String>) -> Result<T, String> {
    let _guard = STORE_LOCK
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    let config = CoreConfig::new(resolve_data_dir());
    let databases =
        open_tier_databases(&config).map_err(|err| format!("tier open failed: {err}"))?;
    let store = MemoStore::new(
        SqliteKvTier::try_new(&databases.bulk, TierKind::Bulk)
            .map_err(|err| format!("bulk tier init failed: {err}"))?,
        SqliteKvTier::try_new(&databases.synced, TierKind::Synced)
            .map_err(|err| format!("synced tier init failed: {err}"))?,
    );
    f(&store)
}
