use pagememo_core::db::open_db_in_memory;
use pagememo_core::repo::kv_tier::write_json;
use pagememo_core::repo::memo_store::TREES_KEY;
use pagememo_core::service::autosave::DEFAULT_AUTOSAVE_DELAY_MS;
use pagememo_core::{
    BrowsingContext, CaptureKind, CapturedContent, ContextEvent, CoreConfig, ExportFormat,
    KeyValueTier, MemoNode, MemoSession, MemoStore, PageMemoTree, SessionError, SettingsPatch,
    SqliteKvTier, StoreError, StoreResult, TierKind, TreeEdit,
};
use rusqlite::Connection;
use std::cell::Cell;

type TestSession<'c> = MemoSession<SqliteKvTier<'c>, SqliteKvTier<'c>>;

struct Tiers {
    bulk: Connection,
    synced: Connection,
}

impl Tiers {
    fn in_memory() -> Self {
        Self {
            bulk: open_db_in_memory().unwrap(),
            synced: open_db_in_memory().unwrap(),
        }
    }

    fn store(&self) -> MemoStore<SqliteKvTier<'_>, SqliteKvTier<'_>> {
        MemoStore::new(
            SqliteKvTier::try_new(&self.bulk, TierKind::Bulk).unwrap(),
            SqliteKvTier::try_new(&self.synced, TierKind::Synced).unwrap(),
        )
    }

    fn session(&self) -> TestSession<'_> {
        MemoSession::start(self.store(), &test_config()).unwrap()
    }
}

fn test_config() -> CoreConfig {
    CoreConfig::new(std::env::temp_dir().join("pagememo-session-tests"))
}

/// Bulk tier whose writes can be switched to fail mid-session.
struct FlakyTier<'c> {
    inner: SqliteKvTier<'c>,
    failing: Cell<bool>,
}

impl<'c> FlakyTier<'c> {
    fn new(conn: &'c Connection) -> Self {
        Self {
            inner: SqliteKvTier::try_new(conn, TierKind::Bulk).unwrap(),
            failing: Cell::new(false),
        }
    }
}

impl KeyValueTier for FlakyTier<'_> {
    fn kind(&self) -> TierKind {
        self.inner.kind()
    }

    fn get_raw(&self, key: &str) -> StoreResult<Option<String>> {
        self.inner.get_raw(key)
    }

    fn set_raw(&self, key: &str, value: &str) -> StoreResult<()> {
        if self.failing.get() {
            return Err(StoreError::QuotaExceeded {
                tier: TierKind::Bulk,
                key: key.to_string(),
                bytes: value.len(),
                limit: 0,
            });
        }
        self.inner.set_raw(key, value)
    }

    fn remove(&self, key: &str) -> StoreResult<()> {
        self.inner.remove(key)
    }
}

fn flaky_session<'t>(
    tiers: &'t Tiers,
    bulk: &'t FlakyTier<'t>,
) -> MemoSession<&'t FlakyTier<'t>, SqliteKvTier<'t>> {
    let synced = SqliteKvTier::try_new(&tiers.synced, TierKind::Synced).unwrap();
    MemoSession::start(MemoStore::new(bulk, synced), &test_config()).unwrap()
}

fn stored_tree(session: &TestSession<'_>, url: &str) -> PageMemoTree {
    session.store().find_tree_by_url(url).unwrap().unwrap()
}

fn edit_text(node_id: pagememo_core::NodeId, content: &str) -> TreeEdit {
    TreeEdit::Edit {
        node_id,
        name: "memo".to_string(),
        content: content.to_string(),
    }
}

#[test]
fn edits_require_an_active_tree() {
    let tiers = Tiers::in_memory();
    let mut session = tiers.session();
    assert!(matches!(
        session.apply_edit(TreeEdit::add_root(), 0),
        Err(SessionError::NoActiveTree)
    ));
    assert!(session.visible_roots().is_empty());
}

#[test]
fn context_event_binds_tree_and_structural_edit_persists_immediately() {
    let tiers = Tiers::in_memory();
    let mut session = tiers.session();
    let event: ContextEvent = serde_json::from_str(
        r#"{"type":"TAB_CHANGED","data":{"url":"https://example.com","title":"Example"}}"#,
    )
    .unwrap();
    let tree_id = session.on_context_event(event).unwrap().id;

    let edit = TreeEdit::add_root();
    let inserted = edit.inserted_node_id().unwrap();
    assert!(session.apply_edit(edit, 1_000).unwrap());

    assert_eq!(session.selected_id(), Some(inserted));
    assert!(!session.has_unsaved_changes());
    let stored = stored_tree(&session, "https://example.com");
    assert_eq!(stored.id, tree_id);
    assert_eq!(stored.root_nodes.len(), 1);
    assert_eq!(stored.root_nodes[0].name, "New memo");
}

#[test]
fn text_edits_are_debounced_and_coalesced() {
    let tiers = Tiers::in_memory();
    let mut session = tiers.session();
    session
        .bind_context(BrowsingContext::new("https://a", "A"))
        .unwrap();
    let add = TreeEdit::add_root();
    let node_id = add.inserted_node_id().unwrap();
    session.apply_edit(add, 0).unwrap();

    session.apply_edit(edit_text(node_id, "first"), 1_000).unwrap();
    session.apply_edit(edit_text(node_id, "second"), 1_200).unwrap();
    assert_eq!(session.autosave_deadline(), Some(1_200 + DEFAULT_AUTOSAVE_DELAY_MS));
    assert!(session.has_unsaved_changes());

    assert!(!session.flush_due(1_600).unwrap());
    assert_eq!(stored_tree(&session, "https://a").root_nodes[0].content, "");

    assert!(session.flush_due(1_700).unwrap());
    assert_eq!(stored_tree(&session, "https://a").root_nodes[0].content, "second");
    assert!(!session.has_unsaved_changes());
    assert!(!session.flush_due(5_000).unwrap());
}

#[test]
fn switching_context_flushes_pending_autosave() {
    let tiers = Tiers::in_memory();
    let mut session = tiers.session();
    session
        .bind_context(BrowsingContext::new("https://a", "A"))
        .unwrap();
    let add = TreeEdit::add_root();
    let node_id = add.inserted_node_id().unwrap();
    session.apply_edit(add, 0).unwrap();
    session.apply_edit(edit_text(node_id, "draft"), 10).unwrap();

    session
        .bind_context(BrowsingContext::new("https://b", "B"))
        .unwrap();

    assert_eq!(session.selected_id(), None);
    assert_eq!(session.active_tree().unwrap().url, "https://b");
    assert_eq!(stored_tree(&session, "https://a").root_nodes[0].content, "draft");
}

#[test]
fn manual_mode_writes_only_on_save_now() {
    let tiers = Tiers::in_memory();
    let mut session = tiers.session();
    session
        .update_settings(&SettingsPatch {
            auto_save: Some(false),
            ..SettingsPatch::default()
        })
        .unwrap();
    session
        .bind_context(BrowsingContext::new("https://a", "A"))
        .unwrap();

    session.apply_edit(TreeEdit::add_root(), 0).unwrap();
    assert!(session.has_unsaved_changes());
    assert_eq!(session.autosave_deadline(), None);
    assert!(stored_tree(&session, "https://a").root_nodes.is_empty());

    session.save_now().unwrap();
    assert!(!session.has_unsaved_changes());
    assert_eq!(stored_tree(&session, "https://a").root_nodes.len(), 1);
}

#[test]
fn rejected_move_changes_nothing() {
    let tiers = Tiers::in_memory();
    let mut session = tiers.session();
    session
        .bind_context(BrowsingContext::new("https://a", "A"))
        .unwrap();
    let add_parent = TreeEdit::add_root();
    let parent = add_parent.inserted_node_id().unwrap();
    session.apply_edit(add_parent, 0).unwrap();
    let add_child = TreeEdit::add_child(parent);
    let child = add_child.inserted_node_id().unwrap();
    session.apply_edit(add_child, 0).unwrap();

    let before = session.active_tree().unwrap().clone();
    let changed = session
        .apply_edit(
            TreeEdit::Move {
                dragged_id: parent,
                target_id: child,
            },
            5,
        )
        .unwrap();

    assert!(!changed);
    assert_eq!(session.active_tree().unwrap(), &before);
}

#[test]
fn deleting_selected_subtree_clears_selection() {
    let tiers = Tiers::in_memory();
    let mut session = tiers.session();
    session
        .bind_context(BrowsingContext::new("https://a", "A"))
        .unwrap();
    let add_parent = TreeEdit::add_root();
    let parent = add_parent.inserted_node_id().unwrap();
    session.apply_edit(add_parent, 0).unwrap();
    session.apply_edit(TreeEdit::add_child(parent), 0).unwrap();
    assert!(session.selected_node().is_some());

    session
        .apply_edit(TreeEdit::Delete { node_id: parent }, 1)
        .unwrap();
    assert_eq!(session.selected_id(), None);
    assert!(stored_tree(&session, "https://a").root_nodes.is_empty());
}

#[test]
fn query_filters_visible_roots_without_touching_storage() {
    let tiers = Tiers::in_memory();
    let mut session = tiers.session();
    session
        .bind_context(BrowsingContext::new("https://a", "A"))
        .unwrap();
    for (text, now) in [("alpha notes", 1), ("beta notes", 2)] {
        let add = TreeEdit::add_root();
        let id = add.inserted_node_id().unwrap();
        session.apply_edit(add, now).unwrap();
        session.apply_edit(edit_text(id, text), now).unwrap();
    }
    session.save_now().unwrap();

    session.set_query("ALPHA");
    let visible = session.visible_roots();
    assert_eq!(visible.len(), 1);
    assert_eq!(visible[0].content, "alpha notes");
    assert_eq!(stored_tree(&session, "https://a").root_nodes.len(), 2);
}

#[test]
fn fresh_capture_is_appended_to_node_once() {
    let tiers = Tiers::in_memory();
    let mut session = tiers.session();
    session
        .bind_context(BrowsingContext::new("https://a", "A"))
        .unwrap();
    let add = TreeEdit::add_root();
    let node_id = add.inserted_node_id().unwrap();
    session.apply_edit(add, 0).unwrap();
    session.apply_edit(edit_text(node_id, "intro"), 0).unwrap();

    let (sender, receiver) = test_config().capture_channel();
    sender.offer(CapturedContent {
        kind: CaptureKind::Link {
            content: "https://docs.example.com".to_string(),
            text: "Docs".to_string(),
        },
        source_url: "https://a".to_string(),
        source_title: "A".to_string(),
        timestamp: 10_000,
    });

    assert!(session.apply_capture(node_id, &receiver, 12_000).unwrap());
    assert!(!session.apply_capture(node_id, &receiver, 12_001).unwrap());
    assert_eq!(
        session.selected_node().unwrap().content,
        "intro\n[Docs](https://docs.example.com)"
    );
}

#[test]
fn stale_capture_is_ignored() {
    let tiers = Tiers::in_memory();
    let mut session = tiers.session();
    session
        .bind_context(BrowsingContext::new("https://a", "A"))
        .unwrap();
    let add = TreeEdit::add_root();
    let node_id = add.inserted_node_id().unwrap();
    session.apply_edit(add, 0).unwrap();

    let (sender, receiver) = test_config().capture_channel();
    sender.offer(CapturedContent {
        kind: CaptureKind::Text {
            content: "old".to_string(),
        },
        source_url: "https://a".to_string(),
        source_title: "A".to_string(),
        timestamp: 0,
    });

    assert!(!session.apply_capture(node_id, &receiver, 5_000).unwrap());
    assert_eq!(session.selected_node().unwrap().content, "");
}

#[test]
fn start_migrates_legacy_trees_into_bulk_tier() {
    let tiers = Tiers::in_memory();
    let legacy = PageMemoTree::new("https://legacy", "Legacy", None);
    write_json(
        &SqliteKvTier::try_new(&tiers.synced, TierKind::Synced).unwrap(),
        TREES_KEY,
        &vec![legacy.clone()],
    )
    .unwrap();

    let mut session = tiers.session();
    let summaries = session.list_trees("").unwrap();
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].id, legacy.id);

    let bound = session
        .bind_context(BrowsingContext::new("https://legacy", "ignored"))
        .unwrap();
    assert_eq!(bound.id, legacy.id);
    assert_eq!(bound.title, "Legacy");
}

#[test]
fn list_and_delete_trees() {
    let tiers = Tiers::in_memory();
    let mut session = tiers.session();
    let rust_id = session
        .bind_context(BrowsingContext::new("https://rust-lang.org", "Rust"))
        .unwrap()
        .id;
    session
        .bind_context(BrowsingContext::new("https://example.com", "Example"))
        .unwrap();

    let found = session.list_trees("rust").unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].title, "Rust");

    assert!(session.delete_tree(rust_id).unwrap());
    assert!(session.active_tree().is_some());
    assert_eq!(session.list_trees("").unwrap().len(), 1);

    let active = session.active_tree().unwrap().id;
    assert!(session.delete_tree(active).unwrap());
    assert!(session.active_tree().is_none());
    assert!(matches!(session.save_now(), Err(SessionError::NoActiveTree)));
}

#[test]
fn export_current_includes_unsaved_edits() {
    let tiers = Tiers::in_memory();
    let mut session = tiers.session();
    session
        .bind_context(BrowsingContext::new("https://a", "Page A"))
        .unwrap();
    let add = TreeEdit::add_root();
    let node_id = add.inserted_node_id().unwrap();
    session.apply_edit(add, 0).unwrap();
    session.apply_edit(edit_text(node_id, "pending"), 1).unwrap();

    let flattened = session.export_current(ExportFormat::FlattenedPath).unwrap();
    assert!(flattened.starts_with("Title: Page A\nURL: https://a\n"));
    assert!(flattened.contains("[memo]\npending\n"));

    let all = session.export_all(ExportFormat::Structured).unwrap();
    let parsed = pagememo_core::export::parse_trees(&all).unwrap();
    assert_eq!(parsed.len(), 1);
    assert_eq!(parsed[0].root_nodes[0].content, "");
}

#[test]
fn inserting_existing_node_id_is_refused_without_touching_session() {
    let tiers = Tiers::in_memory();
    let mut session = tiers.session();
    session
        .bind_context(BrowsingContext::new("https://a", "A"))
        .unwrap();
    let node = MemoNode::new("once", "");
    assert!(session
        .apply_edit(TreeEdit::AddRoot { node: node.clone() }, 0)
        .unwrap());
    let before = session.active_tree().unwrap().clone();

    let err = session
        .apply_edit(TreeEdit::AddRoot { node: node.clone() }, 1)
        .unwrap_err();
    assert!(matches!(
        err,
        SessionError::Store(StoreError::InvalidTree(_))
    ));
    let err = session
        .apply_edit(
            TreeEdit::AddChild {
                parent_id: node.id,
                node: node.clone(),
            },
            2,
        )
        .unwrap_err();
    assert!(matches!(
        err,
        SessionError::Store(StoreError::InvalidTree(_))
    ));
    assert_eq!(session.active_tree().unwrap(), &before);
    assert!(!session.has_unsaved_changes());

    assert!(session.apply_edit(TreeEdit::add_root(), 3).unwrap());
    session.save_now().unwrap();
    assert_eq!(stored_tree(&session, "https://a").root_nodes.len(), 2);
}

#[test]
fn failed_flush_keeps_debounced_text_for_retry() {
    let tiers = Tiers::in_memory();
    let bulk = FlakyTier::new(&tiers.bulk);
    let mut session = flaky_session(&tiers, &bulk);
    session
        .bind_context(BrowsingContext::new("https://a", "A"))
        .unwrap();
    let add = TreeEdit::add_root();
    let node_id = add.inserted_node_id().unwrap();
    session.apply_edit(add, 0).unwrap();
    session
        .apply_edit(edit_text(node_id, "typed text"), 10)
        .unwrap();

    bulk.failing.set(true);
    assert!(session
        .bind_context(BrowsingContext::new("https://b", "B"))
        .is_err());
    assert_eq!(session.active_tree().unwrap().url, "https://a");
    assert_eq!(
        session.autosave_deadline(),
        Some(10 + DEFAULT_AUTOSAVE_DELAY_MS)
    );
    assert!(session.flush_due(1_000).is_err());
    assert!(session.autosave_deadline().is_some());

    bulk.failing.set(false);
    session
        .bind_context(BrowsingContext::new("https://b", "B"))
        .unwrap();
    assert_eq!(session.autosave_deadline(), None);
    let stored = session.store().find_tree_by_url("https://a").unwrap().unwrap();
    assert_eq!(stored.root_nodes[0].content, "typed text");
}

#[test]
fn failed_structural_write_is_retried_on_context_switch() {
    let tiers = Tiers::in_memory();
    let bulk = FlakyTier::new(&tiers.bulk);
    let mut session = flaky_session(&tiers, &bulk);
    session
        .bind_context(BrowsingContext::new("https://a", "A"))
        .unwrap();

    bulk.failing.set(true);
    assert!(session.apply_edit(TreeEdit::add_root(), 0).is_err());
    assert!(session.has_unsaved_changes());

    bulk.failing.set(false);
    session
        .bind_context(BrowsingContext::new("https://b", "B"))
        .unwrap();
    let stored = session.store().find_tree_by_url("https://a").unwrap().unwrap();
    assert_eq!(stored.root_nodes.len(), 1);
}
