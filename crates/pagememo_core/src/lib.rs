//! Core domain logic for PageMemo: note trees bound to web page addresses.
//! This crate is the single source of truth for tree and storage invariants.

pub mod capture;
pub mod config;
pub mod db;
pub mod export;
pub mod logging;
pub mod markup;
pub mod model;
pub mod repo;
pub mod search;
pub mod service;
pub mod tree;

pub use capture::{
    append_content, capture_channel, CaptureKind, CaptureReceiver, CaptureSender,
    CapturedContent,
};
pub use config::CoreConfig;
pub use db::{open_db, open_db_in_memory, DbError, DbResult};
pub use export::{export_all, export_tree, parse_tree, ExportError, ExportFormat};
pub use logging::{default_log_level, init_logging, init_logging_from_config, logging_status};
pub use model::node::{MemoNode, NodeId, TreeValidationError};
pub use model::page_tree::{PageMemoTree, TreeId, TreeSummary};
pub use model::settings::{Settings, SettingsPatch, Theme};
pub use model::StorageData;
pub use repo::kv_tier::{KeyValueTier, SqliteKvTier, StoreError, StoreResult, TierKind};
pub use repo::memo_store::{MemoStore, MigrationReport};
pub use service::context_binding::{resolve_tree_for_context, BrowsingContext, ContextEvent};
pub use service::session::{MemoSession, SessionError, SessionResult};
pub use tree::edit::TreeEdit;
pub use tree::ops::MoveRejection;

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
