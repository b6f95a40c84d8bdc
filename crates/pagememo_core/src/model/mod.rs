//! Domain model for page-bound memo trees.
//!
//! # Responsibility
//! - Define the note node, page tree and settings shapes shared by every
//!   other core component.
//! - Provide forest validation used before any snapshot is persisted.
//!
//! # Invariants
//! - Node ids are unique across all roots and descendants of one forest.
//! - At most one `PageMemoTree` exists per exact `url` string.
//! - Timestamps are Unix epoch milliseconds.

pub mod node;
pub mod page_tree;
pub mod settings;

use page_tree::PageMemoTree;
use serde::{Deserialize, Serialize};
use settings::Settings;
use std::time::{SystemTime, UNIX_EPOCH};

/// Full persisted state: every page tree plus the settings singleton.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageData {
    pub page_memo_trees: Vec<PageMemoTree>,
    pub settings: Settings,
}

/// Returns the current wall-clock time as Unix epoch milliseconds.
///
/// Falls back to `0` if the system clock reports a time before the epoch.
pub fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}
