//! Persistence layer over two key-value storage tiers.
//!
//! # Responsibility
//! - Define the tier contract and its SQLite implementation.
//! - Map the memo collection and settings onto the tiers.
//!
//! # Invariants
//! - Bulk tier key `pageMemoTrees` holds the tree array.
//! - Synced tier key `settings` holds the settings record.
//! - Repository APIs return semantic errors (quota, validation) in addition
//!   to DB transport errors.

pub mod kv_tier;
pub mod memo_store;
