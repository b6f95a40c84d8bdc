//! Tree mutation engine.
//!
//! # Responsibility
//! - Provide pure, snapshot-producing edits over a memo forest.
//! - Keep cycle prevention for moves inside core.
//!
//! # Invariants
//! - No edit mutates its input; callers may retain prior snapshots.
//! - Every edit preserves forest-wide id uniqueness when its inserted node
//!   id is fresh.

pub mod edit;
pub mod ops;
