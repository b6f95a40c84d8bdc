//! Search and filter entry points.
//!
//! # Responsibility
//! - Decide node visibility against a free-text query at render time.
//! - Filter the tree listing for the "all pages" view.

pub mod filter;
