//! Core use-case services.
//!
//! # Responsibility
//! - Bind browsing contexts to stored page trees.
//! - Orchestrate edits, autosave and capture hand-off for one UI session.
//! - Keep UI/FFI layers decoupled from storage details.

pub mod autosave;
pub mod context_binding;
pub mod session;
