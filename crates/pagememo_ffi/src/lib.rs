//! FFI surface of the PageMemo core for UI hosts.

pub mod api;
