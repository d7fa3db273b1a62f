//! Shared utilities.
//!
//! Content hashing and the `KEY=value` line format used by the project files.

pub mod hash;
pub mod kv;
