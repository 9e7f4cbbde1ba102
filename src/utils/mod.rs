//! Shared utilities

pub mod glob_match;
pub mod hashing;

pub use glob_match::matches_any_pattern;
pub use hashing::{content_checksum, short_content_hash};
