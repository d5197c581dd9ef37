//! Commit analysis - version bump decisions from parsed history

pub mod version_analyzer;

pub use version_analyzer::{compute_bump, last_release_tag};
