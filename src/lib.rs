pub mod analyzer;
pub mod config;
pub mod coordinator;
pub mod domain;
pub mod error;
pub mod git;
pub mod ledger;
pub mod registry;
pub mod session;
pub mod snapshot;
pub mod ui;
pub mod updater;

pub use error::{ReleaseError, Result};
