// src/locate/mod.rs

//! Program lookup behind a trait so tests can swap the real search-path
//! walk for a fixed table.

use std::ffi::OsStr;
use std::fmt::Debug;
use std::path::PathBuf;

use tracing::trace;

pub mod mock;

/// Abstract program locator.
pub trait Locator: Debug {
    /// Find an executable called `name` in the `PATH`-style `search_path`.
    ///
    /// Names containing a `/` are checked as paths (relative to the current
    /// directory) rather than searched for.
    fn locate(&self, name: &str, search_path: &OsStr) -> Option<PathBuf>;
}

/// Implementation backed by the `which` crate.
#[derive(Debug, Clone, Default)]
pub struct SearchPathLocator;

impl Locator for SearchPathLocator {
    fn locate(&self, name: &str, search_path: &OsStr) -> Option<PathBuf> {
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        match which::which_in(name, Some(search_path), cwd) {
            Ok(path) => Some(path),
            Err(e) => {
                trace!(name, error = %e, "no executable in search path");
                None
            }
        }
    }
}
