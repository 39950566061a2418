// src/locate/mock.rs

use super::Locator;
use std::collections::HashMap;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Locator answering from a fixed name → path table.
///
/// Every lookup is recorded so tests can assert on the fallback order.
#[derive(Debug, Clone, Default)]
pub struct MockLocator {
    programs: Arc<Mutex<HashMap<String, PathBuf>>>,
    lookups: Arc<Mutex<Vec<String>>>,
}

impl MockLocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_program(&self, name: &str, path: impl AsRef<Path>) {
        let mut programs = self.programs.lock().unwrap();
        programs.insert(name.to_string(), path.as_ref().to_path_buf());
    }

    /// Names looked up so far, in order.
    pub fn lookups(&self) -> Vec<String> {
        self.lookups.lock().unwrap().clone()
    }
}

impl Locator for MockLocator {
    fn locate(&self, name: &str, _search_path: &OsStr) -> Option<PathBuf> {
        self.lookups.lock().unwrap().push(name.to_string());
        self.programs.lock().unwrap().get(name).cloned()
    }
}
