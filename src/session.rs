// src/session.rs

//! The session: shared state every binding and invocation consults.
//!
//! Holds what a shell keeps globally:
//! - the program search path
//! - the fail-on-nonzero (`set -e`) policy
//! - exported / unset environment variables
//! - the list of background jobs not yet collected
//!
//! A `Session` is a cheap handle; clones share the same state. The engine
//! is single-threaded, so the handle is `Rc`-based and not `Send`.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::rc::Rc;

use nix::unistd::Pid;
use tracing::{debug, info};

use crate::config::{ConfigFile, DefaultsSection};
use crate::errors::{Result, ShellwireError};
use crate::exec::binding::ExecutableBinding;
use crate::exec::jobs::{Job, JobRegistry};
use crate::exec::options::{InvocationOptions, merge_environment};
use crate::locate::{Locator, SearchPathLocator};

/// Used when neither the config nor the environment provides `PATH`.
const FALLBACK_SEARCH_PATH: &str = "/usr/local/bin:/usr/bin:/bin";

#[derive(Debug)]
struct SessionInner {
    fail_on_nonzero: Cell<bool>,
    search_path: RefCell<Option<Vec<PathBuf>>>,
    defaults: DefaultsSection,
    env_overlay: RefCell<BTreeMap<OsString, Option<OsString>>>,
    jobs: RefCell<JobRegistry>,
    locator: Box<dyn Locator>,
}

#[derive(Debug, Clone)]
pub struct Session {
    inner: Rc<SessionInner>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    /// Session with default settings and the real search-path locator.
    pub fn new() -> Self {
        Self::from_config(&ConfigFile::default())
    }

    pub fn from_config(config: &ConfigFile) -> Self {
        Self::with_locator(config, SearchPathLocator)
    }

    pub fn with_locator(config: &ConfigFile, locator: impl Locator + 'static) -> Self {
        let env_overlay = config
            .env
            .iter()
            .map(|(k, v)| (OsString::from(k), Some(OsString::from(v))))
            .collect();
        Self {
            inner: Rc::new(SessionInner {
                fail_on_nonzero: Cell::new(config.session.errexit),
                search_path: RefCell::new(config.session.search_path.clone()),
                defaults: config.defaults.clone(),
                env_overlay: RefCell::new(env_overlay),
                jobs: RefCell::new(JobRegistry::new()),
                locator: Box::new(locator),
            }),
        }
    }

    /// Bind a logical program name. Never fails; resolution happens per call.
    pub fn binding(&self, name: &str) -> ExecutableBinding {
        ExecutableBinding::new(self.clone(), name)
    }

    /// Bind an explicit path, bypassing the search path.
    pub fn run(&self, path: impl AsRef<Path>) -> ExecutableBinding {
        ExecutableBinding::with_path(self.clone(), path.as_ref())
    }

    pub fn defaults(&self) -> &DefaultsSection {
        &self.inner.defaults
    }

    /// Fresh options carrying this session's defaults.
    pub fn options(&self) -> InvocationOptions {
        InvocationOptions::with_defaults(&self.inner.defaults)
    }

    pub fn fail_on_nonzero(&self) -> bool {
        self.inner.fail_on_nonzero.get()
    }

    pub fn set_fail_on_nonzero(&self, enabled: bool) {
        info!(enabled, "fail-on-nonzero policy changed");
        self.inner.fail_on_nonzero.set(enabled);
    }

    /// Shell-style switch: `-e` enables fail-on-nonzero, `+e` disables it,
    /// `errexit` enables it.
    pub fn option(&self, switch: &str) -> Result<()> {
        match switch {
            "-e" | "errexit" => self.set_fail_on_nonzero(true),
            "+e" => self.set_fail_on_nonzero(false),
            other => {
                return Err(ShellwireError::InvalidOption(format!(
                    "unknown session option '{other}'"
                )));
            }
        }
        Ok(())
    }

    pub fn set_search_path(&self, dirs: Vec<PathBuf>) {
        *self.inner.search_path.borrow_mut() = Some(dirs);
    }

    /// Search path in `PATH` form: the configured directories, else the
    /// ambient `PATH`.
    pub fn search_path(&self) -> OsString {
        if let Some(dirs) = self.inner.search_path.borrow().as_ref() {
            if let Ok(joined) = std::env::join_paths(dirs) {
                return joined;
            }
        }
        self.inner
            .env_overlay
            .borrow()
            .get(OsStr::new("PATH"))
            .cloned()
            .unwrap_or_else(|| std::env::var_os("PATH"))
            .unwrap_or_else(|| OsString::from(FALLBACK_SEARCH_PATH))
    }

    pub(crate) fn locate(&self, name: &str) -> Option<PathBuf> {
        let search_path = self.search_path();
        self.inner.locator.locate(name, &search_path)
    }

    /// Export a variable to every later invocation.
    pub fn export(&self, key: impl Into<OsString>, value: impl Into<OsString>) {
        let key = key.into();
        let value = value.into();
        debug!(key = ?key, value = ?value, "export");
        self.inner.env_overlay.borrow_mut().insert(key, Some(value));
    }

    /// Remove a variable from the environment of later invocations.
    pub fn unset(&self, key: impl Into<OsString>) {
        let key = key.into();
        debug!(key = ?key, "unset");
        self.inner.env_overlay.borrow_mut().insert(key, None);
    }

    /// Environment a child gets: ambient, session overlay, then `overrides`.
    pub fn environment(
        &self,
        overrides: &BTreeMap<OsString, OsString>,
    ) -> BTreeMap<OsString, OsString> {
        merge_environment(std::env::vars_os(), &self.inner.env_overlay.borrow(), overrides)
    }

    /// Pids of background jobs not yet collected, in spawn order.
    pub fn jobs(&self) -> Vec<Pid> {
        self.inner.jobs.borrow().pids()
    }

    /// Collect finished background jobs without blocking.
    pub fn reap_finished(&self) -> Vec<(Pid, i32)> {
        self.inner.jobs.borrow_mut().reap_finished()
    }

    /// Block on every outstanding background job, oldest first.
    ///
    /// The fail-on-nonzero policy does not apply here; codes are returned
    /// for the caller to judge.
    pub fn wait_pending(&self) -> Result<Vec<(Pid, i32)>> {
        let pending = self.inner.jobs.borrow_mut().take_all();
        let mut codes = Vec::with_capacity(pending.len());
        for job in pending {
            codes.push((job.pid(), job.wait()?));
        }
        Ok(codes)
    }

    pub(crate) fn register_job(&self, job: Rc<Job>) {
        self.inner.jobs.borrow_mut().register(job);
    }

    pub(crate) fn forget_job(&self, pid: Pid) {
        self.inner.jobs.borrow_mut().forget(pid);
    }
}
