// src/exec/jobs.rs

//! Exit-status collection and the background job list.

use std::cell::Cell;
use std::rc::Rc;

use nix::errno::Errno;
use nix::sys::wait::{WaitPidFlag, WaitStatus, waitpid};
use nix::unistd::Pid;
use tracing::{debug, warn};

use crate::errors::Result;

/// A spawned child and its exit status, once known.
///
/// Shared between the caller's `Invocation` and the session's registry so
/// whichever side reaps the child first records the status for both.
#[derive(Debug)]
pub struct Job {
    pid: Pid,
    program: String,
    status: Cell<Option<i32>>,
}

impl Job {
    pub fn new(pid: Pid, program: impl Into<String>) -> Self {
        Self {
            pid,
            program: program.into(),
            status: Cell::new(None),
        }
    }

    pub fn pid(&self) -> Pid {
        self.pid
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Exit code if already collected.
    pub fn exit_code(&self) -> Option<i32> {
        self.status.get()
    }

    /// Block until the child terminates. Returns the cached code on repeat
    /// calls.
    pub fn wait(&self) -> Result<i32> {
        if let Some(code) = self.status.get() {
            return Ok(code);
        }
        loop {
            match waitpid(self.pid, None) {
                Ok(status) => {
                    if let Some(code) = decode_status(status) {
                        return Ok(self.record(code));
                    }
                }
                Err(Errno::EINTR) => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Collect the status if the child has already terminated.
    pub fn try_wait(&self) -> Result<Option<i32>> {
        if let Some(code) = self.status.get() {
            return Ok(Some(code));
        }
        let status = waitpid(self.pid, Some(WaitPidFlag::WNOHANG))?;
        Ok(decode_status(status).map(|code| self.record(code)))
    }

    fn record(&self, code: i32) -> i32 {
        // None -> value only.
        if self.status.get().is_none() {
            self.status.set(Some(code));
            debug!(pid = %self.pid, program = %self.program, exit_code = code, "child exited");
        }
        self.status.get().unwrap_or(code)
    }
}

/// Exit code for a terminated child: its own code, or 128 + signal number
/// when killed by a signal. `None` while it is still running.
pub fn decode_status(status: WaitStatus) -> Option<i32> {
    match status {
        WaitStatus::Exited(_, code) => Some(code),
        WaitStatus::Signaled(_, signal, _) => Some(128 + signal as i32),
        _ => None,
    }
}

/// Background jobs not yet collected, in spawn order.
#[derive(Debug, Default)]
pub struct JobRegistry {
    jobs: Vec<Rc<Job>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, job: Rc<Job>) {
        debug!(pid = %job.pid(), program = %job.program(), "registered background job");
        self.jobs.push(job);
    }

    /// Drop the entry for `pid`, typically after the caller waited on it.
    pub fn forget(&mut self, pid: Pid) {
        self.jobs.retain(|job| job.pid() != pid);
    }

    pub fn pids(&self) -> Vec<Pid> {
        self.jobs.iter().map(|job| job.pid()).collect()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Collect every job that has already terminated, without blocking.
    pub fn reap_finished(&mut self) -> Vec<(Pid, i32)> {
        let mut reaped = Vec::new();
        self.jobs.retain(|job| match job.try_wait() {
            Ok(Some(code)) => {
                reaped.push((job.pid(), code));
                false
            }
            Ok(None) => true,
            Err(e) => {
                warn!(pid = %job.pid(), error = %e, "dropping unwaitable background job");
                false
            }
        });
        reaped
    }

    /// Remove and return all entries, oldest first.
    pub fn take_all(&mut self) -> Vec<Rc<Job>> {
        std::mem::take(&mut self.jobs)
    }
}
