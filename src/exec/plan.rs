// src/exec/plan.rs

//! Channel planning: which pipes and pseudo-terminals an invocation needs.
//!
//! Each configured target is classified once into a [`Classification`];
//! the plan then allocates a [`Channel`] for every slot that needs the
//! parent (or a peer) on the other end. Files, descriptors and the null
//! device need no channel; the child opens or duplicates them itself.
//!
//! Rules, per slot:
//! - stdin `InlineData`: fresh pipe, or a pty when `in_tty` is set.
//! - stdin `Peer` with captured output: fresh pipe, the parent re-writes
//!   the peer's lines into it.
//! - stdin `Peer` with piped output: the peer's read end is moved in.
//! - stdout `CapturePipe`: fresh pipe; with `out_tty` the stdin pty is
//!   duplicated if there is one, otherwise a new pty is opened.
//! - stdout `PeerPipe`: fresh pipe.
//! - stderr `CapturePipe`: merged onto stdout when stdout also captures,
//!   otherwise a fresh pipe.
//! - stderr `PeerPipe`: fresh pipe.

use std::fs::OpenOptions;
use std::os::fd::{AsRawFd, FromRawFd, IntoRawFd, OwnedFd};
use std::os::unix::fs::OpenOptionsExt;

use nix::fcntl::OFlag;
use nix::pty::{grantpt, posix_openpt, ptsname_r, unlockpt};
use tracing::trace;

use crate::errors::Result;
use crate::exec::options::{Input, InvocationOptions, Output, PeerSource};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Inherit,
    Discard,
    FileByPath,
    FileByHandle,
    FileDescriptor,
    InlineData,
    CapturePipe,
    PeerPipe,
    /// stdin fed from another invocation.
    Peer,
}

pub fn classify_input(input: &Input) -> Classification {
    match input {
        Input::Inherit => Classification::Inherit,
        Input::Null => Classification::Discard,
        Input::Path(_) => Classification::FileByPath,
        Input::File(_) => Classification::FileByHandle,
        Input::Fd(_) => Classification::FileDescriptor,
        Input::Data(_) => Classification::InlineData,
        Input::Peer(_) => Classification::Peer,
    }
}

pub fn classify_output(output: &Output) -> Classification {
    match output {
        Output::Inherit => Classification::Inherit,
        Output::Null => Classification::Discard,
        Output::Path(_) => Classification::FileByPath,
        Output::File(_) => Classification::FileByHandle,
        Output::Fd(_) => Classification::FileDescriptor,
        Output::Capture => Classification::CapturePipe,
        Output::Pipe => Classification::PeerPipe,
    }
}

/// One end for the child, optionally one for the parent.
#[derive(Debug)]
pub struct Channel {
    /// `None` when the other end belongs to a peer invocation.
    pub parent: Option<OwnedFd>,
    pub child: OwnedFd,
    pub tty: bool,
}

impl Channel {
    /// Pipe the child reads from and the parent writes to.
    fn child_reads() -> Result<Self> {
        let (read, write) = pipe_cloexec()?;
        Ok(Self {
            parent: Some(write),
            child: read,
            tty: false,
        })
    }

    /// Pipe the child writes to and the parent (or a peer) reads from.
    fn child_writes() -> Result<Self> {
        let (read, write) = pipe_cloexec()?;
        Ok(Self {
            parent: Some(read),
            child: write,
            tty: false,
        })
    }

    fn pty() -> Result<Self> {
        let master = posix_openpt(OFlag::O_RDWR | OFlag::O_NOCTTY | OFlag::O_CLOEXEC)?;
        grantpt(&master)?;
        unlockpt(&master)?;
        let slave_name = ptsname_r(&master)?;
        // std opens with O_CLOEXEC.
        let slave = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_NOCTTY)
            .open(&slave_name)?;
        // SAFETY: the descriptor was just released by `master`.
        let master = unsafe { OwnedFd::from_raw_fd(master.into_raw_fd()) };
        Ok(Self {
            parent: Some(master),
            child: OwnedFd::from(slave),
            tty: true,
        })
    }

    fn from_peer(read_end: OwnedFd) -> Self {
        Self {
            parent: None,
            child: read_end,
            tty: false,
        }
    }

    fn try_clone(&self) -> Result<Self> {
        let parent = match &self.parent {
            Some(fd) => Some(fd.try_clone()?),
            None => None,
        };
        Ok(Self {
            parent,
            child: self.child.try_clone()?,
            tty: self.tty,
        })
    }
}

/// Descriptors to create for one spawn.
#[derive(Debug, Default)]
pub struct ChannelPlan {
    pub stdin: Option<Channel>,
    pub stdout: Option<Channel>,
    pub stderr: Option<Channel>,
    /// stdin reuses a peer's pipe rather than a fresh one.
    pub stdin_from_peer: bool,
    /// stderr is duplicated from stdout in the child.
    pub merge_stderr: bool,
    /// stdout shares the stdin pty.
    pub shared_tty: bool,
}

impl ChannelPlan {
    /// Allocate the channels `options` needs.
    ///
    /// A piped peer's read end is moved out of `options.stdin`, which is
    /// left as `PeerSource::Consumed`.
    pub fn build(options: &mut InvocationOptions) -> Result<Self> {
        let mut plan = ChannelPlan::default();
        let in_tty = options.in_tty;

        match &mut options.stdin {
            Input::Data(_) if in_tty => plan.stdin = Some(Channel::pty()?),
            Input::Data(_) => plan.stdin = Some(Channel::child_reads()?),
            Input::Peer(source @ PeerSource::Pipe(_)) => {
                if let PeerSource::Pipe(fd) = std::mem::replace(source, PeerSource::Consumed) {
                    plan.stdin = Some(Channel::from_peer(fd));
                    plan.stdin_from_peer = true;
                }
            }
            Input::Peer(PeerSource::Captured(_)) => plan.stdin = Some(Channel::child_reads()?),
            _ => {}
        }

        match options.stdout {
            Output::Capture if options.out_tty => {
                match plan.stdin.as_ref().filter(|c| c.tty) {
                    Some(stdin_tty) => {
                        plan.stdout = Some(stdin_tty.try_clone()?);
                        plan.shared_tty = true;
                    }
                    None => plan.stdout = Some(Channel::pty()?),
                }
            }
            Output::Capture | Output::Pipe => plan.stdout = Some(Channel::child_writes()?),
            _ => {}
        }

        match options.stderr {
            Output::Capture if matches!(options.stdout, Output::Capture) => {
                plan.merge_stderr = true;
            }
            Output::Capture | Output::Pipe => plan.stderr = Some(Channel::child_writes()?),
            _ => {}
        }

        trace!(
            stdin = ?classify_input(&options.stdin),
            stdout = ?classify_output(&options.stdout),
            stderr = ?classify_output(&options.stderr),
            stdin_from_peer = plan.stdin_from_peer,
            merge_stderr = plan.merge_stderr,
            "channel plan built"
        );

        Ok(plan)
    }

    /// Raw numbers of every descriptor in the plan, for closing in the child.
    pub fn raw_fds(&self) -> Vec<i32> {
        let mut fds = Vec::new();
        for channel in [&self.stdin, &self.stdout, &self.stderr].into_iter().flatten() {
            fds.push(channel.child.as_raw_fd());
            if let Some(parent) = &channel.parent {
                fds.push(parent.as_raw_fd());
            }
        }
        fds
    }
}

fn pipe_cloexec() -> Result<(OwnedFd, OwnedFd)> {
    Ok(nix::unistd::pipe2(OFlag::O_CLOEXEC)?)
}
