// src/exec/launcher.rs

//! Process launch: fork, wire descriptors in the child, exec.
//!
//! Everything the child needs is converted to C strings and pointer arrays
//! before `fork`, so the child only makes raw system calls (no allocation)
//! between `fork` and `execve`. A failure while wiring descriptors exits
//! the child with 1; a failed `execve` exits with 127. Nothing else crosses
//! back to the parent.

use std::collections::BTreeMap;
use std::ffi::{CString, OsStr, OsString};
use std::fs::File;
use std::io::{self, ErrorKind, Write};
use std::os::fd::{AsFd, AsRawFd, OwnedFd, RawFd};
use std::os::unix::ffi::OsStrExt;
use std::path::Path;

use libc::{c_char, c_int};
use nix::errno::Errno;
use nix::poll::{PollFd, PollFlags, PollTimeout, poll};
use nix::sys::wait::{Id, WaitPidFlag, WaitStatus, waitid};
use nix::unistd::{ForkResult, Pid, fork};
use tracing::debug;

use crate::errors::{Result, ShellwireError};
use crate::exec::capture::CaptureStream;
use crate::exec::options::{InlineData, Input, InvocationOptions, Output, PeerSource};
use crate::exec::plan::{Channel, ChannelPlan};
use crate::types::{EXIT_NOT_FOUND, EXIT_SETUP_FAILED, Encoding};

const NULL_DEVICE: &str = "/dev/null";

/// End-of-file character for a pty in canonical mode (Ctrl-D).
const TTY_EOF: u8 = 0x04;

/// How often a blocked pty writer checks whether the child is still alive.
const TTY_POLL_MS: u16 = 100;

/// Parent-side descriptors of a freshly spawned child.
#[derive(Debug)]
pub struct Spawned {
    pub pid: Pid,
    pub stdin: Option<ParentEnd>,
    pub stdout: Option<ParentEnd>,
    pub stderr: Option<ParentEnd>,
}

#[derive(Debug)]
pub struct ParentEnd {
    pub fd: OwnedFd,
    pub tty: bool,
}

/// How the child sets up one standard slot.
#[derive(Debug)]
enum Slot {
    Inherit,
    Dup(RawFd),
    Open { path: CString, flags: c_int },
    MergeStdout,
}

/// Everything the child touches after `fork`.
struct ChildSetup {
    path: CString,
    _argv: Vec<CString>,
    _envp: Vec<CString>,
    argv_ptrs: Vec<*const c_char>,
    envp_ptrs: Vec<*const c_char>,
    slots: [Slot; 3],
    close_after: Vec<RawFd>,
}

impl ChildSetup {
    fn new(
        path: &Path,
        argv: &[OsString],
        env: &BTreeMap<OsString, OsString>,
        options: &InvocationOptions,
        plan: &ChannelPlan,
    ) -> Result<Self> {
        let path = to_cstring(path.as_os_str())?;
        let argv = argv
            .iter()
            .map(|a| to_cstring(a))
            .collect::<Result<Vec<_>>>()?;
        let envp = env
            .iter()
            .map(|(k, v)| {
                let mut entry = k.clone();
                entry.push("=");
                entry.push(v);
                to_cstring(&entry)
            })
            .collect::<Result<Vec<_>>>()?;

        let argv_ptrs = null_terminated(&argv);
        let envp_ptrs = null_terminated(&envp);

        let slots = [
            input_slot(&options.stdin, plan.stdin.as_ref())?,
            output_slot(&options.stdout, plan.stdout.as_ref(), false)?,
            output_slot(&options.stderr, plan.stderr.as_ref(), plan.merge_stderr)?,
        ];

        Ok(Self {
            path,
            _argv: argv,
            _envp: envp,
            argv_ptrs,
            envp_ptrs,
            slots,
            close_after: plan.raw_fds(),
        })
    }
}

fn to_cstring(s: &OsStr) -> Result<CString> {
    CString::new(s.as_bytes()).map_err(|_| {
        ShellwireError::InvalidOption(format!("{s:?} contains a NUL byte"))
    })
}

fn null_terminated(strings: &[CString]) -> Vec<*const c_char> {
    strings
        .iter()
        .map(|s| s.as_ptr())
        .chain(std::iter::once(std::ptr::null()))
        .collect()
}

fn input_slot(input: &Input, channel: Option<&Channel>) -> Result<Slot> {
    if let Some(channel) = channel {
        return Ok(Slot::Dup(channel.child.as_raw_fd()));
    }
    Ok(match input {
        Input::Null => open_slot(Path::new(NULL_DEVICE), libc::O_RDONLY)?,
        Input::Path(path) => open_slot(path, libc::O_RDONLY)?,
        Input::File(file) => Slot::Dup(file.as_raw_fd()),
        Input::Fd(fd) => Slot::Dup(*fd),
        Input::Inherit | Input::Data(_) | Input::Peer(_) => Slot::Inherit,
    })
}

fn output_slot(output: &Output, channel: Option<&Channel>, merge: bool) -> Result<Slot> {
    if merge {
        return Ok(Slot::MergeStdout);
    }
    if let Some(channel) = channel {
        return Ok(Slot::Dup(channel.child.as_raw_fd()));
    }
    Ok(match output {
        Output::Null => open_slot(Path::new(NULL_DEVICE), libc::O_WRONLY)?,
        Output::Path(path) => {
            open_slot(path, libc::O_WRONLY | libc::O_CREAT | libc::O_TRUNC)?
        }
        Output::File(file) => Slot::Dup(file.as_raw_fd()),
        Output::Fd(fd) => Slot::Dup(*fd),
        Output::Inherit | Output::Capture | Output::Pipe => Slot::Inherit,
    })
}

fn open_slot(path: &Path, flags: c_int) -> Result<Slot> {
    Ok(Slot::Open {
        path: to_cstring(path.as_os_str())?,
        flags,
    })
}

/// Point `target` at `fd`. Returns false on failure.
///
/// # Safety
/// Only async-signal-safe calls; meant for the forked child.
unsafe fn redirect(fd: RawFd, target: RawFd) -> bool {
    if fd == target {
        // dup2 onto itself would keep close-on-exec set.
        unsafe { libc::fcntl(fd, libc::F_SETFD, 0) != -1 }
    } else {
        unsafe { libc::dup2(fd, target) != -1 }
    }
}

/// Runs in the forked child. Never returns.
///
/// # Safety
/// Must only be called in the child right after `fork`.
unsafe fn exec_child(setup: &ChildSetup) -> ! {
    unsafe {
        for (target, slot) in setup.slots.iter().enumerate() {
            let target = target as RawFd;
            let ok = match slot {
                Slot::Inherit => true,
                Slot::Dup(fd) => redirect(*fd, target),
                Slot::Open { path, flags } => {
                    let fd = libc::open(path.as_ptr(), *flags, 0o666 as libc::c_uint);
                    if fd < 0 {
                        false
                    } else {
                        let ok = redirect(fd, target);
                        if fd != target {
                            libc::close(fd);
                        }
                        ok
                    }
                }
                Slot::MergeStdout => redirect(libc::STDOUT_FILENO, target),
            };
            if !ok {
                libc::_exit(EXIT_SETUP_FAILED);
            }
        }

        for &fd in &setup.close_after {
            if fd > libc::STDERR_FILENO {
                libc::close(fd);
            }
        }

        libc::signal(libc::SIGPIPE, libc::SIG_DFL);
        libc::signal(libc::SIGINT, libc::SIG_DFL);

        libc::execve(
            setup.path.as_ptr(),
            setup.argv_ptrs.as_ptr(),
            setup.envp_ptrs.as_ptr(),
        );
        libc::_exit(EXIT_NOT_FOUND)
    }
}

/// Fork and exec `path` with the planned descriptors.
///
/// `argv` includes argv[0]. Child-side descriptors are closed in the parent
/// before returning.
pub fn spawn(
    path: &Path,
    argv: &[OsString],
    env: &BTreeMap<OsString, OsString>,
    options: &InvocationOptions,
    plan: ChannelPlan,
) -> Result<Spawned> {
    let setup = ChildSetup::new(path, argv, env, options, &plan)?;

    // SAFETY: the child only runs `exec_child`, which makes raw system
    // calls on data prepared above and then execs or exits.
    match unsafe { fork() }? {
        ForkResult::Child => unsafe { exec_child(&setup) },
        ForkResult::Parent { child } => {
            debug!(pid = %child, program = %path.display(), argv = ?argv, "spawned process");
            let ChannelPlan {
                stdin,
                stdout,
                stderr,
                ..
            } = plan;
            Ok(Spawned {
                pid: child,
                stdin: stdin.and_then(parent_end),
                stdout: stdout.and_then(parent_end),
                stderr: stderr.and_then(parent_end),
            })
        }
    }
}

/// Keep the parent's end; the child's end is dropped (closed) here.
fn parent_end(channel: Channel) -> Option<ParentEnd> {
    let tty = channel.tty;
    channel.parent.map(|fd| ParentEnd { fd, tty })
}

/// Serialize inline input: every line followed by `terminator`.
pub fn serialize_inline(
    data: &InlineData,
    encoding: Encoding,
    terminator: &[u8],
) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    match data {
        InlineData::Text(text) => {
            out.extend(encoding.encode(text)?);
            out.extend_from_slice(terminator);
        }
        InlineData::Bytes(bytes) => {
            out.extend_from_slice(bytes);
            out.extend_from_slice(terminator);
        }
        InlineData::Lines(lines) => {
            for line in lines {
                out.extend(encoding.encode(line)?);
                out.extend_from_slice(terminator);
            }
        }
    }
    Ok(out)
}

/// Write the child's stdin from the parent, then close it.
///
/// `payload` is inline data already serialized by [`serialize_inline`];
/// without it a captured peer stream is re-written line by line. A child
/// that exits without reading everything is not an error; writing simply
/// stops at the broken pipe, or for a pty once the child side is gone.
pub fn feed_input(
    pid: Pid,
    end: ParentEnd,
    stdin: &mut Input,
    payload: Option<&[u8]>,
    terminator: &[u8],
) -> Result<()> {
    let mut writer = File::from(end.fd);

    if end.tty {
        // A pty never reports EPIPE; see `write_tty`.
        let data = payload.unwrap_or_default();
        if !(write_tty(&writer, pid, data)? && write_tty(&writer, pid, &[TTY_EOF])?) {
            debug!(%pid, "child side of the pty closed before all input was written");
        }
        return Ok(());
    }

    let result = match (payload, stdin) {
        (Some(bytes), _) => writer.write_all(bytes),
        (None, Input::Peer(PeerSource::Captured(stream))) => {
            repipe(stream, &mut writer, terminator)
        }
        _ => Ok(()),
    };

    match result {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::BrokenPipe => {
            debug!(%pid, "child closed stdin before all input was written");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

/// Write `bytes` to a pty master. Returns false if the child side went away
/// first.
///
/// The master is switched to non-blocking mode: a full pty input buffer
/// would otherwise block forever once the child stops reading.
fn write_tty(master: &File, pid: Pid, mut bytes: &[u8]) -> Result<bool> {
    set_nonblocking(master)?;
    let mut writer = master;
    while !bytes.is_empty() {
        match writer.write(bytes) {
            Ok(n) => bytes = &bytes[n..],
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) if e.kind() == ErrorKind::WouldBlock => {
                if !wait_tty_writable(master, pid)? {
                    return Ok(false);
                }
            }
            Err(e) if e.raw_os_error() == Some(libc::EIO) => return Ok(false),
            Err(e) => return Err(e.into()),
        }
    }
    Ok(true)
}

/// Block until the master takes more input. False once the slave side hung
/// up or the child exited.
fn wait_tty_writable(master: &File, pid: Pid) -> Result<bool> {
    loop {
        let mut fds = [PollFd::new(master.as_fd(), PollFlags::POLLOUT)];
        match poll(&mut fds, PollTimeout::from(TTY_POLL_MS)) {
            Ok(_) | Err(Errno::EINTR) => {}
            Err(e) => return Err(e.into()),
        }
        let revents = fds[0].revents().unwrap_or(PollFlags::empty());
        if revents.intersects(PollFlags::POLLHUP | PollFlags::POLLERR) {
            return Ok(false);
        }
        if revents.contains(PollFlags::POLLOUT) {
            return Ok(true);
        }
        if child_exited(pid) {
            return Ok(false);
        }
    }
}

/// Whether `pid` has terminated, without reaping it.
///
/// `WNOWAIT` leaves the status for the invocation's own `waitpid`. An error
/// (the child was already reaped) counts as exited.
fn child_exited(pid: Pid) -> bool {
    let flags = WaitPidFlag::WEXITED | WaitPidFlag::WNOHANG | WaitPidFlag::WNOWAIT;
    !matches!(waitid(Id::Pid(pid), flags), Ok(WaitStatus::StillAlive))
}

fn set_nonblocking(file: &File) -> io::Result<()> {
    let fd = file.as_raw_fd();
    // SAFETY: fcntl on a descriptor owned by `file`.
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFL) };
    if flags == -1 {
        return Err(io::Error::last_os_error());
    }
    if flags & libc::O_NONBLOCK == 0 {
        // SAFETY: as above; F_SETFL takes an int flag set.
        let rc = unsafe { libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) };
        if rc == -1 {
            return Err(io::Error::last_os_error());
        }
    }
    Ok(())
}

fn repipe(stream: &mut CaptureStream, writer: &mut File, terminator: &[u8]) -> io::Result<()> {
    let encoding = stream.encoding();
    loop {
        let line = match stream.readline(true) {
            Ok(Some(line)) => line,
            Ok(None) => return Ok(()),
            Err(e) => return Err(io::Error::other(e)),
        };
        let bytes = encoding
            .encode(&line)
            .map_err(io::Error::other)?;
        writer.write_all(&bytes)?;
        writer.write_all(terminator)?;
    }
}
