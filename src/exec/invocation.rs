// src/exec/invocation.rs

//! The handle for one running (or finished) command.

use std::ffi::OsString;
use std::os::fd::OwnedFd;
use std::rc::Rc;
use std::thread;

use nix::unistd::Pid;
use tracing::{debug, trace, warn};

use crate::errors::{Result, ShellwireError};
use crate::exec::args::ArgList;
use crate::exec::binding::ExecutableBinding;
use crate::exec::capture::CaptureStream;
use crate::exec::jobs::Job;
use crate::exec::launcher::{self, ParentEnd};
use crate::exec::options::{Input, InvocationOptions, Output, PeerSource};
use crate::exec::plan::ChannelPlan;
use crate::session::Session;
use crate::types::{EXIT_NOT_FOUND, Encoding};

/// A spawned command.
///
/// Foreground invocations have already been waited on when the handle is
/// returned; background ones are registered with the session and collected
/// by [`Invocation::wait`] or a session sweep.
#[derive(Debug)]
pub struct Invocation {
    session: Session,
    name: String,
    argv: Vec<String>,
    job: Rc<Job>,
    background: bool,
    fail_tolerant: bool,
    encoding: Encoding,
    chomp: bool,
    /// Read end of the capture channel, until the stream is opened.
    capture_fd: Option<ParentEnd>,
    capture: Option<CaptureStream>,
    stdout_pipe: Option<OwnedFd>,
    stderr_pipe: Option<OwnedFd>,
}

impl Invocation {
    pub(crate) fn start(
        binding: &ExecutableBinding,
        args: ArgList,
        mut options: InvocationOptions,
    ) -> Result<Self> {
        let session = binding.session().clone();
        let path = binding.resolve()?;

        let mut argv: Vec<OsString> = vec![OsString::from(binding.name())];
        argv.extend(args.to_argv());
        let env = session.environment(&options.env);

        // Encoding errors surface before anything is forked.
        let payload = match &options.stdin {
            Input::Data(data) => Some(launcher::serialize_inline(
                data,
                options.encoding,
                &options.line_terminator,
            )?),
            _ => None,
        };

        let plan = ChannelPlan::build(&mut options)?;
        let spawned = launcher::spawn(&path, &argv, &env, &options, plan)?;

        let pid = spawned.pid;
        let feeder = spawned.stdin.map(|end| {
            let mut stdin = std::mem::take(&mut options.stdin);
            let terminator = options.line_terminator.clone();
            thread::spawn(move || {
                launcher::feed_input(pid, end, &mut stdin, payload.as_deref(), &terminator)
            })
        });

        let mut capture_fd = None;
        let mut stdout_pipe = None;
        let mut stderr_pipe = None;
        match options.stdout {
            Output::Capture => capture_fd = spawned.stdout,
            Output::Pipe => stdout_pipe = spawned.stdout.map(|end| end.fd),
            _ => {}
        }
        match options.stderr {
            // Stdout capture wins; stderr is merged into it in that case.
            Output::Capture if capture_fd.is_none() => capture_fd = spawned.stderr,
            Output::Pipe => stderr_pipe = spawned.stderr.map(|end| end.fd),
            _ => {}
        }

        let argv: Vec<String> = argv
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        let background = options.runs_in_background();
        let job = Rc::new(Job::new(spawned.pid, binding.name()));

        let mut invocation = Self {
            session,
            name: binding.name().to_string(),
            argv,
            job,
            background,
            fail_tolerant: options.fail_tolerant,
            encoding: options.encoding,
            chomp: options.chomp,
            capture_fd,
            capture: None,
            stdout_pipe,
            stderr_pipe,
        };

        if background {
            // The feeder finishes on its own; a write error is only logged.
            if let Some(feeder) = feeder {
                let pid = invocation.pid();
                thread::spawn(move || {
                    if let Ok(Err(e)) = feeder.join() {
                        warn!(%pid, error = %e, "writing background stdin failed");
                    }
                });
            }
            invocation.session.register_job(Rc::clone(&invocation.job));
            return Ok(invocation);
        }

        // Drain before waiting: a child blocked on a full pipe never exits.
        let drained = match invocation.capture_fd.take() {
            Some(end) => CaptureStream::drained(
                end.fd,
                invocation.encoding,
                invocation.chomp,
                end.tty,
            )
            .map(Some),
            None => Ok(None),
        };
        let fed = match feeder {
            Some(feeder) => feeder.join().unwrap_or_else(|_| {
                Err(anyhow::anyhow!("stdin writer thread panicked").into())
            }),
            None => Ok(()),
        };
        // Reap even when draining or feeding failed.
        invocation.job.wait()?;
        invocation.capture = drained?;
        fed?;
        let reaped = invocation.session.reap_finished();
        if !reaped.is_empty() {
            trace!(?reaped, "reaped background jobs");
        }
        invocation.check_status()?;
        Ok(invocation)
    }

    pub fn pid(&self) -> Pid {
        self.job.pid()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Full argument vector, argv[0] included.
    pub fn argv(&self) -> &[String] {
        &self.argv
    }

    pub fn is_background(&self) -> bool {
        self.background
    }

    /// Whether the exit status has been collected.
    pub fn is_finished(&self) -> bool {
        self.job.exit_code().is_some()
    }

    /// Block until the process exits and apply the error policy.
    ///
    /// Idempotent: later calls return the same outcome without waiting.
    pub fn wait(&self) -> Result<i32> {
        if self.job.exit_code().is_none() {
            self.job.wait()?;
            self.session.forget_job(self.pid());
        }
        self.check_status()
    }

    /// Exit code, waiting first if needed.
    pub fn exit_code(&self) -> Result<i32> {
        self.wait()
    }

    fn check_status(&self) -> Result<i32> {
        let code = self.job.wait()?;
        if code == EXIT_NOT_FOUND {
            return Err(ShellwireError::Resolution {
                name: self.name.clone(),
            });
        }
        if code != 0 && self.session.fail_on_nonzero() && !self.fail_tolerant {
            debug!(pid = %self.pid(), exit_code = code, "nonzero exit under fail policy");
            return Err(ShellwireError::ExecutionFailure {
                argv: self.argv.clone(),
                code,
            });
        }
        Ok(code)
    }

    /// The capture stream, opened on first use. `None` when nothing is
    /// captured.
    pub fn capture(&mut self) -> Option<&mut CaptureStream> {
        if self.capture.is_none() {
            let end = self.capture_fd.take()?;
            self.capture = Some(CaptureStream::from_fd(
                end.fd,
                self.encoding,
                self.chomp,
                end.tty,
            ));
        }
        self.capture.as_mut()
    }

    /// Next captured line, chomped per the invocation's `chomp` option.
    pub fn readline(&mut self) -> Result<Option<String>> {
        let chomp = self.chomp;
        self.readline_with(chomp)
    }

    pub fn readline_with(&mut self, chomp: bool) -> Result<Option<String>> {
        match self.capture() {
            Some(stream) => stream.readline(chomp),
            None => Ok(None),
        }
    }

    /// All remaining captured lines.
    pub fn readlines(&mut self) -> Result<Vec<String>> {
        match self.capture() {
            Some(stream) => stream.readlines(),
            None => Ok(Vec::new()),
        }
    }

    /// Close the capture stream.
    pub fn close(&mut self) {
        if let Some(stream) = self.capture.as_mut() {
            stream.close();
        }
        self.capture_fd = None;
    }

    /// Iterate captured lines; exhausting the iterator waits for the
    /// process, and a policy error is yielded as the final item.
    pub fn lines(&mut self) -> Lines<'_> {
        Lines {
            invocation: self,
            done: false,
        }
    }

    /// Hand this invocation's output to a downstream stdin.
    ///
    /// A piped stdout moves its read end (the two processes then share the
    /// pipe directly); a captured one moves the capture stream, whose lines
    /// the parent re-writes.
    pub fn take_output(&mut self) -> Result<PeerSource> {
        if let Some(fd) = self.stdout_pipe.take() {
            return Ok(PeerSource::Pipe(fd));
        }
        if self.capture().is_some() {
            if let Some(stream) = self.capture.take() {
                return Ok(PeerSource::Captured(stream));
            }
        }
        Err(ShellwireError::InvalidOption(format!(
            "{} has no piped or captured output to read from",
            self.name
        )))
    }

    /// Read end of a piped stderr, for a downstream stdin.
    pub fn take_stderr(&mut self) -> Result<PeerSource> {
        self.stderr_pipe.take().map(PeerSource::Pipe).ok_or_else(|| {
            ShellwireError::InvalidOption(format!("{} has no piped stderr", self.name))
        })
    }
}

impl Input {
    /// stdin fed from `peer`'s stdout.
    pub fn peer(peer: &mut Invocation) -> Result<Input> {
        Ok(Input::Peer(peer.take_output()?))
    }
}

/// Iterator returned by [`Invocation::lines`].
#[derive(Debug)]
pub struct Lines<'a> {
    invocation: &'a mut Invocation,
    done: bool,
}

impl Iterator for Lines<'_> {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.invocation.readline_with(true) {
            Ok(Some(line)) => return Some(Ok(line)),
            Ok(None) => {}
            Err(e) => {
                self.done = true;
                return Some(Err(e));
            }
        }
        self.done = true;
        self.invocation.close();
        match self.invocation.wait() {
            Ok(_) => None,
            Err(e) => Some(Err(e)),
        }
    }
}
