// src/exec/options.rs

//! Per-invocation options: redirection targets and behaviour switches.

use std::collections::BTreeMap;
use std::ffi::{OsStr, OsString};
use std::fs::File;
use std::os::fd::{OwnedFd, RawFd};
use std::path::PathBuf;

use crate::config::DefaultsSection;
use crate::errors::{Result, ShellwireError};
use crate::exec::args::ArgValue;
use crate::exec::capture::CaptureStream;
use crate::types::Encoding;

/// Control keys recognised by [`InvocationOptions::apply_control`].
pub const CONTROL_KEYS: &[&str] = &[
    "_in", "_out", "_err", "_end", "_chomp", "_encoding", "_bg", "_fails", "_env", "_in_tty",
    "_out_tty",
];

/// Literal input the parent writes to the child's stdin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InlineData {
    /// One line of text.
    Text(String),
    /// One line of raw bytes, written without re-encoding.
    Bytes(Vec<u8>),
    /// One line per element.
    Lines(Vec<String>),
}

impl InlineData {
    pub fn text(s: impl Into<String>) -> Self {
        InlineData::Text(s.into())
    }

    pub fn bytes(b: impl Into<Vec<u8>>) -> Self {
        InlineData::Bytes(b.into())
    }

    pub fn lines<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: ToString,
    {
        InlineData::Lines(items.into_iter().map(|s| s.to_string()).collect())
    }

    /// Number of terminated lines this value serializes to.
    pub fn line_count(&self) -> usize {
        match self {
            InlineData::Text(_) | InlineData::Bytes(_) => 1,
            InlineData::Lines(items) => items.len(),
        }
    }
}

/// Output of another invocation, consumed as stdin.
#[derive(Debug)]
pub enum PeerSource {
    /// Read end of the peer's `Output::Pipe`; shared at the OS level.
    Pipe(OwnedFd),
    /// The peer's capture stream; the parent re-writes its lines.
    Captured(CaptureStream),
    /// The pipe was moved into a channel plan.
    Consumed,
}

/// Where a child's stdin comes from.
#[derive(Debug, Default)]
pub enum Input {
    /// The parent's own stdin.
    #[default]
    Inherit,
    /// The null device.
    Null,
    Path(PathBuf),
    File(File),
    /// A descriptor the caller owns and keeps open.
    Fd(RawFd),
    Data(InlineData),
    Peer(PeerSource),
}

impl Input {
    pub fn text(s: impl Into<String>) -> Self {
        Input::Data(InlineData::text(s))
    }

    pub fn bytes(b: impl Into<Vec<u8>>) -> Self {
        Input::Data(InlineData::bytes(b))
    }

    pub fn lines<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: ToString,
    {
        Input::Data(InlineData::lines(items))
    }
}

/// Where a child's stdout or stderr goes.
#[derive(Debug, Default)]
pub enum Output {
    /// The parent's own stream.
    #[default]
    Inherit,
    /// The null device.
    Null,
    /// File created or truncated in the child.
    Path(PathBuf),
    File(File),
    Fd(RawFd),
    /// Materialize the stream for the caller to read.
    Capture,
    /// Feed a downstream invocation directly.
    Pipe,
}

/// Validated, defaulted options for one invocation.
#[derive(Debug)]
pub struct InvocationOptions {
    pub stdin: Input,
    pub stdout: Output,
    pub stderr: Output,
    /// Appended after each line of inline input.
    pub line_terminator: Vec<u8>,
    pub chomp: bool,
    pub encoding: Encoding,
    pub background: bool,
    /// Exempt from the session's fail-on-nonzero policy.
    pub fail_tolerant: bool,
    /// Per-call overrides, applied over the session environment.
    pub env: BTreeMap<OsString, OsString>,
    pub in_tty: bool,
    pub out_tty: bool,
}

impl Default for InvocationOptions {
    fn default() -> Self {
        Self::with_defaults(&DefaultsSection::default())
    }
}

impl InvocationOptions {
    pub fn with_defaults(defaults: &DefaultsSection) -> Self {
        Self {
            stdin: Input::Inherit,
            stdout: Output::Inherit,
            stderr: Output::Inherit,
            line_terminator: defaults.line_terminator.as_bytes().to_vec(),
            chomp: defaults.chomp,
            encoding: defaults.encoding,
            background: false,
            fail_tolerant: false,
            env: BTreeMap::new(),
            in_tty: false,
            out_tty: false,
        }
    }

    /// Whether the launcher returns without waiting.
    ///
    /// A `Pipe` output is only drained by a downstream invocation that does
    /// not exist yet, so blocking on it could never finish.
    pub fn runs_in_background(&self) -> bool {
        self.background
            || matches!(self.stdout, Output::Pipe)
            || matches!(self.stderr, Output::Pipe)
    }

    pub fn set_env(&mut self, key: impl Into<OsString>, value: impl Into<OsString>) {
        self.env.insert(key.into(), value.into());
    }

    /// Apply a `_`-prefixed control keyword given in argument form.
    ///
    /// Switches and text options can be set this way. Redirections and the
    /// environment need typed values and must use the dedicated setters.
    pub fn apply_control(&mut self, key: &str, value: ArgValue) -> Result<()> {
        if !CONTROL_KEYS.contains(&key) {
            return Err(ShellwireError::InvalidOption(format!(
                "unknown option '{key}'"
            )));
        }
        match (key, value) {
            ("_bg", ArgValue::Bool(b)) => self.background = b,
            ("_fails", ArgValue::Bool(b)) => self.fail_tolerant = b,
            ("_chomp", ArgValue::Bool(b)) => self.chomp = b,
            ("_in_tty", ArgValue::Bool(b)) => self.in_tty = b,
            ("_out_tty", ArgValue::Bool(b)) => self.out_tty = b,
            ("_end", ArgValue::Text(t)) => self.line_terminator = self.encode_os(&t)?,
            ("_encoding", ArgValue::Text(t)) => {
                let name = t.to_string_lossy();
                self.encoding = name.parse().map_err(ShellwireError::InvalidOption)?;
            }
            ("_in" | "_out" | "_err" | "_env", _) => {
                return Err(ShellwireError::InvalidOption(format!(
                    "option '{key}' needs a typed value; use the dedicated setter"
                )));
            }
            (key, value) => {
                return Err(ShellwireError::InvalidOption(format!(
                    "option '{key}' does not accept {value:?}"
                )));
            }
        }
        Ok(())
    }

    fn encode_os(&self, text: &OsStr) -> Result<Vec<u8>> {
        match text.to_str() {
            Some(s) => self.encoding.encode(s),
            None => Ok(std::os::unix::ffi::OsStrExt::as_bytes(text).to_vec()),
        }
    }
}

/// Ambient environment, then session overlay, then per-call overrides.
///
/// A `None` in the overlay removes the variable.
pub fn merge_environment<A>(
    ambient: A,
    overlay: &BTreeMap<OsString, Option<OsString>>,
    overrides: &BTreeMap<OsString, OsString>,
) -> BTreeMap<OsString, OsString>
where
    A: IntoIterator<Item = (OsString, OsString)>,
{
    let mut env: BTreeMap<OsString, OsString> = ambient.into_iter().collect();
    for (key, value) in overlay {
        match value {
            Some(v) => {
                env.insert(key.clone(), v.clone());
            }
            None => {
                env.remove(key);
            }
        }
    }
    for (key, value) in overrides {
        env.insert(key.clone(), value.clone());
    }
    env
}
