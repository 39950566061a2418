// src/exec/binding.rs

//! Executable bindings and the per-call builder.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use tracing::trace;

use crate::errors::{Result, ShellwireError};
use crate::exec::args::{ArgList, ArgValue};
use crate::exec::invocation::Invocation;
use crate::exec::options::{Input, InvocationOptions, Output};
use crate::session::Session;
use crate::types::Encoding;

/// A logical program name bound to a session.
///
/// Construction never fails. The name is resolved at every call, so a
/// program installed after the binding was made is still found.
#[derive(Debug, Clone)]
pub struct ExecutableBinding {
    session: Session,
    name: String,
    explicit_path: Option<PathBuf>,
}

impl ExecutableBinding {
    pub(crate) fn new(session: Session, name: &str) -> Self {
        Self {
            session,
            name: name.to_string(),
            explicit_path: None,
        }
    }

    pub(crate) fn with_path(session: Session, path: &Path) -> Self {
        Self {
            session,
            name: path.to_string_lossy().into_owned(),
            explicit_path: Some(path.to_path_buf()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Find the executable: the name as given, then with `_` replaced by `-`.
    pub fn resolve(&self) -> Result<PathBuf> {
        if let Some(path) = &self.explicit_path {
            return Ok(path.clone());
        }
        if let Some(path) = self.session.locate(&self.name) {
            return Ok(path);
        }
        if self.name.contains('_') {
            let dashed = self.name.replace('_', "-");
            trace!(name = %self.name, fallback = %dashed, "retrying with dashes");
            if let Some(path) = self.session.locate(&dashed) {
                return Ok(path);
            }
        }
        Err(ShellwireError::Resolution {
            name: self.name.clone(),
        })
    }

    /// Start building a call.
    pub fn call(&self) -> Call<'_> {
        Call {
            binding: self,
            args: ArgList::new(),
            options: self.session.options(),
            error: None,
        }
    }

    /// Run with `args` and `options` as given.
    pub fn spawn(&self, args: ArgList, options: InvocationOptions) -> Result<Invocation> {
        Invocation::start(self, args, options)
    }

    /// Run in the foreground with default options, output inherited.
    pub fn run<I, S>(&self, args: I) -> Result<Invocation>
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.call().args(args).spawn()
    }

    /// Run in the foreground and capture stdout.
    pub fn capture<I, S>(&self, args: I) -> Result<Invocation>
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.call().args(args).stdout(Output::Capture).spawn()
    }
}

/// Builder for one invocation of a binding.
///
/// Keyword arguments whose key starts with `_` are control options; an
/// unknown one is reported by [`Call::spawn`].
#[derive(Debug)]
pub struct Call<'a> {
    binding: &'a ExecutableBinding,
    args: ArgList,
    options: InvocationOptions,
    error: Option<ShellwireError>,
}

impl<'a> Call<'a> {
    pub fn arg(mut self, value: impl Into<OsString>) -> Self {
        self.args.push_arg(value);
        self
    }

    pub fn args<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        for v in values {
            self.args.push_arg(v);
        }
        self
    }

    pub fn flag(mut self, key: &str, value: impl Into<ArgValue>) -> Self {
        if key.starts_with('_') {
            if let Err(e) = self.options.apply_control(key, value.into()) {
                self.error.get_or_insert(e);
            }
        } else {
            self.args.push_flag(key, value);
        }
        self
    }

    pub fn stdin(mut self, input: Input) -> Self {
        self.options.stdin = input;
        self
    }

    pub fn stdout(mut self, output: Output) -> Self {
        self.options.stdout = output;
        self
    }

    pub fn stderr(mut self, output: Output) -> Self {
        self.options.stderr = output;
        self
    }

    pub fn line_terminator(mut self, end: impl Into<Vec<u8>>) -> Self {
        self.options.line_terminator = end.into();
        self
    }

    pub fn chomp(mut self, chomp: bool) -> Self {
        self.options.chomp = chomp;
        self
    }

    pub fn encoding(mut self, encoding: Encoding) -> Self {
        self.options.encoding = encoding;
        self
    }

    pub fn background(mut self, background: bool) -> Self {
        self.options.background = background;
        self
    }

    pub fn fail_tolerant(mut self, tolerant: bool) -> Self {
        self.options.fail_tolerant = tolerant;
        self
    }

    pub fn env(mut self, key: impl Into<OsString>, value: impl Into<OsString>) -> Self {
        self.options.set_env(key, value);
        self
    }

    pub fn envs(mut self, vars: BTreeMap<OsString, OsString>) -> Self {
        self.options.env.extend(vars);
        self
    }

    pub fn in_tty(mut self, tty: bool) -> Self {
        self.options.in_tty = tty;
        self
    }

    pub fn out_tty(mut self, tty: bool) -> Self {
        self.options.out_tty = tty;
        self
    }

    pub fn spawn(self) -> Result<Invocation> {
        if let Some(e) = self.error {
            return Err(e);
        }
        self.binding.spawn(self.args, self.options)
    }
}
