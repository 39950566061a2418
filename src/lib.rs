// src/lib.rs

//! Shell-style command execution.
//!
//! A [`Session`] binds program names to [`ExecutableBinding`]s; calling a
//! binding spawns an [`Invocation`] with its streams wired to files, the
//! null device, inline data, capture pipes or other invocations.

pub mod cli;
pub mod config;
pub mod errors;
pub mod exec;
pub mod locate;
pub mod logging;
pub mod session;
pub mod types;

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use tracing::{debug, info};

pub use crate::errors::ShellwireError;
pub use crate::exec::{
    ArgList, ArgValue, CaptureStream, ExecutableBinding, InlineData, Input, Invocation,
    InvocationOptions, Output, PeerSource,
};
pub use crate::session::Session;
pub use crate::types::Encoding;

use crate::cli::{CliArgs, split_stages};
use crate::config::{default_config_path, load_or_default};

/// High-level entry point used by `main.rs`.
///
/// Runs the pipeline described by `args` and returns the last stage's exit
/// code.
pub fn run(args: CliArgs) -> Result<i32> {
    let config_path = args
        .config
        .as_ref()
        .map(PathBuf::from)
        .unwrap_or_else(default_config_path);
    let cfg = load_or_default(&config_path)
        .with_context(|| format!("loading config {}", config_path.display()))?;

    let session = Session::from_config(&cfg);
    if args.errexit {
        session.set_fail_on_nonzero(true);
    }
    for (key, value) in &args.env {
        session.export(key, value);
    }

    let stages = split_stages(&args.command).map_err(anyhow::Error::msg)?;

    if args.dry_run {
        print_dry_run(&session, &stages);
        return Ok(0);
    }

    info!(stages = stages.len(), "running pipeline");
    let code = run_pipeline(&session, &stages, &args)?;

    // Upstream stages normally finished once the last one hit EOF.
    for (pid, code) in session.wait_pending()? {
        debug!(%pid, exit_code = code, "upstream stage finished");
    }
    Ok(code)
}

fn run_pipeline(session: &Session, stages: &[Vec<String>], args: &CliArgs) -> Result<i32> {
    let mut upstream: Option<Invocation> = None;
    let last = stages.len() - 1;

    for (idx, stage) in stages.iter().enumerate() {
        let Some((program, rest)) = stage.split_first() else {
            bail!("empty pipeline stage");
        };
        let binding = session.binding(program);
        let mut call = binding.call().args(rest.iter().cloned());

        call = match upstream.as_mut() {
            Some(prev) => call.stdin(Input::peer(prev)?),
            None if !args.input.is_empty() => call.stdin(Input::lines(&args.input)),
            None => call,
        };
        if idx < last {
            call = call.stdout(Output::Pipe);
        } else if args.capture {
            call = call.stdout(Output::Capture);
        }

        let invocation = call.spawn()?;
        if idx == last {
            return finish(invocation, args.capture);
        }
        upstream = Some(invocation);
    }
    bail!("no command given")
}

fn finish(mut invocation: Invocation, capture: bool) -> Result<i32> {
    if capture {
        for line in invocation.lines() {
            println!("{}", line?);
        }
    }
    Ok(invocation.exit_code()?)
}

/// Print each stage with its resolved path.
fn print_dry_run(session: &Session, stages: &[Vec<String>]) {
    println!("shellwire dry-run");
    println!("  errexit = {}", session.fail_on_nonzero());
    println!("  search_path = {}", session.search_path().to_string_lossy());
    println!();

    println!("stages ({}):", stages.len());
    for stage in stages {
        let binding = session.binding(&stage[0]);
        let resolved = match binding.resolve() {
            Ok(path) => path.display().to_string(),
            Err(e) => format!("<{e}>"),
        };
        println!("  - {}", stage.join(" "));
        println!("      path: {resolved}");
    }

    debug!("dry-run complete (no execution)");
}
