// src/exec/mod.rs

//! Command execution engine.
//!
//! A call flows through these pieces in order:
//! - [`binding`]: a program name bound to a session, plus the `Call` builder.
//! - [`args`]: positional and keyword arguments rendered to argv.
//! - [`options`]: redirection targets and per-call switches.
//! - [`plan`]: which pipes and ptys the redirections need.
//! - [`launcher`]: fork, descriptor wiring in the child, exec.
//! - [`capture`]: line reader over captured output.
//! - [`invocation`]: the handle returned to the caller.
//! - [`jobs`]: exit-status collection and the background job list.

pub mod args;
pub mod binding;
pub mod capture;
pub mod invocation;
pub mod jobs;
pub mod launcher;
pub mod options;
pub mod plan;

pub use args::{Arg, ArgList, ArgValue};
pub use binding::{Call, ExecutableBinding};
pub use capture::CaptureStream;
pub use invocation::{Invocation, Lines};
pub use jobs::{Job, JobRegistry};
pub use options::{InlineData, Input, InvocationOptions, Output, PeerSource};
