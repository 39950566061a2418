// src/exec/args.rs

//! Program argument lists.
//!
//! Positional arguments pass through untouched. Keyword arguments are
//! rendered as flags:
//!
//! | key | value | argv |
//! |-----|-------|------|
//! | `l` | `true` | `-l` |
//! | `n` | `"3"` | `-n 3` |
//! | `color` | `true` | `--color` |
//! | `color` | `"never"` | `--color=never` |
//! | any | `false` | *(dropped)* |
//! | `e` | `["a", "b"]` | `-e a -e b` |
//!
//! Items keep insertion order, so flags and positionals can be interleaved.

use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};

/// Value attached to a keyword argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgValue {
    /// `true` renders the bare flag, `false` drops it.
    Bool(bool),
    Text(OsString),
    /// Repeats the flag once per element.
    List(Vec<OsString>),
}

impl From<bool> for ArgValue {
    fn from(b: bool) -> Self {
        ArgValue::Bool(b)
    }
}

impl From<&str> for ArgValue {
    fn from(s: &str) -> Self {
        ArgValue::Text(s.into())
    }
}

impl From<String> for ArgValue {
    fn from(s: String) -> Self {
        ArgValue::Text(s.into())
    }
}

impl From<OsString> for ArgValue {
    fn from(s: OsString) -> Self {
        ArgValue::Text(s)
    }
}

impl From<&Path> for ArgValue {
    fn from(p: &Path) -> Self {
        ArgValue::Text(p.as_os_str().to_owned())
    }
}

impl From<PathBuf> for ArgValue {
    fn from(p: PathBuf) -> Self {
        ArgValue::Text(p.into_os_string())
    }
}

macro_rules! arg_value_from_number {
    ($($t:ty),*) => {
        $(
            impl From<$t> for ArgValue {
                fn from(n: $t) -> Self {
                    ArgValue::Text(n.to_string().into())
                }
            }
        )*
    };
}

arg_value_from_number!(i32, i64, u32, u64, usize, f64);

impl<T: Into<OsString>> From<Vec<T>> for ArgValue {
    fn from(items: Vec<T>) -> Self {
        ArgValue::List(items.into_iter().map(Into::into).collect())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Arg {
    Positional(OsString),
    Keyword { key: String, value: ArgValue },
}

/// Ordered arguments for one invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArgList {
    items: Vec<Arg>,
}

impl ArgList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arg(mut self, value: impl Into<OsString>) -> Self {
        self.push_arg(value);
        self
    }

    pub fn args<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        for v in values {
            self.push_arg(v);
        }
        self
    }

    pub fn flag(mut self, key: &str, value: impl Into<ArgValue>) -> Self {
        self.push_flag(key, value);
        self
    }

    pub fn push_arg(&mut self, value: impl Into<OsString>) {
        self.items.push(Arg::Positional(value.into()));
    }

    pub fn push_flag(&mut self, key: &str, value: impl Into<ArgValue>) {
        self.items.push(Arg::Keyword {
            key: key.to_string(),
            value: value.into(),
        });
    }

    pub fn items(&self) -> &[Arg] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Render to the argument vector passed to the program (without argv[0]).
    pub fn to_argv(&self) -> Vec<OsString> {
        let mut out = Vec::with_capacity(self.items.len());
        for item in &self.items {
            match item {
                Arg::Positional(v) => out.push(v.clone()),
                Arg::Keyword { key, value } => format_flag(key, value, &mut out),
            }
        }
        out
    }
}

/// Append the argv rendering of one keyword argument to `out`.
pub fn format_flag(key: &str, value: &ArgValue, out: &mut Vec<OsString>) {
    match value {
        ArgValue::Bool(false) => {}
        ArgValue::Bool(true) => out.push(flag_name(key)),
        ArgValue::Text(v) => push_flag_with_value(key, v, out),
        ArgValue::List(values) => {
            for v in values {
                push_flag_with_value(key, v, out);
            }
        }
    }
}

fn push_flag_with_value(key: &str, value: &OsStr, out: &mut Vec<OsString>) {
    if is_short(key) {
        out.push(flag_name(key));
        out.push(value.to_owned());
    } else {
        let mut joined = flag_name(key);
        joined.push("=");
        joined.push(value);
        out.push(joined);
    }
}

fn flag_name(key: &str) -> OsString {
    if is_short(key) {
        format!("-{key}").into()
    } else {
        format!("--{key}").into()
    }
}

fn is_short(key: &str) -> bool {
    key.chars().count() == 1
}
