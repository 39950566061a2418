// src/config/model.rs

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Deserialize;

use crate::types::Encoding;

/// Session configuration as read from a TOML file.
///
/// ```toml
/// [session]
/// errexit = true
/// search_path = ["/usr/bin", "/bin"]
///
/// [defaults]
/// line_terminator = "\n"
/// encoding = "utf-8"
/// chomp = true
///
/// [env]
/// LC_ALL = "C"
/// ```
///
/// All sections are optional and have reasonable defaults.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawConfigFile {
    #[serde(default)]
    pub session: SessionSection,

    #[serde(default)]
    pub defaults: DefaultsSection,

    /// Variables exported to every invocation, on top of the ambient
    /// environment.
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

/// Validated configuration. Only constructible through `TryFrom<RawConfigFile>`.
#[derive(Debug, Clone, Default)]
pub struct ConfigFile {
    pub session: SessionSection,
    pub defaults: DefaultsSection,
    pub env: BTreeMap<String, String>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(
        session: SessionSection,
        defaults: DefaultsSection,
        env: BTreeMap<String, String>,
    ) -> Self {
        Self {
            session,
            defaults,
            env,
        }
    }
}

/// `[session]` section.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct SessionSection {
    /// Fail on nonzero exit (`set -e`).
    #[serde(default)]
    pub errexit: bool,

    /// Directories searched for programs. If `None`, the ambient `PATH` is
    /// used.
    #[serde(default)]
    pub search_path: Option<Vec<PathBuf>>,
}

/// `[defaults]` section: per-invocation option defaults.
#[derive(Debug, Clone, Deserialize)]
pub struct DefaultsSection {
    #[serde(default = "default_line_terminator")]
    pub line_terminator: String,

    #[serde(default)]
    pub encoding: Encoding,

    #[serde(default = "default_chomp")]
    pub chomp: bool,
}

fn default_line_terminator() -> String {
    "\n".to_string()
}

fn default_chomp() -> bool {
    true
}

impl Default for DefaultsSection {
    fn default() -> Self {
        Self {
            line_terminator: default_line_terminator(),
            encoding: Encoding::default(),
            chomp: default_chomp(),
        }
    }
}
