#![allow(dead_code)]

use std::path::PathBuf;

use shellwire::Session;
use shellwire::config::{ConfigFile, DefaultsSection, RawConfigFile, SessionSection};
use shellwire::locate::mock::MockLocator;
use shellwire::types::Encoding;

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile {
                session: SessionSection::default(),
                defaults: DefaultsSection::default(),
                env: Default::default(),
            },
        }
    }

    pub fn errexit(mut self, val: bool) -> Self {
        self.config.session.errexit = val;
        self
    }

    pub fn search_path(mut self, dirs: Vec<PathBuf>) -> Self {
        self.config.session.search_path = Some(dirs);
        self
    }

    pub fn line_terminator(mut self, end: &str) -> Self {
        self.config.defaults.line_terminator = end.to_string();
        self
    }

    pub fn encoding(mut self, encoding: Encoding) -> Self {
        self.config.defaults.encoding = encoding;
        self
    }

    pub fn chomp(mut self, val: bool) -> Self {
        self.config.defaults.chomp = val;
        self
    }

    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.config.env.insert(key.to_string(), value.to_string());
        self
    }

    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }

    /// Session over the real search path.
    pub fn session(self) -> Session {
        Session::from_config(&self.build())
    }

    /// Session answering lookups from `locator` only.
    pub fn session_with(self, locator: MockLocator) -> Session {
        Session::with_locator(&self.build(), locator)
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}
