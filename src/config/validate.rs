// src/config/validate.rs

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{Result, ShellwireError};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = ShellwireError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw.session, raw.defaults, raw.env))
    }
}

/// Run all checks on an already-deserialized config.
pub fn validate_config(cfg: &RawConfigFile) -> Result<()> {
    validate_raw_config(cfg)
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    validate_search_path(cfg)?;
    validate_env(cfg)?;
    Ok(())
}

fn validate_search_path(cfg: &RawConfigFile) -> Result<()> {
    let Some(dirs) = &cfg.session.search_path else {
        return Ok(());
    };
    for (idx, dir) in dirs.iter().enumerate() {
        if dir.as_os_str().is_empty() {
            return Err(ShellwireError::ConfigError(format!(
                "[session].search_path entry {idx} is empty"
            )));
        }
    }
    // join_paths refuses entries containing the separator itself.
    if let Err(e) = std::env::join_paths(dirs) {
        return Err(ShellwireError::ConfigError(format!(
            "[session].search_path is not representable as PATH: {e}"
        )));
    }
    Ok(())
}

fn validate_env(cfg: &RawConfigFile) -> Result<()> {
    for (key, value) in cfg.env.iter() {
        if key.is_empty() {
            return Err(ShellwireError::ConfigError(
                "[env] contains an empty variable name".to_string(),
            ));
        }
        if key.contains('=') || key.contains('\0') {
            return Err(ShellwireError::ConfigError(format!(
                "[env] variable name '{}' must not contain '=' or NUL",
                key
            )));
        }
        if value.contains('\0') {
            return Err(ShellwireError::ConfigError(format!(
                "[env] value of '{}' must not contain NUL",
                key
            )));
        }
    }
    Ok(())
}
