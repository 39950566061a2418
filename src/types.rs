// src/types.rs

//! Small shared types: text encodings and exit-code constants.

use std::str::FromStr;

use serde::Deserialize;

use crate::errors::{Result, ShellwireError};

/// Text encoding used for inline input and captured output.
///
/// - `Utf8`: strict on encode (every `str` is valid), lossy on decode so a
///   program printing invalid bytes never aborts a capture.
/// - `Latin1`: one byte per char; encoding fails for chars above U+00FF.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub enum Encoding {
    #[default]
    Utf8,
    Latin1,
}

impl Encoding {
    pub fn encode(&self, text: &str) -> Result<Vec<u8>> {
        match self {
            Encoding::Utf8 => Ok(text.as_bytes().to_vec()),
            Encoding::Latin1 => text
                .chars()
                .map(|c| {
                    u8::try_from(u32::from(c)).map_err(|_| {
                        ShellwireError::Encoding(format!(
                            "character {c:?} cannot be encoded as latin-1"
                        ))
                    })
                })
                .collect(),
        }
    }

    pub fn decode(&self, bytes: &[u8]) -> String {
        match self {
            Encoding::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
            Encoding::Latin1 => bytes.iter().map(|&b| char::from(b)).collect(),
        }
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            Encoding::Utf8 => "utf-8",
            Encoding::Latin1 => "latin-1",
        }
    }
}

impl FromStr for Encoding {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "utf-8" | "utf8" => Ok(Encoding::Utf8),
            "latin-1" | "latin1" | "iso-8859-1" => Ok(Encoding::Latin1),
            other => Err(format!(
                "invalid encoding: {other} (expected \"utf-8\" or \"latin-1\")"
            )),
        }
    }
}

impl TryFrom<String> for Encoding {
    type Error = String;

    fn try_from(s: String) -> std::result::Result<Self, Self::Error> {
        s.parse()
    }
}

/// Exit code a child reports when the program image could not be replaced.
pub const EXIT_NOT_FOUND: i32 = 127;

/// Exit code a child reports when descriptor setup failed before exec.
pub const EXIT_SETUP_FAILED: i32 = 1;
