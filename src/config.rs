//! Bisection configuration (`.svn-bisect.toml`).
//!
//! Every field is optional. A missing file means all defaults, which
//! reproduce the classic behaviour: `svn update -r <rev>`, failed commands
//! count as "text not found", the predecessor probe may leave the range.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::bisect::{BoundaryPolicy, FailurePolicy, SearchOptions};
use crate::materialize::{VcsMaterializer, default_update_args};

/// Default config file name, looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = ".svn-bisect.toml";

/// VCS client used when the config names none.
pub const DEFAULT_VCS_TOOL: &str = "svn";

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Top-level configuration.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BisectConfig {
    /// How revisions are materialized.
    #[serde(default)]
    pub vcs: VcsConfig,

    /// Search behaviour.
    #[serde(default)]
    pub search: SearchConfig,
}

// ---------------------------------------------------------------------------
// VcsConfig
// ---------------------------------------------------------------------------

/// The VCS client used to switch revisions.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VcsConfig {
    /// Program to run (default: `"svn"`).
    #[serde(default = "default_tool")]
    pub tool: String,

    /// Argument template; `{rev}` is replaced by the revision number
    /// (default: `["update", "-r", "{rev}"]`).
    #[serde(default = "default_update_args")]
    pub update_args: Vec<String>,
}

impl Default for VcsConfig {
    fn default() -> Self {
        Self {
            tool: default_tool(),
            update_args: default_update_args(),
        }
    }
}

fn default_tool() -> String {
    DEFAULT_VCS_TOOL.to_owned()
}

impl VcsConfig {
    /// Build the materializer this section describes.
    #[must_use]
    pub fn materializer(&self) -> VcsMaterializer {
        VcsMaterializer::new(self.tool.clone(), self.update_args.clone())
    }
}

// ---------------------------------------------------------------------------
// SearchConfig
// ---------------------------------------------------------------------------

/// Engine policies.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SearchConfig {
    /// What a failed user command means.
    #[serde(default)]
    pub on_command_failure: FailurePolicy,

    /// Whether the predecessor probe may go below the range.
    #[serde(default)]
    pub boundary: BoundaryPolicy,

    /// Cache observations per revision within one run.
    #[serde(default)]
    pub memoize: bool,
}

impl From<SearchConfig> for SearchOptions {
    fn from(c: SearchConfig) -> Self {
        Self {
            on_command_failure: c.on_command_failure,
            boundary: c.boundary,
            memoize: c.memoize,
        }
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// The configuration file could not be read or parsed.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("{}", match path {
    Some(p) => format!("{}: {message}", p.display()),
    None => format!("config error: {message}"),
})]
pub struct ConfigError {
    /// The path that was being loaded (if available).
    pub path: Option<PathBuf>,
    /// Human-readable message with line-level detail when possible.
    pub message: String,
}

impl BisectConfig {
    /// Load configuration from a TOML file.
    ///
    /// - If the file does not exist, returns all defaults (not an error).
    /// - If the file exists but contains invalid TOML or unknown fields,
    ///   returns a [`ConfigError`] with line-level detail.
    ///
    /// # Errors
    /// Returns `ConfigError` on I/O errors (other than not-found) or parse errors.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(ConfigError {
                    path: Some(path.to_owned()),
                    message: format!("could not read file: {e}"),
                });
            }
        };
        Self::parse(&contents).map_err(|mut e| {
            e.path = Some(path.to_owned());
            e
        })
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    /// Returns `ConfigError` on invalid TOML or unknown fields.
    pub fn parse(toml_str: &str) -> Result<Self, ConfigError> {
        toml::from_str(toml_str).map_err(|e| {
            let mut message = e.message().to_owned();
            if let Some(span) = e.span() {
                let line = toml_str[..span.start]
                    .chars()
                    .filter(|&c| c == '\n')
                    .count()
                    + 1;
                message = format!("line {line}: {message}");
            }
            ConfigError {
                path: None,
                message,
            }
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
