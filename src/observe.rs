//! The observation function: run the user command, look for the text.
//!
//! [`CommandObserver`] runs an arbitrary program with its argument vector,
//! captures stdout as text and reports whether the target text is a
//! substring of it. Stderr is only captured to surface it when the command
//! fails.
//!
//! A command that cannot be found is fatal ([`ObserveError`]). A command that
//! runs and exits non-zero is not: it yields [`Observation::Failed`], which
//! the engine turns into `false` or an abort depending on its policy.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use serde::Serialize;
use tracing::{debug, instrument, warn};

use crate::error::ObserveError;
use crate::revision::Revision;

/// The result of checking one revision.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "kebab-case")]
pub enum Observation {
    /// The command succeeded and its stdout contains the text.
    Present,
    /// The command succeeded and its stdout does not contain the text.
    Absent,
    /// The command ran but exited unsuccessfully.
    Failed {
        /// Exit code, or `None` if killed by a signal.
        exit_code: Option<i32>,
        /// Captured stderr, trimmed.
        stderr: String,
    },
}

impl Observation {
    /// Whether the text was seen. A failed command never counts as seen.
    #[must_use]
    pub const fn is_present(&self) -> bool {
        matches!(self, Self::Present)
    }
}

/// Something that can check the currently materialized revision.
///
/// `revision` is passed for diagnostics and for test doubles; a real
/// observer inspects whatever the working state currently is.
pub trait Observer {
    /// Observe the current working state.
    ///
    /// # Errors
    /// Returns [`ObserveError`] when the check cannot be carried out at all.
    fn observe(&mut self, revision: Revision) -> Result<Observation, ObserveError>;
}

impl<F> Observer for F
where
    F: FnMut(Revision) -> Result<Observation, ObserveError>,
{
    fn observe(&mut self, revision: Revision) -> Result<Observation, ObserveError> {
        self(revision)
    }
}

/// Runs a user command and searches its stdout for a text.
#[derive(Clone, Debug)]
pub struct CommandObserver {
    program: String,
    args: Vec<String>,
    text: String,
    cwd: Option<PathBuf>,
}

impl CommandObserver {
    /// Create an observer for `command` (program followed by its arguments).
    ///
    /// Returns `None` if `command` is empty.
    #[must_use]
    pub fn new(command: Vec<String>, text: impl Into<String>) -> Option<Self> {
        let mut command = command.into_iter();
        let program = command.next()?;
        Some(Self {
            program,
            args: command.collect(),
            text: text.into(),
            cwd: None,
        })
    }

    /// Run the command from `dir` instead of the current directory.
    #[must_use]
    pub fn in_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.cwd = Some(dir.as_ref().to_owned());
        self
    }

    /// The command line, space-joined, for messages.
    #[must_use]
    pub fn display_command(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl Observer for CommandObserver {
    #[instrument(skip(self), fields(command = %self.display_command()))]
    fn observe(&mut self, revision: Revision) -> Result<Observation, ObserveError> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = &self.cwd {
            cmd.current_dir(dir);
        }

        let output = cmd.output().map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                ObserveError::CommandNotFound {
                    program: self.program.clone(),
                }
            } else {
                ObserveError::Spawn {
                    command: self.display_command(),
                    source: e,
                }
            }
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_owned();
            warn!(
                exit_code = output.status.code(),
                %stderr,
                "command exited unsuccessfully"
            );
            return Ok(Observation::Failed {
                exit_code: output.status.code(),
                stderr,
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let found = stdout.contains(self.text.as_str());
        debug!(found, stdout_len = stdout.len(), "command finished");
        Ok(if found {
            Observation::Present
        } else {
            Observation::Absent
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sh(script: &str, text: &str) -> CommandObserver {
        CommandObserver::new(
            vec!["sh".to_owned(), "-c".to_owned(), script.to_owned()],
            text,
        )
        .unwrap()
    }

    #[test]
    fn empty_command_is_rejected() {
        assert!(CommandObserver::new(Vec::new(), "x").is_none());
    }

    #[test]
    fn program_and_arguments_are_split() {
        let obs = CommandObserver::new(
            vec!["make".to_owned(), "-C".to_owned(), "build".to_owned(), "check".to_owned()],
            "PASS",
        )
        .unwrap();
        assert_eq!(obs.display_command(), "make -C build check");
    }

    #[test]
    fn finds_text_in_stdout() {
        let mut obs = sh("echo 'build FIXED ok'", "FIXED");
        assert_eq!(obs.observe(Revision::new(1)).unwrap(), Observation::Present);
    }

    #[test]
    fn missing_text_is_absent() {
        let mut obs = sh("echo 'still broken'", "FIXED");
        assert_eq!(obs.observe(Revision::new(1)).unwrap(), Observation::Absent);
    }

    #[test]
    fn stderr_does_not_count() {
        let mut obs = sh("echo FIXED >&2", "FIXED");
        assert_eq!(obs.observe(Revision::new(1)).unwrap(), Observation::Absent);
    }

    #[test]
    fn nonzero_exit_is_a_failed_observation() {
        let mut obs = sh("echo FIXED; echo boom >&2; exit 3", "FIXED");
        assert_eq!(
            obs.observe(Revision::new(1)).unwrap(),
            Observation::Failed {
                exit_code: Some(3),
                stderr: "boom".to_owned(),
            }
        );
    }

    #[test]
    fn missing_program_is_fatal() {
        let mut obs = CommandObserver::new(
            vec!["svn-bisect-definitely-not-a-program".to_owned()],
            "x",
        )
        .unwrap();
        let err = obs.observe(Revision::new(1)).unwrap_err();
        assert!(
            matches!(err, ObserveError::CommandNotFound { ref program } if program == "svn-bisect-definitely-not-a-program"),
            "unexpected error: {err}"
        );
    }

    #[test]
    fn repeated_observation_is_stable() {
        let mut obs = sh("echo FIXED", "FIXED");
        let first = obs.observe(Revision::new(5)).unwrap();
        let second = obs.observe(Revision::new(5)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn runs_in_configured_dir() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("marker.txt"), "FIXED\n").unwrap();
        let mut obs = sh("cat marker.txt", "FIXED").in_dir(dir.path());
        assert_eq!(obs.observe(Revision::new(1)).unwrap(), Observation::Present);
    }
}
