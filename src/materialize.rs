//! Switching the working copy to a revision.
//!
//! The default [`VcsMaterializer`] runs `svn update -r <rev>`; program and
//! argument template are configurable so any VCS with a "go to revision N"
//! command works. The call blocks until the client exits. Any failure is
//! fatal to the search.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tracing::{debug, instrument};

use crate::error::MaterializeError;
use crate::revision::Revision;

/// Placeholder replaced by the revision number in argument templates.
pub const REV_PLACEHOLDER: &str = "{rev}";

/// Something that can make the working state match a revision.
pub trait Materializer {
    /// Switch to `revision`, blocking until done.
    ///
    /// # Errors
    /// Returns [`MaterializeError`] if the working state could not be
    /// brought to `revision`.
    fn materialize(&mut self, revision: Revision) -> Result<(), MaterializeError>;
}

impl<F> Materializer for F
where
    F: FnMut(Revision) -> Result<(), MaterializeError>,
{
    fn materialize(&mut self, revision: Revision) -> Result<(), MaterializeError> {
        self(revision)
    }
}

/// Runs a VCS client to update the working copy.
#[derive(Clone, Debug)]
pub struct VcsMaterializer {
    program: String,
    args: Vec<String>,
    cwd: Option<PathBuf>,
}

impl VcsMaterializer {
    /// A VCS client such as `svn`. Each occurrence of [`REV_PLACEHOLDER`]
    /// in `args` is replaced by the revision number.
    #[must_use]
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            cwd: None,
        }
    }

    /// Run the client from `dir` instead of the current directory.
    #[must_use]
    pub fn in_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.cwd = Some(dir.as_ref().to_owned());
        self
    }

    /// The argument vector for `revision`.
    #[must_use]
    pub fn args_for(&self, revision: Revision) -> Vec<String> {
        let rev = revision.to_string();
        self.args
            .iter()
            .map(|a| a.replace(REV_PLACEHOLDER, &rev))
            .collect()
    }

    fn display_command(&self, args: &[String]) -> String {
        std::iter::once(self.program.as_str())
            .chain(args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// The default argument template, `["update", "-r", "{rev}"]`.
#[must_use]
pub fn default_update_args() -> Vec<String> {
    vec!["update".to_owned(), "-r".to_owned(), REV_PLACEHOLDER.to_owned()]
}

impl Materializer for VcsMaterializer {
    #[instrument(skip(self), fields(program = %self.program))]
    fn materialize(&mut self, revision: Revision) -> Result<(), MaterializeError> {
        let args = self.args_for(revision);
        let command = self.display_command(&args);

        let mut cmd = Command::new(&self.program);
        cmd.args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = &self.cwd {
            cmd.current_dir(dir);
        }

        let output = cmd.output().map_err(|source| MaterializeError::Spawn {
            command: command.clone(),
            source,
        })?;

        if !output.status.success() {
            return Err(MaterializeError::Failed {
                command,
                exit_code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
            });
        }

        debug!(
            stdout = %String::from_utf8_lossy(&output.stdout).trim(),
            "working copy updated"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn svn_template_substitutes_revision() {
        let m = VcsMaterializer::new("svn", default_update_args());
        assert_eq!(m.args_for(Revision::new(150)), ["update", "-r", "150"]);
    }

    #[test]
    fn placeholder_inside_argument() {
        let m = VcsMaterializer::new("hg", vec!["update".to_owned(), "--rev={rev}".to_owned()]);
        assert_eq!(m.args_for(Revision::new(-1)), ["update", "--rev=-1"]);
    }

    #[test]
    fn runs_client_in_dir() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut m = VcsMaterializer::new(
            "sh",
            vec!["-c".to_owned(), "echo {rev} > current_rev".to_owned()],
        )
        .in_dir(dir.path());
        m.materialize(Revision::new(42)).unwrap();
        let written = std::fs::read_to_string(dir.path().join("current_rev")).unwrap();
        assert_eq!(written.trim(), "42");
    }

    #[test]
    fn failing_client_is_an_error() {
        let mut m = VcsMaterializer::new(
            "sh",
            vec!["-c".to_owned(), "echo 'no such revision {rev}' >&2; exit 1".to_owned()],
        );
        let err = m.materialize(Revision::new(9)).unwrap_err();
        match &err {
            MaterializeError::Failed {
                exit_code, stderr, ..
            } => {
                assert_eq!(*exit_code, Some(1));
                assert_eq!(stderr, "no such revision 9");
            }
            MaterializeError::Spawn { .. } => panic!("expected Failed, got {err}"),
        }
    }

    #[test]
    fn missing_client_is_a_spawn_error() {
        let mut m = VcsMaterializer::new("svn-bisect-no-such-vcs", default_update_args());
        let err = m.materialize(Revision::new(1)).unwrap_err();
        assert!(matches!(err, MaterializeError::Spawn { .. }), "got {err}");
    }
}
