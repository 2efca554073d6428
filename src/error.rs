//! Error types for a bisection run.
//!
//! Only the fatal class of failure is modelled as an error. A user command
//! that runs and exits non-zero is not an error at this layer; it is the
//! [`Observation::Failed`](crate::observe::Observation::Failed) outcome, and
//! the engine's [`FailurePolicy`](crate::bisect::FailurePolicy) decides what
//! it means.

use thiserror::Error;

use crate::revision::Revision;

/// The VCS client could not switch the working state to a revision.
#[derive(Debug, Error)]
pub enum MaterializeError {
    /// The VCS program could not be started at all.
    #[error("failed to run `{command}`")]
    Spawn {
        /// The command line that was attempted.
        command: String,
        /// The underlying spawn error.
        #[source]
        source: std::io::Error,
    },

    /// The VCS program ran but reported failure.
    #[error("`{command}` failed{}{}", exit_suffix(*exit_code), stderr_suffix(stderr))]
    Failed {
        /// The command line that was run.
        command: String,
        /// Process exit code, if it exited normally.
        exit_code: Option<i32>,
        /// Captured stderr, trimmed.
        stderr: String,
    },
}

/// The user command could not be executed.
#[derive(Debug, Error)]
pub enum ObserveError {
    /// The command's executable does not exist.
    #[error("Command not found: {program}")]
    CommandNotFound {
        /// The program name as given on the command line.
        program: String,
    },

    /// Spawning or waiting on the command failed for another reason.
    #[error("failed to run `{command}`")]
    Spawn {
        /// The command line that was attempted.
        command: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// A fatal error that ends the search without a result.
#[derive(Debug, Error)]
pub enum BisectError {
    /// Materializing a revision failed.
    #[error("could not update to revision {revision}")]
    Materialize {
        /// The revision being materialized.
        revision: Revision,
        /// What went wrong.
        #[source]
        source: MaterializeError,
    },

    /// The observation could not be made.
    #[error(transparent)]
    Observe(#[from] ObserveError),

    /// The user command failed and the failure policy is `abort`.
    #[error(
        "command failed at revision {revision}{}{}",
        exit_suffix(*exit_code),
        stderr_suffix(stderr)
    )]
    CommandFailed {
        /// The revision at which the command failed.
        revision: Revision,
        /// Process exit code, if it exited normally.
        exit_code: Option<i32>,
        /// Captured stderr, trimmed.
        stderr: String,
    },
}

fn exit_suffix(code: Option<i32>) -> String {
    code.map_or_else(String::new, |c| format!(" (exit code {c})"))
}

fn stderr_suffix(stderr: &str) -> String {
    if stderr.is_empty() {
        String::new()
    } else {
        format!(": {stderr}")
    }
}
