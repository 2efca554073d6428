//! Rendering search progress and results.

use std::io::{self, Write};

use anyhow::{Context, Result};
use serde::Serialize;

use crate::bisect::{BisectOutcome, Probe, Reporter, SearchEvent};
use crate::observe::Observation;
use crate::revision::Revision;

/// Output format for the final result.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Progress lines while searching, then a one-line verdict.
    #[default]
    Text,
    /// No progress, one JSON object at the end.
    Json,
}

/// Final line for a search result in text mode.
#[must_use]
pub fn verdict(first: Option<Revision>) -> String {
    match first {
        Some(rev) => format!("The first revision containing the text is: {rev}"),
        None => "The text was not found in any revision in the given range.".to_owned(),
    }
}

/// Machine-readable summary of a run.
#[derive(Debug, Serialize)]
pub struct JsonReport<'a> {
    /// The transition point, `null` when not found.
    pub first_revision: Option<Revision>,
    /// Lower bound of the requested range.
    pub start: Revision,
    /// Upper bound of the requested range.
    pub end: Revision,
    /// The text searched for.
    pub text: &'a str,
    /// The command that was run per revision.
    pub command: &'a [String],
    /// Every probe made, in order.
    pub probes: &'a [Probe],
}

impl<'a> JsonReport<'a> {
    /// Summarize `outcome` for `[start, end]`.
    #[must_use]
    pub fn new(
        outcome: &'a BisectOutcome,
        start: Revision,
        end: Revision,
        text: &'a str,
        command: &'a [String],
    ) -> Self {
        Self {
            first_revision: outcome.first,
            start,
            end,
            text,
            command,
            probes: &outcome.probes,
        }
    }

    /// Pretty-printed JSON.
    ///
    /// # Errors
    /// Fails if the report cannot be represented as JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("JSON serialization failed")
    }
}

/// Prints progress lines as the search runs.
///
/// Progress goes to `out`; command failures, with their stderr, go to `err`.
pub struct TextReporter<W, E> {
    out: W,
    err: E,
    command: String,
}

impl TextReporter<io::Stdout, io::Stderr> {
    /// Report to the process's stdout and stderr.
    #[must_use]
    pub fn stdio(command: &[String]) -> Self {
        Self::new(io::stdout(), io::stderr(), command)
    }
}

impl TextReporter<io::Sink, io::Stderr> {
    /// Report only command failures, to stderr. Used when stdout carries
    /// structured output.
    #[must_use]
    pub fn failures_only(command: &[String]) -> Self {
        Self::new(io::sink(), io::stderr(), command)
    }
}

impl<W: Write, E: Write> TextReporter<W, E> {
    /// Report to arbitrary writers.
    pub fn new(out: W, err: E, command: &[String]) -> Self {
        Self {
            out,
            err,
            command: command.join(" "),
        }
    }

    fn write_event(&mut self, event: SearchEvent<'_>) -> io::Result<()> {
        match event {
            SearchEvent::Checking(rev) => writeln!(self.out, "Checking revision {rev}..."),
            SearchEvent::Verifying(rev) => writeln!(self.out, "Verifying revision {rev}..."),
            SearchEvent::Observed(probe) => self.write_probe(probe),
            SearchEvent::Confirmed(rev) => {
                writeln!(self.out, "First appearance of the text is in revision {rev}.")
            }
        }
    }

    fn write_probe(&mut self, probe: &Probe) -> io::Result<()> {
        let rev = probe.revision;
        let memo = if probe.cached { " (cached)" } else { "" };
        if let Observation::Failed { exit_code, stderr } = &probe.observation {
            writeln!(self.err, "Error executing command: {}", self.command)?;
            if let Some(code) = exit_code {
                writeln!(self.err, "Exit code: {code}")?;
            }
            writeln!(self.err, "Stderr: {stderr}")?;
        }
        if probe.observation.is_present() {
            writeln!(self.out, "Text found in revision {rev}.{memo}")
        } else {
            writeln!(self.out, "Text not found in revision {rev}.{memo}")
        }
    }
}

impl<W: Write, E: Write> Reporter for TextReporter<W, E> {
    fn report(&mut self, event: SearchEvent<'_>) {
        // A closed stdout must not abort the search.
        if let Err(e) = self.write_event(event) {
            tracing::debug!(error = %e, "progress output failed");
        }
    }
}
