//! The bisection engine.
//!
//! Finds the first revision in `[start, end]` at which the observation turns
//! from absent to present, assuming it is monotonic over the range.
//!
//! # Algorithm
//!
//! 1. **Search.** Binary search over `[start, high]` for the lowest revision
//!    observed present. Each step materializes the midpoint and observes it;
//!    present narrows left (`high = mid - 1`), absent narrows right
//!    (`low = mid + 1`). No present observation means "not found".
//! 2. **Verify.** Materialize and observe the candidate's predecessor. Absent
//!    there confirms the candidate as the transition point. Present there
//!    re-enters step 1 on `[start, candidate - 1]`.
//!
//! The loop replaces recursion; each re-entry strictly lowers `high`.
//!
//! When the candidate is `start` itself, [`BoundaryPolicy`] decides whether
//! the predecessor probe runs one revision below the range
//! ([`BoundaryPolicy::ProbeBelow`]) or is skipped
//! ([`BoundaryPolicy::Clamp`]).
//!
//! The engine holds no hidden state: the working copy lives behind the
//! [`Materializer`], the check behind the [`Observer`].

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::error::BisectError;
use crate::materialize::Materializer;
use crate::observe::{Observation, Observer};
use crate::revision::Revision;

// ---------------------------------------------------------------------------
// Policies
// ---------------------------------------------------------------------------

/// What a failed user command means for the search.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    /// Report the failure and count the revision as "text not found".
    #[default]
    Absent,
    /// Stop the search with [`BisectError::CommandFailed`].
    Abort,
}

/// Whether the predecessor probe may leave the range at its lower end.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum BoundaryPolicy {
    /// Probe `start - 1` when the candidate is `start`.
    #[default]
    ProbeBelow,
    /// Accept `start` without probing outside the range.
    Clamp,
}

/// Tunables for one search.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SearchOptions {
    /// Handling of failed user commands.
    pub on_command_failure: FailurePolicy,
    /// Handling of the lower range boundary.
    pub boundary: BoundaryPolicy,
    /// Remember observations per revision and skip re-probing them.
    pub memoize: bool,
}

// ---------------------------------------------------------------------------
// Probe records and events
// ---------------------------------------------------------------------------

/// Which step of the algorithm made a probe.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
    /// Binary search for a present revision.
    Search,
    /// Predecessor check of a candidate.
    Verify,
}

/// One observation made during a search.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Probe {
    /// The revision observed.
    pub revision: Revision,
    /// The step that asked for it.
    pub phase: Phase,
    /// What was seen.
    pub observation: Observation,
    /// Served from the memo table rather than re-run.
    pub cached: bool,
}

/// The result of a completed search.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BisectOutcome {
    /// The first revision at which the text appears, or `None` if not found.
    pub first: Option<Revision>,
    /// Every probe, in the order made.
    pub probes: Vec<Probe>,
}

/// Progress notifications, delivered as the search runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SearchEvent<'a> {
    /// About to materialize and observe a midpoint.
    Checking(Revision),
    /// About to materialize and observe a candidate's predecessor.
    Verifying(Revision),
    /// An observation is available.
    Observed(&'a Probe),
    /// The transition point has been confirmed.
    Confirmed(Revision),
}

/// Receives [`SearchEvent`]s.
pub trait Reporter {
    /// Handle one event.
    fn report(&mut self, event: SearchEvent<'_>);
}

/// A reporter that ignores everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct Silent;

impl Reporter for Silent {
    fn report(&mut self, _event: SearchEvent<'_>) {}
}

// ---------------------------------------------------------------------------
// Bisector
// ---------------------------------------------------------------------------

/// Drives a [`Materializer`] and an [`Observer`] to find a transition point.
pub struct Bisector<M, O> {
    materializer: M,
    observer: O,
    options: SearchOptions,
}

impl<M: Materializer, O: Observer> Bisector<M, O> {
    /// Create an engine with default options.
    pub fn new(materializer: M, observer: O) -> Self {
        Self {
            materializer,
            observer,
            options: SearchOptions::default(),
        }
    }

    /// Replace the search options.
    #[must_use]
    pub fn with_options(mut self, options: SearchOptions) -> Self {
        self.options = options;
        self
    }

    /// Find the first revision in `[start, end]` at which the text is present.
    ///
    /// `end < start` is an empty range and yields "not found" without
    /// touching either collaborator.
    ///
    /// # Errors
    /// Any materialization failure, a missing command executable, or a
    /// failed command under [`FailurePolicy::Abort`] ends the search with
    /// [`BisectError`]. No partial result is returned.
    #[instrument(skip_all, fields(start = %start, end = %end))]
    pub fn run(
        &mut self,
        start: Revision,
        end: Revision,
        reporter: &mut dyn Reporter,
    ) -> Result<BisectOutcome, BisectError> {
        let mut search = Search {
            engine: self,
            reporter,
            probes: Vec::new(),
            memo: HashMap::new(),
        };
        let first = search.locate(start, end)?;
        match first {
            Some(rev) => info!(revision = %rev, probes = search.probes.len(), "transition found"),
            None => info!(probes = search.probes.len(), "no transition in range"),
        }
        Ok(BisectOutcome {
            first,
            probes: search.probes,
        })
    }
}

/// Per-run state: the probe log and the optional memo table.
struct Search<'e, 'r, M, O> {
    engine: &'e mut Bisector<M, O>,
    reporter: &'r mut dyn Reporter,
    probes: Vec<Probe>,
    memo: HashMap<Revision, Observation>,
}

impl<M: Materializer, O: Observer> Search<'_, '_, M, O> {
    fn locate(&mut self, start: Revision, end: Revision) -> Result<Option<Revision>, BisectError> {
        let mut high = end;
        loop {
            let Some(good) = self.lowest_present(start, high)? else {
                return Ok(None);
            };

            if good == start && self.engine.options.boundary == BoundaryPolicy::Clamp {
                return Ok(Some(self.confirm(good)));
            }

            // Nothing is representable below i64::MIN, so there is nothing to rule out.
            let Some(before) = good.pred() else {
                return Ok(Some(self.confirm(good)));
            };

            if !self.probe(before, Phase::Verify)? {
                return Ok(Some(self.confirm(good)));
            }

            debug!(candidate = %good, "predecessor also present, searching lower");
            high = before;
        }
    }

    /// Phase 1: binary search for the lowest revision observed present.
    fn lowest_present(
        &mut self,
        start: Revision,
        end: Revision,
    ) -> Result<Option<Revision>, BisectError> {
        let (mut low, mut high) = (start, end);
        let mut good = None;

        while low <= high {
            let mid = Revision::midpoint(low, high);
            if self.probe(mid, Phase::Search)? {
                good = Some(mid);
                match mid.pred() {
                    Some(p) => high = p,
                    None => break,
                }
            } else {
                match mid.succ() {
                    Some(s) => low = s,
                    None => break,
                }
            }
        }

        Ok(good)
    }

    /// Materialize `revision`, observe it and log the probe.
    ///
    /// Returns whether the text counts as present.
    fn probe(&mut self, revision: Revision, phase: Phase) -> Result<bool, BisectError> {
        if self.engine.options.memoize
            && let Some(observation) = self.memo.get(&revision).cloned()
        {
            debug!(revision = %revision, "memoized observation");
            return Ok(self.record(revision, phase, observation, true));
        }

        self.reporter.report(match phase {
            Phase::Search => SearchEvent::Checking(revision),
            Phase::Verify => SearchEvent::Verifying(revision),
        });

        self.engine
            .materializer
            .materialize(revision)
            .map_err(|source| BisectError::Materialize { revision, source })?;
        let observation = self.engine.observer.observe(revision)?;

        if self.engine.options.memoize {
            self.memo.insert(revision, observation.clone());
        }

        if let Observation::Failed { exit_code, stderr } = &observation
            && self.engine.options.on_command_failure == FailurePolicy::Abort
        {
            return Err(BisectError::CommandFailed {
                revision,
                exit_code: *exit_code,
                stderr: stderr.clone(),
            });
        }

        Ok(self.record(revision, phase, observation, false))
    }

    fn record(
        &mut self,
        revision: Revision,
        phase: Phase,
        observation: Observation,
        cached: bool,
    ) -> bool {
        let present = observation.is_present();
        debug!(revision = %revision, ?phase, present, cached, "observed");
        self.probes.push(Probe {
            revision,
            phase,
            observation,
            cached,
        });
        if let Some(probe) = self.probes.last() {
            self.reporter.report(SearchEvent::Observed(probe));
        }
        present
    }

    fn confirm(&mut self, revision: Revision) -> Revision {
        self.reporter.report(SearchEvent::Confirmed(revision));
        revision
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
