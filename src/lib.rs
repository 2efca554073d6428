//! svn-bisect library crate.
//!
//! The primary interface is the `svn-bisect` binary. The engine and its
//! two collaborators are exposed here so they can be driven directly, with
//! a real VCS client or with test doubles.

pub mod bisect;
pub mod config;
pub mod error;
pub mod format;
pub mod materialize;
pub mod observe;
pub mod revision;
pub mod telemetry;

pub use bisect::{BisectOutcome, Bisector, BoundaryPolicy, FailurePolicy, SearchOptions};
pub use revision::Revision;
