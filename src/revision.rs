//! Revision numbers in a linear, centrally-numbered history.
//!
//! A [`Revision`] has no internal structure. Only ordering and the
//! arithmetic the bisection needs (midpoint, predecessor, successor) are
//! exposed.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A revision number.
///
/// Revisions are plain integers. Negative values are representable because
/// the predecessor probe below a range starting at `0` yields `-1`; whether
/// the backing VCS accepts it is the materializer's business.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Revision(i64);

impl Revision {
    /// Wrap a raw revision number.
    #[must_use]
    pub const fn new(n: i64) -> Self {
        Self(n)
    }

    /// The raw revision number.
    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }

    /// The revision immediately before this one, if representable.
    #[must_use]
    pub const fn pred(self) -> Option<Self> {
        match self.0.checked_sub(1) {
            Some(n) => Some(Self(n)),
            None => None,
        }
    }

    /// The revision immediately after this one, if representable.
    #[must_use]
    pub const fn succ(self) -> Option<Self> {
        match self.0.checked_add(1) {
            Some(n) => Some(Self(n)),
            None => None,
        }
    }

    /// `floor((low + high) / 2)` for `low <= high`, without overflow.
    ///
    /// `high - low` is non-negative here, so truncating division floors.
    #[must_use]
    pub const fn midpoint(low: Self, high: Self) -> Self {
        debug_assert!(low.0 <= high.0);
        Self(low.0 + (high.0 - low.0) / 2)
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Revision {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(Self)
    }
}
