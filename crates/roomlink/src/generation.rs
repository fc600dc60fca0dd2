//! Attempt epochs.
//!
//! Every asynchronous completion (an authentication result, a socket open,
//! a backoff timer, a pong timeout) is tagged with the [`Generation`] that
//! was current when it was scheduled. On firing it compares its tag with
//! the live value and does nothing if they differ. Any transition that
//! supersedes outstanding work calls [`GenerationGuard::bump`].

use std::fmt;

/// A generation tag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Generation(u64);

impl Generation {
    /// The generation a fresh session starts in.
    pub const ZERO: Self = Self(0);

    /// Get the raw counter value.
    pub fn value(self) -> u64 {
        self.0
    }

    /// Check whether the session has ever invalidated its work.
    pub fn is_initial(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Generation> for u64 {
    fn from(generation: Generation) -> Self {
        generation.0
    }
}

/// The live generation counter of one session.
#[derive(Debug, Default)]
pub struct GenerationGuard {
    current: Generation,
}

impl GenerationGuard {
    /// Create a guard at generation zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// The live generation.
    pub fn current(&self) -> Generation {
        self.current
    }

    /// Invalidate everything tagged with the current generation.
    ///
    /// Returns the new generation.
    pub fn bump(&mut self) -> Generation {
        self.current = Generation(self.current.0.saturating_add(1));
        self.current
    }

    /// Check whether work tagged with `tag` has been superseded.
    pub fn is_stale(&self, tag: Generation) -> bool {
        tag != self.current
    }
}
