// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt;

/// The state of a circuit breaker.
///
/// A breaker is always in exactly one of the three real states:
///
/// - [`Closed`][State::Closed]: normal operation, calls pass through.
/// - [`HalfOpen`][State::HalfOpen]: probing recovery, calls pass through
///   while the closer policy watches for sustained success.
/// - [`Open`][State::Open]: refusing calls without running them.
///
/// [`Unknown`][State::Unknown] is a sentinel that never describes a live
/// breaker; it exists so that invalid transition targets can be rejected
/// with an [`Error::UnknownState`][crate::Error::UnknownState].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum State {
    /// Normal operation.
    Closed,
    /// Probing whether the guarded dependency has recovered.
    HalfOpen,
    /// Refusing calls.
    Open,
    /// Sentinel for invalid input; never a live breaker state.
    Unknown,
}

impl State {
    /// Returns `true` when the state is [`State::Closed`].
    #[must_use]
    pub const fn is_closed(self) -> bool {
        matches!(self, Self::Closed)
    }

    /// Returns `true` when the state is [`State::HalfOpen`].
    #[must_use]
    pub const fn is_half_open(self) -> bool {
        matches!(self, Self::HalfOpen)
    }

    /// Returns `true` when the state is [`State::Open`].
    #[must_use]
    pub const fn is_open(self) -> bool {
        matches!(self, Self::Open)
    }

    /// Whether the state is one of the three states a breaker can occupy.
    pub(crate) const fn is_real(self) -> bool {
        !matches!(self, Self::Unknown)
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Closed => "close",
            Self::HalfOpen => "half-open",
            Self::Open => "open",
            Self::Unknown => "unknown",
        };

        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assert_types() {
        static_assertions::assert_impl_all!(State: Send, Sync, Copy);
    }

    #[test]
    fn display_forms() {
        assert_eq!(State::Closed.to_string(), "close");
        assert_eq!(State::HalfOpen.to_string(), "half-open");
        assert_eq!(State::Open.to_string(), "open");
        assert_eq!(State::Unknown.to_string(), "unknown");
    }

    #[test]
    fn predicates() {
        assert!(State::Closed.is_closed());
        assert!(!State::Closed.is_half_open());
        assert!(!State::Closed.is_open());

        assert!(State::HalfOpen.is_half_open());
        assert!(State::Open.is_open());

        assert!(State::Closed.is_real());
        assert!(State::HalfOpen.is_real());
        assert!(State::Open.is_real());
        assert!(!State::Unknown.is_real());
    }
}
