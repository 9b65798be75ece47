// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::time::Duration;

use crate::BoxError;

/// Produces the delay a breaker waits in the open state before probing
/// recovery.
///
/// [`next`][Self::next] receives the error that tripped the breaker open, so
/// implementations can grow the delay based on the failure reason — an
/// exponential backoff being the typical non-trivial strategy. The breaker
/// calls [`reset`][Self::reset] whenever it returns to the closed state so
/// stateful timers can start over.
///
/// The default is [`ConstantTimer`].
pub trait ResetTimer: Send {
    /// Returns the delay before the next open → half-open transition.
    ///
    /// `reason` is the first trip reason, when one was provided.
    fn next(&mut self, reason: Option<&BoxError>) -> Duration;

    /// Resets any internal pacing state; called when the breaker closes.
    fn reset(&mut self);
}

/// A reset timer that always yields the same delay.
#[derive(Debug, Clone, Copy)]
pub struct ConstantTimer {
    duration: Duration,
}

impl ConstantTimer {
    /// Creates a timer that always yields `duration`.
    #[must_use]
    pub const fn new(duration: Duration) -> Self {
        Self { duration }
    }
}

impl ResetTimer for ConstantTimer {
    fn next(&mut self, _reason: Option<&BoxError>) -> Duration {
        self.duration
    }

    fn reset(&mut self) {}
}
