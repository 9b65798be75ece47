// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::{Error, State, Stats};

/// The call-scoped context handed to failure and success handlers.
///
/// `state` is the state snapshot taken when the call entered
/// [`Breaker::run`][crate::Breaker::run]; a transition that lands while the
/// operation is in flight does not re-route the call, so handlers always see
/// the state the call actually ran under. `stats` is sampled right before
/// the handler chain runs, with the call's own metric increment already
/// applied.
#[derive(Debug, Clone, Copy)]
pub struct Execution {
    /// The state the call ran under.
    pub state: State,
    /// Metric totals sampled at handler dispatch.
    pub stats: Stats,
}

/// A handler invoked after a failed invocation with the wrapped error.
pub(crate) type FailureHandler = Box<dyn Fn(&Execution, &Error) + Send + Sync>;

/// A handler invoked after a successful invocation with the result.
pub(crate) type SuccessHandler<T> = Box<dyn Fn(&Execution, &T) + Send + Sync>;

/// A handler invoked after a state transition commits, with
/// `(from, to, stats at transition time)`.
pub(crate) type StateChangeHandler = Box<dyn Fn(State, State, Stats) + Send + Sync>;

/// One value per real breaker state.
#[derive(Debug, Default)]
pub(crate) struct PerState<V> {
    pub closed: V,
    pub half_open: V,
    pub open: V,
}

impl<V> PerState<V> {
    pub fn get(&self, state: State) -> &V {
        match state {
            State::Closed => &self.closed,
            State::HalfOpen => &self.half_open,
            State::Open => &self.open,
            State::Unknown => unreachable!("a breaker never occupies the unknown state"),
        }
    }
}
