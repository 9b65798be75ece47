// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tokio::task::AbortHandle;

use crate::builder::BreakerBuilder;
use crate::counter::Counter;
use crate::handler::{Execution, FailureHandler, PerState, StateChangeHandler, SuccessHandler};
use crate::invoker::Invoker;
use crate::reset_timer::ResetTimer;
use crate::restrictor::Restrictor;
use crate::stats::{METRIC_FAILURE, METRIC_REJECT, METRIC_SUCCESS, METRIC_TIMEOUT};
use crate::{BoxError, Error, State, Stats};

/// A named circuit breaker guarding calls to one fallible dependency.
///
/// The breaker tracks recent outcomes in a sliding window and routes every
/// call through the strategy of its current state: closed and half-open
/// calls run under the configured deadline, open calls are refused without
/// running the operation. Threshold policies trip the breaker between
/// states automatically; [`trip`][Self::trip] overrides them manually.
///
/// `Breaker` is a cheap-to-clone handle; clones share all state and the
/// breaker can be shared freely across tasks and threads.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use tripwire::{Breaker, BoxError};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let breaker: Breaker<String> = Breaker::builder("payments")
///     .invocation_timeout(Duration::from_millis(250))
///     .build()
///     .unwrap();
///
/// let result = breaker
///     .run(|| async {
///         // call the guarded dependency here
///         Ok::<_, BoxError>("settled".to_string())
///     })
///     .await;
/// # assert!(result.is_ok());
/// # }
/// ```
///
/// # Runtime
///
/// The breaker schedules its open → half-open re-entry and the default
/// counter's window rotation on background tasks, so it must be built and
/// tripped inside a Tokio runtime.
pub struct Breaker<T> {
    core: Arc<Core<T>>,
}

impl<T> Clone for Breaker<T> {
    fn clone(&self) -> Self {
        Self {
            core: Arc::clone(&self.core),
        }
    }
}

impl<T> fmt::Debug for Breaker<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Breaker")
            .field("name", &self.core.name)
            .field("state", &self.core.state())
            .finish_non_exhaustive()
    }
}

impl<T: 'static> Breaker<T> {
    /// Starts configuring a breaker with the given name.
    ///
    /// The name identifies the breaker in errors and log events.
    #[must_use]
    pub fn builder(name: impl Into<String>) -> BreakerBuilder<T> {
        BreakerBuilder::new(name.into())
    }

    pub(crate) fn from_core(core: Arc<Core<T>>) -> Self {
        Self { core }
    }

    /// Executes `operation` under the breaker.
    ///
    /// The call first passes the restrictor gate, then dispatches through
    /// the invoker of the state snapshot taken at entry: a concurrent
    /// transition does not re-route a call already in flight. The outcome
    /// is counted, fanned out to the matching handler chain, and returned
    /// with every error wrapped as [`Error::Invocation`].
    ///
    /// Cancellation is cooperative: dropping the returned future abandons
    /// the call, and an operation that outlives the breaker deadline is
    /// cancelled by being dropped.
    ///
    /// # Errors
    ///
    /// [`Error::Invocation`] wrapping the operation's error, a restrictor
    /// rejection, [`Error::InvocationTimeout`], or [`Error::OnOpenState`].
    pub async fn run<F, Fut>(&self, operation: F) -> Result<T, Error>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, BoxError>>,
    {
        let core = &self.core;
        let state = core.state();

        let outcome = {
            let mut gate = DeferStack::new();

            match core.check_restrictors(&mut gate) {
                Err(rejection) => Err(rejection),
                Ok(()) => core.invokers.get(state).invoke(operation).await,
            }
            // the gate drops here, running every entered restrictor's defer
            // in reverse order before the handler chains see the outcome
        };

        match outcome {
            Ok(result) => {
                core.counter.increment(METRIC_SUCCESS);
                core.dispatch_success(state, &result);
                Ok(result)
            }
            Err(cause) => {
                let error = Error::Invocation {
                    name: core.name.clone(),
                    source: cause,
                };
                core.counter.increment(METRIC_FAILURE);
                core.dispatch_failure(state, &error);
                Err(error)
            }
        }
    }

    /// Transitions the breaker to `state`.
    ///
    /// Runs the entry side effects of the target state and then the
    /// state-change handlers, synchronously on this thread.
    ///
    /// # Errors
    ///
    /// [`Error::AlreadyInDesiredState`] when the breaker is already in
    /// `state` (nothing changes and no handlers run), or
    /// [`Error::UnknownState`] for [`State::Unknown`].
    pub fn trip(&self, state: State) -> Result<(), Error> {
        self.core.trip(state, None)
    }

    /// Like [`trip`][Self::trip], with a reason that is handed to the reset
    /// timer when the target state is [`State::Open`].
    pub fn trip_with_reason(&self, state: State, reason: BoxError) -> Result<(), Error> {
        self.core.trip(state, Some(reason))
    }

    /// The current state of the breaker.
    #[must_use]
    pub fn state(&self) -> State {
        self.core.state()
    }

    /// The breaker's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.core.name
    }
}

/// State shared by every clone of a breaker. Handler chains, restrictors,
/// and invokers are immutable after construction; the lock only guards the
/// state and the pending reset scheduler.
pub(crate) struct Core<T> {
    pub(crate) name: String,
    pub(crate) shared: RwLock<Shared>,
    pub(crate) counter: Arc<dyn Counter>,
    pub(crate) reset_timer: Mutex<Box<dyn ResetTimer>>,
    pub(crate) invokers: PerState<Invoker>,
    pub(crate) restrictors: Vec<Box<dyn Restrictor>>,
    pub(crate) failure_handlers: PerState<Vec<FailureHandler>>,
    pub(crate) success_handlers: PerState<Vec<SuccessHandler<T>>>,
    pub(crate) state_change_handlers: Vec<StateChangeHandler>,
}

#[derive(Debug)]
pub(crate) struct Shared {
    pub(crate) state: State,
    /// The pending open → half-open scheduler; at most one is armed.
    pub(crate) resetter: Option<AbortHandle>,
}

impl<T> Core<T> {
    fn state(&self) -> State {
        self.shared.read().state
    }

    fn snapshot(&self) -> Stats {
        let metrics = self
            .counter
            .stats(&[METRIC_SUCCESS, METRIC_FAILURE, METRIC_TIMEOUT, METRIC_REJECT]);

        Stats::from_metrics(&metrics)
    }

    /// Runs the restrictor gate in declared order. The first rejection wins;
    /// restrictors after it are not entered.
    fn check_restrictors<'a>(&'a self, gate: &mut DeferStack<'a>) -> Result<(), BoxError> {
        for restrictor in &self.restrictors {
            gate.enter(restrictor.as_ref());

            if let Err(cause) = restrictor.check() {
                tracing::trace!(breaker = %self.name, %cause, "invocation rejected by restrictor");
                self.counter.increment(METRIC_REJECT);
                return Err(cause);
            }
        }

        Ok(())
    }

    fn dispatch_success(&self, state: State, result: &T) {
        let handlers = self.success_handlers.get(state);
        if handlers.is_empty() {
            return;
        }

        let execution = Execution {
            state,
            stats: self.snapshot(),
        };
        for handler in handlers {
            handler(&execution, result);
        }
    }

    fn dispatch_failure(&self, state: State, error: &Error) {
        let handlers = self.failure_handlers.get(state);
        if handlers.is_empty() {
            return;
        }

        let execution = Execution {
            state,
            stats: self.snapshot(),
        };
        for handler in handlers {
            handler(&execution, error);
        }
    }
}

impl<T: 'static> Core<T> {
    pub(crate) fn trip(self: &Arc<Self>, to: State, reason: Option<BoxError>) -> Result<(), Error> {
        let stats = self.snapshot();

        let from = {
            let mut shared = self.shared.write();

            if shared.state == to {
                return Err(Error::AlreadyInDesiredState {
                    name: self.name.clone(),
                    state: to,
                });
            }

            let from = shared.state;
            match to {
                State::Closed => self.enter_closed(&mut shared),
                State::HalfOpen => self.enter_half_open(&mut shared),
                State::Open => self.enter_open(&mut shared, reason),
                State::Unknown => return Err(Error::UnknownState { state: to }),
            }

            from
        };

        tracing::debug!(breaker = %self.name, %from, %to, "circuit breaker changed state");

        for handler in &self.state_change_handlers {
            handler(from, to, stats);
        }

        Ok(())
    }

    fn enter_closed(&self, shared: &mut Shared) {
        shared.state = State::Closed;

        if let Some(resetter) = shared.resetter.take() {
            resetter.abort();
        }

        self.reset_timer.lock().reset();
        self.counter.reset();
    }

    fn enter_half_open(&self, shared: &mut Shared) {
        shared.state = State::HalfOpen;

        // The scheduler either fired to get us here or is stale; either way
        // it is consumed.
        if let Some(resetter) = shared.resetter.take() {
            resetter.abort();
        }

        self.counter.reset();
    }

    fn enter_open(self: &Arc<Self>, shared: &mut Shared, reason: Option<BoxError>) {
        let delay = self.reset_timer.lock().next(reason.as_ref());

        if let Some(resetter) = shared.resetter.take() {
            resetter.abort();
        }

        let core = Arc::downgrade(self);
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;

            if let Some(core) = core.upgrade() {
                // Best effort: a concurrent transition may have moved the
                // breaker first.
                let _ = core.trip(State::HalfOpen, None);
            }
        });
        shared.resetter = Some(task.abort_handle());

        shared.state = State::Open;
        self.counter.reset();
    }
}

impl<T> fmt::Debug for Core<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Core")
            .field("name", &self.name)
            .field("shared", &self.shared)
            .finish_non_exhaustive()
    }
}

/// Tracks which restrictors were entered and runs their `defer` in reverse
/// order on drop, on every exit path of the call.
struct DeferStack<'a> {
    entered: Vec<&'a dyn Restrictor>,
}

impl<'a> DeferStack<'a> {
    fn new() -> Self {
        Self { entered: Vec::new() }
    }

    fn enter(&mut self, restrictor: &'a dyn Restrictor) {
        self.entered.push(restrictor);
    }
}

impl Drop for DeferStack<'_> {
    fn drop(&mut self) {
        for restrictor in self.entered.iter().rev() {
            restrictor.defer();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assert_types() {
        static_assertions::assert_impl_all!(Breaker<String>: Send, Sync, Clone);
    }

    #[test]
    fn defer_stack_runs_in_reverse_order() {
        struct Recording {
            id: u32,
            order: Arc<Mutex<Vec<u32>>>,
        }

        impl Restrictor for Recording {
            fn check(&self) -> Result<(), BoxError> {
                Ok(())
            }

            fn defer(&self) {
                self.order.lock().push(self.id);
            }
        }

        let order = Arc::new(Mutex::new(Vec::new()));
        let first = Recording {
            id: 1,
            order: Arc::clone(&order),
        };
        let second = Recording {
            id: 2,
            order: Arc::clone(&order),
        };

        {
            let mut gate = DeferStack::new();
            gate.enter(&first);
            gate.enter(&second);
        }

        assert_eq!(*order.lock(), vec![2, 1]);
    }
}
