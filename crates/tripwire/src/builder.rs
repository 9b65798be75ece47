// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::{Mutex, RwLock};

use crate::breaker::{Core, Shared};
use crate::counter::{Counter, TimeBucketCounter};
use crate::handler::{Execution, FailureHandler, PerState, StateChangeHandler, SuccessHandler};
use crate::invoker::{Invoker, MetricCallback};
use crate::policy::{self, TripPolicy};
use crate::reset_timer::{ConstantTimer, ResetTimer};
use crate::restrictor::Restrictor;
use crate::stats::{METRIC_REJECT, METRIC_TIMEOUT};
use crate::{Breaker, Error, State, Stats};

/// Deadline applied to closed- and half-open-state invocations unless
/// overridden.
const DEFAULT_INVOCATION_TIMEOUT: Duration = Duration::from_secs(5);

/// Delay the default reset timer yields before an open breaker probes
/// recovery.
const DEFAULT_RESET_DELAY: Duration = Duration::from_secs(15);

/// Default counter window: ten buckets of one second.
const DEFAULT_COUNTER_CAPACITY: usize = 10;
const DEFAULT_COUNTER_DURATION: Duration = Duration::from_secs(1);

/// Closed trips open below 90% success over at least 10 requests.
const DEFAULT_CLOSED_OPENER: TripPolicy = TripPolicy {
    min_success_ratio: 90.0,
    min_requests: 10,
};

/// Half-open trips open below 70% success over at least 10 requests.
const DEFAULT_HALF_OPEN_OPENER: TripPolicy = TripPolicy {
    min_success_ratio: 70.0,
    min_requests: 10,
};

/// Half-open closes at 85% success or better over at least 10 requests.
const DEFAULT_HALF_OPEN_CLOSER: TripPolicy = TripPolicy {
    min_success_ratio: 85.0,
    min_requests: 10,
};

/// Configures and validates a [`Breaker`].
///
/// Created by [`Breaker::builder`]. Every component is optional with a
/// default; [`build`][Self::build] validates all options together and either
/// returns the breaker or the first [`Error::InvalidOption`], with no side
/// effects on failure.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use tripwire::{Breaker, State};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let breaker: Breaker<u64> = Breaker::builder("inventory")
///     .invocation_timeout(Duration::from_millis(500))
///     .opener(State::Closed, 98.5, 100)
///     .closer(95.0, 20)
///     .on_state_change(|from, to, _stats| {
///         eprintln!("inventory breaker: {from} -> {to}");
///     })
///     .build()
///     .unwrap();
/// # drop(breaker);
/// # }
/// ```
#[must_use]
pub struct BreakerBuilder<T> {
    name: String,
    initial_state: State,
    invocation_timeout: Duration,
    counter: Option<Arc<dyn Counter>>,
    reset_timer: Option<Box<dyn ResetTimer>>,
    restrictors: Vec<Box<dyn Restrictor>>,
    failure_handlers: Vec<(State, FailureHandler)>,
    success_handlers: Vec<(State, SuccessHandler<T>)>,
    state_change_handlers: Vec<StateChangeHandler>,
    openers: Vec<(State, TripPolicy)>,
    closer: Option<TripPolicy>,
}

impl<T: 'static> BreakerBuilder<T> {
    pub(crate) fn new(name: String) -> Self {
        Self {
            name,
            initial_state: State::Closed,
            invocation_timeout: DEFAULT_INVOCATION_TIMEOUT,
            counter: None,
            reset_timer: None,
            restrictors: Vec::new(),
            failure_handlers: Vec::new(),
            success_handlers: Vec::new(),
            state_change_handlers: Vec::new(),
            openers: Vec::new(),
            closer: None,
        }
    }

    /// Sets the state the breaker starts in. Defaults to [`State::Closed`].
    pub fn initial_state(mut self, state: State) -> Self {
        self.initial_state = state;
        self
    }

    /// Sets the deadline for closed- and half-open-state invocations.
    /// Defaults to five seconds.
    pub fn invocation_timeout(mut self, timeout: Duration) -> Self {
        self.invocation_timeout = timeout;
        self
    }

    /// Replaces the metric counter. Defaults to a [`TimeBucketCounter`]
    /// with ten one-second buckets.
    pub fn counter(mut self, counter: impl Counter + 'static) -> Self {
        self.counter = Some(Arc::new(counter));
        self
    }

    /// Replaces the reset-delay policy. Defaults to a
    /// [`ConstantTimer`] of fifteen seconds.
    pub fn reset_timer(mut self, timer: impl ResetTimer + 'static) -> Self {
        self.reset_timer = Some(Box::new(timer));
        self
    }

    /// Appends a restrictor to the pre-invocation gate. Restrictors are
    /// consulted in the order they were added.
    pub fn restrictor(mut self, restrictor: impl Restrictor + 'static) -> Self {
        self.restrictors.push(Box::new(restrictor));
        self
    }

    /// Appends a failure handler to the chain of the given state, after the
    /// auto-trip policies.
    pub fn on_failure(mut self, state: State, handler: impl Fn(&Execution, &Error) + Send + Sync + 'static) -> Self {
        self.failure_handlers.push((state, Box::new(handler)));
        self
    }

    /// Appends a success handler to the chain of the given state, after the
    /// auto-trip policies.
    pub fn on_success(mut self, state: State, handler: impl Fn(&Execution, &T) + Send + Sync + 'static) -> Self {
        self.success_handlers.push((state, Box::new(handler)));
        self
    }

    /// Appends a handler that runs after every committed state transition
    /// with `(from, to, stats at transition time)`.
    pub fn on_state_change(mut self, handler: impl Fn(State, State, Stats) + Send + Sync + 'static) -> Self {
        self.state_change_handlers.push(Box::new(handler));
        self
    }

    /// Overrides the opener policy for `state` ([`State::Closed`] or
    /// [`State::HalfOpen`]): on each failure in that state, once at least
    /// `min_requests` requests were observed and the success ratio falls
    /// below `min_success_ratio` percent, the breaker trips open.
    pub fn opener(mut self, state: State, min_success_ratio: f64, min_requests: u32) -> Self {
        self.openers.push((
            state,
            TripPolicy {
                min_success_ratio,
                min_requests,
            },
        ));
        self
    }

    /// Overrides the closer policy: on each success in the half-open state,
    /// once at least `min_requests` requests were observed and the success
    /// ratio reaches `min_success_ratio` percent, the breaker closes.
    pub fn closer(mut self, min_success_ratio: f64, min_requests: u32) -> Self {
        self.closer = Some(TripPolicy {
            min_success_ratio,
            min_requests,
        });
        self
    }

    /// Validates the configuration and builds the breaker.
    ///
    /// Must be called inside a Tokio runtime when the default counter is
    /// used, since the counter starts its rotation schedule immediately.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidOption`] for the first option that fails validation;
    /// nothing is constructed in that case.
    pub fn build(self) -> Result<Breaker<T>, Error> {
        let Self {
            name,
            initial_state,
            invocation_timeout,
            counter,
            reset_timer,
            restrictors,
            failure_handlers,
            success_handlers,
            state_change_handlers,
            openers,
            closer,
        } = self;

        if !initial_state.is_real() {
            return Err(Error::InvalidOption {
                name: "initial state",
                message: "must be one of 'close', 'half-open' or 'open'",
            });
        }

        if invocation_timeout.is_zero() {
            return Err(Error::InvalidOption {
                name: "invocation timeout",
                message: "must be a positive duration",
            });
        }

        let mut closed_opener = DEFAULT_CLOSED_OPENER;
        let mut half_open_opener = DEFAULT_HALF_OPEN_OPENER;
        for (state, policy) in openers {
            policy.validate("opener")?;

            match state {
                State::Closed => closed_opener = policy,
                State::HalfOpen => half_open_opener = policy,
                State::Open | State::Unknown => {
                    return Err(Error::InvalidOption {
                        name: "opener state",
                        message: "must be 'close' or 'half-open'",
                    });
                }
            }
        }

        let half_open_closer = match closer {
            Some(policy) => {
                policy.validate("closer")?;
                policy
            }
            None => DEFAULT_HALF_OPEN_CLOSER,
        };

        let mut user_failure = PerState::<Vec<FailureHandler>>::default();
        for (state, handler) in failure_handlers {
            match state {
                State::Closed => user_failure.closed.push(handler),
                State::HalfOpen => user_failure.half_open.push(handler),
                State::Open => user_failure.open.push(handler),
                State::Unknown => {
                    return Err(Error::InvalidOption {
                        name: "failure handler state",
                        message: "must be one of 'close', 'half-open' or 'open'",
                    });
                }
            }
        }

        let mut user_success = PerState::<Vec<SuccessHandler<T>>>::default();
        for (state, handler) in success_handlers {
            match state {
                State::Closed => user_success.closed.push(handler),
                State::HalfOpen => user_success.half_open.push(handler),
                State::Open => user_success.open.push(handler),
                State::Unknown => {
                    return Err(Error::InvalidOption {
                        name: "success handler state",
                        message: "must be one of 'close', 'half-open' or 'open'",
                    });
                }
            }
        }

        let counter: Arc<dyn Counter> = match counter {
            Some(counter) => counter,
            None => Arc::new(TimeBucketCounter::new(DEFAULT_COUNTER_CAPACITY, DEFAULT_COUNTER_DURATION)?),
        };

        let reset_timer = reset_timer.unwrap_or_else(|| Box::new(ConstantTimer::new(DEFAULT_RESET_DELAY)));

        let on_timeout: MetricCallback = {
            let counter = Arc::clone(&counter);
            Arc::new(move || counter.increment(METRIC_TIMEOUT))
        };
        let on_reject: MetricCallback = {
            let counter = Arc::clone(&counter);
            Arc::new(move || counter.increment(METRIC_REJECT))
        };

        let invokers = PerState {
            closed: Invoker::Deadline {
                timeout: invocation_timeout,
                on_timeout: Arc::clone(&on_timeout),
            },
            half_open: Invoker::Deadline {
                timeout: invocation_timeout,
                on_timeout,
            },
            open: Invoker::Reject { on_reject },
        };

        // The auto-trip handlers close over the breaker they are installed
        // into, so the core is tied cyclically; they sit at the head of
        // their chains, user handlers after them in declared order.
        let core = Arc::new_cyclic(|core: &Weak<Core<T>>| {
            let mut failure_handlers = PerState::<Vec<FailureHandler>>::default();
            failure_handlers.closed.push(policy::opener(core.clone(), closed_opener));
            failure_handlers.closed.append(&mut user_failure.closed);
            failure_handlers.half_open.push(policy::opener(core.clone(), half_open_opener));
            failure_handlers.half_open.append(&mut user_failure.half_open);
            failure_handlers.open = std::mem::take(&mut user_failure.open);

            let mut success_handlers = PerState::<Vec<SuccessHandler<T>>>::default();
            success_handlers.half_open.push(policy::closer(core.clone(), half_open_closer));
            success_handlers.half_open.append(&mut user_success.half_open);
            success_handlers.closed = std::mem::take(&mut user_success.closed);
            success_handlers.open = std::mem::take(&mut user_success.open);

            Core {
                name,
                shared: RwLock::new(Shared {
                    state: initial_state,
                    resetter: None,
                }),
                counter,
                reset_timer: Mutex::new(reset_timer),
                invokers,
                restrictors,
                failure_handlers,
                success_handlers,
                state_change_handlers,
            }
        });

        Ok(Breaker::from_core(core))
    }
}

impl<T> fmt::Debug for BreakerBuilder<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BreakerBuilder")
            .field("name", &self.name)
            .field("initial_state", &self.initial_state)
            .field("invocation_timeout", &self.invocation_timeout)
            .finish_non_exhaustive()
    }
}
